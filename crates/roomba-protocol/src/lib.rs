//! # Roomba Protocol
//!
//! iRobot Roomba 500 系列 Open Interface (OI) 串口协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `sensor`: 传感器数据包目录（ID、字节宽度、符号、描述）
//! - `command`: 控制命令帧构建（模式切换、驱动、电机、数据流）
//! - `stream`: 传感器数据流帧布局、校验、解析与重同步
//!
//! ## 字节序
//!
//! 协议使用高位在前（大端字节序）。

pub mod command;
pub mod sensor;
pub mod stream;

// 重新导出常用类型
pub use command::*;
pub use sensor::*;
pub use stream::*;

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unknown sensor packet id: {id}")]
    UnknownSensorPacket { id: u8 },

    #[error("Unknown sensor packet name: {0}")]
    UnknownSensorPacketName(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Value {value} out of range for sensor packet {packet}")]
    ValueOutOfRange { packet: &'static str, value: i32 },

    #[error("Sensor stream too long: {count} packets, {payload} payload bytes (max {max})")]
    StreamTooLong {
        count: usize,
        payload: usize,
        max: usize,
    },
}

/// i16 转大端字节序
pub fn i16_to_bytes_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}
