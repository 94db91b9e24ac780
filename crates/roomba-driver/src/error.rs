//! 驱动层错误类型定义

use roomba_protocol::ProtocolError;
use roomba_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 设备未打开
    #[error("Device is not open")]
    NotOpen,

    /// 设备已打开
    #[error("Device is already open")]
    AlreadyOpen,

    /// 串口传输错误（打开、写入失败）
    #[error("Serial transport error: {0}")]
    Transport(#[from] SerialError),

    /// 请求的数据流无法由设备发送（负载超出长度字节）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
