//! Roomba SDK - iRobot Roomba 500 系列 Open Interface Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 传感器目录、命令编码、数据流解析（无 I/O）
//! - **串口层** (`serial`): 字节流适配器抽象，基于 `serialport`
//! - **驱动层** (`driver`): 设备接口、RX 线程、看门狗、监听器
//!
//! # 快速开始
//!
//! ```no_run
//! use roomba_sdk::prelude::*;
//! use std::sync::Arc;
//!
//! roomba_sdk::init_logger();
//!
//! let roomba = Arc::new(RoombaSerial::new(
//!     "/dev/ttyUSB0",
//!     &[SensorPacket::BumpsAndWheelDrops, SensorPacket::Distance],
//! ));
//!
//! let device = Arc::downgrade(&roomba);
//! roomba.set_sensor_packet_listener(Arc::new(move || {
//!     if let Some(device) = device.upgrade() {
//!         let bumps = device.sensor_data()[0];
//!         let _ = if bumps & 0x03 != 0 { device.stop() } else { device.drive_straight(200) };
//!     }
//! }));
//!
//! roomba.open(true)?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! roomba.close()?;
//! # Ok::<(), DriverError>(())
//! ```

pub mod config;
pub mod logging;

pub mod prelude;

pub use roomba_driver as driver;
pub use roomba_protocol as protocol;
pub use roomba_serial as serial;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

pub use config::{ConfigError, PipelineSection, RoombaConfig};
pub use logging::{LoggerError, init_logger, try_init_logger};

pub use roomba_driver::{
    DriverError, MetricsSnapshot, PipelineConfig, RoombaBuilder, RoombaDevice, RoombaDummy,
    RoombaSerial, SensorPacketListener,
};
pub use roomba_protocol::{ProtocolError, SensorPacket};
pub use roomba_serial::{SerialError, SerialSettings};
