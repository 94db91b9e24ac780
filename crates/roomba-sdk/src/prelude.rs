//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use roomba_sdk::prelude::*;
//! ```

pub use crate::config::RoombaConfig;
pub use roomba_driver::{
    DriverError, PipelineConfig, RoombaBuilder, RoombaDevice, RoombaDummy, RoombaSerial,
    SensorPacketListener,
};
pub use roomba_protocol::{
    DriveCommand, MotorsCommand, ProtocolError, RADIUS_STRAIGHT, SensorPacket,
};
pub use roomba_serial::SerialError;
