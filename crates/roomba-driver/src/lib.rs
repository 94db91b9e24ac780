//! 驱动层模块
//!
//! 本模块提供 Roomba 的设备驱动功能，包括：
//! - 设备接口（[`RoombaDevice`]）与两个实现：串口设备、测试替身
//! - RX 线程：字节接收、帧重同步与解码
//! - 看门狗：传感器数据新鲜度跟踪
//! - 监听器：每解码一帧回调一次
//!
//! # 线程模型
//!
//! 打开后有两个后台线程：RX 线程（唯一写快照值的线程，监听器在其上同步运行）
//! 和看门狗线程（只写新鲜标志）。快照值与新鲜标志由同一把锁保护。

mod builder;
pub mod device;
mod dummy;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
mod roomba;
pub mod state;
pub mod watchdog;

pub use builder::RoombaBuilder;
pub use device::RoombaDevice;
pub use dummy::{DUMMY_PORT_NAME, RoombaDummy};
pub use error::DriverError;
pub use hooks::{ListenerSlot, SensorPacketListener};
pub use metrics::{MetricsSnapshot, StreamMetrics};
pub use pipeline::{PipelineConfig, rx_loop};
pub use roomba::RoombaSerial;
pub use state::{RoombaContext, SensorState};
pub use watchdog::{DEFAULT_WATCHDOG_PERIOD, Watchdog};
