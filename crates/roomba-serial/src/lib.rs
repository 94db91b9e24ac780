//! # Roomba Serial Adapter Layer
//!
//! 串口硬件抽象层，提供统一的字节流接口抽象。
//!
//! - [`SerialPortAdapter`]: 基于 `serialport` 的真实串口（115200 8N1）
//! - `mock::MockConnector`: 无硬件测试适配器（需启用 `mock` feature）
//!
//! 驱动层通过 [`SerialConnector`] 打开连接，再用 [`SplittableAdapter::split`]
//! 拆分为接收端和发送端，分别交给 RX 线程与命令发送路径。

use std::time::Duration;
use thiserror::Error;

pub mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use port::{PortConnector, SerialPortAdapter, SerialPortRxAdapter, SerialPortTxAdapter};

/// Roomba Open Interface 默认波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 默认读超时
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// 串口适配层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Device disconnected")]
    Disconnected,
    #[error("Serial port not found: {0}")]
    NotFound(String),
}

impl SerialError {
    /// 是否为致命错误（设备断开、端口不存在）
    ///
    /// RX 线程遇到致命错误时退出。
    pub fn is_fatal(&self) -> bool {
        match self {
            SerialError::Timeout => false,
            SerialError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
            ),
            _ => true,
        }
    }
}

/// 串口连接参数
///
/// 数据位、停止位、校验位固定为 8N1。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// 串口名称（如 "/dev/ttyUSB0" 或 "COM3"）
    pub port: String,
    pub baud_rate: u32,
    /// 单次读操作的超时，决定 RX 线程检查退出标志的最长间隔
    pub read_timeout: Duration,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// 已打开的串口连接
///
/// 读写只在拆分后的接收端与发送端上进行。
pub trait SerialAdapter: Send {
    /// 串口名称
    fn port_name(&self) -> &str;
}

/// 接收端
pub trait RxAdapter: Send {
    /// 读取可用字节，超时返回 `SerialError::Timeout`
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;
}

/// 发送端
pub trait TxAdapter: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

/// 可拆分为独立接收端与发送端的适配器
pub trait SplittableAdapter: SerialAdapter {
    type RxAdapter: RxAdapter + 'static;
    type TxAdapter: TxAdapter + 'static;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError>;
}

/// 连接工厂
///
/// 每次 `open` 都重新建立一条连接，`close` 时连接被丢弃。
pub trait SerialConnector: Send + Sync {
    type Adapter: SplittableAdapter;

    fn connect(&self, settings: &SerialSettings) -> Result<Self::Adapter, SerialError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings_defaults() {
        let settings = SerialSettings::new("/dev/ttyUSB0");
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 115_200);
        assert_eq!(settings.read_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_is_fatal() {
        assert!(!SerialError::Timeout.is_fatal());
        assert!(SerialError::Disconnected.is_fatal());
        assert!(SerialError::NotFound("COM9".into()).is_fatal());
        assert!(!SerialError::Io(std::io::ErrorKind::Interrupted.into()).is_fatal());
        assert!(SerialError::Io(std::io::ErrorKind::BrokenPipe.into()).is_fatal());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SerialError::Timeout.to_string(), "Read timeout");
        assert_eq!(
            SerialError::NotFound("/dev/ttyUSB7".into()).to_string(),
            "Serial port not found: /dev/ttyUSB7"
        );
    }
}
