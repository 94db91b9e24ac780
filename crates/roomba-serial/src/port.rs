//! `serialport` 串口适配器
//!
//! 以 115200 8N1、无流控打开串口。拆分时通过 `try_clone` 复制句柄，
//! 接收端与发送端可在不同线程中独立使用。

use crate::{
    RxAdapter, SerialAdapter, SerialConnector, SerialError, SerialSettings, SplittableAdapter,
    TxAdapter,
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, trace};

/// 串口适配器
pub struct SerialPortAdapter {
    port: Box<dyn SerialPort>,
    name: String,
}

impl std::fmt::Debug for SerialPortAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortAdapter").field("name", &self.name).finish()
    }
}

impl SerialPortAdapter {
    /// 打开串口
    ///
    /// # 错误
    /// - `SerialError::NotFound`: 端口不存在
    /// - `SerialError::Port`: 其他打开失败（权限、占用等）
    pub fn open(settings: &SerialSettings) -> Result<Self, SerialError> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::NoDevice => SerialError::NotFound(settings.port.clone()),
                _ => SerialError::Port(e),
            })?;

        debug!(
            "Serial port '{}' opened at {} baud (8N1)",
            settings.port, settings.baud_rate
        );
        Ok(Self {
            port,
            name: settings.port.clone(),
        })
    }
}

/// 将 IO 读结果映射为适配层错误
fn map_read(result: std::io::Result<usize>) -> Result<usize, SerialError> {
    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
            Err(SerialError::Timeout)
        },
        Err(e) if e.kind() == ErrorKind::BrokenPipe || e.kind() == ErrorKind::NotConnected => {
            Err(SerialError::Disconnected)
        },
        Err(e) => Err(SerialError::Io(e)),
    }
}

fn write_port(port: &mut dyn SerialPort, bytes: &[u8]) -> Result<(), SerialError> {
    port.write_all(bytes)?;
    port.flush()?;
    trace!("Serial TX: {:02X?}", bytes);
    Ok(())
}

impl SerialAdapter for SerialPortAdapter {
    fn port_name(&self) -> &str {
        &self.name
    }
}

impl SplittableAdapter for SerialPortAdapter {
    type RxAdapter = SerialPortRxAdapter;
    type TxAdapter = SerialPortTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        let rx_port = self.port.try_clone()?;
        Ok((
            SerialPortRxAdapter { port: rx_port },
            SerialPortTxAdapter { port: self.port },
        ))
    }
}

/// 串口接收端
pub struct SerialPortRxAdapter {
    port: Box<dyn SerialPort>,
}

impl RxAdapter for SerialPortRxAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        map_read(self.port.read(buf))
    }
}

/// 串口发送端
pub struct SerialPortTxAdapter {
    port: Box<dyn SerialPort>,
}

impl TxAdapter for SerialPortTxAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        write_port(self.port.as_mut(), bytes)
    }
}

/// 真实串口连接工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct PortConnector;

impl SerialConnector for PortConnector {
    type Adapter = SerialPortAdapter;

    fn connect(&self, settings: &SerialSettings) -> Result<Self::Adapter, SerialError> {
        SerialPortAdapter::open(settings)
    }
}
