//! Builder 模式实现
//!
//! 提供链式构造 `RoombaSerial` 实例的便捷方式。

use crate::error::DriverError;
use crate::pipeline::PipelineConfig;
use crate::roomba::RoombaSerial;
use roomba_protocol::{SensorPacket, StreamLayout};
use roomba_serial::{DEFAULT_BAUD_RATE, PortConnector, SerialConnector, SerialSettings};

/// Roomba Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use roomba_driver::{PipelineConfig, RoombaBuilder, RoombaDevice};
/// use roomba_protocol::SensorPacket;
///
/// let roomba = RoombaBuilder::new("/dev/ttyUSB0")
///     .sensor_packet(SensorPacket::BumpsAndWheelDrops)
///     .sensor_packet(SensorPacket::Distance)
///     .pipeline_config(PipelineConfig {
///         watchdog_period_ms: 100,
///         ..PipelineConfig::default()
///     })
///     .build()
///     .unwrap();
/// roomba.open(true).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct RoombaBuilder {
    port: String,
    baud_rate: u32,
    packets: Vec<SensorPacket>,
    pipeline_config: PipelineConfig,
}

impl RoombaBuilder {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            packets: Vec::new(),
            pipeline_config: PipelineConfig::default(),
        }
    }

    /// 设置波特率（默认 115200）
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// 追加一个请求的传感器数据包
    pub fn sensor_packet(mut self, packet: SensorPacket) -> Self {
        self.packets.push(packet);
        self
    }

    /// 替换请求的传感器数据包列表
    pub fn sensor_packets(mut self, packets: &[SensorPacket]) -> Self {
        self.packets = packets.to_vec();
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    fn settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.pipeline_config.read_timeout(),
        }
    }

    /// 构造使用真实串口的设备（未打开）
    ///
    /// # 错误
    /// - `DriverError::Protocol`: 请求的数据流负载超出 255 字节
    pub fn build(self) -> Result<RoombaSerial<PortConnector>, DriverError> {
        self.build_with_connector(PortConnector)
    }

    /// 构造使用指定连接工厂的设备（未打开）
    pub fn build_with_connector<C: SerialConnector>(
        self,
        connector: C,
    ) -> Result<RoombaSerial<C>, DriverError> {
        StreamLayout::new(&self.packets).check_streamable()?;
        let settings = self.settings();
        Ok(RoombaSerial::with_connector(
            connector,
            settings,
            &self.packets,
            self.pipeline_config,
        ))
    }
}
