//! 配置文件
//!
//! TOML 格式：
//!
//! ```toml
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! safe_mode = true
//! sensor_packets = ["BUMPS_AND_WHEEL_DROPS", "DISTANCE", "ANGLE"]
//!
//! [pipeline]
//! read_timeout_ms = 50
//! settle_delay_ms = 100
//! watchdog_period_ms = 65
//! ```
//!
//! 省略的字段取默认值。

use roomba_driver::{DriverError, PipelineConfig, RoombaBuilder, RoombaSerial};
use roomba_protocol::{SensorPacket, StreamLayout};
use roomba_serial::{DEFAULT_BAUD_RATE, PortConnector, SerialConnector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to build device: {0}")]
    Driver(#[from] DriverError),
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_safe_mode() -> bool {
    true
}

/// 设备配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoombaConfig {
    /// 串口名称
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// `open` 时进入 Safe 模式（否则 Full 模式）
    #[serde(default = "default_safe_mode")]
    pub safe_mode: bool,
    /// 请求的传感器数据包（按名称，如 `"DISTANCE"`）
    #[serde(default)]
    pub sensor_packets: Vec<SensorPacket>,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

/// `[pipeline]` 配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSection {
    pub read_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub watchdog_period_ms: u64,
    pub read_chunk_size: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        PipelineConfig::default().into()
    }
}

impl From<PipelineConfig> for PipelineSection {
    fn from(config: PipelineConfig) -> Self {
        Self {
            read_timeout_ms: config.read_timeout_ms,
            settle_delay_ms: config.settle_delay_ms,
            watchdog_period_ms: config.watchdog_period_ms,
            read_chunk_size: config.read_chunk_size,
        }
    }
}

impl From<&PipelineSection> for PipelineConfig {
    fn from(section: &PipelineSection) -> Self {
        Self {
            read_timeout_ms: section.read_timeout_ms,
            settle_delay_ms: section.settle_delay_ms,
            watchdog_period_ms: section.watchdog_period_ms,
            read_chunk_size: section.read_chunk_size,
        }
    }
}

impl RoombaConfig {
    /// 指定配置文件路径的环境变量
    pub const ENV_CONFIG_PATH: &'static str = "ROOMBA_CONFIG";

    pub fn new(port: impl Into<String>, sensor_packets: &[SensorPacket]) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            safe_mode: default_safe_mode(),
            sensor_packets: sensor_packets.to_vec(),
            pipeline: PipelineSection::default(),
        }
    }

    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded Roomba config from {}", path.display());
        Ok(config)
    }

    /// 从 `ROOMBA_CONFIG` 指定的文件加载，未设置时使用 `fallback`
    pub fn load_from_env_or<P: AsRef<Path>>(fallback: P) -> Result<Self, ConfigError> {
        match std::env::var_os(Self::ENV_CONFIG_PATH) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Self::load(fallback),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.trim().is_empty() {
            return Err(ConfigError::Invalid("port must not be empty".into()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".into()));
        }
        StreamLayout::new(&self.sensor_packets)
            .check_streamable()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.pipeline.watchdog_period_ms == 0 {
            return Err(ConfigError::Invalid("watchdog_period_ms must be positive".into()));
        }
        if self.pipeline.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read_chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        (&self.pipeline).into()
    }

    /// 对应的 Builder
    pub fn builder(&self) -> RoombaBuilder {
        RoombaBuilder::new(self.port.clone())
            .baud_rate(self.baud_rate)
            .sensor_packets(&self.sensor_packets)
            .pipeline_config(self.pipeline_config())
    }

    /// 构造使用真实串口的设备（未打开）
    pub fn build(&self) -> Result<RoombaSerial<PortConnector>, ConfigError> {
        self.build_with_connector(PortConnector)
    }

    /// 构造使用指定连接工厂的设备（未打开）
    pub fn build_with_connector<C: SerialConnector>(
        &self,
        connector: C,
    ) -> Result<RoombaSerial<C>, ConfigError> {
        self.validate()?;
        Ok(self.builder().build_with_connector(connector)?)
    }
}
