//! 日志初始化
//!
//! 安装 `tracing_subscriber::fmt` 订阅者，过滤规则取自 `RUST_LOG`，
//! 未设置时使用 [`DEFAULT_LOG_FILTER`]。`log` crate 的记录经 `tracing-log` 转发。

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` 未设置时的过滤规则
pub const DEFAULT_LOG_FILTER: &str = "info";

/// 日志初始化错误
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("Failed to set global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// 构造过滤器：优先 `RUST_LOG`，否则使用默认规则
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// 初始化全局日志
///
/// # 错误
/// 全局订阅者或 `log` 转发已被安装时返回错误。
pub fn try_init_logger() -> Result<(), LoggerError> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_thread_names(true)
        .finish();

    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// 初始化全局日志，已初始化时静默忽略
///
/// # Example
///
/// ```
/// roomba_sdk::init_logger();
/// tracing::info!("logger ready");
/// // 重复调用无副作用
/// roomba_sdk::init_logger();
/// ```
pub fn init_logger() {
    let _ = try_init_logger();
}
