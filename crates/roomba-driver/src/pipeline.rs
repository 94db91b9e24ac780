//! Pipeline IO 循环模块
//!
//! 负责后台 RX 线程的字节接收、帧重同步、解码和状态更新逻辑。

use crate::state::RoombaContext;
use roomba_protocol::{SensorStreamParser, StreamLayout};
use roomba_serial::{RxAdapter, SerialError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use roomba_driver::PipelineConfig;
///
/// // 默认配置（50ms 读超时，100ms 模式切换等待，65ms 看门狗周期）
/// let config = PipelineConfig::default();
///
/// // 自定义配置
/// let config = PipelineConfig {
///     watchdog_period_ms: 100,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// 串口读超时（毫秒），决定 RX 线程响应关闭的最长延迟
    pub read_timeout_ms: u64,
    /// 发送模式切换命令后的等待时间（毫秒）
    pub settle_delay_ms: u64,
    /// 看门狗周期（毫秒）
    pub watchdog_period_ms: u64,
    /// 单次读取的最大字节数
    pub read_chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 50,
            settle_delay_ms: 100,
            watchdog_period_ms: 65,
            read_chunk_size: 256,
        }
    }
}

impl PipelineConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.watchdog_period_ms)
    }
}

/// RX 线程循环
///
/// 读取字节、重同步并解码帧，每解码一帧发布一次快照并调用监听器。
/// 监听器在本线程上同步执行。
///
/// # 参数
/// - `rx`: 接收端适配器（循环中独占）
/// - `layout`: 数据流帧布局
/// - `ctx`: 共享状态上下文
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志，置 false 后在下一次读超时内退出
pub fn rx_loop(
    mut rx: impl RxAdapter,
    layout: StreamLayout,
    ctx: Arc<RoombaContext>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
) {
    let mut parser = SensorStreamParser::with_layout(layout);
    let mut buf = vec![0u8; config.read_chunk_size.max(1)];

    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let n = match rx.read(&mut buf) {
            Ok(0) | Err(SerialError::Timeout) => {
                // 超时是正常情况
                ctx.metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                continue;
            },
            Ok(n) => n,
            Err(e) => {
                ctx.metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                if e.is_fatal() {
                    error!("RX thread: fatal serial error: {}, exiting", e);
                    is_running.store(false, Ordering::Release);
                    break;
                }
                warn!("RX thread: serial read error: {}", e);
                continue;
            },
        };

        let before = parser.stats();
        parser.push(&buf[..n]);
        while let Some(values) = parser.next_frame() {
            trace!("Sensor frame decoded: {:?}", values);
            ctx.publish(values);
            // 监听器可能已在回调中关闭设备，缓冲区中剩余的帧不再发布
            if !is_running.load(Ordering::Acquire) {
                break;
            }
        }
        let after = parser.stats();

        if after.candidates_rejected > before.candidates_rejected {
            warn!(
                "Rejected {} corrupt sensor frame candidate(s)",
                after.candidates_rejected - before.candidates_rejected
            );
        } else if after.bytes_discarded > before.bytes_discarded {
            debug!(
                "Discarded {} byte(s) while resynchronising",
                after.bytes_discarded - before.bytes_discarded
            );
        }
        ctx.metrics.add_parser_delta(before, after);
    }
}
