//! 数据流指标模块
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use roomba_protocol::ParserStats;
use std::sync::atomic::{AtomicU64, Ordering};

/// 传感器数据流实时指标
///
/// # 使用示例
///
/// ```rust
/// use roomba_driver::StreamMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = StreamMetrics::new();
/// metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().frames_decoded, 1);
/// ```
#[derive(Debug, Default)]
pub struct StreamMetrics {
    /// 收到的总字节数
    pub bytes_received: AtomicU64,

    /// 成功解码的帧数
    pub frames_decoded: AtomicU64,

    /// 重同步丢弃的字节数
    ///
    /// 持续增长说明线路噪声大或波特率不匹配。
    pub bytes_discarded: AtomicU64,

    /// 以帧头开始但校验失败的候选帧数
    pub candidates_rejected: AtomicU64,

    /// 看门狗超时（数据由新鲜变为过期）次数
    pub watchdog_expiries: AtomicU64,

    /// 发出的命令数
    pub commands_sent: AtomicU64,

    /// RX 读超时次数（正常现象）
    pub rx_timeouts: AtomicU64,

    /// 串口错误次数
    pub device_errors: AtomicU64,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 累加解析器统计增量
    pub(crate) fn add_parser_delta(&self, before: ParserStats, after: ParserStats) {
        self.bytes_received
            .fetch_add(after.bytes_received - before.bytes_received, Ordering::Relaxed);
        self.frames_decoded
            .fetch_add(after.frames_decoded - before.frames_decoded, Ordering::Relaxed);
        self.bytes_discarded
            .fetch_add(after.bytes_discarded - before.bytes_discarded, Ordering::Relaxed);
        self.candidates_rejected.fetch_add(
            after.candidates_rejected - before.candidates_rejected,
            Ordering::Relaxed,
        );
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            bytes_discarded: self.bytes_discarded.load(Ordering::Relaxed),
            candidates_rejected: self.candidates_rejected.load(Ordering::Relaxed),
            watchdog_expiries: self.watchdog_expiries.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.bytes_received.store(0, Ordering::Relaxed);
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.bytes_discarded.store(0, Ordering::Relaxed);
        self.candidates_rejected.store(0, Ordering::Relaxed);
        self.watchdog_expiries.store(0, Ordering::Relaxed);
        self.commands_sent.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub bytes_received: u64,
    pub frames_decoded: u64,
    pub bytes_discarded: u64,
    pub candidates_rejected: u64,
    pub watchdog_expiries: u64,
    pub commands_sent: u64,
    pub rx_timeouts: u64,
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 丢弃字节占收到字节的百分比
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `bytes_received` 为 0，返回 0.0。
    pub fn discard_rate(&self) -> f64 {
        if self.bytes_received == 0 {
            return 0.0;
        }
        (self.bytes_discarded as f64 / self.bytes_received as f64) * 100.0
    }
}
