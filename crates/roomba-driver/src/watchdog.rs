//! 传感器数据看门狗
//!
//! 设备每 15ms 发送一帧。看门狗每个周期（默认 65ms）检查一次：
//! 周期内没有收到有效帧，则把快照标记为过期。
//!
//! 周期等待使用 `recv_timeout`，停止信号可以立即唤醒线程。

use crate::state::RoombaContext;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, trace, warn};

/// 默认看门狗周期
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_millis(65);

/// 看门狗线程句柄
///
/// `stop` 或 drop 时通知线程退出并等待其结束。
pub struct Watchdog {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// 启动看门狗线程
    pub fn spawn(ctx: Arc<RoombaContext>, period: Duration) -> Self {
        let (stop_tx, stop_rx) = bounded(1);
        let handle = spawn(move || watchdog_loop(ctx, period, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// 停止并等待线程退出
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // 关闭通道即唤醒 recv_timeout
        self.stop_tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Watchdog thread panicked");
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 看门狗循环
pub fn watchdog_loop(ctx: Arc<RoombaContext>, period: Duration, stop_rx: Receiver<()>) {
    loop {
        ctx.frame_seen.store(false, Ordering::Release);

        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {},
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                trace!("Watchdog: stop requested, exiting");
                break;
            },
        }

        if ctx.expire_if_unseen() {
            ctx.metrics.watchdog_expiries.fetch_add(1, Ordering::Relaxed);
            warn!(
                "No sensor frame received within {:?}, sensor data marked invalid",
                period
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_watchdog_expires_without_frames() {
        let ctx = Arc::new(RoombaContext::new(1));
        ctx.publish(&[1]);
        assert!(ctx.sensor_data_is_valid());

        let watchdog = Watchdog::spawn(ctx.clone(), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(80));
        assert!(!ctx.sensor_data_is_valid());
        assert_eq!(ctx.metrics.snapshot().watchdog_expiries, 1);
        watchdog.stop();
    }

    #[test]
    fn test_watchdog_stays_valid_while_frames_arrive() {
        let ctx = Arc::new(RoombaContext::new(1));
        ctx.publish(&[0]);
        let watchdog = Watchdog::spawn(ctx.clone(), Duration::from_millis(60));

        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(200) {
            ctx.publish(&[1]);
            thread::sleep(Duration::from_millis(5));
        }
        assert!(ctx.sensor_data_is_valid());
        assert_eq!(ctx.metrics.snapshot().watchdog_expiries, 0);
        watchdog.stop();
    }

    #[test]
    fn test_watchdog_stop_is_prompt() {
        let ctx = Arc::new(RoombaContext::new(0));
        let watchdog = Watchdog::spawn(ctx, Duration::from_secs(10));
        let start = Instant::now();
        watchdog.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_watchdog_drop_stops_thread() {
        let ctx = Arc::new(RoombaContext::new(0));
        let start = Instant::now();
        drop(Watchdog::spawn(ctx, Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
