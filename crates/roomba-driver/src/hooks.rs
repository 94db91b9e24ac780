//! 传感器数据监听器
//!
//! 每成功解码一帧，RX 线程同步调用一次已注册的监听器。
//! 同一时刻最多一个监听器，后注册的替换先注册的。
//!
//! # 使用示例
//!
//! ```rust
//! use roomba_driver::hooks::{ListenerSlot, SensorPacketListener};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let slot = ListenerSlot::new();
//! let count = Arc::new(AtomicUsize::new(0));
//! let counter = count.clone();
//! slot.set(Arc::new(move || {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! }));
//!
//! // 在 RX 线程中
//! slot.notify();
//! assert_eq!(count.load(Ordering::Relaxed), 1);
//! ```

use parking_lot::RwLock;
use std::sync::Arc;

/// 传感器数据监听器
///
/// 回调运行在 RX 线程上，阻塞会推迟后续帧的解码。
/// 回调内可以调用 `sensor_data()` 读取刚发布的快照。
pub trait SensorPacketListener: Send + Sync {
    /// 收到并解码一帧后调用
    fn on_sensor_packet(&self);
}

impl<F> SensorPacketListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_sensor_packet(&self) {
        self()
    }
}

/// 单监听器插槽
#[derive(Default)]
pub struct ListenerSlot {
    listener: RwLock<Option<Arc<dyn SensorPacketListener>>>,
}

impl ListenerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册监听器，替换之前的监听器
    pub fn set(&self, listener: Arc<dyn SensorPacketListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn clear(&self) {
        *self.listener.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.listener.read().is_some()
    }

    /// 调用当前监听器，返回是否有监听器
    ///
    /// 调用前复制 `Arc` 并释放读锁，回调内可以重新注册监听器。
    pub fn notify(&self) -> bool {
        let listener = self.listener.read().clone();
        match listener {
            Some(listener) => {
                listener.on_sensor_packet();
                true
            },
            None => false,
        }
    }
}

impl std::fmt::Debug for ListenerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSlot")
            .field("is_set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: AtomicUsize,
    }

    impl SensorPacketListener for CountingListener {
        fn on_sensor_packet(&self) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_empty_slot() {
        let slot = ListenerSlot::new();
        assert!(!slot.is_set());
        assert!(!slot.notify());
    }

    #[test]
    fn test_last_registration_wins() {
        let slot = ListenerSlot::new();
        let first = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });
        let second = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });

        slot.set(first.clone());
        slot.set(second.clone());
        assert!(slot.notify());
        assert!(slot.notify());

        assert_eq!(first.count.load(Ordering::Relaxed), 0);
        assert_eq!(second.count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_clear() {
        let slot = ListenerSlot::new();
        slot.set(Arc::new(|| {}));
        assert!(slot.is_set());
        slot.clear();
        assert!(!slot.is_set());
        assert!(!slot.notify());
    }

    #[test]
    fn test_listener_may_reregister_from_callback() {
        let slot = Arc::new(ListenerSlot::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot2 = slot.clone();
        let hits2 = hits.clone();
        slot.set(Arc::new(move || {
            hits2.fetch_add(1, Ordering::Relaxed);
            slot2.clear();
        }));

        assert!(slot.notify());
        assert!(!slot.notify());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }
}
