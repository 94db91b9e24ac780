//! 共享传感器状态
//!
//! 快照值与新鲜标志由同一把锁保护，读者总能看到一致的组合。
//! 写者只有两类：RX 线程（写值并置新鲜）与看门狗线程（置过期）。

use crate::hooks::ListenerSlot;
use crate::metrics::StreamMetrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// 最新传感器快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorState {
    values: Vec<i32>,
    valid: bool,
}

impl SensorState {
    /// 创建全零、无效的快照
    pub fn new(len: usize) -> Self {
        Self {
            values: vec![0; len],
            valid: false,
        }
    }

    /// 按请求顺序排列的值
    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// 覆盖快照并标记为新鲜
    ///
    /// 长度不符时忽略并返回 `false`。
    pub fn update(&mut self, values: &[i32]) -> bool {
        if values.len() != self.values.len() {
            return false;
        }
        self.values.copy_from_slice(values);
        self.valid = true;
        true
    }

    /// 标记为过期，返回此前是否新鲜
    pub fn invalidate(&mut self) -> bool {
        std::mem::replace(&mut self.valid, false)
    }
}

/// 驱动共享上下文
///
/// 由调用方线程、RX 线程、看门狗线程通过 `Arc` 共享。
pub struct RoombaContext {
    pub sensor: Mutex<SensorState>,
    /// 看门狗周期内是否收到过有效帧
    pub frame_seen: AtomicBool,
    pub listener: ListenerSlot,
    pub metrics: StreamMetrics,
}

impl RoombaContext {
    pub fn new(sensor_count: usize) -> Self {
        Self {
            sensor: Mutex::new(SensorState::new(sensor_count)),
            frame_seen: AtomicBool::new(false),
            listener: ListenerSlot::new(),
            metrics: StreamMetrics::new(),
        }
    }

    /// 发布一帧解码结果：写快照、通知看门狗、调用监听器
    ///
    /// 监听器在释放快照锁之后调用，因此可以在回调中读取快照。
    pub fn publish(&self, values: &[i32]) -> bool {
        {
            let mut sensor = self.sensor.lock();
            if !sensor.update(values) {
                return false;
            }
            // 须在锁内置位，与 expire_if_unseen 互斥
            self.frame_seen.store(true, Ordering::Release);
        }
        self.listener.notify();
        true
    }

    /// 看门狗到期检查：本周期未收到帧则标记过期
    ///
    /// 返回快照是否由新鲜变为过期。
    pub fn expire_if_unseen(&self) -> bool {
        let mut sensor = self.sensor.lock();
        if self.frame_seen.load(Ordering::Acquire) {
            return false;
        }
        sensor.invalidate()
    }

    /// 快照副本
    pub fn sensor_data(&self) -> Vec<i32> {
        self.sensor.lock().values().to_vec()
    }

    pub fn sensor_data_is_valid(&self) -> bool {
        self.sensor.lock().is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_sensor_state_initially_invalid() {
        let state = SensorState::new(3);
        assert_eq!(state.values(), &[0, 0, 0]);
        assert!(!state.is_valid());
    }

    #[test]
    fn test_sensor_state_update_and_invalidate() {
        let mut state = SensorState::new(2);
        assert!(state.update(&[5, -7]));
        assert_eq!(state.values(), &[5, -7]);
        assert!(state.is_valid());

        assert!(state.invalidate());
        assert!(!state.is_valid());
        assert!(!state.invalidate());
        // 值保留
        assert_eq!(state.values(), &[5, -7]);
    }

    #[test]
    fn test_sensor_state_rejects_length_mismatch() {
        let mut state = SensorState::new(2);
        assert!(!state.update(&[1, 2, 3]));
        assert_eq!(state.values(), &[0, 0]);
        assert!(!state.is_valid());
    }

    #[test]
    fn test_publish_notifies_after_unlock() {
        let ctx = Arc::new(RoombaContext::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let ctx2 = ctx.clone();
            let calls = calls.clone();
            ctx.listener.set(Arc::new(move || {
                // 锁已释放，回调内读取快照不会死锁
                assert_eq!(ctx2.sensor_data(), vec![42]);
                calls.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert!(ctx.publish(&[42]));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ctx.sensor_data_is_valid());
        assert!(ctx.frame_seen.load(Ordering::Acquire));
    }

    #[test]
    fn test_expire_if_unseen() {
        let ctx = RoombaContext::new(1);
        // 从未新鲜过：无状态变化
        assert!(!ctx.expire_if_unseen());

        ctx.publish(&[3]);
        // 本周期收到过帧
        assert!(!ctx.expire_if_unseen());
        assert!(ctx.sensor_data_is_valid());

        ctx.frame_seen.store(false, Ordering::Release);
        assert!(ctx.expire_if_unseen());
        assert!(!ctx.sensor_data_is_valid());
        assert_eq!(ctx.sensor_data(), vec![3]);
    }

    #[test]
    fn test_publish_length_mismatch_is_ignored() {
        let ctx = RoombaContext::new(2);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        ctx.listener.set(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!ctx.publish(&[1]));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!ctx.sensor_data_is_valid());
    }
}
