//! Mock 串口适配器
//!
//! 无硬件依赖的测试适配器：
//! - [`MockConnector::inject`] 向接收端注入字节（模拟设备发送）
//! - [`MockConnector::written`] 查看驱动写出的所有字节
//! - 可注入连接、写入、读取故障
//!
//! `MockConnector` 可 Clone，测试代码保留一份副本，另一份交给驱动。

use crate::{
    RxAdapter, SerialAdapter, SerialConnector, SerialError, SerialSettings, SplittableAdapter,
    TxAdapter,
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct MockShared {
    /// 每次写调用的字节（按顺序）
    writes: Mutex<Vec<Vec<u8>>>,
    fail_connect: AtomicBool,
    fail_write: AtomicBool,
    fail_read: AtomicBool,
    connects: AtomicUsize,
}

/// Mock 连接工厂
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<MockShared>,
    inject_tx: Sender<Vec<u8>>,
    inject_rx: Receiver<Vec<u8>>,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        let (inject_tx, inject_rx) = unbounded();
        Self {
            shared: Arc::new(MockShared::default()),
            inject_tx,
            inject_rx,
        }
    }

    /// 注入设备发来的字节
    pub fn inject(&self, bytes: &[u8]) {
        // 接收端由本结构体持有，发送不会失败
        let _ = self.inject_tx.send(bytes.to_vec());
    }

    /// 驱动写出的全部字节（拼接）
    pub fn written(&self) -> Vec<u8> {
        self.shared.writes.lock().concat()
    }

    /// 驱动每次写调用的字节
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.shared.writes.lock().clone()
    }

    pub fn clear_written(&self) {
        self.shared.writes.lock().clear();
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.shared.fail_write.store(fail, Ordering::Relaxed);
    }

    /// 之后的读操作返回 `SerialError::Disconnected`
    pub fn set_fail_read(&self, fail: bool) {
        self.shared.fail_read.store(fail, Ordering::Relaxed);
    }

    /// 成功建立的连接次数
    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::Relaxed)
    }
}

impl SerialConnector for MockConnector {
    type Adapter = MockAdapter;

    fn connect(&self, settings: &SerialSettings) -> Result<Self::Adapter, SerialError> {
        if self.shared.fail_connect.load(Ordering::Relaxed) {
            return Err(SerialError::NotFound(settings.port.clone()));
        }
        self.shared.connects.fetch_add(1, Ordering::Relaxed);
        Ok(MockAdapter {
            rx: MockRxAdapter {
                rx: self.inject_rx.clone(),
                pending: VecDeque::new(),
                read_timeout: settings.read_timeout,
                shared: self.shared.clone(),
            },
            tx: MockTxAdapter {
                shared: self.shared.clone(),
            },
            name: settings.port.clone(),
        })
    }
}

/// Mock 双向适配器
pub struct MockAdapter {
    rx: MockRxAdapter,
    tx: MockTxAdapter,
    name: String,
}

impl SerialAdapter for MockAdapter {
    fn port_name(&self) -> &str {
        &self.name
    }
}

impl SplittableAdapter for MockAdapter {
    type RxAdapter = MockRxAdapter;
    type TxAdapter = MockTxAdapter;

    fn split(self) -> Result<(Self::RxAdapter, Self::TxAdapter), SerialError> {
        Ok((self.rx, self.tx))
    }
}

/// Mock 接收端
pub struct MockRxAdapter {
    rx: Receiver<Vec<u8>>,
    /// 上次注入的块中尚未读出的字节
    pending: VecDeque<u8>,
    read_timeout: Duration,
    shared: Arc<MockShared>,
}

impl RxAdapter for MockRxAdapter {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        if self.shared.fail_read.load(Ordering::Relaxed) {
            return Err(SerialError::Disconnected);
        }

        if self.pending.is_empty() {
            match self.rx.recv_timeout(self.read_timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(RecvTimeoutError::Timeout) => return Err(SerialError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(SerialError::Disconnected),
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Mock 发送端
pub struct MockTxAdapter {
    shared: Arc<MockShared>,
}

impl TxAdapter for MockTxAdapter {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.shared.fail_write.load(Ordering::Relaxed) {
            return Err(SerialError::Disconnected);
        }
        self.shared.writes.lock().push(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SerialSettings {
        SerialSettings {
            port: "mock0".to_string(),
            baud_rate: 115_200,
            read_timeout: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_inject_and_read_in_chunks() {
        let connector = MockConnector::new();
        let adapter = connector.connect(&settings()).unwrap();
        assert_eq!(adapter.port_name(), "mock0");
        let (mut rx, _tx) = adapter.split().unwrap();

        connector.inject(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(rx.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(rx.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert!(matches!(rx.read(&mut buf), Err(SerialError::Timeout)));
    }

    #[test]
    fn test_writes_are_recorded() {
        let connector = MockConnector::new();
        let (_rx, mut tx) = connector.connect(&settings()).unwrap().split().unwrap();
        tx.write_all(&[0x80]).unwrap();
        tx.write_all(&[0x83]).unwrap();
        assert_eq!(connector.written(), vec![0x80, 0x83]);
        assert_eq!(connector.writes(), vec![vec![0x80], vec![0x83]]);
        connector.clear_written();
        assert!(connector.written().is_empty());
    }

    #[test]
    fn test_failure_injection() {
        let connector = MockConnector::new();
        connector.set_fail_connect(true);
        assert!(matches!(
            connector.connect(&settings()),
            Err(SerialError::NotFound(_))
        ));
        assert_eq!(connector.connect_count(), 0);

        connector.set_fail_connect(false);
        let (mut rx, mut tx) = connector.connect(&settings()).unwrap().split().unwrap();
        assert_eq!(connector.connect_count(), 1);

        connector.set_fail_write(true);
        assert!(tx.write_all(&[0x80]).is_err());

        connector.set_fail_read(true);
        let mut buf = [0u8; 4];
        assert!(matches!(rx.read(&mut buf), Err(SerialError::Disconnected)));
    }
}
