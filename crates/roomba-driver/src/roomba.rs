//! 串口设备实现
//!
//! [`RoombaSerial`] 管理一条串口连接的完整生命周期：
//!
//! - `open`: 连接 → 启动 RX 线程 → START → 等待 → SAFE/FULL → 等待 → 开始数据流 → 启动看门狗
//! - `close`: 停止看门狗 → 暂停数据流并回到 Passive → 停止 RX 线程 → 释放连接
//!
//! RX 线程在发送任何命令之前启动，数据流开始后不会丢失首帧。
//!
//! 监听器在 RX 线程上运行，可以在回调中调用任何方法（包括 `close`）。
//! 此时 `open`/`close` 不等待生命周期锁：持锁方可能正在 join 这个线程。

use crate::device::RoombaDevice;
use crate::error::DriverError;
use crate::hooks::SensorPacketListener;
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{PipelineConfig, rx_loop};
use crate::state::RoombaContext;
use crate::watchdog::Watchdog;
use parking_lot::{Mutex, MutexGuard};
use roomba_protocol::{
    DriveCommand, MotorsCommand, OiMode, ProtocolError, SensorPacket, StreamCommand,
    StreamLayout, shutdown_bytes,
};
use roomba_serial::{
    PortConnector, SerialAdapter, SerialConnector, SerialError, SerialSettings,
    SplittableAdapter, TxAdapter,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId, spawn};
use tracing::{debug, error, info, warn};

/// RX 线程句柄
struct RxWorker {
    handle: Option<JoinHandle<()>>,
    is_running: Arc<AtomicBool>,
}

impl RxWorker {
    fn stop(&mut self) {
        // Release: All writes before this are visible to the RX thread
        self.is_running.store(false, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // 在监听器回调中关闭：RX 线程会在回调返回后自行退出
            warn!("Device closed from the RX thread, not joining");
            return;
        }
        if handle.join().is_err() {
            error!("RX thread panicked");
        }
    }
}

impl Drop for RxWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 打开状态下持有的资源
struct Session {
    tx: Box<dyn TxAdapter>,
    rx: RxWorker,
    watchdog: Watchdog,
}

/// 串口 Roomba 设备
///
/// # Example
///
/// ```no_run
/// use roomba_driver::{RoombaDevice, RoombaSerial};
/// use roomba_protocol::SensorPacket;
///
/// let roomba = RoombaSerial::new(
///     "/dev/ttyUSB0",
///     &[SensorPacket::BumpsAndWheelDrops, SensorPacket::Distance],
/// );
/// roomba.open(true).unwrap();
/// roomba.drive_straight(200).unwrap();
/// println!("{:?}", roomba.sensor_data());
/// roomba.close().unwrap();
/// ```
pub struct RoombaSerial<C: SerialConnector = PortConnector> {
    connector: C,
    settings: SerialSettings,
    packets: Vec<SensorPacket>,
    layout: StreamLayout,
    /// 设备无法按请求发送数据流时的原因，`open` 返回此错误
    request_error: Option<ProtocolError>,
    config: PipelineConfig,
    ctx: Arc<RoombaContext>,
    /// 串行化 open/close
    lifecycle: Mutex<()>,
    /// `Some` 即打开状态
    session: Mutex<Option<Session>>,
    /// 最近一次启动的 RX 线程
    rx_thread: Mutex<Option<ThreadId>>,
}

impl RoombaSerial<PortConnector> {
    /// 使用真实串口和默认配置创建设备（未打开）
    pub fn new(port: impl Into<String>, packets: &[SensorPacket]) -> Self {
        Self::with_connector(
            PortConnector,
            SerialSettings::new(port),
            packets,
            PipelineConfig::default(),
        )
    }
}

impl<C: SerialConnector> RoombaSerial<C> {
    /// 使用指定连接工厂创建设备（未打开）
    ///
    /// `settings.read_timeout` 以 `config.read_timeout_ms` 为准。
    pub fn with_connector(
        connector: C,
        mut settings: SerialSettings,
        packets: &[SensorPacket],
        config: PipelineConfig,
    ) -> Self {
        settings.read_timeout = config.read_timeout();
        let layout = StreamLayout::new(packets);
        let request_error = layout.check_streamable().err();
        if let Some(e) = &request_error {
            error!(
                "Roomba on '{}' cannot stream the requested sensor packets: {}",
                settings.port, e
            );
        }
        Self {
            connector,
            settings,
            packets: packets.to_vec(),
            layout,
            request_error,
            ctx: Arc::new(RoombaContext::new(packets.len())),
            config,
            lifecycle: Mutex::new(()),
            session: Mutex::new(None),
            rx_thread: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 数据流帧布局
    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// 数据流指标快照
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 获取生命周期锁
    ///
    /// 在 RX 线程（监听器回调）上只尝试一次：锁被占用说明另一线程正在
    /// open/close，并可能正在 join 本线程。此时返回 `None`。
    fn lock_lifecycle(&self) -> Option<MutexGuard<'_, ()>> {
        let on_rx_thread = *self.rx_thread.lock() == Some(thread::current().id());
        if on_rx_thread {
            self.lifecycle.try_lock()
        } else {
            Some(self.lifecycle.lock())
        }
    }

    fn send(&self, tx: &mut dyn TxAdapter, bytes: &[u8]) -> Result<(), SerialError> {
        debug!("Roomba TX: {:02X?}", bytes);
        tx.write_all(bytes)?;
        self.ctx.metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// 在打开状态下发送一条命令
    fn send_command(&self, bytes: &[u8]) -> Result<(), DriverError> {
        let mut session = self.session.lock();
        let session = session.as_mut().ok_or(DriverError::NotOpen)?;
        self.send(session.tx.as_mut(), bytes)?;
        Ok(())
    }

    /// 模式切换与数据流请求
    fn handshake(&self, tx: &mut dyn TxAdapter, safe_mode: bool) -> Result<(), SerialError> {
        let settle = self.config.settle_delay();

        self.send(tx, &OiMode::Passive.to_bytes())?;
        spin_sleep::sleep(settle);

        self.send(tx, &OiMode::control(safe_mode).to_bytes())?;
        spin_sleep::sleep(settle);

        self.send(tx, &StreamCommand::new(&self.packets).to_bytes())?;
        Ok(())
    }

    fn spawn_rx(&self, rx: <C::Adapter as SplittableAdapter>::RxAdapter) -> RxWorker {
        let is_running = Arc::new(AtomicBool::new(true));
        let handle = {
            let layout = self.layout.clone();
            let ctx = self.ctx.clone();
            let config = self.config.clone();
            let is_running = is_running.clone();
            spawn(move || rx_loop(rx, layout, ctx, config, is_running))
        };
        *self.rx_thread.lock() = Some(handle.thread().id());
        RxWorker {
            handle: Some(handle),
            is_running,
        }
    }
}

impl<C: SerialConnector> RoombaDevice for RoombaSerial<C> {
    fn open(&self, safe_mode: bool) -> Result<(), DriverError> {
        let Some(_lifecycle) = self.lock_lifecycle() else {
            warn!("open() called from the listener while open/close is in progress");
            return Err(DriverError::AlreadyOpen);
        };
        if self.session.lock().is_some() {
            return Err(DriverError::AlreadyOpen);
        }
        if let Some(e) = &self.request_error {
            return Err(e.clone().into());
        }

        info!(
            "Opening Roomba on '{}' ({} mode, {} sensor packets)",
            self.settings.port,
            if safe_mode { "safe" } else { "full" },
            self.packets.len()
        );

        let adapter = self.connector.connect(&self.settings).inspect_err(|e| {
            error!("Failed to connect to '{}': {}", self.settings.port, e);
        })?;
        let port_name = adapter.port_name().to_string();
        let (rx, tx) = adapter.split()?;
        let mut tx: Box<dyn TxAdapter> = Box::new(tx);

        // 上次会话的快照已过期
        self.ctx.sensor.lock().invalidate();

        let mut rx = self.spawn_rx(rx);
        if let Err(e) = self.handshake(tx.as_mut(), safe_mode) {
            error!("Roomba open sequence failed: {}", e);
            rx.stop();
            return Err(e.into());
        }

        let watchdog = Watchdog::spawn(self.ctx.clone(), self.config.watchdog_period());
        *self.session.lock() = Some(Session { tx, rx, watchdog });

        info!("Roomba on '{}' opened", port_name);
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        let Some(_lifecycle) = self.lock_lifecycle() else {
            // 另一线程正在关闭（或打开尚未完成），设备不处于打开状态
            debug!("close() called from the listener while open/close is in progress");
            return Err(DriverError::NotOpen);
        };
        // 取出后立即释放锁：监听器可能在 RX 线程上调用 drive()
        let Session {
            mut tx,
            mut rx,
            watchdog,
        } = self.session.lock().take().ok_or(DriverError::NotOpen)?;

        watchdog.stop();

        let result = self.send(tx.as_mut(), &shutdown_bytes());
        if let Err(e) = &result {
            error!("Failed to send shutdown commands: {}", e);
        }

        rx.stop();
        drop(tx);

        // RX 线程已停止，不会再有新帧
        self.ctx.sensor.lock().invalidate();

        info!("Roomba on '{}' closed", self.settings.port);
        result.map_err(DriverError::from)
    }

    fn drive(&self, velocity: i16, radius: i16) -> Result<(), DriverError> {
        let command = DriveCommand::new(velocity, radius);
        if command.velocity != velocity || command.radius != radius {
            debug!(
                "Drive command clamped: ({}, {}) -> ({}, {})",
                velocity, radius, command.velocity, command.radius
            );
        }
        self.send_command(&command.to_bytes())
    }

    fn motors(
        &self,
        side_brush: bool,
        side_brush_clockwise: bool,
        main_brush: bool,
        main_brush_outward: bool,
        vacuum: bool,
    ) -> Result<(), DriverError> {
        let command = MotorsCommand::new(
            side_brush,
            side_brush_clockwise,
            main_brush,
            main_brush_outward,
            vacuum,
        );
        self.send_command(&command.to_bytes())
    }

    fn sensor_data(&self) -> Vec<i32> {
        self.ctx.sensor_data()
    }

    fn sensor_data_is_valid(&self) -> bool {
        self.ctx.sensor_data_is_valid()
    }

    fn set_sensor_packet_listener(&self, listener: Arc<dyn SensorPacketListener>) {
        self.ctx.listener.set(listener);
    }

    fn port_name(&self) -> &str {
        &self.settings.port
    }

    fn is_opened(&self) -> bool {
        self.session.lock().is_some()
    }

    fn sensor_packets_requested(&self) -> Vec<SensorPacket> {
        self.packets.clone()
    }
}

impl<C: SerialConnector> Drop for RoombaSerial<C> {
    fn drop(&mut self) {
        if self.session.get_mut().is_some()
            && let Err(e) = self.close()
        {
            warn!("Failed to close Roomba on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomba_serial::mock::MockConnector;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    const PACKETS: [SensorPacket; 2] = [SensorPacket::BumpsAndWheelDrops, SensorPacket::Distance];

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            read_timeout_ms: 5,
            settle_delay_ms: 1,
            watchdog_period_ms: 40,
            read_chunk_size: 64,
        }
    }

    fn mock_roomba() -> (RoombaSerial<MockConnector>, MockConnector) {
        let connector = MockConnector::new();
        let roomba = RoombaSerial::with_connector(
            connector.clone(),
            SerialSettings::new("mock0"),
            &PACKETS,
            fast_config(),
        );
        (roomba, connector)
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    #[test]
    fn test_new_is_closed() {
        let (roomba, connector) = mock_roomba();
        assert!(!roomba.is_opened());
        assert_eq!(roomba.port_name(), "mock0");
        assert_eq!(roomba.sensor_packets_requested(), PACKETS.to_vec());
        assert_eq!(roomba.sensor_data(), vec![0, 0]);
        assert!(!roomba.sensor_data_is_valid());
        assert_eq!(roomba.settings().read_timeout, Duration::from_millis(5));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn test_open_writes_handshake() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        assert!(roomba.is_opened());
        assert_eq!(
            connector.writes(),
            vec![vec![0x80], vec![0x83], vec![0x94, 2, 7, 19]]
        );
        roomba.close().unwrap();

        connector.clear_written();
        roomba.open(false).unwrap();
        assert_eq!(connector.writes()[1], vec![0x84]);
    }

    #[test]
    fn test_close_writes_shutdown() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        connector.clear_written();
        roomba.close().unwrap();
        assert!(!roomba.is_opened());
        assert_eq!(connector.written(), vec![0x96, 0x00, 0x80]);
    }

    #[test]
    fn test_close_clears_freshness() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        connector.inject(&roomba.layout().encode(&[1, 300]).unwrap());
        assert!(wait_until(|| roomba.sensor_data_is_valid()));

        roomba.close().unwrap();
        assert!(!roomba.sensor_data_is_valid());
        // 关闭后值保留，但始终无效
        thread::sleep(Duration::from_millis(100));
        assert!(!roomba.sensor_data_is_valid());
        assert_eq!(roomba.sensor_data(), vec![1, 300]);
    }

    #[test]
    fn test_listener_close_during_caller_close() {
        let (roomba, connector) = mock_roomba();
        let roomba = Arc::new(roomba);
        let entered = Arc::new(AtomicBool::new(false));
        let listener_result = Arc::new(Mutex::new(None));
        {
            let device = Arc::downgrade(&roomba);
            let entered = entered.clone();
            let listener_result = listener_result.clone();
            roomba.set_sensor_packet_listener(Arc::new(move || {
                entered.store(true, Ordering::SeqCst);
                // 调用方的 close() 在此期间开始并 join RX 线程
                thread::sleep(Duration::from_millis(100));
                if let Some(device) = device.upgrade() {
                    *listener_result.lock() = Some(device.close());
                }
            }));
        }

        roomba.open(true).unwrap();
        connector.inject(&roomba.layout().encode(&[0, 0]).unwrap());
        assert!(wait_until(|| entered.load(Ordering::SeqCst)));

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        {
            let roomba = roomba.clone();
            thread::spawn(move || {
                let _ = done_tx.send(roomba.close());
            });
        }

        let caller_result = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("caller close() did not return");
        assert!(wait_until(|| listener_result.lock().is_some()));
        assert!(!roomba.is_opened());

        // 恰好一方完成关闭，另一方得到 NotOpen
        let listener_result = listener_result.lock().take().unwrap();
        match (caller_result, listener_result) {
            (Ok(()), Err(DriverError::NotOpen)) | (Err(DriverError::NotOpen), Ok(())) => {},
            other => panic!("unexpected close results: {:?}", other),
        }
    }

    #[test]
    fn test_unstreamable_request_rejected_on_open() {
        let connector = MockConnector::new();
        let roomba = RoombaSerial::with_connector(
            connector.clone(),
            SerialSettings::new("mock0"),
            &[SensorPacket::Distance; 86],
            fast_config(),
        );
        assert!(matches!(
            roomba.open(true),
            Err(DriverError::Protocol(ProtocolError::StreamTooLong { count: 86, .. }))
        ));
        assert!(!roomba.is_opened());
        assert_eq!(connector.connect_count(), 0);
        assert!(connector.written().is_empty());
    }

    #[test]
    fn test_state_errors() {
        let (roomba, _connector) = mock_roomba();
        assert!(matches!(roomba.close(), Err(DriverError::NotOpen)));
        assert!(matches!(roomba.drive(100, 0), Err(DriverError::NotOpen)));
        assert!(matches!(
            roomba.motors(true, true, true, true, true),
            Err(DriverError::NotOpen)
        ));

        roomba.open(true).unwrap();
        assert!(matches!(roomba.open(true), Err(DriverError::AlreadyOpen)));
        roomba.close().unwrap();
        assert!(matches!(roomba.close(), Err(DriverError::NotOpen)));
    }

    #[test]
    fn test_open_connect_failure_stays_closed() {
        let (roomba, connector) = mock_roomba();
        connector.set_fail_connect(true);
        assert!(matches!(
            roomba.open(true),
            Err(DriverError::Transport(SerialError::NotFound(_)))
        ));
        assert!(!roomba.is_opened());
        assert!(connector.written().is_empty());
    }

    #[test]
    fn test_open_write_failure_tears_down() {
        let (roomba, connector) = mock_roomba();
        connector.set_fail_write(true);
        assert!(matches!(roomba.open(true), Err(DriverError::Transport(_))));
        assert!(!roomba.is_opened());

        connector.set_fail_write(false);
        roomba.open(true).unwrap();
        assert!(roomba.is_opened());
    }

    #[test]
    fn test_close_write_failure_still_closes() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        connector.set_fail_write(true);
        assert!(matches!(roomba.close(), Err(DriverError::Transport(_))));
        assert!(!roomba.is_opened());
        assert!(matches!(roomba.drive(0, 0), Err(DriverError::NotOpen)));
    }

    #[test]
    fn test_drive_and_motors_bytes() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        connector.clear_written();

        roomba.drive(-200, 500).unwrap();
        roomba.drive(1000, 32767).unwrap();
        roomba.motors(true, false, false, false, true).unwrap();
        roomba.stop().unwrap();

        assert_eq!(
            connector.writes(),
            vec![
                vec![0x89, 0xFF, 0x38, 0x01, 0xF4],
                vec![0x89, 0x01, 0xF4, 0x7F, 0xFF],
                vec![0x89, 0b0001_1100],
                vec![0x89, 0x00, 0x00, 0x00, 0x00],
            ]
        );
        assert_eq!(roomba.metrics().commands_sent, 3 + 4);
    }

    #[test]
    fn test_stream_updates_snapshot_and_listener() {
        let (roomba, connector) = mock_roomba();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        roomba.set_sensor_packet_listener(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        roomba.open(true).unwrap();
        let frame = roomba.layout().encode(&[2, 0x1300]).unwrap();
        connector.inject(&frame);

        assert!(wait_until(|| calls.load(Ordering::SeqCst) == 1));
        assert_eq!(roomba.sensor_data(), vec![2, 0x1300]);
        assert!(roomba.sensor_data_is_valid());
        assert_eq!(roomba.sensor_value(SensorPacket::Distance), Some(0x1300));
        assert_eq!(roomba.sensor_value(SensorPacket::Wall), None);

        // 看门狗：无新帧后变为无效，值保留
        assert!(wait_until(|| !roomba.sensor_data_is_valid()));
        assert_eq!(roomba.sensor_data(), vec![2, 0x1300]);
        assert!(roomba.metrics().watchdog_expiries >= 1);

        roomba.close().unwrap();
    }

    #[test]
    fn test_listener_can_drive_from_callback() {
        let (roomba, connector) = mock_roomba();
        let roomba = Arc::new(roomba);
        let result = Arc::new(Mutex::new(None));
        {
            let device = Arc::downgrade(&roomba);
            let result = result.clone();
            roomba.set_sensor_packet_listener(Arc::new(move || {
                if let Some(device) = device.upgrade() {
                    *result.lock() = Some(device.drive(100, 0).is_ok());
                }
            }));
        }

        roomba.open(true).unwrap();
        connector.inject(&roomba.layout().encode(&[0, 0]).unwrap());
        assert!(wait_until(|| result.lock().is_some()));
        assert_eq!(*result.lock(), Some(true));
        roomba.close().unwrap();
    }

    #[test]
    fn test_drop_closes_open_device() {
        let (roomba, connector) = mock_roomba();
        roomba.open(true).unwrap();
        connector.clear_written();
        drop(roomba);
        assert_eq!(connector.written(), vec![0x96, 0x00, 0x80]);
    }
}
