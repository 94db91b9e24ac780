//! 测试替身设备
//!
//! [`RoombaDummy`] 实现与 [`RoombaSerial`](crate::RoombaSerial) 相同的接口，但不产生任何串口流量：
//! 每次调用只向输出（默认 stdout）写一段可读描述。
//! 它不会自行产生传感器数据，测试通过 [`RoombaDummy::inject_sensor_data`] 手动注入。

use crate::device::RoombaDevice;
use crate::error::DriverError;
use crate::hooks::SensorPacketListener;
use crate::metrics::MetricsSnapshot;
use crate::state::RoombaContext;
use parking_lot::Mutex;
use roomba_protocol::SensorPacket;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};

/// 测试替身的端口名
pub const DUMMY_PORT_NAME: &str = "dummy";

/// 测试替身设备
pub struct RoombaDummy {
    packets: Vec<SensorPacket>,
    ctx: RoombaContext,
    opened: AtomicBool,
    out: Mutex<Box<dyn Write + Send>>,
}

impl RoombaDummy {
    /// 输出到 stdout
    pub fn new(packets: &[SensorPacket]) -> Self {
        Self::with_writer(packets, std::io::stdout())
    }

    /// 输出到指定 writer
    pub fn with_writer(packets: &[SensorPacket], out: impl Write + Send + 'static) -> Self {
        Self {
            packets: packets.to_vec(),
            ctx: RoombaContext::new(packets.len()),
            opened: AtomicBool::new(false),
            out: Mutex::new(Box::new(out)),
        }
    }

    /// 手动注入一组传感器数据
    ///
    /// 长度与请求的数据包数量不符时忽略并返回 `false`；否则更新快照、
    /// 标记为新鲜并调用监听器。
    pub fn inject_sensor_data(&self, values: &[i32]) -> bool {
        trace!("Dummy sensor data injected: {:?}", values);
        self.ctx.publish(values)
    }

    /// 输出失败次数计入 `device_errors`
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 写出调用描述，输出失败不影响调用结果
    fn report(&self, lines: &[String]) {
        let mut out = self.out.lock();
        let result = lines
            .iter()
            .try_for_each(|line| writeln!(out, "{}", line))
            .and_then(|()| out.flush());
        if let Err(e) = result {
            self.ctx.metrics.device_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Dummy device failed to write its report: {}", e);
        }
    }

    fn check_open(&self) -> Result<(), DriverError> {
        if self.opened.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(DriverError::NotOpen)
        }
    }
}

impl RoombaDevice for RoombaDummy {
    fn open(&self, _safe_mode: bool) -> Result<(), DriverError> {
        if self.opened.swap(true, Ordering::AcqRel) {
            return Err(DriverError::AlreadyOpen);
        }
        self.report(&["Dummy port opened.".to_string()]);
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        if !self.opened.swap(false, Ordering::AcqRel) {
            return Err(DriverError::NotOpen);
        }
        self.report(&["Dummy port closed.".to_string()]);
        Ok(())
    }

    fn drive(&self, velocity: i16, radius: i16) -> Result<(), DriverError> {
        self.check_open()?;
        self.report(&[
            "Dummy drive command sent.".to_string(),
            format!("    Velocity: {}", velocity),
            format!("    Radius: {}", radius),
        ]);
        Ok(())
    }

    fn motors(
        &self,
        side_brush: bool,
        side_brush_clockwise: bool,
        main_brush: bool,
        main_brush_outward: bool,
        vacuum: bool,
    ) -> Result<(), DriverError> {
        self.check_open()?;
        self.report(&[
            "Dummy motors command sent.".to_string(),
            format!("    Side Brush: {}", side_brush),
            format!("    Side Brush Clockwise: {}", side_brush_clockwise),
            format!("    Main Brush: {}", main_brush),
            format!("    Main Brush Outward: {}", main_brush_outward),
            format!("    Vacuum: {}", vacuum),
        ]);
        Ok(())
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
        DUMMY_PORT_NAME
    }

    fn is_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    fn sensor_packets_requested(&self) -> Vec<SensorPacket> {
        self.packets.clone()
    }
}
