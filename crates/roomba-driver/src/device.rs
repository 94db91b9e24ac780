//! 设备接口
//!
//! [`RoombaDevice`] 是上层应用看到的唯一接口，有两个实现：
//! - [`RoombaSerial`](crate::RoombaSerial): 通过串口连接真实设备
//! - [`RoombaDummy`](crate::RoombaDummy): 无硬件的测试替身，把每次调用打印出来
//!
//! 所有方法都只需要 `&self`，设备可以放进 `Arc` 与监听器共享。

use crate::error::DriverError;
use crate::hooks::SensorPacketListener;
use roomba_protocol::{
    DriveCommand, RADIUS_STRAIGHT, RADIUS_TURN_CLOCKWISE, RADIUS_TURN_COUNTER_CLOCKWISE,
    SensorPacket,
};
use std::sync::Arc;

/// Roomba 设备接口
///
/// # 状态
///
/// 设备创建后处于关闭状态。`open` 成功后进入打开状态，`close` 后回到关闭状态
/// （即使关闭过程中传输出错）。
///
/// # 传感器数据
///
/// `sensor_data()` 总是返回最近一次解码的值（按请求顺序），无论是否新鲜；
/// 新鲜与否由 `sensor_data_is_valid()` 判断。
pub trait RoombaDevice: Send + Sync {
    /// 打开接口，进入 Safe（`safe_mode = true`）或 Full 模式并开始数据流
    ///
    /// # 错误
    /// - `DriverError::AlreadyOpen`: 已打开
    /// - `DriverError::Transport`: 连接或写入失败，设备保持关闭
    fn open(&self, safe_mode: bool) -> Result<(), DriverError>;

    /// 停止数据流，回到 Passive 模式并释放连接
    ///
    /// # 错误
    /// - `DriverError::NotOpen`: 未打开
    /// - `DriverError::Transport`: 写入失败（设备仍然进入关闭状态）
    fn close(&self) -> Result<(), DriverError>;

    /// 驱动轮控制
    ///
    /// 速度限幅到 [-500, 500] mm/s，半径限幅到 [-2000, 2000] mm；
    /// 半径 32767 / -32768 表示直行，不限幅。
    fn drive(&self, velocity: i16, radius: i16) -> Result<(), DriverError>;

    /// 主刷、边刷、吸尘电机控制，开启时全速运行
    fn motors(
        &self,
        side_brush: bool,
        side_brush_clockwise: bool,
        main_brush: bool,
        main_brush_outward: bool,
        vacuum: bool,
    ) -> Result<(), DriverError>;

    /// 最新传感器快照的副本
    fn sensor_data(&self) -> Vec<i32>;

    /// 最新快照是否新鲜
    fn sensor_data_is_valid(&self) -> bool;

    /// 注册监听器（替换之前的监听器）
    fn set_sensor_packet_listener(&self, listener: Arc<dyn SensorPacketListener>);

    /// 构造时传入的端口名
    fn port_name(&self) -> &str;

    fn is_opened(&self) -> bool;

    /// 请求的传感器数据包（副本）
    fn sensor_packets_requested(&self) -> Vec<SensorPacket>;

    /// 直行
    fn drive_straight(&self, velocity: i16) -> Result<(), DriverError> {
        self.drive(velocity, RADIUS_STRAIGHT)
    }

    /// 原地旋转，`clockwise` 为 true 时顺时针
    fn turn_in_place(&self, velocity: i16, clockwise: bool) -> Result<(), DriverError> {
        let radius = if clockwise {
            RADIUS_TURN_CLOCKWISE
        } else {
            RADIUS_TURN_COUNTER_CLOCKWISE
        };
        self.drive(velocity, radius)
    }

    /// 停止驱动轮
    fn stop(&self) -> Result<(), DriverError> {
        let stop = DriveCommand::stop();
        self.drive(stop.velocity, stop.radius)
    }

    /// 按数据包查找最新值
    fn sensor_value(&self, packet: SensorPacket) -> Option<i32> {
        let index = self
            .sensor_packets_requested()
            .iter()
            .position(|p| *p == packet)?;
        self.sensor_data().get(index).copied()
    }
}
