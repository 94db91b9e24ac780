//! 控制命令帧构建
//!
//! 所有命令都是"发后即忘"的定长字节序列，协议没有命令应答。
//!
//! | 命令 | 字节 |
//! |---|---|
//! | Start（进入 Passive） | `[0x80]` |
//! | Safe 模式 | `[0x83]` |
//! | Full 模式 | `[0x84]` |
//! | 开始数据流 | `[0x94, N, id_1, …, id_N]` |
//! | 暂停数据流 | `[0x96, 0x00]` |
//! | 驱动 | `[0x89, velHi, velLo, radHi, radLo]` |
//! | 电机 | `[0x89, bits]` |

use crate::i16_to_bytes_be;
use crate::sensor::SensorPacket;
use bilge::prelude::*;
use smallvec::SmallVec;

/// Start 命令（进入 Passive 模式）
pub const OP_START: u8 = 0x80;
/// Safe 控制模式
pub const OP_SAFE: u8 = 0x83;
/// Full 控制模式
pub const OP_FULL: u8 = 0x84;
/// 驱动命令
pub const OP_DRIVE: u8 = 0x89;
/// 电机命令
///
/// 与驱动命令使用相同的操作码（沿用现有设备上的行为）。
pub const OP_MOTORS: u8 = 0x89;
/// 开始数据流
pub const OP_STREAM: u8 = 0x94;
/// 暂停/恢复数据流
pub const OP_PAUSE_RESUME_STREAM: u8 = 0x96;

/// 最大速度（mm/s）
pub const MAX_VELOCITY: i16 = 500;
/// 最大转弯半径（mm）
pub const MAX_RADIUS: i16 = 2000;
/// 特殊半径值：直行（正向表示）。不做限幅，原样透传。
pub const RADIUS_STRAIGHT: i16 = i16::MAX;
/// 特殊半径值：直行（负向表示）。不做限幅，原样透传。
pub const RADIUS_STRAIGHT_NEGATIVE: i16 = i16::MIN;
/// 原地顺时针转
pub const RADIUS_TURN_CLOCKWISE: i16 = -1;
/// 原地逆时针转
pub const RADIUS_TURN_COUNTER_CLOCKWISE: i16 = 1;

/// 命令字节缓冲区
///
/// 栈上预留 8 字节，覆盖除长数据流请求外的所有命令，避免堆分配。
pub type CommandBytes = SmallVec<[u8; 8]>;

/// 控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OiMode {
    /// Passive：仅接收传感器数据
    Passive,
    /// Safe：允许控制，保留悬崖/轮落安全保护
    Safe,
    /// Full：完全控制，无安全保护
    Full,
}

impl OiMode {
    /// 根据 `safe_mode` 选择控制模式
    pub fn control(safe_mode: bool) -> Self {
        if safe_mode { Self::Safe } else { Self::Full }
    }

    /// 模式切换命令的操作码
    pub fn opcode(self) -> u8 {
        match self {
            Self::Passive => OP_START,
            Self::Safe => OP_SAFE,
            Self::Full => OP_FULL,
        }
    }

    /// 转换为命令字节
    pub fn to_bytes(self) -> CommandBytes {
        CommandBytes::from_slice(&[self.opcode()])
    }
}

/// 驱动命令 (0x89)
///
/// 构造时对速度和半径限幅：
/// - 速度：[-500, 500] mm/s
/// - 半径：[-2000, 2000] mm，特殊值 `RADIUS_STRAIGHT` / `RADIUS_STRAIGHT_NEGATIVE` 除外
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveCommand {
    /// 速度（mm/s），正值前进
    pub velocity: i16,
    /// 转弯半径（mm），正值左转，负值右转
    pub radius: i16,
}

impl DriveCommand {
    /// 创建驱动命令（自动限幅）
    pub fn new(velocity: i16, radius: i16) -> Self {
        Self {
            velocity: velocity.clamp(-MAX_VELOCITY, MAX_VELOCITY),
            radius: clamp_radius(radius),
        }
    }

    /// 直行
    pub fn straight(velocity: i16) -> Self {
        Self::new(velocity, RADIUS_STRAIGHT)
    }

    /// 停止
    pub fn stop() -> Self {
        Self::new(0, 0)
    }

    /// 转换为命令字节
    pub fn to_bytes(self) -> CommandBytes {
        let mut bytes = CommandBytes::new();
        bytes.push(OP_DRIVE);
        bytes.extend_from_slice(&i16_to_bytes_be(self.velocity));
        bytes.extend_from_slice(&i16_to_bytes_be(self.radius));
        bytes
    }
}

fn clamp_radius(radius: i16) -> i16 {
    match radius {
        RADIUS_STRAIGHT | RADIUS_STRAIGHT_NEGATIVE => radius,
        r => r.clamp(-MAX_RADIUS, MAX_RADIUS),
    }
}

/// 电机控制位域
///
/// 设备约定：位为 0 表示"开"，位为 1 表示"关"。
/// - Bit 0: 边刷关闭
/// - Bit 1: 吸尘关闭
/// - Bit 2: 主刷关闭
/// - Bit 3: 边刷非顺时针
/// - Bit 4: 主刷非向外
/// - Bit 5-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default)]
pub struct MotorBits {
    pub side_brush_off: bool,
    pub vacuum_off: bool,
    pub main_brush_off: bool,
    pub side_brush_counter_clockwise: bool,
    pub main_brush_inward: bool,
    pub reserved: u3,
}

/// 电机命令
///
/// 控制主刷、边刷和吸尘电机的开关及方向。开启时以全速运行。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorsCommand {
    pub side_brush: bool,
    pub side_brush_clockwise: bool,
    pub main_brush: bool,
    pub main_brush_outward: bool,
    pub vacuum: bool,
}

impl MotorsCommand {
    pub fn new(
        side_brush: bool,
        side_brush_clockwise: bool,
        main_brush: bool,
        main_brush_outward: bool,
        vacuum: bool,
    ) -> Self {
        Self {
            side_brush,
            side_brush_clockwise,
            main_brush,
            main_brush_outward,
            vacuum,
        }
    }

    /// 全部电机关闭（方向位按"非"处理）
    pub fn all_off() -> Self {
        Self::default()
    }

    /// 编码为位域（0 表示开）
    pub fn bits(self) -> MotorBits {
        let mut bits = MotorBits::from(u8::new(0));
        bits.set_side_brush_off(!self.side_brush);
        bits.set_vacuum_off(!self.vacuum);
        bits.set_main_brush_off(!self.main_brush);
        bits.set_side_brush_counter_clockwise(!self.side_brush_clockwise);
        bits.set_main_brush_inward(!self.main_brush_outward);
        bits
    }

    /// 转换为命令字节
    pub fn to_bytes(self) -> CommandBytes {
        CommandBytes::from_slice(&[OP_MOTORS, u8::from(self.bits()).value()])
    }
}

/// 开始数据流命令 (0x94)
///
/// 请求设备每 15ms 连续发送一次所列传感器数据包。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCommand {
    packets: Vec<SensorPacket>,
}

impl StreamCommand {
    pub fn new(packets: &[SensorPacket]) -> Self {
        Self {
            packets: packets.to_vec(),
        }
    }

    pub fn packets(&self) -> &[SensorPacket] {
        &self.packets
    }

    /// 转换为命令字节：`[0x94, N, id_1, …, id_N]`
    ///
    /// 设备协议中 N 为单字节，列表长度超过 255 时截断。驱动在打开前通过
    /// [`StreamLayout::check_streamable`](crate::StreamLayout::check_streamable) 拒绝此类请求。
    pub fn to_bytes(&self) -> CommandBytes {
        let count = self.packets.len().min(u8::MAX as usize);
        let mut bytes = CommandBytes::with_capacity(count + 2);
        bytes.push(OP_STREAM);
        bytes.push(count as u8);
        bytes.extend(self.packets[..count].iter().map(|p| p.id()));
        bytes
    }
}

/// 暂停数据流命令：`[0x96, 0x00]`
pub fn pause_stream_bytes() -> CommandBytes {
    CommandBytes::from_slice(&[OP_PAUSE_RESUME_STREAM, 0x00])
}

/// 关闭接口时发送的命令：暂停数据流并回到 Passive 模式
pub fn shutdown_bytes() -> CommandBytes {
    let mut bytes = pause_stream_bytes();
    bytes.extend_from_slice(&OiMode::Passive.to_bytes());
    bytes
}
