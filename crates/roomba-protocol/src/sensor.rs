//! 传感器数据包目录
//!
//! 可在数据流中请求的全部传感器数据包。每个数据包由一个字节的 ID 唯一标识，
//! 并具有固定的字节宽度（1 或 2）和符号属性。
//!
//! 数据包含义参见 iRobot Roomba 500 Open Interface (OI) Specification。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// 传感器数据包（数据流可请求的子集）
///
/// 判别值即线上的数据包 ID。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
#[repr(u8)]
pub enum SensorPacket {
    BumpsAndWheelDrops = 7,
    Wall = 8,
    CliffLeft = 9,
    CliffFrontLeft = 10,
    CliffFrontRight = 11,
    CliffRight = 12,
    VirtualWall = 13,
    WheelOvercurrents = 14,
    DirtDetect = 15,
    InfraredCharacterOmni = 17,
    Buttons = 18,
    Distance = 19,
    Angle = 20,
    ChargingState = 21,
    Voltage = 22,
    Current = 23,
    Temperature = 24,
    BatteryCharge = 25,
    BatteryCapacity = 26,
    WallSignal = 27,
    CliffLeftSignal = 28,
    CliffFrontLeftSignal = 29,
    CliffFrontRightSignal = 30,
    CliffRightSignal = 31,
    ChargingSourcesAvailable = 34,
    OiMode = 35,
    SongNumber = 36,
    SongPlaying = 37,
    NumberOfStreamPackets = 38,
    RequestedVelocity = 39,
    RequestedRadius = 40,
    RequestedRightVelocity = 41,
    RequestedLeftVelocity = 42,
    RightEncoderCounts = 43,
    LeftEncoderCounts = 44,
    LightBumper = 45,
    LightBumpLeftSignal = 46,
    LightBumpFrontLeftSignal = 47,
    LightBumpCenterLeftSignal = 48,
    LightBumpCenterRightSignal = 49,
    LightBumpFrontRightSignal = 50,
    LightBumpRightSignal = 51,
    InfraredCharacterLeft = 52,
    InfraredCharacterRight = 53,
    LeftMotorCurrent = 54,
    RightMotorCurrent = 55,
    MainBrushMotorCurrent = 56,
    SideBrushMotorCurrent = 57,
    Stasis = 58,
}

/// 数据包静态描述：(字节宽度, 是否有符号, 名称, 描述)
type PacketSpec = (usize, bool, &'static str, &'static str);

impl SensorPacket {
    /// 目录中的全部数据包（按 ID 升序）
    pub const ALL: [SensorPacket; 49] = [
        Self::BumpsAndWheelDrops,
        Self::Wall,
        Self::CliffLeft,
        Self::CliffFrontLeft,
        Self::CliffFrontRight,
        Self::CliffRight,
        Self::VirtualWall,
        Self::WheelOvercurrents,
        Self::DirtDetect,
        Self::InfraredCharacterOmni,
        Self::Buttons,
        Self::Distance,
        Self::Angle,
        Self::ChargingState,
        Self::Voltage,
        Self::Current,
        Self::Temperature,
        Self::BatteryCharge,
        Self::BatteryCapacity,
        Self::WallSignal,
        Self::CliffLeftSignal,
        Self::CliffFrontLeftSignal,
        Self::CliffFrontRightSignal,
        Self::CliffRightSignal,
        Self::ChargingSourcesAvailable,
        Self::OiMode,
        Self::SongNumber,
        Self::SongPlaying,
        Self::NumberOfStreamPackets,
        Self::RequestedVelocity,
        Self::RequestedRadius,
        Self::RequestedRightVelocity,
        Self::RequestedLeftVelocity,
        Self::RightEncoderCounts,
        Self::LeftEncoderCounts,
        Self::LightBumper,
        Self::LightBumpLeftSignal,
        Self::LightBumpFrontLeftSignal,
        Self::LightBumpCenterLeftSignal,
        Self::LightBumpCenterRightSignal,
        Self::LightBumpFrontRightSignal,
        Self::LightBumpRightSignal,
        Self::InfraredCharacterLeft,
        Self::InfraredCharacterRight,
        Self::LeftMotorCurrent,
        Self::RightMotorCurrent,
        Self::MainBrushMotorCurrent,
        Self::SideBrushMotorCurrent,
        Self::Stasis,
    ];

    /// 按线上 ID 查找数据包
    ///
    /// # 错误
    /// - `ProtocolError::UnknownSensorPacket`: ID 不在目录中
    pub fn from_id(id: u8) -> Result<Self, ProtocolError> {
        Self::try_from_primitive(id).map_err(|e| ProtocolError::UnknownSensorPacket { id: e.number })
    }

    /// 线上数据包 ID
    #[inline]
    pub fn id(self) -> u8 {
        self.into()
    }

    /// 数据字节宽度（1 或 2）
    #[inline]
    pub fn length(self) -> usize {
        self.spec().0
    }

    /// 是否为有符号数据
    #[inline]
    pub fn signed(self) -> bool {
        self.spec().1
    }

    /// 常量风格名称（如 `BUMPS_AND_WHEEL_DROPS`），用于配置文件
    pub fn name(self) -> &'static str {
        self.spec().2
    }

    /// 人类可读描述
    pub fn description(self) -> &'static str {
        self.spec().3
    }

    /// 解码后的取值范围（闭区间）
    pub fn value_range(self) -> (i32, i32) {
        let bits = 8 * self.length() as u32;
        if self.signed() {
            (-(1 << (bits - 1)), (1 << (bits - 1)) - 1)
        } else {
            (0, (1 << bits) - 1)
        }
    }

    const fn spec(self) -> PacketSpec {
        match self {
            Self::BumpsAndWheelDrops => (1, false, "BUMPS_AND_WHEEL_DROPS", "Bumps and Wheel Drops"),
            Self::Wall => (1, false, "WALL", "Wall"),
            Self::CliffLeft => (1, false, "CLIFF_LEFT", "Cliff Left"),
            Self::CliffFrontLeft => (1, false, "CLIFF_FRONT_LEFT", "Cliff Front Left"),
            Self::CliffFrontRight => (1, false, "CLIFF_FRONT_RIGHT", "Cliff Front Right"),
            Self::CliffRight => (1, false, "CLIFF_RIGHT", "Cliff Right"),
            Self::VirtualWall => (1, false, "VIRTUAL_WALL", "Virtual Wall"),
            Self::WheelOvercurrents => (1, false, "WHEEL_OVERCURRENTS", "Wheel Overcurrents"),
            Self::DirtDetect => (1, false, "DIRT_DETECT", "Dirt Detect"),
            Self::InfraredCharacterOmni => {
                (1, false, "INFRARED_CHARACTER_OMNI", "Infrared Character Omni")
            },
            Self::Buttons => (1, false, "BUTTONS", "Buttons"),
            Self::Distance => (2, true, "DISTANCE", "Distance"),
            Self::Angle => (2, true, "ANGLE", "Angle"),
            Self::ChargingState => (1, false, "CHARGING_STATE", "Charging State"),
            Self::Voltage => (2, false, "VOLTAGE", "Voltage"),
            Self::Current => (2, true, "CURRENT", "Current"),
            Self::Temperature => (2, true, "TEMPERATURE", "Temperature"),
            Self::BatteryCharge => (2, false, "BATTERY_CHARGE", "Battery Charge"),
            Self::BatteryCapacity => (2, false, "BATTERY_CAPACITY", "Battery Capacity"),
            Self::WallSignal => (2, false, "WALL_SIGNAL", "Wall Signal"),
            Self::CliffLeftSignal => (2, false, "CLIFF_LEFT_SIGNAL", "Cliff Left Signal"),
            Self::CliffFrontLeftSignal => {
                (2, false, "CLIFF_FRONT_LEFT_SIGNAL", "Cliff Front Left Signal")
            },
            Self::CliffFrontRightSignal => {
                (2, false, "CLIFF_FRONT_RIGHT_SIGNAL", "Cliff Front Right Signal")
            },
            Self::CliffRightSignal => (2, false, "CLIFF_RIGHT_SIGNAL", "Cliff Right Signal"),
            Self::ChargingSourcesAvailable => {
                (1, false, "CHARGING_SOURCES_AVAILABLE", "Charging Sources Available")
            },
            Self::OiMode => (1, false, "OI_MODE", "OI Mode"),
            Self::SongNumber => (1, false, "SONG_NUMBER", "Song Number"),
            Self::SongPlaying => (1, false, "SONG_PLAYING", "Song Playing"),
            Self::NumberOfStreamPackets => {
                (1, false, "NUMBER_OF_STREAM_PACKETS", "Number of Stream Packets")
            },
            Self::RequestedVelocity => (2, true, "REQUESTED_VELOCITY", "Requested Velocity"),
            Self::RequestedRadius => (2, true, "REQUESTED_RADIUS", "Requested Radius"),
            Self::RequestedRightVelocity => {
                (2, true, "REQUESTED_RIGHT_VELOCITY", "Requested Right Velocity")
            },
            Self::RequestedLeftVelocity => {
                (2, true, "REQUESTED_LEFT_VELOCITY", "Requested Left Velocity")
            },
            Self::RightEncoderCounts => (2, false, "RIGHT_ENCODER_COUNTS", "Right Encoder Counts"),
            Self::LeftEncoderCounts => (2, false, "LEFT_ENCODER_COUNTS", "Left Encoder Counts"),
            Self::LightBumper => (1, false, "LIGHT_BUMPER", "Light Bumper"),
            Self::LightBumpLeftSignal => (2, false, "LIGHT_BUMP_LEFT_SIGNAL", "Light Bump Left"),
            Self::LightBumpFrontLeftSignal => {
                (2, false, "LIGHT_BUMP_FRONT_LEFT_SIGNAL", "Light Bump Front Left")
            },
            Self::LightBumpCenterLeftSignal => {
                (2, false, "LIGHT_BUMP_CENTER_LEFT_SIGNAL", "Light Bump Center Left")
            },
            Self::LightBumpCenterRightSignal => {
                (2, false, "LIGHT_BUMP_CENTER_RIGHT_SIGNAL", "Light Bump Center Right")
            },
            Self::LightBumpFrontRightSignal => {
                (2, false, "LIGHT_BUMP_FRONT_RIGHT_SIGNAL", "Light Bump Front Right")
            },
            Self::LightBumpRightSignal => (2, false, "LIGHT_BUMP_RIGHT_SIGNAL", "Light Bump Right"),
            Self::InfraredCharacterLeft => {
                (1, false, "INFRARED_CHARACTER_LEFT", "Infrared Character Left")
            },
            Self::InfraredCharacterRight => {
                (1, false, "INFRARED_CHARACTER_RIGHT", "Infrared Character Right")
            },
            Self::LeftMotorCurrent => (2, true, "LEFT_MOTOR_CURRENT", "Left Motor Current"),
            Self::RightMotorCurrent => (2, true, "RIGHT_MOTOR_CURRENT", "Right Motor Current"),
            Self::MainBrushMotorCurrent => {
                (2, true, "MAIN_BRUSH_MOTOR_CURRENT", "Main Brush Motor Current")
            },
            Self::SideBrushMotorCurrent => {
                (2, true, "SIDE_BRUSH_MOTOR_CURRENT", "Side Brush Motor Current")
            },
            Self::Stasis => (1, false, "STASIS", "Stasis"),
        }
    }
}

impl FromStr for SensorPacket {
    type Err = ProtocolError;

    /// 按常量风格名称解析（大小写不敏感，允许 `-` 代替 `_`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name() == normalized)
            .ok_or_else(|| ProtocolError::UnknownSensorPacketName(s.to_string()))
    }
}

impl fmt::Display for SensorPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
