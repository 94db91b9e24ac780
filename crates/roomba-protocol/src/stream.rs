//! 传感器数据流解析
//!
//! 设备在收到开始数据流命令后，每 15ms 发送一帧：
//!
//! ```text
//! [0x13][n-bytes][id_1][data_1…][id_2][data_2…]…[checksum]
//! ```
//!
//! - `n-bytes` = Σ(1 + 数据宽度)，即 ID 与数据字节的总数
//! - 帧内所有字节（**包括帧头**）之和的低 8 位必须为 0
//!
//! 设备文档称校验和不含帧头，但实测设备计算时包含帧头 0x13，此处以实测为准。
//!
//! # 重同步
//!
//! 字节流可能从帧中间开始，也可能含有损坏字节。[`SensorStreamParser`] 只在缓冲区
//! 首字节处尝试匹配一帧，失败时仅丢弃一个字节，因此单字节损坏最多损失一帧。

use crate::ProtocolError;
use crate::sensor::SensorPacket;
use std::collections::VecDeque;

/// 数据流帧头
pub const SENSOR_STREAM_HEADER: u8 = 0x13;

/// 帧头、长度字节、校验和字节
const FRAME_OVERHEAD: usize = 3;

/// 长度字节可表示的最大负载
pub const MAX_STREAM_PAYLOAD: usize = u8::MAX as usize;

/// 计算字节和的低 8 位
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// 计算使整帧字节和为 0 的校验字节
#[inline]
pub fn checksum_byte(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(checksum(bytes))
}

/// 候选帧被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejection {
    /// 缓冲数据不足一帧
    Incomplete { expected: usize, actual: usize },
    /// 首字节不是帧头
    NotHeader { byte: u8 },
    /// 长度字节与请求的数据包不符
    LengthMismatch { expected: usize, actual: u8 },
    /// 第 `index` 个数据包的 ID 不符
    PacketIdMismatch { index: usize, expected: u8, actual: u8 },
    /// 字节和不为 0
    Checksum { sum: u8 },
}

/// 数据流帧布局
///
/// 由请求的数据包列表确定：帧长、各 ID 偏移以及解码顺序。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLayout {
    packets: Vec<SensorPacket>,
    frame_length: usize,
}

impl StreamLayout {
    pub fn new(packets: &[SensorPacket]) -> Self {
        let frame_length =
            FRAME_OVERHEAD + packets.iter().map(|p| 1 + p.length()).sum::<usize>();
        Self {
            packets: packets.to_vec(),
            frame_length,
        }
    }

    /// 请求的数据包（按请求顺序）
    pub fn packets(&self) -> &[SensorPacket] {
        &self.packets
    }

    /// 完整帧长度（字节）：3 + Σ(1 + 宽度)
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// 长度字节应有的值
    pub fn payload_length(&self) -> usize {
        self.frame_length - FRAME_OVERHEAD
    }

    /// 检查设备能否按本布局发送数据流
    ///
    /// 负载超过 255 字节时长度字节无法表示，设备不会发出可解码的帧。
    /// 每个数据包至少占 2 字节，因此数据包数量超过 255 的布局也在此被拒绝。
    pub fn check_streamable(&self) -> Result<(), ProtocolError> {
        if self.payload_length() > MAX_STREAM_PAYLOAD {
            return Err(ProtocolError::StreamTooLong {
                count: self.packets.len(),
                payload: self.payload_length(),
                max: MAX_STREAM_PAYLOAD,
            });
        }
        Ok(())
    }

    /// 校验 `candidate` 开头的一帧
    ///
    /// 只检查前 `frame_length` 字节，后续字节被忽略。
    pub fn validate(&self, candidate: &[u8]) -> Result<(), FrameRejection> {
        if candidate.len() < self.frame_length {
            return Err(FrameRejection::Incomplete {
                expected: self.frame_length,
                actual: candidate.len(),
            });
        }
        let frame = &candidate[..self.frame_length];

        if frame[0] != SENSOR_STREAM_HEADER {
            return Err(FrameRejection::NotHeader { byte: frame[0] });
        }
        if frame[1] as usize != self.payload_length() {
            return Err(FrameRejection::LengthMismatch {
                expected: self.payload_length(),
                actual: frame[1],
            });
        }

        let mut offset = 2;
        for (index, packet) in self.packets.iter().enumerate() {
            if frame[offset] != packet.id() {
                return Err(FrameRejection::PacketIdMismatch {
                    index,
                    expected: packet.id(),
                    actual: frame[offset],
                });
            }
            offset += 1 + packet.length();
        }

        let sum = checksum(frame);
        if sum != 0 {
            return Err(FrameRejection::Checksum { sum });
        }
        Ok(())
    }

    /// 解码已校验的一帧，结果按请求顺序写入 `out`
    ///
    /// 数据高位在前；有符号数据按二进制补码解释。
    ///
    /// # Panics
    /// `frame` 短于帧长或 `out` 短于数据包数量时 panic，调用方须先 [`validate`](Self::validate)。
    pub fn decode_into(&self, frame: &[u8], out: &mut [i32]) {
        let mut offset = 2;
        for (slot, packet) in out.iter_mut().zip(self.packets.iter()) {
            offset += 1; // 数据包 ID
            let width = packet.length();
            let mut value: i32 = 0;
            for byte in &frame[offset..offset + width] {
                value = (value << 8) | i32::from(*byte);
            }
            if packet.signed() && value >= 1 << (8 * width - 1) {
                value -= 1 << (8 * width);
            }
            *slot = value;
            offset += width;
        }
    }

    /// 解码已校验的一帧
    pub fn decode(&self, frame: &[u8]) -> Vec<i32> {
        let mut values = vec![0; self.packets.len()];
        self.decode_into(frame, &mut values);
        values
    }

    /// 按本布局构造一帧（含校验和）
    ///
    /// 用于测试与设备模拟。
    ///
    /// # 错误
    /// - `ProtocolError::InvalidLength`: 数值个数与数据包数量不符
    /// - `ProtocolError::ValueOutOfRange`: 数值超出数据包可表示范围
    /// - `ProtocolError::StreamTooLong`: 负载超出长度字节范围
    pub fn encode(&self, values: &[i32]) -> Result<Vec<u8>, ProtocolError> {
        self.check_streamable()?;
        if values.len() != self.packets.len() {
            return Err(ProtocolError::InvalidLength {
                expected: self.packets.len(),
                actual: values.len(),
            });
        }

        let mut frame = Vec::with_capacity(self.frame_length);
        frame.push(SENSOR_STREAM_HEADER);
        // check_streamable 保证不截断
        frame.push(self.payload_length() as u8);
        for (packet, &value) in self.packets.iter().zip(values) {
            let (min, max) = packet.value_range();
            if value < min || value > max {
                return Err(ProtocolError::ValueOutOfRange {
                    packet: packet.name(),
                    value,
                });
            }
            frame.push(packet.id());
            let be = (value as u32).to_be_bytes();
            frame.extend_from_slice(&be[4 - packet.length()..]);
        }
        frame.push(checksum_byte(&frame));
        Ok(frame)
    }
}

/// 解析统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// 累计收到的字节数
    pub bytes_received: u64,
    /// 成功解码的帧数
    pub frames_decoded: u64,
    /// 重同步时丢弃的字节数
    pub bytes_discarded: u64,
    /// 以帧头开始但校验失败的候选帧数
    pub candidates_rejected: u64,
}

/// 数据流重同步解析器
///
/// 持有一个无界累积缓冲区。每次 [`push`](Self::push) 后，反复调用
/// [`next_frame`](Self::next_frame) 取出所有已完整缓冲的帧。
///
/// # Example
///
/// ```
/// use roomba_protocol::{SensorPacket, SensorStreamParser};
///
/// let mut parser =
///     SensorStreamParser::new(&[SensorPacket::BumpsAndWheelDrops, SensorPacket::Distance]);
/// parser.push(&[0x00, 0x13, 0x05, 0x07, 0x02, 0x13, 0x13, 0x00, 0xB9]);
/// assert_eq!(parser.next_frame(), Some(&[2, 0x1300][..]));
/// assert_eq!(parser.next_frame(), None);
/// ```
#[derive(Debug)]
pub struct SensorStreamParser {
    layout: StreamLayout,
    buffer: VecDeque<u8>,
    values: Vec<i32>,
    stats: ParserStats,
}

impl SensorStreamParser {
    pub fn new(packets: &[SensorPacket]) -> Self {
        Self::with_layout(StreamLayout::new(packets))
    }

    pub fn with_layout(layout: StreamLayout) -> Self {
        let values = vec![0; layout.packets().len()];
        Self {
            buffer: VecDeque::with_capacity(layout.frame_length() * 4),
            layout,
            values,
            stats: ParserStats::default(),
        }
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    /// 追加收到的字节
    pub fn push(&mut self, bytes: &[u8]) {
        self.stats.bytes_received += bytes.len() as u64;
        self.buffer.extend(bytes);
    }

    /// 取出下一帧
    ///
    /// 缓冲区不足一帧时返回 `None`，剩余字节保留到下次 `push`。
    /// 返回的切片按请求顺序给出解码值，在下次调用前有效。
    pub fn next_frame(&mut self) -> Option<&[i32]> {
        let frame_length = self.layout.frame_length();

        while self.buffer.len() >= frame_length {
            // 快速跳过非帧头字节
            if self.buffer[0] != SENSOR_STREAM_HEADER {
                self.discard_front();
                continue;
            }

            let frame = &self.buffer.make_contiguous()[..frame_length];
            match self.layout.validate(frame) {
                Ok(()) => {
                    self.layout.decode_into(frame, &mut self.values);
                    self.buffer.drain(..frame_length);
                    self.stats.frames_decoded += 1;
                    return Some(&self.values);
                },
                Err(_) => {
                    // 帧头是误判，只丢弃一个字节
                    self.stats.candidates_rejected += 1;
                    self.discard_front();
                },
            }
        }
        None
    }

    fn discard_front(&mut self) {
        self.buffer.pop_front();
        self.stats.bytes_discarded += 1;
    }

    /// 当前缓冲的字节数
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// 清空缓冲区（统计保留）
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }
}
