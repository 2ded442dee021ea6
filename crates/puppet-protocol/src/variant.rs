//! 协议变体
//!
//! 现场使用的舵机家族在同步字节、校验方式、指令码上互不兼容。
//! 总线构造时选定一个变体，之后所有指令帧都由该变体生成，调用点不再硬编码。
//!
//! | 变体 | 同步字节 | 默认校验 | 写位置 | 读位置 |
//! |------|----------|----------|--------|--------|
//! | `Feetech` | `0xFF` | 取反累加 | `0x03` WRITE @ 0x2A | `0x02` READ @ 0x38 |
//! | `LxBus` | `0x55` | 累加 | `0x01` MOVE_TIME_WRITE | `0x1C` POS_READ |

use crate::{ChecksumPolicy, Frame, FrameCodec, ProtocolError, ServoId};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Feetech STS/SCS 指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FeetechInstruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
    RegWrite = 0x04,
    Action = 0x05,
    SyncWrite = 0x83,
}

/// Feetech STS 系列寄存器地址
pub mod feetech_register {
    /// 目标位置（2 字节，后接运行时间 2 字节、运行速度 2 字节）
    pub const GOAL_POSITION: u8 = 0x2A;
    /// 当前位置（2 字节）
    pub const PRESENT_POSITION: u8 = 0x38;
}

/// LX 总线指令码
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum LxCommand {
    MoveTimeWrite = 0x01,
    IdRead = 0x0E,
    PosRead = 0x1C,
}

/// 读位置应答中位置字段在参数区内的偏移（两种变体相同）
pub const POSITION_OFFSET: usize = 0;

/// 协议变体（舵机家族）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ProtocolVariant {
    /// Feetech STS/SCS 家族（如嘴部 STS3215）
    #[default]
    Feetech,
    /// 0x55 同步字节的 LX 总线家族
    LxBus,
}

/// 读位置应答的解析结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionReply {
    /// 当前位置（厂商单位）
    pub position: u16,
    /// 舵机状态字节（Feetech 应答的错误位；LX 总线恒为 0）
    pub status: u8,
}

impl ProtocolVariant {
    /// 同步字节
    pub const fn sync_byte(self) -> u8 {
        match self {
            ProtocolVariant::Feetech => 0xFF,
            ProtocolVariant::LxBus => 0x55,
        }
    }

    /// 默认校验策略
    pub const fn default_checksum(self) -> ChecksumPolicy {
        match self {
            ProtocolVariant::Feetech => ChecksumPolicy::Inverted,
            ProtocolVariant::LxBus => ChecksumPolicy::Additive,
        }
    }

    /// 变体默认编解码器
    pub const fn codec(self) -> FrameCodec {
        FrameCodec::new(self)
    }

    /// 变体名称
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolVariant::Feetech => "feetech",
            ProtocolVariant::LxBus => "lx_bus",
        }
    }

    /// 构建"写目标位置"帧
    ///
    /// 位置与运行时间均为小端序。该指令不产生应答帧。
    pub fn write_position_frame(self, id: ServoId, position: u16, duration_ms: u16) -> Frame {
        let [pos_lo, pos_hi] = position.to_le_bytes();
        let [time_lo, time_hi] = duration_ms.to_le_bytes();
        match self {
            ProtocolVariant::Feetech => Frame::from_parts(
                id.get(),
                FeetechInstruction::Write.into(),
                // 运行速度 0 表示由运行时间决定
                &[
                    feetech_register::GOAL_POSITION,
                    pos_lo,
                    pos_hi,
                    time_lo,
                    time_hi,
                    0,
                    0,
                ],
            ),
            ProtocolVariant::LxBus => Frame::from_parts(
                id.get(),
                LxCommand::MoveTimeWrite.into(),
                &[pos_lo, pos_hi, time_lo, time_hi],
            ),
        }
    }

    /// 构建"读当前位置"帧
    pub fn read_position_frame(self, id: ServoId) -> Frame {
        match self {
            ProtocolVariant::Feetech => Frame::from_parts(
                id.get(),
                FeetechInstruction::Read.into(),
                &[feetech_register::PRESENT_POSITION, 2],
            ),
            ProtocolVariant::LxBus => Frame::from_parts(id.get(), LxCommand::PosRead.into(), &[]),
        }
    }

    /// 构建 Ping 帧（LX 总线使用 ID_READ 作为存活探测）
    pub fn ping_frame(self, id: ServoId) -> Frame {
        match self {
            ProtocolVariant::Feetech => {
                Frame::from_parts(id.get(), FeetechInstruction::Ping.into(), &[])
            },
            ProtocolVariant::LxBus => Frame::from_parts(id.get(), LxCommand::IdRead.into(), &[]),
        }
    }

    /// 解析读位置应答
    ///
    /// # 错误
    /// - `ProtocolError::UnexpectedReply`: 应答地址不符、指令码不符或参数区过短
    pub fn parse_position_reply(
        self,
        id: ServoId,
        reply: &Frame,
    ) -> Result<PositionReply, ProtocolError> {
        if reply.address() != id.get() {
            return Err(ProtocolError::UnexpectedReply {
                address: reply.address(),
                reason: format!("expected reply from {}", id),
            });
        }

        let status = match self {
            ProtocolVariant::Feetech => reply.command(),
            ProtocolVariant::LxBus => {
                if reply.command() != u8::from(LxCommand::PosRead) {
                    return Err(ProtocolError::UnexpectedReply {
                        address: reply.address(),
                        reason: format!("unexpected command 0x{:02X}", reply.command()),
                    });
                }
                0
            },
        };

        let params = reply.params();
        if params.len() < POSITION_OFFSET + 2 {
            return Err(ProtocolError::UnexpectedReply {
                address: reply.address(),
                reason: format!("position field missing ({} param bytes)", params.len()),
            });
        }

        let position =
            u16::from_le_bytes([params[POSITION_OFFSET], params[POSITION_OFFSET + 1]]);
        Ok(PositionReply { position, status })
    }

    /// 构建读位置应答帧（舵机侧视角，用于模拟器与测试）
    pub fn position_reply_frame(self, id: ServoId, position: u16) -> Frame {
        let [lo, hi] = position.to_le_bytes();
        match self {
            ProtocolVariant::Feetech => Frame::from_parts(id.get(), 0x00, &[lo, hi]),
            ProtocolVariant::LxBus => {
                Frame::from_parts(id.get(), LxCommand::PosRead.into(), &[lo, hi])
            },
        }
    }

    /// 从"写目标位置"帧中取出目标位置（模拟器与测试使用）
    ///
    /// 不是写位置帧时返回 `None`。
    pub fn decode_write_position(self, frame: &Frame) -> Option<u16> {
        let params = frame.params();
        match self {
            ProtocolVariant::Feetech => {
                let is_write = frame.command() == u8::from(FeetechInstruction::Write);
                if is_write
                    && params.len() >= 3
                    && params[0] == feetech_register::GOAL_POSITION
                {
                    Some(u16::from_le_bytes([params[1], params[2]]))
                } else {
                    None
                }
            },
            ProtocolVariant::LxBus => {
                if frame.command() == u8::from(LxCommand::MoveTimeWrite) && params.len() >= 2 {
                    Some(u16::from_le_bytes([params[0], params[1]]))
                } else {
                    None
                }
            },
        }
    }

    /// 是否为读位置指令
    pub fn is_read_position(self, frame: &Frame) -> bool {
        match self {
            ProtocolVariant::Feetech => {
                frame.command() == u8::from(FeetechInstruction::Read)
                    && frame.params().first() == Some(&feetech_register::PRESENT_POSITION)
            },
            ProtocolVariant::LxBus => frame.command() == u8::from(LxCommand::PosRead),
        }
    }

    /// 是否为 Ping 指令
    pub fn is_ping(self, frame: &Frame) -> bool {
        match self {
            ProtocolVariant::Feetech => frame.command() == u8::from(FeetechInstruction::Ping),
            ProtocolVariant::LxBus => frame.command() == u8::from(LxCommand::IdRead),
        }
    }
}

impl std::fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ProtocolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feetech" | "sts" | "scs" => Ok(ProtocolVariant::Feetech),
            "lx_bus" | "lx" => Ok(ProtocolVariant::LxBus),
            other => Err(format!("unknown protocol variant: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ServoId {
        ServoId::new(n).unwrap()
    }

    #[test]
    fn test_feetech_write_position_bytes() {
        let variant = ProtocolVariant::Feetech;
        let bytes = variant
            .codec()
            .encode(&variant.write_position_frame(id(6), 2000, 10));
        // FF FF 06 09 03 2A D0 07 0A 00 00 00 CHK
        assert_eq!(
            &bytes[..12],
            &[0xFF, 0xFF, 0x06, 0x09, 0x03, 0x2A, 0xD0, 0x07, 0x0A, 0x00, 0x00, 0x00]
        );
        let sum: u32 = bytes[2..12].iter().map(|&b| b as u32).sum();
        assert_eq!(bytes[12], !(sum as u8));
    }

    #[test]
    fn test_lx_write_position_bytes() {
        let variant = ProtocolVariant::LxBus;
        let bytes = variant
            .codec()
            .encode(&variant.write_position_frame(id(1), 500, 1000));
        assert_eq!(
            &bytes[..9],
            &[0x55, 0x55, 0x01, 0x06, 0x01, 0xF4, 0x01, 0xE8, 0x03]
        );
    }

    #[test]
    fn test_read_position_frames() {
        let frame = ProtocolVariant::Feetech.read_position_frame(id(2));
        assert_eq!(frame.command(), 0x02);
        assert_eq!(frame.params(), &[0x38, 0x02]);
        assert!(ProtocolVariant::Feetech.is_read_position(&frame));

        let frame = ProtocolVariant::LxBus.read_position_frame(id(2));
        assert_eq!(frame.command(), 0x1C);
        assert!(frame.params().is_empty());
        assert!(ProtocolVariant::LxBus.is_read_position(&frame));
    }

    #[test]
    fn test_parse_feetech_reply() {
        // 应答：FF FF 01 04 00 B0 04 CHK -> 位置 1200
        let reply = Frame::new(1, 0x00, &[0xB0, 0x04]).unwrap();
        let parsed = ProtocolVariant::Feetech
            .parse_position_reply(id(1), &reply)
            .unwrap();
        assert_eq!(parsed.position, 1200);
        assert_eq!(parsed.status, 0);
    }

    #[test]
    fn test_parse_reply_carries_status() {
        let reply = Frame::new(1, 0x20, &[0xB0, 0x04]).unwrap();
        let parsed = ProtocolVariant::Feetech
            .parse_position_reply(id(1), &reply)
            .unwrap();
        assert_eq!(parsed.status, 0x20);
    }

    #[test]
    fn test_parse_reply_wrong_address() {
        let reply = ProtocolVariant::Feetech.position_reply_frame(id(2), 100);
        let err = ProtocolVariant::Feetech
            .parse_position_reply(id(1), &reply)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedReply { address: 2, .. }));
    }

    #[test]
    fn test_parse_reply_too_short() {
        let reply = Frame::new(1, 0x00, &[0xB0]).unwrap();
        assert!(
            ProtocolVariant::Feetech
                .parse_position_reply(id(1), &reply)
                .is_err()
        );
    }

    #[test]
    fn test_parse_lx_reply_wrong_command() {
        let reply = Frame::new(1, 0x01, &[0xB0, 0x04]).unwrap();
        assert!(
            ProtocolVariant::LxBus
                .parse_position_reply(id(1), &reply)
                .is_err()
        );
    }

    #[test]
    fn test_decode_write_position() {
        for variant in [ProtocolVariant::Feetech, ProtocolVariant::LxBus] {
            let frame = variant.write_position_frame(id(4), 1794, 4);
            assert_eq!(variant.decode_write_position(&frame), Some(1794));
            let read = variant.read_position_frame(id(4));
            assert_eq!(variant.decode_write_position(&read), None);
        }
    }

    #[test]
    fn test_position_reply_roundtrip() {
        for variant in [ProtocolVariant::Feetech, ProtocolVariant::LxBus] {
            let reply = variant.position_reply_frame(id(9), 4095);
            let parsed = variant.parse_position_reply(id(9), &reply).unwrap();
            assert_eq!(parsed.position, 4095);
        }
    }

    #[test]
    fn test_ping_frames() {
        assert!(ProtocolVariant::Feetech.is_ping(&ProtocolVariant::Feetech.ping_frame(id(1))));
        assert!(ProtocolVariant::LxBus.is_ping(&ProtocolVariant::LxBus.ping_frame(id(1))));
    }

    #[test]
    fn test_variant_from_str() {
        assert_eq!("feetech".parse::<ProtocolVariant>(), Ok(ProtocolVariant::Feetech));
        assert_eq!("lx".parse::<ProtocolVariant>(), Ok(ProtocolVariant::LxBus));
        assert!("dynamixel".parse::<ProtocolVariant>().is_err());
    }

    #[test]
    fn test_instruction_try_from() {
        assert_eq!(
            FeetechInstruction::try_from(0x03).unwrap(),
            FeetechInstruction::Write
        );
        assert!(FeetechInstruction::try_from(0x7F).is_err());
        assert_eq!(LxCommand::try_from(0x1C).unwrap(), LxCommand::PosRead);
    }
}
