//! # Puppet Protocol
//!
//! 串行总线舵机的帧协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: 舵机地址（`ServoId`）与保留地址常量
//! - `checksum`: 校验和策略（累加 / 取反累加）
//! - `codec`: 帧编码与解码
//! - `variant`: 舵机家族的协议变体（同步字节、指令码、寄存器）
//! - `assembler`: 流式字节到帧的组装（带重新同步）
//! - `model`: 舵机型号标签与默认位置范围
//!
//! ## 帧格式
//!
//! ```text
//! [SYNC, SYNC, ADDR, LEN, CMD, PARAM..., CHK]
//! LEN = len(PARAM) + 2
//! CHK = f(ADDR + LEN + CMD + ΣPARAM)，f 由 ChecksumPolicy 决定
//! ```
//!
//! ## 字节序
//!
//! 位置、时间等 16 位字段均为小端序（低字节在前）。

pub mod assembler;
pub mod checksum;
pub mod codec;
pub mod ids;
pub mod model;
pub mod variant;

// 重新导出常用类型
pub use assembler::FrameAssembler;
pub use checksum::ChecksumPolicy;
pub use codec::FrameCodec;
pub use ids::*;
pub use model::ServoModel;
pub use variant::{PositionReply, ProtocolVariant};

use smallvec::SmallVec;
use thiserror::Error;

/// 参数区缓冲类型
///
/// 栈上预留 8 字节，覆盖本协议所有常用指令：
/// - Feetech 写目标位置：7 字节（寄存器地址 + 位置 + 时间 + 速度）
/// - LX 写目标位置：4 字节
/// - 读位置应答：2 字节
pub type FrameParams = SmallVec<[u8; 8]>;

/// 参数区最大长度（LEN 字段为单字节，且 LEN = len(PARAM) + 2）
pub const MAX_PARAMS_LEN: usize = u8::MAX as usize - 2;

/// 最短帧长度：SYNC SYNC ADDR LEN CMD CHK
pub const MIN_FRAME_LEN: usize = 6;

/// 总线上的单个完整消息（指令帧或应答帧）
///
/// 同步字节与校验和不属于帧内容：它们由 [`FrameCodec`] 在编码时生成、在解码时校验。
/// 因此只要 `decode` 成功，得到的 `Frame` 就保证是校验通过的帧。
///
/// # 示例
///
/// ```rust
/// use puppet_protocol::{Frame, FrameCodec, ProtocolVariant};
///
/// let codec = FrameCodec::new(ProtocolVariant::Feetech);
/// let frame = Frame::new(1, 0x02, &[0x38, 0x02]).unwrap();
/// let bytes = codec.encode(&frame);
/// assert_eq!(codec.decode(&bytes).unwrap(), frame);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    address: u8,
    command: u8,
    params: FrameParams,
}

impl Frame {
    /// 创建帧
    ///
    /// # 错误
    /// - `ProtocolError::ParamsTooLong`: 参数超过 [`MAX_PARAMS_LEN`] 字节
    pub fn new(address: u8, command: u8, params: &[u8]) -> Result<Self, ProtocolError> {
        if params.len() > MAX_PARAMS_LEN {
            return Err(ProtocolError::ParamsTooLong {
                len: params.len(),
                max: MAX_PARAMS_LEN,
            });
        }
        Ok(Self::from_parts(address, command, params))
    }

    /// 内部构造器（调用方保证参数长度合法）
    pub(crate) fn from_parts(address: u8, command: u8, params: &[u8]) -> Self {
        debug_assert!(params.len() <= MAX_PARAMS_LEN);
        Self {
            address,
            command,
            params: FrameParams::from_slice(params),
        }
    }

    /// 目标（或应答来源）地址
    pub fn address(&self) -> u8 {
        self.address
    }

    /// 指令码（应答帧中为舵机状态字节）
    pub fn command(&self) -> u8 {
        self.command
    }

    /// 参数区
    pub fn params(&self) -> &[u8] {
        &self.params
    }

    /// LEN 字段的值
    pub fn length_byte(&self) -> u8 {
        (self.params.len() + 2) as u8
    }

    /// 编码后的完整帧长度
    pub fn wire_len(&self) -> usize {
        MIN_FRAME_LEN + self.params.len()
    }
}

/// 帧结构错误的具体原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("frame too short: {actual} bytes (min {min})", min = MIN_FRAME_LEN)]
    TooShort { actual: usize },

    #[error("sync bytes differ: 0x{first:02X} 0x{second:02X}")]
    SyncMismatch { first: u8, second: u8 },

    #[error("unexpected sync byte: expected 0x{expected:02X}, found 0x{found:02X}")]
    UnexpectedSync { expected: u8, found: u8 },

    #[error("invalid length byte: {0} (min 2)")]
    InvalidLength(u8),

    #[error("length mismatch: declared {declared}, payload {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    Checksum { expected: u8, actual: u8 },

    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("Parameter block too long: {len} bytes (max {max})")]
    ParamsTooLong { len: usize, max: usize },

    #[error("Invalid servo id: {0} (valid range 1-253)")]
    InvalidServoId(u8),

    #[error("Unexpected reply from 0x{address:02X}: {reason}")]
    UnexpectedReply { address: u8, reason: String },
}

impl ProtocolError {
    /// 是否为传输损坏类错误（校验和或帧结构）
    pub fn is_corruption(&self) -> bool {
        matches!(self, ProtocolError::Checksum { .. } | ProtocolError::Framing(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_new_rejects_long_params() {
        let params = vec![0u8; MAX_PARAMS_LEN + 1];
        let err = Frame::new(1, 0x03, &params).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::ParamsTooLong {
                len: MAX_PARAMS_LEN + 1,
                max: MAX_PARAMS_LEN
            }
        );
    }

    #[test]
    fn test_frame_new_accepts_max_params() {
        let params = vec![0xAAu8; MAX_PARAMS_LEN];
        let frame = Frame::new(1, 0x03, &params).unwrap();
        assert_eq!(frame.length_byte(), u8::MAX);
        assert_eq!(frame.wire_len(), MIN_FRAME_LEN + MAX_PARAMS_LEN);
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame::new(7, 0x02, &[0x38, 0x02]).unwrap();
        assert_eq!(frame.address(), 7);
        assert_eq!(frame.command(), 0x02);
        assert_eq!(frame.params(), &[0x38, 0x02]);
        assert_eq!(frame.length_byte(), 4);
    }

    #[test]
    fn test_is_corruption() {
        assert!(
            ProtocolError::Checksum {
                expected: 1,
                actual: 2
            }
            .is_corruption()
        );
        assert!(ProtocolError::Framing(FramingError::TooShort { actual: 3 }).is_corruption());
        assert!(!ProtocolError::InvalidServoId(0).is_corruption());
    }

    #[test]
    fn test_error_display() {
        let err = ProtocolError::Checksum {
            expected: 0x1F,
            actual: 0x20,
        };
        assert_eq!(err.to_string(), "Checksum mismatch: expected 0x1F, got 0x20");

        let err = ProtocolError::from(FramingError::LengthMismatch {
            declared: 4,
            actual: 3,
        });
        assert!(err.to_string().contains("length mismatch"));
    }
}
