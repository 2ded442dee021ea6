//! 舵机地址定义
//!
//! 总线上每个舵机有唯一地址（1-253）。0xFE 为广播地址，0xFF 与同步字节冲突，0 保留。

use crate::ProtocolError;

/// 广播地址（所有舵机接收，任何舵机都不应答）
pub const BROADCAST_ID: u8 = 0xFE;

/// 最小合法舵机地址
pub const MIN_SERVO_ID: u8 = 1;

/// 最大合法舵机地址
pub const MAX_SERVO_ID: u8 = 253;

/// 舵机总线地址
///
/// 通过 `ServoId::new` 构造时校验范围，之后所有点对点指令都可以直接使用，
/// 不必在每个调用点重复检查。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct ServoId(u8);

impl ServoId {
    /// 创建舵机地址
    ///
    /// # 错误
    /// - `ProtocolError::InvalidServoId`: 地址不在 1-253 范围内
    pub fn new(id: u8) -> Result<Self, ProtocolError> {
        if (MIN_SERVO_ID..=MAX_SERVO_ID).contains(&id) {
            Ok(Self(id))
        } else {
            Err(ProtocolError::InvalidServoId(id))
        }
    }

    /// 编译期常量地址（越界时编译失败）
    pub const fn new_const(id: u8) -> Self {
        assert!(id >= MIN_SERVO_ID && id <= MAX_SERVO_ID, "servo id out of range");
        Self(id)
    }

    /// 原始地址值
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ServoId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServoId> for u8 {
    fn from(id: ServoId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ServoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
