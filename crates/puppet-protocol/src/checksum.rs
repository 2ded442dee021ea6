//! 校验和策略
//!
//! 现场使用的两类舵机家族校验方式不同：
//! - 累加和：`Σ & 0xFF`
//! - 取反累加和：`!Σ & 0xFF`（Feetech STS/SCS）
//!
//! 两种策略的求和范围相同：同步字节之后、校验字节之前的全部字节
//! （ADDR、LEN、CMD、PARAM）。

/// 校验和策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ChecksumPolicy {
    /// 累加和（取低 8 位）
    Additive,
    /// 累加和取反（取低 8 位）
    #[default]
    Inverted,
}

impl ChecksumPolicy {
    /// 计算校验字节
    ///
    /// `body` 为同步字节之后、校验字节之前的全部字节。
    #[inline]
    pub fn compute(self, body: &[u8]) -> u8 {
        let sum = body.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
        match self {
            ChecksumPolicy::Additive => sum,
            ChecksumPolicy::Inverted => !sum,
        }
    }
}
