//! 线性插值（Ramp）
//!
//! 从当前位置到目标位置的整数插值序列，第 k 步（k = 1..=steps）为
//!
//! ```text
//! current + delta * k / steps
//! ```
//!
//! 全程使用整数运算，最后一步 `k == steps` 恰好等于目标位置，不存在浮点截断残差。
//!
//! # 示例
//!
//! ```rust
//! use puppet_client::Ramp;
//! use std::num::NonZeroU32;
//!
//! let steps = NonZeroU32::new(4).unwrap();
//! let ramp: Vec<u16> = Ramp::new(1000, 1010, steps).collect();
//! assert_eq!(ramp, vec![1002, 1005, 1007, 1010]);
//! ```

use std::num::NonZeroU32;

/// 单个舵机的插值序列
#[derive(Debug, Clone)]
pub struct Ramp {
    from: i64,
    delta: i64,
    steps: u32,
    step: u32,
}

impl Ramp {
    pub fn new(from: u16, to: u16, steps: NonZeroU32) -> Self {
        Self {
            from: i64::from(from),
            delta: i64::from(to) - i64::from(from),
            steps: steps.get(),
            step: 0,
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// 终点位置
    pub fn target(&self) -> u16 {
        self.at(self.steps)
    }

    /// 第 `k` 步的位置（k = 0 为起点）
    pub fn at(&self, k: u32) -> u16 {
        let k = i64::from(k.min(self.steps));
        // 起点与终点都在 u16 范围内，中间值同样在范围内
        (self.from + self.delta * k / i64::from(self.steps)) as u16
    }

    /// 剩余步数
    pub fn remaining(&self) -> u32 {
        self.steps - self.step
    }
}

impl Iterator for Ramp {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.step >= self.steps {
            return None;
        }
        self.step += 1;
        Some(self.at(self.step))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Ramp {}
