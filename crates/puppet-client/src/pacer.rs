//! 单调时钟节拍器
//!
//! 第 k 个截止时间固定为 `start + k * interval`，每次等待都睡到绝对锚点，
//! 而不是“睡一个周期”。写总线等耗时操作的时间因此自动扣除，长序列不会累积漂移。
//!
//! # 示例
//!
//! ```rust,no_run
//! use puppet_client::Pacer;
//! use std::time::Duration;
//!
//! let mut pacer = Pacer::new(Duration::from_millis(10));
//! for _ in 0..100 {
//!     // 下发一步指令 ...
//!     pacer.wait();
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 单调时钟节拍器
#[derive(Debug, Clone)]
pub struct Pacer {
    start: Instant,
    interval: Duration,
    ticks: u32,
}

impl Pacer {
    /// 以当前时刻为起点
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    /// 以指定时刻为起点
    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            start,
            interval,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 已经过的节拍数
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// 第 `tick` 个节拍的截止时间
    pub fn deadline(&self, tick: u32) -> Instant {
        self.start + self.interval.saturating_mul(tick)
    }

    /// 等待一个节拍
    pub fn wait(&mut self) -> bool {
        self.wait_ticks(1)
    }

    /// 等待 `n` 个节拍
    ///
    /// 返回 `false` 表示截止时间已过（Overrun），本次没有睡眠。
    /// 落后超过一个完整周期时重新锚定到当前时刻，避免随后连续不睡眠地追赶。
    pub fn wait_ticks(&mut self, n: u32) -> bool {
        self.ticks = self.ticks.saturating_add(n);
        if self.interval.is_zero() {
            return true;
        }
        let deadline = self.deadline(self.ticks);
        let now = Instant::now();

        if deadline > now {
            spin_sleep::sleep(deadline - now);
            return true;
        }

        let behind = now - deadline;
        if behind > self.interval {
            warn!(
                "Pacer overrun: {:?} behind tick {} (interval {:?}), re-anchoring",
                behind, self.ticks, self.interval
            );
            // 重置锚点，使当前节拍的截止时间等于 now
            self.start = now
                .checked_sub(self.interval.saturating_mul(self.ticks))
                .unwrap_or(now);
        } else {
            debug!("Pacer late by {:?} at tick {}", behind, self.ticks);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadlines_are_anchored() {
        let start = Instant::now();
        let pacer = Pacer::starting_at(start, Duration::from_millis(10));
        assert_eq!(pacer.deadline(0), start);
        assert_eq!(pacer.deadline(7), start + Duration::from_millis(70));
    }

    #[test]
    fn test_wait_accumulates_to_anchor() {
        let start = Instant::now();
        let mut pacer = Pacer::starting_at(start, Duration::from_millis(5));
        for _ in 0..4 {
            // 模拟每步有一点耗时，不应累积
            std::thread::sleep(Duration::from_millis(1));
            pacer.wait();
        }
        assert_eq!(pacer.ticks(), 4);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_wait_ticks_holds_multiple_intervals() {
        let start = Instant::now();
        let mut pacer = Pacer::starting_at(start, Duration::from_millis(4));
        assert!(pacer.wait_ticks(5));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_overrun_reanchors() {
        let mut pacer = Pacer::new(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(30));
        assert!(!pacer.wait());

        // 重新锚定后下一拍仍然睡满一个周期
        let before = Instant::now();
        assert!(pacer.wait());
        assert!(before.elapsed() >= Duration::from_millis(4));
    }

    #[test]
    fn test_reanchor_after_long_stall() {
        let now = Instant::now();
        let start = now.checked_sub(Duration::from_secs(2)).unwrap_or(now);
        let mut pacer = Pacer::starting_at(start, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));

        assert!(!pacer.wait_ticks(3));
        assert_eq!(pacer.ticks(), 3);
        // 当前节拍的截止时间被拉到刚才的 now，不早于原锚点
        let deadline = pacer.deadline(3);
        assert!(deadline <= Instant::now());
        assert!(deadline >= now);
    }

    #[test]
    fn test_zero_interval_never_sleeps() {
        let mut pacer = Pacer::new(Duration::ZERO);
        for _ in 0..10 {
            pacer.wait();
        }
        assert_eq!(pacer.ticks(), 10);
    }
}
