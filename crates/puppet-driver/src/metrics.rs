//! 总线性能指标
//!
//! 分发线程在热路径上只做 `fetch_add(Relaxed)`，调用方随时取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 总线指标（原子计数器）
#[derive(Debug, Default)]
pub struct BusMetrics {
    /// 成功写出的帧数
    pub frames_written: AtomicU64,

    /// 写出失败次数（串口错误）
    ///
    /// 位置写入是即发即忘的，失败只记录在这里和日志中。
    pub write_failures: AtomicU64,

    /// 请求-应答交换次数
    pub exchanges: AtomicU64,

    /// 应答超时次数
    pub timeouts: AtomicU64,

    /// 损坏的应答（校验和或帧结构错误）
    pub corrupt_replies: AtomicU64,

    /// 被丢弃的回显帧（部分半双工转接板会回显发出的字节）
    pub echoes_filtered: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_written: self.frames_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            exchanges: self.exchanges.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            corrupt_replies: self.corrupt_replies.load(Ordering::Relaxed),
            echoes_filtered: self.echoes_filtered.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_written: u64,
    pub write_failures: u64,
    pub exchanges: u64,
    pub timeouts: u64,
    pub corrupt_replies: u64,
    pub echoes_filtered: u64,
}

impl MetricsSnapshot {
    /// 写出失败率（0.0 - 1.0）
    pub fn write_failure_rate(&self) -> f64 {
        let attempts = self.frames_written + self.write_failures;
        if attempts == 0 {
            0.0
        } else {
            self.write_failures as f64 / attempts as f64
        }
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "written={} write_failures={} exchanges={} timeouts={} corrupt={} echoes={}",
            self.frames_written,
            self.write_failures,
            self.exchanges,
            self.timeouts,
            self.corrupt_replies,
            self.echoes_filtered
        )
    }
}
