//! 嘴部驱动
//!
//! 把流式语音音频转换成实时的下颌位置指令：
//!
//! ```text
//! 音频块 → 峰值归一化 → 分窗平均振幅 → 开合度 [0, 1] → 位置 → MotorBus
//! ```
//!
//! - [`ArticulationEngine`]: 纯计算（振幅、开合度、位置、停顿）
//! - [`ArticulationSession`]: 工作线程 + 无界 FIFO，逐块执行
//! - [`MouthGuard`]: 收尾守卫，保证最后一条指令是静止位置
//! - [`MouthSnapshot`]: 通过 `ArcSwap` 发布的诊断快照

pub mod amplitude;
mod engine;
mod guard;
mod session;

pub use engine::{ArticulationEngine, MouthStep, openness};
pub use guard::MouthGuard;
pub use session::{ArticulationSession, AudioChunk, CancelHandle};

use crate::error::ArticulationError;
use crate::pacer::Pacer;
use puppet_driver::MotorBus;
use std::time::Duration;
use tracing::info;

/// 嘴部状态诊断快照（只用于诊断显示）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouthSnapshot {
    /// 当前开合度 [0, 1]
    pub openness: f32,
    /// 最近一次下发的位置（钳位后）
    pub position: u16,
    /// 最近一个窗口的归一化振幅
    pub amplitude: f32,
    pub chunks_processed: u64,
    pub windows_processed: u64,
}

/// 开合测试：全开、闭合交替 `cycles` 次，每个状态保持 `hold`
///
/// 每次写入都等待写出，串口错误立即返回；无论成功与否最后都回到静止位置。
pub fn mouth_test(
    bus: &MotorBus,
    engine: &ArticulationEngine,
    cycles: u32,
    hold: Duration,
) -> Result<(), ArticulationError> {
    let servo = engine.servo_id();
    let _guard = MouthGuard::new(bus, servo, engine.resting_position());
    let open = engine.position(1.0);
    let closed = engine.position(0.0);
    let mut pacer = Pacer::new(hold);

    for cycle in 1..=cycles {
        info!("Mouth test cycle {}/{}", cycle, cycles);
        bus.write_position_blocking(servo, open, 0)?;
        pacer.wait();
        bus.write_position_blocking(servo, closed, 0)?;
        pacer.wait();
    }
    Ok(())
}
