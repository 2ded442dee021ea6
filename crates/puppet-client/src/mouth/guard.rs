//! 收尾守卫

use puppet_driver::MotorBus;
use puppet_protocol::ServoId;
use tracing::{debug, warn};

/// 嘴部收尾守卫（RAII）
///
/// 离开作用域时无条件阻塞写入静止位置：正常结束、取消、错误提前返回、
/// 甚至工作线程 panic 展开时都会执行，保证嘴不会停在张开状态。
///
/// 写入失败只记录日志（总线不可用时无法补救）。
pub struct MouthGuard<'a> {
    bus: &'a MotorBus,
    servo: ServoId,
    resting: i32,
}

impl<'a> MouthGuard<'a> {
    pub fn new(bus: &'a MotorBus, servo: ServoId, resting: i32) -> Self {
        Self {
            bus,
            servo,
            resting,
        }
    }
}

impl Drop for MouthGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            warn!("Articulation unwinding, closing mouth on {}", self.servo);
        }
        match self.bus.write_position_blocking(self.servo, self.resting, 0) {
            Ok(position) => debug!("Mouth {} rested at {}", self.servo, position),
            Err(e) => warn!("Failed to rest mouth {}: {}", self.servo, e),
        }
    }
}
