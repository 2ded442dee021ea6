//! 驱动层模块
//!
//! 本模块提供舵机总线的设备驱动功能，包括：
//! - 分发线程管理（单一 FIFO 队列，串行化所有总线访问）
//! - 请求-应答交换（超时、损坏应答分类）
//! - 舵机表与位置钳位
//! - 性能指标（原子计数器）
//!
//! # 使用场景
//!
//! 适用于需要直接收发帧的场景。
//! 姿态与嘴部驱动请使用 `puppet-client` 提供的更高级接口。

mod builder;
mod bus;
mod command;
mod dispatch;
mod error;
pub mod metrics;
pub mod servo;

pub use builder::{DEFAULT_BAUD_RATE, DEFAULT_PORT, MotorBusBuilder};
pub use bus::{DEFAULT_REPLY_TIMEOUT, DEFAULT_WRITE_TIMEOUT, MotorBus, QUEUE_CAPACITY};
pub use error::{BusError, ConnectError};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use servo::{Servo, ServoTable};
