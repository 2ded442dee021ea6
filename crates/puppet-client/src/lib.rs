//! 客户端接口模块
//!
//! 本模块提供木偶控制的高层接口，包括：
//! - 命名姿态的录制、加载与平滑插值回放（[`PoseStore`]）
//! - 音频振幅驱动的嘴部开合（[`mouth`]）
//! - 单调时钟节拍器（[`Pacer`]），替代累积漂移的 sleep 循环
//! - 按配置文件组装以上组件的门面（[`Puppet`]）
//!
//! # 使用场景
//!
//! 这是大多数调用方应该使用的模块。所有组件共享同一个 `Arc<MotorBus>`，
//! 总线内部的分发队列保证姿态插值和嘴部驱动不会在半双工总线上交错写入。
//! 如果需要直接收发帧，请使用 `puppet-driver`。

pub mod error;
pub mod mouth;
pub mod pacer;
pub mod pose;
pub mod puppet;
pub mod ramp;

// 重新导出常用类型
pub use error::{ArticulationError, PoseError};
pub use mouth::{
    ArticulationEngine, ArticulationSession, AudioChunk, CancelHandle, MouthGuard, MouthSnapshot,
};
pub use pacer::Pacer;
pub use pose::{MoveTarget, PoseStore};
pub use puppet::Puppet;
pub use ramp::Ramp;
