//! 客户端错误类型定义

use puppet_driver::BusError;
use puppet_tools::{ConfigError, PoseFileError};
use thiserror::Error;

/// 姿态操作错误
#[derive(Error, Debug)]
pub enum PoseError {
    /// 姿态文件中没有该名称（非致命，调用方决定如何处理）
    #[error("Pose not found: {0}")]
    NotFound(String),

    /// 姿态引用了舵机表中不存在的舵机（在任何动作之前报告）
    #[error("Pose '{pose}' references unknown servo '{servo}'")]
    UnknownServo { pose: String, servo: String },

    /// 舵机表为空，无法录制
    #[error("No servos configured")]
    NoServos,

    /// 姿态文件读写错误
    #[error(transparent)]
    File(#[from] PoseFileError),

    /// 总线错误（读取当前位置失败、最后一步写入失败等）
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

impl PoseError {
    /// 是否为“姿态不存在”
    pub fn is_not_found(&self) -> bool {
        matches!(self, PoseError::NotFound(_))
    }
}

/// 嘴部驱动错误
#[derive(Error, Debug)]
pub enum ArticulationError {
    /// 嘴部参数非法
    #[error("Invalid mouth configuration: {0}")]
    Config(#[from] ConfigError),

    /// 会话已结束（finish/cancel 之后或工作线程已退出）
    #[error("Articulation session closed")]
    SessionClosed,

    /// 工作线程创建失败
    #[error("Failed to spawn articulation worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// 工作线程 panic（收尾指令仍已由守卫发出）
    #[error("Articulation worker panicked")]
    WorkerPanicked,

    /// 总线错误（诊断动作）
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}
