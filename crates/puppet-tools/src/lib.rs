//! # Puppet Tools - 共享数据结构
//!
//! **依赖原则**: 只依赖 `puppet-protocol`，不依赖驱动层与硬件
//!
//! ## 包含模块
//!
//! - `config` - TOML 配置文件（总线、舵机表、姿态、嘴部参数）
//! - `pose_file` - 姿态文件格式（JSON，原子写入）

pub mod config;
pub mod pose_file;

// 重新导出常用类型
pub use config::{BusConfig, ConfigError, MouthConfig, PoseConfig, PuppetConfig, ServoEntry};
pub use pose_file::{Pose, PoseFile, PoseFileError};
