//! 木偶门面
//!
//! 按 [`PuppetConfig`] 组装总线、姿态存储与嘴部引擎，所有组件共享同一个总线句柄。

use crate::error::ArticulationError;
use crate::mouth::{self, ArticulationEngine, ArticulationSession};
use crate::pose::PoseStore;
use puppet_driver::{MotorBus, MotorBusBuilder, Servo, ServoTable};
use puppet_tools::{ConfigError, PuppetConfig};
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 木偶
#[derive(Debug)]
pub struct Puppet {
    bus: Arc<MotorBus>,
    poses: PoseStore,
    engine: ArticulationEngine,
    config: PuppetConfig,
}

impl Puppet {
    /// 按配置打开串口
    ///
    /// 串口打开失败时不报错，总线进入不可用状态，之后的操作返回 `BusError::Unavailable`。
    /// `base_dir` 是配置文件所在目录，用于解析相对的姿态文件路径。
    ///
    /// # 错误
    /// - `ConfigError::Invalid`: 配置校验失败
    pub fn from_config(config: PuppetConfig, base_dir: Option<&Path>) -> Result<Self, ConfigError> {
        config.validate()?;
        let bus = bus_builder(&config).build_or_degrade();
        Self::with_bus(bus, config, base_dir)
    }

    /// 使用已构造的总线（Mock、测试）
    pub fn with_bus(
        bus: MotorBus,
        config: PuppetConfig,
        base_dir: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let steps = NonZeroU32::new(config.poses.steps)
            .ok_or_else(|| ConfigError::Invalid("poses.steps must be at least 1".into()))?;
        let engine = ArticulationEngine::new(config.mouth.clone()).map_err(|e| match e {
            ArticulationError::Config(e) => e,
            other => ConfigError::Invalid(other.to_string()),
        })?;

        let bus = Arc::new(bus);
        let pose_path = PuppetConfig::resolve_path(base_dir, &config.poses.file);
        let poses = PoseStore::new(bus.clone(), pose_path)
            .with_steps(steps)
            .with_settle_delay(Duration::from_millis(config.poses.settle_delay_ms));

        Ok(Self {
            bus,
            poses,
            engine,
            config,
        })
    }

    pub fn bus(&self) -> &Arc<MotorBus> {
        &self.bus
    }

    pub fn poses(&self) -> &PoseStore {
        &self.poses
    }

    pub fn engine(&self) -> &ArticulationEngine {
        &self.engine
    }

    pub fn config(&self) -> &PuppetConfig {
        &self.config
    }

    /// 默认动作时长
    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.config.poses.default_duration_ms)
    }

    /// 开始一个嘴部驱动会话
    pub fn speak(&self) -> Result<ArticulationSession, ArticulationError> {
        ArticulationSession::start(self.bus.clone(), self.engine.clone())
    }

    /// 使用自定义引擎开始会话（例如音频源采样率与配置不同时）
    pub fn speak_with(
        &self,
        engine: ArticulationEngine,
    ) -> Result<ArticulationSession, ArticulationError> {
        ArticulationSession::start(self.bus.clone(), engine)
    }

    /// 嘴部开合测试
    pub fn mouth_test(&self, cycles: u32, hold: Duration) -> Result<(), ArticulationError> {
        mouth::mouth_test(&self.bus, &self.engine, cycles, hold)
    }
}

/// 由配置生成舵机表
pub fn servo_table(config: &PuppetConfig) -> ServoTable {
    config
        .servos
        .iter()
        .map(|entry| {
            let (min, max) = entry.range();
            Servo::new(entry.id, entry.name.clone(), entry.model).with_range(min, max)
        })
        .collect()
}

/// 由配置生成总线 Builder
pub fn bus_builder(config: &PuppetConfig) -> MotorBusBuilder {
    let servos = servo_table(config);

    let mut builder = MotorBusBuilder::new()
        .port(config.bus.port.clone())
        .baud_rate(config.bus.baud_rate)
        .variant(config.bus.variant)
        .reply_timeout(config.bus.reply_timeout())
        .echo(config.bus.echo)
        .servos(servos.iter().cloned());
    if let Some(checksum) = config.bus.checksum {
        builder = builder.checksum(checksum);
    }
    builder
}
