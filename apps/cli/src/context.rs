//! 命令执行上下文（配置加载、连接）

use anyhow::{Context, Result};
use puppet_client::Puppet;
use puppet_client::puppet::{bus_builder, servo_table};
use puppet_driver::MotorBus;
use puppet_tools::PuppetConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 默认配置文件路径
pub fn default_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("puppet");
    path.push("config.toml");
    Ok(path)
}

/// 命令执行上下文
#[derive(Debug)]
pub struct CliContext {
    pub config: PuppetConfig,
    pub config_path: PathBuf,
}

impl CliContext {
    /// 加载配置（文件不存在时使用默认值），命令行参数覆盖配置
    pub fn load(config_path: Option<PathBuf>, port: Option<String>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_config_path()?,
        };
        let mut config = PuppetConfig::load_or_default(&config_path)
            .with_context(|| format!("加载配置失败: {}", config_path.display()))?;
        if let Some(port) = port {
            debug!("Port override: {} -> {}", config.bus.port, port);
            config.bus.port = port;
        }
        debug!("Loaded config from {}", config_path.display());
        Ok(Self {
            config,
            config_path,
        })
    }

    /// 配置文件所在目录（解析相对姿态文件路径）
    pub fn base_dir(&self) -> Option<&Path> {
        self.config_path.parent()
    }

    /// 打开串口
    ///
    /// CLI 不降级：串口打不开直接报错退出。
    pub fn connect(&self) -> Result<Puppet> {
        let bus = bus_builder(&self.config)
            .build()
            .with_context(|| format!("无法打开串口 {}", self.config.bus.port))?;
        info!(
            "Opened {} at {} baud ({})",
            self.config.bus.port, self.config.bus.baud_rate, self.config.bus.variant
        );
        Ok(Puppet::with_bus(bus, self.config.clone(), self.base_dir())?)
    }

    /// 不打开串口（只读姿态文件的命令）
    pub fn offline(&self) -> Result<Puppet> {
        let servos = servo_table(&self.config);
        let bus = MotorBus::unavailable(&self.config.bus.port, self.config.bus.variant, servos);
        Ok(Puppet::with_bus(bus, self.config.clone(), self.base_dir())?)
    }
}
