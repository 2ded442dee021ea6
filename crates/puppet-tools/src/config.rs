//! # 配置文件
//!
//! 所有字段都有默认值，没有配置文件时按默认值运行（单个 STS3215 嘴部舵机，地址 6）。
//!
//! ```toml
//! [bus]
//! port = "/dev/ttyACM0"
//! baud_rate = 1000000
//! variant = "feetech"
//!
//! [[servos]]
//! id = 6
//! name = "servo6"
//! model = "sts3215"
//! min = 1100
//! max = 2100
//!
//! [mouth]
//! servo_id = 6
//! closed_position = 1200
//! open_position = 2000
//! ```

use puppet_protocol::{ChecksumPolicy, ProtocolVariant, ServoId, ServoModel};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PuppetConfig {
    pub bus: BusConfig,
    pub servos: Vec<ServoEntry>,
    pub poses: PoseConfig,
    pub mouth: MouthConfig,
}

impl Default for PuppetConfig {
    fn default() -> Self {
        let mouth = MouthConfig::default();
        Self {
            bus: BusConfig::default(),
            servos: vec![ServoEntry {
                id: mouth.servo_id,
                name: format!("servo{}", mouth.servo_id.get()),
                model: ServoModel::Sts3215,
                min: None,
                max: None,
            }],
            poses: PoseConfig::default(),
            mouth,
        }
    }
}

impl PuppetConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml(&content)
    }

    /// 从文件加载；文件不存在时返回默认配置
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("Config {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 保存到文件（先写临时文件再 rename）
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen_ids = Vec::new();
        let mut seen_names = Vec::new();
        for servo in &self.servos {
            if seen_ids.contains(&servo.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate servo id {}",
                    servo.id
                )));
            }
            if seen_names.contains(&&servo.name) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate servo name {:?}",
                    servo.name
                )));
            }
            seen_ids.push(servo.id);
            seen_names.push(&servo.name);
        }

        if self.poses.steps == 0 {
            return Err(ConfigError::Invalid("poses.steps must be at least 1".into()));
        }

        self.mouth.validate()
    }

    /// 相对路径以配置文件所在目录为基准解析
    pub fn resolve_path(base_dir: Option<&Path>, path: &Path) -> PathBuf {
        match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// 总线配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub port: String,
    pub baud_rate: u32,
    pub variant: ProtocolVariant,
    /// 覆盖变体默认校验策略
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<ChecksumPolicy>,
    pub reply_timeout_ms: u64,
    /// 适配器回显写出的字节（TX/RX 短接的单线接法）
    pub echo: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".to_string(),
            baud_rate: 1_000_000,
            variant: ProtocolVariant::Feetech,
            checksum: None,
            reply_timeout_ms: 100,
            echo: false,
        }
    }
}

impl BusConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// 舵机表条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoEntry {
    pub id: ServoId,
    pub name: String,
    #[serde(default)]
    pub model: ServoModel,
    /// 安全范围下限（缺省为型号默认范围）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u16>,
    /// 安全范围上限（缺省为型号默认范围）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u16>,
}

impl ServoEntry {
    /// 生效的安全范围
    pub fn range(&self) -> (u16, u16) {
        let (default_min, default_max) = self.model.default_range();
        (
            self.min.unwrap_or(default_min),
            self.max.unwrap_or(default_max),
        )
    }
}

/// 姿态配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// 姿态文件路径（相对路径以配置文件目录为基准）
    pub file: PathBuf,
    /// 插值步数
    pub steps: u32,
    /// 录制时相邻舵机读取之间的间隔
    pub settle_delay_ms: u64,
    /// 默认动作时长
    pub default_duration_ms: u64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("poses.json"),
            steps: 100,
            settle_delay_ms: 50,
            default_duration_ms: 1000,
        }
    }
}

/// 嘴部驱动参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouthConfig {
    /// 下颌舵机地址
    pub servo_id: ServoId,
    /// 闭合位置
    pub closed_position: u16,
    /// 全开位置
    pub open_position: u16,
    /// 低于此振幅视为静音（闭嘴）
    pub silence_threshold: f32,
    /// 高于此振幅视为元音（全开）
    pub vowel_threshold: f32,
    /// 分析窗口长度
    pub window_ms: u32,
    /// 每个音频块分析的窗口数
    pub windows_per_chunk: usize,
    /// 每次更新后的停顿
    pub update_delay_ms: u64,
    /// 元音全开时停顿的倍数
    pub vowel_hold: u32,
    /// 结束时的静止开合度（0 = 完全闭合）
    pub resting_openness: f32,
    /// 音频采样率
    pub sample_rate: u32,
}

/// 嘴部舵机默认地址
const MOUTH_SERVO_ID: ServoId = ServoId::new_const(6);

impl Default for MouthConfig {
    fn default() -> Self {
        Self {
            servo_id: MOUTH_SERVO_ID,
            closed_position: 1200,
            open_position: 2000,
            silence_threshold: 0.10,
            vowel_threshold: 0.35,
            window_ms: 20,
            windows_per_chunk: 2,
            update_delay_ms: 10,
            vowel_hold: 5,
            resting_openness: 0.0,
            sample_rate: 44_100,
        }
    }
}

impl MouthConfig {
    /// 校验参数
    ///
    /// 阈值必须满足 `0 < silence < vowel <= 1`，静止开合度在 `[0, 1]` 内。
    pub fn validate(&self) -> Result<(), ConfigError> {
        let silence = self.silence_threshold;
        let vowel = self.vowel_threshold;
        if !(silence > 0.0 && silence < vowel && vowel <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "mouth thresholds must satisfy 0 < silence < vowel <= 1 (got {silence}, {vowel})"
            )));
        }
        if !(0.0..=1.0).contains(&self.resting_openness) {
            return Err(ConfigError::Invalid(format!(
                "mouth.resting_openness must be within [0, 1] (got {})",
                self.resting_openness
            )));
        }
        if self.window_ms == 0 || self.windows_per_chunk == 0 || self.sample_rate == 0 {
            return Err(ConfigError::Invalid(
                "mouth window_ms, windows_per_chunk and sample_rate must be positive".into(),
            ));
        }
        Ok(())
    }

    /// 每个分析窗口的采样数（至少 1）
    pub fn window_samples(&self) -> usize {
        ((self.sample_rate as u64 * self.window_ms as u64 / 1000) as usize).max(1)
    }

    pub fn update_delay(&self) -> Duration {
        Duration::from_millis(self.update_delay_ms)
    }
}
