//! 振幅 → 开合度 → 舵机位置

use super::amplitude::window_amplitudes;
use crate::error::ArticulationError;
use puppet_protocol::ServoId;
use puppet_tools::MouthConfig;
use std::time::Duration;

/// 振幅到开合度的映射
///
/// - `amplitude < silence` → 0（闭合）
/// - `amplitude > vowel` → 1（全开）
/// - 其余在两个阈值之间线性插值
///
/// 结果总在 `[0, 1]` 内；NaN 视为静音。
pub fn openness(amplitude: f32, silence: f32, vowel: f32) -> f32 {
    if amplitude.is_nan() || amplitude < silence {
        return 0.0;
    }
    if amplitude > vowel {
        return 1.0;
    }
    let span = vowel - silence;
    if span <= 0.0 {
        return 1.0;
    }
    ((amplitude - silence) / span).clamp(0.0, 1.0)
}

/// 一个窗口的驱动计划
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouthStep {
    pub amplitude: f32,
    pub openness: f32,
    /// 映射后的位置（未钳位）
    pub position: i32,
    /// 下发后停顿的更新周期数
    pub hold: u32,
}

/// 嘴部驱动引擎
///
/// 只负责计算，不持有总线。执行由 [`ArticulationSession`](super::ArticulationSession) 完成。
#[derive(Debug, Clone)]
pub struct ArticulationEngine {
    config: MouthConfig,
    window_samples: usize,
}

impl ArticulationEngine {
    /// # 错误
    /// - `ArticulationError::Config`: 阈值顺序错误、静止开合度越界等
    pub fn new(config: MouthConfig) -> Result<Self, ArticulationError> {
        config.validate()?;
        let window_samples = config.window_samples();
        Ok(Self {
            config,
            window_samples,
        })
    }

    pub fn config(&self) -> &MouthConfig {
        &self.config
    }

    pub fn servo_id(&self) -> ServoId {
        self.config.servo_id
    }

    /// 每个窗口的采样数
    pub fn window_samples(&self) -> usize {
        self.window_samples
    }

    /// 一个完整音频块的采样数（窗口数 × 窗口长度）
    pub fn chunk_samples(&self) -> usize {
        self.window_samples * self.config.windows_per_chunk
    }

    pub fn update_delay(&self) -> Duration {
        self.config.update_delay()
    }

    pub fn openness(&self, amplitude: f32) -> f32 {
        openness(
            amplitude,
            self.config.silence_threshold,
            self.config.vowel_threshold,
        )
    }

    /// 开合度 → 舵机位置（向零截断）
    pub fn position(&self, openness: f32) -> i32 {
        let closed = f64::from(self.config.closed_position);
        let open = f64::from(self.config.open_position);
        let openness = if openness.is_nan() {
            0.0
        } else {
            f64::from(openness.clamp(0.0, 1.0))
        };
        (closed + (open - closed) * openness) as i32
    }

    /// 收尾时的静止位置
    pub fn resting_position(&self) -> i32 {
        self.position(self.config.resting_openness)
    }

    /// 下发后停顿的周期数：元音停留更久
    pub fn hold(&self, amplitude: f32) -> u32 {
        if amplitude > self.config.vowel_threshold {
            self.config.vowel_hold.max(1)
        } else {
            1
        }
    }

    /// 为一个音频块生成逐窗口的驱动计划（按窗口顺序）
    pub fn plan(&self, samples: &[i16]) -> Vec<MouthStep> {
        window_amplitudes(samples, self.window_samples, self.config.windows_per_chunk)
            .into_iter()
            .map(|amplitude| {
                let openness = self.openness(amplitude);
                MouthStep {
                    amplitude,
                    openness,
                    position: self.position(openness),
                    hold: self.hold(amplitude),
                }
            })
            .collect()
    }
}
