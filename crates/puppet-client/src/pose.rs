//! 姿态存储
//!
//! 录制、加载、回放命名姿态。
//!
//! - **录制**：按舵机表顺序逐个读取当前位置（相邻读取之间留出稳定间隔），
//!   读-改-写到姿态文件，保留其他姿态
//! - **加载**：每次都重新读文件（惰性），文件不存在视为没有任何姿态
//! - **回放**：读取所有目标舵机的当前位置，同步地对每个舵机做整数线性插值，
//!   最后一步精确写入目标位置
//!
//! 所有总线访问都经过同一个长生命周期的 `MotorBus`，不会为每个舵机重新打开串口。

use crate::error::PoseError;
use crate::pacer::Pacer;
use crate::ramp::Ramp;
use puppet_driver::{BusError, MotorBus};
use puppet_protocol::ServoId;
use puppet_tools::{Pose, PoseFile};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 默认插值步数
pub const DEFAULT_STEPS: NonZeroU32 = match NonZeroU32::new(100) {
    Some(steps) => steps,
    None => unreachable!(),
};

/// 录制时相邻舵机读取之间的默认间隔
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// 单舵机移动目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveTarget {
    /// 绝对位置
    Absolute(i32),
    /// 相对当前位置的增量
    Relative(i32),
}

impl MoveTarget {
    /// 基于当前位置解析出请求的位置（未钳位）
    pub fn resolve(self, current: u16) -> i32 {
        match self {
            MoveTarget::Absolute(position) => position,
            MoveTarget::Relative(delta) => i32::from(current).saturating_add(delta),
        }
    }
}

/// 一个舵机的插值计划
struct Track {
    id: ServoId,
    ramp: Ramp,
}

/// 姿态存储
pub struct PoseStore {
    bus: Arc<MotorBus>,
    path: PathBuf,
    steps: NonZeroU32,
    settle_delay: Duration,
}

impl PoseStore {
    pub fn new(bus: Arc<MotorBus>, path: impl Into<PathBuf>) -> Self {
        Self {
            bus,
            path: path.into(),
            steps: DEFAULT_STEPS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// 设置插值步数
    pub fn with_steps(mut self, steps: NonZeroU32) -> Self {
        self.steps = steps;
        self
    }

    /// 设置录制时的稳定间隔
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn steps(&self) -> NonZeroU32 {
        self.steps
    }

    pub fn bus(&self) -> &Arc<MotorBus> {
        &self.bus
    }

    /// 录制姿态
    ///
    /// 按舵机表顺序读取全部舵机的当前位置，写入姿态文件中的 `name`，
    /// 同名姿态被覆盖，其他姿态保留。任何一个舵机读取失败都不会写文件。
    pub fn record(&self, name: &str) -> Result<Pose, PoseError> {
        let servos = self.bus.servos();
        if servos.is_empty() {
            return Err(PoseError::NoServos);
        }

        let mut pose = Pose::new();
        for (index, servo) in servos.iter().enumerate() {
            if index > 0 && !self.settle_delay.is_zero() {
                spin_sleep::sleep(self.settle_delay);
            }
            let position = self.bus.read_position(servo.id)?;
            debug!("Recorded {} ({}) at {}", servo.name, servo.id, position);
            pose.insert(servo.name.clone(), position);
        }

        let previous = PoseFile::upsert(&self.path, name, pose.clone())?;
        info!(
            "{} pose '{}' ({} servos) in {}",
            if previous.is_some() { "Updated" } else { "Recorded" },
            name,
            pose.len(),
            self.path.display()
        );
        Ok(pose)
    }

    /// 加载姿态
    pub fn load(&self, name: &str) -> Result<Pose, PoseError> {
        PoseFile::load(&self.path)?
            .get(name)
            .cloned()
            .ok_or_else(|| PoseError::NotFound(name.to_string()))
    }

    /// 所有姿态名（字典序）
    pub fn list(&self) -> Result<Vec<String>, PoseError> {
        let file = PoseFile::load(&self.path)?;
        Ok(file.names().map(str::to_string).collect())
    }

    /// 回放姿态
    ///
    /// 在 `duration` 内把姿态中的所有舵机从当前位置插值到记录的位置。
    ///
    /// # 错误
    /// - `PoseError::NotFound`: 姿态不存在
    /// - `PoseError::UnknownServo`: 姿态引用了舵机表中没有的舵机（不会发出任何动作）
    /// - `PoseError::Bus`: 读取当前位置失败（不会发出任何动作），或最后一步写入失败
    pub fn apply(&self, name: &str, duration: Duration) -> Result<(), PoseError> {
        let pose = self.load(name)?;

        // 先解析全部舵机，任何一个不认识都不动
        let mut targets = Vec::with_capacity(pose.len());
        for (servo_name, position) in pose.iter() {
            let servo = self.bus.servo_by_name(servo_name).map_err(|_| PoseError::UnknownServo {
                pose: name.to_string(),
                servo: servo_name.to_string(),
            })?;
            targets.push((servo.id, position));
        }

        let mut tracks = Vec::with_capacity(targets.len());
        for (id, target) in targets {
            let current = self.bus.read_position(id)?;
            let target = self.bus.clamp(id, i32::from(target));
            tracks.push(Track {
                id,
                ramp: Ramp::new(current, target, self.steps),
            });
        }

        info!(
            "Applying pose '{}' ({} servos, {} steps over {:?})",
            name,
            tracks.len(),
            self.steps,
            duration
        );
        self.run(tracks, duration)
    }

    /// 单舵机移动（手动调整、诊断）
    ///
    /// 目标位置在插值开始前先钳位到安全范围。返回最终位置。
    pub fn move_single(
        &self,
        id: ServoId,
        target: MoveTarget,
        duration: Duration,
    ) -> Result<u16, PoseError> {
        let current = self.bus.read_position(id)?;
        let requested = target.resolve(current);
        let clamped = self.bus.clamp(id, requested);
        if i32::from(clamped) != requested {
            info!("{} target {} clamped to {}", id, requested, clamped);
        }

        let ramp = Ramp::new(current, clamped, self.steps);
        self.run(vec![Track { id, ramp }], duration)?;
        Ok(clamped)
    }

    /// 同步驱动所有插值序列
    ///
    /// 第 k 步在 `k * duration / steps` 时刻写出，最后一步正好落在 `duration`。
    /// 中间步即发即忘，失败只记录日志；最后一步阻塞写入，错误返回给调用方。
    fn run(&self, mut tracks: Vec<Track>, duration: Duration) -> Result<(), PoseError> {
        let steps = self.steps.get();
        let interval = duration / steps;
        let step_ms = u16::try_from(interval.as_millis()).unwrap_or(u16::MAX);
        let mut pacer = Pacer::new(interval);

        for step in 1..steps {
            pacer.wait();
            for track in &mut tracks {
                let Some(position) = track.ramp.next() else {
                    continue;
                };
                if let Err(e) = self.bus.write_position(track.id, i32::from(position), step_ms) {
                    warn!("Step {}/{} for {} dropped: {}", step, steps, track.id, e);
                }
            }
        }

        pacer.wait();
        let mut last_error: Option<BusError> = None;
        for track in &mut tracks {
            let target = track.ramp.target();
            if let Err(e) = self.bus.write_position_blocking(track.id, i32::from(target), step_ms) {
                warn!("Final write for {} failed: {}", track.id, e);
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for PoseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseStore")
            .field("path", &self.path)
            .field("steps", &self.steps)
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}
