//! 移动命令
//!
//! 单舵机平滑移动到绝对位置，或相对当前位置移动一个增量。
//! 目标在插值开始前钳位到舵机安全范围。

use crate::context::CliContext;
use crate::utils::{display_servo, resolve_servo};
use anyhow::Result;
use clap::Args;
use puppet_client::MoveTarget;
use std::time::Duration;

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    /// 舵机地址或名称
    pub servo: String,

    /// 目标位置（`--relative` 时为增量）
    #[arg(allow_negative_numbers = true)]
    pub value: i32,

    /// 按相对增量移动
    #[arg(short, long)]
    pub relative: bool,

    /// 动作时长（毫秒，默认取配置）
    #[arg(short, long)]
    pub duration_ms: Option<u64>,
}

impl MoveCommand {
    pub fn target(&self) -> MoveTarget {
        if self.relative {
            MoveTarget::Relative(self.value)
        } else {
            MoveTarget::Absolute(self.value)
        }
    }

    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let puppet = ctx.connect()?;
        let bus = puppet.bus();
        let id = resolve_servo(bus, &self.servo)?;
        let duration = self
            .duration_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| puppet.default_duration());

        println!("⏳ 移动 {} ...", display_servo(bus, id));
        let position = puppet.poses().move_single(id, self.target(), duration)?;
        println!("✅ {} 已到达 {}", display_servo(bus, id), position);
        Ok(())
    }
}
