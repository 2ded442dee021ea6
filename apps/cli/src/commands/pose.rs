//! 姿态管理命令

use crate::context::CliContext;
use anyhow::Result;
use clap::Subcommand;
use std::time::Duration;

/// 姿态命令
#[derive(Subcommand, Debug)]
pub enum PoseCommand {
    /// 录制当前姿态
    Record {
        /// 姿态名（同名覆盖）
        name: String,
    },

    /// 平滑回放姿态
    Apply {
        name: String,

        /// 动作时长（毫秒，默认取配置）
        #[arg(short, long)]
        duration_ms: Option<u64>,
    },

    /// 列出所有姿态
    List,

    /// 显示姿态内容
    Show { name: String },
}

impl PoseCommand {
    pub fn execute(self, ctx: &CliContext) -> Result<()> {
        match self {
            PoseCommand::Record { name } => {
                let puppet = ctx.connect()?;
                let pose = puppet.poses().record(&name)?;
                println!("✅ 已录制姿态 '{}' ({} 个舵机)", name, pose.len());
                for (servo, position) in pose.iter() {
                    println!("  {:<16} {}", servo, position);
                }
                Ok(())
            },

            PoseCommand::Apply { name, duration_ms } => {
                let puppet = ctx.connect()?;
                let duration = duration_ms
                    .map(Duration::from_millis)
                    .unwrap_or_else(|| puppet.default_duration());
                println!("⏳ 回放姿态 '{}' ({:?}) ...", name, duration);
                puppet.poses().apply(&name, duration)?;
                println!("✅ 姿态 '{}' 已到位", name);
                Ok(())
            },

            PoseCommand::List => {
                let puppet = ctx.offline()?;
                let names = puppet.poses().list()?;
                if names.is_empty() {
                    println!("(没有姿态) {}", puppet.poses().path().display());
                }
                for name in names {
                    println!("{}", name);
                }
                Ok(())
            },

            PoseCommand::Show { name } => {
                let puppet = ctx.offline()?;
                let pose = puppet.poses().load(&name)?;
                println!("📋 姿态 '{}':", name);
                for (servo, position) in pose.iter() {
                    println!("  {:<16} {}", servo, position);
                }
                Ok(())
            },
        }
    }
}
