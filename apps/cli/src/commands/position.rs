//! 位置查询命令

use crate::context::CliContext;
use crate::utils::{display_servo, resolve_servos};
use anyhow::Result;
use clap::Args;

/// 位置查询命令参数
#[derive(Args, Debug)]
pub struct PositionCommand {
    /// 舵机地址或名称（默认全部）
    pub servos: Vec<String>,
}

impl PositionCommand {
    /// 执行位置查询
    ///
    /// 逐个读取，任一舵机失败时继续读取其余舵机，最后以错误退出。
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let puppet = ctx.connect()?;
        let bus = puppet.bus();
        let ids = resolve_servos(bus, &self.servos)?;

        println!("📊 舵机位置:");
        let mut failures = 0;
        for id in ids {
            match bus.read_position(id) {
                Ok(position) => println!("  {:<16} {}", display_servo(bus, id), position),
                Err(e) => {
                    failures += 1;
                    println!("  {:<16} ❌ {}", display_servo(bus, id), e);
                },
            }
        }

        if failures > 0 {
            anyhow::bail!("{} 个舵机读取失败", failures);
        }
        Ok(())
    }
}
