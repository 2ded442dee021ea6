//! 存活探测命令

use crate::context::CliContext;
use crate::utils::{display_servo, resolve_servos};
use anyhow::Result;
use clap::Args;
use std::time::Instant;

/// 存活探测命令参数
#[derive(Args, Debug)]
pub struct PingCommand {
    /// 舵机地址或名称（默认全部）
    pub servos: Vec<String>,
}

impl PingCommand {
    pub fn execute(&self, ctx: &CliContext) -> Result<()> {
        let puppet = ctx.connect()?;
        let bus = puppet.bus();
        let ids = resolve_servos(bus, &self.servos)?;

        let mut offline = 0;
        for id in ids {
            let start = Instant::now();
            match bus.ping(id) {
                Ok(()) => println!("✅ {} ({:?})", display_servo(bus, id), start.elapsed()),
                Err(e) => {
                    offline += 1;
                    println!("❌ {}: {}", display_servo(bus, id), e);
                },
            }
        }

        if offline > 0 {
            anyhow::bail!("{} 个舵机无应答", offline);
        }
        Ok(())
    }
}
