//! 配置管理命令

use crate::context::CliContext;
use anyhow::{Context, Result};
use clap::Subcommand;
use puppet_tools::PuppetConfig;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 显示生效的配置
    Show,

    /// 写入默认配置文件
    Init {
        /// 覆盖已有文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => Self::show(ctx),
            ConfigCommand::Init { force } => Self::init(ctx, force),
        }
    }

    fn show(ctx: &CliContext) -> Result<()> {
        let status = if ctx.config_path.exists() {
            ""
        } else {
            "（不存在，使用默认值）"
        };
        println!("# {}{}", ctx.config_path.display(), status);
        print!("{}", ctx.config.to_toml()?);
        Ok(())
    }

    fn init(ctx: &CliContext, force: bool) -> Result<()> {
        let path = &ctx.config_path;
        if path.exists() && !force {
            anyhow::bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
        }
        PuppetConfig::default()
            .save(path)
            .with_context(|| format!("写入配置文件失败: {}", path.display()))?;
        println!("✅ 已写入默认配置: {}", path.display());
        Ok(())
    }
}
