//! # Puppet CLI
//!
//! 木偶舵机的命令行诊断工具。每条命令都是 One-shot：打开串口 → 执行 → 关闭。
//!
//! ```bash
//! # 生成默认配置
//! puppet-cli config init
//!
//! # 单舵机移动（绝对 / 相对）
//! puppet-cli move servo6 1600
//! puppet-cli move 6 -50 --relative
//!
//! # 姿态
//! puppet-cli pose record rest
//! puppet-cli pose apply rest --duration-ms 400
//!
//! # 用 WAV 文件驱动嘴部
//! puppet-cli speak hello.wav
//! ```
//!
//! 串口错误、姿态不存在等情况以非零状态码退出。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod context;
mod utils;

use commands::{
    ConfigCommand, MouthTestCommand, MoveCommand, PingCommand, PoseCommand, PositionCommand,
    SpeakCommand,
};
use context::CliContext;

/// Puppet CLI - 木偶舵机命令行工具
#[derive(Parser, Debug)]
#[command(name = "puppet-cli")]
#[command(about = "Command-line interface for animatronic puppet servo control", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径（默认 <config_dir>/puppet/config.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 串口（覆盖配置）
    #[arg(long, global = true)]
    port: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 移动单个舵机（绝对位置或相对增量）
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 查询舵机当前位置
    Position {
        #[command(flatten)]
        args: PositionCommand,
    },

    /// 探测舵机是否在线
    Ping {
        #[command(flatten)]
        args: PingCommand,
    },

    /// 姿态管理
    #[command(subcommand)]
    Pose(PoseCommand),

    /// 用 WAV 文件驱动嘴部
    Speak {
        #[command(flatten)]
        args: SpeakCommand,
    },

    /// 嘴部开合测试
    MouthTest {
        #[command(flatten)]
        args: MouthTestCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("puppet_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config, cli.port)?;

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&ctx),
        Commands::Move { args } => args.execute(&ctx),
        Commands::Position { args } => args.execute(&ctx),
        Commands::Ping { args } => args.execute(&ctx),
        Commands::Pose(cmd) => cmd.execute(&ctx),
        Commands::Speak { args } => args.execute(&ctx),
        Commands::MouthTest { args } => args.execute(&ctx),
    }
}
