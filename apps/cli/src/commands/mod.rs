//! 命令定义和实现

pub mod config;
pub mod r#move;
pub mod ping;
pub mod pose;
pub mod position;
pub mod speak;

pub use config::ConfigCommand;
pub use mouth_test::MouthTestCommand;
pub use r#move::MoveCommand;
pub use ping::PingCommand;
pub use pose::PoseCommand;
pub use position::PositionCommand;
pub use speak::SpeakCommand;
