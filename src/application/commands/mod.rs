//! 应用层 - 命令（写操作）
//!
//! CQRS 命令侧：中继请求会生成并存储音频

mod relay_commands;

pub mod handlers;

pub use relay_commands::*;
