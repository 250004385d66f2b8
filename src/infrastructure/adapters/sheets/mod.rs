//! Sheets Adapter - 对话日志写入

mod sheets_logger;

pub use sheets_logger::{SheetsConversationLog, SheetsLogConfig};
