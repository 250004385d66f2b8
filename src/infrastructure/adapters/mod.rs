//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod gemini;
pub mod sheets;
pub mod transcoder;

pub use gemini::*;
pub use sheets::*;
pub use transcoder::*;
