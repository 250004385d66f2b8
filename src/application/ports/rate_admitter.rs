//! Rate Admitter Port - 请求准入控制

use std::time::Duration;

/// 准入判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 允许，请求已计入窗口
    Allowed,
    /// 拒绝，`retry_after` 后窗口内最早的请求会过期
    Rejected { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

/// Rate Admitter Port
///
/// 按客户端标识做准入控制，实现必须可并发调用
pub trait RateAdmitterPort: Send + Sync {
    /// 检查并记录一次请求
    ///
    /// 被拒绝的请求不计入窗口
    fn admit(&self, client_id: &str) -> Admission;

    /// 清理窗口内已无记录的客户端，返回清理数量
    fn purge_idle(&self) -> usize;
}
