//! Audio Store Port - 临时音频存储
//!
//! 进程内的 id → 音频字节映射，通过 HTTP 在有限时间内对外提供

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Audio Store 错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Audio not found: {0}")]
    NotFound(String),
}

/// 已存储的音频
#[derive(Debug, Clone)]
pub struct StoredAudio {
    pub id: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// 存储统计信息
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub max_entries: usize,
    pub evicted_count: u64,
}

/// Audio Store Port
///
/// - `put` 为每个条目分配全局唯一的随机 id
/// - `get` 对未知或过期 id 返回 `StoreError::NotFound`
pub trait AudioStorePort: Send + Sync {
    /// 存储音频，返回新分配的 id
    fn put(&self, bytes: Vec<u8>, mime_type: &str) -> String;

    /// 根据 id 获取音频
    fn get(&self, id: &str) -> Result<StoredAudio, StoreError>;

    /// 删除所有过期条目，返回删除数量
    fn purge_expired(&self) -> usize;

    /// 获取统计信息
    fn stats(&self) -> StoreStats;
}
