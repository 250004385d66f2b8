//! In-Memory Audio Store Implementation
//!
//! 条目在 TTL 后过期，容量满时淘汰最早写入的条目

use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::application::ports::{AudioStorePort, StoreError, StoreStats, StoredAudio};

/// 内存音频存储配置
#[derive(Debug, Clone)]
pub struct InMemoryAudioStoreConfig {
    /// 条目存活时间
    pub ttl: Duration,
    /// 最大条目数
    pub max_entries: usize,
}

impl Default for InMemoryAudioStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 256,
        }
    }
}

struct Entry {
    audio: StoredAudio,
    inserted_at: Instant,
}

/// 内存音频存储
pub struct InMemoryAudioStore {
    entries: DashMap<String, Entry>,
    config: InMemoryAudioStoreConfig,
    evicted_count: AtomicU64,
    /// 串行化 put 的容量检查、淘汰与插入，读取不经过此锁
    write_gate: Mutex<()>,
}

impl InMemoryAudioStore {
    pub fn new(config: InMemoryAudioStoreConfig) -> Self {
        tracing::info!(
            ttl_secs = config.ttl.as_secs(),
            max_entries = config.max_entries,
            "InMemoryAudioStore initialized"
        );
        Self {
            entries: DashMap::new(),
            config,
            evicted_count: AtomicU64::new(0),
            write_gate: Mutex::new(()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.inserted_at) >= self.config.ttl
    }

    /// 淘汰最早写入的条目，直到留出一个空位
    ///
    /// 调用方须持有 write_gate
    fn evict_oldest(&self) {
        while self.entries.len() >= self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.inserted_at)
                .map(|e| e.key().clone());

            match oldest {
                Some(id) => {
                    if self.entries.remove(&id).is_some() {
                        self.evicted_count.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(audio_id = %id, "Evicted oldest audio");
                    }
                }
                None => break,
            }
        }
    }
}

impl Default for InMemoryAudioStore {
    fn default() -> Self {
        Self::new(InMemoryAudioStoreConfig::default())
    }
}

impl AudioStorePort for InMemoryAudioStore {
    fn put(&self, bytes: Vec<u8>, mime_type: &str) -> String {
        // 守卫只保护 ()，中毒时数据无损，继续使用
        let _gate = self
            .write_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.evict_oldest();

        let id = Uuid::new_v4().simple().to_string();
        let entry = Entry {
            audio: StoredAudio {
                id: id.clone(),
                bytes,
                mime_type: mime_type.to_string(),
                created_at: Utc::now(),
            },
            inserted_at: Instant::now(),
        };
        self.entries.insert(id.clone(), entry);
        id
    }

    fn get(&self, id: &str) -> Result<StoredAudio, StoreError> {
        let now = Instant::now();
        let expired = match self.entries.get(id) {
            Some(entry) if !self.is_expired(&entry, now) => return Ok(entry.audio.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(id);
            tracing::debug!(audio_id = %id, "Audio expired");
        }
        Err(StoreError::NotFound(id.to_string()))
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    fn stats(&self) -> StoreStats {
        StoreStats {
            total_entries: self.entries.len(),
            total_size_bytes: self
                .entries
                .iter()
                .map(|e| e.audio.bytes.len() as u64)
                .sum(),
            max_entries: self.config.max_entries,
            evicted_count: self.evicted_count.load(Ordering::Relaxed),
        }
    }
}
