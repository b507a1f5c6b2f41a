//! Outlet status snapshot cache.
//!
//! ```text
//! register_status ──► StatusCache::get(outlet) ──hit──► filter for caller
//!                          │ miss
//!                          ▼
//!                    rebuild from ledger ──► StatusCache::put
//!
//! open / record / reverse / close ──► StatusCache::invalidate(outlet)
//! ```
//!
//! The cache is best-effort. Reads may be stale until the TTL runs out, and
//! a failing backend only costs a rebuild. Nothing here is consulted before
//! a write.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::status::OutletSnapshot;

/// Storage for per-outlet status snapshots.
#[async_trait]
pub trait StatusCache: Send + Sync {
    /// Cached snapshot for the outlet, if present and fresh.
    async fn get(&self, outlet_id: &str) -> Option<OutletSnapshot>;

    async fn put(&self, snapshot: &OutletSnapshot);

    /// Drops the outlet's snapshot so the next read rebuilds it.
    async fn invalidate(&self, outlet_id: &str);
}

// =============================================================================
// In-process
// =============================================================================

/// Single-process cache. Used when no Redis URL is configured, and in tests.
#[derive(Debug)]
pub struct InMemoryStatusCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, OutletSnapshot)>>,
}

impl InMemoryStatusCache {
    pub fn new(ttl: Duration) -> Self {
        InMemoryStatusCache {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StatusCache for InMemoryStatusCache {
    async fn get(&self, outlet_id: &str) -> Option<OutletSnapshot> {
        let entries = self.entries.read().await;
        match entries.get(outlet_id) {
            Some((stored_at, snapshot)) if stored_at.elapsed() < self.ttl => Some(snapshot.clone()),
            _ => None,
        }
    }

    async fn put(&self, snapshot: &OutletSnapshot) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(snapshot.outlet_id.clone(), (Instant::now(), snapshot.clone()));
    }

    async fn invalidate(&self, outlet_id: &str) {
        self.entries.write().await.remove(outlet_id);
    }
}

// =============================================================================
// Redis
// =============================================================================

const KEY_PREFIX: &str = "till:status:";

/// Cache shared by every service instance through Redis.
///
/// Snapshots are stored as JSON under `till:status:{outlet_id}` with the
/// TTL applied by Redis itself.
#[derive(Clone)]
pub struct RedisStatusCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisStatusCache {
    /// Connects to Redis. The connection manager reconnects on its own
    /// after the first successful connect.
    pub async fn connect(url: &str, ttl: Duration) -> RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisStatusCache { conn, ttl })
    }

    fn key(outlet_id: &str) -> String {
        format!("{KEY_PREFIX}{outlet_id}")
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn get(&self, outlet_id: &str) -> Option<OutletSnapshot> {
        let mut conn = self.conn.clone();
        let raw = match conn.get::<_, Option<String>>(Self::key(outlet_id)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(outlet_id = %outlet_id, error = %e, "Status cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw?) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(outlet_id = %outlet_id, error = %e, "Discarding unreadable status snapshot");
                None
            }
        }
    }

    async fn put(&self, snapshot: &OutletSnapshot) {
        let payload = match serde_json::to_string(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(outlet_id = %snapshot.outlet_id, error = %e, "Status snapshot not serializable");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let result: RedisResult<()> = conn
            .set_ex(Self::key(&snapshot.outlet_id), payload, self.ttl_secs())
            .await;

        match result {
            Ok(()) => debug!(outlet_id = %snapshot.outlet_id, "Status snapshot cached"),
            Err(e) => warn!(outlet_id = %snapshot.outlet_id, error = %e, "Status cache write failed"),
        }
    }

    async fn invalidate(&self, outlet_id: &str) {
        let mut conn = self.conn.clone();
        let result: RedisResult<()> = conn.del(Self::key(outlet_id)).await;
        if let Err(e) = result {
            warn!(outlet_id = %outlet_id, error = %e, "Status cache invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(outlet_id: &str) -> OutletSnapshot {
        OutletSnapshot {
            outlet_id: outlet_id.to_string(),
            active_registers: Vec::new(),
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = InMemoryStatusCache::new(Duration::from_secs(60));
        assert!(cache.get("outlet-1").await.is_none());

        cache.put(&snapshot("outlet-1")).await;
        cache.put(&snapshot("outlet-2")).await;
        assert_eq!(cache.get("outlet-1").await.unwrap().outlet_id, "outlet-1");

        cache.invalidate("outlet-1").await;
        assert!(cache.get("outlet-1").await.is_none());
        assert!(cache.get("outlet-2").await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = InMemoryStatusCache::new(Duration::ZERO);
        cache.put(&snapshot("outlet-1")).await;
        assert!(cache.get("outlet-1").await.is_none());
    }

    #[test]
    fn test_redis_key_layout() {
        assert_eq!(RedisStatusCache::key("outlet-1"), "till:status:outlet-1");
    }
}
