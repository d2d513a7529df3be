//! Read-through cache in front of the warehouse.
//!
//! Entries are keyed by table identifier and stay fresh for a fixed TTL. The
//! current time is always passed in by the caller; nothing here reads a clock.
//! The cache is single-owner (`&mut self`), matching the single-threaded render
//! model: two expiries racing would at worst fetch twice.

use crate::errors::AppResult;
use crate::models::GoldTable;
use crate::normalize::normalize_numeric;
use crate::warehouse::{Table, WarehouseClient};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_TTL_SECONDS: i64 = 3_600;

#[derive(Debug, Clone)]
struct CachedTable {
    table: Arc<Table>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct TableCache {
    ttl: Duration,
    entries: HashMap<String, CachedTable>,
    stats: CacheStats,
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECONDS))
    }
}

impl TableCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn is_fresh(&self, id: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(id)
            .map(|entry| now.signed_duration_since(entry.fetched_at) < self.ttl)
            .unwrap_or(false)
    }

    /// Returns the cached table while it is fresh, otherwise calls `fetch` and
    /// replaces the entry. A failed fetch leaves the previous entry untouched.
    pub fn get_or_fetch<F>(&mut self, id: &str, now: DateTime<Utc>, fetch: F) -> AppResult<Arc<Table>>
    where
        F: FnOnce(&str) -> AppResult<Table>,
    {
        if self.is_fresh(id, now) {
            if let Some(entry) = self.entries.get(id) {
                self.stats.hits += 1;
                tracing::debug!(table = id, "table cache hit");
                return Ok(entry.table.clone());
            }
        }

        self.stats.misses += 1;
        tracing::debug!(table = id, "table cache miss");
        let table = Arc::new(fetch(id)?);
        self.entries.insert(
            id.to_string(),
            CachedTable {
                table: table.clone(),
                fetched_at: now,
            },
        );
        Ok(table)
    }

    pub fn invalidate(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Pairs a warehouse client with a [`TableCache`]; tables are normalized once
/// on fetch so every cached copy already carries float numeric columns.
pub struct CachedTableLoader<W: WarehouseClient> {
    warehouse: W,
    cache: TableCache,
}

impl<W: WarehouseClient> CachedTableLoader<W> {
    pub fn new(warehouse: W, ttl: Duration) -> Self {
        Self {
            warehouse,
            cache: TableCache::new(ttl),
        }
    }

    pub fn load(&mut self, table: GoldTable, now: DateTime<Utc>) -> AppResult<Arc<Table>> {
        let warehouse = &self.warehouse;
        self.cache.get_or_fetch(table.as_str(), now, |id| {
            let mut fetched = warehouse.fetch(id)?;
            normalize_numeric(&mut fetched, table.numeric_columns());
            tracing::info!(table = id, rows = fetched.len(), "loaded gold table");
            Ok(fetched)
        })
    }

    pub fn cache(&self) -> &TableCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TableCache {
        &mut self.cache
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }
}
