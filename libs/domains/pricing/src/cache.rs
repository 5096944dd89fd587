//! Quote cache.
//!
//! Keys carry everything a quote depends on, caller context included, so a hit
//! is always the answer a fresh computation would give for the same catalog.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    CallerContext, LevelRangeQuote, LevelRangeRequest, MethodQuoteRequest, SinglePriceQuote,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QuoteCacheKey {
    Single {
        method_id: Uuid,
        payment_method_id: Option<Uuid>,
        quantity: u32,
        /// Sorted and deduplicated
        modifier_ids: Vec<Uuid>,
        context: String,
    },
    Range {
        service_id: Uuid,
        start: u32,
        end: u32,
        /// Lowercased
        group: Option<String>,
        apply_modifiers: bool,
        context: String,
    },
}

impl QuoteCacheKey {
    pub fn single(request: &MethodQuoteRequest) -> Self {
        let mut modifier_ids = request.service_modifier_ids.clone();
        modifier_ids.sort_unstable();
        modifier_ids.dedup();

        Self::Single {
            method_id: request.method_id,
            payment_method_id: request.payment_method_id,
            quantity: request.quantity,
            modifier_ids,
            context: fingerprint(&request.context),
        }
    }

    pub fn range(request: &LevelRangeRequest) -> Self {
        Self::Range {
            service_id: request.service_id,
            start: request.start,
            end: request.end,
            group: request.group.as_deref().map(|g| g.trim().to_lowercase()),
            apply_modifiers: request.apply_modifiers,
            context: fingerprint(&request.context),
        }
    }
}

// BTreeMap keys serialize in order, so equal contexts give equal strings.
fn fingerprint(context: &CallerContext) -> String {
    serde_json::to_string(context).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedQuote {
    Single(SinglePriceQuote),
    Range(LevelRangeQuote),
}

#[async_trait]
pub trait QuoteCache: Send + Sync {
    async fn get(&self, key: &QuoteCacheKey) -> Option<CachedQuote>;

    async fn put(&self, key: QuoteCacheKey, quote: CachedQuote);

    /// Drop every entry, e.g. after the catalog changes
    async fn invalidate_all(&self);
}

pub const DEFAULT_MAX_ENTRIES: usize = 1024;

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    seq: u64,
    quote: CachedQuote,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<QuoteCacheKey, Entry>,
    next_seq: u64,
}

/// Process-local cache with a fixed time-to-live and a bounded size.
///
/// When full, the oldest entry is evicted to make room.
#[derive(Debug, Clone)]
pub struct InMemoryQuoteCache {
    state: Arc<RwLock<CacheState>>,
    ttl: Duration,
    max_entries: usize,
}

impl InMemoryQuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CacheState::default())),
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Cap the number of stored quotes; zero disables storing
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl QuoteCache for InMemoryQuoteCache {
    async fn get(&self, key: &QuoteCacheKey) -> Option<CachedQuote> {
        let state = self.state.read().await;
        state
            .entries
            .get(key)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.quote.clone())
    }

    async fn put(&self, key: QuoteCacheKey, quote: CachedQuote) {
        if self.max_entries == 0 {
            return;
        }

        let mut state = self.state.write().await;
        state
            .entries
            .retain(|_, entry| entry.stored_at.elapsed() < self.ttl);

        if !state.entries.contains_key(&key) && state.entries.len() >= self.max_entries {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
                tracing::debug!(max_entries = self.max_entries, "Evicted oldest cached quote");
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.entries.insert(
            key,
            Entry {
                stored_at: Instant::now(),
                seq,
                quote,
            },
        );
    }

    async fn invalidate_all(&self) {
        let mut state = self.state.write().await;
        tracing::debug!(entries = state.entries.len(), "Invalidating quote cache");
        state.entries.clear();
    }
}
