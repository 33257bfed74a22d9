//! Answer cache.
//!
//! Agent answers are cached by question and document so re-evaluating the
//! same article, or the same question across scenarios, skips the LLM.

use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use warden_core::Answer;

use crate::config::CacheConfig;

/// Cache key for one question asked of one document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    agent: String,
    question_hash: u64,
    document_hash: u64,
}

impl CacheKey {
    pub fn new(agent: &str, question: &str, document: &str) -> Self {
        Self {
            agent: agent.to_string(),
            question_hash: hash_text(question),
            document_hash: hash_text(document),
        }
    }
}

/// Agent answer cache using moka.
pub struct AnswerCache {
    cache: Cache<CacheKey, Answer>,
}

impl AnswerCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Answer> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: CacheKey, answer: Answer) {
        self.cache.insert(key, answer).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = AnswerCache::default();
        let key = CacheKey::new("react", "Is the client a dispensary?", "article text");

        assert!(cache.get(&key).await.is_none());

        cache
            .insert(key.clone(), Answer::yes(0.9, "operates a dispensary"))
            .await;

        let cached = cache.get(&key).await.unwrap();
        assert!(cached.answer);
        assert_eq!(cached.confidence, 0.9);
    }

    #[tokio::test]
    async fn test_key_depends_on_document_and_agent() {
        let cache = AnswerCache::default();
        let key = CacheKey::new("react", "Q?", "first article");
        cache.insert(key, Answer::no(0.8, "")).await;

        assert!(cache
            .get(&CacheKey::new("react", "Q?", "second article"))
            .await
            .is_none());
        assert!(cache
            .get(&CacheKey::new("scorer", "Q?", "first article"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let cache = AnswerCache::default();
        let key = CacheKey::new("react", "Q?", "article");
        cache.insert(key.clone(), Answer::no(0.8, "")).await;

        cache.invalidate_all();
        assert!(cache.get(&key).await.is_none());
    }
}
