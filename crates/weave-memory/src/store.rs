//! The memory store: a single guarded map of memories plus tag/type
//! indices, patterns, and a small regex cache for pattern matching.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;
use weave_core::{MemoryId, PatternId};
use weave_crypto::ContentHash;
use weave_storage::KvStore;

use crate::error::MemoryResult;
use crate::types::{Memory, Pattern};

const STORAGE_NAMESPACE: &str = "memories";
const REGEX_CACHE_CAPACITY: usize = 64;
const PRIORITIZE_CAP: f64 = 1.0;

/// Computes an embedding vector for a piece of text, enabling semantic
/// recall by cosine similarity.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`.
    async fn embed(&self, text: &str) -> MemoryResult<Vec<f32>>;
}

struct Inner {
    memories: HashMap<MemoryId, Memory>,
    patterns: HashMap<PatternId, Pattern>,
    tag_index: HashMap<String, HashSet<MemoryId>>,
    type_index: HashMap<String, HashSet<MemoryId>>,
    regex_cache: HashMap<String, Regex>,
}

impl Inner {
    fn new() -> Self {
        Self {
            memories: HashMap::new(),
            patterns: HashMap::new(),
            tag_index: HashMap::new(),
            type_index: HashMap::new(),
            regex_cache: HashMap::new(),
        }
    }

    fn index_memory(&mut self, memory: &Memory) {
        for tag in &memory.tags {
            self.tag_index.entry(tag.clone()).or_default().insert(memory.memory_id.clone());
        }
        self.type_index
            .entry(memory.memory_type.clone())
            .or_default()
            .insert(memory.memory_id.clone());
    }

    fn unindex_memory(&mut self, memory: &Memory) {
        for tag in &memory.tags {
            if let Some(ids) = self.tag_index.get_mut(tag) {
                ids.remove(&memory.memory_id);
            }
        }
        if let Some(ids) = self.type_index.get_mut(&memory.memory_type) {
            ids.remove(&memory.memory_id);
        }
    }
}

/// Aggregate counts over the current store, for introspection.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryStats {
    /// Total stored memories.
    pub total_memories: usize,
    /// Total registered patterns.
    pub total_patterns: usize,
    /// Memory count grouped by `memory_type`.
    pub by_type: HashMap<String, usize>,
    /// Mean importance across every stored memory; `0.0` when empty.
    pub avg_importance: f64,
}

/// The content-addressed memory store described by the system's §4.7
/// memory model.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    store: Option<Arc<dyn KvStore>>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl MemoryStore {
    /// A store with no persistence and no embedder configured.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
            store: None,
            embedder: None,
        }
    }

    /// Attach a backing [`KvStore`] for per-memory persistence.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach an [`Embedder`] to enable semantic (`query`) recall.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    fn derive_memory_id(content: &Value) -> MemoryResult<MemoryId> {
        let hash = ContentHash::hash_json(content)?;
        Ok(MemoryId::from_raw(format!("mem_{}", hash.to_hex_prefix(16))))
    }

    /// Store `content`, deduplicating on its content-derived id. If a
    /// memory with the same id already exists, this just records an
    /// access on it instead of creating a duplicate.
    pub async fn store(
        &self,
        content: Value,
        memory_type: impl Into<String> + Send,
        importance: f64,
        tags: HashSet<String>,
        links: HashSet<MemoryId>,
    ) -> MemoryResult<Memory> {
        let memory_id = Self::derive_memory_id(&content)?;
        let memory_type = memory_type.into();

        let mut guard = self.inner.lock().await;
        if let Some(existing) = guard.memories.get_mut(&memory_id) {
            existing.access();
            let memory = existing.clone();
            drop(guard);
            self.persist(&memory).await?;
            return Ok(memory);
        }

        let mut memory = Memory::new(memory_id, content, memory_type, importance, tags, links);
        if let Some(embedder) = &self.embedder {
            let text = memory.content.as_str().map(str::to_owned).unwrap_or_else(|| memory.content.to_string());
            memory.embedding = Some(embedder.embed(&text).await?);
        }

        guard.index_memory(&memory);
        guard.memories.insert(memory.memory_id.clone(), memory.clone());
        drop(guard);

        self.persist(&memory).await?;
        tracing::debug!(memory_id = %memory.memory_id.as_str(), "stored memory");
        Ok(memory)
    }

    async fn persist(&self, memory: &Memory) -> MemoryResult<()> {
        let Some(store) = &self.store else { return Ok(()) };
        let bytes = serde_json::to_vec(memory)?;
        store.set(STORAGE_NAMESPACE, memory.memory_id.as_str(), bytes).await?;
        Ok(())
    }

    /// Recall by id, tag/type filters, or (if an embedder is configured)
    /// semantic similarity to `query`; otherwise sorted by
    /// `(importance, recency)` descending. Recalled memories have
    /// [`Memory::access`] applied.
    pub async fn recall(
        &self,
        memory_id: Option<&MemoryId>,
        query: Option<&str>,
        tags: Option<&HashSet<String>>,
        memory_type: Option<&str>,
        limit: usize,
    ) -> MemoryResult<Vec<Memory>> {
        let mut guard = self.inner.lock().await;

        if let Some(memory_id) = memory_id {
            return Ok(match guard.memories.get_mut(memory_id) {
                Some(memory) => {
                    memory.access();
                    vec![memory.clone()]
                },
                None => Vec::new(),
            });
        }

        let mut candidate_ids: Vec<MemoryId> = if let Some(tags) = tags.filter(|tags| !tags.is_empty()) {
            let mut tags_iter = tags.iter();
            let first_tag = tags_iter.next().expect("filtered out the empty case above");
            let mut matching: HashSet<MemoryId> = guard.tag_index.get(first_tag).cloned().unwrap_or_default();
            for tag in tags_iter {
                let this_tag: HashSet<MemoryId> = guard.tag_index.get(tag).cloned().unwrap_or_default();
                matching.retain(|id| this_tag.contains(id));
            }
            matching.into_iter().collect()
        } else {
            guard.memories.keys().cloned().collect()
        };

        if let Some(memory_type) = memory_type {
            candidate_ids.retain(|id| guard.memories.get(id).is_some_and(|memory| memory.memory_type == memory_type));
        }

        let mut candidates: Vec<Memory> = candidate_ids
            .into_iter()
            .filter_map(|id| guard.memories.get(&id).cloned())
            .collect();

        if let (Some(query), Some(embedder)) = (query, &self.embedder) {
            drop(guard);
            let query_embedding = embedder.embed(query).await?;
            semantic_sort(&mut candidates, &query_embedding);
            guard = self.inner.lock().await;
        } else {
            candidates.sort_by(|a, b| {
                b.importance
                    .partial_cmp(&a.importance)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.accessed_at.cmp(&a.accessed_at))
            });
        }

        candidates.truncate(limit);
        for memory in &mut candidates {
            if let Some(stored) = guard.memories.get_mut(&memory.memory_id) {
                stored.access();
                *memory = stored.clone();
            }
        }
        Ok(candidates)
    }

    /// Create a symmetric link between two existing memories.
    pub async fn link(&self, memory_id_a: &MemoryId, memory_id_b: &MemoryId) -> bool {
        let mut guard = self.inner.lock().await;
        if !guard.memories.contains_key(memory_id_a) || !guard.memories.contains_key(memory_id_b) {
            return false;
        }
        if let Some(memory) = guard.memories.get_mut(memory_id_a) {
            memory.links.insert(memory_id_b.clone());
        }
        if let Some(memory) = guard.memories.get_mut(memory_id_b) {
            memory.links.insert(memory_id_a.clone());
        }
        true
    }

    /// Forget one memory by id, or every memory below `below_importance`.
    /// Returns how many memories were removed.
    pub async fn forget(&self, memory_id: Option<&MemoryId>, below_importance: Option<f64>) -> usize {
        let mut guard = self.inner.lock().await;
        if let Some(memory_id) = memory_id {
            if let Some(memory) = guard.memories.remove(memory_id) {
                guard.unindex_memory(&memory);
                return 1;
            }
            return 0;
        }
        let Some(threshold) = below_importance else { return 0 };
        let to_forget: Vec<MemoryId> = guard
            .memories
            .iter()
            .filter(|(_, memory)| memory.importance < threshold)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &to_forget {
            if let Some(memory) = guard.memories.remove(id) {
                guard.unindex_memory(&memory);
            }
        }
        to_forget.len()
    }

    /// Fold several memories into one `compressed`-typed summary memory,
    /// linked bidirectionally to every source memory.
    pub async fn compress(&self, memory_ids: &[MemoryId], summary: impl Into<String>) -> MemoryResult<Memory> {
        let guard = self.inner.lock().await;
        let mut original_contents = Vec::new();
        let mut original_tags = HashSet::new();
        for id in memory_ids {
            if let Some(memory) = guard.memories.get(id) {
                original_contents.push(memory.content.clone());
                original_tags.extend(memory.tags.iter().cloned());
            }
        }
        drop(guard);

        let preview: Vec<Value> = original_contents.iter().take(3).cloned().collect();
        let content = serde_json::json!({
            "type": "compressed",
            "summary": summary.into(),
            "original_count": original_contents.len(),
            "original_contents": preview,
        });

        let compressed = self.store(content, "compressed", 0.7, original_tags, HashSet::new()).await?;
        for id in memory_ids {
            self.link(&compressed.memory_id, id).await;
        }
        Ok(compressed)
    }

    /// Apply time-based decay to every stored memory.
    pub async fn apply_decay(&self, time_delta: f64) {
        let mut guard = self.inner.lock().await;
        for memory in guard.memories.values_mut() {
            memory.decay(time_delta);
        }
    }

    /// Directly raise a memory's importance outside the access-driven
    /// recency boost.
    pub async fn prioritize(&self, memory_id: &MemoryId, boost: f64) -> bool {
        let mut guard = self.inner.lock().await;
        let Some(memory) = guard.memories.get_mut(memory_id) else { return false };
        memory.importance = (memory.importance + boost).min(PRIORITIZE_CAP);
        true
    }

    /// Register (or, if the same trigger conditions were seen before, bump
    /// the occurrence count of) a pattern.
    pub async fn recognize_pattern(
        &self,
        pattern_type: impl Into<String>,
        trigger_conditions: HashMap<String, Value>,
        response_template: Option<String>,
    ) -> MemoryResult<Pattern> {
        let hash = ContentHash::hash_json(&trigger_conditions)?;
        let pattern_id = PatternId::from_raw(format!("pat_{}", hash.to_hex_prefix(12)));

        let mut guard = self.inner.lock().await;
        if let Some(existing) = guard.patterns.get_mut(&pattern_id) {
            existing.occurrences = existing.occurrences.saturating_add(1);
            return Ok(existing.clone());
        }
        let pattern = Pattern::new(pattern_id.clone(), pattern_type, trigger_conditions, response_template);
        guard.patterns.insert(pattern_id, pattern.clone());
        tracing::debug!(pattern_id = %pattern.pattern_id.as_str(), "recognized pattern");
        Ok(pattern)
    }

    /// Return every registered pattern whose trigger conditions match
    /// `context`, bumping each match's occurrence count and
    /// `last_triggered`.
    pub async fn match_patterns(&self, context: &HashMap<String, Value>) -> Vec<Pattern> {
        let mut guard = self.inner.lock().await;
        let candidate_ids: Vec<PatternId> = guard.patterns.keys().cloned().collect();
        let mut matched = Vec::new();
        for id in candidate_ids {
            let matches = {
                let pattern = guard.patterns.get(&id).expect("id came from this map's own keys");
                pattern_matches(pattern, context, &mut guard.regex_cache)
            };
            if matches {
                if let Some(pattern) = guard.patterns.get_mut(&id) {
                    pattern.occurrences = pattern.occurrences.saturating_add(1);
                    pattern.last_triggered = Some(chrono::Utc::now());
                    matched.push(pattern.clone());
                }
            }
        }
        matched
    }

    /// Aggregate counts over the current store.
    pub async fn stats(&self) -> MemoryStats {
        let guard = self.inner.lock().await;
        let by_type = guard.type_index.iter().map(|(type_name, ids)| (type_name.clone(), ids.len())).collect();
        let avg_importance = if guard.memories.is_empty() {
            0.0
        } else {
            guard.memories.values().map(|memory| memory.importance).sum::<f64>() / guard.memories.len() as f64
        };
        MemoryStats {
            total_memories: guard.memories.len(),
            total_patterns: guard.patterns.len(),
            by_type,
            avg_importance,
        }
    }
}

fn pattern_matches(pattern: &Pattern, context: &HashMap<String, Value>, regex_cache: &mut HashMap<String, Regex>) -> bool {
    for (key, expected) in &pattern.trigger_conditions {
        let Some(actual) = context.get(key) else { return false };
        if let Some(regex_source) = expected.get("$regex").and_then(Value::as_str) {
            let Some(compiled) = get_or_compile(regex_cache, regex_source) else { return false };
            let actual_str = actual.as_str().map(str::to_owned).unwrap_or_else(|| actual.to_string());
            if !compiled.is_match(&actual_str) {
                return false;
            }
        } else if actual != expected {
            return false;
        }
    }
    true
}

fn get_or_compile(cache: &mut HashMap<String, Regex>, pattern: &str) -> Option<Regex> {
    if let Some(existing) = cache.get(pattern) {
        return Some(existing.clone());
    }
    let compiled = Regex::new(pattern).ok()?;
    if cache.len() >= REGEX_CACHE_CAPACITY {
        if let Some(key) = cache.keys().next().cloned() {
            cache.remove(&key);
        }
    }
    cache.insert(pattern.to_owned(), compiled.clone());
    Some(compiled)
}

fn semantic_sort(memories: &mut [Memory], query_embedding: &[f32]) {
    memories.sort_by(|a, b| {
        let score_a = cosine_similarity(a.embedding.as_deref().unwrap_or(&[]), query_embedding);
        let score_b = cosine_similarity(b.embedding.as_deref().unwrap_or(&[]), query_embedding);
        score_b.partial_cmp(&score_a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_dedups_on_content_derived_id() {
        let store = MemoryStore::in_memory();
        let content = serde_json::json!({"note": "hello"});
        let first = store.store(content.clone(), "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();
        let second = store.store(content, "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();
        assert_eq!(first.memory_id, second.memory_id);
        assert_eq!(second.access_count, 1);
    }

    #[tokio::test]
    async fn recall_by_tags_uses_intersection_semantics() {
        let store = MemoryStore::in_memory();
        let tags_a: HashSet<String> = ["search", "docs"].into_iter().map(str::to_owned).collect();
        let tags_b: HashSet<String> = ["search"].into_iter().map(str::to_owned).collect();
        store.store(serde_json::json!("a"), "general", 0.5, tags_a, HashSet::new()).await.unwrap();
        store.store(serde_json::json!("b"), "general", 0.5, tags_b, HashSet::new()).await.unwrap();

        let query_tags: HashSet<String> = ["search", "docs"].into_iter().map(str::to_owned).collect();
        let recalled = store.recall(None, None, Some(&query_tags), None, 10).await.unwrap();
        assert_eq!(recalled.len(), 1);
    }

    #[tokio::test]
    async fn forget_below_importance_bulk_removes() {
        let store = MemoryStore::in_memory();
        store.store(serde_json::json!("low"), "general", 0.1, HashSet::new(), HashSet::new()).await.unwrap();
        store.store(serde_json::json!("high"), "general", 0.9, HashSet::new(), HashSet::new()).await.unwrap();

        let forgotten = store.forget(None, Some(0.5)).await;
        assert_eq!(forgotten, 1);
        assert_eq!(store.stats().await.total_memories, 1);
    }

    #[tokio::test]
    async fn link_is_symmetric() {
        let store = MemoryStore::in_memory();
        let a = store.store(serde_json::json!("a"), "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();
        let b = store.store(serde_json::json!("b"), "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();
        assert!(store.link(&a.memory_id, &b.memory_id).await);

        let recalled_a = store.recall(Some(&a.memory_id), None, None, None, 1).await.unwrap();
        assert!(recalled_a[0].links.contains(&b.memory_id));
    }

    #[tokio::test]
    async fn compress_links_back_to_every_source_memory() {
        let store = MemoryStore::in_memory();
        let a = store.store(serde_json::json!("a"), "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();
        let b = store.store(serde_json::json!("b"), "general", 0.5, HashSet::new(), HashSet::new()).await.unwrap();

        let compressed = store.compress(&[a.memory_id.clone(), b.memory_id.clone()], "summary").await.unwrap();
        let recalled = store.recall(Some(&compressed.memory_id), None, None, None, 1).await.unwrap();
        assert!(recalled[0].links.contains(&a.memory_id));
        assert!(recalled[0].links.contains(&b.memory_id));
    }

    #[tokio::test]
    async fn match_patterns_supports_regex_trigger_conditions() {
        let store = MemoryStore::in_memory();
        let mut conditions = HashMap::new();
        conditions.insert("path".to_owned(), serde_json::json!({"$regex": "^/api/.*"}));
        store.recognize_pattern("route", conditions, None).await.unwrap();

        let mut context = HashMap::new();
        context.insert("path".to_owned(), serde_json::json!("/api/search"));
        let matched = store.match_patterns(&context).await;
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].occurrences, 1);
    }

    #[tokio::test]
    async fn recognize_pattern_is_idempotent_on_identical_conditions() {
        let store = MemoryStore::in_memory();
        let mut conditions = HashMap::new();
        conditions.insert("key".to_owned(), serde_json::json!("value"));
        let first = store.recognize_pattern("kind", conditions.clone(), None).await.unwrap();
        let second = store.recognize_pattern("kind", conditions, None).await.unwrap();
        assert_eq!(first.pattern_id, second.pattern_id);
        assert_eq!(second.occurrences, 1);
    }
}
