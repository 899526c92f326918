use super::{RenderFormat, RenderedScore};
use crate::music::{Key, Score};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

pub const DEFAULT_RENDER_CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreRole {
    Original,
    Transposed,
}

impl ScoreRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreRole::Original => "original",
            ScoreRole::Transposed => "transposed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderCacheKey {
    pub title: String,
    pub role: ScoreRole,
    pub target_key: Key,
    pub format: RenderFormat,
    score_fingerprint: u64,
}

impl RenderCacheKey {
    pub fn new(
        title: &str,
        role: ScoreRole,
        target_key: Key,
        format: RenderFormat,
        score: &Score,
    ) -> Self {
        Self {
            title: title.to_string(),
            role,
            target_key,
            format,
            score_fingerprint: fingerprint(score),
        }
    }
}

fn fingerprint(score: &Score) -> u64 {
    let mut hasher = DefaultHasher::new();
    for note in score.notes() {
        note.pitch().hash(&mut hasher);
        note.duration().to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded map of finished renders. The oldest entry is dropped first.
#[derive(Debug)]
pub struct RenderCache {
    entries: HashMap<RenderCacheKey, RenderedScore>,
    insertion_order: VecDeque<RenderCacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(DEFAULT_RENDER_CACHE_CAPACITY)
    }
}

impl RenderCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            insertion_order: VecDeque::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a render and counts the hit or miss.
    pub fn get(&mut self, key: &RenderCacheKey) -> Option<RenderedScore> {
        match self.entries.get(key) {
            Some(rendered) => {
                self.hits += 1;
                Some(rendered.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: RenderCacheKey, rendered: RenderedScore) {
        if self.entries.insert(key.clone(), rendered).is_some() {
            return;
        }
        self.insertion_order.push_back(key);
        while self.insertion_order.len() > self.capacity {
            if let Some(oldest) = self.insertion_order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.insertion_order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::{create_music_score, NoteEvent};

    fn score(pitch: i32) -> Score {
        create_music_score(vec![NoteEvent::new(pitch, 1.0).unwrap()])
    }

    fn rendered(text: &str) -> RenderedScore {
        RenderedScore {
            media_type: "text/plain",
            bytes: text.as_bytes().to_vec(),
        }
    }

    fn key(title: &str, role: ScoreRole, pitch: i32) -> RenderCacheKey {
        RenderCacheKey::new(title, role, Key::C, RenderFormat::Abc, &score(pitch))
    }

    #[test]
    fn roles_are_cached_separately() {
        let mut cache = RenderCache::default();
        cache.insert(key("tune", ScoreRole::Original, 60), rendered("original"));
        assert_eq!(cache.get(&key("tune", ScoreRole::Transposed, 60)), None);
        assert_eq!(
            cache.get(&key("tune", ScoreRole::Original, 60)),
            Some(rendered("original"))
        );
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn same_title_with_different_notes_misses() {
        let mut cache = RenderCache::default();
        cache.insert(key("tune", ScoreRole::Original, 60), rendered("first"));
        assert_eq!(cache.get(&key("tune", ScoreRole::Original, 62)), None);
    }

    #[test]
    fn oldest_entry_is_evicted() {
        let mut cache = RenderCache::new(2);
        cache.insert(key("a", ScoreRole::Original, 60), rendered("a"));
        cache.insert(key("b", ScoreRole::Original, 60), rendered("b"));
        cache.insert(key("c", ScoreRole::Original, 60), rendered("c"));
        assert_eq!(cache.stats().entries, 2);
        assert_eq!(cache.get(&key("a", ScoreRole::Original, 60)), None);
        assert!(cache.get(&key("c", ScoreRole::Original, 60)).is_some());

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
