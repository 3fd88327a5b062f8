use std::collections::HashMap;

use log::debug;

use crate::model::LoadedSheet;

/// Cache key: workbook file stem + sheet name. Re-uploading the same file
/// replaces the cached sheet rather than duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file_stem: String,
    pub sheet_name: String,
}

/// Bounded cache of loaded sheets, owned by whoever drives ingestion.
///
/// Eviction is LRU by load timestamp: when the cache is full and a new key
/// arrives, the sheet loaded longest ago is dropped. Replacing an existing
/// key never evicts.
#[derive(Debug)]
pub struct SheetCache {
    capacity: usize,
    entries: HashMap<CacheKey, LoadedSheet>,
}

impl SheetCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&LoadedSheet> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: CacheKey, sheet: LoadedSheet) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, sheet);
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(key, sheet)| (sheet.meta.loaded_at, key.file_stem.clone(), key.sheet_name.clone()))
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!("sheet cache full, evicting {}::{}", key.file_stem, key.sheet_name);
            self.entries.remove(&key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &LoadedSheet)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SheetKind;
    use crate::model::SheetMeta;
    use chrono::{TimeZone, Utc};
    use daybook_engine::sheet::Sheet;

    fn key(stem: &str, name: &str) -> CacheKey {
        CacheKey {
            file_stem: stem.into(),
            sheet_name: name.into(),
        }
    }

    fn sheet_loaded_at(secs: i64) -> LoadedSheet {
        LoadedSheet {
            meta: SheetMeta {
                source_file: "f.xlsx".into(),
                sheet_name: "s".into(),
                kind: SheetKind::Order,
                ambiguous: false,
                rows: 0,
                cols: 0,
                loaded_at: Utc.timestamp_opt(secs, 0).unwrap(),
            },
            sheet: Sheet::new("s", Vec::new()),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut cache = SheetCache::new(2);
        cache.insert(key("a", "s1"), sheet_loaded_at(100));
        cache.insert(key("b", "s1"), sheet_loaded_at(200));
        cache.insert(key("c", "s1"), sheet_loaded_at(300));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a", "s1")).is_none());
        assert!(cache.get(&key("b", "s1")).is_some());
        assert!(cache.get(&key("c", "s1")).is_some());
    }

    #[test]
    fn replacing_existing_key_does_not_evict() {
        let mut cache = SheetCache::new(2);
        cache.insert(key("a", "s1"), sheet_loaded_at(100));
        cache.insert(key("b", "s1"), sheet_loaded_at(200));
        cache.insert(key("a", "s1"), sheet_loaded_at(300));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("b", "s1")).is_some());
    }

    #[test]
    fn capacity_floor_is_one() {
        let mut cache = SheetCache::new(0);
        cache.insert(key("a", "s1"), sheet_loaded_at(100));
        assert_eq!(cache.len(), 1);
    }
}
