//! Append-only record of every opportunity the pipeline has produced.
//!
//! Memory is unique by deal URL and only ever grows. It is the single source of
//! truth the scanner consults to avoid re-processing a listing. When opened with
//! [`Memory::load`] each accepted append is mirrored to a JSON file in the same
//! `[{"deal": {..}, "estimate": .., "discount": ..}]` shape older runs wrote.

use deal_core::{DealError, Opportunity};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Memory file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<MemoryError> for DealError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Io(e) => DealError::Io(e),
            MemoryError::Serialization(e) => DealError::Serialization(e),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    opportunities: Vec<Opportunity>,
    urls: HashSet<String>,
}

impl MemoryState {
    fn insert(&mut self, opportunity: Opportunity) -> bool {
        if !self.urls.insert(opportunity.url().to_string()) {
            return false;
        }
        self.opportunities.push(opportunity);
        true
    }
}

pub struct Memory {
    state: RwLock<MemoryState>,
    path: Option<PathBuf>,
    // Serializes file rewrites so a slower writer never overwrites a newer snapshot.
    persist_lock: tokio::sync::Mutex<()>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// In-process memory with no backing file.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            path: None,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed from existing records; later duplicates of a URL are ignored.
    pub fn from_opportunities(opportunities: impl IntoIterator<Item = Opportunity>) -> Self {
        let mut state = MemoryState::default();
        for opportunity in opportunities {
            state.insert(opportunity);
        }
        Self {
            state: RwLock::new(state),
            ..Self::new()
        }
    }

    /// Open a file-backed memory. A missing file starts an empty memory at that path.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, MemoryError> {
        let path = path.into();
        let records: Vec<Opportunity> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut memory = Self::from_opportunities(records);
        tracing::info!(
            "Loaded {} opportunities from {}",
            memory.len(),
            path.display()
        );
        memory.path = Some(path);
        Ok(memory)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has(&self, url: &str) -> bool {
        self.read(|state| state.urls.contains(url))
    }

    /// Append an opportunity. Returns `false`, leaving memory untouched, when its
    /// URL is already present.
    pub async fn append(&self, opportunity: Opportunity) -> bool {
        let url = opportunity.url().to_string();
        let inserted = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            state.insert(opportunity)
        };

        if !inserted {
            tracing::debug!("Memory already holds {}", url);
            return false;
        }

        if let Some(path) = &self.path {
            if let Err(e) = self.persist(path).await {
                tracing::warn!("Failed to persist memory to {}: {}", path.display(), e);
            }
        }
        true
    }

    /// Snapshot of every opportunity in insertion order.
    pub fn all(&self) -> Vec<Opportunity> {
        self.read(|state| state.opportunities.clone())
    }

    /// The most recent `n` opportunities, oldest first.
    pub fn last(&self, n: usize) -> Vec<Opportunity> {
        self.read(|state| {
            let start = state.opportunities.len().saturating_sub(n);
            state.opportunities[start..].to_vec()
        })
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.opportunities.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    async fn persist(&self, path: &Path) -> Result<(), MemoryError> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.all();
        let body = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_core::{Category, Deal};

    fn opportunity(url: &str, discount: f64) -> Opportunity {
        Opportunity::new(
            Deal {
                product_description: format!("Product at {}", url),
                price: 1000.0,
                url: url.to_string(),
                category: Category::Electronics,
            },
            1000.0 + discount,
        )
    }

    #[tokio::test]
    async fn test_append_is_unique_by_url() {
        let memory = Memory::new();
        assert!(memory.append(opportunity("https://a", 10.0)).await);
        assert!(!memory.append(opportunity("https://a", 99.0)).await);
        assert!(memory.append(opportunity("https://b", 5.0)).await);

        assert_eq!(memory.len(), 2);
        assert!(memory.has("https://a"));
        // The first record for a URL wins.
        assert!((memory.all()[0].discount - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_last_returns_most_recent_in_order() {
        let memory = Memory::new();
        for i in 0..7 {
            memory.append(opportunity(&format!("https://{}", i), i as f64)).await;
        }
        let urls: Vec<String> = memory.last(3).iter().map(|o| o.url().to_string()).collect();
        assert_eq!(urls, vec!["https://4", "https://5", "https://6"]);
        assert_eq!(memory.last(50).len(), 7);
    }

    #[test]
    fn test_from_opportunities_drops_duplicates() {
        let memory = Memory::from_opportunities(vec![
            opportunity("https://x", 1.0),
            opportunity("https://x", 2.0),
        ]);
        assert_eq!(memory.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let memory = Memory::load(dir.path().join("memory.json")).await.unwrap();
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_appends_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");

        let memory = Memory::load(&path).await.unwrap();
        memory.append(opportunity("https://a", 10.0)).await;
        memory.append(opportunity("https://b", 20.0)).await;

        let reloaded = Memory::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.has("https://b"));
    }

    #[tokio::test]
    async fn test_load_legacy_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(
            &path,
            r#"[{"deal":{"product_description":"Boat Rockerz 450","price":1299.0,"url":"https://d/1","domain":"Headphones"},"estimate":2075.0,"discount":776.0}]"#,
        )
        .unwrap();

        let memory = Memory::load(&path).await.unwrap();
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.all()[0].deal.category, Category::Headphones);
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            Memory::load(&path).await,
            Err(MemoryError::Serialization(_))
        ));
    }
}
