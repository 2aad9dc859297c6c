//! Persisted fetch metadata, keyed by URL.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::ResourceMetadata;

/// File name of the metadata store inside the cache directory.
pub const METADATA_FILE: &str = "fetch-metadata.json";

/// What was last recorded for every URL we have downloaded.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MetadataStore {
    #[serde(skip)]
    path: PathBuf,

    resources: BTreeMap<String, ResourceMetadata>,
}

impl MetadataStore {
    /// Load the store kept in `cache_dir`.
    pub fn in_cache_dir(cache_dir: &Path) -> Result<Self> {
        Self::load(&cache_dir.join(METADATA_FILE))
    }

    /// Load a store from `path`; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(MetadataStore {
                path: path.to_path_buf(),
                ..MetadataStore::default()
            });
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut store: MetadataStore = match serde_json::from_str(&content) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!("ignoring unreadable {}: {}", path.display(), e);
                MetadataStore::default()
            }
        };
        store.path = path.to_path_buf();
        Ok(store)
    }

    /// Write the store back to where it was loaded from.
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        crate::util::fs::write_string(&self.path, &content)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, url: &str) -> Option<&ResourceMetadata> {
        self.resources.get(url)
    }

    pub fn record(&mut self, url: &str, metadata: ResourceMetadata) {
        self.resources.insert(url.to_string(), metadata);
    }

    pub fn forget(&mut self, url: &str) -> Option<ResourceMetadata> {
        self.resources.remove(url)
    }
}
