//! Per-instance registry result cache.
//!
//! Lives exactly as long as its [`PackageManager`](super::PackageManager).
//! Reads are concurrent; two racing fetches of the same key both insert and
//! the last write wins.

use super::registry::{PackageManifest, PackageMetadata};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock};

/// Slot name used for package-level metadata entries.
pub const METADATA_SLOT: &str = "metadata";

/// Cache key. The registry is part of the key so cross-registry lookups never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    /// Requested version or range, or [`METADATA_SLOT`].
    pub slot: String,
    /// Registry override; `None` is the manager's configured default.
    pub registry: Option<String>,
}

impl CacheKey {
    #[must_use]
    pub fn manifest(name: &str, version: &str, registry: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            slot: version.to_string(),
            registry: registry.map(str::to_string),
        }
    }

    #[must_use]
    pub fn metadata(name: &str, registry: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            slot: METADATA_SLOT.to_string(),
            registry: registry.map(str::to_string),
        }
    }
}

/// A "not found" answer is cached as `None`.
type Entries<T> = RwLock<HashMap<CacheKey, Option<Arc<T>>>>;

/// Registry manifests and metadata fetched by one package manager.
#[derive(Debug, Default)]
pub struct RegistryCache {
    manifests: Entries<PackageManifest>,
    metadata: Entries<PackageMetadata>,
}

fn get<K: Eq + Hash, V: Clone>(map: &RwLock<HashMap<K, V>>, key: &K) -> Option<V> {
    map.read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn insert<K: Eq + Hash, V>(map: &RwLock<HashMap<K, V>>, key: K, value: V) {
    map.write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key, value);
}

impl RegistryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(entry)` on a hit, where `entry` may itself be a cached "not found".
    #[must_use]
    pub fn manifest(&self, key: &CacheKey) -> Option<Option<Arc<PackageManifest>>> {
        get(&self.manifests, key)
    }

    pub fn insert_manifest(&self, key: CacheKey, value: Option<Arc<PackageManifest>>) {
        insert(&self.manifests, key, value);
    }

    #[must_use]
    pub fn metadata(&self, key: &CacheKey) -> Option<Option<Arc<PackageMetadata>>> {
        get(&self.metadata, key)
    }

    pub fn insert_metadata(&self, key: CacheKey, value: Option<Arc<PackageMetadata>>) {
        insert(&self.metadata, key, value);
    }
}
