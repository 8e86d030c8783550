//! Process-wide bundle table.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard, RwLock};

use crate::bundle::BundleDescriptor;
use crate::config::BundleConfig;

#[derive(Debug, Clone)]
pub enum BundleEntry {
    /// Declared in config or found in the bundles directory, not loaded yet.
    Pending(BundleConfig),
    Loaded(Arc<BundleDescriptor>),
}

/// Bundles keyed by name, in declaration order.
///
/// Loads are serialized through a gate so a bundle's side effects run at
/// most once even when two requests race for it. The gate is re-entrant so a
/// bundle factory may load other bundles.
#[derive(Default)]
pub struct BundleRegistry {
    entries: RwLock<IndexMap<String, BundleEntry>>,
    load_gate: ReentrantMutex<()>,
}

impl BundleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config<'a>(bundles: impl IntoIterator<Item = (&'a String, &'a BundleConfig)>) -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.entries.write();
            for (name, conf) in bundles {
                entries.insert(name.clone(), BundleEntry::Pending(conf.clone()));
            }
        }
        registry
    }

    /// Every known name, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn loaded(&self, name: &str) -> Option<Arc<BundleDescriptor>> {
        match self.entries.read().get(name) {
            Some(BundleEntry::Loaded(descriptor)) => Some(descriptor.clone()),
            _ => None,
        }
    }

    /// Declared settings of a bundle that has not been loaded yet.
    pub fn declared(&self, name: &str) -> Option<BundleConfig> {
        match self.entries.read().get(name) {
            Some(BundleEntry::Pending(conf)) => Some(conf.clone()),
            _ => None,
        }
    }

    /// Names of declared bundles flagged for startup loading.
    pub fn preload_names(&self) -> Vec<String> {
        self.entries
            .read()
            .iter()
            .filter_map(|(name, entry)| match entry {
                BundleEntry::Pending(conf) if conf.pre_load => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Known names followed by `segment` when it names nothing known yet.
    /// The registry itself is left untouched.
    pub fn candidates(&self, segment: &str) -> Vec<String> {
        let entries = self.entries.read();
        let mut names: Vec<String> = entries.keys().cloned().collect();
        if !segment.is_empty() && !entries.contains_key(segment) {
            names.push(segment.to_string());
        }
        names
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn insert_loaded(&self, descriptor: Arc<BundleDescriptor>) {
        self.entries
            .write()
            .insert(descriptor.name.clone(), BundleEntry::Loaded(descriptor));
    }

    pub fn lock_loading(&self) -> ReentrantMutexGuard<'_, ()> {
        self.load_gate.lock()
    }
}
