//! Class metadata cache
//!
//! Class descriptors are grouped into buckets keyed by root class name. The
//! four well-known root buckets always exist; other buckets are created on
//! first use. A secondary index maps every cached class to the bucket that
//! owns it, so a class name is never present in two buckets at once.

use parking_lot::RwLock;
use repometa_common::{ClassDescriptor, RootClass};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type Bucket = BTreeMap<String, ClassDescriptor>;

#[derive(Debug)]
struct CacheState {
    /// Root class name -> (class symbolic name -> descriptor)
    buckets: BTreeMap<String, Bucket>,
    /// Class symbolic name -> owning root class name
    owners: HashMap<String, String>,
}

impl CacheState {
    fn with_default_roots() -> Self {
        Self {
            buckets: RootClass::ALL
                .iter()
                .map(|root| (root.as_str().to_string(), Bucket::new()))
                .collect(),
            owners: HashMap::new(),
        }
    }

    fn bucket_mut(&mut self, root: &str) -> &mut Bucket {
        self.buckets.entry(root.to_string()).or_default()
    }

    fn insert(&mut self, root: &str, symbolic_name: &str, descriptor: ClassDescriptor) {
        if let Some(previous) = self.owners.get(symbolic_name)
            && previous != root
        {
            debug!(
                "Moving class {} from root {} to {}",
                symbolic_name, previous, root
            );
            if let Some(bucket) = self.buckets.get_mut(previous) {
                bucket.remove(symbolic_name);
            }
        }

        self.bucket_mut(root)
            .insert(symbolic_name.to_string(), descriptor);
        self.owners
            .insert(symbolic_name.to_string(), root.to_string());
    }
}

/// Shared cache of repository class descriptors
///
/// All accessors take `&self` and return owned copies, so the cache can be
/// shared between tasks behind an `Arc`.
#[derive(Debug)]
pub struct MetadataCache {
    state: RwLock<CacheState>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataCache {
    /// Create a cache holding the four well-known (empty) root buckets
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState::with_default_roots()),
        }
    }

    /// Create an empty bucket for `root` if it does not exist yet
    pub fn ensure_root_class_exists(&self, root: &str) {
        if self.state.read().buckets.contains_key(root) {
            return;
        }
        self.state.write().bucket_mut(root);
    }

    /// Snapshot of the bucket for `root`, creating it if absent
    pub fn get_class_cache(&self, root: &str) -> BTreeMap<String, ClassDescriptor> {
        if let Some(bucket) = self.state.read().buckets.get(root) {
            return bucket.clone();
        }
        self.state.write().bucket_mut(root).clone()
    }

    /// Check whether the bucket for `root` is missing or holds no class
    #[must_use]
    pub fn is_root_empty(&self, root: &str) -> bool {
        self.state
            .read()
            .buckets
            .get(root)
            .is_none_or(BTreeMap::is_empty)
    }

    /// Descriptor for `symbolic_name` in exactly the `root` bucket
    #[must_use]
    pub fn get_class_data(&self, root: &str, symbolic_name: &str) -> Option<ClassDescriptor> {
        self.state
            .read()
            .buckets
            .get(root)
            .and_then(|bucket| bucket.get(symbolic_name))
            .cloned()
    }

    /// Insert or overwrite a descriptor
    ///
    /// The bucket is created if missing. If the class is currently owned by
    /// another root it is moved out of that bucket.
    pub fn set_class_data(&self, root: &str, symbolic_name: &str, descriptor: ClassDescriptor) {
        self.state.write().insert(root, symbolic_name, descriptor);
    }

    /// Insert a batch of discovered descriptors into `root` under a single
    /// write lock
    ///
    /// Readers observe either none or all of the batch. A class already
    /// hydrated anywhere in the cache keeps its cached descriptor (moved to
    /// `root` if another root owned it), so hydration is never undone.
    pub fn set_classes<I>(&self, root: &str, descriptors: I)
    where
        I: IntoIterator<Item = (String, ClassDescriptor)>,
    {
        let mut state = self.state.write();
        state.bucket_mut(root);
        for (symbolic_name, descriptor) in descriptors {
            let hydrated = state
                .owners
                .get(&symbolic_name)
                .and_then(|owner| state.buckets.get(owner))
                .and_then(|bucket| bucket.get(&symbolic_name))
                .filter(|existing| existing.is_hydrated())
                .cloned();
            state.insert(root, &symbolic_name, hydrated.unwrap_or(descriptor));
        }
    }

    /// Root class that owns `symbolic_name`, if any
    #[must_use]
    pub fn find_root_class_for_class(&self, symbolic_name: &str) -> Option<String> {
        self.state.read().owners.get(symbolic_name).cloned()
    }

    /// Class symbolic names cached under `root` (sorted)
    #[must_use]
    pub fn get_all_keys_for_root(&self, root: &str) -> Vec<String> {
        self.state
            .read()
            .buckets
            .get(root)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of every root bucket (sorted)
    #[must_use]
    pub fn get_root_class_keys(&self) -> Vec<String> {
        self.state.read().buckets.keys().cloned().collect()
    }

    /// Total number of cached classes across all buckets
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.state.read().owners.len()
    }

    /// Discard everything and restore the four empty root buckets
    pub fn reset(&self) {
        *self.state.write() = CacheState::with_default_roots();
        debug!("Metadata cache reset");
    }

    /// Diagnostic snapshot of the cache layout
    ///
    /// `{root: {class: {display_name, descriptive_text, properties_count, state}}}`
    #[must_use]
    pub fn structure(&self) -> Value {
        let state = self.state.read();
        let mut roots = Map::new();
        for (root, bucket) in &state.buckets {
            let classes: Map<String, Value> = bucket
                .iter()
                .map(|(name, class)| {
                    (
                        name.clone(),
                        json!({
                            "display_name": class.display_name,
                            "descriptive_text": class.descriptive_text,
                            "properties_count": class.property_descriptions.len(),
                            "state": class.state,
                        }),
                    )
                })
                .collect();
            roots.insert(root.clone(), Value::Object(classes));
        }
        Value::Object(roots)
    }
}
