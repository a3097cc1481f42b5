//! Metadata loader
//!
//! Populates the `MetadataCache` from the remote repository:
//! - root-class discovery fetches a root class and its subclasses (names and
//!   descriptions only) the first time the root's bucket is requested
//! - property hydration fetches the full property list of one class on
//!   demand
//!
//! Concurrent requests for the same root or class are serialised through a
//! keyed lock so only one remote query is in flight per key. The cache is
//! only written after a successful response, so a failed, timed-out or
//! cancelled fetch leaves it untouched.

use crate::metadata::MetadataCache;
use parking_lot::Mutex;
use repometa_common::{
    Cardinality, ClassDescriptor, DataType, MetadataConfig, Operation, PropertyDescriptor,
    QueryExecutor, QueryResponse, ToolError,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

const ROOT_CLASS_QUERY: &str = r"
query getClassAndSubclasses($object_store_name: String!, $root_class_name: String!, $page_size: Int!) {
    classDescription(
        repositoryIdentifier: $object_store_name
        identifier: $root_class_name
    ) {
        symbolicName
        displayName
        descriptiveText
    }
    subClassDescriptions(
        repositoryIdentifier: $object_store_name
        identifier: $root_class_name
        pageSize: $page_size
    ) {
        classDescriptions {
            symbolicName
            displayName
            descriptiveText
        }
    }
}
";

const CLASS_PROPERTIES_QUERY: &str = r"
query getClassMetadata($object_store_name: String!, $class_symbolic_name: String!) {
    classDescription(
        repositoryIdentifier: $object_store_name
        identifier: $class_symbolic_name
    ) {
        namePropertyIndex
        propertyDescriptions {
            symbolicName
            displayName
            descriptiveText
            dataType
            cardinality
            isSearchable
            isSystemOwned
            isHidden
        }
    }
}
";

/// `data` payload of the root-class discovery query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RootClassData {
    class_description: Option<ClassSummary>,
    sub_class_descriptions: Option<ClassSummaryPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClassSummaryPage {
    class_descriptions: Option<Vec<ClassSummary>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClassSummary {
    symbolic_name: Option<String>,
    display_name: Option<String>,
    descriptive_text: Option<String>,
}

impl ClassSummary {
    fn into_descriptor(self, symbolic_name: String) -> ClassDescriptor {
        ClassDescriptor::discovered(
            symbolic_name,
            self.display_name.unwrap_or_default(),
            self.descriptive_text.unwrap_or_default(),
        )
    }
}

/// `data` payload of the property hydration query
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClassPropertiesData {
    class_description: Option<ClassProperties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ClassProperties {
    name_property_index: Option<i64>,
    property_descriptions: Option<Vec<RawProperty>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProperty {
    symbolic_name: Option<String>,
    display_name: Option<String>,
    descriptive_text: Option<String>,
    data_type: Option<DataType>,
    cardinality: Option<Cardinality>,
    is_searchable: Option<bool>,
    is_system_owned: Option<bool>,
    is_hidden: Option<bool>,
}

impl RawProperty {
    fn into_descriptor(self, symbolic_name: String) -> PropertyDescriptor {
        let data_type = self.data_type.unwrap_or_default();
        let is_searchable = self.is_searchable.unwrap_or(false);
        let valid_search_operators = if is_searchable {
            data_type.search_operators()
        } else {
            Vec::new()
        };

        PropertyDescriptor {
            display_name: self
                .display_name
                .unwrap_or_else(|| symbolic_name.clone()),
            symbolic_name,
            descriptive_text: self.descriptive_text.unwrap_or_default(),
            data_type,
            cardinality: self.cardinality.unwrap_or_default(),
            is_searchable,
            is_system_owned: self.is_system_owned.unwrap_or(false),
            is_hidden: self.is_hidden.unwrap_or(false),
            valid_search_operators,
        }
    }
}

/// Per-key async locks, removed once nobody holds or waits on them
#[derive(Debug, Default)]
struct InFlight {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    async fn acquire(&self, key: String) -> InFlightGuard<'_> {
        let lock = Arc::clone(self.locks.lock().entry(key.clone()).or_default());
        let guard = Arc::clone(&lock).lock_owned().await;
        InFlightGuard {
            owner: self,
            key,
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
    lock: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks.lock();
        // One reference in the map plus ours: no other holder or waiter
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.key)
                .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock))
        {
            locks.remove(&self.key);
        }
    }
}

/// Loads repository class metadata into a shared `MetadataCache`
pub struct MetadataLoader {
    executor: Arc<dyn QueryExecutor>,
    cache: Arc<MetadataCache>,
    config: MetadataConfig,
    in_flight: InFlight,
}

impl MetadataLoader {
    /// Create a loader over the given executor and cache
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        cache: Arc<MetadataCache>,
        config: MetadataConfig,
    ) -> Self {
        Self {
            executor,
            cache,
            config,
            in_flight: InFlight::default(),
        }
    }

    /// The cache this loader populates
    #[must_use]
    pub const fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Make sure the bucket for `root` is populated
    ///
    /// A bucket holding any class counts as populated and is never
    /// re-fetched. Otherwise one query fetches the root class plus up to
    /// `subclass_page_size` subclasses, all stored unhydrated.
    pub async fn load_root_class(&self, root: &str) -> Result<(), ToolError> {
        self.cache.ensure_root_class_exists(root);
        if !self.cache.is_root_empty(root) {
            debug!("Root class cache hit: {}", root);
            return Ok(());
        }

        let _guard = self.in_flight.acquire(format!("root:{root}")).await;
        if !self.cache.is_root_empty(root) {
            debug!("Root class {} populated by concurrent request", root);
            return Ok(());
        }

        debug!("Root class cache miss: {}", root);
        let variables = json!({
            "object_store_name": self.executor.object_store(),
            "root_class_name": root,
            "page_size": self.config.subclass_page_size,
        });

        let response = self
            .executor
            .execute(Operation::MetadataQuery, ROOT_CLASS_QUERY, variables)
            .await
            .map_err(|e| discovery_failure(root, &e.to_string()))?;
        if response.has_errors() {
            return Err(discovery_failure(root, &response.error_message()));
        }

        let data: RootClassData = decode_data(response).map_err(|e| {
            error!("Malformed class list for root {}: {}", root, e);
            ToolError::unexpected(format!("Failed to retrieve classes for {root}: {e}"))
                .with_suggestions(discovery_suggestions())
        })?;

        let subclasses = data
            .sub_class_descriptions
            .and_then(|page| page.class_descriptions)
            .unwrap_or_default();

        let mut descriptors = Vec::with_capacity(subclasses.len() + 1);
        if let Some(root_info) = data.class_description {
            let symbolic_name = root_info
                .symbolic_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| root.to_string());
            // Stored under the requested root name
            descriptors.push((root.to_string(), root_info.into_descriptor(symbolic_name)));
        }
        for subclass in subclasses {
            match subclass.symbolic_name.clone().filter(|name| !name.is_empty()) {
                Some(symbolic_name) => {
                    let descriptor = subclass.into_descriptor(symbolic_name.clone());
                    descriptors.push((symbolic_name, descriptor));
                }
                None => warn!("Skipping subclass of {} without a symbolic name", root),
            }
        }

        if descriptors.is_empty() {
            return Err(ToolError::not_found(format!(
                "No classes found for root class type '{root}'"
            ))
            .with_suggestions([
                "Check if the root class type is correct",
                "Verify that classes of this type exist in the repository",
            ]));
        }

        let count = descriptors.len();
        self.cache.set_classes(root, descriptors);
        info!("Discovered {} classes for root {}", count, root);
        Ok(())
    }

    /// Return the descriptor of `symbolic_name` with its full property list
    ///
    /// A hydrated class is returned from the cache without any query. A
    /// class that was never discovered is hydrated into a standalone
    /// descriptor that is returned but not cached.
    pub async fn load_class_properties(
        &self,
        symbolic_name: &str,
    ) -> Result<ClassDescriptor, ToolError> {
        if let Some(class) = self.cached_hydrated(symbolic_name) {
            debug!("Class metadata cache hit: {}", symbolic_name);
            return Ok(class);
        }

        let _guard = self
            .in_flight
            .acquire(format!("class:{symbolic_name}"))
            .await;
        if let Some(class) = self.cached_hydrated(symbolic_name) {
            debug!("Class {} hydrated by concurrent request", symbolic_name);
            return Ok(class);
        }

        let root = self.cache.find_root_class_for_class(symbolic_name);
        debug!(
            "Class metadata cache miss: {} (root: {:?})",
            symbolic_name, root
        );

        let variables = json!({
            "object_store_name": self.executor.object_store(),
            "class_symbolic_name": symbolic_name,
        });

        let response = self
            .executor
            .execute(Operation::MetadataQuery, CLASS_PROPERTIES_QUERY, variables)
            .await
            .map_err(|e| hydration_failure(symbolic_name, &e.to_string()))?;
        if response.has_errors() {
            return Err(hydration_failure(symbolic_name, &response.error_message()));
        }

        let data: ClassPropertiesData = decode_data(response).map_err(|e| {
            error!("Malformed metadata for class {}: {}", symbolic_name, e);
            ToolError::unexpected(format!(
                "Failed to retrieve metadata for class {symbolic_name}: {e}"
            ))
            .with_suggestions(hydration_suggestions())
        })?;

        // A class description without a property list is not usable data;
        // an explicit empty list is a class with zero properties
        let Some((name_property_index, raw)) = data
            .class_description
            .and_then(|class| Some((class.name_property_index, class.property_descriptions?)))
        else {
            return Err(ToolError::not_found(format!("Class '{symbolic_name}' not found"))
                .with_suggestions([
                    "Check the class name",
                    "Use get_root_class_description to see available classes",
                ]));
        };

        // The index points into the list as returned, before any row is dropped
        let name_property = self
            .config
            .name_property_index
            .resolve(name_property_index, raw.len())
            .and_then(|i| raw.get(i))
            .and_then(|prop| prop.symbolic_name.clone());

        let properties: Vec<PropertyDescriptor> = raw
            .into_iter()
            .filter_map(|prop| match prop.symbolic_name.clone() {
                Some(name) if !name.is_empty() => Some(prop.into_descriptor(name)),
                _ => {
                    warn!("Skipping property of {} without a symbolic name", symbolic_name);
                    None
                }
            })
            .collect();

        let existing = root
            .as_deref()
            .and_then(|root| self.cache.get_class_data(root, symbolic_name));

        match (root, existing) {
            (Some(root), Some(mut class)) => {
                class.hydrate(properties, name_property);
                self.cache.set_class_data(&root, symbolic_name, class.clone());
                info!(
                    "Hydrated class {} ({} properties)",
                    symbolic_name,
                    class.property_descriptions.len()
                );
                Ok(class)
            }
            _ => {
                let mut class = ClassDescriptor::placeholder(symbolic_name);
                class.hydrate(properties, name_property);
                debug!(
                    "Class {} has no known root; returning uncached descriptor",
                    symbolic_name
                );
                Ok(class)
            }
        }
    }

    fn cached_hydrated(&self, symbolic_name: &str) -> Option<ClassDescriptor> {
        let root = self.cache.find_root_class_for_class(symbolic_name)?;
        self.cache
            .get_class_data(&root, symbolic_name)
            .filter(ClassDescriptor::is_hydrated)
    }
}

fn decode_data<T: DeserializeOwned + Default>(
    response: QueryResponse,
) -> Result<T, serde_json::Error> {
    match response.data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(data) => serde_json::from_value(data),
    }
}

const fn discovery_suggestions() -> [&'static str; 2] {
    [
        "Verify the root class type is correct",
        "Check your connection to the repository",
    ]
}

const fn hydration_suggestions() -> [&'static str; 2] {
    [
        "Verify the class name is correct",
        "Check your connection to the repository",
    ]
}

fn discovery_failure(root: &str, cause: &str) -> ToolError {
    ToolError::remote_failure(format!("Failed to retrieve classes for {root}: {cause}"))
        .with_suggestions(discovery_suggestions())
}

fn hydration_failure(symbolic_name: &str, cause: &str) -> ToolError {
    ToolError::remote_failure(format!(
        "Failed to retrieve metadata for class {symbolic_name}: {cause}"
    ))
    .with_suggestions(hydration_suggestions())
}
