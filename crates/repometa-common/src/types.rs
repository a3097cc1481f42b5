//! Core type definitions for RepoMeta
//!
//! This module defines the repository schema descriptors held by the
//! metadata cache and the request kinds recorded by the audit log.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Well-known top-level schema categories
///
/// Every repository class belongs to exactly one of these roots. The cache
/// always carries a bucket for each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum RootClass {
    #[display("Document")]
    Document,
    #[display("Folder")]
    Folder,
    #[display("Annotation")]
    Annotation,
    #[display("CustomObject")]
    CustomObject,
}

impl RootClass {
    /// All well-known root classes, in bucket initialization order
    pub const ALL: [Self; 4] = [
        Self::Document,
        Self::Folder,
        Self::Annotation,
        Self::CustomObject,
    ];

    /// Symbolic name of the root class
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "Document",
            Self::Folder => "Folder",
            Self::Annotation => "Annotation",
            Self::CustomObject => "CustomObject",
        }
    }

    /// Parse a root class from its symbolic name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|root| root.as_str() == name)
    }
}

/// How far a cached class has been loaded
///
/// A class that is absent from the cache is implicitly unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum HydrationState {
    /// Seen through root-class discovery; properties not loaded yet
    #[display("discovered")]
    Discovered,
    /// Full property list loaded
    #[display("hydrated")]
    Hydrated,
}

/// Property data type as reported by the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "BINARY")]
    Binary,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "DATE")]
    DateTime,
    #[serde(rename = "DOUBLE")]
    Float64,
    #[serde(rename = "GUID")]
    Id,
    #[serde(rename = "LONG")]
    Integer32,
    #[serde(rename = "OBJECT")]
    Object,
    #[serde(rename = "STRING")]
    String,
    #[default]
    #[serde(rename = "UNKNOWN", other)]
    Unknown,
}

impl DataType {
    /// Comparison operators legal for a property of this type in a search predicate
    #[must_use]
    pub fn search_operators(self) -> Vec<SearchOperator> {
        use SearchOperator::{
            Contains, EndsWith, Equals, GreaterEqual, GreaterThan, LessEqual, LessThan, NotEqual,
            StartsWith,
        };

        match self {
            Self::String => vec![Equals, NotEqual, Contains, StartsWith, EndsWith],
            Self::Integer32 | Self::Float64 | Self::DateTime => vec![
                Equals,
                NotEqual,
                GreaterThan,
                LessThan,
                GreaterEqual,
                LessEqual,
            ],
            Self::Boolean | Self::Id => vec![Equals, NotEqual],
            Self::Object | Self::Binary | Self::Unknown => Vec::new(),
        }
    }
}

/// Whether a property holds a single value or several
///
/// Unrecognized wire values are read as single-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "LIST", alias = "ENUM")]
    Multi,
    #[default]
    #[serde(rename = "SINGLE", other)]
    Single,
}

/// Comparison operator usable in a search predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SearchOperator {
    #[serde(rename = "=")]
    #[display("=")]
    Equals,
    #[serde(rename = "!=")]
    #[display("!=")]
    NotEqual,
    #[serde(rename = ">")]
    #[display(">")]
    GreaterThan,
    #[serde(rename = "<")]
    #[display("<")]
    LessThan,
    #[serde(rename = ">=")]
    #[display(">=")]
    GreaterEqual,
    #[serde(rename = "<=")]
    #[display("<=")]
    LessEqual,
    #[serde(rename = "CONTAINS")]
    #[display("CONTAINS")]
    Contains,
    #[serde(rename = "STARTS")]
    #[display("STARTS")]
    StartsWith,
    #[serde(rename = "ENDS")]
    #[display("ENDS")]
    EndsWith,
}

/// Schema description of a single class property
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub symbolic_name: String,
    pub display_name: String,
    pub descriptive_text: String,
    pub data_type: DataType,
    pub cardinality: Cardinality,
    pub is_searchable: bool,
    pub is_system_owned: bool,
    pub is_hidden: bool,
    pub valid_search_operators: Vec<SearchOperator>,
}

/// Schema description of a repository class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDescriptor {
    /// Stable identifier, unique across every root bucket
    pub symbolic_name: String,
    pub display_name: String,
    pub descriptive_text: String,
    /// Property whose value supplies an object's human-readable name
    pub name_property_symbolic_name: Option<String>,
    /// Ordered property list; only meaningful once `state` is `Hydrated`
    pub property_descriptions: Vec<PropertyDescriptor>,
    pub state: HydrationState,
}

impl ClassDescriptor {
    /// Create a descriptor for a class seen through root-class discovery
    #[must_use]
    pub fn discovered(
        symbolic_name: impl Into<String>,
        display_name: impl Into<String>,
        descriptive_text: impl Into<String>,
    ) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            display_name: display_name.into(),
            descriptive_text: descriptive_text.into(),
            name_property_symbolic_name: None,
            property_descriptions: Vec::new(),
            state: HydrationState::Discovered,
        }
    }

    /// Create a descriptor for a class that was never discovered
    ///
    /// The symbolic name doubles as the display name.
    #[must_use]
    pub fn placeholder(symbolic_name: impl Into<String>) -> Self {
        let symbolic_name = symbolic_name.into();
        Self::discovered(symbolic_name.clone(), symbolic_name, "")
    }

    /// Replace the property list and mark the class hydrated
    pub fn hydrate(
        &mut self,
        property_descriptions: Vec<PropertyDescriptor>,
        name_property_symbolic_name: Option<String>,
    ) {
        self.property_descriptions = property_descriptions;
        self.name_property_symbolic_name = name_property_symbolic_name;
        self.state = HydrationState::Hydrated;
    }

    /// Check if the full property list has been loaded
    #[must_use]
    pub fn is_hydrated(&self) -> bool {
        self.state == HydrationState::Hydrated
    }
}

/// How a reported name-property index of zero is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamePropertyIndex {
    /// Zero means "no name property" (repository servers report 0 when unset)
    #[default]
    ZeroIsUnset,
    /// Zero refers to the first property
    ZeroBased,
}

impl NamePropertyIndex {
    /// Resolve a reported index to a position in a property list of `len` entries
    #[must_use]
    pub fn resolve(self, index: Option<i64>, len: usize) -> Option<usize> {
        let index = index?;
        if index == 0 && self == Self::ZeroIsUnset {
            return None;
        }
        usize::try_from(index).ok().filter(|&i| i < len)
    }
}

/// Kind of outbound request recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    #[display("EXPORT_QUERY")]
    ExportQuery,
    #[display("DISCOVERY_QUERY")]
    DiscoveryQuery,
    #[display("IMPORT_MUTATION")]
    ImportMutation,
    #[display("METADATA_QUERY")]
    MetadataQuery,
    #[display("REFERENCED_OBJECT_RETRIEVAL")]
    ReferencedObjectRetrieval,
    #[display("UPDATE_OOO_PROPERTIES")]
    UpdateOooProperties,
    #[display("UTIL_QUERY_ALL")]
    UtilQueryAll,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_class_parse() {
        assert_eq!(RootClass::parse("Folder"), Some(RootClass::Folder));
        assert_eq!(RootClass::parse("folder"), None);
        assert_eq!(RootClass::CustomObject.to_string(), "CustomObject");
    }

    #[test]
    fn test_search_operators_by_type() {
        assert!(DataType::String
            .search_operators()
            .contains(&SearchOperator::Contains));
        assert!(!DataType::Integer32
            .search_operators()
            .contains(&SearchOperator::Contains));
        assert_eq!(
            DataType::Boolean.search_operators(),
            vec![SearchOperator::Equals, SearchOperator::NotEqual]
        );
        assert!(DataType::Object.search_operators().is_empty());
    }

    #[test]
    fn test_data_type_wire_names() {
        let t: DataType = serde_json::from_str("\"LONG\"").unwrap();
        assert_eq!(t, DataType::Integer32);
        let t: DataType = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(t, DataType::Unknown);
        let c: Cardinality = serde_json::from_str("\"ENUM\"").unwrap();
        assert_eq!(c, Cardinality::Multi);
    }

    #[test]
    fn test_name_property_index_zero_is_unset() {
        let policy = NamePropertyIndex::ZeroIsUnset;
        assert_eq!(policy.resolve(Some(0), 3), None);
        assert_eq!(policy.resolve(Some(2), 3), Some(2));
        assert_eq!(policy.resolve(None, 3), None);
    }

    #[test]
    fn test_name_property_index_zero_based() {
        let policy = NamePropertyIndex::ZeroBased;
        assert_eq!(policy.resolve(Some(0), 3), Some(0));
        assert_eq!(policy.resolve(Some(3), 3), None);
        assert_eq!(policy.resolve(Some(-1), 3), None);
    }

    #[test]
    fn test_class_descriptor_hydrate() {
        let mut class = ClassDescriptor::placeholder("Invoice");
        assert_eq!(class.display_name, "Invoice");
        assert!(!class.is_hydrated());

        class.hydrate(Vec::new(), None);
        assert!(class.is_hydrated());
        assert!(class.property_descriptions.is_empty());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::MetadataQuery.to_string(), "METADATA_QUERY");
        assert_eq!(
            serde_json::to_string(&Operation::UpdateOooProperties).unwrap(),
            "\"UPDATE_OOO_PROPERTIES\""
        );
    }
}
