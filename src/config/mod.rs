//! Configuration loading and management
//!
//! Two documents are loadable from YAML:
//! - [`JsonApiOptions`]: request pipeline behaviour (paging limits, links, error detail)
//! - [`ResourceGraphConfig`]: a declarative description of the resource graph

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::ConfigurationError;
use crate::core::field::AttrType;
use crate::core::resource::IdKind;
use crate::graph::{
    AttrCapabilities, AttrMetadata, RelationshipKind, RelationshipMetadata, ResourceGraph,
    ResourceGraphBuilder, ResourceTypeBuilder,
};

/// What to do with a `page[size]` above `maximum_page_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSizeOverflow {
    /// Fail the request with 400
    #[default]
    Reject,
    /// Silently use the maximum instead
    Clamp,
}

/// Options of the request pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonApiOptions {
    /// Route prefix, e.g. `api/v1`
    pub namespace: Option<String>,

    /// Render `links` objects in documents
    pub include_links: bool,

    /// Page size applied when the request gives none (None = unpaged)
    pub default_page_size: Option<usize>,

    pub maximum_page_size: Option<usize>,

    pub maximum_page_number: Option<usize>,

    pub page_size_overflow: PageSizeOverflow,

    /// Longest allowed include chain (None = unlimited)
    pub maximum_include_depth: Option<usize>,

    /// Count the primary collection and render `meta.total`
    pub include_total_resource_count: bool,

    /// Attach `meta.stackTrace` to error objects
    pub include_exception_stack_trace: bool,

    pub allow_client_generated_ids: bool,

    pub allow_unknown_query_string_parameters: bool,

    /// Filter and sort may only reference attributes inside a requested fieldset
    pub restrict_queries_to_fieldset: bool,
}

impl Default for JsonApiOptions {
    fn default() -> Self {
        Self {
            namespace: None,
            include_links: true,
            default_page_size: Some(10),
            maximum_page_size: None,
            maximum_page_number: None,
            page_size_overflow: PageSizeOverflow::Reject,
            maximum_include_depth: None,
            include_total_resource_count: false,
            include_exception_stack_trace: false,
            allow_client_generated_ids: false,
            allow_unknown_query_string_parameters: false,
            restrict_queries_to_fieldset: true,
        }
    }
}

impl JsonApiOptions {
    /// Load options from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load options from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validate()?;
        Ok(options)
    }

    /// Check that the paging options are consistent
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.default_page_size == Some(0) {
            return Err(ConfigurationError::InvalidOption {
                option: "default_page_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.maximum_page_size == Some(0) {
            return Err(ConfigurationError::InvalidOption {
                option: "maximum_page_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let (Some(default), Some(maximum)) = (self.default_page_size, self.maximum_page_size) {
            if default > maximum {
                return Err(ConfigurationError::InvalidOption {
                    option: "default_page_size".to_string(),
                    message: format!("{} exceeds maximum_page_size {}", default, maximum),
                });
            }
        }
        Ok(())
    }

    /// Route prefix with a leading slash and no trailing slash ("" when unset)
    pub fn base_path(&self) -> String {
        match self.namespace.as_deref().map(|n| n.trim_matches('/')) {
            Some(ns) if !ns.is_empty() => format!("/{}", ns),
            _ => String::new(),
        }
    }
}

// =============================================================================
// Resource graph configuration
// =============================================================================

/// Identifier format of a configured resource type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKindConfig {
    #[default]
    Integer,
    Uuid,
    String,
    Pattern(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: AttrType,

    /// Storage property name (defaults to `name`)
    #[serde(default)]
    pub property: Option<String>,

    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub capabilities: AttrCapabilities,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,

    pub kind: RelationshipKind,

    /// Public name of the target resource type
    pub target: String,

    #[serde(default)]
    pub property: Option<String>,

    #[serde(default = "default_true")]
    pub can_include: bool,

    #[serde(default)]
    pub through: Option<String>,

    /// Relationship on the target type that navigates back
    #[serde(default)]
    pub inverse: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    #[serde(default)]
    pub id: IdKindConfig,

    #[serde(default)]
    pub attributes: Vec<AttributeConfig>,

    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
}

/// Declarative description of a resource graph
///
/// # Example
///
/// ```yaml
/// resources:
///   - name: articles
///     attributes:
///       - { name: caption, type: string }
///     relationships:
///       - { name: tags, kind: to_many, target: tags }
///   - name: tags
///     attributes:
///       - { name: name, type: string }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGraphConfig {
    pub resources: Vec<ResourceConfig>,
}

impl ResourceGraphConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigurationError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Convert into a graph builder, which can still be extended in code
    pub fn into_builder(self) -> Result<ResourceGraphBuilder, ConfigurationError> {
        let mut builder = ResourceGraphBuilder::new();

        for resource in self.resources {
            let id_kind = match resource.id {
                IdKindConfig::Integer => IdKind::Integer,
                IdKindConfig::Uuid => IdKind::Uuid,
                IdKindConfig::String => IdKind::String,
                IdKindConfig::Pattern(pattern) => {
                    let regex = Regex::new(&pattern).map_err(|e| ConfigurationError::InvalidOption {
                        option: format!("resources.{}.id", resource.name),
                        message: e.to_string(),
                    })?;
                    IdKind::Custom(regex)
                }
            };

            let mut type_builder = ResourceTypeBuilder::new(resource.name, id_kind);

            for attr in resource.attributes {
                let mut metadata = AttrMetadata::new(attr.name, attr.value_type)
                    .with_capabilities(attr.capabilities);
                metadata.nullable = attr.nullable;
                if let Some(property) = attr.property {
                    metadata = metadata.with_property(property);
                }
                type_builder = type_builder.attribute(metadata);
            }

            for rel in resource.relationships {
                let mut metadata = match rel.kind {
                    RelationshipKind::ToOne => RelationshipMetadata::to_one(rel.name, rel.target),
                    RelationshipKind::ToMany => RelationshipMetadata::to_many(rel.name, rel.target),
                };
                metadata.can_include = rel.can_include;
                metadata.through = rel.through;
                metadata.inverse = rel.inverse;
                if let Some(property) = rel.property {
                    metadata = metadata.with_property(property);
                }
                type_builder = type_builder.relationship(metadata);
            }

            builder = builder.resource(type_builder);
        }

        Ok(builder)
    }

    /// Build the resource graph directly
    pub fn build(self) -> Result<ResourceGraph, ConfigurationError> {
        self.into_builder()?.build()
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = JsonApiOptions::default();
        assert_eq!(options.default_page_size, Some(10));
        assert_eq!(options.page_size_overflow, PageSizeOverflow::Reject);
        assert!(options.include_links);
        assert!(!options.include_exception_stack_trace);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_from_yaml() {
        let yaml = r#"
namespace: api/v1
maximum_page_size: 50
page_size_overflow: clamp
maximum_include_depth: 2
"#;
        let options = JsonApiOptions::from_yaml_str(yaml).expect("options should parse");
        assert_eq!(options.maximum_page_size, Some(50));
        assert_eq!(options.page_size_overflow, PageSizeOverflow::Clamp);
        assert_eq!(options.maximum_include_depth, Some(2));
        assert_eq!(options.default_page_size, Some(10));
        assert_eq!(options.base_path(), "/api/v1");
    }

    #[test]
    fn test_default_page_size_above_maximum_rejected() {
        let yaml = "default_page_size: 20\nmaximum_page_size: 5\n";
        let result = JsonApiOptions::from_yaml_str(yaml);
        assert!(matches!(result, Err(ConfigurationError::InvalidOption { .. })));
    }

    #[test]
    fn test_graph_from_yaml() {
        let yaml = r#"
resources:
  - name: articles
    attributes:
      - { name: caption, type: string }
      - name: wordCount
        type: integer
        property: word_count
        capabilities: { sort: false }
    relationships:
      - { name: tags, kind: to_many, target: tags, through: articleTags }
  - name: tags
    id: { pattern: "^[a-z]+$" }
    attributes:
      - { name: name, type: string, nullable: false }
"#;
        let graph = ResourceGraphConfig::from_yaml_str(yaml)
            .expect("yaml should parse")
            .build()
            .expect("graph should build");

        let articles = graph.resource_type("articles").expect("articles registered");
        let word_count = articles.attribute("wordCount").expect("attribute declared");
        assert_eq!(word_count.property_name, "word_count");
        assert!(!word_count.capabilities.sort);
        assert!(word_count.capabilities.filter);

        let tags = articles.relationship("tags").expect("relationship declared");
        assert_eq!(tags.through.as_deref(), Some("articleTags"));

        let tag_type = graph.resource_type("tags").expect("tags registered");
        assert!(tag_type.id_kind.parse("abc").is_some());
        assert!(tag_type.id_kind.parse("123").is_none());
    }

    #[test]
    fn test_options_from_yaml_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("should create temp file");
        writeln!(file, "namespace: /api/\ninclude_links: false").expect("should write");

        let path = file.path().to_str().expect("utf-8 path");
        let options = JsonApiOptions::from_yaml_file(path).expect("options should load");
        assert_eq!(options.base_path(), "/api");
        assert!(!options.include_links);

        assert!(JsonApiOptions::from_yaml_file("/nonexistent/options.yaml").is_err());
    }

    #[test]
    fn test_graph_yaml_with_unknown_target_fails() {
        let yaml = r#"
resources:
  - name: articles
    relationships:
      - { name: author, kind: to_one, target: people }
"#;
        let result = ResourceGraphConfig::from_yaml_str(yaml)
            .expect("yaml should parse")
            .build();
        assert!(result.is_err());
    }
}
