//! Server host for transport-agnostic API exposure
//!
//! The host holds everything needed to answer JSON:API requests: the resource
//! graph, the options and the resource service wired to a data source. An
//! exposure (currently REST) turns it into a router.

use std::sync::Arc;

use crate::config::JsonApiOptions;
use crate::core::definition::ResourceDefinitionRegistry;
use crate::graph::ResourceGraph;
use crate::services::JsonApiResourceService;
use crate::storage::DataSource;

/// Host context containing all framework state
pub struct JsonApiHost {
    pub graph: Arc<ResourceGraph>,
    pub options: Arc<JsonApiOptions>,
    pub service: JsonApiResourceService,
}

impl JsonApiHost {
    pub fn new(
        graph: ResourceGraph,
        options: JsonApiOptions,
        data_source: Arc<dyn DataSource>,
        definitions: ResourceDefinitionRegistry,
    ) -> Self {
        let graph = Arc::new(graph);
        let options = Arc::new(options);
        let service = JsonApiResourceService::new(
            graph.clone(),
            options.clone(),
            data_source,
            Arc::new(definitions),
        );
        Self {
            graph,
            options,
            service,
        }
    }

    /// Public names of the exposed resource types
    pub fn resource_types(&self) -> Vec<&str> {
        self.graph
            .resource_types()
            .map(|t| t.public_name.as_str())
            .collect()
    }

    /// Route prefix derived from the configured namespace
    pub fn base_path(&self) -> String {
        self.options.base_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::AttrType;
    use crate::core::resource::IdKind;
    use crate::graph::{ResourceGraphBuilder, ResourceTypeBuilder};
    use crate::storage::InMemoryDataSource;

    #[test]
    fn test_host_lists_resource_types() {
        let graph = ResourceGraphBuilder::new()
            .resource(
                ResourceTypeBuilder::new("tags", IdKind::Integer).attr("name", AttrType::String),
            )
            .build()
            .expect("graph should build");
        let host = JsonApiHost::new(
            graph,
            JsonApiOptions {
                namespace: Some("/api/".to_string()),
                ..JsonApiOptions::default()
            },
            Arc::new(InMemoryDataSource::new()),
            ResourceDefinitionRegistry::new(),
        );

        assert_eq!(host.resource_types(), vec!["tags"]);
        assert_eq!(host.base_path(), "/api");
    }
}
