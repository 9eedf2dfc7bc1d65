//! ServerBuilder for fluent API to build JSON:API servers

use super::exposure::RestExposure;
use super::host::JsonApiHost;
use crate::config::{JsonApiOptions, ResourceGraphConfig};
use crate::core::definition::{ResourceDefinition, ResourceDefinitionRegistry};
use crate::core::error::ConfigurationError;
use crate::graph::ResourceGraph;
use crate::storage::DataSource;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for creating JSON:API servers
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_graph(graph)
///     .with_options(JsonApiOptions::from_yaml_file("jsonapi.yaml")?)
///     .with_data_source(InMemoryDataSource::new())
///     .build()?;
/// ```
pub struct ServerBuilder {
    graph: Option<ResourceGraph>,
    options: JsonApiOptions,
    data_source: Option<Arc<dyn DataSource>>,
    definitions: ResourceDefinitionRegistry,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder with default options
    pub fn new() -> Self {
        Self {
            graph: None,
            options: JsonApiOptions::default(),
            data_source: None,
            definitions: ResourceDefinitionRegistry::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Set the resource graph (required)
    pub fn with_graph(mut self, graph: ResourceGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Build the resource graph from its YAML description
    pub fn with_graph_config(mut self, config: ResourceGraphConfig) -> Result<Self> {
        self.graph = Some(config.build()?);
        Ok(self)
    }

    pub fn with_options(mut self, options: JsonApiOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the data source (required)
    pub fn with_data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.data_source = Some(Arc::new(data_source));
        self
    }

    /// Register query and write hooks for one resource type
    pub fn with_definition(mut self, definition: impl ResourceDefinition + 'static) -> Self {
        self.definitions.register(Arc::new(definition));
        self
    }

    /// Add custom routes alongside the JSON:API endpoints
    ///
    /// Custom routes are merged at the root, outside the namespace.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    ///
    /// Fails when the graph or the data source is missing, when the options
    /// are inconsistent, or when a definition targets an unregistered type.
    pub fn build_host(mut self) -> Result<JsonApiHost> {
        self.options.validate()?;

        let graph = self.graph.take().ok_or_else(|| ConfigurationError::MissingComponent {
            component: "ResourceGraph. Call .with_graph()".to_string(),
        })?;
        let data_source = self
            .data_source
            .take()
            .ok_or_else(|| ConfigurationError::MissingComponent {
                component: "DataSource. Call .with_data_source()".to_string(),
            })?;

        if let Some(unknown) = self
            .definitions
            .resource_types()
            .find(|name| graph.resource_type(name).is_none())
        {
            return Err(ConfigurationError::MissingComponent {
                component: format!("resource type '{}' for a registered definition", unknown),
            }
            .into());
        }

        tracing::info!(
            resource_types = graph.len(),
            namespace = %self.options.base_path(),
            "JSON:API host built"
        );
        Ok(JsonApiHost::new(graph, self.options, data_source, self.definitions))
    }

    /// Build the host and expose it via REST
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        RestExposure::build_router(host, custom_routes)
    }

    /// Serve the application with graceful shutdown
    ///
    /// Handles SIGTERM and SIGINT (Ctrl+C). In-flight requests whose client
    /// disconnects are dropped together with their data-source calls.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::field::AttrType;
    use crate::core::resource::IdKind;
    use crate::graph::{ResourceGraphBuilder, ResourceTypeBuilder};
    use crate::storage::InMemoryDataSource;

    fn graph() -> ResourceGraph {
        ResourceGraphBuilder::new()
            .resource(
                ResourceTypeBuilder::new("tags", IdKind::Integer).attr("name", AttrType::String),
            )
            .build()
            .expect("graph should build")
    }

    struct UnknownTypeHooks;

    impl ResourceDefinition for UnknownTypeHooks {
        fn resource_type(&self) -> &str {
            "unicorns"
        }
    }

    #[test]
    fn test_build_host_requires_graph_and_data_source() {
        let err = ServerBuilder::new()
            .with_data_source(InMemoryDataSource::new())
            .build_host()
            .err()
            .expect("graph missing");
        assert!(err.to_string().contains("ResourceGraph"));

        let err = ServerBuilder::new()
            .with_graph(graph())
            .build_host()
            .err()
            .expect("data source missing");
        assert!(err.to_string().contains("DataSource"));
    }

    #[test]
    fn test_build_host_rejects_invalid_options() {
        let result = ServerBuilder::new()
            .with_graph(graph())
            .with_data_source(InMemoryDataSource::new())
            .with_options(JsonApiOptions {
                default_page_size: Some(0),
                ..JsonApiOptions::default()
            })
            .build_host();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_host_rejects_definition_for_unknown_type() {
        let result = ServerBuilder::new()
            .with_graph(graph())
            .with_data_source(InMemoryDataSource::new())
            .with_definition(UnknownTypeHooks)
            .build_host();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_router() {
        let router = ServerBuilder::new()
            .with_graph(graph())
            .with_data_source(InMemoryDataSource::new())
            .build();
        assert!(router.is_ok());
    }
}
