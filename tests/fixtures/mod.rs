//! Shared fixtures for the integration tests
//!
//! A small blog: three articles, two people and three tags.
//!
//! | article | caption     | wordCount | author | tags    |
//! |---------|-------------|-----------|--------|---------|
//! | 1       | Ownership   | 1200      | 1      | 1, 2    |
//! | 2       | Async       | 800       | 1      | 2       |
//! | 3       | Indexes     | 450       | none   | none    |

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use jsonapi::core::ResourceDefinitionRegistry;
use jsonapi::prelude::*;
use jsonapi::storage::Predicate;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn graph() -> ResourceGraph {
    ResourceGraphBuilder::new()
        .resource(
            ResourceTypeBuilder::new("articles", IdKind::Integer)
                .attribute(AttrMetadata::new("caption", AttrType::String).required())
                .attr("wordCount", AttrType::Integer)
                .relationship(
                    RelationshipMetadata::to_one("author", "people").inverse_of("articles"),
                )
                .relationship(RelationshipMetadata::to_many("tags", "tags")),
        )
        .resource(
            ResourceTypeBuilder::new("people", IdKind::Integer)
                .attr("name", AttrType::String)
                .relationship(RelationshipMetadata::to_many("articles", "articles")),
        )
        .resource(ResourceTypeBuilder::new("tags", IdKind::Integer).attr("name", AttrType::String))
        .build()
        .expect("fixture graph should build")
}

fn article(id: i64, caption: &str, word_count: i64, author: Option<i64>, tags: &[i64]) -> Resource {
    Resource::new("articles", id)
        .with_attribute("caption", caption)
        .with_attribute("wordCount", word_count)
        .with_relationship(
            "author",
            RelationshipValue::ToOne(author.map(|id| Box::new(Resource::new("people", id)))),
        )
        .with_relationship(
            "tags",
            RelationshipValue::ToMany(tags.iter().map(|id| Resource::new("tags", *id)).collect()),
        )
}

pub async fn seeded_data_source() -> InMemoryDataSource {
    let source = InMemoryDataSource::new();

    for (id, name) in [(1, "rust"), (2, "web"), (3, "db")] {
        source.seed(Resource::new("tags", id).with_attribute("name", name)).await;
    }

    for (id, name, articles) in [(1, "Ada", vec![1, 2]), (2, "Grace", vec![])] {
        let articles = articles.into_iter().map(|a| Resource::new("articles", a)).collect();
        source
            .seed(
                Resource::new("people", id)
                    .with_attribute("name", name)
                    .with_relationship("articles", RelationshipValue::ToMany(articles)),
            )
            .await;
    }

    source.seed(article(1, "Ownership", 1200, Some(1), &[1, 2])).await;
    source.seed(article(2, "Async", 800, Some(1), &[2])).await;
    source.seed(article(3, "Indexes", 450, None, &[])).await;

    source
}

/// Wraps a data source and counts the read queries sent to it
#[derive(Clone)]
pub struct CountingDataSource {
    inner: InMemoryDataSource,
    queries: Arc<AtomicUsize>,
}

impl CountingDataSource {
    pub fn new(inner: InMemoryDataSource) -> Self {
        Self {
            inner,
            queries: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for CountingDataSource {
    async fn query(&self, plan: &QueryPlan) -> Result<Vec<Resource>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(plan).await
    }

    async fn count(&self, table: &str, predicate: Option<&Predicate>) -> Result<usize> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.count(table, predicate).await
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        self.inner.begin().await
    }
}

pub fn service_with(
    options: JsonApiOptions,
    data_source: Arc<dyn DataSource>,
) -> JsonApiResourceService {
    JsonApiResourceService::new(
        Arc::new(graph()),
        Arc::new(options),
        data_source,
        Arc::new(ResourceDefinitionRegistry::new()),
    )
}

pub async fn service() -> JsonApiResourceService {
    service_with(JsonApiOptions::default(), Arc::new(seeded_data_source().await))
}

pub fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Serialize a response document to a JSON value
pub fn body_of(response: &JsonApiResponse) -> serde_json::Value {
    response
        .document
        .as_ref()
        .map(|document| serde_json::to_value(document).expect("document should serialize"))
        .unwrap_or(serde_json::Value::Null)
}
