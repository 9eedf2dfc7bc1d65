//! Articles Example
//!
//! Serves a small blog (articles, people, tags) over JSON:API from an
//! in-memory data source. Try:
//!
//! ```text
//! GET /api/articles?include=author,tags&sort=-wordCount
//! GET /api/articles?filter=has(tags)&fields[articles]=caption,tags
//! GET /api/articles/1/tags?sort=name
//! GET /api/people?include=articles&filter[articles]=greaterThan(wordCount,'500')
//! GET /api/articles?published=true
//! ```

use anyhow::Result;
use chrono::{TimeZone, Utc};
use jsonapi::prelude::*;

const GRAPH: &str = include_str!("graph.yaml");

/// Orders articles newest first unless the client sorts, and exposes
/// `?published=true|false` as a custom parameter
struct ArticleDefinition;

impl ResourceDefinition for ArticleDefinition {
    fn resource_type(&self) -> &str {
        "articles"
    }

    fn on_apply_sort(
        &self,
        _existing: Option<&SortExpression>,
        context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<SortExpression>> {
        Ok(ConstraintAdjustment::Inject(context.parse_sort("-publishedAt")?))
    }

    fn queryable_parameters(&self) -> Vec<String> {
        vec!["published".to_string()]
    }

    fn on_queryable_parameter(
        &self,
        _name: &str,
        value: &str,
        context: &QueryContext<'_>,
    ) -> JsonApiResult<ConstraintAdjustment<QueryExpression>> {
        let filter = match value {
            "false" => "equals(publishedAt,null)",
            _ => "not(equals(publishedAt,null))",
        };
        Ok(ConstraintAdjustment::Inject(context.parse_filter(filter)?))
    }

    fn on_after_write(&self, operation: WriteOperation, id: &ResourceId) -> JsonApiResult<()> {
        tracing::info!(%operation, %id, "article written");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jsonapi=debug".into()),
        )
        .init();

    let graph = ResourceGraphConfig::from_yaml_str(GRAPH)?.build()?;
    let data_source = InMemoryDataSource::new();
    populate_test_data(&data_source).await?;

    let options = JsonApiOptions {
        namespace: Some("api".to_string()),
        maximum_page_size: Some(50),
        include_total_resource_count: true,
        ..JsonApiOptions::default()
    };

    println!("🚀 Starting articles example");
    println!("📦 Resource types: articles, people, tags");
    println!("\n🌐 Server running on http://127.0.0.1:3000/api");
    println!("\n  GET|POST                  /api/{{type}}");
    println!("  GET|PATCH|DELETE          /api/{{type}}/{{id}}");
    println!("  GET                       /api/{{type}}/{{id}}/{{relationship}}");
    println!("  GET|PATCH|POST|DELETE     /api/{{type}}/{{id}}/relationships/{{relationship}}");

    ServerBuilder::new()
        .with_graph(graph)
        .with_options(options)
        .with_data_source(data_source)
        .with_definition(ArticleDefinition)
        .serve("127.0.0.1:3000")
        .await
}

/// Populate the store with test data
async fn populate_test_data(data_source: &InMemoryDataSource) -> Result<()> {
    let people = [(1, "Ada"), (2, "Grace")];
    for (id, name) in people {
        let written: Vec<Resource> = match id {
            1 => vec![Resource::new("articles", 1), Resource::new("articles", 2)],
            _ => vec![Resource::new("articles", 3)],
        };
        data_source
            .seed(
                Resource::new("people", id)
                    .with_attribute("name", name)
                    .with_relationship("articles", RelationshipValue::ToMany(written)),
            )
            .await;
    }

    for (id, name) in [(1, "rust"), (2, "web"), (3, "databases")] {
        data_source
            .seed(Resource::new("tags", id).with_attribute("name", name))
            .await;
    }

    let articles = [
        (1, "Ownership in practice", 1200, Some(1), 1),
        (2, "Async without tears", 800, Some(2), 1),
        (3, "Indexes explained", 450, None, 2),
    ];
    for (id, caption, word_count, published_month, author) in articles {
        let published_at = match published_month {
            Some(month) => Utc
                .with_ymd_and_hms(2024, month, 1, 9, 0, 0)
                .single()
                .map(FieldValue::DateTime)
                .unwrap_or(FieldValue::Null),
            None => FieldValue::Null,
        };
        data_source
            .seed(
                Resource::new("articles", id)
                    .with_attribute("caption", caption)
                    .with_attribute("word_count", word_count)
                    .with_attribute("published_at", published_at)
                    .with_relationship(
                        "author",
                        RelationshipValue::ToOne(Some(Box::new(Resource::new("people", author)))),
                    ),
            )
            .await;
    }

    for (article, tag) in [(1, 1), (2, 1), (2, 2), (3, 3)] {
        data_source
            .seed_link(
                "articleTags",
                ("articles", ResourceId::Integer(article)),
                ("tags", ResourceId::Integer(tag)),
            )
            .await;
    }

    Ok(())
}
