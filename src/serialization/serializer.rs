//! Resource graph → JSON:API document
//!
//! Walks the loaded resources depth-first along the include tree of the
//! request's [`QueryLayer`]. Every `(type, id)` pair becomes exactly one
//! resource object: reaching the same resource through different paths
//! merges the relationship linkage of each visit into that one object.

use indexmap::IndexMap;
use serde_json::Value;

use super::links::LinkBuilder;
use super::objects::{
    Document, PrimaryData, RelationshipData, RelationshipObject, ResourceIdentifier,
    ResourceObject,
};
use crate::config::JsonApiOptions;
use crate::core::error::JsonApiResult;
use crate::core::resource::{RelationshipValue, Resource};
use crate::graph::{RelationshipKind, ResourceGraph};
use crate::query::layer::QueryLayer;

type Identity = (String, String);

pub struct DocumentSerializer<'a> {
    graph: &'a ResourceGraph,
    links: LinkBuilder,
}

impl<'a> DocumentSerializer<'a> {
    pub fn new(graph: &'a ResourceGraph, options: &JsonApiOptions) -> Self {
        Self {
            graph,
            links: LinkBuilder::new(options),
        }
    }

    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    /// Document for a single-resource endpoint; `None` renders `"data": null`
    pub fn serialize_single(
        &self,
        resource: Option<&Resource>,
        layer: &QueryLayer,
    ) -> JsonApiResult<Document> {
        let (mut primary, included) = self.walk(resource.into_iter(), layer)?;
        Ok(Document {
            data: PrimaryData::Single(primary.pop().map(Box::new)),
            included,
            ..Document::default()
        })
    }

    /// Document for a collection endpoint; always renders an array
    pub fn serialize_collection(
        &self,
        resources: &[Resource],
        layer: &QueryLayer,
    ) -> JsonApiResult<Document> {
        let (primary, included) = self.walk(resources.iter(), layer)?;
        Ok(Document {
            data: PrimaryData::Collection(primary),
            included,
            ..Document::default()
        })
    }

    /// Identifier-only document for a to-one relationship endpoint
    pub fn serialize_identifier(&self, resource: Option<&Resource>) -> Document {
        Document {
            data: PrimaryData::Single(resource.map(|r| Box::new(identifier_object(r)))),
            ..Document::default()
        }
    }

    /// Identifier-only document for a to-many relationship endpoint
    pub fn serialize_identifiers(&self, resources: &[Resource]) -> Document {
        Document {
            data: PrimaryData::Collection(resources.iter().map(identifier_object).collect()),
            ..Document::default()
        }
    }

    fn walk<'r>(
        &self,
        resources: impl Iterator<Item = &'r Resource>,
        layer: &QueryLayer,
    ) -> JsonApiResult<(Vec<ResourceObject>, Option<Vec<ResourceObject>>)> {
        let mut objects: IndexMap<Identity, ResourceObject> = IndexMap::new();
        let mut primary_keys = Vec::new();

        for resource in resources {
            primary_keys.push(identity(resource));
            self.visit(resource, layer, &mut objects)?;
        }

        let primary = primary_keys
            .iter()
            .filter_map(|key| objects.shift_remove(key))
            .collect();
        let included = if layer.include.is_empty() {
            None
        } else {
            Some(objects.into_values().collect())
        };
        Ok((primary, included))
    }

    fn visit(
        &self,
        resource: &Resource,
        layer: &QueryLayer,
        objects: &mut IndexMap<Identity, ResourceObject>,
    ) -> JsonApiResult<()> {
        let object = self.resource_object(resource, layer)?;
        match objects.get_mut(&identity(resource)) {
            Some(existing) => merge(existing, object),
            None => {
                objects.insert(identity(resource), object);
            }
        }

        let resource_type = self.graph.get_resource_type(&resource.resource_type)?;
        for (name, child_layer) in &layer.include {
            let Some(relationship) = resource_type.relationship(name) else {
                continue;
            };
            if let Some(value) = resource.relationship(&relationship.property_name) {
                for related in value.resources() {
                    self.visit(related, child_layer, objects)?;
                }
            }
        }
        Ok(())
    }

    fn resource_object(
        &self,
        resource: &Resource,
        layer: &QueryLayer,
    ) -> JsonApiResult<ResourceObject> {
        let resource_type = self.graph.get_resource_type(&resource.resource_type)?;
        let id = resource.id.to_string();

        let attributes: IndexMap<String, Value> = resource_type
            .attributes
            .iter()
            .filter(|a| a.capabilities.view && layer.is_selected(&a.public_name))
            .filter_map(|a| {
                resource
                    .attribute(&a.property_name)
                    .map(|value| (a.public_name.clone(), value.to_json()))
            })
            .collect();

        let mut relationships = IndexMap::new();
        for relationship in &resource_type.relationships {
            if !layer.is_selected(&relationship.public_name) {
                continue;
            }

            let data = if layer.include.contains_key(&relationship.public_name) {
                match resource.relationship(&relationship.property_name) {
                    Some(value) => linkage(value, relationship.kind),
                    None => RelationshipData::NotLoaded,
                }
            } else {
                RelationshipData::NotLoaded
            };
            let links = self
                .links
                .relationship(&resource_type.public_name, &id, &relationship.public_name);

            if links.is_none() && data.is_not_loaded() {
                continue;
            }
            relationships.insert(
                relationship.public_name.clone(),
                RelationshipObject {
                    links,
                    data,
                    meta: None,
                },
            );
        }

        Ok(ResourceObject {
            links: self.links.resource(&resource_type.public_name, &id),
            resource_type: resource_type.public_name.clone(),
            id,
            attributes: (!attributes.is_empty()).then_some(attributes),
            relationships: (!relationships.is_empty()).then_some(relationships),
            meta: None,
        })
    }
}

fn identity(resource: &Resource) -> Identity {
    (resource.resource_type.clone(), resource.id.to_string())
}

fn identifier_object(resource: &Resource) -> ResourceObject {
    ResourceObject::identifier(resource.resource_type.clone(), resource.id.to_string())
}

fn identifier(resource: &Resource) -> ResourceIdentifier {
    ResourceIdentifier {
        resource_type: resource.resource_type.clone(),
        id: resource.id.to_string(),
    }
}

fn linkage(value: &RelationshipValue, kind: RelationshipKind) -> RelationshipData {
    match (value, kind) {
        (RelationshipValue::ToOne(related), RelationshipKind::ToOne) => {
            RelationshipData::ToOne(related.as_deref().map(identifier))
        }
        (RelationshipValue::ToMany(related), RelationshipKind::ToMany) => {
            RelationshipData::ToMany(related.iter().map(identifier).collect())
        }
        (value, RelationshipKind::ToOne) => {
            RelationshipData::ToOne(value.resources().first().map(|r| identifier(r)))
        }
        (value, RelationshipKind::ToMany) => {
            RelationshipData::ToMany(value.resources().into_iter().map(identifier).collect())
        }
    }
}

/// Fold a second visit of the same resource into its object
fn merge(existing: &mut ResourceObject, other: ResourceObject) {
    if let Some(attributes) = other.attributes {
        existing
            .attributes
            .get_or_insert_with(IndexMap::new)
            .extend(attributes);
    }

    let Some(relationships) = other.relationships else {
        return;
    };
    let target = existing.relationships.get_or_insert_with(IndexMap::new);
    for (name, relationship) in relationships {
        match target.get_mut(&name) {
            Some(current) if current.data.is_not_loaded() => current.data = relationship.data,
            Some(_) => {}
            None => {
                target.insert(name, relationship);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::test_graph::graph;
    use indexmap::IndexSet;
    use serde_json::json;

    fn tag(id: i64, name: &str) -> Resource {
        Resource::new("tags", id).with_attribute("name", name)
    }

    fn article(id: i64, caption: &str, tags: Vec<Resource>) -> Resource {
        Resource::new("articles", id)
            .with_attribute("caption", caption)
            .with_attribute("wordCount", 100)
            .with_relationship("tags", RelationshipValue::ToMany(tags))
    }

    fn no_links() -> JsonApiOptions {
        JsonApiOptions {
            include_links: false,
            ..JsonApiOptions::default()
        }
    }

    #[test]
    fn test_included_resources_are_deduplicated() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &no_links());
        let mut layer = QueryLayer::new("articles");
        layer.include.insert("tags".to_string(), QueryLayer::new("tags"));

        let resources = vec![
            article(1, "X", vec![tag(1, "rust"), tag(2, "web")]),
            article(2, "Y", vec![tag(2, "web")]),
        ];
        let document = serializer
            .serialize_collection(&resources, &layer)
            .expect("should serialize");

        let included = document.included.expect("included rendered");
        assert_eq!(included.len(), 2);
        let value = serde_json::to_value(&document.data).expect("serializable");
        assert_eq!(
            value[1]["relationships"]["tags"],
            json!({ "data": [{ "type": "tags", "id": "2" }] })
        );
    }

    #[test]
    fn test_not_included_relationship_has_no_data() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &JsonApiOptions::default());
        let layer = QueryLayer::new("articles");

        let document = serializer
            .serialize_single(Some(&article(1, "X", Vec::new())), &layer)
            .expect("should serialize");
        let value = serde_json::to_value(&document).expect("serializable");
        assert!(value["data"]["relationships"]["tags"].get("data").is_none());
        assert_eq!(
            value["data"]["relationships"]["tags"]["links"]["related"],
            json!("/articles/1/tags")
        );
        assert!(value.get("included").is_none());
    }

    #[test]
    fn test_included_empty_relationships() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &no_links());
        let mut layer = QueryLayer::new("articles");
        layer.include.insert("tags".to_string(), QueryLayer::new("tags"));
        layer.include.insert("author".to_string(), QueryLayer::new("people"));

        let resource = article(1, "X", Vec::new())
            .with_relationship("author", RelationshipValue::ToOne(None));
        let document = serializer
            .serialize_single(Some(&resource), &layer)
            .expect("should serialize");
        let value = serde_json::to_value(&document).expect("serializable");
        assert_eq!(value["data"]["relationships"]["tags"], json!({ "data": [] }));
        assert_eq!(value["data"]["relationships"]["author"], json!({ "data": null }));
        assert_eq!(value["included"], json!([]));
    }

    #[test]
    fn test_fieldset_limits_attributes_and_relationships() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &JsonApiOptions::default());
        let mut layer = QueryLayer::new("articles");
        layer.fieldset = Some(IndexSet::from(["caption".to_string()]));

        let document = serializer
            .serialize_single(Some(&article(1, "X", Vec::new())), &layer)
            .expect("should serialize");
        let value = serde_json::to_value(&document).expect("serializable");
        assert_eq!(value["data"]["attributes"], json!({ "caption": "X" }));
        assert!(value["data"].get("relationships").is_none());
        assert_eq!(value["data"]["links"]["self"], json!("/articles/1"));
    }

    #[test]
    fn test_primary_resource_reached_again_merges_linkage() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &no_links());

        let mut articles_of_author = QueryLayer::new("articles");
        articles_of_author.include.insert("tags".to_string(), QueryLayer::new("tags"));
        let mut author = QueryLayer::new("people");
        author.include.insert("articles".to_string(), articles_of_author);
        let mut layer = QueryLayer::new("articles");
        layer.include.insert("author".to_string(), author);

        let nested_article = article(1, "X", vec![tag(5, "rust")]);
        let person = Resource::new("people", 9)
            .with_attribute("name", "Ann")
            .with_relationship("articles", RelationshipValue::ToMany(vec![nested_article]));
        let primary = Resource::new("articles", 1)
            .with_attribute("caption", "X")
            .with_relationship("author", RelationshipValue::ToOne(Some(Box::new(person))));

        let document = serializer
            .serialize_single(Some(&primary), &layer)
            .expect("should serialize");
        let value = serde_json::to_value(&document).expect("serializable");

        assert_eq!(
            value["data"]["relationships"]["tags"],
            json!({ "data": [{ "type": "tags", "id": "5" }] })
        );
        let included = value["included"].as_array().expect("array");
        assert_eq!(included.len(), 2);
        assert!(included.iter().all(|o| o["type"] != json!("articles")));
    }

    #[test]
    fn test_relationship_identifier_documents() {
        let graph = graph();
        let serializer = DocumentSerializer::new(&graph, &JsonApiOptions::default());
        let document = serializer.serialize_identifiers(&[tag(1, "rust")]);
        assert_eq!(
            serde_json::to_value(&document).expect("serializable"),
            json!({ "data": [{ "type": "tags", "id": "1" }] })
        );
        assert_eq!(
            serde_json::to_value(serializer.serialize_identifier(None)).expect("serializable"),
            json!({ "data": null })
        );
    }
}
