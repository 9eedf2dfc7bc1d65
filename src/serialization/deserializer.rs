//! JSON:API request body → validated changes
//!
//! Every violation is reported as a single error carrying a JSON pointer into
//! the body. Nothing is returned partially: either the whole document is
//! valid or the caller gets an error.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::core::error::{ConflictError, JsonApiResult, ParseError, ValidationError};
use crate::core::field::FieldValue;
use crate::core::resource::{RelationshipValue, Resource, ResourceId};
use crate::graph::{RelationshipKind, RelationshipMetadata, ResourceGraph, ResourceType};

const TOP_LEVEL_MEMBERS: [&str; 6] = ["data", "included", "meta", "links", "jsonapi", "errors"];
const RESOURCE_MEMBERS: [&str; 7] =
    ["type", "id", "lid", "attributes", "relationships", "links", "meta"];

/// Which write the body belongs to
#[derive(Debug, Clone, Copy)]
pub enum WriteMode<'a> {
    Create,
    /// Update of the resource with this id (from the request path)
    Update { id: &'a ResourceId },
}

/// New linkage of one relationship
#[derive(Debug, Clone, PartialEq)]
pub enum Linkage {
    ToOne(Option<ResourceId>),
    ToMany(Vec<ResourceId>),
}

impl Linkage {
    pub fn ids(&self) -> Vec<ResourceId> {
        match self {
            Linkage::ToOne(id) => id.iter().cloned().collect(),
            Linkage::ToMany(ids) => ids.clone(),
        }
    }
}

/// A relationship value from the body, kept apart from the attributes
#[derive(Debug, Clone)]
pub struct RelationshipAssignment {
    pub relationship: RelationshipMetadata,
    pub linkage: Linkage,
}

/// Validated content of a create or update body
#[derive(Debug, Clone)]
pub struct DeserializedResource {
    pub resource_type: String,
    /// Client-supplied id on create, the path id on update
    pub id: Option<ResourceId>,
    /// Coerced attribute values keyed by property name
    pub attributes: IndexMap<String, FieldValue>,
    pub relationships: Vec<RelationshipAssignment>,
}

/// A complete document read back into resources
#[derive(Debug, Clone, PartialEq)]
pub struct ReadDocument {
    pub data: Vec<Resource>,
    pub is_collection: bool,
    pub included: Vec<Resource>,
}

pub struct DocumentDeserializer<'a> {
    graph: &'a ResourceGraph,
}

impl<'a> DocumentDeserializer<'a> {
    pub fn new(graph: &'a ResourceGraph) -> Self {
        Self { graph }
    }

    /// Read the body of a create (`POST /{type}`) or update (`PATCH /{type}/{id}`)
    pub fn deserialize_resource(
        &self,
        body: &[u8],
        expected_type: &str,
        mode: WriteMode<'_>,
    ) -> JsonApiResult<DeserializedResource> {
        let top_level = parse_top_level(body)?;
        let data = match top_level.get("data") {
            Some(Value::Object(data)) => data,
            _ => return Err(invalid("/data", "Expected an object in 'data' element.").into()),
        };
        check_members(data, &RESOURCE_MEMBERS, "/data")?;
        if data.contains_key("lid") {
            return Err(invalid("/data/lid", "Local IDs are not supported.").into());
        }

        let resource_type = self.resource_type_of(data, "/data")?;
        if resource_type.public_name != expected_type {
            return Err(ConflictError::TypeMismatch {
                expected: expected_type.to_string(),
                actual: resource_type.public_name.clone(),
                pointer: "/data/type".to_string(),
            }
            .into());
        }

        let body_id = match data.get("id") {
            None => None,
            Some(value) => Some(parse_id(resource_type, value, "/data/id")?),
        };
        let id = match mode {
            WriteMode::Create => body_id,
            WriteMode::Update { id } => match body_id {
                None => return Err(invalid("/data", "The 'id' element is required.").into()),
                Some(body_id) if &body_id != id => {
                    return Err(ConflictError::IdMismatch {
                        path_id: id.to_string(),
                        body_id: body_id.to_string(),
                    }
                    .into());
                }
                Some(body_id) => Some(body_id),
            },
        };

        let attributes = self.read_attributes(resource_type, data.get("attributes"), mode)?;
        let relationships = self.read_relationships(resource_type, data.get("relationships"))?;

        Ok(DeserializedResource {
            resource_type: resource_type.public_name.clone(),
            id,
            attributes,
            relationships,
        })
    }

    /// Read the body of a relationship endpoint write
    pub fn deserialize_relationship(
        &self,
        body: &[u8],
        relationship: &RelationshipMetadata,
    ) -> JsonApiResult<Linkage> {
        let top_level = parse_top_level(body)?;
        let data = top_level
            .get("data")
            .ok_or_else(|| invalid("/", "The 'data' element is required."))?;
        self.read_linkage(relationship, data, "/data")
    }

    /// Read a complete document, resolving relationship linkage one level
    /// deep against `included`
    pub fn read_document(&self, body: &[u8]) -> JsonApiResult<ReadDocument> {
        let top_level = parse_top_level(body)?;

        let (objects, is_collection) = match top_level.get("data") {
            Some(Value::Array(items)) => (items.iter().collect::<Vec<_>>(), true),
            Some(Value::Null) => (Vec::new(), false),
            Some(item) => (vec![item], false),
            None => return Err(invalid("/", "The 'data' element is required.").into()),
        };

        let mut included = Vec::new();
        if let Some(items) = top_level.get("included") {
            let items = items
                .as_array()
                .ok_or_else(|| invalid("/included", "Expected an array in 'included' element."))?;
            for (index, item) in items.iter().enumerate() {
                included.push(self.read_object(item, &format!("/included/{}", index))?);
            }
        }

        let known: IndexMap<(String, ResourceId), Resource> = included
            .iter()
            .map(|resource| (resource.identity(), resource.clone()))
            .collect();

        let mut data = Vec::with_capacity(objects.len());
        for (index, object) in objects.into_iter().enumerate() {
            let pointer = if is_collection {
                format!("/data/{}", index)
            } else {
                "/data".to_string()
            };
            data.push(resolve(self.read_object(object, &pointer)?, &known));
        }
        let included = included.into_iter().map(|r| resolve(r, &known)).collect();

        Ok(ReadDocument {
            data,
            is_collection,
            included,
        })
    }

    fn resource_type_of(
        &self,
        object: &Map<String, Value>,
        pointer: &str,
    ) -> JsonApiResult<&'a ResourceType> {
        let type_pointer = format!("{}/type", pointer);
        let name = match object.get("type") {
            Some(Value::String(name)) => name,
            Some(_) => return Err(invalid(&type_pointer, "Resource type must be a string.").into()),
            None => {
                return Err(invalid(pointer, "The 'type' element is required.").into());
            }
        };
        self.graph.resource_type(name).ok_or_else(|| {
            invalid(&type_pointer, format!("Resource type '{}' does not exist.", name)).into()
        })
    }

    fn read_attributes(
        &self,
        resource_type: &ResourceType,
        attributes: Option<&Value>,
        mode: WriteMode<'_>,
    ) -> JsonApiResult<IndexMap<String, FieldValue>> {
        let attributes = match attributes {
            None => None,
            Some(Value::Object(map)) => Some(map),
            Some(_) => {
                let message = "Expected an object in 'attributes' element.";
                return Err(invalid("/data/attributes", message).into());
            }
        };

        let mut values = IndexMap::new();
        for (name, value) in attributes.into_iter().flatten() {
            let pointer = format!("/data/attributes/{}", pointer_token(name));
            let attribute = resource_type.attribute(name).ok_or_else(|| {
                invalid(
                    &pointer,
                    format!(
                        "Unknown attribute '{}' on resource type '{}'.",
                        name, resource_type.public_name
                    ),
                )
            })?;

            let allowed = match mode {
                WriteMode::Create => attribute.capabilities.create,
                WriteMode::Update { .. } => attribute.capabilities.change,
            };
            if !allowed {
                let action = match mode {
                    WriteMode::Create => "set",
                    WriteMode::Update { .. } => "changed",
                };
                return Err(ValidationError::FieldNotAllowed {
                    message: format!(
                        "Attribute '{}' on resource type '{}' cannot be {} in this request.",
                        name, resource_type.public_name, action
                    ),
                    pointer,
                }
                .into());
            }

            let coerced = attribute.value_type.from_json(value).ok_or_else(|| {
                invalid(
                    &pointer,
                    format!(
                        "Failed to convert attribute '{}' with value '{}' to type '{}'.",
                        name,
                        value,
                        attribute.value_type.name()
                    ),
                )
            })?;
            if coerced.is_null() && !attribute.nullable {
                let message = format!("Attribute '{}' cannot be null.", name);
                return Err(invalid(&pointer, message).into());
            }
            values.insert(attribute.property_name.clone(), coerced);
        }

        if let WriteMode::Create = mode {
            let missing = resource_type.attributes.iter().find(|a| {
                !a.nullable && a.capabilities.create && !values.contains_key(&a.property_name)
            });
            if let Some(attribute) = missing {
                return Err(invalid(
                    "/data/attributes",
                    format!("The required attribute '{}' is missing.", attribute.public_name),
                )
                .into());
            }
        }
        Ok(values)
    }

    fn read_relationships(
        &self,
        resource_type: &ResourceType,
        relationships: Option<&Value>,
    ) -> JsonApiResult<Vec<RelationshipAssignment>> {
        let relationships = match relationships {
            None => return Ok(Vec::new()),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(invalid(
                    "/data/relationships",
                    "Expected an object in 'relationships' element.",
                )
                .into());
            }
        };

        let mut assignments = Vec::with_capacity(relationships.len());
        for (name, value) in relationships {
            let pointer = format!("/data/relationships/{}", pointer_token(name));
            let relationship = resource_type.relationship(name).ok_or_else(|| {
                invalid(
                    &pointer,
                    format!(
                        "Unknown relationship '{}' on resource type '{}'.",
                        name, resource_type.public_name
                    ),
                )
            })?;
            let data = value
                .as_object()
                .and_then(|object| object.get("data"))
                .ok_or_else(|| {
                    invalid(&pointer, "Expected 'data' element in relationship object.")
                })?;

            assignments.push(RelationshipAssignment {
                relationship: relationship.clone(),
                linkage: self.read_linkage(relationship, data, &format!("{}/data", pointer))?,
            });
        }
        Ok(assignments)
    }

    fn read_linkage(
        &self,
        relationship: &RelationshipMetadata,
        data: &Value,
        pointer: &str,
    ) -> JsonApiResult<Linkage> {
        match (relationship.kind, data) {
            (RelationshipKind::ToOne, Value::Null) => Ok(Linkage::ToOne(None)),
            (RelationshipKind::ToOne, Value::Object(_)) => {
                Ok(Linkage::ToOne(Some(self.read_identifier(relationship, data, pointer)?)))
            }
            (RelationshipKind::ToOne, _) => Err(invalid(
                pointer,
                format!(
                    "Expected an object or 'null' for to-one relationship '{}'.",
                    relationship.public_name
                ),
            )
            .into()),
            (RelationshipKind::ToMany, Value::Array(items)) => {
                let mut ids = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_pointer = format!("{}/{}", pointer, index);
                    ids.push(self.read_identifier(relationship, item, &item_pointer)?);
                }
                Ok(Linkage::ToMany(ids))
            }
            (RelationshipKind::ToMany, _) => Err(invalid(
                pointer,
                format!(
                    "Expected an array for to-many relationship '{}'.",
                    relationship.public_name
                ),
            )
            .into()),
        }
    }

    fn read_identifier(
        &self,
        relationship: &RelationshipMetadata,
        value: &Value,
        pointer: &str,
    ) -> JsonApiResult<ResourceId> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid(pointer, "Expected a resource identifier object."))?;
        if object.contains_key("lid") {
            return Err(invalid(&format!("{}/lid", pointer), "Local IDs are not supported.").into());
        }

        let resource_type = self.resource_type_of(object, pointer)?;
        if resource_type.public_name != relationship.right_type {
            return Err(ConflictError::TypeMismatch {
                expected: relationship.right_type.clone(),
                actual: resource_type.public_name.clone(),
                pointer: format!("{}/type", pointer),
            }
            .into());
        }

        let id = object
            .get("id")
            .ok_or_else(|| invalid(pointer, "The 'id' element is required."))?;
        parse_id(resource_type, id, &format!("{}/id", pointer))
    }

    /// Resource object of a response document, relationships as identifier stubs
    fn read_object(&self, value: &Value, pointer: &str) -> JsonApiResult<Resource> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid(pointer, "Expected a resource object."))?;
        let resource_type = self.resource_type_of(object, pointer)?;
        let id_pointer = format!("{}/id", pointer);
        let id = object
            .get("id")
            .ok_or_else(|| invalid(pointer, "The 'id' element is required."))?;
        let mut resource = Resource::new(
            resource_type.public_name.clone(),
            parse_id(resource_type, id, &id_pointer)?,
        );

        if let Some(Value::Object(attributes)) = object.get("attributes") {
            for (name, value) in attributes {
                let pointer = format!("{}/attributes/{}", pointer, pointer_token(name));
                let attribute = resource_type
                    .attribute(name)
                    .ok_or_else(|| invalid(&pointer, format!("Unknown attribute '{}'.", name)))?;
                let coerced = attribute
                    .value_type
                    .from_json(value)
                    .ok_or_else(|| {
                        invalid(&pointer, format!("Invalid value for attribute '{}'.", name))
                    })?;
                resource.attributes.insert(attribute.property_name.clone(), coerced);
            }
        }

        if let Some(Value::Object(relationships)) = object.get("relationships") {
            for (name, value) in relationships {
                let pointer = format!("{}/relationships/{}", pointer, pointer_token(name));
                let relationship = resource_type
                    .relationship(name)
                    .ok_or_else(|| invalid(&pointer, format!("Unknown relationship '{}'.", name)))?;
                let Some(data) = value.get("data") else {
                    continue;
                };
                let right_type = self.graph.right_type(relationship)?;
                let stub = |id: ResourceId| Resource::new(right_type.public_name.clone(), id);
                let data_pointer = format!("{}/data", pointer);
                let related = match self.read_linkage(relationship, data, &data_pointer)? {
                    Linkage::ToOne(id) => RelationshipValue::ToOne(id.map(|id| Box::new(stub(id)))),
                    Linkage::ToMany(ids) => {
                        RelationshipValue::ToMany(ids.into_iter().map(stub).collect())
                    }
                };
                resource.relationships.insert(relationship.property_name.clone(), related);
            }
        }
        Ok(resource)
    }
}

/// Replace identifier stubs with their included counterparts
fn resolve(mut resource: Resource, known: &IndexMap<(String, ResourceId), Resource>) -> Resource {
    let lookup = |stub: &Resource| {
        known
            .get(&stub.identity())
            .map(|found| Resource {
                relationships: IndexMap::new(),
                ..found.clone()
            })
            .unwrap_or_else(|| stub.clone())
    };

    for value in resource.relationships.values_mut() {
        let resolved = match &*value {
            RelationshipValue::ToOne(related) => {
                RelationshipValue::ToOne(related.as_deref().map(|r| Box::new(lookup(r))))
            }
            RelationshipValue::ToMany(related) => {
                RelationshipValue::ToMany(related.iter().map(&lookup).collect())
            }
        };
        *value = resolved;
    }
    resource
}

fn parse_top_level(body: &[u8]) -> JsonApiResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::MissingBody.into());
    }
    let value: Value = serde_json::from_slice(body)?;
    let Value::Object(top_level) = value else {
        return Err(invalid("/", "Expected an object at the top level of the document.").into());
    };

    check_members(&top_level, &TOP_LEVEL_MEMBERS, "")?;
    if top_level.contains_key("data") && top_level.contains_key("errors") {
        return Err(invalid("/", "The 'data' and 'errors' elements cannot both be present.").into());
    }
    if !top_level.contains_key("data") {
        return Err(invalid("/", "The 'data' element is required.").into());
    }
    Ok(top_level)
}

fn check_members(
    object: &Map<String, Value>,
    allowed: &[&str],
    pointer: &str,
) -> JsonApiResult<()> {
    match object.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid(
            &format!("{}/{}", pointer, pointer_token(key)),
            format!("Unknown element '{}'.", key),
        )
        .into()),
        None => Ok(()),
    }
}

fn parse_id(
    resource_type: &ResourceType,
    value: &Value,
    pointer: &str,
) -> JsonApiResult<ResourceId> {
    let Value::String(text) = value else {
        return Err(invalid(pointer, "Resource ID must be a string.").into());
    };
    resource_type.id_kind.parse(text).ok_or_else(|| {
        ValidationError::InvalidId {
            resource_type: resource_type.public_name.clone(),
            value: text.clone(),
            pointer: Some(pointer.to_string()),
        }
        .into()
    })
}

/// Escape a member name for use as a JSON pointer reference token (RFC 6901)
fn pointer_token(name: &str) -> String {
    name.replace('~', "~0").replace('/', "~1")
}

fn invalid(pointer: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidDocument {
        pointer: pointer.to_string(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::JsonApiError;
    use crate::query::parser::test_graph::graph;
    use serde_json::json;

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).expect("serializable")
    }

    fn pointer_of(err: &JsonApiError) -> Option<String> {
        match err {
            JsonApiError::Validation(ValidationError::InvalidDocument { pointer, .. })
            | JsonApiError::Validation(ValidationError::FieldNotAllowed { pointer, .. }) => {
                Some(pointer.clone())
            }
            JsonApiError::Validation(ValidationError::InvalidId { pointer, .. }) => pointer.clone(),
            JsonApiError::Conflict(ConflictError::TypeMismatch { pointer, .. }) => {
                Some(pointer.clone())
            }
            _ => None,
        }
    }

    #[test]
    fn test_create_with_relationships() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);
        let document = body(json!({
            "data": {
                "type": "articles",
                "attributes": { "caption": "X", "wordCount": 3 },
                "relationships": {
                    "author": { "data": { "type": "people", "id": "4" } },
                    "tags": {
                        "data": [{ "type": "tags", "id": "1" }, { "type": "tags", "id": "2" }]
                    }
                }
            }
        }));

        let resource = deserializer
            .deserialize_resource(&document, "articles", WriteMode::Create)
            .expect("should deserialize");
        assert_eq!(resource.id, None);
        assert_eq!(resource.attributes.get("caption"), Some(&FieldValue::from("X")));
        assert_eq!(resource.attributes.get("wordCount"), Some(&FieldValue::Integer(3)));
        assert_eq!(resource.relationships.len(), 2);
        assert_eq!(resource.relationships[0].linkage, Linkage::ToOne(Some(ResourceId::Integer(4))));
        assert_eq!(
            resource.relationships[1].linkage,
            Linkage::ToMany(vec![ResourceId::Integer(1), ResourceId::Integer(2)])
        );
    }

    #[test]
    fn test_invalid_json_and_missing_body() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let err = deserializer
            .deserialize_resource(b"{ \"data\": ", "articles", WriteMode::Create)
            .expect_err("should reject");
        assert!(matches!(err, JsonApiError::Parse(ParseError::InvalidJson { .. })));

        let err = deserializer
            .deserialize_resource(b"  ", "articles", WriteMode::Create)
            .expect_err("should reject");
        assert!(matches!(err, JsonApiError::Parse(ParseError::MissingBody)));
    }

    #[test]
    fn test_top_level_structure() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let err = deserializer
            .deserialize_resource(&body(json!([1])), "articles", WriteMode::Create)
            .expect_err("array rejected");
        assert_eq!(pointer_of(&err).as_deref(), Some("/"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles" }, "errors": [] })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("data with errors rejected");
        assert_eq!(pointer_of(&err).as_deref(), Some("/"));

        let extra = body(json!({ "data": { "type": "articles" }, "extra": 1 }));
        let err = deserializer
            .deserialize_resource(&extra, "articles", WriteMode::Create)
            .expect_err("unknown member rejected");
        assert_eq!(pointer_of(&err).as_deref(), Some("/extra"));
    }

    #[test]
    fn test_type_and_id_checks() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let tags = body(json!({ "data": { "type": "tags" } }));
        let err = deserializer
            .deserialize_resource(&tags, "articles", WriteMode::Create)
            .expect_err("type mismatch");
        assert!(matches!(err, JsonApiError::Conflict(ConflictError::TypeMismatch { .. })));

        let unicorns = body(json!({ "data": { "type": "unicorns" } }));
        let err = deserializer
            .deserialize_resource(&unicorns, "articles", WriteMode::Create)
            .expect_err("unknown type");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/type"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "id": "abc" } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("invalid id");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/id"));

        let path_id = ResourceId::Integer(1);
        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "id": "2" } })),
                "articles",
                WriteMode::Update { id: &path_id },
            )
            .expect_err("id mismatch");
        assert!(matches!(err, JsonApiError::Conflict(ConflictError::IdMismatch { .. })));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "lid": "a1" } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("lid rejected");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/lid"));
    }

    #[test]
    fn test_attribute_checks() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "attributes": { "title": "X" } } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("unknown attribute");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/attributes/title"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({
                    "data": { "type": "articles", "attributes": { "wordCount": "many" } }
                })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("wrong type");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/attributes/wordCount"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "attributes": { "a/b~c": 1 } } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("unknown attribute");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/attributes/a~1b~0c"));
    }

    #[test]
    fn test_numeric_ids_rejected() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "id": 5 } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("numeric id");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/id"));
        assert!(err.to_string().contains("must be a string"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({
                    "data": {
                        "type": "articles",
                        "relationships": { "tags": { "data": [{ "type": "tags", "id": 1 }] } }
                    }
                })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("numeric identifier id");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/relationships/tags/data/0/id"));
    }

    #[test]
    fn test_relationship_checks() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "relationships": {
                    "tags": { "data": { "type": "tags", "id": "1" } }
                } } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("object for to-many");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/relationships/tags/data"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "relationships": {
                    "tags": { "data": [{ "type": "people", "id": "1" }] }
                } } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("wrong identifier type");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/relationships/tags/data/0/type"));

        let err = deserializer
            .deserialize_resource(
                &body(json!({ "data": { "type": "articles", "relationships": {
                    "editor": { "data": null }
                } } })),
                "articles",
                WriteMode::Create,
            )
            .expect_err("unknown relationship");
        assert_eq!(pointer_of(&err).as_deref(), Some("/data/relationships/editor"));
    }

    #[test]
    fn test_relationship_endpoint_body() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);
        let articles = graph.resource_type("articles").expect("registered");
        let author = articles.relationship("author").expect("declared");

        let linkage = deserializer
            .deserialize_relationship(&body(json!({ "data": null })), author)
            .expect("null clears to-one");
        assert_eq!(linkage, Linkage::ToOne(None));
    }

    #[test]
    fn test_read_document_resolves_included() {
        let graph = graph();
        let deserializer = DocumentDeserializer::new(&graph);
        let document = body(json!({
            "data": [{
                "type": "articles",
                "id": "1",
                "attributes": { "caption": "X" },
                "relationships": {
                    "tags": { "data": [{ "type": "tags", "id": "7" }] },
                    "author": { "links": { "related": "/articles/1/author" } }
                }
            }],
            "included": [{ "type": "tags", "id": "7", "attributes": { "name": "rust" } }]
        }));

        let read = deserializer.read_document(&document).expect("should read");
        assert!(read.is_collection);
        let article = &read.data[0];
        assert!(article.relationship("author").is_none());
        assert_eq!(
            article.relationship("tags"),
            Some(&RelationshipValue::ToMany(vec![
                Resource::new("tags", 7).with_attribute("name", "rust")
            ]))
        );
    }
}
