//! The JSON:API resource service
//!
//! Each operation runs the same pipeline: read and compose the query string
//! (no data access before this succeeds), translate the query layers into a
//! plan, hand the plan to the data source and serialize the outcome. Writes
//! additionally go through exactly one [`UnitOfWork`].

use axum::http::StatusCode;
use futures::future::try_join;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use super::pipeline::{Pipeline, PipelineStage};
use crate::config::JsonApiOptions;
use crate::core::definition::{ResourceDefinition, ResourceDefinitionRegistry, WriteOperation};
use crate::core::error::{
    ConflictError, DataSourceError, JsonApiError, JsonApiResult, NotFoundError, ValidationError,
};
use crate::core::resource::{RelationshipValue, Resource, ResourceId};
use crate::graph::{RelationshipMetadata, ResourceGraph, ResourceType};
use crate::query::composer::ConstraintComposer;
use crate::query::layer::QueryLayer;
use crate::query::readers::{EndpointKind, QueryStringReader, RequestContext};
use crate::serialization::deserializer::{
    DeserializedResource, DocumentDeserializer, Linkage, WriteMode,
};
use crate::serialization::links::LinkContext;
use crate::serialization::objects::Document;
use crate::serialization::serializer::DocumentSerializer;
use crate::storage::{DataSource, Navigation, QueryLayerComposer, QueryPlan, UnitOfWork};

/// Status code and document of a completed operation
#[derive(Debug, Clone, PartialEq)]
pub struct JsonApiResponse {
    pub status: StatusCode,
    /// `None` for `204 No Content`
    pub document: Option<Document>,
}

impl JsonApiResponse {
    fn ok(document: Document) -> Self {
        Self {
            status: StatusCode::OK,
            document: Some(document),
        }
    }

    fn created(document: Document) -> Self {
        Self {
            status: StatusCode::CREATED,
            document: Some(document),
        }
    }

    fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            document: None,
        }
    }
}

/// Serves the JSON:API endpoints of every type in the resource graph
#[derive(Clone)]
pub struct JsonApiResourceService {
    graph: Arc<ResourceGraph>,
    options: Arc<JsonApiOptions>,
    data_source: Arc<dyn DataSource>,
    definitions: Arc<ResourceDefinitionRegistry>,
}

impl JsonApiResourceService {
    pub fn new(
        graph: Arc<ResourceGraph>,
        options: Arc<JsonApiOptions>,
        data_source: Arc<dyn DataSource>,
        definitions: Arc<ResourceDefinitionRegistry>,
    ) -> Self {
        Self {
            graph,
            options,
            data_source,
            definitions,
        }
    }

    pub fn graph(&self) -> &Arc<ResourceGraph> {
        &self.graph
    }

    pub fn options(&self) -> &Arc<JsonApiOptions> {
        &self.options
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// `GET /{type}`
    pub async fn get_all(
        &self,
        resource_type: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("get_all", resource_type);
        let result = self.run_get_all(&mut pipeline, resource_type, query).await;
        pipeline.check(result)
    }

    async fn run_get_all(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let layer = self.compose_query(primary, EndpointKind::PrimaryCollection, query)?;
        let plan = QueryLayerComposer::new(&self.graph).compose(&layer)?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let count_predicate = QueryLayerComposer::new(&self.graph).count_predicate(&layer);
        let count = async {
            if !self.options.include_total_resource_count {
                return Ok(None);
            }
            self.data_source
                .count(&primary.public_name, count_predicate.as_ref())
                .await
                .map(Some)
                .map_err(|source| {
                    JsonApiError::from(DataSourceError::Query {
                        resource_type: primary.public_name.clone(),
                        source,
                    })
                })
        };
        let (resources, total) = try_join(self.query(&plan), count).await?;
        pipeline.advance(PipelineStage::DataFetched);

        let serializer = DocumentSerializer::new(&self.graph, &self.options);
        let mut document = serializer.serialize_collection(&resources, &layer)?;
        document.links = serializer.links().top_level(&LinkContext {
            path: format!("/{}", primary.public_name),
            query,
            pagination: layer.pagination,
            returned: resources.len(),
            total,
            ..LinkContext::default()
        });
        document.meta = total.map(total_meta);
        pipeline.advance(PipelineStage::DocumentBuilt);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::ok(document))
    }

    /// `GET /{type}/{id}`
    pub async fn get_by_id(
        &self,
        resource_type: &str,
        id: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("get_by_id", resource_type);
        let result = self.run_get_by_id(&mut pipeline, resource_type, id, query).await;
        pipeline.check(result)
    }

    async fn run_get_by_id(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        id: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let id = parse_path_id(primary, id)?;
        let layer = self.compose_query(primary, EndpointKind::PrimarySingle, query)?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let resource = self
            .fetch_by_id(&id, &layer)
            .await?
            .ok_or_else(|| not_found(primary, &id))?;
        pipeline.advance(PipelineStage::DataFetched);

        let document = self.single_document(primary, &id, Some(&resource), &layer, query)?;
        pipeline.advance(PipelineStage::DocumentBuilt);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::ok(document))
    }

    /// `GET /{type}/{id}/{relationship}`
    pub async fn get_secondary(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("get_secondary", resource_type);
        let result = self
            .run_get_related(&mut pipeline, resource_type, id, relationship, query, false)
            .await;
        pipeline.check(result)
    }

    /// `GET /{type}/{id}/relationships/{relationship}`
    pub async fn get_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("get_relationship", resource_type);
        let result = self
            .run_get_related(&mut pipeline, resource_type, id, relationship, query, true)
            .await;
        pipeline.check(result)
    }

    async fn run_get_related(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        id: &str,
        relationship: &str,
        query: &[(String, String)],
        identifiers_only: bool,
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let id = parse_path_id(primary, id)?;
        let relationship = relationship_of(primary, relationship)?;
        let secondary = self.graph.right_type(relationship)?;

        let endpoint = match (identifiers_only, relationship.is_to_many()) {
            (false, true) => EndpointKind::SecondaryCollection,
            (false, false) => EndpointKind::SecondarySingle,
            (true, true) => EndpointKind::RelationshipCollection,
            (true, false) => EndpointKind::RelationshipSingle,
        };
        let layer = self.compose_query(secondary, endpoint, query)?;
        let plan = QueryLayerComposer::new(&self.graph)
            .compose_secondary(primary, &id, relationship, &layer)?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let mut owner = self
            .query(&plan)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(primary, &id))?;
        let related = owner
            .relationships
            .shift_remove(&relationship.property_name)
            .unwrap_or(if relationship.is_to_many() {
                RelationshipValue::ToMany(Vec::new())
            } else {
                RelationshipValue::ToOne(None)
            });
        pipeline.advance(PipelineStage::DataFetched);

        let serializer = DocumentSerializer::new(&self.graph, &self.options);
        let related_path = format!("/{}/{}/{}", primary.public_name, id, relationship.public_name);
        let (mut document, returned) = match (related, identifiers_only) {
            (RelationshipValue::ToMany(resources), false) => {
                (serializer.serialize_collection(&resources, &layer)?, resources.len())
            }
            (RelationshipValue::ToMany(resources), true) => {
                (serializer.serialize_identifiers(&resources), resources.len())
            }
            (RelationshipValue::ToOne(resource), false) => {
                let returned = usize::from(resource.is_some());
                (serializer.serialize_single(resource.as_deref(), &layer)?, returned)
            }
            (RelationshipValue::ToOne(resource), true) => {
                let returned = usize::from(resource.is_some());
                (serializer.serialize_identifier(resource.as_deref()), returned)
            }
        };

        let context = if identifiers_only {
            LinkContext {
                path: format!(
                    "/{}/{}/relationships/{}",
                    primary.public_name, id, relationship.public_name
                ),
                related_path: Some(related_path),
                query,
                pagination: layer.pagination,
                returned,
                ..LinkContext::default()
            }
        } else {
            LinkContext {
                path: related_path,
                query,
                pagination: layer.pagination,
                returned,
                ..LinkContext::default()
            }
        };
        document.links = serializer.links().top_level(&context);
        pipeline.advance(PipelineStage::DocumentBuilt);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::ok(document))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// `POST /{type}`
    pub async fn create(
        &self,
        resource_type: &str,
        body: &[u8],
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("create", resource_type);
        let result = self.run_create(&mut pipeline, resource_type, body, query).await;
        pipeline.check(result)
    }

    async fn run_create(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        body: &[u8],
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let layer = self.compose_query(primary, EndpointKind::PrimarySingle, query)?;
        let mut changes = DocumentDeserializer::new(&self.graph).deserialize_resource(
            body,
            &primary.public_name,
            WriteMode::Create,
        )?;
        if changes.id.is_some() && !self.options.allow_client_generated_ids {
            return Err(ValidationError::ClientGeneratedIdNotAllowed {
                pointer: "/data/id".to_string(),
            }
            .into());
        }
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let mut unit_of_work = self.begin().await?;
        let outcome = self.create_in(unit_of_work.as_mut(), primary, &mut changes).await;
        let id = finish(unit_of_work, outcome).await?;
        tracing::debug!(resource_type = %primary.public_name, id = %id, "resource created");

        let resource = self.fetch_by_id(&id, &layer).await?;
        pipeline.advance(PipelineStage::DataFetched);

        let document = self.single_document(primary, &id, resource.as_ref(), &layer, query)?;
        pipeline.advance(PipelineStage::DocumentBuilt);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::created(document))
    }

    async fn create_in(
        &self,
        unit_of_work: &mut dyn UnitOfWork,
        primary: &ResourceType,
        changes: &mut DeserializedResource,
    ) -> JsonApiResult<ResourceId> {
        let operation = WriteOperation::Create;
        let definition = self.definitions.get(&primary.public_name);
        if let Some(definition) = definition {
            let requested_id = changes.id.clone();
            definition.on_before_write(operation, requested_id.as_ref(), Some(changes))?;
        }

        if let Some(id) = &changes.id {
            let existing = unit_of_work
                .find_existing(&primary.public_name, std::slice::from_ref(id))
                .await
                .map_err(write_error(operation, &primary.public_name))?;
            if !existing.is_empty() {
                return Err(ConflictError::AlreadyExists {
                    resource_type: primary.public_name.clone(),
                    id: id.to_string(),
                }
                .into());
            }
        }
        for assignment in &changes.relationships {
            let ids = assignment.linkage.ids();
            ensure_related_exist(unit_of_work, &assignment.relationship, &ids, operation).await?;
        }

        let id = unit_of_work
            .insert(
                &primary.public_name,
                changes.id.clone(),
                &primary.id_kind,
                std::mem::take(&mut changes.attributes),
            )
            .await
            .map_err(write_error(operation, &primary.public_name))?;
        for assignment in &changes.relationships {
            unit_of_work
                .set_relationship(
                    &primary.public_name,
                    &id,
                    &Navigation::from(&assignment.relationship),
                    assignment.linkage.ids(),
                )
                .await
                .map_err(write_error(operation, &primary.public_name))?;
        }

        run_after_write(definition, operation, &id)?;
        Ok(id)
    }

    /// `PATCH /{type}/{id}`
    pub async fn update(
        &self,
        resource_type: &str,
        id: &str,
        body: &[u8],
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("update", resource_type);
        let result = self.run_update(&mut pipeline, resource_type, id, body, query).await;
        pipeline.check(result)
    }

    async fn run_update(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        id: &str,
        body: &[u8],
        query: &[(String, String)],
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let id = parse_path_id(primary, id)?;
        let layer = self.compose_query(primary, EndpointKind::PrimarySingle, query)?;
        let mut changes = DocumentDeserializer::new(&self.graph).deserialize_resource(
            body,
            &primary.public_name,
            WriteMode::Update { id: &id },
        )?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let mut unit_of_work = self.begin().await?;
        let outcome = self.update_in(unit_of_work.as_mut(), primary, &id, &mut changes).await;
        finish(unit_of_work, outcome).await?;
        tracing::debug!(resource_type = %primary.public_name, id = %id, "resource updated");

        let resource = self.fetch_by_id(&id, &layer).await?;
        pipeline.advance(PipelineStage::DataFetched);

        let document = self.single_document(primary, &id, resource.as_ref(), &layer, query)?;
        pipeline.advance(PipelineStage::DocumentBuilt);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::ok(document))
    }

    async fn update_in(
        &self,
        unit_of_work: &mut dyn UnitOfWork,
        primary: &ResourceType,
        id: &ResourceId,
        changes: &mut DeserializedResource,
    ) -> JsonApiResult<()> {
        let operation = WriteOperation::Update;
        let definition = self.definitions.get(&primary.public_name);
        if let Some(definition) = definition {
            definition.on_before_write(operation, Some(id), Some(changes))?;
        }

        ensure_exists(unit_of_work, primary, id, operation).await?;
        for assignment in &changes.relationships {
            let ids = assignment.linkage.ids();
            ensure_related_exist(unit_of_work, &assignment.relationship, &ids, operation).await?;
        }

        if !changes.attributes.is_empty() {
            let attributes = std::mem::take(&mut changes.attributes);
            unit_of_work
                .update_attributes(&primary.public_name, id, attributes)
                .await
                .map_err(write_error(operation, &primary.public_name))?;
        }
        for assignment in &changes.relationships {
            unit_of_work
                .set_relationship(
                    &primary.public_name,
                    id,
                    &Navigation::from(&assignment.relationship),
                    assignment.linkage.ids(),
                )
                .await
                .map_err(write_error(operation, &primary.public_name))?;
        }

        run_after_write(definition, operation, id)
    }

    /// `PATCH /{type}/{id}/relationships/{relationship}`: complete replacement
    pub async fn set_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &[u8],
    ) -> JsonApiResult<JsonApiResponse> {
        let operation = WriteOperation::SetRelationship;
        self.write_relationship(operation, resource_type, id, relationship, body).await
    }

    /// `POST /{type}/{id}/relationships/{relationship}` (to-many only)
    pub async fn add_to_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &[u8],
    ) -> JsonApiResult<JsonApiResponse> {
        let operation = WriteOperation::AddToRelationship;
        self.write_relationship(operation, resource_type, id, relationship, body).await
    }

    /// `DELETE /{type}/{id}/relationships/{relationship}` (to-many only)
    pub async fn remove_from_relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &[u8],
    ) -> JsonApiResult<JsonApiResponse> {
        self.write_relationship(
            WriteOperation::RemoveFromRelationship,
            resource_type,
            id,
            relationship,
            body,
        )
        .await
    }

    async fn write_relationship(
        &self,
        operation: WriteOperation,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &[u8],
    ) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("write_relationship", resource_type);
        let result = self
            .run_write_relationship(&mut pipeline, operation, resource_type, id, relationship, body)
            .await;
        pipeline.check(result)
    }

    async fn run_write_relationship(
        &self,
        pipeline: &mut Pipeline,
        operation: WriteOperation,
        resource_type: &str,
        id: &str,
        relationship: &str,
        body: &[u8],
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let id = parse_path_id(primary, id)?;
        let relationship = relationship_of(primary, relationship)?;
        if operation != WriteOperation::SetRelationship && !relationship.is_to_many() {
            return Err(ValidationError::UnsupportedOperation {
                message: format!(
                    "Only to-many relationships can be targeted in '{}' operations.",
                    operation
                ),
            }
            .into());
        }
        let linkage =
            DocumentDeserializer::new(&self.graph).deserialize_relationship(body, relationship)?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let mut unit_of_work = self.begin().await?;
        let outcome = self
            .write_relationship_in(
                unit_of_work.as_mut(),
                operation,
                primary,
                &id,
                relationship,
                linkage,
            )
            .await;
        finish(unit_of_work, outcome).await?;
        pipeline.advance(PipelineStage::DataFetched);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::no_content())
    }

    async fn write_relationship_in(
        &self,
        unit_of_work: &mut dyn UnitOfWork,
        operation: WriteOperation,
        primary: &ResourceType,
        id: &ResourceId,
        relationship: &RelationshipMetadata,
        linkage: Linkage,
    ) -> JsonApiResult<()> {
        let definition = self.definitions.get(&primary.public_name);
        if let Some(definition) = definition {
            definition.on_before_write(operation, Some(id), None)?;
        }

        ensure_exists(unit_of_work, primary, id, operation).await?;
        let related = linkage.ids();
        let navigation = Navigation::from(relationship);
        let table = primary.public_name.as_str();

        let outcome = match operation {
            WriteOperation::AddToRelationship => {
                ensure_related_exist(unit_of_work, relationship, &related, operation).await?;
                unit_of_work.add_to_relationship(table, id, &navigation, related).await
            }
            WriteOperation::RemoveFromRelationship => {
                unit_of_work.remove_from_relationship(table, id, &navigation, related).await
            }
            _ => {
                ensure_related_exist(unit_of_work, relationship, &related, operation).await?;
                unit_of_work.set_relationship(table, id, &navigation, related).await
            }
        };
        outcome.map_err(write_error(operation, table))?;

        run_after_write(definition, operation, id)
    }

    /// `DELETE /{type}/{id}`
    pub async fn delete(&self, resource_type: &str, id: &str) -> JsonApiResult<JsonApiResponse> {
        let mut pipeline = Pipeline::start("delete", resource_type);
        let result = self.run_delete(&mut pipeline, resource_type, id).await;
        pipeline.check(result)
    }

    async fn run_delete(
        &self,
        pipeline: &mut Pipeline,
        resource_type: &str,
        id: &str,
    ) -> JsonApiResult<JsonApiResponse> {
        let primary = self.graph.get_resource_type(resource_type)?;
        let id = parse_path_id(primary, id)?;
        pipeline.advance(PipelineStage::ConstraintsComposed);

        let mut unit_of_work = self.begin().await?;
        let outcome = self.delete_in(unit_of_work.as_mut(), primary, &id).await;
        finish(unit_of_work, outcome).await?;
        tracing::debug!(resource_type = %primary.public_name, id = %id, "resource deleted");
        pipeline.advance(PipelineStage::DataFetched);

        pipeline.advance(PipelineStage::Done);
        Ok(JsonApiResponse::no_content())
    }

    async fn delete_in(
        &self,
        unit_of_work: &mut dyn UnitOfWork,
        primary: &ResourceType,
        id: &ResourceId,
    ) -> JsonApiResult<()> {
        let operation = WriteOperation::Delete;
        let definition = self.definitions.get(&primary.public_name);
        if let Some(definition) = definition {
            definition.on_before_write(operation, Some(id), None)?;
        }

        ensure_exists(unit_of_work, primary, id, operation).await?;
        for relationship in &primary.relationships {
            let navigation = Navigation::from(relationship);
            if navigation.inverse.is_some() {
                unit_of_work
                    .set_relationship(&primary.public_name, id, &navigation, Vec::new())
                    .await
                    .map_err(write_error(operation, &primary.public_name))?;
            }
        }

        let deleted = unit_of_work
            .delete(&primary.public_name, id)
            .await
            .map_err(write_error(operation, &primary.public_name))?;
        if !deleted {
            return Err(not_found(primary, id));
        }

        run_after_write(definition, operation, id)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Read the query string and compose the layer tree for `resource_type`
    fn compose_query(
        &self,
        resource_type: &ResourceType,
        endpoint: EndpointKind,
        query: &[(String, String)],
    ) -> JsonApiResult<QueryLayer> {
        let request = RequestContext {
            graph: self.graph.clone(),
            options: self.options.clone(),
            resource_type: resource_type.public_name.clone(),
            endpoint,
        };
        let constraints = QueryStringReader::new(&request, &self.definitions).read(query)?;
        ConstraintComposer::new(&self.graph, &self.options, &self.definitions).compose(
            &resource_type.public_name,
            endpoint,
            &constraints,
        )
    }

    async fn query(&self, plan: &QueryPlan) -> JsonApiResult<Vec<Resource>> {
        tracing::debug!(table = %plan.table, "executing query plan");
        self.data_source.query(plan).await.map_err(|source| {
            DataSourceError::Query {
                resource_type: plan.table.clone(),
                source,
            }
            .into()
        })
    }

    async fn fetch_by_id(
        &self,
        id: &ResourceId,
        layer: &QueryLayer,
    ) -> JsonApiResult<Option<Resource>> {
        let plan = QueryLayerComposer::new(&self.graph).compose_by_id(layer, id)?;
        Ok(self.query(&plan).await?.into_iter().next())
    }

    async fn begin(&self) -> JsonApiResult<Box<dyn UnitOfWork>> {
        self.data_source
            .begin()
            .await
            .map_err(|source| DataSourceError::Transaction { source }.into())
    }

    fn single_document(
        &self,
        primary: &ResourceType,
        id: &ResourceId,
        resource: Option<&Resource>,
        layer: &QueryLayer,
        query: &[(String, String)],
    ) -> JsonApiResult<Document> {
        let serializer = DocumentSerializer::new(&self.graph, &self.options);
        let mut document = serializer.serialize_single(resource, layer)?;
        document.links = serializer.links().top_level(&LinkContext {
            path: format!("/{}/{}", primary.public_name, id),
            query,
            ..LinkContext::default()
        });
        Ok(document)
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(
    unit_of_work: Box<dyn UnitOfWork>,
    outcome: JsonApiResult<T>,
) -> JsonApiResult<T> {
    match outcome {
        Ok(value) => {
            unit_of_work
                .commit()
                .await
                .map_err(|source| DataSourceError::Transaction { source })?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = unit_of_work.rollback().await {
                tracing::error!(error = %rollback, "rollback failed");
            }
            Err(error)
        }
    }
}

async fn ensure_exists(
    unit_of_work: &mut dyn UnitOfWork,
    primary: &ResourceType,
    id: &ResourceId,
    operation: WriteOperation,
) -> JsonApiResult<()> {
    let existing = unit_of_work
        .find_existing(&primary.public_name, std::slice::from_ref(id))
        .await
        .map_err(write_error(operation, &primary.public_name))?;
    if existing.is_empty() {
        return Err(not_found(primary, id));
    }
    Ok(())
}

async fn ensure_related_exist(
    unit_of_work: &mut dyn UnitOfWork,
    relationship: &RelationshipMetadata,
    ids: &[ResourceId],
    operation: WriteOperation,
) -> JsonApiResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let existing = unit_of_work
        .find_existing(&relationship.right_type, ids)
        .await
        .map_err(write_error(operation, &relationship.right_type))?;
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !existing.contains(id))
        .map(ToString::to_string)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(NotFoundError::RelatedResources {
            resource_type: relationship.right_type.clone(),
            relationship: relationship.public_name.clone(),
            ids: missing,
        }
        .into())
    }
}

fn run_after_write(
    definition: Option<&Arc<dyn ResourceDefinition>>,
    operation: WriteOperation,
    id: &ResourceId,
) -> JsonApiResult<()> {
    match definition {
        Some(definition) => definition.on_after_write(operation, id),
        None => Ok(()),
    }
}

fn write_error(
    operation: WriteOperation,
    resource_type: &str,
) -> impl FnOnce(anyhow::Error) -> DataSourceError {
    let resource_type = resource_type.to_string();
    move |source| DataSourceError::Write {
        operation: operation.to_string(),
        resource_type,
        source,
    }
}

fn parse_path_id(resource_type: &ResourceType, value: &str) -> JsonApiResult<ResourceId> {
    resource_type.id_kind.parse(value).ok_or_else(|| {
        ValidationError::InvalidId {
            resource_type: resource_type.public_name.clone(),
            value: value.to_string(),
            pointer: None,
        }
        .into()
    })
}

fn relationship_of<'t>(
    resource_type: &'t ResourceType,
    name: &str,
) -> JsonApiResult<&'t RelationshipMetadata> {
    resource_type.relationship(name).ok_or_else(|| {
        NotFoundError::Relationship {
            resource_type: resource_type.public_name.clone(),
            relationship: name.to_string(),
        }
        .into()
    })
}

fn not_found(resource_type: &ResourceType, id: &ResourceId) -> JsonApiError {
    NotFoundError::Resource {
        resource_type: resource_type.public_name.clone(),
        id: id.to_string(),
    }
    .into()
}

fn total_meta(total: usize) -> IndexMap<String, Value> {
    IndexMap::from([("total".to_string(), Value::from(total))])
}
