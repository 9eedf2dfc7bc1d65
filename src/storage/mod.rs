//! Data-source abstraction: query execution and transactional writes
//!
//! The pipeline never touches storage directly. Reads are expressed as
//! [`QueryPlan`]s and writes go through a [`UnitOfWork`] that is either
//! committed or rolled back as a whole.

pub mod in_memory;
pub mod plan;

pub use in_memory::InMemoryDataSource;
pub use plan::{
    ColumnPath, EagerLoad, InverseNavigation, Navigation, OrderKey, OrderTarget, PlanOperand,
    Predicate, QueryLayerComposer, QueryPlan,
};

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;

use crate::core::field::FieldValue;
use crate::core::resource::{IdKind, Resource, ResourceId};

/// Read access plus the ability to start a write transaction
///
/// Errors are reported as `anyhow::Error`; the pipeline wraps them into
/// [`DataSourceError`](crate::core::error::DataSourceError)s and never retries.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Execute a plan; eager-loaded relationships are set on the returned resources
    async fn query(&self, plan: &QueryPlan) -> Result<Vec<Resource>>;

    /// Number of rows in `table` matching `predicate`
    async fn count(&self, table: &str, predicate: Option<&Predicate>) -> Result<usize>;

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// One write transaction
///
/// Nothing is visible to readers until [`commit`](UnitOfWork::commit).
/// Dropping a unit of work without committing discards its changes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Which of `ids` exist in `table`
    async fn find_existing(&mut self, table: &str, ids: &[ResourceId]) -> Result<Vec<ResourceId>>;

    /// Insert a row, generating an id of `id_kind` when none is given
    async fn insert(
        &mut self,
        table: &str,
        id: Option<ResourceId>,
        id_kind: &IdKind,
        attributes: IndexMap<String, FieldValue>,
    ) -> Result<ResourceId>;

    /// Overwrite the given attribute columns; false when the row does not exist
    async fn update_attributes(
        &mut self,
        table: &str,
        id: &ResourceId,
        attributes: IndexMap<String, FieldValue>,
    ) -> Result<bool>;

    /// Replace the complete set of related ids (zero or one for to-one)
    async fn set_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()>;

    async fn add_to_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()>;

    async fn remove_from_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()>;

    /// Delete a row; false when it did not exist
    async fn delete(&mut self, table: &str, id: &ResourceId) -> Result<bool>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
