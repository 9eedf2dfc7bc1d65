//! In-memory implementation of DataSource for testing and development

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use uuid::Uuid;

use super::plan::{ColumnPath, Navigation, OrderTarget, PlanOperand, Predicate, QueryPlan};
use super::{DataSource, UnitOfWork};
use crate::core::field::FieldValue;
use crate::core::resource::{IdKind, RelationshipValue, Resource, ResourceId};
use crate::graph::ID_FIELD;
use crate::query::expression::ComparisonOperator;

#[derive(Debug, Clone, Default)]
struct Row {
    attributes: IndexMap<String, FieldValue>,
    to_one: HashMap<String, Option<ResourceId>>,
    to_many: HashMap<String, Vec<ResourceId>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct JunctionRow {
    left_table: String,
    left_id: ResourceId,
    right_table: String,
    right_id: ResourceId,
}

impl JunctionRow {
    /// The id on the far side when this row links `table`/`id` to `target`
    fn other_side(&self, table: &str, id: &ResourceId, target: &str) -> Option<&ResourceId> {
        if self.left_table == table && &self.left_id == id && self.right_table == target {
            Some(&self.right_id)
        } else if self.right_table == table && &self.right_id == id && self.left_table == target {
            Some(&self.left_id)
        } else {
            None
        }
    }

    fn touches(&self, table: &str, id: &ResourceId) -> bool {
        (self.left_table == table && &self.left_id == id)
            || (self.right_table == table && &self.right_id == id)
    }
}

#[derive(Debug, Clone, Default)]
struct Store {
    tables: HashMap<String, IndexMap<ResourceId, Row>>,
    junctions: HashMap<String, Vec<JunctionRow>>,
}

impl Store {
    fn row(&self, table: &str, id: &ResourceId) -> Option<&Row> {
        self.tables.get(table).and_then(|rows| rows.get(id))
    }

    fn row_mut(&mut self, table: &str, id: &ResourceId) -> Result<&mut Row> {
        self.tables
            .get_mut(table)
            .and_then(|rows| rows.get_mut(id))
            .ok_or_else(|| anyhow!("Row '{}' not found in table '{}'", id, table))
    }

    fn exists(&self, table: &str, id: &ResourceId) -> bool {
        self.row(table, id).is_some()
    }

    /// Ids behind a navigation of one row, skipping dangling references
    fn related_ids(
        &self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
    ) -> Vec<ResourceId> {
        let ids: Vec<ResourceId> = if let Some(junction) = &navigation.through {
            self.junctions
                .get(junction)
                .map(|rows| {
                    rows.iter()
                        .filter_map(|j| j.other_side(table, id, &navigation.target).cloned())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            match self.row(table, id) {
                Some(row) if navigation.to_many => {
                    row.to_many.get(&navigation.property).cloned().unwrap_or_default()
                }
                Some(row) => row
                    .to_one
                    .get(&navigation.property)
                    .cloned()
                    .flatten()
                    .into_iter()
                    .collect(),
                None => Vec::new(),
            }
        };

        ids.into_iter()
            .filter(|related| self.exists(&navigation.target, related))
            .collect()
    }

    /// Rows reached by following a navigation chain
    fn rows_along(
        &self,
        table: &str,
        id: &ResourceId,
        path: &[Navigation],
    ) -> Vec<(String, ResourceId)> {
        let mut current = vec![(table.to_string(), id.clone())];
        for navigation in path {
            current = current
                .iter()
                .flat_map(|(table, id)| {
                    self.related_ids(table, id, navigation)
                        .into_iter()
                        .map(|related| (navigation.target.clone(), related))
                })
                .collect();
        }
        current
    }

    fn column_value(&self, table: &str, id: &ResourceId, path: &ColumnPath) -> FieldValue {
        let Some((table, id)) = self.rows_along(table, id, &path.navigations).into_iter().next()
        else {
            return FieldValue::Null;
        };
        if path.column == ID_FIELD {
            return id.to_field_value();
        }
        self.row(&table, &id)
            .and_then(|row| row.attributes.get(&path.column).cloned())
            .unwrap_or(FieldValue::Null)
    }

    fn operand_value(&self, table: &str, id: &ResourceId, operand: &PlanOperand) -> FieldValue {
        match operand {
            PlanOperand::Column(path) => self.column_value(table, id, path),
            PlanOperand::Value(value) => value.clone(),
            PlanOperand::Null => FieldValue::Null,
            PlanOperand::Count(path) => {
                FieldValue::Integer(self.rows_along(table, id, path).len() as i64)
            }
        }
    }

    fn matches(&self, table: &str, id: &ResourceId, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::Compare {
                operator,
                left,
                right,
            } => {
                let left = self.operand_value(table, id, left);
                let right = self.operand_value(table, id, right);
                compare(*operator, &left, &right)
            }
            Predicate::And(terms) => terms.iter().all(|t| self.matches(table, id, t)),
            Predicate::Or(terms) => terms.iter().any(|t| self.matches(table, id, t)),
            Predicate::Not(inner) => !self.matches(table, id, inner),
            Predicate::Exists { path, predicate } => {
                self.rows_along(table, id, path)
                    .iter()
                    .any(|(related_table, related_id)| {
                        predicate
                            .as_ref()
                            .is_none_or(|p| self.matches(related_table, related_id, p))
                    })
            }
            Predicate::In { column, values } => {
                let value = self.column_value(table, id, column);
                values
                    .iter()
                    .any(|candidate| compare(ComparisonOperator::Equals, &value, candidate))
            }
            Predicate::Text { kind, column, text } => self
                .column_value(table, id, column)
                .as_string()
                .is_some_and(|value| kind.matches(value, text)),
        }
    }

    /// Filter, order and page candidate rows of `plan.table`
    fn select(&self, candidates: Vec<ResourceId>, plan: &QueryPlan) -> Vec<ResourceId> {
        let table = plan.table.as_str();
        let mut keyed: Vec<(ResourceId, Vec<FieldValue>)> = candidates
            .into_iter()
            .filter(|id| {
                plan.predicate
                    .as_ref()
                    .is_none_or(|p| self.matches(table, id, p))
            })
            .map(|id| {
                let keys = plan
                    .order
                    .iter()
                    .map(|key| match &key.target {
                        OrderTarget::Column(path) => self.column_value(table, &id, path),
                        OrderTarget::Count(path) => {
                            FieldValue::Integer(self.rows_along(table, &id, path).len() as i64)
                        }
                    })
                    .collect();
                (id, keys)
            })
            .collect();

        keyed.sort_by(|(_, a), (_, b)| {
            for (index, key) in plan.order.iter().enumerate() {
                let ordering = a[index].sort_cmp(&b[index]);
                let ordering = if key.ascending { ordering } else { ordering.reverse() };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let selected = keyed.into_iter().skip(plan.skip).map(|(id, _)| id);
        match plan.take {
            Some(take) => selected.take(take).collect(),
            None => selected.collect(),
        }
    }

    fn materialize(&self, id: &ResourceId, plan: &QueryPlan) -> Option<Resource> {
        let row = self.row(&plan.table, id)?;

        let mut resource = Resource::new(plan.table.clone(), id.clone());
        resource.attributes = match &plan.projection {
            Some(columns) => row
                .attributes
                .iter()
                .filter(|(column, _)| columns.contains(column))
                .map(|(column, value)| (column.clone(), value.clone()))
                .collect(),
            None => row.attributes.clone(),
        };

        for eager in &plan.eager_loads {
            let related = self.related_ids(&plan.table, id, &eager.navigation);
            let related: Vec<Resource> = self
                .select(related, &eager.plan)
                .iter()
                .filter_map(|related_id| self.materialize(related_id, &eager.plan))
                .collect();

            let value = if eager.navigation.to_many {
                RelationshipValue::ToMany(related)
            } else {
                RelationshipValue::ToOne(related.into_iter().next().map(Box::new))
            };
            resource
                .relationships
                .insert(eager.navigation.property.clone(), value);
        }

        Some(resource)
    }

    fn execute(&self, plan: &QueryPlan) -> Vec<Resource> {
        let candidates: Vec<ResourceId> = self
            .tables
            .get(&plan.table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default();
        self.select(candidates, plan)
            .iter()
            .filter_map(|id| self.materialize(id, plan))
            .collect()
    }

    fn next_id(&self, table: &str, id_kind: &IdKind) -> Result<ResourceId> {
        match id_kind {
            IdKind::Integer => {
                let max = self
                    .tables
                    .get(table)
                    .map(|rows| {
                        rows.keys()
                            .filter_map(|id| match id {
                                ResourceId::Integer(i) => Some(*i),
                                _ => None,
                            })
                            .max()
                            .unwrap_or(0)
                    })
                    .unwrap_or(0);
                Ok(ResourceId::Integer(max + 1))
            }
            IdKind::Uuid => Ok(ResourceId::Uuid(Uuid::new_v4())),
            IdKind::String => Ok(ResourceId::String(Uuid::new_v4().to_string())),
            IdKind::Custom(_) => Err(anyhow!(
                "Cannot generate identifiers for table '{}'; the client must supply one",
                table
            )),
        }
    }

    fn link(&mut self, junction: &str, left: (&str, &ResourceId), right: (&str, &ResourceId)) {
        let row = JunctionRow {
            left_table: left.0.to_string(),
            left_id: left.1.clone(),
            right_table: right.0.to_string(),
            right_id: right.1.clone(),
        };
        let rows = self.junctions.entry(junction.to_string()).or_default();
        if !rows.contains(&row) {
            rows.push(row);
        }
    }

    fn unlink(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        junction: &str,
        related: &[ResourceId],
    ) {
        if let Some(rows) = self.junctions.get_mut(junction) {
            rows.retain(|j| {
                !j.other_side(table, id, &navigation.target)
                    .is_some_and(|other| related.contains(other))
            });
        }
    }

    fn add_related(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()> {
        if let Some(junction) = &navigation.through {
            self.row_mut(table, id)?;
            for related_id in &related {
                self.link(junction, (table, id), (&navigation.target, related_id));
            }
            return Ok(());
        }

        let row = self.row_mut(table, id)?;
        if navigation.to_many {
            let list = row.to_many.entry(navigation.property.clone()).or_default();
            let mut added = Vec::new();
            for related_id in related {
                if !list.contains(&related_id) {
                    list.push(related_id.clone());
                    added.push(related_id);
                }
            }
            for related_id in &added {
                self.mirror_link(table, id, navigation, related_id);
            }
        } else {
            let next = related.into_iter().next();
            let previous = row.to_one.insert(navigation.property.clone(), next.clone()).flatten();
            if previous == next {
                return Ok(());
            }
            if let Some(previous) = &previous {
                self.mirror_unlink(id, navigation, previous);
            }
            if let Some(next) = &next {
                self.mirror_link(table, id, navigation, next);
            }
        }
        Ok(())
    }

    fn remove_related(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: &[ResourceId],
    ) -> Result<()> {
        if let Some(junction) = &navigation.through {
            self.row_mut(table, id)?;
            self.unlink(table, id, navigation, junction, related);
            return Ok(());
        }

        let row = self.row_mut(table, id)?;
        let mut removed = Vec::new();
        if navigation.to_many {
            if let Some(list) = row.to_many.get_mut(&navigation.property) {
                list.retain(|existing| {
                    let keep = !related.contains(existing);
                    if !keep {
                        removed.push(existing.clone());
                    }
                    keep
                });
            }
        } else if let Some(current) = row.to_one.get_mut(&navigation.property) {
            if current.as_ref().is_some_and(|c| related.contains(c)) {
                removed.extend(current.take());
            }
        }
        for related_id in &removed {
            self.mirror_unlink(id, navigation, related_id);
        }
        Ok(())
    }

    /// Point the inverse side of `related_id` at `id`
    ///
    /// A to-one inverse can only point at one owner, so its previous owner
    /// loses `related_id`.
    fn mirror_link(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related_id: &ResourceId,
    ) {
        let Some(inverse) = &navigation.inverse else {
            return;
        };
        let Ok(related_row) = self.row_mut(&navigation.target, related_id) else {
            return;
        };

        if inverse.to_many {
            let list = related_row.to_many.entry(inverse.property.clone()).or_default();
            if !list.contains(id) {
                list.push(id.clone());
            }
            return;
        }

        let previous = related_row
            .to_one
            .insert(inverse.property.clone(), Some(id.clone()))
            .flatten();
        let Some(previous) = previous.filter(|previous| previous != id) else {
            return;
        };
        if let Ok(previous_row) = self.row_mut(table, &previous) {
            if navigation.to_many {
                if let Some(list) = previous_row.to_many.get_mut(&navigation.property) {
                    list.retain(|existing| existing != related_id);
                }
            } else if let Some(current) = previous_row.to_one.get_mut(&navigation.property) {
                if current.as_ref() == Some(related_id) {
                    *current = None;
                }
            }
        }
    }

    /// Drop `id` from the inverse side of `related_id`
    fn mirror_unlink(&mut self, id: &ResourceId, navigation: &Navigation, related_id: &ResourceId) {
        let Some(inverse) = &navigation.inverse else {
            return;
        };
        let Ok(related_row) = self.row_mut(&navigation.target, related_id) else {
            return;
        };

        if inverse.to_many {
            if let Some(list) = related_row.to_many.get_mut(&inverse.property) {
                list.retain(|existing| existing != id);
            }
        } else if let Some(current) = related_row.to_one.get_mut(&inverse.property) {
            if current.as_ref() == Some(id) {
                *current = None;
            }
        }
    }
}

/// Comparison with SQL-like null handling: only `equals` matches null
fn compare(operator: ComparisonOperator, left: &FieldValue, right: &FieldValue) -> bool {
    if left.is_null() || right.is_null() {
        return operator == ComparisonOperator::Equals && left.is_null() && right.is_null();
    }
    let Some(ordering) = left.partial_cmp(right) else {
        return false;
    };
    match operator {
        ComparisonOperator::Equals => ordering == Ordering::Equal,
        ComparisonOperator::LessThan => ordering == Ordering::Less,
        ComparisonOperator::LessOrEqual => ordering != Ordering::Greater,
        ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
        ComparisonOperator::GreaterOrEqual => ordering != Ordering::Less,
    }
}

/// In-memory data source
///
/// Useful for testing and development. Readers share a tokio `RwLock`; a unit
/// of work holds the write lock for its whole lifetime and mutates a private
/// copy that replaces the store on commit.
#[derive(Clone, Default)]
pub struct InMemoryDataSource {
    store: Arc<RwLock<Store>>,
}

impl InMemoryDataSource {
    /// Create an empty in-memory data source
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource as-is, including its to-one and to-many references
    ///
    /// Relationship values are stored as id lists on the row; junction-backed
    /// relationships are seeded with [`seed_link`](Self::seed_link).
    pub async fn seed(&self, resource: Resource) {
        let mut store = self.store.write().await;
        let mut row = Row {
            attributes: resource.attributes,
            ..Row::default()
        };
        for (property, value) in resource.relationships {
            match value {
                RelationshipValue::ToOne(related) => {
                    row.to_one.insert(property, related.map(|r| r.id));
                }
                RelationshipValue::ToMany(related) => {
                    row.to_many
                        .insert(property, related.into_iter().map(|r| r.id).collect());
                }
            }
        }
        store
            .tables
            .entry(resource.resource_type)
            .or_default()
            .insert(resource.id, row);
    }

    /// Add a junction row linking two resources
    pub async fn seed_link(
        &self,
        junction: &str,
        left: (&str, ResourceId),
        right: (&str, ResourceId),
    ) {
        let mut store = self.store.write().await;
        store.link(junction, (left.0, &left.1), (right.0, &right.1));
    }

    /// Number of rows in a table
    pub async fn row_count(&self, table: &str) -> usize {
        let store = self.store.read().await;
        store.tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn query(&self, plan: &QueryPlan) -> Result<Vec<Resource>> {
        let store = self.store.read().await;
        Ok(store.execute(plan))
    }

    async fn count(&self, table: &str, predicate: Option<&Predicate>) -> Result<usize> {
        let store = self.store.read().await;
        let Some(rows) = store.tables.get(table) else {
            return Ok(0);
        };
        Ok(rows
            .keys()
            .filter(|id| predicate.is_none_or(|p| store.matches(table, id, p)))
            .count())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.store.clone().write_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, working }))
    }
}

/// Write transaction over a private copy of the store
pub struct InMemoryUnitOfWork {
    guard: OwnedRwLockWriteGuard<Store>,
    working: Store,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_existing(&mut self, table: &str, ids: &[ResourceId]) -> Result<Vec<ResourceId>> {
        Ok(ids
            .iter()
            .filter(|id| self.working.exists(table, id))
            .cloned()
            .collect())
    }

    async fn insert(
        &mut self,
        table: &str,
        id: Option<ResourceId>,
        id_kind: &IdKind,
        attributes: IndexMap<String, FieldValue>,
    ) -> Result<ResourceId> {
        let id = match id {
            Some(id) => id,
            None => self.working.next_id(table, id_kind)?,
        };
        let rows = self.working.tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(anyhow!("Row '{}' already exists in table '{}'", id, table));
        }
        rows.insert(
            id.clone(),
            Row {
                attributes,
                ..Row::default()
            },
        );
        Ok(id)
    }

    async fn update_attributes(
        &mut self,
        table: &str,
        id: &ResourceId,
        attributes: IndexMap<String, FieldValue>,
    ) -> Result<bool> {
        let Some(row) = self.working.tables.get_mut(table).and_then(|rows| rows.get_mut(id)) else {
            return Ok(false);
        };
        row.attributes.extend(attributes);
        Ok(true)
    }

    async fn set_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()> {
        let current = self.working.related_ids(table, id, navigation);
        self.working.remove_related(table, id, navigation, &current)?;
        if !navigation.to_many && navigation.through.is_none() && related.is_empty() {
            self.working
                .row_mut(table, id)?
                .to_one
                .insert(navigation.property.clone(), None);
            return Ok(());
        }
        self.working.add_related(table, id, navigation, related)
    }

    async fn add_to_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()> {
        self.working.add_related(table, id, navigation, related)
    }

    async fn remove_from_relationship(
        &mut self,
        table: &str,
        id: &ResourceId,
        navigation: &Navigation,
        related: Vec<ResourceId>,
    ) -> Result<()> {
        self.working.remove_related(table, id, navigation, &related)
    }

    async fn delete(&mut self, table: &str, id: &ResourceId) -> Result<bool> {
        let removed = self
            .working
            .tables
            .get_mut(table)
            .and_then(|rows| rows.shift_remove(id))
            .is_some();
        if removed {
            for rows in self.working.junctions.values_mut() {
                rows.retain(|j| !j.touches(table, id));
            }
        }
        Ok(removed)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::plan::{EagerLoad, InverseNavigation, OrderKey};

    fn tags_navigation() -> Navigation {
        Navigation {
            property: "tags".to_string(),
            target: "tags".to_string(),
            to_many: true,
            through: None,
            inverse: None,
        }
    }

    async fn fixture() -> InMemoryDataSource {
        let source = InMemoryDataSource::new();
        for (id, name) in [(1, "rust"), (2, "web"), (3, "db")] {
            source.seed(Resource::new("tags", id).with_attribute("name", name)).await;
        }
        source
            .seed(
                Resource::new("articles", 1)
                    .with_attribute("caption", "X")
                    .with_relationship(
                        "tags",
                        RelationshipValue::ToMany(vec![
                            Resource::new("tags", 1),
                            Resource::new("tags", 2),
                        ]),
                    ),
            )
            .await;
        source
            .seed(Resource::new("articles", 2).with_attribute("caption", "Y"))
            .await;
        source
    }

    fn caption_equals(value: &str) -> Predicate {
        Predicate::Compare {
            operator: ComparisonOperator::Equals,
            left: PlanOperand::Column(ColumnPath::column("caption")),
            right: PlanOperand::Value(FieldValue::from(value)),
        }
    }

    #[tokio::test]
    async fn test_query_filters_and_eager_loads_per_parent() {
        let source = fixture().await;
        let mut plan = QueryPlan::new("articles");
        plan.predicate = Some(caption_equals("X"));
        let mut tags_plan = QueryPlan::new("tags");
        tags_plan.take = Some(1);
        tags_plan.order = vec![OrderKey {
            target: OrderTarget::Column(ColumnPath::column("name")),
            ascending: true,
        }];
        plan.eager_loads.push(EagerLoad {
            navigation: tags_navigation(),
            plan: tags_plan,
        });

        let resources = source.query(&plan).await.expect("should query");
        assert_eq!(resources.len(), 1);
        match resources[0].relationship("tags") {
            Some(RelationshipValue::ToMany(tags)) => {
                assert_eq!(tags.len(), 1);
                assert_eq!(tags[0].attribute("name"), Some(&FieldValue::from("rust")));
            }
            other => panic!("unexpected relationship: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exists_and_count() {
        let source = fixture().await;
        let has_tags = Predicate::Exists {
            path: vec![tags_navigation()],
            predicate: None,
        };
        assert_eq!(source.count("articles", Some(&has_tags)).await.expect("count"), 1);
        assert_eq!(source.count("articles", None).await.expect("count"), 2);
        assert_eq!(source.count("unknown", None).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_null_only_matches_equals() {
        let source = fixture().await;
        let is_null = Predicate::Compare {
            operator: ComparisonOperator::Equals,
            left: PlanOperand::Column(ColumnPath::column("body")),
            right: PlanOperand::Null,
        };
        assert_eq!(source.count("articles", Some(&is_null)).await.expect("count"), 2);

        let greater = Predicate::Compare {
            operator: ComparisonOperator::GreaterThan,
            left: PlanOperand::Column(ColumnPath::column("body")),
            right: PlanOperand::Value(FieldValue::from("a")),
        };
        assert_eq!(source.count("articles", Some(&greater)).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let source = fixture().await;
        let mut uow = source.begin().await.expect("begin");
        uow.insert("tags", None, &IdKind::Integer, IndexMap::new())
            .await
            .expect("insert");
        uow.rollback().await.expect("rollback");
        assert_eq!(source.row_count("tags").await, 3);

        let mut uow = source.begin().await.expect("begin");
        let id = uow
            .insert("tags", None, &IdKind::Integer, IndexMap::new())
            .await
            .expect("insert");
        assert_eq!(id, ResourceId::Integer(4));
        uow.commit().await.expect("commit");
        assert_eq!(source.row_count("tags").await, 4);
    }

    #[tokio::test]
    async fn test_set_relationship_replaces_completely() {
        let source = fixture().await;
        let mut uow = source.begin().await.expect("begin");
        uow.set_relationship(
            "articles",
            &ResourceId::Integer(1),
            &tags_navigation(),
            vec![ResourceId::Integer(3)],
        )
        .await
        .expect("set");
        uow.commit().await.expect("commit");

        let mut plan = QueryPlan::new("articles");
        plan.predicate = Some(Predicate::id_equals(&ResourceId::Integer(1)));
        plan.eager_loads.push(EagerLoad {
            navigation: tags_navigation(),
            plan: QueryPlan::new("tags"),
        });
        let resources = source.query(&plan).await.expect("should query");
        let ids: Vec<ResourceId> = resources[0]
            .relationship("tags")
            .map(|r| r.resources().iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![ResourceId::Integer(3)]);
    }

    #[test]
    fn test_delete_removes_row_and_junction_links() {
        tokio_test::block_on(async {
            let source = fixture().await;
            source
                .seed_link(
                    "articleTags",
                    ("articles", ResourceId::Integer(2)),
                    ("tags", ResourceId::Integer(3)),
                )
                .await;

            let mut uow = source.begin().await.expect("begin");
            assert!(uow.delete("tags", &ResourceId::Integer(3)).await.expect("delete"));
            assert!(!uow.delete("tags", &ResourceId::Integer(3)).await.expect("delete"));
            uow.commit().await.expect("commit");

            assert_eq!(source.row_count("tags").await, 2);
            let store = source.store.read().await;
            assert_eq!(store.junctions.get("articleTags").map(Vec::len), Some(0));
        });
    }

    #[tokio::test]
    async fn test_junction_backed_relationship() {
        let source = fixture().await;
        let navigation = Navigation {
            property: "followers".to_string(),
            target: "people".to_string(),
            to_many: true,
            through: Some("tag_followers".to_string()),
            inverse: None,
        };
        source.seed(Resource::new("people", 1)).await;
        source.seed(Resource::new("people", 2)).await;

        let mut uow = source.begin().await.expect("begin");
        let tag = ResourceId::Integer(1);
        uow.add_to_relationship("tags", &tag, &navigation, vec![ResourceId::Integer(1)])
            .await
            .expect("add");
        uow.set_relationship("tags", &tag, &navigation, vec![ResourceId::Integer(2)])
            .await
            .expect("set");
        uow.commit().await.expect("commit");

        let store = source.store.read().await;
        assert_eq!(
            store.related_ids("tags", &ResourceId::Integer(1), &navigation),
            vec![ResourceId::Integer(2)]
        );
        assert_eq!(store.junctions.get("tag_followers").map(|rows| rows.len()), Some(1));
    }

    fn author_navigation() -> Navigation {
        Navigation {
            property: "author".to_string(),
            target: "people".to_string(),
            to_many: false,
            through: None,
            inverse: Some(InverseNavigation {
                property: "articles".to_string(),
                to_many: true,
            }),
        }
    }

    fn articles_navigation() -> Navigation {
        Navigation {
            property: "articles".to_string(),
            target: "articles".to_string(),
            to_many: true,
            through: None,
            inverse: Some(InverseNavigation {
                property: "author".to_string(),
                to_many: false,
            }),
        }
    }

    #[tokio::test]
    async fn test_writes_keep_inverse_side_in_sync() {
        let source = InMemoryDataSource::new();
        source.seed(Resource::new("people", 1)).await;
        source.seed(Resource::new("people", 2)).await;
        source.seed(Resource::new("articles", 10)).await;
        source.seed(Resource::new("articles", 11)).await;
        let (ada, grace) = (ResourceId::Integer(1), ResourceId::Integer(2));
        let (first, second) = (ResourceId::Integer(10), ResourceId::Integer(11));

        let mut uow = source.begin().await.expect("begin");
        uow.set_relationship("articles", &first, &author_navigation(), vec![ada.clone()])
            .await
            .expect("set author");
        uow.add_to_relationship("people", &ada, &articles_navigation(), vec![second.clone()])
            .await
            .expect("add article");
        uow.commit().await.expect("commit");
        {
            let store = source.store.read().await;
            assert_eq!(
                store.related_ids("people", &ada, &articles_navigation()),
                vec![first.clone(), second.clone()]
            );
            assert_eq!(
                store.related_ids("articles", &second, &author_navigation()),
                vec![ada.clone()]
            );
        }

        // moving an article to another author takes it away from the first
        let mut uow = source.begin().await.expect("begin");
        uow.add_to_relationship("people", &grace, &articles_navigation(), vec![first.clone()])
            .await
            .expect("move article");
        uow.remove_from_relationship("articles", &second, &author_navigation(), vec![ada.clone()])
            .await
            .expect("clear author");
        uow.commit().await.expect("commit");

        let store = source.store.read().await;
        assert!(store.related_ids("people", &ada, &articles_navigation()).is_empty());
        assert_eq!(
            store.related_ids("people", &grace, &articles_navigation()),
            vec![first.clone()]
        );
        assert_eq!(
            store.related_ids("articles", &first, &author_navigation()),
            vec![grace]
        );
        assert!(store.related_ids("articles", &second, &author_navigation()).is_empty());
    }
}
