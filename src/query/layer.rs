//! Per-resource-type query plan, nested along the include tree

use indexmap::{IndexMap, IndexSet};

use super::expression::{Pagination, QueryExpression, SortExpression};

/// Filter, sort, paging, include and fieldset constraints for one resource type
///
/// All field chains inside resolve against `resource_type`; nested layers in
/// `include` are keyed by relationship public name.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLayer {
    pub resource_type: String,
    pub filter: Option<QueryExpression>,
    pub sort: Option<SortExpression>,
    pub pagination: Option<Pagination>,
    pub include: IndexMap<String, QueryLayer>,
    pub fieldset: Option<IndexSet<String>>,
}

impl QueryLayer {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            filter: None,
            sort: None,
            pagination: None,
            include: IndexMap::new(),
            fieldset: None,
        }
    }

    /// Whether a field is part of the selected fieldset (all fields when unrestricted)
    pub fn is_selected(&self, public_name: &str) -> bool {
        self.fieldset
            .as_ref()
            .map(|fields| fields.contains(public_name))
            .unwrap_or(true)
    }

    /// Nested layer at a relationship path
    pub fn layer_at(&self, path: &[String]) -> Option<&QueryLayer> {
        path.iter()
            .try_fold(self, |layer, name| layer.include.get(name))
    }

    pub fn layer_at_mut(&mut self, path: &[String]) -> Option<&mut QueryLayer> {
        let mut layer = self;
        for name in path {
            layer = layer.include.get_mut(name)?;
        }
        Some(layer)
    }

    /// Visit this layer and every nested layer, parents first
    pub fn for_each_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut QueryLayer) -> Result<(), E>,
    ) -> Result<(), E> {
        f(self)?;
        for child in self.include.values_mut() {
            child.for_each_mut(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_at_follows_include_tree() {
        let mut root = QueryLayer::new("articles");
        let mut author = QueryLayer::new("people");
        author.include.insert("articles".to_string(), QueryLayer::new("articles"));
        root.include.insert("author".to_string(), author);

        let path = vec!["author".to_string(), "articles".to_string()];
        assert_eq!(root.layer_at(&path).map(|l| l.resource_type.as_str()), Some("articles"));
        assert!(root.layer_at(&["tags".to_string()]).is_none());
        assert!(root.layer_at(&[]).is_some());
    }

    #[test]
    fn test_unrestricted_layer_selects_everything() {
        let mut layer = QueryLayer::new("articles");
        assert!(layer.is_selected("caption"));

        layer.fieldset = Some(IndexSet::from(["caption".to_string()]));
        assert!(layer.is_selected("caption"));
        assert!(!layer.is_selected("body"));
    }
}
