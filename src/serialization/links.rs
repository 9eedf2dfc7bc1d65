//! `links` objects for resources, relationships and documents

use url::form_urlencoded;

use crate::config::JsonApiOptions;
use crate::query::expression::Pagination;

use super::objects::{RelationshipLinks, ResourceLinks, TopLevelLinks};

const PAGE_NUMBER: &str = "page[number]";

/// What the top-level links of a response are built from
#[derive(Debug, Clone, Default)]
pub struct LinkContext<'a> {
    /// Request path below the namespace, e.g. `/articles/1/tags`
    pub path: String,
    /// `related` link of relationship endpoints
    pub related_path: Option<String>,
    /// Query string as received
    pub query: &'a [(String, String)],
    /// Paging applied to the primary data (collection endpoints only)
    pub pagination: Option<Pagination>,
    /// Number of primary resources returned
    pub returned: usize,
    /// Total number of primary resources, when counted
    pub total: Option<usize>,
}

/// Builds absolute-path links under the configured namespace
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base_path: String,
    enabled: bool,
}

impl LinkBuilder {
    pub fn new(options: &JsonApiOptions) -> Self {
        Self {
            base_path: options.base_path(),
            enabled: options.include_links,
        }
    }

    pub fn resource(&self, resource_type: &str, id: &str) -> Option<ResourceLinks> {
        self.enabled.then(|| ResourceLinks {
            self_link: format!("{}/{}/{}", self.base_path, resource_type, id),
        })
    }

    pub fn relationship(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
    ) -> Option<RelationshipLinks> {
        self.enabled.then(|| RelationshipLinks {
            self_link: format!(
                "{}/{}/{}/relationships/{}",
                self.base_path, resource_type, id, relationship
            ),
            related: format!("{}/{}/{}/{}", self.base_path, resource_type, id, relationship),
        })
    }

    /// `self`, `related` and, for paged collections, `first`/`prev`/`next`/`last`
    pub fn top_level(&self, context: &LinkContext<'_>) -> Option<TopLevelLinks> {
        if !self.enabled {
            return None;
        }

        let mut links = TopLevelLinks {
            self_link: Some(self.url(&context.path, context.query.to_vec())),
            related: context
                .related_path
                .as_ref()
                .map(|path| format!("{}{}", self.base_path, path)),
            ..TopLevelLinks::default()
        };

        if let Some(page) = context.pagination {
            let page_link =
                |number: usize| self.url(&context.path, with_page_number(context.query, number));

            links.first = Some(page_link(1));
            if page.number > 1 {
                links.prev = Some(page_link(page.number - 1));
            }

            let last_page = context.total.map(|total| total.div_ceil(page.size.max(1)).max(1));
            let has_next = match last_page {
                Some(last) => page.number < last,
                None => context.returned >= page.size,
            };
            if has_next {
                links.next = page.number.checked_add(1).map(page_link);
            }
            links.last = last_page.map(page_link);
        }

        Some(links)
    }

    fn url(&self, path: &str, query: Vec<(String, String)>) -> String {
        let mut url = format!("{}{}", self.base_path, path);
        if !query.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }
}

/// Rewrite the unscoped element of `page[number]`, keeping scoped elements
///
/// Page 1 is expressed by leaving the unscoped element out.
fn with_page_number(query: &[(String, String)], number: usize) -> Vec<(String, String)> {
    let mut result = Vec::with_capacity(query.len() + 1);
    let mut replaced = false;

    for (name, value) in query {
        if name != PAGE_NUMBER {
            result.push((name.clone(), value.clone()));
            continue;
        }
        replaced = true;
        let mut elements: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|element| element.contains(':'))
            .map(String::from)
            .collect();
        if number > 1 {
            elements.insert(0, number.to_string());
        }
        if !elements.is_empty() {
            result.push((name.clone(), elements.join(",")));
        }
    }

    if !replaced && number > 1 {
        result.push((PAGE_NUMBER.to_string(), number.to_string()));
    }
    result
}
