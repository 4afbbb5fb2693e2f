use serde::{Deserialize, Serialize};

use crate::domain::validation::ValidationErrors;

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Newest,
    Oldest,
    Alphabetical,
}

impl SortOrder {
    /// `alias` is the table alias and `label` the column used for the
    /// alphabetical order. Both are compile-time names, never user input.
    pub fn as_sql(&self, alias: &str, label: &str) -> String {
        match self {
            Self::Newest => format!("{0}.created_at DESC, {0}.id DESC", alias),
            Self::Oldest => format!("{0}.created_at ASC, {0}.id ASC", alias),
            Self::Alphabetical => format!("{0}.{1} ASC, {0}.id ASC", alias, label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    pub sort: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
            sort: SortOrder::Newest,
        }
    }
}

impl PageRequest {
    /// `alphabetical_sort` is the accepted spelling of the label sort for the
    /// listed resource, e.g. `title_asc` for movies.
    pub fn from_query(
        query: PageQuery,
        alphabetical_sort: &str,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let page = query.page.unwrap_or(1);
        if page < 1 {
            errors.add("page", "Must be greater than 0");
        }

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            errors.add("limit", format!("Must be between 1 and {}", MAX_LIMIT));
        }

        let sort = match query.sort.as_deref() {
            None | Some("created_at_desc") => SortOrder::Newest,
            Some("created_at_asc") => SortOrder::Oldest,
            Some(value) if value == alphabetical_sort => SortOrder::Alphabetical,
            Some(_) => {
                errors.add("sort", "Unsupported sort order");
                SortOrder::Newest
            }
        };

        if errors.is_empty() && (page - 1).checked_mul(limit).is_none() {
            errors.add("page", "Is too large");
        }

        errors.into_result()?;
        Ok(Self { page, limit, sort })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total_rows: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: &PageRequest, total_rows: i64) -> Self {
        let total_pages = if total_rows == 0 {
            0
        } else {
            (total_rows + request.limit - 1) / request.limit
        };
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total_rows,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total_rows: self.total_rows,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_query_is_empty() {
        let request = PageRequest::from_query(PageQuery::default(), "title_asc").unwrap();
        assert_eq!(request, PageRequest::default());
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn alphabetical_sort_name_depends_on_resource() {
        let query = || PageQuery {
            page: Some(3),
            limit: Some(20),
            sort: Some("name_asc".to_string()),
        };
        let cinemas = PageRequest::from_query(query(), "name_asc").unwrap();
        assert_eq!(cinemas.sort, SortOrder::Alphabetical);
        assert_eq!(cinemas.offset(), 40);

        let movies = PageRequest::from_query(query(), "title_asc").unwrap_err();
        assert_eq!(movies.fields(), vec!["sort"]);
    }

    #[test]
    fn page_whose_offset_overflows_is_rejected() {
        let query = PageQuery {
            page: Some(i64::MAX),
            limit: Some(10),
            sort: None,
        };
        let errors = PageRequest::from_query(query, "name_asc").unwrap_err();
        assert_eq!(errors.fields(), vec!["page"]);

        let last = PageQuery {
            page: Some(i64::MAX / 10),
            limit: Some(10),
            sort: None,
        };
        let request = PageRequest::from_query(last, "name_asc").unwrap();
        assert!(request.offset() > 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let request = PageRequest {
            page: 1,
            limit: 10,
            sort: SortOrder::Newest,
        };
        assert_eq!(Page::new(Vec::<u8>::new(), &request, 0).total_pages, 0);
        assert_eq!(Page::new(Vec::<u8>::new(), &request, 10).total_pages, 1);
        assert_eq!(Page::new(Vec::<u8>::new(), &request, 11).total_pages, 2);
    }

    #[test]
    fn order_clause_uses_alias_and_label() {
        assert_eq!(
            SortOrder::Alphabetical.as_sql("m", "title"),
            "m.title ASC, m.id ASC"
        );
        assert_eq!(
            SortOrder::Newest.as_sql("c", "name"),
            "c.created_at DESC, c.id DESC"
        );
    }
}
