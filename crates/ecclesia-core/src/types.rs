//! Basic types shared by the walker, aggregator and report engine

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A remote record whose schema is only known to the back office
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Read a numeric field from a record
///
/// Numbers sent as JSON strings (e.g. `"120.50"`) are accepted. Missing,
/// null or non-numeric values count as zero.
pub fn number_field(record: &Record, key: &str) -> f64 {
    match record.get(key) {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Filter criteria for one screen
///
/// Criteria are replaced wholesale on every filter change: every `with_*`
/// method returns a new value and leaves the receiver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    search: Option<String>,
    status: Option<String>,
    category: Option<String>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    page: u32,
    limit: u32,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            category: None,
            date_from: None,
            date_to: None,
            page: 1,
            limit: 10,
        }
    }
}

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl FilterCriteria {
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Category or service type, depending on the screen
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn date_from(&self) -> Option<NaiveDate> {
        self.date_from
    }

    pub fn date_to(&self) -> Option<NaiveDate> {
        self.date_to
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn with_search(&self, search: impl Into<String>) -> Self {
        Self {
            search: non_blank(search),
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_status(&self, status: impl Into<String>) -> Self {
        Self {
            status: non_blank(status),
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_category(&self, category: impl Into<String>) -> Self {
        Self {
            category: non_blank(category),
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_date_range(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            date_from: from,
            date_to: to,
            page: 1,
            ..self.clone()
        }
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self {
            page: page.max(1),
            ..self.clone()
        }
    }

    pub fn with_limit(&self, limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            page: 1,
            ..self.clone()
        }
    }

    /// Query parameters for the filter keys that are set
    ///
    /// Page and limit are not included; the fetcher supplies those per
    /// request.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(ref search) = self.search {
            pairs.push(("search".to_string(), search.clone()));
        }
        if let Some(ref status) = self.status {
            pairs.push(("status".to_string(), status.clone()));
        }
        if let Some(ref category) = self.category {
            pairs.push(("category".to_string(), category.clone()));
        }
        if let Some(from) = self.date_from {
            pairs.push(("dateFrom".to_string(), from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.date_to {
            pairs.push(("dateTo".to_string(), to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// Pagination cursor returned with every page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationCursor {
    pub current_page: u32,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default)]
    pub prev_page: Option<u32>,
    #[serde(default)]
    pub total_pages: u32,
}

impl PaginationCursor {
    /// Cursor for a response that carried no pagination block
    pub fn single(page: u32) -> Self {
        Self {
            current_page: page,
            next_page: None,
            prev_page: None,
            total_pages: page,
        }
    }
}

/// One fetched page of records
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub pagination: PaginationCursor,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>, pagination: PaginationCursor) -> Self {
        Self { records, pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_number_field_variants() {
        let r = record(json!({"a": 12.5, "b": "7.25", "c": null, "d": "n/a", "e": true}));
        assert_eq!(number_field(&r, "a"), 12.5);
        assert_eq!(number_field(&r, "b"), 7.25);
        assert_eq!(number_field(&r, "c"), 0.0);
        assert_eq!(number_field(&r, "d"), 0.0);
        assert_eq!(number_field(&r, "e"), 0.0);
        assert_eq!(number_field(&r, "missing"), 0.0);
    }

    #[test]
    fn test_with_methods_replace_not_mutate() {
        let base = FilterCriteria::default().with_page(4);
        let filtered = base.with_status("active");

        assert_eq!(base.status(), None);
        assert_eq!(base.page(), 4);
        assert_eq!(filtered.status(), Some("active"));
        assert_eq!(filtered.page(), 1);
    }

    #[test]
    fn test_blank_filters_are_cleared() {
        let criteria = FilterCriteria::default()
            .with_search("john")
            .with_search("   ");
        assert_eq!(criteria.search(), None);
    }

    #[test]
    fn test_query_pairs() {
        let criteria = FilterCriteria::default()
            .with_search("smith")
            .with_category("building")
            .with_date_range(
                NaiveDate::from_ymd_opt(2024, 1, 1),
                NaiveDate::from_ymd_opt(2024, 3, 31),
            );

        assert_eq!(
            criteria.query_pairs(),
            vec![
                ("search".to_string(), "smith".to_string()),
                ("category".to_string(), "building".to_string()),
                ("dateFrom".to_string(), "2024-01-01".to_string()),
                ("dateTo".to_string(), "2024-03-31".to_string()),
            ]
        );
    }

    #[test]
    fn test_cursor_deserializes_nulls() {
        let cursor: PaginationCursor = serde_json::from_value(json!({
            "currentPage": 3,
            "nextPage": null,
            "prevPage": 2,
            "totalPages": 3
        }))
        .unwrap();
        assert_eq!(cursor.current_page, 3);
        assert_eq!(cursor.next_page, None);
        assert_eq!(cursor.prev_page, Some(2));
    }
}
