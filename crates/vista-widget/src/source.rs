//! Widget data-source seam and an in-memory implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use vista_core::{Result, VistaError};

use crate::format::as_number;
use crate::model::{PageEnvelope, Record, SortOrder};

/// Parameters of one widget data request.
///
/// Chart widgets leave paging and sorting unset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageQuery {
    pub endpoint: String,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Non-empty server filters only
    pub filters: BTreeMap<String, String>,
}

impl PageQuery {
    /// Query for a whole, unpaged series.
    pub fn unpaged(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Query-string pairs in request order.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(page) = self.page {
            params.push(("page".to_string(), page.to_string()));
        }
        if let Some(size) = self.page_size {
            params.push(("page_size".to_string(), size.to_string()));
        }
        if let Some(sort_by) = &self.sort_by {
            params.push(("sort_by".to_string(), sort_by.clone()));
            let order = self.sort_order.unwrap_or_default();
            params.push(("sort_order".to_string(), order.as_str().to_string()));
        }
        for (field, value) in &self.filters {
            if !value.is_empty() {
                params.push((field.clone(), value.clone()));
            }
        }
        params
    }
}

/// Source of widget rows.
#[async_trait]
pub trait WidgetDataSource: Send + Sync {
    /// Fetch one page (or the whole series for unpaged queries).
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageEnvelope>;
}

/// Slice already filtered and sorted rows into a page.
///
/// The requested page is clamped to `1..=total_pages`.
pub fn paginate(rows: Vec<Record>, page: u32, page_size: u32) -> PageEnvelope {
    let page_size = page_size.max(1);
    let total = rows.len() as u64;
    let total_pages = total.div_ceil(u64::from(page_size)).max(1) as u32;
    let page = page.clamp(1, total_pages);

    let start = ((page - 1) * page_size) as usize;
    let data = rows
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    PageEnvelope {
        data,
        page,
        page_size,
        total_records: total,
        total_pages,
        has_next: page < total_pages,
        has_previous: page > 1,
    }
}

/// Keep rows whose field matches every filter, case-insensitively.
pub fn filter_rows(rows: Vec<Record>, filters: &BTreeMap<String, String>) -> Vec<Record> {
    rows.into_iter()
        .filter(|row| {
            filters.iter().filter(|(_, v)| !v.is_empty()).all(|(field, value)| {
                let cell = row.get(field).map(cell_text).unwrap_or_default();
                cell.to_lowercase() == value.to_lowercase()
            })
        })
        .collect()
}

/// Stable sort: numeric values before text, text compared case-insensitively.
pub fn sort_rows(rows: &mut [Record], key: &str, order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord = compare_cells(a.get(key), b.get(key));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let num = |v: Option<&Value>| v.and_then(as_number);
    match (num(a), num(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let text = |v: Option<&Value>| v.map(cell_text).unwrap_or_default().to_lowercase();
            text(a).cmp(&text(b))
        }
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// In-memory rows per endpoint, applying the backend's filter, sort and
/// paging rules. Used offline and in tests.
#[derive(Debug, Default)]
pub struct StaticDataSource {
    rows: HashMap<String, Vec<Record>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<PageQuery>>,
}

impl StaticDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` for `endpoint`.
    pub fn with_rows(mut self, endpoint: impl Into<String>, rows: Vec<Record>) -> Self {
        self.rows.insert(endpoint.into(), rows);
        self
    }

    /// Make every request to `endpoint` fail.
    pub fn failing(mut self, endpoint: impl Into<String>) -> Self {
        self.failing.insert(endpoint.into());
        self
    }

    /// Every query received so far.
    pub fn requests(&self) -> Vec<PageQuery> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WidgetDataSource for StaticDataSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<PageEnvelope> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(query.clone());
        }
        debug!(endpoint = %query.endpoint, page = ?query.page, "serving static page");

        if self.failing.contains(&query.endpoint) {
            return Err(VistaError::fetch(&query.endpoint, "endpoint unavailable"));
        }
        let rows = self
            .rows
            .get(&query.endpoint)
            .cloned()
            .ok_or_else(|| VistaError::not_found(format!("endpoint {}", query.endpoint)))?;

        let mut rows = filter_rows(rows, &query.filters);
        if let Some(key) = &query.sort_by {
            sort_rows(&mut rows, key, query.sort_order.unwrap_or_default());
        }

        let page_size = query
            .page_size
            .unwrap_or_else(|| u32::try_from(rows.len()).unwrap_or(u32::MAX).max(1));
        Ok(paginate(rows, query.page.unwrap_or(1), page_size))
    }
}
