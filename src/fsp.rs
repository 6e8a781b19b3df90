//! Filtering, sorting, and pagination (FSP) for task listings.
//!
//! `parse_task_query` is a pure function from raw query parameters to a
//! query descriptor; it performs no database access, which is what keeps it
//! independently testable. The route layer translates the descriptor into
//! SQL.
//!
//! Malformed pagination and `assigned_to` values degrade to defaults or are
//! dropped instead of producing errors. That leniency is part of the
//! contract, not an accident; clients relying on it exist.

use std::collections::HashMap;

/// Upper bound on the page size, so a client cannot request an unbounded
/// result set.
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Exact-match and range clauses for the task collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    /// Inclusive upper bound on `due_date`, compared lexically. No date
    /// parsing happens here; a garbage value yields a filter that matches
    /// unpredictably. Documented limitation.
    pub due_date_max: Option<String>,
    pub assigned_to: Option<i32>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.due_date_max.is_none()
            && self.assigned_to.is_none()
    }
}

/// The full query descriptor: filter clauses, ordered sort keys (first key
/// has highest precedence), and the page window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub filter: TaskFilter,
    pub sort: Vec<(String, SortDirection)>,
    pub skip: i64,
    pub limit: i64,
}

impl TaskQuery {
    /// The 1-based page this window corresponds to.
    pub fn page(&self) -> i64 {
        self.skip / self.limit + 1
    }
}

/// Parses FSP query parameters for task listings.
///
/// Pagination: `page` and `limit` must parse as integers; if either present
/// value fails to parse, both fall back (page 1, the configured default
/// limit) silently. `skip` is computed from the raw limit, after which the
/// limit is clamped to `1..=MAX_LIMIT`.
///
/// Sorting: `sort` is a comma-separated field list, leading `-` meaning
/// descending; the default is descending `due_date`.
pub fn parse_task_query(params: &HashMap<String, String>, default_limit: i64) -> TaskQuery {
    let (page, limit) = parse_pagination(params, default_limit).unwrap_or((1, default_limit));

    let skip = if page > 0 { (page - 1) * limit } else { 0 };
    let skip = skip.max(0);
    let limit = limit.clamp(1, MAX_LIMIT);

    let filter = TaskFilter {
        status: non_empty(params.get("status")),
        priority: non_empty(params.get("priority")),
        due_date_max: non_empty(params.get("due_date_max")),
        // An unparseable assignee reference drops the clause entirely.
        assigned_to: params.get("assigned_to").and_then(|v| v.parse().ok()),
    };

    let sort = parse_sort(params.get("sort").map(String::as_str).unwrap_or("-due_date"));

    TaskQuery {
        filter,
        sort,
        skip,
        limit,
    }
}

fn parse_pagination(params: &HashMap<String, String>, default_limit: i64) -> Option<(i64, i64)> {
    let page = match params.get("page") {
        Some(value) => value.parse::<i64>().ok()?,
        None => 1,
    };
    let limit = match params.get("limit") {
        Some(value) => value.parse::<i64>().ok()?,
        None => default_limit,
    };
    Some((page, limit))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

fn parse_sort(raw: &str) -> Vec<(String, SortDirection)> {
    let mut keys = Vec::new();
    for field in raw.split(',') {
        let field = field.trim();
        if let Some(name) = field.strip_prefix('-') {
            if !name.is_empty() {
                keys.push((name.to_string(), SortDirection::Desc));
            }
        } else if !field.is_empty() {
            keys.push((field.to_string(), SortDirection::Asc));
        }
    }
    keys
}
