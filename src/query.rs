use crate::errors::{AppError, AppResult};
use crate::models::{Page, Record};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// One filter criterion. Predicates are pure; a record survives a query
/// only if it satisfies every predicate in the list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Predicate {
    /// Exact match on a single field.
    FieldEquals { field: String, value: Value },
    /// Case-insensitive substring match; passes if ANY listed field contains
    /// the term.
    TextSearch { term: String, fields: Vec<String> },
    /// Inclusive on both bounds; an absent bound leaves that side open.
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl Predicate {
    pub fn field_equals(field: &str, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn text_search(term: &str, fields: &[&str]) -> Self {
        Self::TextSearch {
            term: term.to_string(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self::DateRange { from, to }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::FieldEquals { field, value } => record.field(field) == Some(value),
            Self::TextSearch { term, fields } => {
                let needle = term.to_lowercase();
                fields.iter().any(|field| {
                    record
                        .field_text(field)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
            Self::DateRange { from, to } => {
                if let Some(from) = from {
                    if record.date < *from {
                        return false;
                    }
                }
                if let Some(to) = to {
                    if record.date > *to {
                        return false;
                    }
                }
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum SortKey {
    DateAsc,
    DateDesc,
    Field {
        name: String,
        direction: SortDirection,
    },
}

impl Default for SortKey {
    fn default() -> Self {
        Self::DateAsc
    }
}

impl SortKey {
    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            Self::DateAsc => a.date.cmp(&b.date),
            Self::DateDesc => b.date.cmp(&a.date),
            Self::Field { name, direction } => {
                let ordering = compare_values(a.field(name), b.field(name));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            }
        }
    }
}

/// Missing values sort after present ones; numbers compare numerically,
/// everything else through its string form.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(left), Value::Number(right)) => left
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&right.as_f64().unwrap_or(f64::NAN)),
            (Value::String(left), Value::String(right)) => left.cmp(right),
            (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
            (left, right) => left.to_string().cmp(&right.to_string()),
        },
    }
}

/// Filter, sort, and slice one page out of a record collection.
///
/// Ties under `sort` keep the collection's insertion order. A `page_number`
/// outside `[1, total_pages]` is clipped and the corrected number returned
/// in the page; an empty result is a single empty page, not an error.
pub fn query(
    records: Vec<Record>,
    predicates: &[Predicate],
    sort: &SortKey,
    page_number: usize,
    page_size: usize,
) -> AppResult<Page<Record>> {
    if page_size == 0 {
        return Err(AppError::InvalidArgument(
            "Page size must be at least 1".to_string(),
        ));
    }

    let mut survivors = apply_predicates(records, predicates);
    sort_records(&mut survivors, sort);
    Ok(paginate(survivors, page_number, page_size))
}

pub fn apply_predicates(mut records: Vec<Record>, predicates: &[Predicate]) -> Vec<Record> {
    if predicates.is_empty() {
        return records;
    }
    records.retain(|record| predicates.iter().all(|predicate| predicate.matches(record)));
    records
}

pub fn sort_records(records: &mut [Record], sort: &SortKey) {
    // Vec::sort_by is stable, so equal keys keep insertion order.
    records.sort_by(|a, b| sort.compare(a, b));
}

fn paginate(items: Vec<Record>, page_number: usize, page_size: usize) -> Page<Record> {
    let total_items = items.len();
    let total_pages = total_items.div_ceil(page_size);
    let page_number = page_number.clamp(1, total_pages.max(1));

    let items: Vec<Record> = items
        .into_iter()
        .skip((page_number - 1) * page_size)
        .take(page_size)
        .collect();

    Page {
        items,
        page_number,
        page_size,
        total_items,
        total_pages,
    }
}

/// Sorted, deduplicated string values of one field, for filter dropdowns.
pub fn distinct_values(records: &[Record], field: &str) -> Vec<String> {
    let mut values: Vec<String> = records
        .iter()
        .filter_map(|record| record.field_text(field))
        .collect();
    values.sort();
    values.dedup();
    values
}
