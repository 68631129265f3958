//! Table endpoints with just enough PostgREST behaviour for the client:
//! `eq`/`in` filters, `or` groups of `eq`, single-column ordering, upsert
//! via `on_conflict`, and per-table row policies keyed on the caller.

use std::cmp::Ordering;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::MockError;
use crate::middleware::Caller;
use crate::state::{MockState, Row, Store, TABLES};

const INVESTMENT_KEY: &[&str] = &["company_id", "investor_id", "status"];

enum Filter {
    Eq(String, String),
    In(String, Vec<String>),
    AnyEq(Vec<(String, String)>),
}

struct Request {
    filters: Vec<Filter>,
    order: Option<(String, bool)>,
    on_conflict: Vec<String>,
}

fn parse_request(params: Vec<(String, String)>) -> Result<Request, MockError> {
    let mut request = Request {
        filters: Vec::new(),
        order: None,
        on_conflict: Vec::new(),
    };

    for (key, value) in params {
        match key.as_str() {
            "select" => {}
            "order" => {
                let (column, direction) = value.split_once('.').unwrap_or((value.as_str(), "asc"));
                request.order = Some((column.to_string(), direction == "desc"));
            }
            "on_conflict" => {
                request.on_conflict = value.split(',').map(str::to_string).collect();
            }
            "or" => {
                let inner = value
                    .strip_prefix('(')
                    .and_then(|v| v.strip_suffix(')'))
                    .ok_or_else(|| MockError::bad_request(format!("malformed or filter {}", value)))?;
                let mut alternatives = Vec::new();
                for part in inner.split(',') {
                    let mut pieces = part.splitn(3, '.');
                    match (pieces.next(), pieces.next(), pieces.next()) {
                        (Some(column), Some("eq"), Some(v)) => {
                            alternatives.push((column.to_string(), v.to_string()))
                        }
                        _ => return Err(MockError::bad_request(format!("unsupported or term {}", part))),
                    }
                }
                request.filters.push(Filter::AnyEq(alternatives));
            }
            _ => {
                if let Some(v) = value.strip_prefix("eq.") {
                    request.filters.push(Filter::Eq(key, v.to_string()));
                } else if let Some(list) = value.strip_prefix("in.(").and_then(|v| v.strip_suffix(')')) {
                    let values = list.split(',').filter(|s| !s.is_empty()).map(str::to_string).collect();
                    request.filters.push(Filter::In(key, values));
                } else {
                    return Err(MockError::bad_request(format!("unsupported filter {}={}", key, value)));
                }
            }
        }
    }

    Ok(request)
}

/// Column value in the textual form filters compare against.
fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| match filter {
        Filter::Eq(column, value) => text(row, column).as_deref() == Some(value.as_str()),
        Filter::In(column, values) => text(row, column).is_some_and(|v| values.contains(&v)),
        Filter::AnyEq(alternatives) => alternatives
            .iter()
            .any(|(column, value)| text(row, column).as_deref() == Some(value.as_str())),
    })
}

fn compare(a: &Row, b: &Row, column: &str) -> Ordering {
    match (a.get(column), b.get(column)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => text(a, column).cmp(&text(b, column)),
    }
}

fn column_is(row: &Row, column: &str, uid: Uuid) -> bool {
    text(row, column).as_deref() == Some(uid.to_string().as_str())
}

/// Row policy for reads.
fn can_read(table: &str, row: &Row, uid: Option<Uuid>) -> bool {
    match (table, uid) {
        ("companies", _) | ("profiles", _) => true,
        ("investments", Some(uid)) => column_is(row, "investor_id", uid),
        ("messages", Some(uid)) => column_is(row, "sender_id", uid) || column_is(row, "recipient_id", uid),
        ("user_roles", Some(uid)) => column_is(row, "user_id", uid),
        _ => false,
    }
}

/// Row policy for updates and deletes: rows outside it are silently
/// filtered out, as the real backend does.
fn can_modify(table: &str, row: &Row, uid: Uuid) -> bool {
    match table {
        "companies" => column_is(row, "founder_id", uid),
        "investments" => column_is(row, "investor_id", uid),
        "messages" => column_is(row, "recipient_id", uid),
        "profiles" => column_is(row, "id", uid),
        _ => false,
    }
}

/// Row policy for inserts: a violating row rejects the whole request.
fn can_insert(table: &str, row: &Row, uid: Uuid) -> bool {
    match table {
        "companies" => column_is(row, "founder_id", uid),
        "investments" => column_is(row, "investor_id", uid),
        "messages" => column_is(row, "sender_id", uid),
        "profiles" => column_is(row, "id", uid),
        "user_roles" => column_is(row, "user_id", uid),
        _ => false,
    }
}

fn known_table(table: &str) -> Result<&'static str, MockError> {
    TABLES
        .iter()
        .copied()
        .find(|t| *t == table)
        .ok_or_else(|| MockError::unknown_table(table))
}

fn require_user(caller: &Caller, table: &str) -> Result<Uuid, MockError> {
    caller
        .0
        .as_ref()
        .map(|claims| claims.sub)
        .ok_or_else(|| MockError::policy(table))
}

fn body_rows(body: Value) -> Result<Vec<Row>, MockError> {
    match body {
        Value::Object(row) => Ok(vec![row]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                _ => Err(MockError::bad_request("expected an object per row")),
            })
            .collect(),
        _ => Err(MockError::bad_request("expected a JSON object or array")),
    }
}

fn fill_defaults(store: &mut Store, table: &str, row: &mut Row) {
    row.entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    let created_at = store.next_timestamp();
    row.entry("created_at").or_insert(Value::String(created_at));

    match table {
        "messages" => {
            row.entry("read").or_insert(Value::Bool(false));
        }
        "investments" => {
            row.entry("amount").or_insert(json!(0));
        }
        _ => {}
    }
}

fn same_key(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns.iter().all(|c| text(a, c).is_some() && text(a, c) == text(b, c))
}

pub async fn select(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, MockError> {
    let table = known_table(&table)?;
    let request = parse_request(params)?;
    let uid = caller.0.as_ref().map(|c| c.sub);

    let store = state.store();
    let mut rows: Vec<Row> = store
        .table(table)
        .map(|rows| {
            rows.iter()
                .filter(|row| can_read(table, row, uid) && matches(row, &request.filters))
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    if let Some((column, descending)) = &request.order {
        rows.sort_by(|a, b| {
            let ord = compare(a, b, column);
            if *descending { ord.reverse() } else { ord }
        });
    }

    Ok(Json(rows))
}

pub async fn insert(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Extension(caller): Extension<Caller>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, MockError> {
    let table = known_table(&table)?;
    let uid = require_user(&caller, table)?;
    let request = parse_request(params)?;
    let merge = headers
        .get("Prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("resolution=merge-duplicates"));

    let incoming = body_rows(body)?;
    if incoming.iter().any(|row| !can_insert(table, row, uid)) {
        return Err(MockError::policy(table));
    }

    let conflict_columns: Vec<&str> = if request.on_conflict.is_empty() {
        if table == "investments" { INVESTMENT_KEY.to_vec() } else { vec!["id"] }
    } else {
        request.on_conflict.iter().map(String::as_str).collect()
    };

    let mut store = state.store();
    let mut written = Vec::with_capacity(incoming.len());
    for mut row in incoming {
        fill_defaults(&mut store, table, &mut row);

        let rows = store.table_mut(table).ok_or_else(|| MockError::unknown_table(table))?;
        let unique_hit = rows.iter().position(|existing| {
            same_key(existing, &row, &conflict_columns)
                || (table == "investments" && same_key(existing, &row, INVESTMENT_KEY))
        });

        match unique_hit {
            Some(index) if merge => {
                let existing = &mut rows[index];
                for (column, value) in row {
                    // Identity of the existing record is kept on merge
                    if column != "id" && column != "created_at" {
                        existing.insert(column, value);
                    }
                }
                written.push(existing.clone());
            }
            Some(_) => {
                let constraint = if table == "investments" {
                    "investments_company_id_investor_id_status_key".to_string()
                } else {
                    format!("{}_pkey", table)
                };
                return Err(MockError::duplicate(&constraint));
            }
            None => {
                rows.push(row.clone());
                written.push(row);
            }
        }
    }

    Ok((StatusCode::CREATED, Json(written)))
}

pub async fn update(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<Vec<(String, String)>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, MockError> {
    let table = known_table(&table)?;
    let uid = require_user(&caller, table)?;
    let request = parse_request(params)?;

    let Value::Object(changes) = body else {
        return Err(MockError::bad_request("expected a JSON object"));
    };
    if changes.contains_key("id") || changes.contains_key("founder_id") {
        return Err(MockError::policy(table));
    }
    // Recipients may only flip the read flag
    if table == "messages" && changes.keys().any(|k| k != "read") {
        return Err(MockError::policy(table));
    }

    let mut store = state.store();
    let rows = store.table_mut(table).ok_or_else(|| MockError::unknown_table(table))?;
    let mut updated = Vec::new();
    for row in rows.iter_mut() {
        if can_modify(table, row, uid) && matches(row, &request.filters) {
            for (column, value) in &changes {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }
    }

    Ok(Json(updated))
}

pub async fn delete(
    State(state): State<MockState>,
    Path(table): Path<String>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, MockError> {
    let table = known_table(&table)?;
    let uid = require_user(&caller, table)?;
    let request = parse_request(params)?;

    let mut store = state.store();
    let rows = store.table_mut(table).ok_or_else(|| MockError::unknown_table(table))?;
    let mut removed = Vec::new();
    rows.retain(|row| {
        if can_modify(table, row, uid) && matches(row, &request.filters) {
            removed.push(row.clone());
            false
        } else {
            true
        }
    });

    Ok(Json(removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn parses_supported_filters() {
        let request = parse_request(vec![
            ("select".into(), "*".into()),
            ("founder_id".into(), "eq.abc".into()),
            ("id".into(), "in.(1,2)".into()),
            ("or".into(), "(sender_id.eq.u,recipient_id.eq.u)".into()),
            ("order".into(), "created_at.desc".into()),
        ])
        .unwrap();

        assert_eq!(request.filters.len(), 3);
        assert_eq!(request.order, Some(("created_at".to_string(), true)));
        assert!(parse_request(vec![("name".into(), "ilike.*x*".into())]).is_err());
    }

    #[test]
    fn filters_compare_textually() {
        let r = row(json!({ "id": "a", "read": false, "amount": 5, "sender_id": "u" }));
        assert!(matches(&r, &[Filter::Eq("read".into(), "false".into())]));
        assert!(matches(&r, &[Filter::In("amount".into(), vec!["5".into(), "6".into()])]));
        assert!(matches(
            &r,
            &[Filter::AnyEq(vec![
                ("recipient_id".into(), "u".into()),
                ("sender_id".into(), "u".into())
            ])]
        ));
        assert!(!matches(&r, &[Filter::Eq("missing".into(), "x".into())]));
    }

    #[test]
    fn message_policy_covers_both_parties() {
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let message = row(json!({ "sender_id": sender.to_string(), "recipient_id": recipient.to_string() }));

        assert!(can_read("messages", &message, Some(sender)));
        assert!(can_read("messages", &message, Some(recipient)));
        assert!(!can_read("messages", &message, Some(stranger)));
        assert!(!can_read("messages", &message, None));
        assert!(can_modify("messages", &message, recipient));
        assert!(!can_modify("messages", &message, sender));
    }
}
