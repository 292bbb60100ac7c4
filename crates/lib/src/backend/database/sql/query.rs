//! Statement building for SQL backends.
//!
//! Collection and field names come from configuration, so they are always passed
//! through [`quote_ident`] before being placed in statement text. Values are never
//! interpolated; they are bound as `$n` parameters.

use serde_json::{Number, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row};

use crate::Result;
use crate::backend::RoleJoin;
use crate::backend::errors::BackendError;
use crate::record::Record;

/// A statement against the `Any` driver with its bound arguments.
pub(crate) type AnyQuery<'q> = Query<'q, Any, AnyArguments<'q>>;

/// Quotes an SQL identifier.
///
/// The name is wrapped in double quotes and embedded double quotes are doubled,
/// which is the standard form accepted by both SQLite and PostgreSQL. Empty names
/// and names containing NUL cannot be represented and are rejected.
pub fn quote_ident(identifier: &str) -> Result<String> {
    if identifier.is_empty() {
        return Err(BackendError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: "identifier is empty".to_string(),
        }
        .into());
    }
    if identifier.contains('\0') {
        return Err(BackendError::InvalidIdentifier {
            identifier: identifier.to_string(),
            reason: "identifier contains a NUL byte".to_string(),
        }
        .into());
    }
    Ok(format!("\"{}\"", identifier.replace('"', "\"\"")))
}

/// Comma-separated `$start..$start+count` placeholders.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|n| format!("${n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `SELECT * FROM table WHERE field = $1`
pub(crate) fn select_by(table: &str, field: &str) -> Result<String> {
    Ok(format!(
        "SELECT * FROM {} WHERE {} = $1",
        quote_ident(table)?,
        quote_ident(field)?
    ))
}

/// `SELECT * FROM table WHERE field IN ($1, ..., $count)`
pub(crate) fn select_in(table: &str, field: &str, count: usize) -> Result<String> {
    Ok(format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        quote_ident(table)?,
        quote_ident(field)?,
        placeholders(1, count)
    ))
}

/// `INSERT INTO table (a, b, ...) VALUES ($1, $2, ...)`
pub(crate) fn insert(table: &str, fields: &[&str]) -> Result<String> {
    if fields.is_empty() {
        return Ok(format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table)?));
    }

    let columns = fields
        .iter()
        .map(|field| quote_ident(field))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "INSERT INTO {} ({columns}) VALUES ({})",
        quote_ident(table)?,
        placeholders(1, fields.len())
    ))
}

/// `UPDATE table SET a = $1, b = $2 WHERE key = $3`
///
/// The key value binds after all the assignments.
pub(crate) fn update(table: &str, fields: &[&str], key: &str) -> Result<String> {
    let assignments = fields
        .iter()
        .enumerate()
        .map(|(i, field)| -> Result<String> {
            Ok(format!("{} = ${}", quote_ident(field)?, i + 1))
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "UPDATE {} SET {assignments} WHERE {} = ${}",
        quote_ident(table)?,
        quote_ident(key)?,
        fields.len() + 1
    ))
}

/// Single-statement inner join from a user id to role names.
///
/// No ORDER BY: result order is whatever the database returns.
pub(crate) fn role_join(join: &RoleJoin<'_>) -> Result<String> {
    Ok(format!(
        "SELECT r.{role_name} FROM {links} AS l \
         INNER JOIN {roles} AS r ON r.{role_id} = l.{link_role_id} \
         WHERE l.{link_user_id} = $1",
        role_name = quote_ident(join.role_name)?,
        links = quote_ident(join.links)?,
        roles = quote_ident(join.roles)?,
        role_id = quote_ident(join.role_id)?,
        link_role_id = quote_ident(join.link_role_id)?,
        link_user_id = quote_ident(join.link_user_id)?,
    ))
}

/// Binds a JSON value as the next statement parameter.
///
/// Scalars only; arrays and objects have no portable column type.
pub(crate) fn bind_value<'q>(
    query: AnyQuery<'q>,
    field: &str,
    value: &Value,
) -> Result<AnyQuery<'q>> {
    let query = match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) => query.bind(f),
            (None, None) => {
                return Err(BackendError::UnsupportedValue {
                    field: field.to_string(),
                    reason: format!("number {n} is not representable"),
                }
                .into());
            }
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => {
            return Err(BackendError::UnsupportedValue {
                field: field.to_string(),
                reason: "nested arrays and objects cannot be stored in a column".to_string(),
            }
            .into());
        }
    };
    Ok(query)
}

/// Decodes a column into JSON by trying each supported type in turn.
///
/// Booleans written to SQLite are stored in INTEGER columns and come back as the
/// integers 0 and 1.
pub(crate) fn decode_column(row: &AnyRow, index: usize) -> Option<Value> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Some(v.map_or(Value::Null, Value::from));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Some(
            v.and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
        );
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Some(v.map_or(Value::Null, Value::String));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Some(v.map_or(Value::Null, Value::Bool));
    }
    None
}

/// Decodes a full row into a record, keyed by column name.
pub(crate) fn decode_row(collection: &str, row: &AnyRow) -> Result<Record> {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal()).ok_or_else(|| {
            BackendError::UnsupportedColumn {
                collection: collection.to_string(),
                column: column.name().to_string(),
            }
        })?;
        record.set(column.name(), value);
    }
    Ok(record)
}
