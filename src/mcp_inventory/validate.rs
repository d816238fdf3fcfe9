//! # Declarative Field Validation
//!
//! A small rule engine shared by every persisted type. Each type describes its
//! fields as a table of [`Field`] entries (name, current value, rule list) and
//! hands the table to [`validate_fields`]. Rules are applied per field in the
//! order the table declares them; the first violated rule wins and produces a
//! field-qualified error message.
//!
//! The rule set is deliberately minimal:
//!
//! - [`Rule::Required`]: empty strings, empty lists, and unset timestamps fail
//! - [`Rule::Min`] / [`Rule::Max`]: string length or collection/count bounds
//! - [`Rule::OneOf`]: membership in a fixed set of string values
//! - [`Rule::Url`]: the value must parse as an absolute URL (empty passes;
//!   pairing with `Required` makes it mandatory)

use crate::error::{InventoryError, Result};
use chrono::{DateTime, Utc};
use url::Url;

/// A single declarative validation rule.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Required,
    Min(usize),
    Max(usize),
    OneOf(&'static [&'static str]),
    Url,
}

/// The value of a field under validation, borrowed from the record.
pub enum FieldValue<'a> {
    Str(&'a str),
    List(&'a [String]),
    Count(usize),
    Time(DateTime<Utc>),
}

/// One row of a type's validation table.
pub struct Field<'a> {
    pub name: &'static str,
    pub value: FieldValue<'a>,
    pub rules: &'static [Rule],
}

impl<'a> Field<'a> {
    pub fn new(name: &'static str, value: FieldValue<'a>, rules: &'static [Rule]) -> Self {
        Self { name, value, rules }
    }
}

/// Timestamps decoded from files that never carried one sit at the epoch;
/// validation and repair both treat that as "unset".
pub(crate) fn is_zero_time(t: DateTime<Utc>) -> bool {
    t == DateTime::UNIX_EPOCH
}

/// Apply every field's rules in declaration order, failing on the first
/// violation with a message naming the offending field.
pub fn validate_fields(fields: &[Field]) -> Result<()> {
    for field in fields {
        for rule in field.rules {
            apply_rule(field, *rule)?;
        }
    }
    Ok(())
}

fn fail(msg: String) -> Result<()> {
    Err(InventoryError::Validation(msg))
}

fn apply_rule(field: &Field, rule: Rule) -> Result<()> {
    match rule {
        Rule::Required => match &field.value {
            FieldValue::Str(s) if s.is_empty() => {
                fail(format!("field {} is required", field.name))
            }
            FieldValue::List(l) if l.is_empty() => {
                fail(format!("field {} is required", field.name))
            }
            FieldValue::Count(0) => fail(format!("field {} is required", field.name)),
            FieldValue::Time(t) if is_zero_time(*t) => {
                fail(format!("field {} is required", field.name))
            }
            _ => Ok(()),
        },
        Rule::Min(min) => match &field.value {
            FieldValue::Str(s) if s.len() < min => fail(format!(
                "field {} must be at least {} characters",
                field.name, min
            )),
            FieldValue::Count(n) if *n < min => {
                fail(format!("field {} must be at least {}", field.name, min))
            }
            _ => Ok(()),
        },
        Rule::Max(max) => match &field.value {
            FieldValue::Str(s) if s.len() > max => fail(format!(
                "field {} must be at most {} characters",
                field.name, max
            )),
            FieldValue::List(l) if l.len() > max => fail(format!(
                "field {} must have at most {} items",
                field.name, max
            )),
            FieldValue::Count(n) if *n > max => fail(format!(
                "field {} must have at most {} items",
                field.name, max
            )),
            _ => Ok(()),
        },
        Rule::OneOf(allowed) => match &field.value {
            FieldValue::Str(s) if !allowed.iter().any(|v| v == s) => fail(format!(
                "field {} must be one of: {}",
                field.name,
                allowed.join(", ")
            )),
            _ => Ok(()),
        },
        Rule::Url => match &field.value {
            FieldValue::Str(s) if !s.is_empty() && Url::parse(s).is_err() => {
                fail(format!("field {} must be a valid URL", field.name))
            }
            _ => Ok(()),
        },
    }
}
