//! Schema-driven configuration validation.
//!
//! [`validate`] walks a configuration value against a [`Schema`] and reports
//! missing required attributes, type mismatches, nested block cardinality and
//! per-attribute [`Constraint`]s as diagnostics.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_azurerm::schema::{Schema, Attribute};
//! use hemmer_provider_azurerm::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("sku", Attribute::required_string().one_of(&["Basic", "Standard"]))
//!     .with_attribute("capacity", Attribute::optional_int64().int_between(0, 40));
//!
//! assert!(validate(&schema, &json!({"sku": "Standard", "capacity": 2})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"sku": "Gold", "capacity": 41}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Constraint, Diagnostic, NestedBlock, Schema,
};
use serde_json::Value;
use std::net::IpAddr;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped
/// - Attribute types must match the schema
/// - Constraints are checked on every present value
/// - Nested blocks are validated recursively with min/max item limits
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but returns `Err` with the diagnostics when any are found.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diagnostic = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diagnostic = diagnostic.with_attribute(path);
            }
            diagnostics.push(diagnostic);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() == before {
                for constraint in &attr.constraints {
                    check_constraint(constraint, v, path, diagnostics);
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if as_int64(value).is_none() {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                let expected = if matches!(attr_type, AttributeType::List(_)) {
                    "list"
                } else {
                    "set"
                };
                diagnostics.push(type_error(path, expected, value));
            }
        },
        AttributeType::Map(value_type) => {
            if let Some(obj) = value.as_object() {
                for (key, val) in obj {
                    let key_path = format!("{}.{}", path, key);
                    validate_attribute_type(value_type, val, &key_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "map", value));
            }
        },
    }
}

/// Apply a constraint to a value; collections apply it to every element.
fn check_constraint(
    constraint: &Constraint,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                check_constraint(constraint, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        Value::Object(entries) => {
            for (key, item) in entries {
                check_constraint(constraint, item, &format!("{}.{}", path, key), diagnostics);
            }
        },
        _ => {
            if let Err(detail) = check_scalar(constraint, value) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                        .with_detail(detail)
                        .with_attribute(path),
                );
            }
        },
    }
}

fn check_scalar(constraint: &Constraint, value: &Value) -> Result<(), String> {
    match constraint {
        Constraint::OneOf {
            values,
            ignore_case,
        } => {
            let Some(s) = value.as_str() else {
                return Ok(());
            };
            let found = values.iter().any(|allowed| {
                if *ignore_case {
                    allowed.eq_ignore_ascii_case(s)
                } else {
                    allowed == s
                }
            });
            if found {
                Ok(())
            } else {
                Err(format!("expected one of [{}], got {:?}", values.join(", "), s))
            }
        },
        Constraint::IntRange { min, max } => match as_int64(value) {
            Some(n) if n < *min || n > *max => Err(format!(
                "expected to be in the range ({} - {}), got {}",
                min, max, n
            )),
            _ => Ok(()),
        },
        Constraint::Length { min, max } => {
            let Some(s) = value.as_str() else {
                return Ok(());
            };
            let len = s.chars().count();
            if len < *min || len > *max {
                Err(format!(
                    "expected length to be in the range ({} - {}), got {}",
                    min, max, len
                ))
            } else {
                Ok(())
            }
        },
        Constraint::String(check) => match value.as_str() {
            Some(s) => check(s),
            None => Ok(()),
        },
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None) | (_, Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List | BlockNestingMode::Set, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            // max_items of 0 means unlimited
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (_, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

/// Accepts an IPv4/IPv6 address or a CIDR range such as `10.0.0.0/16`.
pub fn ip_or_cidr(value: &str) -> Result<(), String> {
    let (addr, prefix) = match value.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (value, None),
    };
    let ip: IpAddr = addr
        .parse()
        .map_err(|_| format!("{:?} is not a valid IP address or CIDR range", value))?;
    if let Some(prefix) = prefix {
        let max = if ip.is_ipv4() { 32 } else { 128 };
        match prefix.parse::<u8>() {
            Ok(bits) if bits <= max => {},
            _ => return Err(format!("{:?} has an invalid prefix length", value)),
        }
    }
    Ok(())
}

/// Rejects empty or whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err("must not be empty or consist only of whitespace".to_string())
    } else {
        Ok(())
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Integers may arrive as whole floats (`42.0`) from JSON encoders.
fn as_int64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, value_type_name(got)))
        .with_attribute(path)
}
