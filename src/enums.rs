//! Enum normalization.
//!
//! glTF schemas spell enums three ways:
//!
//! ```json
//! {"type": "string", "enum": ["OPAQUE", "MASK"]}
//! {"type": "string", "anyOf": [{"enum": ["OPAQUE"]}, {"enum": ["MASK"]}]}
//! {"anyOf": [{"const": "OPAQUE", "type": "string"}, {"type": "string"}]}
//! ```
//!
//! All three normalize to the same [`EnumType`]. Entries without a literal
//! (the catch-all `{"type": "string"}` that keeps glTF enums open) take part
//! in type agreement but produce no constant.

use serde_json::Value;
use tracing::warn;

use crate::names::make_identifier;
use crate::schema::declared_type;
use crate::types::{Documentation, EnumLiteral, EnumType, EnumValueType, EnumVariant};

/// One entry before type agreement is checked.
struct RawEntry<'a> {
    literal: Option<&'a Value>,
    description: Option<&'a str>,
    declared: Option<&'a str>,
}

fn raw_entries(fragment: &Value) -> Vec<RawEntry<'_>> {
    let outer_type = declared_type(fragment);

    if let Some(any_of) = fragment.get("anyOf").and_then(Value::as_array) {
        return any_of
            .iter()
            .map(|entry| {
                let description = entry.get("description").and_then(Value::as_str);
                match entry.get("enum").and_then(Value::as_array) {
                    Some(values) if !values.is_empty() => RawEntry {
                        literal: values.first(),
                        description,
                        declared: outer_type.or_else(|| declared_type(entry)),
                    },
                    _ => RawEntry {
                        literal: entry.get("const"),
                        description,
                        declared: declared_type(entry).or(outer_type),
                    },
                }
            })
            .collect();
    }

    fragment
        .get("enum")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .map(|value| RawEntry {
                    literal: Some(value),
                    description: value.as_str(),
                    declared: outer_type,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn value_type_of(type_name: &str) -> Option<EnumValueType> {
    match type_name {
        "integer" => Some(EnumValueType::Integer),
        "string" => Some(EnumValueType::String),
        _ => None,
    }
}

fn inferred_type(literal: &Value) -> Option<EnumValueType> {
    if literal.is_string() {
        Some(EnumValueType::String)
    } else if literal.is_i64() || literal.is_u64() {
        Some(EnumValueType::Integer)
    } else {
        None
    }
}

fn to_literal(value: &Value, value_type: EnumValueType) -> Option<EnumLiteral> {
    match value_type {
        EnumValueType::Integer => value.as_i64().map(EnumLiteral::Integer),
        EnumValueType::String => value.as_str().map(|s| EnumLiteral::String(s.to_string())),
    }
}

/// Normalize the enum in `fragment` into a struct named `name` nested in
/// `scope`.
///
/// `default` is the effective default of the property, which may come from
/// an enclosing fragment. `label` names the property in warnings.
///
/// Returns `None` (after a warning) when the entries do not agree on a single
/// integer or string type; the caller falls back to a generic JSON value.
pub fn resolve_enum(
    name: &str,
    scope: &str,
    fragment: &Value,
    default: Option<&Value>,
    label: &str,
) -> Option<EnumType> {
    let entries = raw_entries(fragment);

    let mut agreed: Option<EnumValueType> = None;
    for entry in &entries {
        let entry_type = match entry.declared {
            Some(declared) => value_type_of(declared),
            None => entry.literal.and_then(inferred_type),
        };
        let Some(entry_type) = entry_type else {
            if entry.declared.is_some() || entry.literal.is_some() {
                warn!("enum {label} has a value that is neither integer nor string");
                return None;
            }
            continue;
        };
        match agreed {
            None => agreed = Some(entry_type),
            Some(t) if t == entry_type => {}
            Some(_) => {
                warn!("enum {label} mixes integer and string values");
                return None;
            }
        }
    }
    let Some(value_type) = agreed else {
        warn!("enum {label} has no usable values");
        return None;
    };

    let mut variants = Vec::new();
    for entry in &entries {
        let Some(literal) = entry.literal else {
            continue;
        };
        let Some(value) = to_literal(literal, value_type) else {
            warn!("enum {label} value {literal} does not match its declared type");
            return None;
        };
        let identifier = match &value {
            EnumLiteral::String(s) => make_identifier(s),
            EnumLiteral::Integer(i) => {
                make_identifier(entry.description.unwrap_or(&i.to_string()))
            }
        };
        variants.push(EnumVariant {
            identifier,
            value,
            description: entry.description.map(str::to_string),
            value_type,
        });
    }
    if variants.is_empty() {
        warn!("enum {label} has no constant values");
        return None;
    }

    let default_identifier = default
        .and_then(|d| to_literal(d, value_type))
        .and_then(|d| variants.iter().find(|v| v.value == d))
        .or_else(|| variants.first())
        .map(|v| v.identifier.clone());

    Some(EnumType {
        name: name.to_string(),
        scope: scope.to_string(),
        value_type,
        variants,
        default_identifier,
        doc: Documentation::from_fragment(fragment),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn resolve(fragment: &Value) -> Option<EnumType> {
        resolve_enum(
            "AlphaMode",
            "CesiumGltf::Material",
            fragment,
            fragment.get("default"),
            "Material.alphaMode",
        )
    }

    fn pairs(e: &EnumType) -> Vec<(String, EnumLiteral)> {
        e.variants
            .iter()
            .map(|v| (v.identifier.clone(), v.value.clone()))
            .collect()
    }

    #[test]
    fn three_string_idioms_agree() {
        let classic = json!({"type": "string", "enum": ["OPAQUE", "MASK", "BLEND"]});
        let any_of_enum = json!({
            "type": "string",
            "anyOf": [{"enum": ["OPAQUE"]}, {"enum": ["MASK"]}, {"enum": ["BLEND"]}]
        });
        let any_of_const = json!({
            "anyOf": [
                {"const": "OPAQUE", "type": "string"},
                {"const": "MASK", "type": "string"},
                {"const": "BLEND", "type": "string"},
                {"type": "string"}
            ]
        });

        let a = resolve(&classic).unwrap();
        let b = resolve(&any_of_enum).unwrap();
        let c = resolve(&any_of_const).unwrap();
        assert_eq!(pairs(&a), pairs(&b));
        assert_eq!(pairs(&a), pairs(&c));
        assert_eq!(a.value_type, EnumValueType::String);
        assert_eq!(a.default_identifier.as_deref(), Some("OPAQUE"));
    }

    #[test]
    fn integer_identifiers_come_from_descriptions() {
        let fragment = json!({
            "default": 4,
            "anyOf": [
                {"const": 0, "description": "POINTS", "type": "integer"},
                {"const": 4, "description": "TRIANGLES", "type": "integer"},
                {"type": "integer"}
            ]
        });
        let e = resolve(&fragment).unwrap();
        assert_eq!(e.value_type, EnumValueType::Integer);
        assert_eq!(
            pairs(&e),
            vec![
                ("POINTS".to_string(), EnumLiteral::Integer(0)),
                ("TRIANGLES".to_string(), EnumLiteral::Integer(4)),
            ]
        );
        assert_eq!(e.default_identifier.as_deref(), Some("TRIANGLES"));
    }

    #[test]
    fn string_identifiers_are_sanitized() {
        let fragment = json!({"enum": ["image/jpeg", "image/png"]});
        let e = resolve(&fragment).unwrap();
        assert_eq!(e.variants[0].identifier, "image_jpeg");
        assert_eq!(e.variants[1].identifier, "image_png");
    }

    #[test]
    fn mixed_types_degrade() {
        let fragment = json!({
            "anyOf": [
                {"const": 1, "type": "integer"},
                {"const": "x", "type": "string"}
            ]
        });
        assert!(resolve(&fragment).is_none());

        let fragment = json!({"type": "integer", "enum": [1, "two"]});
        assert!(resolve(&fragment).is_none());

        let fragment = json!({"enum": [1.5, 2.5]});
        assert!(resolve(&fragment).is_none());
    }

    #[test]
    fn unknown_default_falls_back_to_first() {
        let fragment = json!({"type": "string", "enum": ["A", "B"], "default": "Z"});
        let e = resolve(&fragment).unwrap();
        assert_eq!(e.default_identifier.as_deref(), Some("A"));
    }
}
