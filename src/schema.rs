//! JSON Schema documents and shape classification.
//!
//! A [`SchemaDocument`] is a parsed schema plus the location it was loaded
//! from. Schema bodies stay as `serde_json::Value` (with `preserve_order`, so
//! `properties` iterate in file order); the generator only ever looks at a
//! handful of keywords, and it looks at them through the two classification
//! functions in this module rather than ad hoc field checks.
//!
//! Two classifications exist because a schema fragment means different
//! things in two positions:
//!
//! - [`classify_property`] decides how a property's type is resolved.
//! - [`classify_schema`] decides what kind of class a whole document becomes.

use serde_json::{Map, Value};

/// Title of the schema glTF uses for integer cross-references into top-level
/// arrays.
pub const GLTF_ID_TITLE: &str = "glTF Id";

/// A parsed schema document.
///
/// Created once per distinct key by the [`SchemaCache`](crate::cache::SchemaCache)
/// and shared through `Rc` for the rest of the run.
#[derive(Debug)]
pub struct SchemaDocument {
    key: String,
    source_path: String,
    value: Value,
}

impl SchemaDocument {
    /// Create a document.
    ///
    /// `key` is the identity used for caching and deduplication (a resolved
    /// file path or URL, optionally followed by an in-document fragment).
    /// `source_path` is the resolved file path or URL that relative `$ref`s
    /// inside this document resolve against.
    pub fn new(key: impl Into<String>, source_path: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            source_path: source_path.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn title(&self) -> Option<&str> {
        self.value.get("title").and_then(Value::as_str)
    }

    /// The `properties` map, if the schema declares one.
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.value.get("properties").and_then(Value::as_object)
    }

    /// Names of the declared properties, in file order.
    pub fn property_names(&self) -> Vec<String> {
        self.properties()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `name` is listed in the schema's `required` array.
    pub fn is_required(&self, name: &str) -> bool {
        self.value
            .get("required")
            .and_then(Value::as_array)
            .is_some_and(|r| r.iter().any(|v| v.as_str() == Some(name)))
    }
}

/// The primitive JSON Schema types that map directly onto scalar members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Number,
    Boolean,
    String,
}

impl ScalarKind {
    fn from_type(type_name: &str) -> Option<Self> {
        match type_name {
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "string" => Some(Self::String),
            _ => None,
        }
    }
}

/// How a property fragment is resolved. First match wins, in variant order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyShape<'a> {
    /// `{}`: a stub for a property defined on a base class.
    Empty,
    /// `enum: [...]`, or `anyOf` whose first entry carries a constant.
    Enum,
    /// `type: array`, with the `items` schema if present.
    Array { items: Option<&'a Value> },
    Scalar(ScalarKind),
    /// `type: object` with its own `properties`.
    InlineObject,
    /// `type: object` with `additionalProperties`.
    Dictionary { values: &'a Value },
    Ref(&'a str),
    /// `allOf` with exactly one entry.
    CompositeSingle(&'a Value),
    Unsupported,
}

/// Classify a property fragment.
pub fn classify_property(fragment: &Value) -> PropertyShape<'_> {
    let Some(obj) = fragment.as_object() else {
        return PropertyShape::Unsupported;
    };
    if obj.is_empty() {
        return PropertyShape::Empty;
    }
    if is_enum(fragment) {
        return PropertyShape::Enum;
    }

    let type_name = declared_type(fragment);
    if type_name == Some("array") {
        return PropertyShape::Array {
            items: obj.get("items"),
        };
    }
    if let Some(kind) = type_name.and_then(ScalarKind::from_type) {
        return PropertyShape::Scalar(kind);
    }
    if type_name == Some("object") {
        if obj.get("properties").is_some_and(Value::is_object) {
            return PropertyShape::InlineObject;
        }
        if let Some(values) = obj.get("additionalProperties") {
            if values.is_object() || values.as_bool() == Some(true) {
                return PropertyShape::Dictionary { values };
            }
        }
    }
    if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
        return PropertyShape::Ref(target);
    }
    if let Some([single]) = obj.get("allOf").and_then(Value::as_array).map(Vec::as_slice) {
        return PropertyShape::CompositeSingle(single);
    }
    PropertyShape::Unsupported
}

/// What kind of class a whole schema document becomes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaShape<'a> {
    /// Single-entry `allOf` without own `properties`: an alias of its entry.
    Wrapper(&'a Value),
    /// A bare `$ref`: an alias of its target.
    Ref(&'a str),
    /// `anyOf`; an enum when its entries are constants.
    AnyOf,
    /// `enum: [...]`.
    Enum,
    Scalar(ScalarKind),
    Object,
    Array,
    Unsupported,
}

/// Classify a whole schema document.
pub fn classify_schema(schema: &Value) -> SchemaShape<'_> {
    let Some(obj) = schema.as_object() else {
        return SchemaShape::Unsupported;
    };
    let has_properties = obj.contains_key("properties");

    if !has_properties {
        if let Some([single]) = obj.get("allOf").and_then(Value::as_array).map(Vec::as_slice) {
            return SchemaShape::Wrapper(single);
        }
    }
    if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
        return SchemaShape::Ref(target);
    }
    if obj.get("anyOf").is_some_and(Value::is_array) {
        return SchemaShape::AnyOf;
    }
    if obj.get("enum").is_some_and(Value::is_array) {
        return SchemaShape::Enum;
    }

    let type_name = declared_type(schema);
    if let Some(kind) = type_name.and_then(ScalarKind::from_type) {
        return SchemaShape::Scalar(kind);
    }
    if type_name == Some("object") || obj.contains_key("$schema") || has_properties {
        return SchemaShape::Object;
    }
    if type_name == Some("array") {
        return SchemaShape::Array;
    }
    SchemaShape::Unsupported
}

/// Whether a referenced schema should become its own generated class rather
/// than be resolved inline at the use site.
///
/// Pure dictionaries (`type: object` with `additionalProperties` and no
/// `properties`) are containers, not classes.
pub fn is_class_like(schema: &Value) -> bool {
    if classify_schema(schema) != SchemaShape::Object {
        return false;
    }
    let has_properties = schema.get("properties").is_some();
    let is_dictionary = schema
        .get("additionalProperties")
        .is_some_and(|v| v.is_object() || v.as_bool() == Some(true));
    has_properties || !is_dictionary
}

/// Whether a fragment uses one of the enum idioms.
pub fn is_enum(fragment: &Value) -> bool {
    if let Some(first) = fragment
        .get("anyOf")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    {
        return first.get("const").is_some()
            || first
                .get("enum")
                .and_then(Value::as_array)
                .is_some_and(|e| !e.is_empty());
    }
    fragment
        .get("enum")
        .and_then(Value::as_array)
        .is_some_and(|e| !e.is_empty())
}

/// The fragment's `type`, when it is a single string.
pub fn declared_type(fragment: &Value) -> Option<&str> {
    fragment.get("type").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_fragment_is_empty() {
        assert_eq!(classify_property(&json!({})), PropertyShape::Empty);
    }

    #[test]
    fn enum_beats_type() {
        let fragment = json!({"type": "string", "enum": ["a", "b"]});
        assert_eq!(classify_property(&fragment), PropertyShape::Enum);

        let fragment = json!({"anyOf": [{"const": 1}, {"type": "integer"}]});
        assert_eq!(classify_property(&fragment), PropertyShape::Enum);

        let fragment = json!({"anyOf": [{"enum": ["x"]}, {"type": "string"}]});
        assert_eq!(classify_property(&fragment), PropertyShape::Enum);
    }

    #[test]
    fn heterogeneous_any_of_is_not_enum() {
        let fragment = json!({"anyOf": [{"$ref": "a.json"}, {"$ref": "b.json"}]});
        assert!(!is_enum(&fragment));
        assert_eq!(classify_property(&fragment), PropertyShape::Unsupported);
    }

    #[test]
    fn scalars_and_containers() {
        assert_eq!(
            classify_property(&json!({"type": "integer"})),
            PropertyShape::Scalar(ScalarKind::Integer)
        );
        assert_eq!(
            classify_property(&json!({"type": "array"})),
            PropertyShape::Array { items: None }
        );
        assert_eq!(
            classify_property(&json!({"type": "object", "properties": {"a": {}}})),
            PropertyShape::InlineObject
        );
        let dict = json!({"type": "object", "additionalProperties": {"type": "number"}});
        assert!(matches!(
            classify_property(&dict),
            PropertyShape::Dictionary { .. }
        ));
    }

    #[test]
    fn closed_object_without_properties_is_unsupported() {
        let fragment = json!({"type": "object", "additionalProperties": false});
        assert_eq!(classify_property(&fragment), PropertyShape::Unsupported);
    }

    #[test]
    fn ref_and_single_all_of() {
        assert_eq!(
            classify_property(&json!({"$ref": "node.schema.json"})),
            PropertyShape::Ref("node.schema.json")
        );
        let fragment = json!({"allOf": [{"$ref": "x.json"}], "description": "d"});
        assert!(matches!(
            classify_property(&fragment),
            PropertyShape::CompositeSingle(_)
        ));
    }

    #[test]
    fn schema_shapes() {
        let wrapper = json!({"allOf": [{"$ref": "base.json"}]});
        assert!(matches!(classify_schema(&wrapper), SchemaShape::Wrapper(_)));

        let derived = json!({"allOf": [{"$ref": "base.json"}], "properties": {}});
        assert_eq!(classify_schema(&derived), SchemaShape::Object);

        let marker = json!({"$schema": "http://json-schema.org/draft-04/schema"});
        assert_eq!(classify_schema(&marker), SchemaShape::Object);

        assert_eq!(classify_schema(&json!({"type": "array"})), SchemaShape::Array);
        assert_eq!(classify_schema(&json!({"not": {}})), SchemaShape::Unsupported);
    }

    #[test]
    fn dictionaries_are_not_class_like() {
        let dict = json!({"type": "object", "additionalProperties": {"type": "object"}});
        assert!(!is_class_like(&dict));
        assert!(is_class_like(&json!({"type": "object"})));
        assert!(is_class_like(&json!({"properties": {"a": {}}})));
    }

    #[test]
    fn document_accessors() {
        let doc = SchemaDocument::new(
            "/s/node.schema.json",
            "/s/node.schema.json",
            json!({
                "title": "Node",
                "allOf": [{"$ref": "glTFChildOfRootProperty.schema.json"}],
                "required": ["mesh"],
                "properties": {"mesh": {}, "children": {}}
            }),
        );
        assert_eq!(doc.title(), Some("Node"));
        assert_eq!(doc.property_names(), vec!["mesh", "children"]);
        assert!(doc.is_required("mesh"));
        assert!(!doc.is_required("children"));
    }
}
