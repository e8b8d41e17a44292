//! Property type resolution.
//!
//! Maps one property fragment onto a [`TypeDescriptor`]. The dispatch is the
//! [`PropertyShape`] classification; everything else here builds the type
//! names and header sets for each shape.

use std::rc::Rc;

use indexmap::IndexSet;
use serde_json::Value;
use tracing::warn;

use crate::enums;
use crate::names::{
    JSON_VALUE_TYPE, anonymous_type_title, base_property_name, get_include_from_name,
    get_json_handler_include_from_name, get_name, get_reader_name, to_pascal_case,
};
use crate::resolver::Resolver;
use crate::schema::{
    GLTF_ID_TITLE, PropertyShape, ScalarKind, SchemaDocument, classify_property, is_class_like,
};
use crate::types::{ClassId, Documentation, EnumValueType, TypeDescriptor, TypeKind};

const OPTIONAL_HEADER: &str = "<optional>";
const INTEGER_HANDLER: &str = "<CesiumJsonReader/IntegerJsonHandler.h>";

/// The class whose properties are being resolved.
pub(crate) struct Owner<'d> {
    pub doc: &'d Rc<SchemaDocument>,
    pub type_name: &'d str,
}

/// How a fragment is used at the site being resolved.
///
/// `default` is the effective default: an enclosing fragment's default wins
/// over one declared deeper in an `allOf` or `$ref`.
#[derive(Clone, Copy)]
struct Usage<'v> {
    required: bool,
    default: Option<&'v Value>,
}

impl Usage<'_> {
    /// Absent from `required` and without a default.
    fn make_optional(&self) -> bool {
        !self.required && self.default.is_none()
    }
}

impl Resolver<'_> {
    /// Resolve the type of property `name` of `owner`.
    ///
    /// Returns `None` for empty fragments, which only restate a property that
    /// a base class declares.
    pub(crate) fn resolve_property(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        fragment: &Value,
        required: bool,
    ) -> Option<TypeDescriptor> {
        let usage = Usage {
            required,
            default: fragment.get("default"),
        };
        self.resolve_fragment(owner, name, fragment, usage)
    }

    fn resolve_fragment<'v>(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        fragment: &'v Value,
        usage: Usage<'v>,
    ) -> Option<TypeDescriptor> {
        let optional = usage.make_optional();
        let mut ty = match classify_property(fragment) {
            PropertyShape::Empty => return None,
            PropertyShape::Enum => self.enum_type(owner, name, fragment, usage),
            PropertyShape::Array { items } => self.array_type(owner, name, items, usage)?,
            PropertyShape::Scalar(kind) => scalar_type(kind, optional, usage.default),
            PropertyShape::InlineObject => self.inline_object_type(owner, name, fragment, optional),
            PropertyShape::Dictionary { values } => self.dictionary_type(owner, name, values),
            PropertyShape::Ref(target) => self.ref_type(owner, name, target, usage),
            PropertyShape::CompositeSingle(inner) => {
                let inner_usage = Usage {
                    required: usage.required,
                    default: usage.default.or_else(|| inner.get("default")),
                };
                self.resolve_fragment(owner, name, inner, inner_usage)?
            }
            PropertyShape::Unsupported => {
                warn!(
                    "{}.{name}: cannot interpret property schema; using {JSON_VALUE_TYPE}",
                    owner.type_name
                );
                json_value_type(optional)
            }
        };
        let outer = Documentation::from_fragment(fragment);
        ty.doc = outer.or(std::mem::take(&mut ty.doc));
        Some(ty)
    }

    fn enum_type(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        fragment: &Value,
        usage: Usage<'_>,
    ) -> TypeDescriptor {
        let optional = usage.make_optional();
        let enum_name = to_pascal_case(base_property_name(name));
        let ns = &self.names.namespace;
        let scope = get_name(owner.type_name, ns);
        let label = format!("{}.{name}", owner.type_name);
        let Some(enumeration) =
            enums::resolve_enum(&enum_name, &scope, fragment, usage.default, &label)
        else {
            return json_value_type(optional);
        };

        let value_type = enumeration.value_type.runtime_type();
        let mut model_headers = IndexSet::new();
        model_headers.insert(
            match enumeration.value_type {
                EnumValueType::Integer => "<cstdint>",
                EnumValueType::String => "<string>",
            }
            .to_string(),
        );
        if optional {
            model_headers.insert(OPTIONAL_HEADER.to_string());
        }

        let mut reader_headers = IndexSet::from([get_include_from_name(owner.type_name, ns)]);
        let reader_type = match enumeration.value_type {
            EnumValueType::String => {
                reader_headers.insert("<CesiumJsonReader/StringJsonHandler.h>".to_string());
                format!("{enum_name}JsonHandler")
            }
            EnumValueType::Integer => {
                reader_headers.insert(INTEGER_HANDLER.to_string());
                "CesiumJsonReader::IntegerJsonHandler<int32_t>".to_string()
            }
        };

        let default_value = if optional {
            None
        } else {
            enumeration
                .default_identifier
                .as_ref()
                .map(|id| format!("{enum_name}::{id}"))
        };

        TypeDescriptor {
            model_type: optional_of(value_type, optional),
            value_type: value_type.to_string(),
            model_headers,
            reader_type,
            reader_headers,
            optional,
            default_value,
            doc: Documentation::default(),
            kind: TypeKind::Enum { enumeration },
        }
    }

    fn array_type(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        items: Option<&Value>,
        usage: Usage<'_>,
    ) -> Option<TypeDescriptor> {
        // Without `items` the elements can be anything.
        let item = match items {
            Some(items) => {
                let item_usage = Usage {
                    required: true,
                    default: items.get("default"),
                };
                self.resolve_fragment(owner, &format!("{name}.items"), items, item_usage)?
            }
            None => json_value_type(false),
        };

        let value_type = format!("std::vector<{}>", item.model_type);
        let mut model_headers = IndexSet::from(["<vector>".to_string()]);
        model_headers.extend(item.model_headers.iter().cloned());
        let mut reader_headers =
            IndexSet::from(["<CesiumJsonReader/ArrayJsonHandler.h>".to_string()]);
        reader_headers.extend(item.reader_headers.iter().cloned());

        Some(TypeDescriptor {
            model_type: value_type.clone(),
            value_type,
            model_headers,
            reader_type: format!(
                "CesiumJsonReader::ArrayJsonHandler<{}, {}>",
                item.model_type, item.reader_type
            ),
            reader_headers,
            optional: false,
            default_value: usage.default.and_then(default_literal),
            doc: Documentation::default(),
            kind: TypeKind::Array {
                item: Box::new(item),
            },
        })
    }

    fn dictionary_type(&mut self, owner: &Owner<'_>, name: &str, values: &Value) -> TypeDescriptor {
        let value = if values.as_bool() == Some(true) {
            json_value_type(false)
        } else {
            let value_usage = Usage {
                required: true,
                default: None,
            };
            let value_name = format!("{name}.additionalProperties");
            self.resolve_fragment(owner, &value_name, values, value_usage)
                .unwrap_or_else(|| json_value_type(false))
        };

        let value_type = format!("std::unordered_map<std::string, {}>", value.model_type);
        let mut model_headers =
            IndexSet::from(["<unordered_map>".to_string(), "<string>".to_string()]);
        model_headers.extend(value.model_headers.iter().cloned());
        let mut reader_headers =
            IndexSet::from(["<CesiumJsonReader/DictionaryJsonHandler.h>".to_string()]);
        reader_headers.extend(value.reader_headers.iter().cloned());

        TypeDescriptor {
            model_type: value_type.clone(),
            value_type,
            model_headers,
            reader_type: format!(
                "CesiumJsonReader::DictionaryJsonHandler<{}, {}>",
                value.model_type, value.reader_type
            ),
            reader_headers,
            optional: false,
            default_value: None,
            doc: Documentation::default(),
            kind: TypeKind::Dictionary {
                value: Box::new(value),
            },
        }
    }

    fn inline_object_type(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        fragment: &Value,
        optional: bool,
    ) -> TypeDescriptor {
        let title = anonymous_type_title(owner.type_name, name);
        let mut value = fragment.clone();
        if let Some(object) = value.as_object_mut() {
            object.insert("title".to_string(), Value::String(title));
        }
        let key = format!("{}#inline/{name}", owner.doc.key());
        let source = self
            .cache
            .context_top()
            .unwrap_or(owner.doc.source_path())
            .to_string();
        let doc = self.cache.insert_synthetic(&key, &source, value);
        let class_name = self.display_name(&doc);
        match self.intern(doc) {
            Some(target) => self.class_type(
                TypeKind::InlineObject {
                    target,
                    class_name: class_name.clone(),
                },
                &class_name,
                optional,
            ),
            None => json_value_type(optional),
        }
    }

    fn ref_type(
        &mut self,
        owner: &Owner<'_>,
        name: &str,
        reference: &str,
        usage: Usage<'_>,
    ) -> TypeDescriptor {
        let optional = usage.make_optional();
        let Some(target) = self.cache.load(reference) else {
            warn!(
                "{}.{name}: cannot load {reference}; using {JSON_VALUE_TYPE}",
                owner.type_name
            );
            return json_value_type(optional);
        };

        if target.title() == Some(GLTF_ID_TITLE) {
            return index_type();
        }
        let class_name = self.display_name(&target);
        if class_name == JSON_VALUE_TYPE {
            return json_value_type(optional);
        }

        if is_class_like(target.value()) {
            let asset = target.title().is_some_and(|t| self.config.is_asset(t));
            return match self.intern(Rc::clone(&target)) {
                Some(id) => self.reference_type(id, &class_name, asset, optional),
                None => json_value_type(optional),
            };
        }

        if self.inline_stack.iter().any(|key| key == target.key()) {
            warn!(
                "{}.{name}: {reference} refers back to itself; using {JSON_VALUE_TYPE}",
                owner.type_name
            );
            return json_value_type(optional);
        }
        self.inline_stack.push(target.key().to_string());
        let inner_usage = Usage {
            required: usage.required,
            default: usage.default.or_else(|| target.value().get("default")),
        };
        let resolved = self.in_context(&target, |this| {
            this.resolve_fragment(owner, name, target.value(), inner_usage)
        });
        self.inline_stack.pop();
        resolved.unwrap_or_else(|| json_value_type(optional))
    }

    fn reference_type(
        &self,
        target: ClassId,
        class_name: &str,
        asset: bool,
        optional: bool,
    ) -> TypeDescriptor {
        let kind = TypeKind::ObjectReference {
            target,
            class_name: class_name.to_string(),
            asset,
        };
        if !asset {
            return self.class_type(kind, class_name, optional);
        }
        let mut ty = self.class_type(kind, class_name, false);
        ty.model_type = format!("CesiumUtility::IntrusivePointer<{}>", ty.value_type);
        ty.model_headers
            .insert("<CesiumUtility/IntrusivePointer.h>".to_string());
        ty
    }

    /// A generated class held by value.
    fn class_type(&self, kind: TypeKind, class_name: &str, optional: bool) -> TypeDescriptor {
        let ns = &self.names.namespace;
        let value_type = get_name(class_name, ns);
        let mut model_headers = IndexSet::from([get_include_from_name(class_name, ns)]);
        if optional {
            model_headers.insert(OPTIONAL_HEADER.to_string());
        }
        TypeDescriptor {
            model_type: optional_of(&value_type, optional),
            value_type,
            model_headers,
            reader_type: get_reader_name(class_name, self.names),
            reader_headers: IndexSet::from([get_json_handler_include_from_name(
                class_name, self.names,
            )]),
            optional,
            default_value: None,
            doc: Documentation::default(),
            kind,
        }
    }
}

fn optional_of(type_name: &str, optional: bool) -> String {
    if optional {
        format!("std::optional<{type_name}>")
    } else {
        type_name.to_string()
    }
}

/// A glTF id: an index into a top-level array, `-1` when absent.
fn index_type() -> TypeDescriptor {
    TypeDescriptor {
        kind: TypeKind::Integer {
            bits: 32,
            index: true,
        },
        model_type: "int32_t".to_string(),
        value_type: "int32_t".to_string(),
        model_headers: IndexSet::from(["<cstdint>".to_string()]),
        reader_type: "CesiumJsonReader::IntegerJsonHandler<int32_t>".to_string(),
        reader_headers: IndexSet::from([INTEGER_HANDLER.to_string()]),
        optional: false,
        default_value: Some("-1".to_string()),
        doc: Documentation::default(),
    }
}

fn scalar_type(kind: ScalarKind, optional: bool, default: Option<&Value>) -> TypeDescriptor {
    let (kind, value_type, header, reader_type, reader_header) = match kind {
        ScalarKind::Integer => (
            TypeKind::Integer {
                bits: 64,
                index: false,
            },
            "int64_t",
            Some("<cstdint>"),
            "CesiumJsonReader::IntegerJsonHandler<int64_t>",
            INTEGER_HANDLER,
        ),
        ScalarKind::Number => (
            TypeKind::Double,
            "double",
            None,
            "CesiumJsonReader::DoubleJsonHandler",
            "<CesiumJsonReader/DoubleJsonHandler.h>",
        ),
        ScalarKind::Boolean => (
            TypeKind::Bool,
            "bool",
            None,
            "CesiumJsonReader::BoolJsonHandler",
            "<CesiumJsonReader/BoolJsonHandler.h>",
        ),
        ScalarKind::String => (
            TypeKind::String,
            "std::string",
            Some("<string>"),
            "CesiumJsonReader::StringJsonHandler",
            "<CesiumJsonReader/StringJsonHandler.h>",
        ),
    };

    let mut model_headers: IndexSet<String> = header.into_iter().map(str::to_string).collect();
    if optional {
        model_headers.insert(OPTIONAL_HEADER.to_string());
    }
    TypeDescriptor {
        kind,
        model_type: optional_of(value_type, optional),
        value_type: value_type.to_string(),
        model_headers,
        reader_type: reader_type.to_string(),
        reader_headers: IndexSet::from([reader_header.to_string()]),
        optional,
        default_value: default.and_then(default_literal),
        doc: Documentation::default(),
    }
}

/// The generic JSON value, for anything not modeled more precisely.
fn json_value_type(optional: bool) -> TypeDescriptor {
    let mut model_headers = IndexSet::from(["<CesiumUtility/JsonValue.h>".to_string()]);
    if optional {
        model_headers.insert(OPTIONAL_HEADER.to_string());
    }
    TypeDescriptor {
        kind: TypeKind::JsonValue,
        model_type: optional_of(JSON_VALUE_TYPE, optional),
        value_type: JSON_VALUE_TYPE.to_string(),
        model_headers,
        reader_type: "CesiumJsonReader::JsonObjectJsonHandler".to_string(),
        reader_headers: IndexSet::from([
            "<CesiumJsonReader/JsonObjectJsonHandler.h>".to_string()
        ]),
        optional,
        default_value: None,
        doc: Documentation::default(),
    }
}

/// C++ initializer for a JSON default: strings quoted, arrays braced.
fn default_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Array(items) => {
            let parts: Option<Vec<String>> = items.iter().map(default_literal).collect();
            parts.map(|p| format!("{{{}}}", p.join(", ")))
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::cache::SchemaCache;
    use crate::config::{ClassConfig, GeneratorConfig, NameOptions};
    use crate::types::{ClassKind, Property};

    struct Fixture {
        dir: TempDir,
        config: GeneratorConfig,
        names: NameOptions,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            fs::write(
                dir.path().join("glTFid.schema.json"),
                json!({"title": "glTF Id", "type": "integer", "minimum": 0}).to_string(),
            )
            .unwrap();
            Self {
                dir,
                config: GeneratorConfig::default(),
                names: NameOptions::new("CesiumGltf"),
            }
        }

        fn write(&self, name: &str, value: Value) {
            fs::write(self.dir.path().join(name), value.to_string()).unwrap();
        }

        /// Resolve a class with the given properties and return them.
        fn properties(&self, properties: Value, required: Value) -> Vec<Property> {
            self.write(
                "thing.schema.json",
                json!({
                    "title": "Thing",
                    "type": "object",
                    "properties": properties,
                    "required": required
                }),
            );
            let cache =
                SchemaCache::new(vec![self.dir.path().display().to_string()], Vec::new());
            let mut resolver = Resolver::new(cache, &self.config, &self.names);
            let id = resolver.resolve("thing.schema.json").unwrap();
            let resolution = resolver.finish();
            match &resolution.get(id).unwrap().kind {
                ClassKind::Object(object) => object.properties.clone(),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    fn find<'p>(properties: &'p [Property], name: &str) -> &'p Property {
        properties.iter().find(|p| p.name == name).unwrap()
    }

    #[test]
    fn optionality_rule() {
        let f = Fixture::new();
        let props = f.properties(
            json!({
                "a": {"type": "number"},
                "b": {"type": "number", "default": 1.0},
                "c": {"type": "number"}
            }),
            json!(["c"]),
        );
        let a = find(&props, "a");
        assert!(a.is_optional());
        assert_eq!(a.ty.model_type, "std::optional<double>");
        assert!(a.ty.model_headers.contains("<optional>"));

        let b = find(&props, "b");
        assert!(!b.is_optional());
        assert_eq!(b.ty.model_type, "double");
        assert_eq!(b.ty.default_value.as_deref(), Some("1.0"));

        let c = find(&props, "c");
        assert!(!c.is_optional());
        assert_eq!(c.ty.model_type, "double");
    }

    #[test]
    fn id_and_name_properties() {
        let f = Fixture::new();
        let props = f.properties(
            json!({
                "id": {"$ref": "glTFid.schema.json"},
                "name": {"type": "string"}
            }),
            json!(["id"]),
        );
        let id = find(&props, "id");
        assert_eq!(id.ty.model_type, "int32_t");
        assert_eq!(id.ty.default_value.as_deref(), Some("-1"));
        assert!(id.is_required_index());

        let name = find(&props, "name");
        assert_eq!(name.ty.model_type, "std::optional<std::string>");
        assert!(name.ty.model_headers.contains("<string>"));
        assert!(name.ty.model_headers.contains("<optional>"));
        assert_eq!(name.ty.reader_type, "CesiumJsonReader::StringJsonHandler");
    }

    #[test]
    fn arrays_and_dictionaries() {
        let f = Fixture::new();
        let props = f.properties(
            json!({
                "children": {"type": "array", "items": {"$ref": "glTFid.schema.json"}},
                "translation": {
                    "type": "array",
                    "items": {"type": "number"},
                    "default": [0.0, 0.0, 0.0]
                },
                "attributes": {
                    "type": "object",
                    "additionalProperties": {"$ref": "glTFid.schema.json"}
                },
                "anything": {"type": "array"}
            }),
            json!([]),
        );
        let children = find(&props, "children");
        assert_eq!(children.ty.model_type, "std::vector<int32_t>");
        assert_eq!(
            children.ty.reader_type,
            "CesiumJsonReader::ArrayJsonHandler<int32_t, CesiumJsonReader::IntegerJsonHandler<int32_t>>"
        );
        assert!(!children.ty.optional);

        let translation = find(&props, "translation");
        assert_eq!(translation.ty.default_value.as_deref(), Some("{0.0, 0.0, 0.0}"));

        let attributes = find(&props, "attributes");
        assert_eq!(
            attributes.ty.model_type,
            "std::unordered_map<std::string, int32_t>"
        );
        assert!(attributes.ty.model_headers.contains("<unordered_map>"));

        let anything = find(&props, "anything");
        assert_eq!(
            anything.ty.model_type,
            "std::vector<CesiumUtility::JsonValue>"
        );
    }

    #[test]
    fn string_enum_property() {
        let f = Fixture::new();
        let props = f.properties(
            json!({
                "alphaMode": {
                    "default": "OPAQUE",
                    "anyOf": [
                        {"const": "OPAQUE", "type": "string"},
                        {"const": "MASK", "type": "string"},
                        {"type": "string"}
                    ]
                }
            }),
            json!([]),
        );
        let alpha = find(&props, "alphaMode");
        assert_eq!(alpha.ty.model_type, "std::string");
        assert_eq!(alpha.ty.default_value.as_deref(), Some("AlphaMode::OPAQUE"));
        assert_eq!(
            alpha.ty.default_value_writer().as_deref(),
            Some("CesiumGltf::Thing::AlphaMode::OPAQUE")
        );
        assert_eq!(alpha.ty.reader_type, "AlphaModeJsonHandler");
        assert!(alpha.ty.reader_headers.contains("<CesiumGltf/Thing.h>"));
        assert_eq!(alpha.ty.local_types().len(), 1);
    }

    #[test]
    fn optional_enum_has_no_default() {
        let f = Fixture::new();
        let props = f.properties(
            json!({"mode": {"type": "integer", "enum": [0, 1]}}),
            json!([]),
        );
        let mode = find(&props, "mode");
        assert_eq!(mode.ty.model_type, "std::optional<int32_t>");
        assert_eq!(mode.ty.default_value, None);
    }

    #[test]
    fn inline_objects_become_classes() {
        let f = Fixture::new();
        let props = f.properties(
            json!({
                "settings": {
                    "type": "object",
                    "properties": {"scale": {"type": "number", "default": 1}}
                }
            }),
            json!(["settings"]),
        );
        let settings = find(&props, "settings");
        match &settings.ty.kind {
            TypeKind::InlineObject { class_name, .. } => {
                assert_eq!(class_name, "ThingSettingsValue")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(settings.ty.model_type, "CesiumGltf::ThingSettingsValue");
    }

    #[test]
    fn asset_references_are_pointers() {
        let mut f = Fixture::new();
        f.config.classes.insert(
            "Image".to_string(),
            ClassConfig {
                override_name: None,
                is_asset: true,
            },
        );
        f.write(
            "image.schema.json",
            json!({"title": "Image", "type": "object", "properties": {"uri": {"type": "string"}}}),
        );
        let props = f.properties(
            json!({"image": {"$ref": "image.schema.json"}}),
            json!([]),
        );
        let image = find(&props, "image");
        assert_eq!(
            image.ty.model_type,
            "CesiumUtility::IntrusivePointer<CesiumGltf::Image>"
        );
        assert!(!image.ty.optional);
    }

    #[test]
    fn composite_single_keeps_outer_docs_and_default() {
        let f = Fixture::new();
        f.write(
            "mode.schema.json",
            json!({"type": "integer", "description": "inner"}),
        );
        let props = f.properties(
            json!({
                "level": {
                    "allOf": [{"$ref": "mode.schema.json"}],
                    "description": "outer",
                    "default": 2
                }
            }),
            json!([]),
        );
        let level = find(&props, "level");
        assert_eq!(level.ty.model_type, "int64_t");
        assert_eq!(level.ty.default_value.as_deref(), Some("2"));
        assert_eq!(level.ty.doc.brief.as_deref(), Some("outer"));
    }

    #[test]
    fn ref_cycles_between_non_classes_degrade() {
        let f = Fixture::new();
        f.write("loop_a.schema.json", json!({"$ref": "loop_b.schema.json"}));
        f.write("loop_b.schema.json", json!({"$ref": "loop_a.schema.json"}));
        let props = f.properties(json!({"x": {"$ref": "loop_a.schema.json"}}), json!([]));
        assert_eq!(find(&props, "x").ty.kind, TypeKind::JsonValue);
    }

    #[test]
    fn unsupported_fragments_fall_back() {
        let f = Fixture::new();
        let props = f.properties(
            json!({"either": {"oneOf": [{"type": "string"}, {"type": "number"}]}}),
            json!([]),
        );
        let either = find(&props, "either");
        assert_eq!(either.ty.kind, TypeKind::JsonValue);
        assert_eq!(either.ty.reader_type, "CesiumJsonReader::JsonObjectJsonHandler");
    }

    #[test]
    fn default_literals() {
        assert_eq!(default_literal(&json!("x")).as_deref(), Some("\"x\""));
        assert_eq!(default_literal(&json!([1, 2])).as_deref(), Some("{1, 2}"));
        assert_eq!(default_literal(&json!([])).as_deref(), Some("{}"));
        assert_eq!(default_literal(&json!({"a": 1})), None);
    }
}
