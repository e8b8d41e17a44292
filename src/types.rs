//! The resolved intermediate representation handed to the renderer.
//!
//! Property types are a closed variant ([`TypeKind`]) wrapped in a
//! [`TypeDescriptor`] that carries the fields every type has (model and reader
//! type names, headers, default, docs). References to other generated classes
//! are [`ClassId`]s, indices into the resolver's class table, never direct
//! links, so cyclic schemas produce a finite IR.

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

/// Handle of a class in a [`Resolution`](crate::resolver::Resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ClassId(pub usize);

/// Brief and detailed documentation of a schema fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Documentation {
    pub brief: Option<String>,
    pub full: Option<String>,
}

impl Documentation {
    /// Read `description` and `gltf_detailedDescription`.
    ///
    /// Detailed descriptions usually repeat the brief one at the start; that
    /// copy is removed so the two can be rendered one after the other.
    pub fn from_fragment(fragment: &Value) -> Self {
        let brief = fragment
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string);
        let full = fragment
            .get("gltf_detailedDescription")
            .and_then(Value::as_str)
            .map(|detailed| match brief.as_deref() {
                Some(b) if detailed.starts_with(b) => detailed[b.len()..].trim().to_string(),
                _ => detailed.to_string(),
            })
            .filter(|full| !full.is_empty());
        Self { brief, full }
    }

    pub fn is_empty(&self) -> bool {
        self.brief.is_none() && self.full.is_none()
    }

    /// `self` when it has anything to say, otherwise `fallback`.
    pub fn or(self, fallback: Documentation) -> Self {
        if self.is_empty() { fallback } else { self }
    }
}

/// Primitive type shared by all values of an enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumValueType {
    Integer,
    String,
}

impl EnumValueType {
    /// Model type holding a value of the enum.
    pub fn runtime_type(self) -> &'static str {
        match self {
            Self::Integer => "int32_t",
            Self::String => "std::string",
        }
    }
}

/// A constant enum value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnumLiteral {
    Integer(i64),
    String(String),
}

/// One known value of an enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumVariant {
    pub identifier: String,
    pub value: EnumLiteral,
    pub description: Option<String>,
    pub value_type: EnumValueType,
}

/// An enum, generated as a struct of named constants.
///
/// glTF enums are open: readers must accept values they do not know, so the
/// member holding the value has the underlying primitive type and this struct
/// only names the known values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    /// Struct name, e.g. `AlphaMode`.
    pub name: String,
    /// Qualified name of the type the struct is nested in (or the namespace
    /// for top-level enums), e.g. `CesiumGltf::Material`.
    pub scope: String,
    pub value_type: EnumValueType,
    pub variants: Vec<EnumVariant>,
    /// Identifier of the value used when nothing is read.
    pub default_identifier: Option<String>,
    pub doc: Documentation,
}

impl EnumType {
    /// Fully qualified default constant, as used by writers to skip values
    /// equal to the default.
    pub fn qualified_default(&self) -> Option<String> {
        self.default_identifier
            .as_ref()
            .map(|id| format!("{}::{}::{id}", self.scope, self.name))
    }

    /// Reader-side dispatch class for string enums; integer enums are read
    /// with the plain integer handler.
    pub fn reader(&self) -> Option<EnumReader> {
        if self.value_type != EnumValueType::String {
            return None;
        }
        let cases = self
            .variants
            .iter()
            .filter_map(|v| match &v.value {
                EnumLiteral::String(s) => Some(EnumReaderCase {
                    literal: s.clone(),
                    identifier: v.identifier.clone(),
                }),
                EnumLiteral::Integer(_) => None,
            })
            .collect();
        Some(EnumReader {
            handler_name: format!("{}JsonHandler", self.name),
            enum_path: format!("{}::{}", self.scope, self.name),
            cases,
        })
    }
}

/// A small handler mapping string literals onto an enum's constants.
///
/// An unrecognized literal hands control back to the parent handler instead
/// of failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumReader {
    pub handler_name: String,
    pub enum_path: String,
    pub cases: Vec<EnumReaderCase>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumReaderCase {
    pub literal: String,
    pub identifier: String,
}

/// The category of a resolved type, with the data only that category has.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TypeKind {
    /// `index` marks glTF ids: 32-bit indices into top-level arrays, `-1`
    /// when unset.
    Integer { bits: u8, index: bool },
    Double,
    Bool,
    String,
    Array { item: Box<TypeDescriptor> },
    Dictionary { value: Box<TypeDescriptor> },
    Enum { enumeration: EnumType },
    /// Another generated class. `asset` classes are held by intrusive
    /// reference-counted pointer.
    #[serde(rename_all = "camelCase")]
    ObjectReference {
        target: ClassId,
        class_name: String,
        asset: bool,
    },
    /// A class synthesized from an inline `type: object` property.
    #[serde(rename_all = "camelCase")]
    InlineObject { target: ClassId, class_name: String },
    /// The generic JSON value, for shapes the generator does not model.
    JsonValue,
}

/// A fully resolved type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    /// Member type as declared, including any optional or pointer wrapper.
    pub model_type: String,
    /// The type without the optional or pointer wrapper.
    pub value_type: String,
    pub model_headers: IndexSet<String>,
    pub reader_type: String,
    pub reader_headers: IndexSet<String>,
    /// Whether the model type is wrapped in `std::optional`.
    pub optional: bool,
    pub default_value: Option<String>,
    pub doc: Documentation,
}

impl TypeDescriptor {
    /// Classes this type refers to, through containers, in first-seen order.
    pub fn referenced_classes(&self) -> IndexSet<ClassId> {
        let mut out = IndexSet::new();
        self.collect_classes(&mut out);
        out
    }

    fn collect_classes(&self, out: &mut IndexSet<ClassId>) {
        match &self.kind {
            TypeKind::ObjectReference { target, .. } | TypeKind::InlineObject { target, .. } => {
                out.insert(*target);
            }
            TypeKind::Array { item } => item.collect_classes(out),
            TypeKind::Dictionary { value } => value.collect_classes(out),
            _ => {}
        }
    }

    /// Enum structs to declare next to the owning class.
    pub fn local_types(&self) -> Vec<&EnumType> {
        match &self.kind {
            TypeKind::Enum { enumeration } => vec![enumeration],
            TypeKind::Array { item } => item.local_types(),
            TypeKind::Dictionary { value } => value.local_types(),
            _ => Vec::new(),
        }
    }

    /// Writer-side default: the qualified enum constant for enums, the plain
    /// default otherwise.
    pub fn default_value_writer(&self) -> Option<String> {
        match &self.kind {
            TypeKind::Enum { enumeration } if self.default_value.is_some() => {
                enumeration.qualified_default()
            }
            _ => self.default_value.clone(),
        }
    }
}

/// A member of a generated class.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Name on the wire.
    pub name: String,
    /// Identifier in generated code.
    pub member_name: String,
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,
    pub required: bool,
}

impl Property {
    /// Absent from `required` and without a declared default.
    pub fn is_optional(&self) -> bool {
        !self.required && self.ty.default_value.is_none()
    }

    /// A glTF id the schema requires to be present.
    pub fn is_required_index(&self) -> bool {
        self.required && matches!(self.ty.kind, TypeKind::Integer { index: true, .. })
    }
}

/// A base type and the chain of its own bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeInfo {
    pub name: String,
    pub headers: IndexSet<String>,
    pub parent: Option<Box<TypeInfo>>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            headers: IndexSet::from([header.into()]),
            parent: None,
        }
    }

    /// Headers of this type and all of its ancestors.
    pub fn all_headers(&self) -> IndexSet<String> {
        let mut out = self.headers.clone();
        if let Some(parent) = &self.parent {
            out.extend(parent.all_headers());
        }
        out
    }

    /// Type names from this type up to the root.
    pub fn chain(&self) -> Vec<&str> {
        let mut out = vec![self.name.as_str()];
        let mut current = self.parent.as_deref();
        while let Some(info) = current {
            out.push(&info.name);
            current = info.parent.as_deref();
        }
        out
    }
}

/// Base classes of a generated model class and of its reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseTypeInfo {
    pub model: TypeInfo,
    pub reader: TypeInfo,
}

impl Default for BaseTypeInfo {
    /// The extensible root every object derives from, carrying the
    /// `extensions` and `extras` members.
    fn default() -> Self {
        Self {
            model: TypeInfo::new(
                "CesiumUtility::ExtensibleObject",
                "<CesiumUtility/ExtensibleObject.h>",
            ),
            reader: TypeInfo::new(
                "CesiumJsonReader::ExtensibleObjectJsonHandler",
                "<CesiumJsonReader/ExtensibleObjectJsonHandler.h>",
            ),
        }
    }
}

/// Members provided by the extensible root object.
pub const IMPLICIT_PROPERTIES: [&str; 2] = ["extensions", "extras"];

/// A resolved object schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectClass {
    pub base_class: Option<ClassId>,
    pub base: BaseTypeInfo,
    /// Properties declared by this schema and not by any ancestor.
    pub properties: Vec<Property>,
    pub inherited_property_names: IndexSet<String>,
    pub model_headers: IndexSet<String>,
    pub reader_headers: IndexSet<String>,
}

impl ObjectClass {
    /// Enum structs declared inside this class.
    pub fn local_types(&self) -> Vec<&EnumType> {
        self.properties
            .iter()
            .flat_map(|p| p.ty.local_types())
            .collect()
    }

    /// String-enum dispatch handlers declared inside this class's reader.
    pub fn enum_readers(&self) -> Vec<EnumReader> {
        self.local_types()
            .into_iter()
            .filter_map(EnumType::reader)
            .collect()
    }
}

/// What a resolved schema turned into.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClassKind {
    Object(ObjectClass),
    Enum { enumeration: EnumType },
    /// A schema that is a scalar or array; no class is generated for it.
    Value { value: TypeDescriptor },
    /// A shape the generator does not support; skipped.
    Unsupported,
}

/// One resolved schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDescriptor {
    pub id: ClassId,
    /// Cache key of the schema this class came from.
    pub source: String,
    pub title: Option<String>,
    /// Type name, unqualified unless configured with a namespace.
    pub type_name: String,
    pub qualified_name: String,
    pub reader_type: String,
    /// Configured to a type from another namespace; used but not generated.
    pub external: bool,
    /// Wire name when this class is an extension.
    pub extension_name: Option<String>,
    pub doc: Documentation,
    pub kind: ClassKind,
    /// Classes this one refers to directly (base first, then properties).
    pub references: Vec<ClassId>,
    /// Object classes reachable through properties, recursively.
    pub subtype_closure: Vec<ClassId>,
    /// Every object class this one needs, itself included, ordered so that
    /// each class comes after the classes it depends on.
    pub ref_closure: Vec<ClassId>,
}

impl ClassDescriptor {
    pub fn as_object(&self) -> Option<&ObjectClass> {
        match &self.kind {
            ClassKind::Object(object) => Some(object),
            _ => None,
        }
    }

    /// The refs closure without this class itself.
    pub fn dependencies(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.ref_closure.iter().copied().filter(move |id| *id != self.id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scalar(model: &str) -> TypeDescriptor {
        TypeDescriptor {
            kind: TypeKind::Double,
            model_type: model.to_string(),
            value_type: model.to_string(),
            model_headers: IndexSet::new(),
            reader_type: "CesiumJsonReader::DoubleJsonHandler".to_string(),
            reader_headers: IndexSet::new(),
            optional: false,
            default_value: None,
            doc: Documentation::default(),
        }
    }

    #[test]
    fn detailed_description_drops_repeated_brief() {
        let doc = Documentation::from_fragment(&json!({
            "description": "The index of the node.",
            "gltf_detailedDescription": "The index of the node. Must be valid."
        }));
        assert_eq!(doc.brief.as_deref(), Some("The index of the node."));
        assert_eq!(doc.full.as_deref(), Some("Must be valid."));

        let doc = Documentation::from_fragment(&json!({
            "description": "Brief.",
            "gltf_detailedDescription": "Brief."
        }));
        assert_eq!(doc.full, None);
    }

    #[test]
    fn optionality_follows_required_and_default() {
        let mut property = Property {
            name: "scale".to_string(),
            member_name: "scale".to_string(),
            ty: scalar("double"),
            required: false,
        };
        assert!(property.is_optional());

        property.ty.default_value = Some("1".to_string());
        assert!(!property.is_optional());

        property.ty.default_value = None;
        property.required = true;
        assert!(!property.is_optional());
    }

    #[test]
    fn referenced_classes_through_containers() {
        let node = TypeDescriptor {
            kind: TypeKind::ObjectReference {
                target: ClassId(3),
                class_name: "Node".to_string(),
                asset: false,
            },
            ..scalar("CesiumGltf::Node")
        };
        let array = TypeDescriptor {
            kind: TypeKind::Array {
                item: Box::new(node),
            },
            ..scalar("std::vector<CesiumGltf::Node>")
        };
        let dict = TypeDescriptor {
            kind: TypeKind::Dictionary {
                value: Box::new(array),
            },
            ..scalar("std::unordered_map<std::string, std::vector<CesiumGltf::Node>>")
        };
        assert_eq!(
            dict.referenced_classes().into_iter().collect::<Vec<_>>(),
            vec![ClassId(3)]
        );
    }

    #[test]
    fn string_enums_get_a_reader() {
        let enumeration = EnumType {
            name: "AlphaMode".to_string(),
            scope: "CesiumGltf::Material".to_string(),
            value_type: EnumValueType::String,
            variants: vec![EnumVariant {
                identifier: "OPAQUE".to_string(),
                value: EnumLiteral::String("OPAQUE".to_string()),
                description: None,
                value_type: EnumValueType::String,
            }],
            default_identifier: Some("OPAQUE".to_string()),
            doc: Documentation::default(),
        };
        let reader = enumeration.reader().unwrap();
        assert_eq!(reader.handler_name, "AlphaModeJsonHandler");
        assert_eq!(reader.enum_path, "CesiumGltf::Material::AlphaMode");
        assert_eq!(reader.cases.len(), 1);
        assert_eq!(
            enumeration.qualified_default().as_deref(),
            Some("CesiumGltf::Material::AlphaMode::OPAQUE")
        );

        let integer = EnumType {
            value_type: EnumValueType::Integer,
            ..enumeration
        };
        assert!(integer.reader().is_none());
    }

    #[test]
    fn type_info_chain_and_headers() {
        let mut info = TypeInfo::new("CesiumGltf::NamedObject", "<CesiumGltf/NamedObject.h>");
        info.parent = Some(Box::new(BaseTypeInfo::default().model));
        assert_eq!(
            info.chain(),
            vec!["CesiumGltf::NamedObject", "CesiumUtility::ExtensibleObject"]
        );
        assert_eq!(info.all_headers().len(), 2);
    }
}
