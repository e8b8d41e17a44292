//! Maps schema titles and type names to generated C++ names and includes.
//!
//! Every function here is a pure string transform. Outputs are deduplicated
//! by value across the whole run (header lists, reader type lists), so the
//! same input must always produce the same output.
//!
//! # Naming table
//!
//! For a class `Buffer` in namespace `CesiumGltf` (reader namespace
//! `CesiumGltfReader`):
//!
//! | Function | Result |
//! |----------|--------|
//! | [`get_name`] | `CesiumGltf::Buffer` |
//! | [`get_include_from_name`] | `<CesiumGltf/Buffer.h>` |
//! | [`get_reader_name`] | `CesiumGltfReader::BufferJsonHandler` |
//! | [`get_reader_include_from_name`] | `<CesiumGltfReader/BufferReader.h>` |
//! | [`get_json_handler_include_from_name`] | `"BufferJsonHandler.h"` |
//!
//! A name that is already qualified with another namespace keeps that
//! namespace: `CesiumUtility::JsonValue` includes `<CesiumUtility/JsonValue.h>`
//! and reads through `CesiumJsonReader::JsonValueJsonHandler`, because the
//! `CesiumUtility` readers live in `CesiumJsonReader`.

use crate::config::{GeneratorConfig, NameOptions};

/// Fully qualified name of the generic JSON value type.
pub const JSON_VALUE_TYPE: &str = "CesiumUtility::JsonValue";

/// Split `Ns::Name` into `(Some("Ns"), "Name")`; unqualified names give
/// `(None, name)`.
pub fn split_namespace(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once("::") {
        Some((namespace, bare)) => (Some(namespace), bare),
        None => (None, name),
    }
}

/// Qualified model type name for `name` as seen from `namespace`.
///
/// Unqualified names belong to `namespace`. Qualified names keep their own
/// namespace, whatever the caller's is.
pub fn get_name(name: &str, namespace: &str) -> String {
    match split_namespace(name) {
        (Some(own), bare) if own == namespace => format!("{namespace}::{bare}"),
        (Some(_), _) => name.to_string(),
        (None, bare) => format!("{namespace}::{bare}"),
    }
}

/// Public model header for `name`.
pub fn get_include_from_name(name: &str, namespace: &str) -> String {
    let (own, bare) = split_namespace(name);
    format!("<{}/{bare}.h>", own.unwrap_or(namespace))
}

/// Reader namespace that holds the readers for model namespace `namespace`.
pub fn reader_namespace_for(namespace: &str, options: &NameOptions) -> String {
    if namespace == options.namespace {
        return options.reader_namespace.clone();
    }
    options
        .reader_namespace_overrides
        .get(namespace)
        .cloned()
        .unwrap_or_else(|| format!("{namespace}Reader"))
}

/// Streaming JSON handler class that reads `name`.
pub fn get_reader_name(name: &str, options: &NameOptions) -> String {
    let (own, bare) = split_namespace(name);
    let reader_namespace = reader_namespace_for(own.unwrap_or(options.namespace.as_str()), options);
    format!("{reader_namespace}::{bare}JsonHandler")
}

/// Public reader header for `name`.
pub fn get_reader_include_from_name(name: &str, options: &NameOptions) -> String {
    let (own, bare) = split_namespace(name);
    let reader_namespace = reader_namespace_for(own.unwrap_or(options.namespace.as_str()), options);
    format!("<{reader_namespace}/{bare}Reader.h>")
}

/// Header declaring the JSON handler for `name`.
///
/// Handlers generated alongside the current reader are private headers in
/// the same directory and use quoted includes. Handlers from other libraries
/// are included by library name.
pub fn get_json_handler_include_from_name(name: &str, options: &NameOptions) -> String {
    match split_namespace(name) {
        (Some(own), bare) if own != options.namespace => {
            let reader_namespace = reader_namespace_for(own, options);
            format!("<{reader_namespace}/{bare}JsonHandler.h>")
        }
        (_, bare) => format!("\"{bare}JsonHandler.h\""),
    }
}

/// Writer function namespace-qualified name for `name`.
pub fn get_writer_name(name: &str, options: &NameOptions) -> String {
    let (_, bare) = split_namespace(name);
    format!("{}::{bare}JsonWriter", options.writer_namespace)
}

/// Type name for a schema title: the configured override, or the title with
/// everything that cannot appear in an identifier removed.
///
/// - `"Mesh Primitive"` → `"MeshPrimitive"`
/// - `"Animation Channel Target"` → `"AnimationChannelTarget"`
pub fn name_from_title(config: &GeneratorConfig, title: &str) -> String {
    if let Some(name) = config.override_name(title) {
        return name.to_string();
    }
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Type name for a schema without a title, from its location:
/// `"/schemas/mesh.primitive.schema.json"` → `"MeshPrimitive"`, and
/// `"defs.json#/definitions/node"` → `"Node"`.
pub fn name_from_file(location: &str) -> String {
    let (file, fragment) = location.split_once('#').unwrap_or((location, ""));
    let stem = match fragment.rsplit('/').find(|s| !s.is_empty()) {
        Some(last) => last,
        None => {
            let file = file.rsplit(['/', '\\']).next().unwrap_or(file);
            file.strip_suffix(".schema.json")
                .or_else(|| file.strip_suffix(".json"))
                .unwrap_or(file)
        }
    };
    stem.split(['.', '-', '_'])
        .map(to_pascal_case)
        .collect::<String>()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Upper-case the first character: `"alphaMode"` → `"AlphaMode"`.
pub fn to_pascal_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().chain(chars).collect(),
    }
}

/// Title of the class synthesized for an inline object property.
///
/// `("Material", "pbrMetallicRoughness")` → `"Material PbrMetallicRoughness Value"`.
/// The property name is not repeated when the parent already ends with it.
pub fn anonymous_type_title(parent_name: &str, property_name: &str) -> String {
    let property = to_pascal_case(base_property_name(property_name));
    let mut title = parent_name.to_string();
    if !title.ends_with(&property) {
        title.push(' ');
        title.push_str(&property);
    }
    title.push_str(" Value");
    title
}

/// The member name a nested resolution path refers to:
/// `"weights.items"` → `"weights"`.
pub fn base_property_name(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Member identifier for a property; C++ reserved words get a `Property`
/// suffix.
pub fn safe_member_name(property_name: &str) -> String {
    if CPP_RESERVED_WORDS.contains(&property_name) {
        format!("{property_name}Property")
    } else {
        property_name.to_string()
    }
}

/// Turn an arbitrary enum value or description into an identifier.
///
/// - `"image/jpeg"` → `"image_jpeg"`
/// - `"UNSIGNED_BYTE"` → `"UNSIGNED_BYTE"`
/// - `"2D"` → `"_2D"`
pub fn make_identifier(s: &str) -> String {
    let mut ident: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

const CPP_RESERVED_WORDS: &[&str] = &[
    "alignas", "alignof", "and", "and_eq", "asm", "auto", "bitand", "bitor", "bool", "break",
    "case", "catch", "char", "char8_t", "char16_t", "char32_t", "class", "compl", "concept",
    "const", "consteval", "constexpr", "constinit", "const_cast", "continue", "co_await",
    "co_return", "co_yield", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "export", "extern", "false", "float", "for", "friend", "goto",
    "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "not", "not_eq",
    "nullptr", "operator", "or", "or_eq", "private", "protected", "public", "register",
    "reinterpret_cast", "requires", "return", "short", "signed", "sizeof", "static",
    "static_assert", "static_cast", "struct", "switch", "template", "this", "thread_local",
    "throw", "true", "try", "typedef", "typeid", "typename", "union", "unsigned", "using",
    "virtual", "void", "volatile", "wchar_t", "while", "xor", "xor_eq",
];
