//! Memory accounting statements for generated `getSizeBytes()` methods.
//!
//! For every member the generated method adds the heap memory the member owns
//! on top of `sizeof(Class)`. Storage already counted inside the owner (the
//! inline part of a nested object, the key/value slots of a container) is not
//! counted a second time.

use crate::types::{ObjectClass, TypeDescriptor, TypeKind};

const ACCUMULATOR: &str = "accum";

/// Statements for the whole `getSizeBytes()` body of a class.
pub fn class_size_statements(qualified_name: &str, class: &ObjectClass) -> Vec<String> {
    let mut out = vec![
        format!("int64_t {ACCUMULATOR} = 0;"),
        format!("{ACCUMULATOR} += int64_t(sizeof({qualified_name}));"),
    ];
    let base = &class.base.model.name;
    out.push(format!(
        "{ACCUMULATOR} += {base}::getSizeBytes() - int64_t(sizeof({base}));"
    ));
    for property in &class.properties {
        let accessor = format!("this->{}", property.member_name);
        out.extend(member_statements(&property.ty, &accessor, 0));
    }
    out.push(format!("return {ACCUMULATOR};"));
    out
}

/// Statements adding the heap memory owned by the value at `accessor`.
///
/// `depth` names loop variables so nested containers do not shadow each
/// other.
pub fn member_statements(ty: &TypeDescriptor, accessor: &str, depth: usize) -> Vec<String> {
    if let TypeKind::ObjectReference { asset: true, .. } = ty.kind {
        return vec![format!(
            "if ({accessor}) {{ {ACCUMULATOR} += {accessor}->getSizeBytes(); }}"
        )];
    }

    if ty.optional {
        let inner = value_statements(ty, &format!("(*{accessor})"), depth);
        if inner.is_empty() {
            return inner;
        }
        let mut out = vec![format!("if ({accessor}) {{")];
        out.extend(inner.into_iter().map(indent));
        out.push("}".to_string());
        return out;
    }

    value_statements(ty, accessor, depth)
}

fn value_statements(ty: &TypeDescriptor, accessor: &str, depth: usize) -> Vec<String> {
    match &ty.kind {
        TypeKind::Integer { .. } | TypeKind::Double | TypeKind::Bool => Vec::new(),
        TypeKind::Enum { .. } if ty.value_type != "std::string" => Vec::new(),
        TypeKind::String | TypeKind::Enum { .. } => vec![format!(
            "{ACCUMULATOR} += int64_t({accessor}.capacity() * sizeof(char));"
        )],
        TypeKind::Array { item } => {
            let mut out = vec![format!(
                "{ACCUMULATOR} += int64_t(sizeof({}) * {accessor}.capacity());",
                item.model_type
            )];
            let element = format!("value{depth}");
            let inner = member_statements(item, &element, depth + 1);
            if !inner.is_empty() {
                out.push(format!("for (const auto& {element} : {accessor}) {{"));
                out.extend(inner.into_iter().map(indent));
                out.push("}".to_string());
            }
            out
        }
        TypeKind::Dictionary { value } => {
            let mut out = vec![format!(
                "{ACCUMULATOR} += int64_t({accessor}.bucket_count() * (sizeof(std::string) + sizeof({})));",
                value.model_type
            )];
            let key = format!("key{depth}");
            let element = format!("value{depth}");
            out.push(format!(
                "for (const auto& [{key}, {element}] : {accessor}) {{"
            ));
            out.push(indent(format!(
                "{ACCUMULATOR} += int64_t({key}.capacity() * sizeof(char));"
            )));
            out.extend(
                member_statements(value, &element, depth + 1)
                    .into_iter()
                    .map(indent),
            );
            out.push("}".to_string());
            out
        }
        TypeKind::ObjectReference { .. } | TypeKind::InlineObject { .. } | TypeKind::JsonValue => {
            vec![format!(
                "{ACCUMULATOR} += {accessor}.getSizeBytes() - int64_t(sizeof({}));",
                ty.value_type
            )]
        }
    }
}

fn indent(line: String) -> String {
    format!("  {line}")
}
