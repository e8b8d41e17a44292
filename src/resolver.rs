//! Schema resolution.
//!
//! Resolution runs in two phases.
//!
//! 1. [`Resolver::resolve`] loads a schema and interns it: aliases (single
//!    entry `allOf` wrappers and bare `$ref`s) are followed to the schema
//!    they stand for, and each distinct schema gets a [`ClassId`]. Interned
//!    schemas are queued and their properties resolved one class at a time.
//!    A property that refers to another class only interns the target, so
//!    reference cycles (`Node.children` → `Node`) never recurse.
//! 2. [`Resolver::finish`] links the class table: base chains, inherited
//!    property filtering, header aggregation and the refs closures.
//!
//! Property type resolution lives in [`crate::property`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::SchemaCache;
use crate::config::{GeneratorConfig, NameOptions};
use crate::enums;
use crate::names::{
    get_include_from_name, get_json_handler_include_from_name, get_name, get_reader_name,
    name_from_file, name_from_title, safe_member_name, split_namespace,
};
use crate::property::Owner;
use crate::schema::{SchemaDocument, SchemaShape, classify_schema, is_enum};
use crate::types::{
    BaseTypeInfo, ClassDescriptor, ClassId, ClassKind, Documentation, EnumType, EnumValueType,
    IMPLICIT_PROPERTIES, ObjectClass, Property, TypeDescriptor, TypeInfo,
};

/// Name and wire name given to an extension schema.
struct ExtensionName {
    class_name: Option<String>,
    extension_name: String,
}

/// A class after phase one: own properties resolved, nothing linked.
struct Skeleton {
    source: String,
    title: Option<String>,
    type_name: String,
    extension_name: Option<String>,
    doc: Documentation,
    body: SkeletonBody,
}

enum SkeletonBody {
    Object {
        base: Option<ClassId>,
        declared: Vec<String>,
        properties: Vec<Property>,
    },
    Enum(EnumType),
    Value(TypeDescriptor),
    Unsupported,
}

/// Resolves schemas into a class table.
pub struct Resolver<'a> {
    pub(crate) cache: SchemaCache,
    pub(crate) config: &'a GeneratorConfig,
    pub(crate) names: &'a NameOptions,
    /// Schemas being resolved inline at the current use site, to stop
    /// non-class `$ref` cycles.
    pub(crate) inline_stack: Vec<String>,
    memo: HashMap<String, ClassId>,
    by_key: HashMap<String, ClassId>,
    docs: Vec<Rc<SchemaDocument>>,
    skeletons: Vec<Option<Skeleton>>,
    pending: Vec<ClassId>,
    extension_names: HashMap<String, ExtensionName>,
}

impl<'a> Resolver<'a> {
    pub fn new(cache: SchemaCache, config: &'a GeneratorConfig, names: &'a NameOptions) -> Self {
        Self {
            cache,
            config,
            names,
            inline_stack: Vec::new(),
            memo: HashMap::new(),
            by_key: HashMap::new(),
            docs: Vec::new(),
            skeletons: Vec::new(),
            pending: Vec::new(),
            extension_names: HashMap::new(),
        }
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut SchemaCache {
        &mut self.cache
    }

    /// Resolve the schema `reference` names, and every class it reaches.
    ///
    /// Repeated calls with the same reference return the same id. Returns
    /// `None` when the schema does not load.
    pub fn resolve(&mut self, reference: &str) -> Option<ClassId> {
        if let Some(&id) = self.memo.get(reference) {
            return Some(id);
        }
        let doc = self.cache.load(reference)?;
        let id = self.intern(doc)?;
        self.drain();
        self.memo.insert(reference.to_string(), id);
        Some(id)
    }

    /// Resolve an already loaded extension schema under its configured class
    /// name (or its title when `class_name` is `None`).
    pub fn resolve_extension(
        &mut self,
        doc: Rc<SchemaDocument>,
        class_name: Option<&str>,
        extension_name: &str,
    ) -> Option<ClassId> {
        if self.by_key.contains_key(doc.key()) {
            debug!(
                "extension schema {} was already resolved; keeping its name",
                doc.key()
            );
        }
        self.extension_names.insert(
            doc.key().to_string(),
            ExtensionName {
                class_name: class_name.map(str::to_string),
                extension_name: extension_name.to_string(),
            },
        );
        let id = self.intern(doc)?;
        self.drain();
        Some(id)
    }

    /// Type name of a class whose schema has been resolved.
    pub fn type_name(&self, id: ClassId) -> Option<&str> {
        self.skeletons
            .get(id.0)?
            .as_ref()
            .map(|s| s.type_name.as_str())
    }

    /// Run `f` with `doc` as the document relative references resolve
    /// against. The context is restored however `f` returns.
    pub(crate) fn in_context<T>(
        &mut self,
        doc: &SchemaDocument,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.cache.push_context(doc);
        let result = f(self);
        self.cache.pop_context();
        result
    }

    /// The type name a schema is generated under.
    pub(crate) fn display_name(&self, doc: &SchemaDocument) -> String {
        if let Some(ExtensionName {
            class_name: Some(name),
            ..
        }) = self.extension_names.get(doc.key())
        {
            return name.clone();
        }
        match doc.title() {
            Some(title) => name_from_title(self.config, title),
            None => name_from_file(doc.key()),
        }
    }

    /// Assign `doc` a class id, queueing it for resolution if it is new.
    ///
    /// Aliases are followed first, so a wrapper and the schema it wraps share
    /// an id. Returns `None` when an alias does not load or aliases itself.
    pub(crate) fn intern(&mut self, doc: Rc<SchemaDocument>) -> Option<ClassId> {
        let doc = self.follow_aliases(doc)?;
        if let Some(&id) = self.by_key.get(doc.key()) {
            return Some(id);
        }
        let id = ClassId(self.docs.len());
        debug!("interned {} as class {}", doc.key(), id.0);
        self.by_key.insert(doc.key().to_string(), id);
        self.docs.push(doc);
        self.skeletons.push(None);
        self.pending.push(id);
        Some(id)
    }

    fn follow_aliases(&mut self, doc: Rc<SchemaDocument>) -> Option<Rc<SchemaDocument>> {
        let mut current = doc;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current.key().to_string()) {
                warn!("schema {} is an alias of itself", current.key());
                return None;
            }
            let next = match classify_schema(current.value()) {
                SchemaShape::Wrapper(inner) => match inner.get("$ref").and_then(Value::as_str) {
                    Some(target) => self.in_context(&current, |this| this.cache.load(target)),
                    None => Some(self.cache.insert_synthetic(
                        &format!("{}#/allOf/0", current.key()),
                        current.source_path(),
                        inner.clone(),
                    )),
                },
                SchemaShape::Ref(target) => {
                    self.in_context(&current, |this| this.cache.load(target))
                }
                _ => return Some(current),
            };
            current = next?;
        }
    }

    fn drain(&mut self) {
        while let Some(id) = self.pending.pop() {
            let doc = Rc::clone(&self.docs[id.0]);
            let skeleton = self.in_context(&doc, |this| this.build_skeleton(&doc));
            self.skeletons[id.0] = Some(skeleton);
        }
    }

    fn build_skeleton(&mut self, doc: &Rc<SchemaDocument>) -> Skeleton {
        let type_name = self.display_name(doc);
        let body = match classify_schema(doc.value()) {
            SchemaShape::Object => self.build_object(doc, &type_name),
            shape @ (SchemaShape::AnyOf | SchemaShape::Enum) if is_enum(doc.value()) => {
                match enums::resolve_enum(
                    &type_name,
                    &self.names.namespace,
                    doc.value(),
                    doc.value().get("default"),
                    &type_name,
                ) {
                    Some(enumeration)
                        if shape == SchemaShape::Enum
                            && enumeration.value_type != EnumValueType::String =>
                    {
                        warn!(
                            "{}: only string enums are supported as whole schemas; skipping",
                            doc.key()
                        );
                        SkeletonBody::Unsupported
                    }
                    Some(enumeration) => SkeletonBody::Enum(enumeration),
                    None => SkeletonBody::Unsupported,
                }
            }
            SchemaShape::Scalar(_) | SchemaShape::Array => {
                let owner = Owner {
                    doc,
                    type_name: &type_name,
                };
                match self.resolve_property(&owner, &type_name, doc.value(), true) {
                    Some(ty) => SkeletonBody::Value(ty),
                    None => SkeletonBody::Unsupported,
                }
            }
            SchemaShape::AnyOf => {
                warn!(
                    "{}: anyOf over non-constant schemas is not supported; skipping",
                    doc.key()
                );
                SkeletonBody::Unsupported
            }
            _ => {
                warn!("{}: unsupported schema shape; skipping", doc.key());
                SkeletonBody::Unsupported
            }
        };
        Skeleton {
            source: doc.key().to_string(),
            title: doc.title().map(str::to_string),
            extension_name: self
                .extension_names
                .get(doc.key())
                .map(|e| e.extension_name.clone()),
            doc: Documentation::from_fragment(doc.value()),
            type_name,
            body,
        }
    }

    fn build_object(&mut self, doc: &Rc<SchemaDocument>, type_name: &str) -> SkeletonBody {
        let mut base = None;
        if let Some(entries) = doc.value().get("allOf").and_then(Value::as_array) {
            if entries.len() > 1 {
                warn!(
                    "{type_name}: allOf with {} entries; only the first is used as base class",
                    entries.len()
                );
            }
            if let Some(first) = entries.first() {
                base = self.base_class(doc, first);
            }
        }

        let owner = Owner { doc, type_name };
        let mut properties = Vec::new();
        if let Some(declared) = doc.properties() {
            for (name, fragment) in declared {
                if IMPLICIT_PROPERTIES.contains(&name.as_str()) {
                    continue;
                }
                let required = doc.is_required(name);
                if let Some(ty) = self.resolve_property(&owner, name, fragment, required) {
                    properties.push(Property {
                        name: name.clone(),
                        member_name: safe_member_name(name),
                        ty,
                        required,
                    });
                }
            }
        }

        SkeletonBody::Object {
            base,
            declared: doc.property_names(),
            properties,
        }
    }

    fn base_class(&mut self, doc: &SchemaDocument, entry: &Value) -> Option<ClassId> {
        let base_doc = match entry.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.cache.load(reference)?,
            None => self.cache.insert_synthetic(
                &format!("{}#/allOf/0", doc.key()),
                doc.source_path(),
                entry.clone(),
            ),
        };
        self.intern(base_doc)
    }

    /// Link the class table.
    pub fn finish(mut self) -> Resolution {
        self.drain();
        let names = self.names;
        let skeletons: Vec<Skeleton> = self
            .skeletons
            .into_iter()
            .zip(&self.docs)
            .map(|(skeleton, doc)| {
                skeleton.unwrap_or_else(|| Skeleton {
                    source: doc.key().to_string(),
                    title: doc.title().map(str::to_string),
                    type_name: name_from_file(doc.key()),
                    extension_name: None,
                    doc: Documentation::default(),
                    body: SkeletonBody::Unsupported,
                })
            })
            .collect();
        Linker::new(&skeletons, names).link()
    }
}

/// Phase two: everything that needs the whole class table.
struct Linker<'s> {
    skeletons: &'s [Skeleton],
    names: &'s NameOptions,
    bases: Vec<Option<ClassId>>,
    /// Direct class references: base first, then properties.
    references: Vec<Vec<ClassId>>,
    /// Direct class references through properties only.
    property_references: Vec<Vec<ClassId>>,
}

impl<'s> Linker<'s> {
    fn new(skeletons: &'s [Skeleton], names: &'s NameOptions) -> Self {
        let root = BaseTypeInfo::default().model.name;
        let bases: Vec<Option<ClassId>> = skeletons
            .iter()
            .map(|s| match &s.body {
                SkeletonBody::Object { base: Some(b), .. } => match skeletons.get(b.0) {
                    Some(base) if matches!(base.body, SkeletonBody::Object { .. }) => {
                        if get_name(&base.type_name, &names.namespace) == root {
                            None
                        } else {
                            Some(*b)
                        }
                    }
                    _ => {
                        warn!("{}: base schema is not an object; ignoring it", s.type_name);
                        None
                    }
                },
                _ => None,
            })
            .collect();

        let property_references: Vec<Vec<ClassId>> = skeletons
            .iter()
            .map(|s| {
                let mut out = IndexSet::new();
                match &s.body {
                    SkeletonBody::Object { properties, .. } => {
                        for p in properties {
                            out.extend(p.ty.referenced_classes());
                        }
                    }
                    SkeletonBody::Value(ty) => out.extend(ty.referenced_classes()),
                    SkeletonBody::Enum(_) | SkeletonBody::Unsupported => {}
                }
                out.into_iter().collect()
            })
            .collect();

        let references = bases
            .iter()
            .zip(&property_references)
            .map(|(base, props)| {
                let mut out: IndexSet<ClassId> = base.iter().copied().collect();
                out.extend(props.iter().copied());
                out.into_iter().collect()
            })
            .collect();

        Self {
            skeletons,
            names,
            bases,
            references,
            property_references,
        }
    }

    fn link(&self) -> Resolution {
        let classes = (0..self.skeletons.len())
            .map(|i| self.class(ClassId(i)))
            .collect();
        Resolution { classes }
    }

    fn is_object(&self, id: ClassId) -> bool {
        matches!(self.skeletons[id.0].body, SkeletonBody::Object { .. })
    }

    /// Bases from the direct base up, stopping at a cycle.
    fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut out = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.bases[id.0];
        while let Some(base) = current {
            if !seen.insert(base) {
                warn!(
                    "{}: inheritance cycle through {}",
                    self.skeletons[id.0].type_name, self.skeletons[base.0].type_name
                );
                break;
            }
            out.push(base);
            current = self.bases[base.0];
        }
        out
    }

    fn base_type_info(&self, ancestors: &[ClassId]) -> BaseTypeInfo {
        let ns = &self.names.namespace;
        ancestors
            .iter()
            .rev()
            .fold(BaseTypeInfo::default(), |parent, id| {
                let name = &self.skeletons[id.0].type_name;
                BaseTypeInfo {
                    model: TypeInfo {
                        parent: Some(Box::new(parent.model)),
                        ..TypeInfo::new(get_name(name, ns), get_include_from_name(name, ns))
                    },
                    reader: TypeInfo {
                        parent: Some(Box::new(parent.reader)),
                        ..TypeInfo::new(
                            get_reader_name(name, self.names),
                            get_json_handler_include_from_name(name, self.names),
                        )
                    },
                }
            })
    }

    fn object(
        &self,
        id: ClassId,
        declared_properties: &[Property],
        type_name: &str,
    ) -> ObjectClass {
        let ancestors = self.ancestors(id);

        let mut inherited: IndexSet<String> =
            IMPLICIT_PROPERTIES.iter().map(|s| s.to_string()).collect();
        for ancestor in &ancestors {
            if let SkeletonBody::Object { declared, .. } = &self.skeletons[ancestor.0].body {
                inherited.extend(declared.iter().cloned());
            }
        }
        let properties: Vec<Property> = declared_properties
            .iter()
            .filter(|p| !inherited.contains(&p.name))
            .cloned()
            .collect();

        let base = self.base_type_info(&ancestors);
        let mut model_headers = base.model.all_headers();
        let mut reader_headers = base.reader.all_headers();
        reader_headers.insert(get_include_from_name(type_name, &self.names.namespace));
        for p in &properties {
            model_headers.extend(p.ty.model_headers.iter().cloned());
            reader_headers.extend(p.ty.reader_headers.iter().cloned());
        }

        ObjectClass {
            base_class: ancestors.first().copied(),
            base,
            properties,
            inherited_property_names: inherited,
            model_headers,
            reader_headers,
        }
    }

    /// Breadth-first walk from `id` along `edges`.
    fn reachable(&self, id: ClassId, edges: &[Vec<ClassId>]) -> IndexSet<ClassId> {
        let mut seen = IndexSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            for &target in &edges[next.0] {
                if seen.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        seen
    }

    fn ref_closure(&self, id: ClassId) -> Vec<ClassId> {
        let nodes: IndexSet<ClassId> = self
            .reachable(id, &self.references)
            .into_iter()
            .filter(|n| *n == id || self.is_object(*n))
            .collect();
        let edges: IndexMap<ClassId, IndexSet<ClassId>> = nodes
            .iter()
            .map(|n| {
                let deps = self.references[n.0]
                    .iter()
                    .copied()
                    .filter(|d| nodes.contains(d))
                    .collect();
                (*n, deps)
            })
            .collect();
        topological_sort(&edges)
    }

    fn subtype_closure(&self, id: ClassId) -> Vec<ClassId> {
        self.reachable(id, &self.property_references)
            .into_iter()
            .filter(|n| {
                *n != id
                    && matches!(
                        self.skeletons[n.0].body,
                        SkeletonBody::Object { .. } | SkeletonBody::Enum(_)
                    )
            })
            .collect()
    }

    fn class(&self, id: ClassId) -> ClassDescriptor {
        let skeleton = &self.skeletons[id.0];
        let ns = &self.names.namespace;
        let kind = match &skeleton.body {
            SkeletonBody::Object { properties, .. } => {
                ClassKind::Object(self.object(id, properties, &skeleton.type_name))
            }
            SkeletonBody::Enum(enumeration) => ClassKind::Enum {
                enumeration: enumeration.clone(),
            },
            SkeletonBody::Value(value) => ClassKind::Value {
                value: value.clone(),
            },
            SkeletonBody::Unsupported => ClassKind::Unsupported,
        };
        let external = matches!(
            split_namespace(&skeleton.type_name),
            (Some(own), _) if own != ns.as_str()
        );
        ClassDescriptor {
            id,
            source: skeleton.source.clone(),
            title: skeleton.title.clone(),
            type_name: skeleton.type_name.clone(),
            qualified_name: get_name(&skeleton.type_name, ns),
            reader_type: get_reader_name(&skeleton.type_name, self.names),
            external,
            extension_name: skeleton.extension_name.clone(),
            doc: skeleton.doc.clone(),
            kind,
            references: self.references[id.0].clone(),
            subtype_closure: self.subtype_closure(id),
            ref_closure: self.ref_closure(id),
        }
    }
}

/// Order `edges` (node → the nodes it depends on) so that every node comes
/// after its dependencies.
///
/// Ready nodes are kept on a stack: it starts with the nodes that have no
/// dependencies, in insertion order, and a node is pushed when its last
/// dependency is emitted. The top of the stack goes next. Self-loops are
/// ignored. When only cycles remain, the earliest inserted remaining node is
/// emitted as if its dependencies were met, so the result always contains
/// every node exactly once.
pub fn topological_sort<T: Copy + Eq + Hash>(edges: &IndexMap<T, IndexSet<T>>) -> Vec<T> {
    let mut remaining: IndexMap<T, IndexSet<T>> = edges
        .iter()
        .map(|(node, deps)| {
            let deps = deps
                .iter()
                .copied()
                .filter(|d| d != node && edges.contains_key(d))
                .collect();
            (*node, deps)
        })
        .collect();

    let mut ready: Vec<T> = remaining
        .iter()
        .filter(|(_, deps)| deps.is_empty())
        .map(|(node, _)| *node)
        .collect();
    let mut order = Vec::with_capacity(remaining.len());
    loop {
        let next = match ready.pop() {
            Some(next) => next,
            None => match remaining.first() {
                Some((node, _)) => *node,
                None => break,
            },
        };
        if remaining.shift_remove(&next).is_none() {
            continue;
        }
        for (node, deps) in remaining.iter_mut() {
            if deps.shift_remove(&next) && deps.is_empty() {
                ready.push(*node);
            }
        }
        order.push(next);
    }
    order
}

/// The linked class table.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    classes: Vec<ClassDescriptor>,
}

impl Resolution {
    pub fn classes(&self) -> &[ClassDescriptor] {
        &self.classes
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.classes.get(id.0)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.title.as_deref() == Some(title))
    }

    pub fn find_by_name(&self, type_name: &str) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.type_name == type_name)
    }

    /// Look a class up by title, then by type name.
    pub fn find(&self, title_or_name: &str) -> Option<&ClassDescriptor> {
        self.find_by_title(title_or_name)
            .or_else(|| self.find_by_name(title_or_name))
    }

    /// The refs closure of `id`: every object class it needs, itself
    /// included, dependencies first.
    pub fn refs(&self, id: ClassId) -> &[ClassId] {
        self.get(id).map(|c| c.ref_closure.as_slice()).unwrap_or(&[])
    }

    /// Type names for a list of ids.
    pub fn type_names(&self, ids: &[ClassId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .map(|c| c.type_name.as_str())
            .collect()
    }
}
