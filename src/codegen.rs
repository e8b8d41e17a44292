//! Generation driver.
//!
//! [`generate`] resolves the root schema and the configured extensions,
//! then walks the class table with a work queue and hands every class that
//! needs code to a [`Renderer`]. The queue is seeded with the root and the
//! extensions; each rendered class pushes the classes it refers to, and a
//! processed set keyed by schema location makes sure nothing is rendered
//! twice.
//!
//! [`IrRenderer`] is the built-in renderer: it writes the resolved model,
//! reader and writer views of each class as pretty-printed JSON, one
//! directory per view. Output is deterministic: identical input produces
//! byte-identical files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::SchemaCache;
use crate::config::{GeneratorConfig, NameOptions};
use crate::error::{Error, Result};
use crate::extensions::{ExtensionAttachment, ExtensionRegistry, graft_extensions};
use crate::names::{get_writer_name, split_namespace};
use crate::resolver::{Resolution, Resolver};
use crate::size::class_size_statements;
use crate::types::{
    ClassDescriptor, ClassId, ClassKind, Documentation, EnumReader, EnumType, ObjectClass,
};

/// Everything a generator run needs.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Root schema name, resolved against `search_paths`.
    pub schema: String,
    /// Directories or base URLs searched for schemas.
    pub search_paths: Vec<String>,
    /// Directories or base URLs searched for extension schemas.
    pub extension_paths: Vec<String>,
    pub config: GeneratorConfig,
    pub names: NameOptions,
}

/// Statistics collected during generation for reporting.
#[derive(Debug, Default)]
pub struct GenerationStats {
    pub classes_generated: usize,
    pub enums_generated: usize,
    pub extensions_attached: usize,
    /// Resolved schemas that produce no code: scalar aliases, unsupported
    /// shapes and classes provided by other namespaces.
    pub classes_skipped: usize,
    pub title_collisions: usize,
}

/// The outcome of resolving a root schema and its extensions.
#[derive(Debug)]
pub struct ResolvedRun {
    pub root: ClassId,
    pub extension_classes: Vec<ClassId>,
    pub resolution: Resolution,
    pub extensions: ExtensionRegistry,
    pub title_collisions: usize,
}

/// What a renderer can see besides the class it is rendering.
pub struct RenderContext<'a> {
    pub resolution: &'a Resolution,
    pub extensions: &'a ExtensionRegistry,
    pub names: &'a NameOptions,
}

/// Turns resolved classes into output.
pub trait Renderer {
    fn render_class(&mut self, class: &ClassDescriptor, ctx: &RenderContext<'_>) -> Result<()>;

    /// Called once after every class has been rendered.
    fn finish(&mut self, _ctx: &RenderContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Resolve the root schema and every configured extension.
///
/// Fails only when the root schema itself cannot be loaded; every other
/// problem is logged and worked around.
pub fn resolve_all(options: &GenerateOptions) -> Result<ResolvedRun> {
    let cache = SchemaCache::new(
        options.search_paths.clone(),
        options.extension_paths.clone(),
    );
    let mut resolver = Resolver::new(cache, &options.config, &options.names);

    let (extension_classes, extensions) =
        graft_extensions(&mut resolver, &options.config.extensions);

    let Some(root) = resolver.resolve(&options.schema) else {
        return Err(Error::SchemaNotFound {
            name: options.schema.clone(),
            attempted: options.search_paths.join(", "),
        });
    };

    let title_collisions = resolver.cache().title_collisions().len();
    let resolution = resolver.finish();
    info!(
        "resolved {} schemas from {}",
        resolution.classes().len(),
        options.schema
    );

    Ok(ResolvedRun {
        root,
        extension_classes,
        resolution,
        extensions,
        title_collisions,
    })
}

/// Generate code for the root schema, its extensions and everything they
/// reach.
pub fn generate(options: &GenerateOptions, renderer: &mut dyn Renderer) -> Result<GenerationStats> {
    let run = resolve_all(options)?;
    let mut stats = GenerationStats {
        extensions_attached: run.extensions.len(),
        title_collisions: run.title_collisions,
        ..GenerationStats::default()
    };

    let ctx = RenderContext {
        resolution: &run.resolution,
        extensions: &run.extensions,
        names: &options.names,
    };

    let mut seeds = vec![run.root];
    seeds.extend(run.extension_classes.iter().copied());
    for id in work_order(&run.resolution, &seeds) {
        let Some(class) = run.resolution.get(id) else {
            continue;
        };
        if class.external {
            debug!("{} is provided by another namespace", class.qualified_name);
            stats.classes_skipped += 1;
            continue;
        }
        match class.kind {
            ClassKind::Object(_) => stats.classes_generated += 1,
            ClassKind::Enum { .. } => stats.enums_generated += 1,
            ClassKind::Value { .. } | ClassKind::Unsupported => {
                stats.classes_skipped += 1;
                continue;
            }
        }
        debug!("rendering {}", class.qualified_name);
        renderer.render_class(class, &ctx)?;
    }

    renderer.finish(&ctx)?;
    Ok(stats)
}

/// Classes in the order the work queue visits them.
///
/// The queue is last-in first-out. Seeds are visited in the order given;
/// the references of each class are pushed so that its first reference is
/// visited next.
pub fn work_order(resolution: &Resolution, seeds: &[ClassId]) -> Vec<ClassId> {
    let mut stack: Vec<ClassId> = seeds.iter().rev().copied().collect();
    let mut processed: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    while let Some(id) = stack.pop() {
        let Some(class) = resolution.get(id) else {
            continue;
        };
        if !processed.insert(class.source.as_str()) {
            continue;
        }
        order.push(id);
        stack.extend(class.references.iter().rev().copied());
    }
    order
}

// ── JSON views ─────────────────────────────────────────────────────────

/// Output directories of [`IrRenderer`].
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub model: PathBuf,
    pub reader: PathBuf,
    pub writer: PathBuf,
}

/// Writes the model, reader and writer views of each class as JSON.
pub struct IrRenderer {
    dirs: OutputDirs,
    one_handler_file: bool,
    handlers: Vec<serde_json::Value>,
}

impl IrRenderer {
    /// With `one_handler_file`, all reader views go to a single
    /// `GeneratedJsonHandlers.json` instead of one file per class.
    pub fn new(dirs: OutputDirs, one_handler_file: bool) -> Self {
        Self {
            dirs,
            one_handler_file,
            handlers: Vec::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelView<'a> {
    name: &'a str,
    qualified_name: &'a str,
    doc: &'a Documentation,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enumeration: Option<&'a EnumType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    base_chain: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<&'a IndexSet<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    local_types: Vec<&'a EnumType>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<ModelProperty<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    size_statements: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelProperty<'a> {
    name: &'a str,
    member_name: &'a str,
    #[serde(rename = "type")]
    model_type: &'a str,
    /// Held in `std::optional`.
    optional: bool,
    /// May be left out of the JSON.
    omittable: bool,
    required_index: bool,
    default_value: Option<&'a str>,
    doc: &'a Documentation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReaderView<'a> {
    handler: &'a str,
    model: &'a str,
    base_handler: &'a str,
    headers: &'a IndexSet<String>,
    enum_readers: Vec<EnumReader>,
    properties: Vec<ReaderProperty<'a>>,
    extension_name: Option<&'a str>,
    extensions: &'a [ExtensionAttachment],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReaderProperty<'a> {
    name: &'a str,
    member_name: &'a str,
    handler: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriterView<'a> {
    writer: String,
    model: &'a str,
    properties: Vec<WriterProperty<'a>>,
    extension_name: Option<&'a str>,
    extensions: &'a [ExtensionAttachment],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WriterProperty<'a> {
    name: &'a str,
    member_name: &'a str,
    optional: bool,
    omittable: bool,
    default_value: Option<String>,
}

fn bare_name(class: &ClassDescriptor) -> &str {
    split_namespace(&class.type_name).1
}

fn model_view<'a>(class: &'a ClassDescriptor, ctx: &RenderContext<'a>) -> ModelView<'a> {
    let mut view = ModelView {
        name: bare_name(class),
        qualified_name: &class.qualified_name,
        doc: &class.doc,
        extension_name: class.extension_name.as_deref(),
        enumeration: None,
        base_chain: Vec::new(),
        headers: None,
        local_types: Vec::new(),
        properties: Vec::new(),
        size_statements: Vec::new(),
        dependencies: Vec::new(),
    };
    match &class.kind {
        ClassKind::Object(object) => {
            view.base_chain = object.base.model.chain();
            view.headers = Some(&object.model_headers);
            view.local_types = object.local_types();
            view.properties = object
                .properties
                .iter()
                .map(|p| ModelProperty {
                    name: &p.name,
                    member_name: &p.member_name,
                    model_type: &p.ty.model_type,
                    optional: p.ty.optional,
                    omittable: p.is_optional(),
                    required_index: p.is_required_index(),
                    default_value: p.ty.default_value.as_deref(),
                    doc: &p.ty.doc,
                })
                .collect();
            view.size_statements = class_size_statements(&class.qualified_name, object);
            let deps: Vec<ClassId> = class.dependencies().collect();
            view.dependencies = ctx.resolution.type_names(&deps);
        }
        ClassKind::Enum { enumeration } => view.enumeration = Some(enumeration),
        ClassKind::Value { .. } | ClassKind::Unsupported => {}
    }
    view
}

fn reader_view<'a>(
    class: &'a ClassDescriptor,
    object: &'a ObjectClass,
    ctx: &RenderContext<'a>,
) -> ReaderView<'a> {
    ReaderView {
        handler: &class.reader_type,
        model: &class.qualified_name,
        base_handler: &object.base.reader.name,
        headers: &object.reader_headers,
        enum_readers: object.enum_readers(),
        properties: object
            .properties
            .iter()
            .map(|p| ReaderProperty {
                name: &p.name,
                member_name: &p.member_name,
                handler: &p.ty.reader_type,
            })
            .collect(),
        extension_name: class.extension_name.as_deref(),
        extensions: class
            .title
            .as_deref()
            .map(|t| ctx.extensions.for_host(t))
            .unwrap_or(&[]),
    }
}

fn writer_view<'a>(
    class: &'a ClassDescriptor,
    object: &'a ObjectClass,
    ctx: &RenderContext<'a>,
) -> WriterView<'a> {
    WriterView {
        writer: get_writer_name(&class.type_name, ctx.names),
        model: &class.qualified_name,
        properties: object
            .properties
            .iter()
            .map(|p| WriterProperty {
                name: &p.name,
                member_name: &p.member_name,
                optional: p.ty.optional,
                omittable: p.is_optional(),
                default_value: p.ty.default_value_writer(),
            })
            .collect(),
        extension_name: class.extension_name.as_deref(),
        extensions: class
            .title
            .as_deref()
            .map(|t| ctx.extensions.for_host(t))
            .unwrap_or(&[]),
    }
}

impl Renderer for IrRenderer {
    fn render_class(&mut self, class: &ClassDescriptor, ctx: &RenderContext<'_>) -> Result<()> {
        let name = bare_name(class);
        write_json(
            &self.dirs.model.join(format!("{name}.json")),
            &model_view(class, ctx),
        )?;

        let Some(object) = class.as_object() else {
            return Ok(());
        };

        let reader = reader_view(class, object, ctx);
        if self.one_handler_file {
            self.handlers.push(serde_json::to_value(&reader)?);
        } else {
            write_json(
                &self.dirs.reader.join(format!("{name}JsonHandler.json")),
                &reader,
            )?;
        }

        write_json(
            &self.dirs.writer.join(format!("{name}JsonWriter.json")),
            &writer_view(class, object, ctx),
        )
    }

    fn finish(&mut self, ctx: &RenderContext<'_>) -> Result<()> {
        if self.one_handler_file {
            write_json(
                &self.dirs.reader.join("GeneratedJsonHandlers.json"),
                &self.handlers,
            )?;
        }
        write_json(&self.dirs.reader.join("extensions.json"), ctx.extensions)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_file(path, &content)
}

/// Write content to a file, creating parent directories as needed.
fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| Error::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    /// Records the order classes are rendered in.
    #[derive(Default)]
    struct Recorder {
        rendered: Vec<String>,
        finished: bool,
    }

    impl Renderer for Recorder {
        fn render_class(&mut self, class: &ClassDescriptor, _: &RenderContext<'_>) -> Result<()> {
            self.rendered.push(class.type_name.clone());
            Ok(())
        }

        fn finish(&mut self, _: &RenderContext<'_>) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn options(dir: &TempDir, schema: &str) -> GenerateOptions {
        GenerateOptions {
            schema: schema.to_string(),
            search_paths: vec![dir.path().display().to_string()],
            extension_paths: Vec::new(),
            config: GeneratorConfig::default(),
            names: NameOptions::new("CesiumGltf"),
        }
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let mut recorder = Recorder::default();
        let err = generate(&options(&dir, "glTF.schema.json"), &mut recorder).unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound { .. }));
        assert!(!recorder.finished);
    }

    #[test]
    fn each_class_rendered_once_in_queue_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("root.schema.json"),
            json!({
                "title": "Root",
                "type": "object",
                "properties": {
                    "a": {"$ref": "a.schema.json"},
                    "b": {"$ref": "b.schema.json"},
                    "again": {"type": "array", "items": {"$ref": "a.schema.json"}}
                }
            })
            .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("a.schema.json"),
            json!({"title": "A", "type": "object", "properties": {"b": {"$ref": "b.schema.json"}}})
                .to_string(),
        )
        .unwrap();
        fs::write(
            dir.path().join("b.schema.json"),
            json!({"title": "B", "type": "object", "properties": {"x": {"type": "number"}}})
                .to_string(),
        )
        .unwrap();

        let mut recorder = Recorder::default();
        let stats = generate(&options(&dir, "root.schema.json"), &mut recorder).unwrap();
        assert_eq!(recorder.rendered, vec!["Root", "A", "B"]);
        assert_eq!(stats.classes_generated, 3);
        assert!(recorder.finished);
    }

    #[test]
    fn ir_renderer_writes_views() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(
            dir.path().join("buffer.schema.json"),
            json!({
                "title": "Buffer",
                "type": "object",
                "properties": {
                    "uri": {"type": "string"},
                    "byteLength": {"type": "integer"}
                },
                "required": ["byteLength"]
            })
            .to_string(),
        )
        .unwrap();

        let dirs = OutputDirs {
            model: out.path().join("model"),
            reader: out.path().join("reader"),
            writer: out.path().join("writer"),
        };
        let mut renderer = IrRenderer::new(dirs, true);
        generate(&options(&dir, "buffer.schema.json"), &mut renderer).unwrap();

        let model: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("model/Buffer.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(model["qualifiedName"], "CesiumGltf::Buffer");
        assert_eq!(model["properties"][0]["type"], "std::optional<std::string>");
        assert_eq!(model["properties"][1]["type"], "int64_t");

        let handlers: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("reader/GeneratedJsonHandlers.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(handlers[0]["handler"], "CesiumGltfReader::BufferJsonHandler");
        assert!(out.path().join("writer/BufferJsonWriter.json").exists());
        assert!(out.path().join("reader/extensions.json").exists());
    }

    #[test]
    fn containers_are_never_wrapped_in_optional() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(
            dir.path().join("bag.schema.json"),
            json!({
                "title": "Bag",
                "type": "object",
                "properties": {
                    "xs": {"type": "array", "items": {"type": "number"}},
                    "byName": {"type": "object", "additionalProperties": {"type": "number"}}
                }
            })
            .to_string(),
        )
        .unwrap();

        let dirs = OutputDirs {
            model: out.path().join("model"),
            reader: out.path().join("reader"),
            writer: out.path().join("writer"),
        };
        let mut renderer = IrRenderer::new(dirs, false);
        generate(&options(&dir, "bag.schema.json"), &mut renderer).unwrap();

        let model: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("model/Bag.json")).unwrap(),
        )
        .unwrap();
        let xs = &model["properties"][0];
        assert_eq!(xs["type"], "std::vector<double>");
        assert_eq!(xs["optional"], false);
        assert_eq!(xs["omittable"], true);
        let by_name = &model["properties"][1];
        assert_eq!(by_name["type"], "std::unordered_map<std::string, double>");
        assert_eq!(by_name["optional"], false);
        assert_eq!(by_name["omittable"], true);

        let writer: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(out.path().join("writer/BagJsonWriter.json")).unwrap(),
        )
        .unwrap();
        for property in writer["properties"].as_array().unwrap() {
            assert_eq!(property["optional"], false);
            assert_eq!(property["omittable"], true);
        }
    }
}
