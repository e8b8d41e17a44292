//! Generate glTF model, reader and writer types from JSON Schema.
//!
//! `gltf-schema-gen` reads the [glTF](https://github.com/KhronosGroup/glTF)
//! JSON Schemas (or any schema set written in the same style), resolves them
//! into a class table, and hands each class to a renderer.
//!
//! # Features
//!
//! - Resolves `$ref` against the referencing schema, then the search paths;
//!   local files and `http(s)` URLs
//! - Loads and resolves each schema once, however often it is referenced
//! - Terminates on cyclic references (`Node.children` → `Node`)
//! - Single-entry `allOf` becomes a base class; inherited properties are not
//!   repeated on derived classes
//! - Normalizes the three glTF enum idioms into one representation
//! - Grafts configured extensions onto their host schemas
//! - Deterministic output: byte-identical across runs
//!
//! # Usage
//!
//! ```no_run
//! use gltf_schema_gen::codegen::{GenerateOptions, IrRenderer, OutputDirs, generate};
//! use gltf_schema_gen::config::{GeneratorConfig, NameOptions};
//!
//! let options = GenerateOptions {
//!     schema: "glTF.schema.json".to_string(),
//!     search_paths: vec!["specification/2.0/schema".to_string()],
//!     extension_paths: Vec::new(),
//!     config: GeneratorConfig::default(),
//!     names: NameOptions::new("CesiumGltf"),
//! };
//! let mut renderer = IrRenderer::new(
//!     OutputDirs {
//!         model: "out/model".into(),
//!         reader: "out/reader".into(),
//!         writer: "out/writer".into(),
//!     },
//!     false,
//! );
//! let stats = generate(&options, &mut renderer)?;
//! eprintln!("Generated {} classes", stats.classes_generated);
//! # Ok::<(), gltf_schema_gen::error::Error>(())
//! ```

pub mod cache;
pub mod codegen;
pub mod config;
pub mod enums;
pub mod error;
pub mod extensions;
pub mod names;
mod property;
pub mod resolver;
pub mod schema;
pub mod size;
pub mod types;
