//! Generator configuration.
//!
//! The configuration file is JSON and every section is optional:
//!
//! ```json
//! {
//!   "classes": {
//!     "glTF": { "overrideName": "Model" },
//!     "Buffer": { "isAsset": true }
//!   },
//!   "extensions": [
//!     {
//!       "schema": "mesh.primitive.KHR_draco_mesh_compression.schema.json",
//!       "extensionName": "KHR_draco_mesh_compression",
//!       "className": "ExtensionKhrDracoMeshCompression",
//!       "attachTo": ["mesh.primitive"]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Parsed generator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Per-title class settings, keyed by schema `title`.
    #[serde(default)]
    pub classes: IndexMap<String, ClassConfig>,

    /// Extensions to generate and graft onto their host types.
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
}

/// Settings for a single schema title.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassConfig {
    /// Replaces the type name derived from the title. May be namespace
    /// qualified (e.g. `CesiumUtility::JsonValue`).
    #[serde(default)]
    pub override_name: Option<String>,

    /// Hold values of this class through an intrusive reference-counted
    /// pointer instead of by value.
    #[serde(default)]
    pub is_asset: bool,
}

/// One configured extension.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionConfig {
    /// Schema file name of the extension, searched in the extension paths.
    pub schema: String,

    /// Name of the extension on the wire (the key inside `"extensions"`).
    pub extension_name: String,

    /// Generated class name. Derived from the schema title when absent.
    #[serde(default)]
    pub class_name: Option<String>,

    /// Host schema names (without `.schema.json`) the extension attaches to.
    #[serde(default)]
    pub attach_to: Vec<String>,
}

impl GeneratorConfig {
    /// Load and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The configured name override for `title`, if any.
    pub fn override_name(&self, title: &str) -> Option<&str> {
        self.classes
            .get(title)
            .and_then(|c| c.override_name.as_deref())
    }

    /// Whether `title` is configured as a reference-counted asset type.
    pub fn is_asset(&self, title: &str) -> bool {
        self.classes.get(title).is_some_and(|c| c.is_asset)
    }
}

/// Namespaces the generated code lives in.
#[derive(Debug, Clone)]
pub struct NameOptions {
    /// Namespace of the model classes (e.g. `CesiumGltf`).
    pub namespace: String,

    /// Namespace of the generated readers (e.g. `CesiumGltfReader`).
    pub reader_namespace: String,

    /// Namespace of the generated writers (e.g. `CesiumGltfWriter`).
    pub writer_namespace: String,

    /// Reader namespace for model namespaces other than our own. Namespaces
    /// not listed here get `<namespace>Reader`.
    pub reader_namespace_overrides: IndexMap<String, String>,
}

impl NameOptions {
    /// Options for `namespace`, with reader and writer namespaces derived by
    /// suffix and the default override table.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            reader_namespace: format!("{namespace}Reader"),
            writer_namespace: format!("{namespace}Writer"),
            reader_namespace_overrides: IndexMap::from([(
                "CesiumUtility".to_string(),
                "CesiumJsonReader".to_string(),
            )]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "classes": {
                "glTF": { "overrideName": "Model" },
                "Buffer": { "isAsset": true }
            },
            "extensions": [
                {
                    "schema": "mesh.primitive.KHR_draco_mesh_compression.schema.json",
                    "extensionName": "KHR_draco_mesh_compression",
                    "attachTo": ["mesh.primitive"]
                }
            ]
        }"#;
        let config: GeneratorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.override_name("glTF"), Some("Model"));
        assert_eq!(config.override_name("Buffer"), None);
        assert!(config.is_asset("Buffer"));
        assert!(!config.is_asset("glTF"));
        assert_eq!(config.extensions.len(), 1);
        assert_eq!(config.extensions[0].class_name, None);
        assert_eq!(config.extensions[0].attach_to, vec!["mesh.primitive"]);
    }

    #[test]
    fn empty_config_is_valid() {
        let config: GeneratorConfig = serde_json::from_str("{}").unwrap();
        assert!(config.classes.is_empty());
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn missing_config_file_is_read_error() {
        let err = GeneratorConfig::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn default_reader_namespace_override() {
        let options = NameOptions::new("CesiumGltf");
        assert_eq!(options.reader_namespace, "CesiumGltfReader");
        assert_eq!(
            options.reader_namespace_overrides.get("CesiumUtility").map(String::as_str),
            Some("CesiumJsonReader")
        );
    }
}
