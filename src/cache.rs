//! Schema loading and caching.
//!
//! [`SchemaCache`] resolves schema names against a context stack and a list
//! of search locations, loads each distinct resolved location once, and keeps
//! an index of loaded schemas by title.
//!
//! Locations are either local paths or `http(s)://` URLs. Remote schemas are
//! fetched with `reqwest` when the `download` feature is enabled.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::schema::SchemaDocument;

/// Two distinct schema files that share a title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleCollision {
    pub title: String,
    /// Key of the schema that previously owned the title.
    pub previous: String,
    /// Key of the schema that now owns it.
    pub current: String,
}

/// Loads and caches schema documents.
#[derive(Debug, Default)]
pub struct SchemaCache {
    search_paths: Vec<String>,
    extension_paths: Vec<String>,
    documents: HashMap<String, Rc<SchemaDocument>>,
    by_title: IndexMap<String, Rc<SchemaDocument>>,
    context: Vec<String>,
    title_collisions: Vec<TitleCollision>,
    #[cfg(feature = "download")]
    runtime: Option<tokio::runtime::Runtime>,
}

impl SchemaCache {
    /// Create a cache searching `search_paths` (directories or base URLs) for
    /// ordinary schemas and `extension_paths` for extension schemas.
    pub fn new(search_paths: Vec<String>, extension_paths: Vec<String>) -> Self {
        Self {
            search_paths,
            extension_paths,
            ..Self::default()
        }
    }

    /// Load a schema by name.
    ///
    /// `name` may carry an in-document fragment (`defs.schema.json#/definitions/x`)
    /// or be a fragment only (`#/definitions/x`), which refers to the schema on
    /// top of the context stack. Relative names are tried against the top of
    /// the context stack first, then against each search path in order.
    ///
    /// Returns `None` (after logging the attempted locations) when nothing
    /// loads.
    pub fn load(&mut self, name: &str) -> Option<Rc<SchemaDocument>> {
        let (file, fragment) = split_ref(name);

        let mut candidates = Vec::new();
        if file.is_empty() {
            match self.context.last() {
                Some(current) => candidates.push(current.clone()),
                None => {
                    warn!("in-document reference '{name}' used outside of any schema");
                    return None;
                }
            }
        } else {
            if let Some(current) = self.context.last() {
                candidates.push(join_relative(current, file));
            }
            candidates.extend(self.search_paths.iter().map(|dir| join_dir(dir, file)));
        }

        self.load_first(name, &candidates, fragment)
    }

    /// Load an extension schema by file name, searching only the extension
    /// paths.
    ///
    /// Several extensions ship a schema file with the same name, so paths that
    /// contain `disambiguator` (usually the extension name) are tried first.
    pub fn load_extension(
        &mut self,
        name: &str,
        disambiguator: Option<&str>,
    ) -> Option<Rc<SchemaDocument>> {
        let (file, fragment) = split_ref(name);

        let mut paths: Vec<&String> = self.extension_paths.iter().collect();
        if let Some(key) = disambiguator {
            paths.sort_by_key(|p| !p.contains(key));
        }
        let candidates: Vec<String> = paths.into_iter().map(|dir| join_dir(dir, file)).collect();

        self.load_first(name, &candidates, fragment)
    }

    /// Make `schema` the document relative references resolve against.
    ///
    /// Every push must be paired with a [`pop_context`](Self::pop_context);
    /// the resolver does this through a scoped helper.
    pub fn push_context(&mut self, schema: &SchemaDocument) {
        self.context.push(schema.source_path().to_string());
    }

    pub fn pop_context(&mut self) {
        self.context.pop();
    }

    /// Depth of the context stack.
    pub fn context_depth(&self) -> usize {
        self.context.len()
    }

    /// Location relative references currently resolve against.
    pub fn context_top(&self) -> Option<&str> {
        self.context.last().map(String::as_str)
    }

    /// Register a schema that does not come from a file, such as the body of
    /// an inline object property. Returns the existing document if `key` is
    /// already known.
    pub fn insert_synthetic(
        &mut self,
        key: &str,
        source_path: &str,
        value: Value,
    ) -> Rc<SchemaDocument> {
        if let Some(existing) = self.documents.get(key) {
            return Rc::clone(existing);
        }
        let doc = Rc::new(SchemaDocument::new(key, source_path, value));
        self.documents.insert(key.to_string(), Rc::clone(&doc));
        doc
    }

    /// The most recently loaded schema with `title`.
    pub fn by_title(&self, title: &str) -> Option<&Rc<SchemaDocument>> {
        self.by_title.get(title)
    }

    /// Title collisions seen so far, in the order they happened.
    pub fn title_collisions(&self) -> &[TitleCollision] {
        &self.title_collisions
    }

    fn load_first(
        &mut self,
        name: &str,
        candidates: &[String],
        fragment: &str,
    ) -> Option<Rc<SchemaDocument>> {
        for candidate in candidates {
            let Some(doc) = self.load_location(candidate) else {
                continue;
            };
            return self.select_fragment(&doc, fragment);
        }

        warn!(
            "could not load schema '{name}' (tried: {})",
            if candidates.is_empty() {
                "no search paths".to_string()
            } else {
                candidates.join(", ")
            }
        );
        None
    }

    fn load_location(&mut self, location: &str) -> Option<Rc<SchemaDocument>> {
        let key = canonical_key(location)?;
        if let Some(doc) = self.documents.get(&key) {
            return Some(Rc::clone(doc));
        }

        let content = match self.read_location(&key) {
            Ok(content) => content,
            Err(reason) => {
                debug!("skipping {key}: {reason}");
                return None;
            }
        };
        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                debug!("skipping {key}: not valid JSON: {e}");
                return None;
            }
        };

        let doc = Rc::new(SchemaDocument::new(key.clone(), key.clone(), value));
        debug!("loaded {key}");
        self.documents.insert(key, Rc::clone(&doc));
        self.index_title(&doc);
        Some(doc)
    }

    fn select_fragment(
        &mut self,
        doc: &Rc<SchemaDocument>,
        fragment: &str,
    ) -> Option<Rc<SchemaDocument>> {
        if fragment.is_empty() || fragment == "/" {
            return Some(Rc::clone(doc));
        }

        let key = format!("{}#{fragment}", doc.key());
        if let Some(existing) = self.documents.get(&key) {
            return Some(Rc::clone(existing));
        }
        let Some(value) = doc.value().pointer(fragment) else {
            warn!("'{fragment}' does not exist in {}", doc.key());
            return None;
        };
        let sub = Rc::new(SchemaDocument::new(
            key.clone(),
            doc.source_path(),
            value.clone(),
        ));
        self.documents.insert(key, Rc::clone(&sub));
        Some(sub)
    }

    fn index_title(&mut self, doc: &Rc<SchemaDocument>) {
        let Some(title) = doc.title() else {
            return;
        };
        if let Some(previous) = self.by_title.get(title) {
            if previous.key() != doc.key() {
                warn!(
                    "schemas {} and {} share the title '{title}'; using the latter",
                    previous.key(),
                    doc.key()
                );
                self.title_collisions.push(TitleCollision {
                    title: title.to_string(),
                    previous: previous.key().to_string(),
                    current: doc.key().to_string(),
                });
            }
        }
        self.by_title.insert(title.to_string(), Rc::clone(doc));
    }

    fn read_location(&mut self, location: &str) -> Result<String, String> {
        if is_url(location) {
            return self.fetch(location);
        }
        std::fs::read_to_string(location).map_err(|e| e.to_string())
    }

    #[cfg(feature = "download")]
    fn fetch(&mut self, url: &str) -> Result<String, String> {
        let runtime = match self.runtime.take() {
            Some(runtime) => runtime,
            None => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| e.to_string())?,
        };
        let result = runtime.block_on(fetch_text(url));
        self.runtime = Some(runtime);
        result.map_err(|e| e.to_string())
    }

    #[cfg(not(feature = "download"))]
    fn fetch(&mut self, _url: &str) -> Result<String, String> {
        Err("remote schemas need the `download` feature".to_string())
    }
}

#[cfg(feature = "download")]
async fn fetch_text(url: &str) -> crate::error::Result<String> {
    use crate::error::Error;

    let response = reqwest::get(url)
        .await
        .map_err(|e| Error::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    response
        .text()
        .await
        .map_err(|e| Error::Download(format!("reading response body: {e}")))
}

/// Split a reference into its file part and its JSON pointer fragment.
///
/// `"a.json#/definitions/x"` → `("a.json", "/definitions/x")`.
pub fn split_ref(reference: &str) -> (&str, &str) {
    match reference.split_once('#') {
        Some((file, fragment)) => (file, fragment),
        None => (reference, ""),
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Resolve `name` relative to the document at `document`.
fn join_relative(document: &str, name: &str) -> String {
    if is_url(name) || Path::new(name).is_absolute() {
        return name.to_string();
    }
    if is_url(document) {
        let parent = document.rsplit_once('/').map_or(document, |(p, _)| p);
        return normalize_url(&format!("{parent}/{name}"));
    }
    match Path::new(document).parent() {
        Some(parent) => parent.join(name).to_string_lossy().into_owned(),
        None => name.to_string(),
    }
}

/// Resolve `name` inside the directory (or base URL) `dir`.
fn join_dir(dir: &str, name: &str) -> String {
    if is_url(name) || Path::new(name).is_absolute() {
        return name.to_string();
    }
    if is_url(dir) {
        return normalize_url(&format!("{}/{name}", dir.trim_end_matches('/')));
    }
    Path::new(dir).join(name).to_string_lossy().into_owned()
}

/// The cache key of a location: the canonical path for files that exist,
/// the normalized URL for remote locations, `None` for missing files.
fn canonical_key(location: &str) -> Option<String> {
    if is_url(location) {
        return Some(normalize_url(location));
    }
    std::fs::canonicalize(location)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// Remove `.` and `..` segments from the path of a URL.
fn normalize_url(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("{scheme}://{host}/{}", segments.join("/"))
}
