//! Extension grafting.
//!
//! Each configured extension is resolved like any other class, then recorded
//! against the title of every host schema it attaches to. Readers and writers
//! of a host look up their extensions by the host's title.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ExtensionConfig;
use crate::names::get_name;
use crate::resolver::Resolver;
use crate::types::ClassId;

/// An extension class attached to a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionAttachment {
    /// Key of the extension inside the host's `extensions` object.
    pub extension_name: String,
    /// Qualified name of the generated extension class.
    pub class_name: String,
}

/// Extensions by host schema title, in configuration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtensionRegistry {
    hosts: IndexMap<String, Vec<ExtensionAttachment>>,
}

impl ExtensionRegistry {
    pub fn attach(&mut self, host_title: &str, attachment: ExtensionAttachment) {
        let attached = self.hosts.entry(host_title.to_string()).or_default();
        if !attached.contains(&attachment) {
            attached.push(attachment);
        }
    }

    /// Extensions attached to the host titled `host_title`.
    pub fn for_host(&self, host_title: &str) -> &[ExtensionAttachment] {
        self.hosts.get(host_title).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.hosts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Resolve every configured extension and record where it attaches.
///
/// Returns the ids of the extension classes, for seeding the work queue.
/// Extensions whose schema does not load are skipped, as are hosts that do
/// not load or have no title.
pub fn graft_extensions(
    resolver: &mut Resolver<'_>,
    extensions: &[ExtensionConfig],
) -> (Vec<ClassId>, ExtensionRegistry) {
    let mut ids = Vec::new();
    let mut registry = ExtensionRegistry::default();

    for extension in extensions {
        let Some(doc) = resolver
            .cache_mut()
            .load_extension(&extension.schema, Some(&extension.extension_name))
        else {
            warn!(
                "extension {}: schema {} not found; skipping",
                extension.extension_name, extension.schema
            );
            continue;
        };
        let Some(id) =
            resolver.resolve_extension(doc, extension.class_name.as_deref(), &extension.extension_name)
        else {
            warn!(
                "extension {}: schema {} did not resolve; skipping",
                extension.extension_name, extension.schema
            );
            continue;
        };
        ids.push(id);

        let Some(type_name) = resolver.type_name(id) else {
            continue;
        };
        let class_name = get_name(type_name, &resolver.names.namespace);

        for host in &extension.attach_to {
            let host_schema = format!("{host}.schema.json");
            let Some(host_doc) = resolver.cache_mut().load(&host_schema) else {
                warn!(
                    "extension {}: host {host_schema} not found; not attaching",
                    extension.extension_name
                );
                continue;
            };
            let Some(title) = host_doc.title() else {
                warn!(
                    "extension {}: host {host_schema} has no title; not attaching",
                    extension.extension_name
                );
                continue;
            };
            info!(
                "attaching {} ({class_name}) to {title}",
                extension.extension_name
            );
            registry.attach(
                title,
                ExtensionAttachment {
                    extension_name: extension.extension_name.clone(),
                    class_name: class_name.clone(),
                },
            );
        }
    }

    (ids, registry)
}
