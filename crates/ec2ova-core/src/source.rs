//! Metadata sources and object stores.
//!
//! The export flow only talks to the cloud through [`MetadataSource`] and
//! [`ObjectStore`]. [`Inventory`] answers lookups from a JSON file of saved
//! describe responses, and [`DirectoryStore`] writes objects under a local
//! directory laid out as `<root>/<bucket>/<key>`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ResourceKind, Result};
use crate::metadata::{ExportImageTask, Image, Instance, InstanceTypeInfo};

/// Lookup of the records needed to describe an export.
pub trait MetadataSource {
    fn export_task(&self, task_id: &str) -> Result<ExportImageTask>;
    fn image(&self, image_id: &str) -> Result<Image>;
    fn instance(&self, instance_id: &str) -> Result<Instance>;
    fn instance_type(&self, type_name: &str) -> Result<InstanceTypeInfo>;
}

/// Destination for finished documents.
pub trait ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()>;
}

/// Saved cloud metadata, keyed the same way as the describe responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Inventory {
    #[serde(default)]
    pub export_image_tasks: Vec<ExportImageTask>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub instance_types: Vec<InstanceTypeInfo>,
}

impl Inventory {
    /// Load an inventory from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(e, path))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::metadata(format!("invalid inventory {}: {}", path.display(), e)))
    }

    /// Parse an inventory from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::metadata(format!("invalid inventory: {}", e)))
    }
}

impl MetadataSource for Inventory {
    fn export_task(&self, task_id: &str) -> Result<ExportImageTask> {
        self.export_image_tasks
            .iter()
            .find(|task| task.export_image_task_id == task_id)
            .cloned()
            .ok_or_else(|| Error::not_found(ResourceKind::ExportTask, task_id))
    }

    fn image(&self, image_id: &str) -> Result<Image> {
        self.images
            .iter()
            .find(|image| image.image_id == image_id)
            .cloned()
            .ok_or_else(|| Error::not_found(ResourceKind::Image, image_id))
    }

    fn instance(&self, instance_id: &str) -> Result<Instance> {
        self.instances
            .iter()
            .find(|instance| instance.instance_id == instance_id)
            .cloned()
            .ok_or_else(|| Error::not_found(ResourceKind::Instance, instance_id))
    }

    fn instance_type(&self, type_name: &str) -> Result<InstanceTypeInfo> {
        self.instance_types
            .iter()
            .find(|info| info.instance_type == type_name)
            .cloned()
            .ok_or_else(|| Error::not_found(ResourceKind::InstanceType, type_name))
    }
}

/// An object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path an object would be written to, if the name stays inside the root.
    pub fn object_path(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let relative = Path::new(bucket).join(key);
        let contained = !bucket.is_empty()
            && !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        contained.then(|| self.root.join(relative))
    }
}

impl ObjectStore for DirectoryStore {
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        let path = self
            .object_path(bucket, key)
            .ok_or_else(|| Error::transport(bucket, key, "object name escapes the store root"))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::transport(bucket, key, e.to_string()))?;
        }
        fs::write(&path, body).map_err(|e| Error::transport(bucket, key, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inventory_lookups_fail() {
        let inventory = Inventory::from_json("{}").unwrap();
        let err = inventory.export_task("export-ami-1").unwrap_err();
        assert!(matches!(
            err,
            Error::NotFound {
                kind: ResourceKind::ExportTask,
                ..
            }
        ));
        assert!(inventory.image("ami-1").is_err());
        assert!(inventory.instance("i-1").is_err());
        assert!(inventory.instance_type("t3.micro").is_err());
    }

    #[test]
    fn test_invalid_inventory_json() {
        let err = Inventory::from_json("{\"Images\": 3}").unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
    }

    #[test]
    fn test_object_path_containment() {
        let store = DirectoryStore::new("/srv/objects");
        assert_eq!(
            store.object_path("bucket", "exports/vm.ovf"),
            Some(PathBuf::from("/srv/objects/bucket/exports/vm.ovf"))
        );
        assert_eq!(store.object_path("bucket", "../escape.ovf"), None);
        assert_eq!(store.object_path("bucket", "/etc/passwd"), None);
        assert_eq!(store.object_path("", "vm.ovf"), None);
        assert_eq!(store.object_path("bucket", ""), None);
    }

    #[test]
    fn test_put_object_rejects_escaping_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("store");
        let store = DirectoryStore::new(&root);

        let err = store.put_object("bucket", "../x", b"data").unwrap_err();
        match err {
            Error::Transport { bucket, key, .. } => {
                assert_eq!(bucket, "bucket");
                assert_eq!(key, "../x");
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(!root.exists());
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_put_object_writes_under_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = DirectoryStore::new(dir.path());

        store.put_object("bucket", "exports/vm.ovf", b"<Envelope/>").unwrap();
        let written = fs::read(dir.path().join("bucket/exports/vm.ovf")).unwrap();
        assert_eq!(written, b"<Envelope/>");
    }
}
