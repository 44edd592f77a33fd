//! Export orchestrator for EC2 image export tasks.
//!
//! This module coordinates the full flow for one task:
//! 1. Resolve the export task, its image, the image's source instance, and
//!    the instance type
//! 2. Build and validate the OVF envelope
//! 3. Upload the descriptor next to the exported disks as `<prefix>vm.ovf`
//!
//! # Example
//!
//! ```no_run
//! use ec2ova_core::export::export_task;
//! use ec2ova_core::source::{DirectoryStore, Inventory};
//! use std::path::Path;
//!
//! let inventory = Inventory::load(Path::new("inventory.json")).unwrap();
//! let store = DirectoryStore::new("/srv/exports");
//!
//! let report = export_task("export-ami-0123", &inventory, &store, None).unwrap();
//! println!("{}", report.document);
//! ```

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::ovf::build_envelope;
use crate::source::{MetadataSource, ObjectStore};

/// Object name of the descriptor, appended to the task's key prefix.
pub const OVF_OBJECT_NAME: &str = "vm.ovf";

/// Options for exporting several tasks.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Number of threads to use (0 = auto).
    pub num_threads: usize,
}

impl ExportOptions {
    pub fn new(num_threads: usize) -> Self {
        Self { num_threads }
    }
}

/// Phase of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPhase {
    /// Looking up the task, image, instance, and instance type.
    Resolving,
    /// Building the OVF descriptor.
    Building,
    /// Writing the descriptor to the object store.
    Uploading,
    /// Export complete.
    Complete,
}

impl std::fmt::Display for ExportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportPhase::Resolving => write!(f, "Resolving"),
            ExportPhase::Building => write!(f, "Building"),
            ExportPhase::Uploading => write!(f, "Uploading"),
            ExportPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress information for one export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportProgress {
    pub task_id: String,
    pub phase: ExportPhase,
}

/// Type alias for the progress callback function.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub task_id: String,
    pub bucket: String,
    pub key: String,
    /// The uploaded OVF document.
    pub document: String,
    /// Hex SHA-256 of the uploaded document.
    pub sha256: String,
    pub disk_count: usize,
    pub network_count: usize,
    /// Devices left out of the descriptor for lacking EBS backing.
    pub skipped_devices: Vec<String>,
}

/// Export the OVF descriptor for one task.
///
/// Nothing is uploaded unless every lookup succeeded and the document was
/// fully built.
///
/// # Arguments
///
/// * `task_id` - The export image task id.
/// * `source` - Where task, image, instance, and instance type records come from.
/// * `store` - Where the finished descriptor is written.
/// * `progress_callback` - Optional callback for phase updates.
pub fn export_task<S, O>(
    task_id: &str,
    source: &S,
    store: &O,
    progress_callback: Option<&ProgressCallback>,
) -> Result<ExportReport>
where
    S: MetadataSource + ?Sized,
    O: ObjectStore + ?Sized,
{
    let report_progress = |phase: ExportPhase| {
        if let Some(callback) = progress_callback {
            callback(ExportProgress {
                task_id: task_id.to_string(),
                phase,
            });
        }
    };

    // Phase 1: Resolving
    report_progress(ExportPhase::Resolving);
    let task = source.export_task(task_id)?;
    let image = source.image(&task.image_id)?;
    let instance_id = image.source_instance_id.as_deref().ok_or_else(|| {
        Error::metadata(format!(
            "image {} does not record a source instance",
            image.image_id
        ))
    })?;
    let instance = source.instance(instance_id)?;
    let instance_type = source.instance_type(&instance.instance_type)?;
    debug!(
        task_id,
        image_id = %image.image_id,
        instance_id = %instance.instance_id,
        instance_type = %instance_type.instance_type,
        "resolved export metadata"
    );

    // Phase 2: Building
    report_progress(ExportPhase::Building);
    let build = build_envelope(task_id, &instance, &instance_type, &image)?;
    if !build.skipped_devices.is_empty() {
        warn!(
            task_id,
            skipped = build.skipped_devices.len(),
            devices = ?build.skipped_devices,
            "skipping block-device mappings without EBS backing"
        );
    }
    let document = build.to_xml()?;

    // Phase 3: Uploading
    report_progress(ExportPhase::Uploading);
    let location = &task.s3_export_location;
    let key = format!("{}{}", location.s3_prefix, OVF_OBJECT_NAME);
    store.put_object(&location.s3_bucket, &key, document.as_bytes())?;
    info!(task_id, bucket = %location.s3_bucket, key = %key, "uploaded OVF descriptor");

    report_progress(ExportPhase::Complete);

    Ok(ExportReport {
        task_id: task_id.to_string(),
        bucket: location.s3_bucket.clone(),
        key,
        sha256: format!("{:x}", Sha256::digest(document.as_bytes())),
        document,
        disk_count: build.envelope.disks.len(),
        network_count: build.envelope.networks.len(),
        skipped_devices: build.skipped_devices,
    })
}

/// Export several tasks in parallel.
///
/// Tasks are independent; a failure in one does not stop the others.
/// Results come back in the order of `task_ids`.
pub fn export_tasks<S, O>(
    task_ids: &[String],
    source: &S,
    store: &O,
    options: &ExportOptions,
    progress_callback: Option<&ProgressCallback>,
) -> Result<Vec<(String, Result<ExportReport>)>>
where
    S: MetadataSource + Sync + ?Sized,
    O: ObjectStore + Sync + ?Sized,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.num_threads)
        .build()
        .map_err(|e| Error::pipeline(format!("failed to start thread pool: {}", e)))?;

    Ok(pool.install(|| {
        task_ids
            .par_iter()
            .map(|task_id| {
                let result = export_task(task_id, source, store, progress_callback);
                (task_id.clone(), result)
            })
            .collect()
    }))
}
