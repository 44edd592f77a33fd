//! ec2ova Core Library
//!
//! This crate turns the metadata of an EC2 image export task into an OVF
//! descriptor that hypervisor tooling can import alongside the exported raw
//! disks.
//!
//! # Overview
//!
//! The heart of the crate is [`ovf::build_envelope`], a pure function from
//! instance, instance type, and image metadata to an OVF envelope whose file,
//! disk, network, and hardware cross-references are consistent by
//! construction. [`export_task`] wraps it with metadata lookup and upload.
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`metadata`] - EC2 metadata records
//! - [`ovf`] - OVF model, builder, validation, and XML reading/writing
//! - [`source`] - Metadata source and object store seams
//! - [`export`] - Export orchestrator
//!
//! # Quick Start
//!
//! ```no_run
//! use ec2ova_core::source::{DirectoryStore, Inventory};
//! use ec2ova_core::export_task;
//! use std::path::Path;
//!
//! let inventory = Inventory::load(Path::new("inventory.json")).unwrap();
//! let store = DirectoryStore::new("exports");
//!
//! export_task("export-ami-0123", &inventory, &store, None).unwrap();
//! ```

pub mod error;
pub mod export;
pub mod metadata;
pub mod ovf;
pub mod source;

pub use error::{Error, ResourceKind, Result};

// Re-export main export functionality for convenience
pub use export::{
    export_task, export_tasks, ExportOptions, ExportPhase, ExportProgress, ExportReport,
    ProgressCallback, OVF_OBJECT_NAME,
};

pub use ovf::{build_envelope, format_ovf, parse_ovf, Envelope};
pub use source::{DirectoryStore, Inventory, MetadataSource, ObjectStore};
