//! Error types for the ec2ova core library.

use std::fmt;
use std::path::PathBuf;

/// Kind of cloud resource looked up through a metadata source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ExportTask,
    Image,
    Instance,
    InstanceType,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ExportTask => write!(f, "export task"),
            ResourceKind::Image => write!(f, "image"),
            ResourceKind::Instance => write!(f, "instance"),
            ResourceKind::InstanceType => write!(f, "instance type"),
        }
    }
}

/// The main error type for ec2ova operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on a local file.
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    /// A cloud identifier did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: ResourceKind, id: String },

    /// Metadata could not be decoded or is missing a required link.
    #[error("Metadata error: {message}")]
    Metadata { message: String },

    /// The OVF tree is internally inconsistent or could not be serialized.
    #[error("OVF error: {message}")]
    Ovf { message: String },

    /// Uploading the finished document failed.
    #[error("Upload to '{bucket}/{key}' failed: {message}")]
    Transport {
        bucket: String,
        key: String,
        message: String,
    },

    /// Error in the parallel export pipeline.
    #[error("Pipeline error: {message}")]
    Pipeline { message: String },
}

/// A specialized Result type for ec2ova operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    /// Create a not-found error for the given resource.
    pub fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a metadata error.
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Create an OVF error.
    pub fn ovf(message: impl Into<String>) -> Self {
        Self::Ovf {
            message: message.into(),
        }
    }

    /// Create a transport error for an object upload.
    pub fn transport(
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a pipeline error.
    pub fn pipeline(message: impl Into<String>) -> Self {
        Self::Pipeline {
            message: message.into(),
        }
    }
}
