//! Cloud metadata records consumed by the OVF builder.
//!
//! The field names follow the JSON emitted by the EC2 `Describe*` calls, so
//! saved API responses can be deserialized directly.

use serde::{Deserialize, Serialize};

/// A key/value tag attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// CPU topology of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CpuOptions {
    /// Number of CPU cores.
    pub core_count: u32,
    /// Threads per core, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_per_core: Option<u32>,
}

/// A network interface attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkInterface {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_interface_id: Option<String>,
    /// The subnet the interface lives in. Used as the OVF network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
}

/// The instance an image was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    /// The instance identifier (e.g., "i-0abc123").
    pub instance_id: String,
    /// The instance type name (e.g., "m5.large").
    pub instance_type: String,
    pub cpu_options: CpuOptions,
    /// Network interfaces in the order the provider lists them.
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    /// Tags in the order the provider lists them.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Instance {
    /// Returns the value of the first `Name` tag, if any.
    pub fn name_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == "Name")
            .map(|tag| tag.value.as_str())
    }

    /// Returns the name a hypervisor should show for this instance.
    ///
    /// This is the `Name` tag when present, otherwise the instance id.
    pub fn display_name(&self) -> &str {
        self.name_tag().unwrap_or(&self.instance_id)
    }
}

/// Memory capacity of an instance type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    #[serde(rename = "SizeInMiB")]
    pub size_in_mib: u64,
}

/// Capacity information for an instance type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceTypeInfo {
    pub instance_type: String,
    pub memory_info: MemoryInfo,
}

/// EBS backing of a block-device mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EbsBlockDevice {
    /// Volume size in GiB.
    pub volume_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
}

/// A device declared by an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    /// The device path (e.g., "/dev/sda1").
    pub device_name: String,
    /// EBS backing. Mappings without it (instance store, no-device) are not exportable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs: Option<EbsBlockDevice>,
    /// Instance store name (e.g., "ephemeral0").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_name: Option<String>,
}

impl BlockDeviceMapping {
    /// Last path component of the device name (`/dev/sda1` -> `sda1`).
    pub fn device_base_name(&self) -> &str {
        let trimmed = self.device_name.trim_end_matches('/');
        if trimmed.is_empty() {
            return if self.device_name.is_empty() { "." } else { "/" };
        }
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }
}

/// The machine image being exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Image {
    pub image_id: String,
    /// Instance the image was created from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_instance_id: Option<String>,
    /// Platform label (e.g., "Linux/UNIX", "Windows", "Red Hat Enterprise Linux").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
}

/// Destination of an image export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct S3ExportLocation {
    pub s3_bucket: String,
    /// Key prefix, prepended verbatim to object names.
    #[serde(default)]
    pub s3_prefix: String,
}

/// An image export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportImageTask {
    pub export_image_task_id: String,
    pub image_id: String,
    pub s3_export_location: S3ExportLocation,
}
