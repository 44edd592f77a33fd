//! In-memory OVF envelope.
//!
//! Only the parts of the tree that vary between documents are modeled.
//! Fixed strings (section `Info` text, namespace URIs, the disk format URI)
//! live in the writer.

use std::fmt;

use crate::error::{Error, Result};

/// CIM operating system id emitted in the `OperatingSystemSection`.
pub const OS_SECTION_ID: u32 = 94;

/// Virtual system type recorded in the hardware `System` block.
pub const VIRTUAL_SYSTEM_TYPE: &str = "vmx-07";

/// CIM resource allocation types used by the hardware section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Processor,
    Memory,
    IdeController,
    EthernetAdapter,
    DiskDrive,
}

impl ResourceType {
    /// The numeric `rasd:ResourceType` code.
    pub fn code(self) -> u32 {
        match self {
            ResourceType::Processor => 3,
            ResourceType::Memory => 4,
            ResourceType::IdeController => 5,
            ResourceType::EthernetAdapter => 10,
            ResourceType::DiskDrive => 17,
        }
    }

    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            3 => Ok(ResourceType::Processor),
            4 => Ok(ResourceType::Memory),
            5 => Ok(ResourceType::IdeController),
            10 => Ok(ResourceType::EthernetAdapter),
            17 => Ok(ResourceType::DiskDrive),
            _ => Err(Error::ovf(format!("unsupported resource type: {}", code))),
        }
    }
}

/// Guest operating system classification understood by VMware importers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestOs {
    Windows,
    RedHat,
    OtherLinux64,
}

impl GuestOs {
    /// Classify an image platform label.
    ///
    /// Anything that is not exactly "Windows" or "Red Hat Enterprise Linux",
    /// including a missing label, is treated as generic 64-bit Linux.
    pub fn from_platform(platform: Option<&str>) -> Self {
        match platform {
            Some("Windows") => GuestOs::Windows,
            Some("Red Hat Enterprise Linux") => GuestOs::RedHat,
            _ => GuestOs::OtherLinux64,
        }
    }

    /// The `vmw:osType` identifier.
    pub fn os_type(self) -> &'static str {
        match self {
            GuestOs::Windows => "windows9_64Guest",
            GuestOs::RedHat => "rhel8_64Guest",
            GuestOs::OtherLinux64 => "otherLinux64Guest",
        }
    }

    pub fn from_os_type(os_type: &str) -> Result<Self> {
        match os_type {
            "windows9_64Guest" => Ok(GuestOs::Windows),
            "rhel8_64Guest" => Ok(GuestOs::RedHat),
            "otherLinux64Guest" => Ok(GuestOs::OtherLinux64),
            _ => Err(Error::ovf(format!("unknown guest OS type: {}", os_type))),
        }
    }
}

impl fmt::Display for GuestOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.os_type())
    }
}

/// An entry of the `References` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub id: String,
    pub href: String,
    /// Size in bytes.
    pub size: u64,
}

/// An entry of the `DiskSection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDisk {
    pub disk_id: String,
    /// Capacity in bytes.
    pub capacity: u64,
    /// Id of the [`FileReference`] holding the disk contents.
    pub file_ref: String,
}

/// An entry of the `NetworkSection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub description: String,
}

/// One `Item` of the `VirtualHardwareSection`.
///
/// Optional fields are emitted only when set, in CIM schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareItem {
    pub address: Option<String>,
    pub address_on_parent: Option<u32>,
    pub allocation_units: Option<String>,
    pub automatic_allocation: Option<bool>,
    pub connection: Option<String>,
    pub description: Option<String>,
    pub element_name: String,
    pub host_resource: Option<String>,
    pub instance_id: u32,
    pub parent: Option<u32>,
    pub resource_sub_type: Option<String>,
    pub resource_type: ResourceType,
    pub virtual_quantity: Option<u64>,
}

impl HardwareItem {
    /// An item with only the required fields set.
    pub fn new(
        instance_id: u32,
        resource_type: ResourceType,
        element_name: impl Into<String>,
    ) -> Self {
        Self {
            address: None,
            address_on_parent: None,
            allocation_units: None,
            automatic_allocation: None,
            connection: None,
            description: None,
            element_name: element_name.into(),
            host_resource: None,
            instance_id,
            parent: None,
            resource_sub_type: None,
            resource_type,
            virtual_quantity: None,
        }
    }
}

/// The `System` block of the hardware section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSettings {
    pub element_name: String,
    pub instance_id: u32,
    pub virtual_system_identifier: String,
    pub virtual_system_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualHardwareSection {
    pub system: SystemSettings,
    pub items: Vec<HardwareItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatingSystemSection {
    /// CIM operating system id.
    pub id: u32,
    pub guest_os: GuestOs,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSystem {
    pub id: String,
    pub name: String,
    pub operating_system: OperatingSystemSection,
    pub hardware: VirtualHardwareSection,
}

/// The OVF root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub files: Vec<FileReference>,
    pub disks: Vec<VirtualDisk>,
    pub networks: Vec<Network>,
    pub virtual_system: VirtualSystem,
}

impl Envelope {
    /// Hardware items of the given resource type, in document order.
    pub fn items_of(&self, resource_type: ResourceType) -> impl Iterator<Item = &HardwareItem> {
        self.virtual_system
            .hardware
            .items
            .iter()
            .filter(move |item| item.resource_type == resource_type)
    }

    /// Looks up a file reference by id.
    pub fn file(&self, id: &str) -> Option<&FileReference> {
        self.files.iter().find(|file| file.id == id)
    }

    /// Looks up a disk by id.
    pub fn disk(&self, disk_id: &str) -> Option<&VirtualDisk> {
        self.disks.iter().find(|disk| disk.disk_id == disk_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_codes() {
        for rt in [
            ResourceType::Processor,
            ResourceType::Memory,
            ResourceType::IdeController,
            ResourceType::EthernetAdapter,
            ResourceType::DiskDrive,
        ] {
            assert_eq!(ResourceType::from_code(rt.code()).unwrap(), rt);
        }
        assert!(ResourceType::from_code(6).is_err());
    }

    #[test]
    fn test_guest_os_from_platform() {
        assert_eq!(GuestOs::from_platform(Some("Windows")), GuestOs::Windows);
        assert_eq!(
            GuestOs::from_platform(Some("Red Hat Enterprise Linux")),
            GuestOs::RedHat
        );
        assert_eq!(
            GuestOs::from_platform(Some("Linux/UNIX")),
            GuestOs::OtherLinux64
        );
        assert_eq!(
            GuestOs::from_platform(Some("Windows with SQL Server Standard")),
            GuestOs::OtherLinux64
        );
        assert_eq!(GuestOs::from_platform(None), GuestOs::OtherLinux64);
    }

    #[test]
    fn test_guest_os_type_strings() {
        assert_eq!(GuestOs::Windows.os_type(), "windows9_64Guest");
        assert_eq!(GuestOs::RedHat.os_type(), "rhel8_64Guest");
        assert_eq!(GuestOs::OtherLinux64.to_string(), "otherLinux64Guest");
        assert_eq!(
            GuestOs::from_os_type("rhel8_64Guest").unwrap(),
            GuestOs::RedHat
        );
        assert!(GuestOs::from_os_type("ubuntu64Guest").is_err());
    }
}
