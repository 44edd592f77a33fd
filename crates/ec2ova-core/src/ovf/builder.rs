//! Builds an OVF envelope from instance, instance type, and image metadata.
//!
//! Construction is a single fold: an [`Assembly`] accumulator is moved
//! through each emission step (CPU, memory, controller, disks, networks)
//! and carries the next hardware instance id with it.

use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::{
    BlockDeviceMapping, EbsBlockDevice, Image, Instance, InstanceTypeInfo, NetworkInterface,
};
use crate::ovf::model::{
    Envelope, FileReference, GuestOs, HardwareItem, Network, OperatingSystemSection, ResourceType,
    SystemSettings, VirtualDisk, VirtualHardwareSection, VirtualSystem, OS_SECTION_ID,
    VIRTUAL_SYSTEM_TYPE,
};
use crate::ovf::writer::to_xml;

/// Bytes per GiB.
const GIB: u64 = 1024 * 1024 * 1024;

/// Result of building an envelope.
#[derive(Debug, Clone)]
pub struct OvfBuild {
    pub envelope: Envelope,
    /// Device names of block-device mappings skipped for lacking EBS backing.
    pub skipped_devices: Vec<String>,
}

impl OvfBuild {
    /// Validate the envelope and serialize it to XML.
    pub fn to_xml(&self) -> Result<String> {
        self.envelope.validate()?;
        to_xml(&self.envelope)
    }
}

/// Accumulated sections, threaded through each build step.
#[derive(Debug, Default)]
struct Assembly {
    files: Vec<FileReference>,
    disks: Vec<VirtualDisk>,
    networks: Vec<Network>,
    items: Vec<HardwareItem>,
    last_instance_id: u32,
    skipped_devices: Vec<String>,
}

impl Assembly {
    /// Append a hardware item built around the next instance id.
    fn emit(mut self, make: impl FnOnce(u32) -> HardwareItem) -> Self {
        self.last_instance_id += 1;
        self.items.push(make(self.last_instance_id));
        self
    }

    fn with_cpu(self, cores: u32) -> Self {
        self.emit(|id| HardwareItem {
            allocation_units: Some("hertz * 10^6".to_string()),
            description: Some("Number of Virtual CPUs".to_string()),
            virtual_quantity: Some(u64::from(cores)),
            ..HardwareItem::new(id, ResourceType::Processor, format!("{} virtual CPU(s)", cores))
        })
    }

    fn with_memory(self, mib: u64) -> Self {
        self.emit(|id| HardwareItem {
            allocation_units: Some("byte * 2^20".to_string()),
            description: Some("Memory Size".to_string()),
            virtual_quantity: Some(mib),
            ..HardwareItem::new(id, ResourceType::Memory, format!("{}MB of memory", mib))
        })
    }

    fn with_ide_controller(self) -> Self {
        self.emit(|id| HardwareItem {
            address: Some("0".to_string()),
            description: Some("IDE Controller".to_string()),
            ..HardwareItem::new(id, ResourceType::IdeController, "VirtualIDEController 0")
        })
    }

    fn with_disk(
        mut self,
        task_id: &str,
        mapping: &BlockDeviceMapping,
        ebs: &EbsBlockDevice,
        controller_id: u32,
    ) -> Result<Self> {
        let position = self.disks.len();
        let number = position + 1;
        let capacity = ebs.volume_size.checked_mul(GIB).ok_or_else(|| {
            Error::metadata(format!(
                "volume size of {} GiB on {} is too large",
                ebs.volume_size, mapping.device_name
            ))
        })?;

        let file_id = format!("file{}", number);
        let disk_id = format!("vmdisk{}", number);

        self.files.push(FileReference {
            id: file_id.clone(),
            href: format!("{}-dev-{}.raw", task_id, mapping.device_base_name()),
            size: capacity,
        });
        self.disks.push(VirtualDisk {
            disk_id: disk_id.clone(),
            capacity,
            file_ref: file_id,
        });

        Ok(self.emit(|id| HardwareItem {
            address_on_parent: Some(position as u32),
            host_resource: Some(format!("ovf:/disk/{}", disk_id)),
            parent: Some(controller_id),
            ..HardwareItem::new(id, ResourceType::DiskDrive, format!("Hard Disk {}", number))
        }))
    }

    fn with_skipped(mut self, mapping: &BlockDeviceMapping) -> Self {
        self.skipped_devices.push(mapping.device_name.clone());
        self
    }

    fn with_network(mut self, index: usize, interface: &NetworkInterface) -> Self {
        let name = interface
            .subnet_id
            .clone()
            .filter(|subnet| !subnet.is_empty())
            .unwrap_or_else(|| format!("VM Network {}", index));

        // Interfaces sharing a subnet connect to one declared network.
        if !self.networks.iter().any(|network| network.name == name) {
            self.networks.push(Network {
                name: name.clone(),
                description: format!("Network interface {}", index),
            });
        }

        self.emit(|id| HardwareItem {
            automatic_allocation: Some(true),
            connection: Some(name.clone()),
            description: Some(format!("E1000 ethernet adapter on \"{}\"", name)),
            resource_sub_type: Some("E1000".to_string()),
            ..HardwareItem::new(id, ResourceType::EthernetAdapter, format!("Ethernet {}", index))
        })
    }
}

/// Build the OVF envelope for an exported instance.
///
/// # Arguments
///
/// * `task_id` - Export task id, used to name the raw disk files.
/// * `instance` - The instance the image was taken from.
/// * `instance_type` - Capacity of the instance's type.
/// * `image` - The exported image.
///
/// # Errors
///
/// Returns an error only if a volume size cannot be expressed in bytes.
pub fn build_envelope(
    task_id: &str,
    instance: &Instance,
    instance_type: &InstanceTypeInfo,
    image: &Image,
) -> Result<OvfBuild> {
    let system_id = format!("export-{}", instance.instance_id);

    let assembly = Assembly::default()
        .with_cpu(instance.cpu_options.core_count)
        .with_memory(instance_type.memory_info.size_in_mib)
        .with_ide_controller();
    let controller_id = assembly.last_instance_id;

    let assembly = image
        .block_device_mappings
        .iter()
        .try_fold(assembly, |acc, mapping| match &mapping.ebs {
            Some(ebs) => acc.with_disk(task_id, mapping, ebs, controller_id),
            None => Ok(acc.with_skipped(mapping)),
        })?;

    let assembly = instance
        .network_interfaces
        .iter()
        .enumerate()
        .fold(assembly, |acc, (i, interface)| acc.with_network(i + 1, interface));

    let guest_os = GuestOs::from_platform(image.platform_details.as_deref());

    debug!(
        task_id,
        instance_id = %instance.instance_id,
        disks = assembly.disks.len(),
        networks = assembly.networks.len(),
        items = assembly.items.len(),
        guest_os = %guest_os,
        "built OVF envelope"
    );

    let envelope = Envelope {
        files: assembly.files,
        disks: assembly.disks,
        networks: assembly.networks,
        virtual_system: VirtualSystem {
            id: system_id.clone(),
            name: instance.display_name().to_string(),
            operating_system: OperatingSystemSection {
                id: OS_SECTION_ID,
                guest_os,
                description: image.description.clone().unwrap_or_default(),
            },
            hardware: VirtualHardwareSection {
                system: SystemSettings {
                    element_name: "Virtual Hardware Family".to_string(),
                    instance_id: 0,
                    virtual_system_identifier: system_id,
                    virtual_system_type: VIRTUAL_SYSTEM_TYPE.to_string(),
                },
                items: assembly.items,
            },
        },
    };

    Ok(OvfBuild {
        envelope,
        skipped_devices: assembly.skipped_devices,
    })
}

/// Build, validate, and serialize the OVF descriptor in one step.
pub fn format_ovf(
    task_id: &str,
    instance: &Instance,
    instance_type: &InstanceTypeInfo,
    image: &Image,
) -> Result<String> {
    build_envelope(task_id, instance, instance_type, image)?.to_xml()
}
