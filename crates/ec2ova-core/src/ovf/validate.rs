//! Cross-reference checks for an OVF envelope.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::ovf::model::{Envelope, ResourceType};

impl Envelope {
    /// Check that every reference inside the envelope resolves.
    ///
    /// - file ids and disk ids are unique
    /// - every disk references exactly one file and every file is used by exactly one disk
    /// - hardware instance ids run 1..=N in document order
    /// - there is exactly one IDE controller, and every disk item hangs off it at
    ///   addresses 0..disk_count
    /// - every disk item's host resource names a declared disk
    /// - network names are unique and every adapter connects to a declared network
    pub fn validate(&self) -> Result<()> {
        self.validate_references()?;
        self.validate_hardware()?;
        self.validate_networks()
    }

    fn validate_references(&self) -> Result<()> {
        let mut file_ids = HashSet::new();
        for file in &self.files {
            if !file_ids.insert(file.id.as_str()) {
                return Err(Error::ovf(format!("duplicate file id: {}", file.id)));
            }
        }

        let mut disk_ids = HashSet::new();
        let mut referenced = HashSet::new();
        for disk in &self.disks {
            if !disk_ids.insert(disk.disk_id.as_str()) {
                return Err(Error::ovf(format!("duplicate disk id: {}", disk.disk_id)));
            }
            if !file_ids.contains(disk.file_ref.as_str()) {
                return Err(Error::ovf(format!(
                    "disk {} references unknown file {}",
                    disk.disk_id, disk.file_ref
                )));
            }
            if !referenced.insert(disk.file_ref.as_str()) {
                return Err(Error::ovf(format!(
                    "file {} is referenced by more than one disk",
                    disk.file_ref
                )));
            }
        }

        if let Some(orphan) = self.files.iter().find(|f| !referenced.contains(f.id.as_str())) {
            return Err(Error::ovf(format!(
                "file {} is not referenced by any disk",
                orphan.id
            )));
        }

        Ok(())
    }

    fn validate_hardware(&self) -> Result<()> {
        let items = &self.virtual_system.hardware.items;

        for (index, item) in items.iter().enumerate() {
            let expected = index as u32 + 1;
            if item.instance_id != expected {
                return Err(Error::ovf(format!(
                    "hardware item '{}' has instance id {}, expected {}",
                    item.element_name, item.instance_id, expected
                )));
            }
        }

        let controllers: Vec<u32> = self
            .items_of(ResourceType::IdeController)
            .map(|item| item.instance_id)
            .collect();
        let controller_id = match controllers.as_slice() {
            [id] => *id,
            _ => {
                return Err(Error::ovf(format!(
                    "expected exactly one IDE controller, found {}",
                    controllers.len()
                )))
            }
        };

        let disk_items: Vec<_> = self.items_of(ResourceType::DiskDrive).collect();
        if disk_items.len() != self.disks.len() {
            return Err(Error::ovf(format!(
                "{} disk items for {} declared disks",
                disk_items.len(),
                self.disks.len()
            )));
        }

        for (position, item) in disk_items.iter().enumerate() {
            if item.parent != Some(controller_id) {
                return Err(Error::ovf(format!(
                    "disk item {} is not attached to controller {}",
                    item.instance_id, controller_id
                )));
            }
            if item.address_on_parent != Some(position as u32) {
                return Err(Error::ovf(format!(
                    "disk item {} has address {:?}, expected {}",
                    item.instance_id, item.address_on_parent, position
                )));
            }
            let disk_id = item
                .host_resource
                .as_deref()
                .and_then(|resource| resource.strip_prefix("ovf:/disk/"))
                .ok_or_else(|| {
                    Error::ovf(format!("disk item {} has no disk host resource", item.instance_id))
                })?;
            if self.disk(disk_id).is_none() {
                return Err(Error::ovf(format!(
                    "disk item {} references unknown disk {}",
                    item.instance_id, disk_id
                )));
            }
        }

        Ok(())
    }

    fn validate_networks(&self) -> Result<()> {
        let mut names = HashSet::new();
        for network in &self.networks {
            if !names.insert(network.name.as_str()) {
                return Err(Error::ovf(format!("duplicate network name: {}", network.name)));
            }
        }

        for item in self.items_of(ResourceType::EthernetAdapter) {
            match item.connection.as_deref() {
                Some(name) if names.contains(name) => {}
                Some(name) => {
                    return Err(Error::ovf(format!(
                        "adapter {} connects to undeclared network {}",
                        item.instance_id, name
                    )))
                }
                None => {
                    return Err(Error::ovf(format!(
                        "adapter {} has no connection",
                        item.instance_id
                    )))
                }
            }
        }

        Ok(())
    }
}
