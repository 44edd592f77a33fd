//! OVF XML parsing.
//!
//! Reads descriptors in the dialect produced by [`crate::ovf::to_xml`] back
//! into an [`Envelope`]. Elements and attributes are matched by local name,
//! so documents that bind the OVF namespace to a different prefix still parse.

use std::str::FromStr;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::ovf::model::{
    Envelope, FileReference, GuestOs, HardwareItem, Network, OperatingSystemSection, ResourceType,
    SystemSettings, VirtualDisk, VirtualHardwareSection, VirtualSystem,
};

/// Parse an OVF document into an [`Envelope`].
///
/// # Errors
///
/// Returns an OVF error if the XML is malformed, a required element or
/// attribute is missing, or a value cannot be interpreted.
pub fn parse_ovf(xml: &str) -> Result<Envelope> {
    let mut reader = Reader::from_str(xml);
    let mut parts = EnvelopeParts::default();
    let mut stack: Vec<String> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::ovf(format!(
                "malformed XML at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                parts.open(&name, &e)?;
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                parts.open(&name, &e)?;
                parts.close(&name)?;
            }
            Event::Text(e) => {
                if let [.., parent, leaf] = stack.as_slice() {
                    let text = e
                        .unescape()
                        .map_err(|err| Error::ovf(format!("bad text in <{}>: {}", leaf, err)))?;
                    parts.text(parent, leaf, text.into_owned())?;
                }
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    parts.close(&name)?;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    parts.finish()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Find an attribute by local name (`ovf:id` matches `id`).
fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr: Attribute<'_> = attr.map_err(|err| {
            Error::ovf(format!("bad attribute on <{}>: {}", local_name(e), err))
        })?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| Error::ovf(format!("bad value for {}: {}", name, err)))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attribute(e: &BytesStart<'_>, name: &str) -> Result<String> {
    attribute(e, name)?.ok_or_else(|| {
        Error::ovf(format!("<{}> is missing attribute {}", local_name(e), name))
    })
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ovf(format!("invalid {}: '{}'", field, value)))
}

fn required<T>(value: Option<T>, what: &str) -> Result<T> {
    value.ok_or_else(|| Error::ovf(format!("missing {}", what)))
}

/// Fields of a hardware item collected while its element is open.
#[derive(Debug, Default)]
struct ItemFields {
    address: Option<String>,
    address_on_parent: Option<u32>,
    allocation_units: Option<String>,
    automatic_allocation: Option<bool>,
    connection: Option<String>,
    description: Option<String>,
    element_name: Option<String>,
    host_resource: Option<String>,
    instance_id: Option<u32>,
    parent: Option<u32>,
    resource_sub_type: Option<String>,
    resource_type: Option<ResourceType>,
    virtual_quantity: Option<u64>,
}

impl ItemFields {
    fn set(&mut self, field: &str, value: String) -> Result<()> {
        match field {
            "Address" => self.address = Some(value),
            "AddressOnParent" => self.address_on_parent = Some(parse_number(field, &value)?),
            "AllocationUnits" => self.allocation_units = Some(value),
            "AutomaticAllocation" => {
                self.automatic_allocation = Some(parse_number(field, &value)?)
            }
            "Connection" => self.connection = Some(value),
            "Description" => self.description = Some(value),
            "ElementName" => self.element_name = Some(value),
            "HostResource" => self.host_resource = Some(value),
            "InstanceID" => self.instance_id = Some(parse_number(field, &value)?),
            "Parent" => self.parent = Some(parse_number(field, &value)?),
            "ResourceSubType" => self.resource_sub_type = Some(value),
            "ResourceType" => {
                self.resource_type = Some(ResourceType::from_code(parse_number(field, &value)?)?)
            }
            "VirtualQuantity" => self.virtual_quantity = Some(parse_number(field, &value)?),
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<HardwareItem> {
        Ok(HardwareItem {
            address: self.address,
            address_on_parent: self.address_on_parent,
            allocation_units: self.allocation_units,
            automatic_allocation: self.automatic_allocation,
            connection: self.connection,
            description: self.description,
            element_name: required(self.element_name, "Item ElementName")?,
            host_resource: self.host_resource,
            instance_id: required(self.instance_id, "Item InstanceID")?,
            parent: self.parent,
            resource_sub_type: self.resource_sub_type,
            resource_type: required(self.resource_type, "Item ResourceType")?,
            virtual_quantity: self.virtual_quantity,
        })
    }
}

#[derive(Debug, Default)]
struct SystemFields {
    element_name: Option<String>,
    instance_id: Option<u32>,
    virtual_system_identifier: Option<String>,
    virtual_system_type: Option<String>,
}

/// Everything collected so far, assembled into an envelope at the end.
#[derive(Debug, Default)]
struct EnvelopeParts {
    saw_envelope: bool,
    files: Vec<FileReference>,
    disks: Vec<VirtualDisk>,
    networks: Vec<Network>,
    system_id: Option<String>,
    name: Option<String>,
    os_id: Option<u32>,
    guest_os: Option<GuestOs>,
    os_description: String,
    system: SystemFields,
    items: Vec<HardwareItem>,
    current_item: Option<ItemFields>,
}

impl EnvelopeParts {
    fn open(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        match name {
            "Envelope" => self.saw_envelope = true,
            "File" => {
                let size = required_attribute(e, "size")?;
                self.files.push(FileReference {
                    id: required_attribute(e, "id")?,
                    href: required_attribute(e, "href")?,
                    size: parse_number("file size", &size)?,
                });
            }
            "Disk" => {
                let capacity = required_attribute(e, "capacity")?;
                self.disks.push(VirtualDisk {
                    disk_id: required_attribute(e, "diskId")?,
                    capacity: parse_number("disk capacity", &capacity)?,
                    file_ref: required_attribute(e, "fileRef")?,
                });
            }
            "Network" => self.networks.push(Network {
                name: required_attribute(e, "name")?,
                description: String::new(),
            }),
            "VirtualSystem" => self.system_id = Some(required_attribute(e, "id")?),
            "OperatingSystemSection" => {
                let id = required_attribute(e, "id")?;
                self.os_id = Some(parse_number("operating system id", &id)?);
                let os_type = attribute(e, "osType")?.unwrap_or_default();
                self.guest_os = Some(GuestOs::from_os_type(&os_type)?);
            }
            "Item" => self.current_item = Some(ItemFields::default()),
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        if name == "Item" {
            let item = required(self.current_item.take(), "Item start")?;
            self.items.push(item.finish()?);
        }
        Ok(())
    }

    fn text(&mut self, parent: &str, leaf: &str, value: String) -> Result<()> {
        match (parent, leaf) {
            ("Item", field) => {
                if let Some(item) = self.current_item.as_mut() {
                    item.set(field, value)?;
                }
            }
            ("System", "ElementName") => self.system.element_name = Some(value),
            ("System", "InstanceID") => {
                self.system.instance_id = Some(parse_number("System InstanceID", &value)?)
            }
            ("System", "VirtualSystemIdentifier") => {
                self.system.virtual_system_identifier = Some(value)
            }
            ("System", "VirtualSystemType") => self.system.virtual_system_type = Some(value),
            ("VirtualSystem", "Name") => self.name = Some(value),
            ("OperatingSystemSection", "Description") => self.os_description = value,
            ("Network", "Description") => {
                if let Some(network) = self.networks.last_mut() {
                    network.description = value;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Envelope> {
        if !self.saw_envelope {
            return Err(Error::ovf("document has no Envelope element"));
        }

        Ok(Envelope {
            files: self.files,
            disks: self.disks,
            networks: self.networks,
            virtual_system: VirtualSystem {
                id: required(self.system_id, "VirtualSystem")?,
                name: self.name.unwrap_or_default(),
                operating_system: OperatingSystemSection {
                    id: required(self.os_id, "OperatingSystemSection")?,
                    guest_os: required(self.guest_os, "guest OS type")?,
                    description: self.os_description,
                },
                hardware: VirtualHardwareSection {
                    system: SystemSettings {
                        element_name: required(self.system.element_name, "System ElementName")?,
                        instance_id: required(self.system.instance_id, "System InstanceID")?,
                        virtual_system_identifier: required(
                            self.system.virtual_system_identifier,
                            "VirtualSystemIdentifier",
                        )?,
                        virtual_system_type: required(
                            self.system.virtual_system_type,
                            "VirtualSystemType",
                        )?,
                    },
                    items: self.items,
                },
            },
        })
    }
}
