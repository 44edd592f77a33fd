//! OVF XML serialization.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{Error, Result};
use crate::ovf::model::{Envelope, HardwareItem, SystemSettings};

/// XML declaration placed on the first line of every descriptor.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub const OVF_NAMESPACE: &str = "http://schemas.dmtf.org/ovf/envelope/1";
pub const CIM_NAMESPACE: &str = "http://schemas.dmtf.org/wbem/wscim/1/common";
pub const RASD_NAMESPACE: &str =
    "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/CIM_ResourceAllocationSettingData";
pub const VMW_NAMESPACE: &str = "http://www.vmware.com/schema/ovf";
pub const VSSD_NAMESPACE: &str =
    "http://schemas.dmtf.org/wbem/wscim/1/cim-schema/2/CIM_VirtualSystemSettingData";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Format URI declared for every disk.
pub const DISK_FORMAT: &str =
    "http://www.vmware.com/interfaces/specifications/vmdk.html#streamOptimized";

/// Serialize an envelope to an indented OVF document.
///
/// The envelope is written as-is; call [`Envelope::validate`] first when the
/// tree did not come from the builder.
pub fn to_xml(envelope: &Envelope) -> Result<String> {
    let mut out = XmlOut::new();

    out.start(
        "Envelope",
        &[
            ("xmlns", OVF_NAMESPACE),
            ("xmlns:cim", CIM_NAMESPACE),
            ("xmlns:ovf", OVF_NAMESPACE),
            ("xmlns:rasd", RASD_NAMESPACE),
            ("xmlns:vmw", VMW_NAMESPACE),
            ("xmlns:vssd", VSSD_NAMESPACE),
            ("xmlns:xsi", XSI_NAMESPACE),
        ],
    )?;

    out.start("References", &[])?;
    for file in &envelope.files {
        let size = file.size.to_string();
        out.empty(
            "File",
            &[
                ("ovf:href", file.href.as_str()),
                ("ovf:id", file.id.as_str()),
                ("ovf:size", size.as_str()),
            ],
        )?;
    }
    out.end("References")?;

    out.start("DiskSection", &[])?;
    out.text("Info", "List of the virtual disks")?;
    for disk in &envelope.disks {
        let capacity = disk.capacity.to_string();
        out.empty(
            "Disk",
            &[
                ("ovf:capacity", capacity.as_str()),
                ("ovf:capacityAllocationUnits", "byte"),
                ("ovf:diskId", disk.disk_id.as_str()),
                ("ovf:fileRef", disk.file_ref.as_str()),
                ("ovf:format", DISK_FORMAT),
            ],
        )?;
    }
    out.end("DiskSection")?;

    out.start("NetworkSection", &[])?;
    out.text("Info", "The list of logical networks")?;
    for network in &envelope.networks {
        out.start("Network", &[("ovf:name", network.name.as_str())])?;
        out.text("Description", &network.description)?;
        out.end("Network")?;
    }
    out.end("NetworkSection")?;

    let system = &envelope.virtual_system;
    out.start("VirtualSystem", &[("ovf:id", system.id.as_str())])?;
    out.text("Info", "A virtual machine")?;
    out.text("Name", &system.name)?;

    let os = &system.operating_system;
    let os_id = os.id.to_string();
    out.start(
        "OperatingSystemSection",
        &[("ovf:id", os_id.as_str()), ("vmw:osType", os.guest_os.os_type())],
    )?;
    out.text("Info", "The kind of installed guest operating system")?;
    out.text("Description", &os.description)?;
    out.end("OperatingSystemSection")?;

    out.start("VirtualHardwareSection", &[])?;
    out.text("Info", "Virtual hardware requirements")?;
    write_system(&mut out, &system.hardware.system)?;
    for item in &system.hardware.items {
        write_item(&mut out, item)?;
    }
    out.end("VirtualHardwareSection")?;

    out.end("VirtualSystem")?;
    out.end("Envelope")?;

    out.finish()
}

fn write_system(out: &mut XmlOut, system: &SystemSettings) -> Result<()> {
    out.start("System", &[])?;
    out.text("vssd:ElementName", &system.element_name)?;
    out.text("vssd:InstanceID", &system.instance_id.to_string())?;
    out.text("vssd:VirtualSystemIdentifier", &system.virtual_system_identifier)?;
    out.text("vssd:VirtualSystemType", &system.virtual_system_type)?;
    out.end("System")
}

fn write_item(out: &mut XmlOut, item: &HardwareItem) -> Result<()> {
    out.start("Item", &[])?;
    out.optional("rasd:Address", item.address.as_deref())?;
    out.optional(
        "rasd:AddressOnParent",
        item.address_on_parent.map(|a| a.to_string()).as_deref(),
    )?;
    out.optional("rasd:AllocationUnits", item.allocation_units.as_deref())?;
    out.optional(
        "rasd:AutomaticAllocation",
        item.automatic_allocation.map(|a| a.to_string()).as_deref(),
    )?;
    out.optional("rasd:Connection", item.connection.as_deref())?;
    out.optional("rasd:Description", item.description.as_deref())?;
    out.text("rasd:ElementName", &item.element_name)?;
    out.optional("rasd:HostResource", item.host_resource.as_deref())?;
    out.text("rasd:InstanceID", &item.instance_id.to_string())?;
    out.optional("rasd:Parent", item.parent.map(|p| p.to_string()).as_deref())?;
    out.optional("rasd:ResourceSubType", item.resource_sub_type.as_deref())?;
    out.text("rasd:ResourceType", &item.resource_type.code().to_string())?;
    out.optional(
        "rasd:VirtualQuantity",
        item.virtual_quantity.map(|q| q.to_string()).as_deref(),
    )?;
    out.end("Item")
}

/// Thin wrapper over the quick-xml writer that maps errors into [`Error::Ovf`].
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| Error::ovf(format!("failed to write XML: {}", e)))
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.write(Event::Start(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
        self.write(Event::Empty(
            BytesStart::new(name).with_attributes(attrs.iter().copied()),
        ))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write `<name>value</name>`, or `<name/>` when the value is empty.
    fn text(&mut self, name: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.empty(name, &[]);
        }
        self.start(name, &[])?;
        self.write(Event::Text(BytesText::new(value)))?;
        self.end(name)
    }

    fn optional(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.text(name, value),
            None => Ok(()),
        }
    }

    fn finish(self) -> Result<String> {
        let body = String::from_utf8(self.writer.into_inner())
            .map_err(|e| Error::ovf(format!("serialized XML is not UTF-8: {}", e)))?;
        Ok(format!("{}\n{}\n", XML_DECLARATION, body))
    }
}
