//! OVF descriptor generation.
//!
//! This module builds OVF (Open Virtualization Format) envelopes from EC2
//! export metadata, checks their internal cross-references, and converts
//! them to and from XML.

pub mod builder;
pub mod model;
pub mod reader;
pub mod validate;
pub mod writer;

pub use builder::{build_envelope, format_ovf, OvfBuild};
pub use model::{
    Envelope, FileReference, GuestOs, HardwareItem, Network, OperatingSystemSection,
    ResourceType, SystemSettings, VirtualDisk, VirtualHardwareSection, VirtualSystem,
};
pub use reader::parse_ovf;
pub use writer::{to_xml, XML_DECLARATION};
