//! Integration tests for OVF descriptor generation.

use ec2ova_core::metadata::{
    BlockDeviceMapping, CpuOptions, EbsBlockDevice, Image, Instance, InstanceTypeInfo, MemoryInfo,
    NetworkInterface, Tag,
};
use ec2ova_core::ovf::{build_envelope, format_ovf, parse_ovf, GuestOs, ResourceType};
use std::collections::HashMap;

const TASK_ID: &str = "export-ami-1545f5ce7236bf35t";
const GIB: u64 = 1024 * 1024 * 1024;

/// Create a test instance with the given subnets and tags.
fn create_test_instance(subnets: &[Option<&str>], tags: &[(&str, &str)]) -> Instance {
    Instance {
        instance_id: "i-0123456789abcdef0".to_string(),
        instance_type: "t3.medium".to_string(),
        cpu_options: CpuOptions {
            core_count: 2,
            threads_per_core: Some(2),
        },
        network_interfaces: subnets
            .iter()
            .map(|subnet| NetworkInterface {
                network_interface_id: None,
                subnet_id: subnet.map(str::to_string),
            })
            .collect(),
        tags: tags
            .iter()
            .map(|(key, value)| Tag {
                key: key.to_string(),
                value: value.to_string(),
            })
            .collect(),
    }
}

fn create_test_instance_type() -> InstanceTypeInfo {
    InstanceTypeInfo {
        instance_type: "t3.medium".to_string(),
        memory_info: MemoryInfo { size_in_mib: 4096 },
    }
}

/// Create a test image. `None` sizes are instance-store mappings.
fn create_test_image(platform: Option<&str>, devices: &[(&str, Option<u64>)]) -> Image {
    Image {
        image_id: "ami-0123".to_string(),
        source_instance_id: Some("i-0123456789abcdef0".to_string()),
        platform_details: platform.map(str::to_string),
        description: Some("exported image".to_string()),
        block_device_mappings: devices
            .iter()
            .map(|(device, size)| BlockDeviceMapping {
                device_name: device.to_string(),
                ebs: size.map(|volume_size| EbsBlockDevice {
                    volume_size,
                    snapshot_id: None,
                    volume_type: None,
                }),
                virtual_name: if size.is_none() {
                    Some("ephemeral0".to_string())
                } else {
                    None
                },
            })
            .collect(),
    }
}

/// A mixed document: three mappings (one instance store), three interfaces.
fn create_mixed_ovf() -> String {
    format_ovf(
        TASK_ID,
        &create_test_instance(&[Some("subnet-a"), None, Some("subnet-c")], &[]),
        &create_test_instance_type(),
        &create_test_image(
            None,
            &[("/dev/sda1", Some(8)), ("/dev/sdb", None), ("/dev/sdc", Some(20))],
        ),
    )
    .expect("Failed to build OVF")
}

#[test]
fn test_end_to_end_scenario() {
    let instance = create_test_instance(&[Some("subnet-abc")], &[]);
    let image = create_test_image(None, &[("/dev/sda1", Some(8))]);

    let ovf = format_ovf(TASK_ID, &instance, &create_test_instance_type(), &image)
        .expect("Failed to build OVF");
    let env = parse_ovf(&ovf).expect("Failed to parse OVF");

    let items = &env.virtual_system.hardware.items;
    assert_eq!(items.len(), 5);
    assert_eq!(items[0].resource_type, ResourceType::Processor);
    assert_eq!(items[0].virtual_quantity, Some(2));
    assert_eq!(items[1].resource_type, ResourceType::Memory);
    assert_eq!(items[1].virtual_quantity, Some(4096));
    assert_eq!(items[2].resource_type, ResourceType::IdeController);
    assert_eq!(items[3].resource_type, ResourceType::DiskDrive);
    assert_eq!(items[4].resource_type, ResourceType::EthernetAdapter);

    assert_eq!(env.files.len(), 1);
    assert_eq!(env.files[0].href, format!("{}-dev-sda1.raw", TASK_ID));

    assert_eq!(env.disks.len(), 1);
    assert_eq!(env.disks[0].capacity, 8 * GIB);
    assert_eq!(env.disks[0].file_ref, env.files[0].id);

    assert_eq!(env.networks.len(), 1);
    assert_eq!(env.networks[0].name, "subnet-abc");
    assert_eq!(items[4].connection.as_deref(), Some("subnet-abc"));

    assert_eq!(
        env.virtual_system.operating_system.guest_os,
        GuestOs::OtherLinux64
    );
    assert!(ovf.contains("vmw:osType=\"otherLinux64Guest\""));
}

#[test]
fn test_xml_declaration_and_namespaces() {
    let ovf = create_mixed_ovf();

    assert!(
        ovf.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Envelope "),
        "OVF should start with XML declaration followed by the Envelope"
    );
    assert!(ovf.contains("xmlns=\"http://schemas.dmtf.org/ovf/envelope/1\""));
    assert!(ovf.contains("xmlns:ovf=\"http://schemas.dmtf.org/ovf/envelope/1\""));
    assert!(ovf.contains("xmlns:cim=\"http://schemas.dmtf.org/wbem/wscim/1/common\""));
    assert!(ovf.contains("xmlns:rasd="));
    assert!(ovf.contains("xmlns:vssd="));
    assert!(ovf.contains("xmlns:vmw=\"http://www.vmware.com/schema/ovf\""));
    assert!(ovf.contains("xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\""));
    assert!(ovf.trim_end().ends_with("</Envelope>"));
}

#[test]
fn test_instance_ids_are_contiguous() {
    let env = parse_ovf(&create_mixed_ovf()).expect("Failed to parse OVF");

    let ids: Vec<u32> = env
        .virtual_system
        .hardware
        .items
        .iter()
        .map(|item| item.instance_id)
        .collect();
    let expected: Vec<u32> = (1..=ids.len() as u32).collect();
    assert_eq!(ids, expected);

    let types: Vec<ResourceType> = env
        .virtual_system
        .hardware
        .items
        .iter()
        .map(|item| item.resource_type)
        .collect();
    assert_eq!(
        types,
        vec![
            ResourceType::Processor,
            ResourceType::Memory,
            ResourceType::IdeController,
            ResourceType::DiskDrive,
            ResourceType::DiskDrive,
            ResourceType::EthernetAdapter,
            ResourceType::EthernetAdapter,
            ResourceType::EthernetAdapter,
        ]
    );
}

#[test]
fn test_file_references_are_one_to_one() {
    let env = parse_ovf(&create_mixed_ovf()).expect("Failed to parse OVF");

    assert_eq!(env.files.len(), 2, "instance-store mapping must be skipped");
    assert_eq!(env.disks.len(), 2);

    let mut uses: HashMap<&str, usize> = env.files.iter().map(|f| (f.id.as_str(), 0)).collect();
    for disk in &env.disks {
        *uses
            .get_mut(disk.file_ref.as_str())
            .expect("disk references an unknown file") += 1;
    }
    assert!(uses.values().all(|&count| count == 1));

    let hrefs: Vec<&str> = env.files.iter().map(|f| f.href.as_str()).collect();
    assert_eq!(
        hrefs,
        vec![
            format!("{}-dev-sda1.raw", TASK_ID),
            format!("{}-dev-sdc.raw", TASK_ID)
        ]
    );
}

#[test]
fn test_disk_items_hang_off_controller() {
    let env = parse_ovf(&create_mixed_ovf()).expect("Failed to parse OVF");

    let controller = env
        .items_of(ResourceType::IdeController)
        .next()
        .expect("missing IDE controller");
    assert_eq!(env.items_of(ResourceType::IdeController).count(), 1);

    let disks: Vec<_> = env.items_of(ResourceType::DiskDrive).collect();
    for (position, item) in disks.iter().enumerate() {
        assert_eq!(item.parent, Some(controller.instance_id));
        assert_eq!(item.address_on_parent, Some(position as u32));
        let disk_id = item
            .host_resource
            .as_deref()
            .and_then(|r| r.strip_prefix("ovf:/disk/"))
            .expect("disk item without host resource");
        assert!(env.disk(disk_id).is_some());
    }
}

#[test]
fn test_byte_capacity() {
    let ovf = format_ovf(
        TASK_ID,
        &create_test_instance(&[], &[]),
        &create_test_instance_type(),
        &create_test_image(None, &[("/dev/xvda", Some(20))]),
    )
    .expect("Failed to build OVF");

    let capacity = 20 * GIB;
    assert_eq!(capacity, 21_474_836_480);
    assert!(ovf.contains(&format!("ovf:capacity=\"{}\"", capacity)));
    assert!(ovf.contains(&format!("ovf:size=\"{}\"", capacity)));
    assert!(ovf.contains("ovf:capacityAllocationUnits=\"byte\""));
    assert!(ovf.contains("vmdk.html#streamOptimized"));
}

#[test]
fn test_guest_os_mapping() {
    let cases = [
        (Some("Windows"), "windows9_64Guest"),
        (Some("Red Hat Enterprise Linux"), "rhel8_64Guest"),
        (Some("Linux/UNIX"), "otherLinux64Guest"),
        (Some("SUSE Linux"), "otherLinux64Guest"),
        (None, "otherLinux64Guest"),
    ];

    for (platform, expected) in cases {
        let ovf = format_ovf(
            TASK_ID,
            &create_test_instance(&[], &[]),
            &create_test_instance_type(),
            &create_test_image(platform, &[]),
        )
        .expect("Failed to build OVF");
        assert!(
            ovf.contains(&format!("vmw:osType=\"{}\"", expected)),
            "platform {:?} should map to {}",
            platform,
            expected
        );
    }
}

#[test]
fn test_display_name_resolution() {
    let tagged = create_test_instance(&[], &[("team", "web"), ("Name", "web-1")]);
    let untagged = create_test_instance(&[], &[("team", "web")]);
    let image = create_test_image(None, &[]);

    let env = build_envelope(TASK_ID, &tagged, &create_test_instance_type(), &image)
        .unwrap()
        .envelope;
    assert_eq!(env.virtual_system.name, "web-1");
    assert_eq!(env.virtual_system.id, "export-i-0123456789abcdef0");

    let env = build_envelope(TASK_ID, &untagged, &create_test_instance_type(), &image)
        .unwrap()
        .envelope;
    assert_eq!(env.virtual_system.name, "i-0123456789abcdef0");
}

#[test]
fn test_network_section_names() {
    let ovf = create_mixed_ovf();

    assert!(ovf.contains("<Network ovf:name=\"subnet-a\">"));
    assert!(ovf.contains("<Network ovf:name=\"VM Network 2\">"));
    assert!(ovf.contains("<Network ovf:name=\"subnet-c\">"));
    assert!(ovf.contains("<rasd:Connection>VM Network 2</rasd:Connection>"));
    assert!(ovf.contains("<rasd:ResourceSubType>E1000</rasd:ResourceSubType>"));
    assert!(ovf.contains("<rasd:AutomaticAllocation>true</rasd:AutomaticAllocation>"));
}

#[test]
fn test_hardware_section_values() {
    let ovf = create_mixed_ovf();

    assert!(ovf.contains("<rasd:ElementName>2 virtual CPU(s)</rasd:ElementName>"));
    assert!(ovf.contains("<rasd:ElementName>4096MB of memory</rasd:ElementName>"));
    assert!(ovf.contains("<rasd:AllocationUnits>byte * 2^20</rasd:AllocationUnits>"));
    assert!(ovf.contains("<rasd:ResourceType>5</rasd:ResourceType>"));
    assert!(ovf.contains("<rasd:HostResource>ovf:/disk/vmdisk2</rasd:HostResource>"));
    assert!(ovf.contains("<vssd:VirtualSystemType>vmx-07</vssd:VirtualSystemType>"));
    assert!(ovf.contains(
        "<vssd:VirtualSystemIdentifier>export-i-0123456789abcdef0</vssd:VirtualSystemIdentifier>"
    ));
}

#[test]
fn test_round_trip_recovers_envelope() {
    let build = build_envelope(
        TASK_ID,
        &create_test_instance(&[Some("subnet-a"), None], &[("Name", "db-primary")]),
        &create_test_instance_type(),
        &create_test_image(
            Some("Red Hat Enterprise Linux"),
            &[("/dev/sda1", Some(16)), ("/dev/sdf", Some(100))],
        ),
    )
    .expect("Failed to build OVF");

    let parsed = parse_ovf(&build.to_xml().unwrap()).expect("Failed to parse OVF");
    assert_eq!(parsed, build.envelope);
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_round_trip_with_empty_subnet() {
    let build = build_envelope(
        TASK_ID,
        &create_test_instance(&[Some("")], &[]),
        &create_test_instance_type(),
        &create_test_image(None, &[]),
    )
    .expect("Failed to build OVF");

    let xml = build.to_xml().unwrap();
    assert!(xml.contains("<rasd:Connection>VM Network 1</rasd:Connection>"));

    let parsed = parse_ovf(&xml).expect("Failed to parse OVF");
    assert_eq!(parsed, build.envelope);
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_special_characters_escaped() {
    let instance = create_test_instance(&[], &[("Name", "Test<VM>&\"Name'")]);
    let ovf = format_ovf(
        TASK_ID,
        &instance,
        &create_test_instance_type(),
        &create_test_image(None, &[]),
    )
    .expect("Failed to build OVF");

    assert!(ovf.contains("&lt;"), "OVF should escape < character");
    assert!(ovf.contains("&gt;"), "OVF should escape > character");
    assert!(ovf.contains("&amp;"), "OVF should escape & character");

    let env = parse_ovf(&ovf).expect("Failed to parse OVF");
    assert_eq!(env.virtual_system.name, "Test<VM>&\"Name'");
}

#[test]
fn test_no_disks_and_no_networks() {
    let ovf = format_ovf(
        TASK_ID,
        &create_test_instance(&[], &[]),
        &create_test_instance_type(),
        &create_test_image(Some("Windows"), &[("/dev/sdb", None)]),
    )
    .expect("Failed to build OVF");

    let env = parse_ovf(&ovf).expect("Failed to parse OVF");
    assert!(env.files.is_empty());
    assert!(env.disks.is_empty());
    assert!(env.networks.is_empty());
    assert_eq!(env.virtual_system.hardware.items.len(), 3);
}

#[test]
fn test_output_is_deterministic() {
    assert_eq!(create_mixed_ovf(), create_mixed_ovf());
}
