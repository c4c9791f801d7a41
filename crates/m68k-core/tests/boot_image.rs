//! Boot-image construction checked end to end: vector table contents,
//! parameter-area packing, and the size limits.

use proptest::prelude::*;
use rstest::rstest;

use m68k_core::{build_boot_image, BootError, MemoryLayout};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[test]
fn reset_vectors_seed_ssp_and_boot_pc() {
    let layout = MemoryLayout::default();
    let mem = build_boot_image(&layout, &[], &args(&["prog"])).unwrap();
    assert_eq!(mem.read_u32(0).unwrap(), layout.initial_ssp);
    let boot = mem.read_u32(4).unwrap();
    assert_eq!(boot & 1, 0, "boot PC must be even");
    // The boot loader starts by dropping to user mode.
    assert_eq!(mem.read_u16(boot).unwrap(), 0x027C);
    assert_eq!(mem.read_u16(boot + 2).unwrap(), 0xDFFF);
}

#[test]
fn privilege_violations_share_the_illegal_handler() {
    let mem = build_boot_image(&MemoryLayout::default(), &[], &args(&["prog"])).unwrap();
    let illegal = mem.read_u32(4 * 4).unwrap();
    let privilege = mem.read_u32(8 * 4).unwrap();
    assert_eq!(privilege, illegal);
}

#[test]
fn code_loads_at_the_code_address() {
    let layout = MemoryLayout::default();
    let code = [0x70u8, 0x2A, 0x4E, 0x75];
    let mem = build_boot_image(&layout, &code, &args(&["prog"])).unwrap();
    assert_eq!(mem.read_u16(layout.code_address).unwrap(), 0x702A);
    assert_eq!(mem.read_u16(layout.code_address + 2).unwrap(), 0x4E75);
}

#[rstest]
#[case(0, true)]
#[case(100, true)]
#[case(0x1000, false)]
fn argument_capacity_is_enforced(#[case] extra_len: usize, #[case] fits: bool) {
    let layout = MemoryLayout::default();
    let extra = "y".repeat(extra_len);
    let result = build_boot_image(&layout, &[], &args(&["prog", &extra]));
    match result {
        Ok(_) => assert!(fits),
        Err(BootError::ArgsTooLarge { .. }) => assert!(!fits),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

proptest! {
    /// Whatever argument vector goes in can be read back out of guest
    /// memory through argc, the argv table, and the NUL-terminated
    /// strings.
    #[test]
    fn argv_round_trips_through_guest_memory(
        list in prop::collection::vec("[a-z0-9/._-]{0,12}", 1..6)
    ) {
        let layout = MemoryLayout::default();
        let mem = build_boot_image(&layout, &[], &list).unwrap();

        let argc_addr = layout.param_address + 40;
        let argv_addr = layout.param_address + 44;
        prop_assert_eq!(mem.read_u32(argc_addr).unwrap() as usize, list.len());

        let table = mem.read_u32(argv_addr).unwrap();
        for (i, expected) in list.iter().enumerate() {
            let ptr = mem.read_u32(table + 4 * i as u32).unwrap();
            let mut actual = Vec::new();
            let mut at = ptr;
            loop {
                let byte = mem.read_u8(at).unwrap();
                if byte == 0 {
                    break;
                }
                actual.push(byte);
                at += 1;
            }
            prop_assert_eq!(&actual, expected.as_bytes());
        }
        let nul = mem.read_u32(table + 4 * list.len() as u32).unwrap();
        prop_assert_eq!(nul, 0);
    }
}
