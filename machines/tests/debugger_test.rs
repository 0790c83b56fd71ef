use owlet_machines::bbc::debug::{
    BYTE_FLAG_BREAK_EXECUTE, BYTE_FLAG_BREAK_READ, BYTE_FLAG_BREAK_WRITE, DebugState,
    HardwareDebugState,
};
use owlet_machines::bbc::model::Model;

mod common;
use common::{boot_machine, boot_machine_with, step_n, step_until_halted};

fn debug_machine(code: &[u8]) -> owlet_machines::Machine {
    let mut machine = boot_machine(Model::B, code);
    machine.set_debug_state(Some(DebugState::new()));
    machine
}

#[test]
fn execute_breakpoint_halts_at_the_address() {
    // LDA #$01 / LDA #$02 / JMP *
    let code = [0xA9, 0x01, 0xA9, 0x02, 0x4C, 0x04, 0xC0];
    let mut machine = debug_machine(&code);

    machine.debug_set_byte_flags(0xC002, BYTE_FLAG_BREAK_EXECUTE);
    assert_eq!(machine.debug_get_byte_flags(0xC002), BYTE_FLAG_BREAK_EXECUTE);

    assert!(step_until_halted(&mut machine, 100));
    let reason = machine.debug_halt_reason().unwrap_or("");
    assert!(reason.contains("execute"), "reason = {reason}");
    assert!(reason.contains("C002"), "reason = {reason}");

    // The first LDA ran, the second did not.
    assert_eq!(machine.cpu().a, 0x01);

    machine.debug_run();
    assert!(!machine.debug_is_halted());
}

#[test]
fn read_breakpoint_fires_on_data_reads_only() {
    // The program fetches instructions from $C000 but only data-reads
    // $1234.
    let code = [0xAD, 0x34, 0x12, 0x4C, 0x00, 0xC0]; // LDA $1234 / JMP *
    let mut machine = debug_machine(&code);

    machine.debug_set_byte_flags(0x1234, BYTE_FLAG_BREAK_READ);
    // An execute-fetch of flagged code must not trip a read break.
    machine.debug_set_byte_flags(0xC003, BYTE_FLAG_BREAK_READ);

    step_n(&mut machine, 20);
    assert!(machine.debug_is_halted());
    let reason = machine.debug_halt_reason().unwrap_or("");
    assert!(reason.contains("data read"), "reason = {reason}");
    assert!(reason.contains("1234"), "reason = {reason}");
}

#[test]
fn write_breakpoint_fires_on_stores() {
    let code = [0xA9, 0x55, 0x8D, 0x00, 0x30, 0x4C, 0x05, 0xC0]; // LDA / STA $3000 / JMP *
    let mut machine = debug_machine(&code);

    machine.debug_set_byte_flags(0x3000, BYTE_FLAG_BREAK_WRITE);
    step_n(&mut machine, 30);

    assert!(machine.debug_is_halted());
    let reason = machine.debug_halt_reason().unwrap_or("");
    assert!(reason.contains("data write"), "reason = {reason}");
    // The write itself still landed.
    let mut value = [0u8; 1];
    machine.debug_read_bytes(&mut value, 0x3000, 0);
    assert_eq!(value[0], 0x55);
}

#[test]
fn temp_breakpoints_clear_when_hit() {
    let code = [0xA9, 0x01, 0xA9, 0x02, 0x4C, 0x04, 0xC0];
    let mut machine = debug_machine(&code);

    machine.debug_add_temp_breakpoint(0xC002);
    step_n(&mut machine, 100);

    assert!(machine.debug_is_halted());
    assert_eq!(machine.debug_halt_reason(), Some("single step"));
    // Halting scrubbed the temp flag.
    assert_eq!(machine.debug_get_byte_flags(0xC002), 0);
}

#[test]
fn step_in_halts_after_one_instruction() {
    let code = [0xEA, 0xEA, 0xEA, 0x4C, 0x03, 0xC0];
    let mut machine = debug_machine(&code);
    step_n(&mut machine, 20);
    assert!(!machine.debug_is_halted());

    machine.debug_step_in();
    step_n(&mut machine, 10);

    assert!(machine.debug_is_halted());
    assert_eq!(machine.debug_halt_reason(), Some("single step"));
}

#[test]
fn step_into_irq_handler_stops_at_the_handler() {
    // Arm the system VIA T1 and watch for its IRQ.
    let code = [
        0xA9, 0xC0, 0x8D, 0x4E, 0xFE, // IER: T1
        0xA9, 0x20, 0x8D, 0x44, 0xFE, // T1 latch low
        0xA9, 0x00, 0x8D, 0x45, 0xFE, // T1 start
        0x58, // CLI
        0x4C, 0x0F, 0xC0, // spin
    ];
    let handler = [0xAD, 0x44, 0xFE, 0x40];
    let mut machine = boot_machine_with(
        Model::B,
        &code,
        &[(0xFF80, &handler[..]), (0xFFFE, &[0x80, 0xFF])],
    );
    machine.set_debug_state(Some(DebugState::new()));
    machine.set_hardware_debug_state(HardwareDebugState {
        system_via_irq_breakpoints: 0x40, // T1
        user_via_irq_breakpoints: 0,
    });

    assert!(step_until_halted(&mut machine, 50_000));
    assert_eq!(machine.debug_halt_reason(), Some("IRQ/NMI"));
    // Halted at the first instruction of the handler.
    assert_eq!(machine.cpu().pc, 0xFF80);
}

#[test]
fn dpo_resolves_overridden_regions() {
    use owlet_machines::bbc::model::{
        DPO_HAZEL, DPO_OVERRIDE_HAZEL, DPO_OVERRIDE_ROM,
    };

    let machine_b = debug_machine(&[0xEA; 4]);
    assert_eq!(machine_b.debug_get_big_page(0x00, 0).code, 'm');
    assert_eq!(machine_b.debug_get_big_page(0xC0, 0).code, 'o');
    assert_eq!(machine_b.debug_get_big_page(0x80, DPO_OVERRIDE_ROM | 3).code, '3');
    // HAZEL overrides mean nothing on the B: the mask strips them.
    assert_eq!(
        machine_b.debug_get_big_page(0xC0, DPO_OVERRIDE_HAZEL | DPO_HAZEL).code,
        'o'
    );

    let machine_m = {
        let mut machine = boot_machine(Model::Master, &[0xEA; 4]);
        machine.set_debug_state(Some(DebugState::new()));
        machine
    };
    assert_eq!(
        machine_m.debug_get_big_page(0xC0, DPO_OVERRIDE_HAZEL | DPO_HAZEL).code,
        'h'
    );
    assert_eq!(machine_m.debug_get_big_page(0xC0, DPO_OVERRIDE_HAZEL).code, 'o');
}

#[test]
fn page_override_mask_is_model_specific() {
    use owlet_machines::bbc::model::{DPO_OVERRIDE_HAZEL, DPO_OVERRIDE_ROM};

    let machine_b = boot_machine(Model::B, &[0xEA; 4]);
    let mask_b = machine_b.debug_get_page_override_mask();
    assert_ne!(mask_b & DPO_OVERRIDE_ROM, 0);
    assert_eq!(mask_b & DPO_OVERRIDE_HAZEL, 0);

    let machine_m = boot_machine(Model::Master, &[0xEA; 4]);
    assert_ne!(machine_m.debug_get_page_override_mask() & DPO_OVERRIDE_HAZEL, 0);
}

#[test]
fn debug_writes_respect_rom_write_sides() {
    let mut machine = debug_machine(&[0xEA; 4]);

    // The MOS region is ROM: writes bounce off.
    machine.debug_write_bytes(0xD000, 0, &[0x12]);
    let mut value = [0xFFu8; 1];
    machine.debug_read_bytes(&mut value, 0xD000, 0);
    assert_eq!(value[0], 0x00, "OS ROM byte is unchanged");

    // Main RAM takes the write.
    machine.debug_write_bytes(0x1000, 0, &[0x34]);
    machine.debug_read_bytes(&mut value, 0x1000, 0);
    assert_eq!(value[0], 0x34);
}

#[test]
fn detaching_the_debugger_disables_breakpoints() {
    let code = [0xA9, 0x01, 0xA9, 0x02, 0x4C, 0x04, 0xC0];
    let mut machine = debug_machine(&code);
    machine.debug_set_byte_flags(0xC002, BYTE_FLAG_BREAK_EXECUTE);

    let debug = machine.take_debug_state();
    assert!(debug.is_some());
    assert!(!machine.has_debug_state());

    step_n(&mut machine, 100);
    assert!(!machine.debug_is_halted());
    assert_eq!(machine.cpu().a, 0x02);
}
