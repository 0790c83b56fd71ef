use owlet_machines::bbc::model::{
    DPO_OVERRIDE_SHADOW, DPO_SHADOW, Model,
};
use owlet_machines::bbc::Machine;
use owlet_machines::MachineConfig;

mod common;
use common::{boot_machine, read_ram, step_n};

/// Every high byte must resolve to a provenance-tagged big page in
/// every reachable paging state.
fn assert_fully_mapped(machine: &Machine) {
    for page in 0..=255u8 {
        let bp = machine.debug_live_big_page(page);
        assert_ne!(bp.code, '\0', "page {page:02X} has no provenance");
    }
}

#[test]
fn all_pages_resolve_on_every_model() {
    for model in [Model::B, Model::BPlus, Model::Master] {
        let machine = boot_machine(model, &[0xEA; 4]);
        assert_fully_mapped(&machine);
    }
}

#[test]
fn romsel_write_selects_the_sideways_bank() {
    // LDA #$05 / STA $FE30 / JMP *
    let code = [0xA9, 0x05, 0x8D, 0x30, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::B, &code);

    assert_eq!(machine.debug_live_big_page(0x80).code, '0');
    step_n(&mut machine, 100);
    assert_eq!(machine.debug_live_big_page(0x80).code, '5');
    assert_eq!(machine.debug_live_big_page(0xB0).code, '5');
    assert_fully_mapped(&machine);
}

#[test]
fn romsel_mirrors_across_fe30_to_fe3f_on_the_b() {
    // STA $FE3C still hits ROMSEL on the B.
    let code = [0xA9, 0x0A, 0x8D, 0x3C, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::B, &code);
    step_n(&mut machine, 100);
    assert_eq!(machine.debug_live_big_page(0x80).code, 'a');
}

#[test]
fn master_romsel_ram_bit_maps_andy() {
    // LDA #$80 / STA $FE30 / JMP *
    let code = [0xA9, 0x80, 0x8D, 0x30, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::Master, &code);
    step_n(&mut machine, 100);

    assert_eq!(machine.debug_live_big_page(0x80).code, 'n');
    // The rest of the sideways window still shows the ROM bank.
    assert_eq!(machine.debug_live_big_page(0x90).code, '0');
    assert_fully_mapped(&machine);
}

#[test]
fn master_acccon_y_maps_hazel_over_the_mos() {
    // LDA #$08 / STA $FE34 / JMP *
    let code = [0xA9, 0x08, 0x8D, 0x34, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::Master, &code);

    assert_eq!(machine.debug_live_big_page(0xC0).code, 'o');
    step_n(&mut machine, 100);
    assert_eq!(machine.debug_live_big_page(0xC0).code, 'h');
    assert_eq!(machine.debug_live_big_page(0xD0).code, 'h');
    // The MOS remains above HAZEL.
    assert_eq!(machine.debug_live_big_page(0xE0).code, 'o');
    assert_fully_mapped(&machine);
}

#[test]
fn bplus_romsel_ram_bit_maps_the_12k_region() {
    let code = [0xA9, 0x80, 0x8D, 0x30, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::BPlus, &code);
    step_n(&mut machine, 100);

    // 12K of RAM at 0x8000-0xAFFF; ROM above. On the B+ the whole
    // region carries the ANDY tag.
    assert_eq!(machine.debug_live_big_page(0x80).code, 'n');
    assert_eq!(machine.debug_live_big_page(0xA0).code, 'n');
    assert_eq!(machine.debug_live_big_page(0xB0).code, '0');
}

#[test]
fn masked_romsel_bits_do_not_remap() {
    // The B ignores ROMSEL bit 7: writing $85 selects bank 5.
    let code = [0xA9, 0x85, 0x8D, 0x30, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::B, &code);
    step_n(&mut machine, 100);
    assert_eq!(machine.debug_live_big_page(0x80).code, '5');
}

#[test]
fn master_x_bit_routes_user_writes_to_shadow_ram() {
    // Run from main RAM so the user instruction pages decide the map:
    // the OS stub copies nothing; we plant the program via the debug
    // path and jump to it.
    //
    // OS entry: JMP $2000.
    // At $2000: LDA #$04 / STA $FE34 / LDA #$AA / STA $3000 / JMP *
    let code = [0x4C, 0x00, 0x20];
    let mut machine = boot_machine(Model::Master, &code);
    machine.debug_write_bytes(
        0x2000,
        0,
        &[0xA9, 0x04, 0x8D, 0x34, 0xFE, 0xA9, 0xAA, 0x8D, 0x00, 0x30, 0x4C, 0x0A, 0x20],
    );
    step_n(&mut machine, 200);

    // Through the shadow override the write is visible...
    let mut shadow = [0u8; 1];
    machine.debug_read_bytes(&mut shadow, 0x3000, DPO_OVERRIDE_SHADOW | DPO_SHADOW);
    assert_eq!(shadow[0], 0xAA);

    // ...while main RAM at the same address is untouched.
    let mut main = [0u8; 1];
    machine.debug_read_bytes(&mut main, 0x3000, DPO_OVERRIDE_SHADOW);
    assert_eq!(main[0], 0x00);
}

#[test]
fn teletext_address_translation() {
    let machine_b = boot_machine(Model::B, &[0xEA; 4]);
    assert_eq!(machine_b.video_address(0x2400, 0), 0x3C00);
    // Bit 11 selects the second base.
    assert_eq!(machine_b.video_address(0x2C00, 0), 0x7C00);

    let machine_m = Machine::new(Model::Master, MachineConfig::default());
    assert_eq!(machine_m.video_address(0x2400, 0), 0x7C00);

    // Low bits pass through.
    assert_eq!(machine_b.video_address(0x2400 | 0x123, 0), 0x3C00 | 0x123);
}

#[test]
fn bitmap_screen_wrap_adjustment() {
    let machine = boot_machine(Model::B, &[0xEA; 4]);
    // Latch screen-base bits default to 0: adjustment $4000 >> 3.
    assert_eq!(machine.video_address(0x1000, 0), (0x1000u16 - 0x0800) << 3);
    // The raster lands in the low bits.
    assert_eq!(machine.video_address(0x1000, 5), ((0x1000u16 - 0x0800) << 3) | 5);
    // Non-wrapped addresses just shift.
    assert_eq!(machine.video_address(0x0400, 2), (0x0400 << 3) | 2);
}

#[test]
fn sideways_ram_banks_are_writable_and_private() {
    use owlet_machines::bbc::model::DPO_OVERRIDE_ROM;

    let mut machine = boot_machine(Model::B, &[0xEA; 4]);
    machine.set_sideways_ram(4, None);

    machine.debug_write_bytes(0x8000, DPO_OVERRIDE_ROM | 4, &[0x12, 0x34]);

    let mut bank4 = [0u8; 2];
    machine.debug_read_bytes(&mut bank4, 0x8000, DPO_OVERRIDE_ROM | 4);
    assert_eq!(bank4, [0x12, 0x34]);

    // A different (empty) bank reads as unmapped zeroes.
    let mut bank2 = [0u8; 2];
    machine.debug_read_bytes(&mut bank2, 0x8000, DPO_OVERRIDE_ROM | 2);
    assert_eq!(bank2, [0, 0]);
}

#[test]
fn rom_bank_writes_are_discarded() {
    use owlet_machines::bbc::model::DPO_OVERRIDE_ROM;
    use owlet_machines::rom_from_bytes;

    let mut machine = boot_machine(Model::B, &[0xEA; 4]);
    let rom = rom_from_bytes(&[0x5Au8; 16384]).expect("rom size");
    machine.set_sideways_rom(3, Some(rom));

    machine.debug_write_bytes(0x8000, DPO_OVERRIDE_ROM | 3, &[0x00]);

    let mut bank3 = [0u8; 1];
    machine.debug_read_bytes(&mut bank3, 0x8000, DPO_OVERRIDE_ROM | 3);
    assert_eq!(bank3, [0x5A], "ROM contents must be unchanged");
}

#[test]
fn debug_view_of_the_io_region_falls_through_to_the_mos() {
    let machine = boot_machine(Model::Master, &[0xEA; 4]);
    // Known limitation carried over from the original: the IO pages
    // resolve to the MOS big page whatever the overrides say.
    assert_eq!(machine.debug_get_big_page(0xFC, 0).code, 'o');
    assert_eq!(machine.debug_get_big_page(0xFE, 0).code, 'o');
}

#[test]
fn current_page_override_reflects_live_state() {
    let code = [0xA9, 0x88, 0x8D, 0x30, 0xFE, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::Master, &code);
    step_n(&mut machine, 100);

    let dpo = machine.debug_get_current_page_override();
    assert_eq!(dpo & 0x0F, 8, "bank bits");
    use owlet_machines::bbc::model::DPO_ANDY;
    assert_ne!(dpo & DPO_ANDY, 0);
}

#[test]
fn read_ram_helper_sees_cpu_writes() {
    // LDA #$C3 / STA $1234 / JMP *
    let code = [0xA9, 0xC3, 0x8D, 0x34, 0x12, 0x4C, 0x05, 0xC0];
    let mut machine = boot_machine(Model::B, &code);
    step_n(&mut machine, 100);
    assert_eq!(read_ram(&machine, 0x1234, 1), vec![0xC3]);
}
