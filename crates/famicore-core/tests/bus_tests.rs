//! Bus-level behavior: address decoding, controller latching, DMA.

mod common;

use common::{machine_with_program, run_instructions};
use famicore_core::Controller;
use proptest::prelude::*;

#[test]
fn ram_is_mirrored_every_2k() {
    let mut nes = machine_with_program(&[
        0xA9, 0x42, // LDA #$42
        0x8D, 0x00, 0x00, // STA $0000
        0xA9, 0x77, // LDA #$77
        0x8D, 0x23, 0x09, // STA $0923 (mirror of $0123)
    ]);
    run_instructions(&mut nes, 8);

    assert_eq!(nes.view(0x0000), 0x42);
    assert_eq!(nes.view(0x0800), 0x42);
    assert_eq!(nes.view(0x1000), 0x42);
    assert_eq!(nes.view(0x1800), 0x42);
    assert_eq!(nes.view(0x0123), 0x77);
    assert_eq!(nes.view(0x0923), 0x77);
}

proptest! {
    /// For every RAM-space address, reads hit the cell at `addr & 0x07FF`.
    #[test]
    fn ram_mirror_invariant(addr in 0u16..0x2000) {
        let mut nes = machine_with_program(&[
            0xA9, 0x5A, // LDA #$5A
            0x8D, 0x34, 0x02, // STA $0234
        ]);
        run_instructions(&mut nes, 6);
        prop_assert_eq!(nes.view(addr), nes.view(addr & 0x07FF));
    }
}

#[test]
fn ppu_registers_decode_on_address_mod_8() {
    // Write a nametable byte entirely through the $3FF6/$3FF7 mirrors of
    // PPUADDR/PPUDATA, then read it back through the canonical ports.
    let mut nes = machine_with_program(&[
        0xA9, 0x21, 0x8D, 0xF6, 0x3F, // PPUADDR = $21..
        0xA9, 0x55, 0x8D, 0xF6, 0x3F, // PPUADDR = ..$55
        0xA9, 0x99, 0x8D, 0xF7, 0x3F, // PPUDATA = $99 via mirror
        0xA9, 0x21, 0x8D, 0x06, 0x20, // PPUADDR = $21..
        0xA9, 0x55, 0x8D, 0x06, 0x20, // PPUADDR = ..$55
        0xAD, 0x07, 0x20, // LDA $2007 (stale buffer)
        0xAD, 0x07, 0x20, // LDA $2007 (the real byte)
        0x8D, 0x10, 0x02, // STA $0210
    ]);
    run_instructions(&mut nes, 20);
    assert_eq!(nes.view(0x0210), 0x99);
}

#[test]
fn controller_latch_shifts_and_pads_with_ones() {
    let mut nes = machine_with_program(&[
        0xA9, 0x01, 0x8D, 0x16, 0x40, // strobe high
        0xA9, 0x00, 0x8D, 0x16, 0x40, // strobe low: snapshot
        0xA2, 0x00, // LDX #$00
        // loop: LDA $4016; STA $0200,X; INX; CPX #$10; BNE loop
        0xAD, 0x16, 0x40,
        0x9D, 0x00, 0x02,
        0xE8,
        0xE0, 0x10,
        0xD0, 0xF5,
    ]);
    nes.set_controller(0, Controller::A);
    run_instructions(&mut nes, 200);

    let bits: Vec<u8> = (0..16).map(|i| nes.view(0x0200 + i) & 1).collect();
    // First eight reads shift out the snapshot: A then nothing pressed.
    assert_eq!(&bits[..8], &[1, 0, 0, 0, 0, 0, 0, 0]);
    // Past the eighth read the shifter has filled with open-bus ones.
    assert_eq!(&bits[8..], &[1; 8]);
}

#[test]
fn strobe_high_freezes_reads_on_bit_zero() {
    let mut nes = machine_with_program(&[
        0xA9, 0x01, 0x8D, 0x16, 0x40, // strobe high, and it stays high
        0xAD, 0x16, 0x40, 0x8D, 0x00, 0x02, // read -> $0200
        0xAD, 0x16, 0x40, 0x8D, 0x01, 0x02, // read -> $0201
        0xAD, 0x16, 0x40, 0x8D, 0x02, 0x02, // read -> $0202
    ]);
    nes.set_controller(0, Controller::A);
    run_instructions(&mut nes, 20);

    // No shifting while the strobe is up: always the A bit.
    assert_eq!(nes.view(0x0200) & 1, 1);
    assert_eq!(nes.view(0x0201) & 1, 1);
    assert_eq!(nes.view(0x0202) & 1, 1);
}

#[test]
fn opposite_directions_are_suppressed_at_latch_time() {
    let mut nes = machine_with_program(&[
        0xA9, 0x01, 0x8D, 0x16, 0x40, // strobe high
        0xA9, 0x00, 0x8D, 0x16, 0x40, // strobe low: snapshot
        0xA2, 0x00, // LDX #$00
        // loop: LDA $4016; STA $0200,X; INX; CPX #$08; BNE loop
        0xAD, 0x16, 0x40,
        0x9D, 0x00, 0x02,
        0xE8,
        0xE0, 0x08,
        0xD0, 0xF5,
    ]);
    nes.set_controller(0, Controller::UP | Controller::DOWN | Controller::B);
    run_instructions(&mut nes, 120);

    let bits: Vec<u8> = (0..8).map(|i| nes.view(0x0200 + i) & 1).collect();
    // B survives; the impossible up+down pair reads as neither.
    assert_eq!(bits, vec![0, 1, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn second_controller_uses_port_4017() {
    let mut nes = machine_with_program(&[
        0xA9, 0x01, 0x8D, 0x16, 0x40,
        0xA9, 0x00, 0x8D, 0x16, 0x40,
        0xAD, 0x17, 0x40, 0x8D, 0x00, 0x02, // first bit of pad 2
    ]);
    nes.set_controller(1, Controller::A | Controller::START);
    run_instructions(&mut nes, 20);
    assert_eq!(nes.view(0x0200) & 1, 1);
}

#[test]
fn oam_dma_copies_a_page_and_stalls_the_cpu() {
    let mut nes = machine_with_program(&[
        0xA2, 0x00, // LDX #$00
        // fill loop: TXA; STA $0200,X; INX; BNE loop
        0x8A,
        0x9D, 0x00, 0x02,
        0xE8,
        0xD0, 0xF9,
        0xA9, 0x00, 0x8D, 0x03, 0x20, // OAMADDR = 0
        0xA9, 0x02, 0x8D, 0x14, 0x40, // OAM DMA from page 2
        0xA9, 0x5A, 0x8D, 0xF0, 0x07, // marker after the stall
        // Read OAM bytes back through OAMDATA.
        0xA9, 0x42, 0x8D, 0x03, 0x20, // OAMADDR = $42
        0xAD, 0x04, 0x20, // LDA $2004
        0x8D, 0xF1, 0x07, // STA $07F1
        0xA9, 0xFF, 0x8D, 0x03, 0x20, // OAMADDR = $FF
        0xAD, 0x04, 0x20, // LDA $2004
        0x8D, 0xF2, 0x07, // STA $07F2
    ]);

    while nes.view(0x07F2) != 0xFF {
        nes.execute_cycle();
        assert!(nes.total_cycles() < 50_000, "DMA never completed");
    }

    // The page arrived intact: OAM[i] == i for the identity-fill page.
    assert_eq!(nes.view(0x07F1), 0x42);
    assert_eq!(nes.view(0x07F2), 0xFF);

    // The whole run costs the program's ~3100 cycles plus the 513/514
    // cycle DMA stall; without the stall it finishes well under 3200.
    assert!(
        nes.total_cycles() > 3500,
        "DMA did not stall the CPU (total {})",
        nes.total_cycles()
    );
    assert!(nes.total_cycles() < 3800);
}

#[test]
fn unmapped_io_reads_as_zero() {
    let nes = machine_with_program(&[]);
    for addr in 0x4018..=0x401F {
        assert_eq!(nes.view(addr), 0);
    }
    // APU channel registers are write-only.
    assert_eq!(nes.view(0x4000), 0);
    assert_eq!(nes.view(0x4008), 0);
}
