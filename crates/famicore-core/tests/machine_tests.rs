//! Whole-machine behavior: frame pacing, interrupts, audio cadence.

mod common;

use common::{machine_with_program, nrom_with_program, run_instructions};
use famicore_core::{Bus, CPU_CLOCK_HZ, SAMPLE_RATE};

#[test]
fn frames_arrive_about_every_29780_cpu_cycles() {
    let mut nes = machine_with_program(&[]);

    // First frame.
    while !nes.ppu().frame_ready() {
        nes.execute_cycle();
    }
    let first = nes.total_cycles();
    let _ = nes.ppu_mut().take_frame();

    // Second frame.
    while !nes.ppu().frame_ready() {
        nes.execute_cycle();
    }
    let second = nes.total_cycles();

    let per_frame = second - first;
    // 341 * 262 / 3 with rounding slack.
    assert!(
        (29_770..=29_790).contains(&per_frame),
        "frame period {per_frame}"
    );
}

#[test]
fn ppu_frame_counter_tracks_frames() {
    let mut nes = machine_with_program(&[]);
    for _ in 0..(29_781 * 3) {
        nes.execute_cycle();
    }
    assert_eq!(nes.ppu().total_frames(), 3);
}

#[test]
fn nmi_enters_the_vector_during_vblank() {
    // Enable NMI in PPUCTRL, then idle. The NMI handler at $FF00 is an
    // RTI; observing the pushed return state through the stack is
    // awkward, so instead plant INC $0300 before the RTI.
    let mut rom = nrom_with_program(&[
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000 (NMI enable)
    ]);
    // Replace the stock handler with INC $0300; RTI.
    rom.prg[0x7F00] = 0xEE; // INC $0300
    rom.prg[0x7F01] = 0x00;
    rom.prg[0x7F02] = 0x03;
    rom.prg[0x7F03] = 0x40; // RTI
    let mut nes = Bus::new(&rom).unwrap();

    // Two frames: the handler must have run once per vblank.
    for _ in 0..(29_781 * 2) {
        nes.execute_cycle();
    }
    assert_eq!(nes.view(0x0300), 2);
}

#[test]
fn audio_samples_emerge_at_44100_hz() {
    let mut nes = machine_with_program(&[]);
    let cycles = CPU_CLOCK_HZ / 10; // a tenth of a second
    for _ in 0..cycles {
        nes.execute_cycle();
    }
    let expected = SAMPLE_RATE / 10;
    let produced = nes.audio_mut().len() as u32;
    assert!(
        produced.abs_diff(expected) <= 1,
        "expected about {expected} samples, got {produced}"
    );
}

#[test]
fn audio_ring_drops_oldest_on_overflow() {
    let mut nes = machine_with_program(&[]);
    // Run long enough to overflow the default ring several times.
    for _ in 0..(CPU_CLOCK_HZ / 2) {
        nes.execute_cycle();
    }
    let capacity = nes.audio_mut().capacity();
    assert_eq!(nes.audio_mut().len(), capacity);
    // Still drainable afterwards.
    assert!(nes.audio_mut().pop().is_some());
}

#[test]
fn dmc_dma_fetches_stall_and_deliver() {
    // Point the DMC at $C000 (the NOP slide) and enable it; the sample
    // fetch engine must issue DMA reads without wedging the machine.
    let mut nes = machine_with_program(&[
        0xA9, 0x0F, 0x8D, 0x10, 0x40, // $4010 = fastest rate
        0xA9, 0x00, 0x8D, 0x12, 0x40, // $4012 = sample at $C000
        0xA9, 0x01, 0x8D, 0x13, 0x40, // $4013 = 17 bytes
        0xA9, 0x10, 0x8D, 0x15, 0x40, // $4015 = DMC enable
        0xA9, 0x5A, 0x8D, 0x00, 0x03, // marker
    ]);
    run_instructions(&mut nes, 20);
    assert_eq!(nes.view(0x0300), 0x5A);

    // Drain the whole 17-byte sample: DMC goes inactive.
    for _ in 0..80_000 {
        nes.execute_cycle();
    }
    assert_eq!(nes.view(0x4015) & 0x10, 0);
}

#[test]
fn reset_restarts_the_machine_deterministically() {
    let mut nes = machine_with_program(&[
        0xA9, 0x42, 0x8D, 0x00, 0x02, // STA $0200
    ]);
    run_instructions(&mut nes, 6);
    assert_eq!(nes.view(0x0200), 0x42);

    nes.reset();
    assert_eq!(nes.total_cycles(), 0);
    assert_eq!(nes.view(0x0200), 0, "RAM clears on reset");

    run_instructions(&mut nes, 6);
    assert_eq!(nes.view(0x0200), 0x42, "the program runs again");
}

#[test]
fn determinism_two_machines_stay_bit_identical() {
    let program = &[
        0xA9, 0x1E, 0x8D, 0x01, 0x20, // PPUMASK: show both layers
        0xA9, 0x80, 0x8D, 0x00, 0x20, // PPUCTRL: NMI on
    ];
    let mut a = machine_with_program(program);
    let mut b = machine_with_program(program);

    // Same inputs applied at the same cycles.
    for step in 0..3 {
        a.set_controller(0, step as u8);
        b.set_controller(0, step as u8);
        for _ in 0..29_781 {
            a.execute_cycle();
            b.execute_cycle();
        }
    }

    assert_eq!(a.total_cycles(), b.total_cycles());
    let frame_a: Vec<u32> = a.ppu_mut().take_frame().to_vec();
    let frame_b: Vec<u32> = b.ppu_mut().take_frame().to_vec();
    assert_eq!(frame_a, frame_b);

    let mut samples = 0;
    while let (Some(sa), Some(sb)) = (a.audio_mut().pop(), b.audio_mut().pop()) {
        assert!((sa - sb).abs() < f32::EPSILON);
        samples += 1;
    }
    assert!(samples > 1000);
}

#[test]
fn disassembly_reads_without_side_effects() {
    let nes = machine_with_program(&[0xA9, 0x42]);
    assert_eq!(nes.disassemble(0x8000), "LDA #$42");
    // The NOP slide behind it.
    assert_eq!(nes.disassemble(0x8002), "NOP");
}
