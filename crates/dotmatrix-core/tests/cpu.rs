use dotmatrix_core::{cartridge::Cartridge, cpu::Cpu, interrupts::Interrupt, mmu::Mmu};

/// Bus with a plain 32 KiB ROM holding `code` at 0x0100.
fn machine(code: &[u8]) -> (Cpu, Mmu) {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0100..0x0100 + code.len()].copy_from_slice(code);
    let mut mmu = Mmu::new();
    mmu.load_cart(Cartridge::load(rom).unwrap());
    mmu.write_byte(0xFF0F, 0x00);
    (Cpu::new(), mmu)
}

fn run(cpu: &mut Cpu, mmu: &mut Mmu, steps: usize) {
    for _ in 0..steps {
        cpu.step(mmu);
    }
}

#[test]
fn push_then_pop_restores_value_and_sp() {
    // LD BC,$BEEF ; PUSH BC ; POP HL
    let (mut cpu, mut mmu) = machine(&[0x01, 0xEF, 0xBE, 0xC5, 0xE1]);
    let sp = cpu.regs.sp;
    run(&mut cpu, &mut mmu, 3);
    assert_eq!(cpu.regs.hl(), 0xBEEF);
    assert_eq!(cpu.regs.sp, sp);
}

#[test]
fn call_and_ret_round_trip() {
    // CALL $0200 ; (0x0200) RET
    let mut code = vec![0u8; 0x101];
    code[..3].copy_from_slice(&[0xCD, 0x00, 0x02]);
    code[0x100] = 0xC9;
    let (mut cpu, mut mmu) = machine(&code);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, 0x0200);
    assert_eq!(cpu.regs.sp, 0xFFFC);
    assert_eq!(mmu.read_word(0xFFFC), 0x0103);
    cpu.step(&mut mmu);
    assert_eq!(cpu.regs.pc, 0x0103);
    assert_eq!(cpu.regs.sp, 0xFFFE);
}

#[test]
fn arithmetic_program() {
    // LD A,$45 ; ADD A,$38 ; DAA ; LD B,A ; XOR A
    let (mut cpu, mut mmu) = machine(&[0x3E, 0x45, 0xC6, 0x38, 0x27, 0x47, 0xAF]);
    run(&mut cpu, &mut mmu, 5);
    assert_eq!(cpu.regs.b, 0x83);
    assert_eq!(cpu.regs.a, 0x00);
    assert!(cpu.regs.f.z());
}

#[test]
fn loop_with_dec_and_jr() {
    // LD B,5 ; LD A,0 ; loop: ADD A,2 ; DEC B ; JR NZ,loop ; HALT
    let (mut cpu, mut mmu) =
        machine(&[0x06, 0x05, 0x3E, 0x00, 0xC6, 0x02, 0x05, 0x20, 0xFB, 0x76]);
    run(&mut cpu, &mut mmu, 2 + 5 * 3 + 1);
    assert_eq!(cpu.regs.a, 10);
    assert_eq!(cpu.regs.b, 0);
    assert!(cpu.halted);
}

#[test]
fn add_sp_uses_unsigned_low_byte_flags() {
    // LD SP,$00FF ; ADD SP,-1
    let (mut cpu, mut mmu) = machine(&[0x31, 0xFF, 0x00, 0xE8, 0xFF]);
    run(&mut cpu, &mut mmu, 2);
    assert_eq!(cpu.regs.sp, 0x00FE);
    assert!(cpu.regs.f.h());
    assert!(cpu.regs.f.c());
    assert!(!cpu.regs.f.z());
    assert!(!cpu.regs.f.n());
}

#[test]
fn interrupt_serviced_after_ei_delay() {
    // EI ; NOP ; NOP
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x00, 0x00]);
    mmu.write_byte(0xFFFF, 0x04);
    mmu.irq.request(Interrupt::Timer);

    cpu.step(&mut mmu);
    assert_eq!(cpu.handle_interrupts(&mut mmu), 0);
    cpu.step(&mut mmu);
    assert_eq!(cpu.handle_interrupts(&mut mmu), 20);
    assert_eq!(cpu.regs.pc, 0x0050);
    assert_eq!(mmu.read_word(cpu.regs.sp), 0x0102);
    assert!(!mmu.irq.is_pending(Interrupt::Timer));
}

#[test]
fn lowest_bit_wins_and_others_stay_pending() {
    let (mut cpu, mut mmu) = machine(&[0x00]);
    cpu.ime = true;
    mmu.write_byte(0xFFFF, 0x1F);
    mmu.write_byte(0xFF0F, 0x18);
    cpu.handle_interrupts(&mut mmu);
    assert_eq!(cpu.regs.pc, 0x0058);
    assert_eq!(mmu.read_byte(0xFF0F), 0xF0);
}

#[test]
fn halt_bug_executes_following_byte_twice() {
    // HALT ; INC B
    let (mut cpu, mut mmu) = machine(&[0x76, 0x04]);
    mmu.write_byte(0xFFFF, 0x01);
    mmu.write_byte(0xFF0F, 0x01);
    cpu.regs.b = 0;
    run(&mut cpu, &mut mmu, 3);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.b, 2);
    assert_eq!(cpu.regs.pc, 0x0102);
}

#[test]
fn halt_then_interrupt_resumes_at_vector() {
    // EI ; HALT
    let (mut cpu, mut mmu) = machine(&[0xFB, 0x76, 0x00]);
    mmu.write_byte(0xFFFF, 0x01);
    run(&mut cpu, &mut mmu, 2);
    assert!(cpu.halted);
    assert_eq!(cpu.step(&mut mmu), 4);

    mmu.irq.request(Interrupt::VBlank);
    assert_eq!(cpu.handle_interrupts(&mut mmu), 20);
    assert!(!cpu.halted);
    assert_eq!(cpu.regs.pc, 0x0040);
    assert_eq!(mmu.read_word(cpu.regs.sp), 0x0102);
}

#[test]
fn every_opcode_decodes() {
    for opcode in 0..=0xFFu8 {
        let (mut cpu, mut mmu) = machine(&[opcode, 0x00, 0x00]);
        let ticks = cpu.step(&mut mmu);
        assert!((4..=24).contains(&ticks), "opcode {opcode:02X} took {ticks}");
        assert_eq!(ticks % 4, 0);
    }
}
