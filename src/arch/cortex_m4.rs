//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor.
//! Implements context switching via PendSV, SysTick timer configuration,
//! thread stack priming, and NVIC setup for aperiodic events.
//!
//! ## Context Switch Mechanism
//!
//! The Cortex-M4 uses a split-stack model:
//! - **MSP** (Main Stack Pointer): Used by the kernel and interrupt handlers
//! - **PSP** (Process Stack Pointer): Used by threads in Thread mode
//!
//! On exception entry, the hardware automatically stacks R0–R3, R12, LR, PC,
//! and xPSR onto the process stack. The PendSV handler manually saves and
//! restores R4–R11, which completes the full context save/restore. The
//! saved PSP is the thread's [`ExecutionContext`].
//!
//! ```text
//!   high ┌──────────┐
//!        │ xPSR     │  0x0100_0000 (Thumb)
//!        │ PC       │  thread entry
//!        │ LR       │  thread_exit
//!        │ R12, R3–R0│
//!        ├──────────┤  ← hardware frame
//!        │ R11–R4   │
//!   low  └──────────┘  ← saved PSP
//! ```
//!
//! ## Interrupt Priorities
//!
//! - SysTick and PendSV: `KERNEL_HW_PRIORITY`, the lowest implemented level
//! - Aperiodic events: `priority << (8 - NVIC_PRIO_BITS)`, always above the kernel
//!
//! The build targets `thumbv7em-none-eabi`, so no FPU state is saved.

use core::arch::{asm, naked_asm};
use core::ptr::addr_of_mut;

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{NVIC, SCB, SYST};
use cortex_m_rt::exception;

use super::{ExecutionContext, Port};
use crate::config::{
    KERNEL_HW_PRIORITY, MAX_THREADS, NVIC_PRIO_BITS, STACK_WORDS, SYSTEM_CLOCK_HZ, TICK_HZ,
};
use crate::kernel::KERNEL;
use crate::thread::ThreadEntry;

/// Words in the initial frame: R4–R11, then R0–R3, R12, LR, PC, xPSR.
const INITIAL_FRAME_WORDS: usize = 16;

/// xPSR with only the Thumb bit set.
const INITIAL_XPSR: u32 = 0x0100_0000;

#[repr(C, align(8))]
struct ThreadStack([u32; STACK_WORDS]);

/// One stack per TCB slot. A slot's stack is reprimed whenever the slot is
/// reused.
static mut STACKS: [ThreadStack; MAX_THREADS] =
    [const { ThreadStack([0; STACK_WORDS]) }; MAX_THREADS];

/// The Cortex-M4 implementation of [`Port`].
pub struct CortexM4;

impl Port for CortexM4 {
    fn prime_context(&self, slot: usize, entry: ThreadEntry) -> ExecutionContext {
        assert!(slot < MAX_THREADS, "stack slot {} out of range", slot);

        // SAFETY: the slot is dead, so no thread runs on this stack, and
        // the caller holds the kernel critical section.
        let stack = unsafe { &mut (*addr_of_mut!(STACKS))[slot].0 };
        let base = STACK_WORDS - INITIAL_FRAME_WORDS;
        let frame = &mut stack[base..];

        frame[..8].fill(0); // R4–R11
        frame[8..13].fill(0); // R0–R3, R12
        frame[13] = thread_exit as usize as u32; // LR
        frame[14] = (entry as usize as u32) & !1; // PC
        frame[15] = INITIAL_XPSR;

        ExecutionContext::new(frame.as_ptr() as usize)
    }

    #[inline]
    fn request_context_switch(&self) {
        SCB::set_pendsv();
    }

    fn bind_interrupt(&self, irq: u16, priority: u8) {
        let irq = Irq(irq);
        // SAFETY: only the NVIC priority and enable registers of one line
        // are touched, and the handler is already in the table.
        unsafe {
            let mut nvic = cortex_m::Peripherals::steal().NVIC;
            nvic.set_priority(irq, priority << (8 - NVIC_PRIO_BITS));
            NVIC::unmask(irq);
        }
    }
}

/// External interrupt line, as numbered by the NVIC.
#[derive(Debug, Clone, Copy)]
struct Irq(u16);

// SAFETY: `Irq` values are validated against the device's interrupt count
// before they reach the NVIC.
unsafe impl InterruptNumber for Irq {
    #[inline]
    fn number(self) -> u16 {
        self.0
    }
}

/// Return address of every thread: a thread that falls off its entry
/// function kills itself.
extern "C" fn thread_exit() -> ! {
    let _ = KERNEL.kill_self();
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer for the scheduler tick.
///
/// Sets up SysTick to fire at `TICK_HZ` frequency using the processor
/// clock.
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Drop PendSV and SysTick to the lowest implemented priority, so neither
/// delays an aperiodic event.
pub fn set_kernel_priorities(scb: &mut SCB) {
    // SAFETY: lowering kernel exception priorities cannot break a priority
    // based critical section; the kernel uses PRIMASK.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, KERNEL_HW_PRIORITY);
        scb.set_priority(SystemHandler::SysTick, KERNEL_HW_PRIORITY);
    }
}

// ---------------------------------------------------------------------------
// First thread launch
// ---------------------------------------------------------------------------

/// Start the first thread by switching to PSP and branching to Thread mode.
///
/// Unwinds the primed frame by hand instead of taking an exception return.
///
/// # Safety
/// Must only be called once, from `launch`, with a primed context.
pub unsafe fn start_first_thread(context: ExecutionContext) -> ! {
    asm!(
        // Skip the software-saved R4–R11
        "adds r0, #32",
        "msr psp, r0",

        // Thread mode uses PSP from here on (CONTROL.SPSEL = 1)
        "movs r0, #2",
        "msr control, r0",
        "isb",

        // Pop the hardware frame
        "pop {{r0-r3, r12}}",
        "pop {{r4}}",          // LR: thread_exit
        "pop {{r5}}",          // PC: entry
        "pop {{r6}}",          // xPSR
        "mov lr, r4",
        "orr r5, r5, #1",      // Thumb bit for bx

        "cpsie i",
        "bx r5",

        in("r0") context.stack_pointer(),
        options(noreturn)
    );
}

// ---------------------------------------------------------------------------
// PendSV handler (context switch)
// ---------------------------------------------------------------------------

/// PendSV exception handler: performs the actual context switch.
///
/// ## Sequence
/// 1. Save R4–R11 onto the outgoing thread's stack (PSP)
/// 2. Hand the updated PSP to the kernel, which picks the next thread
/// 3. Restore R4–R11 from the returned stack
/// 4. Return from exception (hardware restores R0–R3, R12, LR, PC, xPSR)
///
/// # Safety
/// Naked function entered by the NVIC. Follows the Cortex-M4 exception
/// entry/exit convention; LR holds EXC_RETURN throughout.
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "mrs r0, psp",
        "stmdb r0!, {{r4-r11}}",

        // r3 keeps the stack 8-byte aligned across the call
        "push {{r3, lr}}",
        "bl {switch}",
        "pop {{r3, lr}}",

        "ldmia r0!, {{r4-r11}}",
        "msr psp, r0",
        "bx lr",

        switch = sym pendsv_switch,
    );
}

extern "C" fn pendsv_switch(psp: usize) -> usize {
    KERNEL
        .switch_context(ExecutionContext::new(psp))
        .stack_pointer()
}

// ---------------------------------------------------------------------------
// SysTick and external interrupts
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    KERNEL.tick();
}

/// Every external interrupt lands here; the kernel forwards it to the bound
/// aperiodic handler.
#[exception]
unsafe fn DefaultHandler(irqn: i16) {
    if irqn >= 0 && KERNEL.dispatch_aperiodic(irqn as u16) {
        return;
    }
    panic!("unhandled exception {}", irqn);
}
