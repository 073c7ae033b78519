//! # Ringtide Demo Firmware
//!
//! Exercises every kernel service on a TM4C123 board:
//!
//! | Thread / event | Kind | Priority | Behavior |
//! |----------------|------|----------|----------|
//! | `idle_thread` | Thread | 255 | Sleeps the core until the next interrupt |
//! | `telemetry_thread` | Thread | 250 | Drains the sample FIFO, counts samples |
//! | `button_thread` | Thread | 251 | Waits on the button semaphore, debounces, reports |
//! | `report_thread` | Thread | 252 | Drains the button FIFO under the console lock |
//! | `sample_tick` | Periodic | every 50 ms | Writes the system time into the sample FIFO |
//! | `button_irq` | Aperiodic | 4 on GPIO port E | Masks itself and signals the button thread |
//!
//! ## Expected Behavior
//!
//! 1. `telemetry_thread` wakes every 50 ms, once per sample.
//! 2. A button press runs `button_irq`, which unblocks `button_thread`
//!    even while the telemetry thread is busy.
//! 3. After a 10 ms debounce sleep the press lands in the button FIFO and
//!    the line is unmasked again.

#![no_std]
#![no_main]

use core::cell::Cell;

use cortex_m::peripheral::NVIC;
use cortex_m_rt::entry;
use critical_section::Mutex;
use panic_halt as _;

use ringtide::kernel;
use ringtide::SemaphoreId;

const SAMPLE_FIFO: usize = 0;
const BUTTON_FIFO: usize = 1;

/// GPIO port E external interrupt line.
const GPIOE_IRQ: u16 = 4;

/// GPIO port E interrupt clear register (GPIOICR).
const GPIOE_ICR: *mut u32 = 0x4002_441C as *mut u32;

/// GPIO port E data register, all pins unmasked.
const GPIOE_DATA: *const u32 = 0x4002_43FC as *const u32;

static BUTTON_EVENT: Mutex<Cell<Option<SemaphoreId>>> = Mutex::new(Cell::new(None));
static CONSOLE: Mutex<Cell<Option<SemaphoreId>>> = Mutex::new(Cell::new(None));

#[derive(Clone, Copy)]
struct GpioE;

// SAFETY: 4 is GPIO port E on the TM4C123.
unsafe impl cortex_m::interrupt::InterruptNumber for GpioE {
    fn number(self) -> u16 {
        GPIOE_IRQ
    }
}

fn semaphore(slot: &Mutex<Cell<Option<SemaphoreId>>>) -> SemaphoreId {
    match critical_section::with(|cs| slot.borrow(cs).get()) {
        Some(sem) => sem,
        None => panic!("semaphore used before main created it"),
    }
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

extern "C" fn idle_thread() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}

extern "C" fn telemetry_thread() -> ! {
    let mut samples: u32 = 0;
    loop {
        if let Ok(_timestamp) = kernel::fifo_read(SAMPLE_FIFO) {
            samples = samples.wrapping_add(1);
        }
    }
}

/// Wakes on each button interrupt, debounces, and reports the pin state.
extern "C" fn button_thread() -> ! {
    let event = semaphore(&BUTTON_EVENT);
    loop {
        kernel::wait(event);
        kernel::sleep(10);

        // SAFETY: read-only access to a memory-mapped GPIO register.
        let pins = unsafe { core::ptr::read_volatile(GPIOE_DATA) };
        let _ = kernel::fifo_write(BUTTON_FIFO, pins & 0x3F);

        // SAFETY: the handler is bound; this only re-enables the line.
        unsafe { NVIC::unmask(GpioE) };
    }
}

extern "C" fn report_thread() -> ! {
    let console = semaphore(&CONSOLE);
    let mut presses: u32 = 0;
    loop {
        if let Ok(_pins) = kernel::fifo_read(BUTTON_FIFO) {
            kernel::wait(console);
            presses = presses.wrapping_add(1);
            kernel::signal(console);
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

fn sample_tick() {
    let _ = kernel::fifo_write(SAMPLE_FIFO, kernel::system_time() as u32);
}

fn button_irq() {
    NVIC::mask(GpioE);
    // SAFETY: write-one-to-clear on all port E pins.
    unsafe { core::ptr::write_volatile(GPIOE_ICR, 0xFF) };
    kernel::signal(semaphore(&BUTTON_EVENT));
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Creates the kernel objects and launches.
/// Does not return.
#[entry]
fn main() -> ! {
    let cp = cortex_m::Peripherals::take().unwrap();

    let button_event = kernel::create_semaphore(0).unwrap();
    let console = kernel::create_semaphore(1).unwrap();
    critical_section::with(|cs| {
        BUTTON_EVENT.borrow(cs).set(Some(button_event));
        CONSOLE.borrow(cs).set(Some(console));
    });

    kernel::fifo_init(SAMPLE_FIFO).unwrap();
    kernel::fifo_init(BUTTON_FIFO).unwrap();

    kernel::add_thread(idle_thread, 255, "idle").expect("Failed to add idle thread");
    kernel::add_thread(telemetry_thread, 250, "telemetry").expect("Failed to add telemetry thread");
    kernel::add_thread(button_thread, 251, "buttons").expect("Failed to add button thread");
    kernel::add_thread(report_thread, 252, "report").expect("Failed to add report thread");

    kernel::add_periodic_event(sample_tick, 50, 1).expect("Failed to add sample event");
    kernel::add_aperiodic_event(button_irq, 4, GPIOE_IRQ).expect("Failed to add button event");

    kernel::launch(cp)
}
