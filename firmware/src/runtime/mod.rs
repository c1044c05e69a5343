use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_time::Delay;
use portable_atomic::AtomicU32;

use anchor_core::TestHarness;
use anchor_core::config::HarnessConfig;
use anchor_core::markers::TimingMarkers;
use anchor_core::radio::NoopRanging;

use crate::board::{BoardButton, BoardClock, BoardRadio};
use crate::console::ConsoleQueues;

mod harness_task;
mod uart_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static CONSOLE: ConsoleQueues = ConsoleQueues::new();
pub(super) static DROPPED_REPORT_LINES: AtomicU32 = AtomicU32::new(0);

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA4,
        PA5,
        PB0,
        PB1,
        USART5,
        ..
    } = hal::init(config);

    // Marker A on PA4, marker B on PA5; both idle low.
    let markers = TimingMarkers::new(
        Output::new(PA4, Level::Low, Speed::VeryHigh),
        Output::new(PA5, Level::Low, Speed::VeryHigh),
        Delay,
    );
    let button = BoardButton::new(Input::new(PA0, Pull::Up));

    let harness = TestHarness::new(
        BoardClock,
        BoardRadio::new(),
        NoopRanging::new(),
        markers,
        HarnessConfig::default(),
    );

    spawner
        .spawn(uart_task::run(&CONSOLE, USART5, PB0, PB1))
        .expect("failed to spawn console UART task");

    spawner
        .spawn(harness_task::run(harness, button, &CONSOLE, &DROPPED_REPORT_LINES))
        .expect("failed to spawn harness task");

    core::future::pending::<()>().await;
}
