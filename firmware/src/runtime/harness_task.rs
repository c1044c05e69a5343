use embassy_futures::yield_now;
use portable_atomic::AtomicU32;

use crate::board::{BoardButton, BoardHarness};
use crate::console::{ConsoleQueues, QueuedCommands, UartReportSink};

/// Runs the harness main loop, yielding to the UART task between iterations.
#[embassy_executor::task]
pub async fn run(
    mut harness: BoardHarness,
    mut button: BoardButton,
    console: &'static ConsoleQueues,
    dropped: &'static AtomicU32,
) -> ! {
    let mut sink = UartReportSink::new(console.report_sender(), dropped);
    let mut commands = QueuedCommands::new(console.command_receiver());

    harness.begin(&mut sink);
    defmt::info!("harness: ready on channel slot {}", harness.channel().get());

    loop {
        harness.dispatch(&mut button, &mut commands, &mut sink);
        yield_now().await;
    }
}
