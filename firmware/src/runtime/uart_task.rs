use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use crate::console::{CommandIntake, ConsoleQueues, REPORT_LINE_LEN};

const CONSOLE_UART_BUFFER_SIZE: usize = 2 * REPORT_LINE_LEN;
const CONSOLE_UART_BAUD: u32 = 115_200;
const READ_CHUNK: usize = 32;

static UART_TX_BUFFER: StaticCell<[u8; CONSOLE_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; CONSOLE_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

/// Writes queued report lines and assembles incoming command lines.
#[embassy_executor::task]
pub async fn run(
    console: &'static ConsoleQueues,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; CONSOLE_UART_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; CONSOLE_UART_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");

    let (mut uart_tx, mut uart_rx) = uart.split();

    let reports = console.report_receiver();
    let mut intake = CommandIntake::new(console.command_sender());

    let report_writer = async move {
        loop {
            let line = reports.receive().await;
            let mut ok = uart_tx.write_all(line.as_bytes()).await.is_ok();
            ok = ok && uart_tx.write_all(b"\r\n").await.is_ok();
            ok = ok && uart_tx.flush().await.is_ok();
            if !ok {
                defmt::warn!("console: UART write error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    };

    let command_reader = async move {
        let mut ingress = [0u8; READ_CHUNK];
        loop {
            match uart_rx.read(&mut ingress).await {
                Ok(count) if count > 0 => {
                    intake.ingest(&ingress[..count]);
                }
                Ok(_) => {}
                Err(_) => {
                    defmt::warn!("console: UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                }
            }
        }
    };

    join(report_writer, command_reader).await;
    loop {
        core::future::pending::<()>().await;
    }
}
