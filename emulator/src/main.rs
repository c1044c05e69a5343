mod session;
mod sim;

use std::env;
use std::io::{self, BufRead};
use std::process;
use std::sync::mpsc::{self, TryRecvError};
use std::thread;
use std::time::Duration;

use anchor_core::channels::{CHANNEL_SLOTS, ChannelIndex};
use session::{Control, Session, SessionOptions};

const LOOP_PERIOD: Duration = Duration::from_millis(1);
const USAGE: &str = "Usage: anchor-emulator [--channel <1-6>] [--tag-interval <ms>] \
[--distance <m>] [--trace-pins] [--trace-radio] [--transcript <path>]";

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    eprintln!("UWB anchor emulator ready. Type `help` for commands or `exit` to quit.");
    let mut session = Session::new(&options)?;

    loop {
        match rx.try_recv() {
            Ok(line) => {
                if session.handle_input(&line) == Control::Exit {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        session.step();
        thread::sleep(LOOP_PERIOD);
    }

    eprintln!("Session closed after {} frames.", session.frames_sent());
    Ok(())
}

fn parse_options<I>(args: I) -> Result<SessionOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = SessionOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = |name: &str| {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {name}"))
        };

        match flag.as_str() {
            "--channel" => {
                let raw = value("--channel")?;
                let channel = raw
                    .parse::<u8>()
                    .ok()
                    .and_then(ChannelIndex::new)
                    .ok_or_else(|| format!("Channel must be 1-{CHANNEL_SLOTS}, got `{raw}`"))?;
                options.config = options.config.with_channel(channel);
            }
            "--tag-interval" => {
                let raw = value("--tag-interval")?;
                let millis = raw
                    .parse::<u64>()
                    .ok()
                    .filter(|ms| *ms > 0)
                    .ok_or_else(|| {
                        format!("Tag interval must be a positive integer, got `{raw}`")
                    })?;
                options.tag_interval = Duration::from_millis(millis);
            }
            "--distance" => {
                let raw = value("--distance")?;
                options.distance_m = raw
                    .parse::<f32>()
                    .ok()
                    .filter(|m| m.is_finite() && *m >= 0.0)
                    .ok_or_else(|| format!("Distance must be a non-negative number, got `{raw}`"))?;
            }
            "--transcript" => options.transcript = Some(value("--transcript")?),
            "--trace-pins" => options.trace_pins = true,
            "--trace-radio" => options.trace_radio = true,
            other => return Err(format!("Unknown option `{other}`")),
        }
    }

    Ok(options)
}
