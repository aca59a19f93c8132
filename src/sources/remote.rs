//! IR remote command source.
//!
//! The IR decoder calls [`RemoteDecoder::on_symbol`] from its own context
//! (an interrupt on the MCU, a reader thread here). The main loop picks the
//! command up with [`RemoteDecoder::take`]. The hand-off is a single atomic
//! slot: a new symbol overwrites one that was never taken.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::REMOTE_SYMBOLS;
use crate::messages::Command;

const EMPTY: u8 = 0;

fn encode(command: Command) -> u8 {
    match command {
        Command::Forward => 1,
        Command::Backward => 2,
        Command::Left => 3,
        Command::Right => 4,
        Command::Stop => 5,
        Command::Unknown => 6,
    }
}

fn decode(slot: u8) -> Option<Command> {
    match slot {
        1 => Some(Command::Forward),
        2 => Some(Command::Backward),
        3 => Some(Command::Left),
        4 => Some(Command::Right),
        5 => Some(Command::Stop),
        6 => Some(Command::Unknown),
        _ => None,
    }
}

/// Map a decoded NEC code to a command
pub fn command_for_code(code: i32) -> Command {
    REMOTE_SYMBOLS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, cmd)| *cmd)
        .unwrap_or(Command::Unknown)
}

/// Single-slot mailbox between the IR decoder and the main loop
#[derive(Debug, Default)]
pub struct RemoteDecoder {
    slot: AtomicU8,
}

impl RemoteDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit the command for `code`. Never blocks; overwrites any command
    /// still waiting. Repeat frames and decoder errors (code <= 0) are ignored.
    pub fn on_symbol(&self, code: i32) {
        if code <= 0 {
            return;
        }
        let command = command_for_code(code);
        if command == Command::Unknown {
            warn!("Unrecognized IR code: {:#x}", code);
        }
        self.slot.store(encode(command), Ordering::Release);
    }

    /// Take the pending command, leaving the slot empty
    pub fn take(&self) -> Option<Command> {
        decode(self.slot.swap(EMPTY, Ordering::AcqRel))
    }
}

/// Parse one line of decoder output, `0x`-prefixed hex or decimal
fn parse_code(line: &str) -> Option<i32> {
    let line = line.trim();
    match line.strip_prefix("0x").or_else(|| line.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16).ok(),
        None => line.parse().ok(),
    }
}

/// Feed codes from an external IR decoder stream (one per line) into `decoder`
/// on a dedicated thread, standing in for the receiver interrupt
pub fn spawn_symbol_reader<R>(reader: R, decoder: Arc<RemoteDecoder>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        info!("IR symbol reader started");
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("IR input read failed: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_code(&line) {
                Some(code) => {
                    debug!("IR code received: {:#x}", code);
                    decoder.on_symbol(code);
                }
                None => warn!("Unparseable IR code: {:?}", line),
            }
        }
        info!("IR symbol reader finished");
    })
}
