// ABOUTME: Raw-mode terminal query probe with a fixed reply timeout
// ABOUTME: Asks for device attributes and checks the reply for Sixel support

use crate::constants::timeouts::QUERY_TIMEOUT;
use crossterm::terminal;
use std::io::{self, IsTerminal, Read, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Primary device attributes request
pub const DEVICE_ATTRIBUTES: &str = "\x1b[c";

/// Write `query` to the terminal and collect the reply up to `terminator`.
///
/// Returns an empty string when stdin is not a terminal, when raw mode is
/// unavailable, or when nothing arrives within `timeout`.
pub fn query_terminal(query: &str, terminator: u8, timeout: Duration) -> String {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return String::new();
    }

    if let Err(e) = terminal::enable_raw_mode() {
        log::debug!("Raw mode unavailable for terminal query: {}", e);
        return String::new();
    }

    let reply = send_and_wait(query, terminator, timeout);

    if let Err(e) = terminal::disable_raw_mode() {
        log::warn!("Failed to restore terminal mode after query: {}", e);
    }

    reply
}

fn send_and_wait(query: &str, terminator: u8, timeout: Duration) -> String {
    let mut stdout = io::stdout();
    if stdout
        .write_all(query.as_bytes())
        .and_then(|_| stdout.flush())
        .is_err()
    {
        return String::new();
    }

    let (tx, rx) = mpsc::channel();
    // The reader cannot be interrupted; after a timeout it exits on the next byte
    thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        while let Ok(1) = stdin.read(&mut byte) {
            reply.push(byte[0]);
            if byte[0] == terminator {
                break;
            }
        }
        let _ = tx.send(reply);
    });

    match rx.recv_timeout(timeout) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => {
            log::debug!("Terminal query timed out after {:?}", timeout);
            String::new()
        }
    }
}

/// Ask for primary device attributes; empty when the terminal stays silent
pub fn query_device_attributes() -> String {
    query_terminal(DEVICE_ATTRIBUTES, b'c', QUERY_TIMEOUT)
}

/// Whether a device attributes reply lists Sixel graphics (attribute 4)
pub fn reply_advertises_sixel(reply: &str) -> bool {
    let Some(start) = reply.find("[?") else {
        return false;
    };
    let body = reply[start + 2..].trim_end_matches('c');
    body.split(';').any(|attr| attr == "4")
}
