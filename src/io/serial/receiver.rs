// src/io/serial/receiver.rs
//
// Background receive loop. One per open session: pulls byte blocks from the
// session's read handle, decodes them and appends them to the display.
//
// The loop stops when the `receiving` flag is cleared or a read reports
// `Aborted`; either is observed within one read timeout. Transient read
// errors are retried after a short pause and never reach the user.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::session::SessionReader;
use crate::io::codec::{self, Decoded};
use crate::io::error::ReadError;
use crate::io::types::{LineSink, LineTag, LogLine};

/// Bytes requested per read.
pub const READ_BUFFER_SIZE: usize = 1024;

/// Pause after a transient read error, so a misbehaving device cannot spin the loop.
const ERROR_BACKOFF: Duration = Duration::from_millis(5);

/// Counters reported when the loop exits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiveStats {
    pub blocks: u64,
    pub bytes: u64,
    pub text_blocks: u64,
    pub hex_blocks: u64,
    pub transient_errors: u64,
}

/// Handle to the running receive thread.
pub struct ReceiveLoop {
    receiving: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    handle: Option<JoinHandle<ReceiveStats>>,
}

impl ReceiveLoop {
    /// Start the loop. `receiving` must already be set.
    pub fn spawn(
        mut reader: SessionReader,
        receiving: Arc<AtomicBool>,
        sink: Arc<dyn LineSink>,
    ) -> io::Result<Self> {
        let abort = reader.abort_flag();
        let flag = receiving.clone();
        let handle = thread::Builder::new()
            .name(format!("rx {}", reader.port()))
            .spawn(move || run_receive_loop(&mut reader, &flag, sink.as_ref()))?;

        Ok(Self {
            receiving,
            abort,
            handle: Some(handle),
        })
    }

    /// Clear the flag and abort any pending read. Does not wait.
    pub fn request_stop(&self) {
        self.receiving.store(false, Ordering::SeqCst);
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop and block until the thread has exited.
    pub fn await_exit(mut self) -> ReceiveStats {
        self.request_stop();
        self.join()
    }

    fn join(&mut self) -> ReceiveStats {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tlog!("[receiver] Receive thread panicked");
                ReceiveStats::default()
            }
            None => ReceiveStats::default(),
        }
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.request_stop();
            self.join();
        }
    }
}

/// Loop body, run on the receive thread.
pub(crate) fn run_receive_loop(
    reader: &mut SessionReader,
    receiving: &AtomicBool,
    sink: &dyn LineSink,
) -> ReceiveStats {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut stats = ReceiveStats::default();
    let mut error_streak = 0u32;

    while receiving.load(Ordering::SeqCst) {
        match reader.read_block(&mut buf) {
            Ok(0) => {
                // Idle timeout
            }
            Ok(n) => {
                error_streak = 0;
                stats.blocks += 1;
                stats.bytes += n as u64;

                let line = match codec::decode(&buf[..n]) {
                    Decoded::Text(text) => {
                        stats.text_blocks += 1;
                        LogLine::new(LineTag::Rx, text)
                    }
                    Decoded::Hex(hex) => {
                        stats.hex_blocks += 1;
                        LogLine::new(LineTag::RxHex, hex)
                    }
                };
                sink.append(line);
            }
            Err(ReadError::Aborted) => break,
            Err(ReadError::Transient(e)) => {
                stats.transient_errors += 1;
                if error_streak == 0 {
                    tlog!("[receiver:{}] Read error, retrying: {}", reader.port(), e);
                }
                error_streak = error_streak.saturating_add(1);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    tlog!(
        "[receiver:{}] Stopped after {} blocks ({} bytes, {} hex, {} read errors)",
        reader.port(),
        stats.blocks,
        stats.bytes,
        stats.hex_blocks,
        stats.transient_errors
    );
    stats
}

// ============================================================================
// Tests
// ============================================================================
