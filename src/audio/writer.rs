//! Background drain thread: ring consumer -> WAV sink.
//!
//! Runs on its own thread so the realtime callback never waits on disk.
//! Wakes on a fixed tick, drains in large batches to amortize write
//! syscalls, and performs one final drain on stop so no buffered audio is
//! lost at shutdown.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::debug;

use super::ring::RingConsumer;
use super::wav::WavSink;

/// Writer wake interval.
const DRAIN_INTERVAL_MS: u64 = 20;

/// Drain once the ring holds at least capacity / DRAIN_DIVISOR elements.
const DRAIN_DIVISOR: usize = 4;

/// How long to wait for the thread's readiness signal before giving up.
const READY_TIMEOUT_MS: u64 = 1_000;

/// Handle to the drain thread. Stop it before dropping to surface write
/// errors; drop performs a best-effort stop that swallows them.
pub struct DiskWriter {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl DiskWriter {
    /// Start the drain thread and block until it signals readiness, so the
    /// audio stream only starts once the consumer side is live.
    pub fn spawn(consumer: RingConsumer, sink: WavSink) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("wavetap-writer".to_string())
            .spawn(move || drain_loop(consumer, sink, stop_rx, ready_tx))
            .context("failed to spawn disk writer thread")?;
        ready_rx
            .recv_timeout(Duration::from_millis(READY_TIMEOUT_MS))
            .context("disk writer thread did not start")?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Request a stop, wait for the final drain, and return the thread's
    /// write result. Safe to call more than once; later calls are no-ops.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            // A dead thread has already dropped its receiver; join below
            // reports what happened to it.
            let _ = stop_tx.send(());
        }
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow!("disk writer thread panicked")),
            },
            None => Ok(()),
        }
    }
}

impl Drop for DiskWriter {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn drain_loop(
    mut consumer: RingConsumer,
    sink: WavSink,
    stop_rx: Receiver<()>,
    ready_tx: Sender<()>,
) -> Result<()> {
    let threshold = consumer.capacity() / DRAIN_DIVISOR;
    let ticker = tick(Duration::from_millis(DRAIN_INTERVAL_MS));
    let _ = ready_tx.send(());
    loop {
        select! {
            recv(stop_rx) -> _ => {
                // Stream is closed by the time stop arrives, so one last
                // drain empties the ring.
                let flushed = drain(&mut consumer, &sink)?;
                debug!(flushed, "final drain");
                return Ok(());
            }
            recv(ticker) -> _ => {
                if consumer.read_available() >= threshold {
                    drain(&mut consumer, &sink)?;
                }
            }
        }
    }
}

/// Append both occupied ring regions to the sink, in order, then commit.
fn drain(consumer: &mut RingConsumer, sink: &WavSink) -> Result<usize> {
    let total = {
        let (first, second) = consumer.read_regions();
        sink.append(first)?;
        sink.append(second)?;
        first.len() + second.len()
    };
    consumer.advance_read(total);
    Ok(total)
}

#[cfg(test)]
pub(super) fn drain_for_tests(consumer: &mut RingConsumer, sink: &WavSink) -> Result<usize> {
    drain(consumer, sink)
}
