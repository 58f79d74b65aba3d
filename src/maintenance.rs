//! Background Maintenance
//!
//! A worker thread that keeps the engine in shape without caller involvement.
//!
//! ## Each pass
//! 1. Flush the MemTable if it reached its limits
//! 2. Run one compaction
//! 3. Drop expired segments
//!
//! A pass runs on every tick of the configured interval and on `trigger()`.
//! Errors are logged and the next pass retries.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::engine::Engine;
use crate::error::{FluxError, Result};

enum Signal {
    Trigger,
    Shutdown,
}

/// Spawns the maintenance thread
pub struct MaintenanceWorker;

impl MaintenanceWorker {
    /// Start a worker over `engine`, ticking every
    /// `config.maintenance_interval_ms`
    pub fn spawn(engine: Arc<Engine>) -> Result<MaintenanceHandle> {
        let interval = Duration::from_millis(engine.config().maintenance_interval_ms);
        let (tx, rx) = channel::unbounded::<Signal>();

        let thread = thread::Builder::new()
            .name("fluxlsm-maintenance".into())
            .spawn(move || {
                let ticker = channel::tick(interval);
                let mut run_id = 0u64;
                tracing::debug!(interval_ms = interval.as_millis() as u64, "Maintenance started");

                loop {
                    channel::select! {
                        recv(ticker) -> _ => {}
                        recv(rx) -> signal => match signal {
                            Ok(Signal::Trigger) => {}
                            Ok(Signal::Shutdown) | Err(_) => break,
                        },
                    }

                    run_id += 1;
                    if let Err(e) = run_pass(&engine) {
                        tracing::error!(run_id, error = %e, "Maintenance pass failed");
                    }
                }

                tracing::info!(runs = run_id, "Maintenance shutting down");
            })?;

        Ok(MaintenanceHandle {
            tx,
            thread: Some(thread),
        })
    }
}

/// One flush / compact / expire pass
pub fn run_pass(engine: &Engine) -> Result<()> {
    if engine.should_flush() {
        engine.flush()?;
    }
    engine.compact()?;
    engine.expire()?;
    Ok(())
}

/// Control handle for a running worker; shuts the worker down when dropped
pub struct MaintenanceHandle {
    tx: Sender<Signal>,
    thread: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Request a pass without waiting for the next tick
    pub fn trigger(&self) {
        let _ = self.tx.send(Signal::Trigger);
    }

    /// Stop the worker and wait for it to exit
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let _ = self.tx.send(Signal::Shutdown);
        thread
            .join()
            .map_err(|_| FluxError::Storage("maintenance thread panicked".into()))
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "Maintenance worker did not stop cleanly");
        }
    }
}
