//! Background acquisition thread.
//!
//! Runs one sampling pass right away and then one per interval. The thread
//! blocks on a timed condition-variable wait: only a timeout starts a new
//! pass, so [`SamplerThread::wake`] lets the loop re-check its state
//! without resampling. Shutdown is cooperative and does not interrupt a
//! pass that is already running.

use crate::error::{PalError, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace};

#[derive(Debug, Default)]
struct Control {
    terminate: bool,
}

#[derive(Debug, Default)]
struct Shared {
    control: Mutex<Control>,
    cond: Condvar,
}

/// Owner of one periodic sampling thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct SamplerThread {
    name: String,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl SamplerThread {
    /// Spawns a thread that calls `pass` now and then every `interval`.
    pub fn spawn<P>(name: &str, interval: Duration, mut pass: P) -> Result<Self>
    where
        P: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let thread_shared = shared.clone();
        let thread_name = name.to_string();

        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(thread = %thread_name, ?interval, "sampler thread started");
                let mut deadline = Instant::now();
                let mut update = true;
                loop {
                    if update {
                        trace!(thread = %thread_name, "sampling pass");
                        pass();
                        deadline += interval;
                    }

                    let mut control = thread_shared.control.lock();
                    if control.terminate {
                        break;
                    }
                    let result = thread_shared.cond.wait_until(&mut control, deadline);
                    if control.terminate {
                        break;
                    }
                    update = result.timed_out();
                    if update && Instant::now() > deadline + interval {
                        // A pass overran by more than a whole interval; don't
                        // try to catch up on the missed ones.
                        deadline = Instant::now();
                    }
                }
                debug!(thread = %thread_name, "sampler thread stopped");
            })
            .map_err(|e| PalError::internal("spawn sampler thread", e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            shared,
            handle: Some(handle),
        })
    }

    /// Wakes the thread without requesting a sampling pass.
    pub fn wake(&self) {
        let _control = self.shared.control.lock();
        self.shared.cond.notify_all();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Requests termination and waits for the thread to exit.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut control = self.shared.control.lock();
            control.terminate = true;
            self.shared.cond.notify_all();
        }
        if handle.join().is_err() {
            error!(thread = %self.name, "sampler thread panicked");
        }
    }
}

impl Drop for SamplerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
