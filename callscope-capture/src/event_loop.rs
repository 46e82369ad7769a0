//! ## callscope-capture::event_loop
//! **Dedicated capture thread**
//!
//! The loop repeatedly calls a step function on its own thread. When a step
//! reports no work, the thread parks on a quit channel for the idle interval,
//! so a quit request wakes it immediately instead of waiting out a sleep.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error};

use crate::error::CaptureError;

/// What the loop should do after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Work was done, step again right away.
    Busy,
    /// Nothing to do, wait for the idle interval.
    Idle,
    /// Leave the loop.
    Quit,
}

pub struct EventLoop {
    quit_tx: Sender<()>,
    quit_rx: Receiver<()>,
    idle: Duration,
    thread: Option<JoinHandle<()>>,
    started: bool,
}

impl EventLoop {
    /// Creates a loop context; nothing runs until [`EventLoop::spawn`].
    pub fn new(idle: Duration) -> Self {
        let (quit_tx, quit_rx) = channel::bounded(1);
        Self {
            quit_tx,
            quit_rx,
            idle,
            thread: None,
            started: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Runs `step` on a new named thread until it returns [`Step::Quit`] or
    /// [`EventLoop::quit`] is called. A loop can only be spawned once.
    pub fn spawn<F>(&mut self, name: &str, mut step: F) -> Result<(), CaptureError>
    where
        F: FnMut() -> Step + Send + 'static,
    {
        if self.started {
            return Err(CaptureError::AlreadyStarted);
        }

        let quit = self.quit_rx.clone();
        let idle = self.idle;
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("Event loop running");
                loop {
                    match step() {
                        Step::Busy => continue,
                        Step::Quit => break,
                        Step::Idle => match quit.recv_timeout(idle) {
                            Err(RecvTimeoutError::Timeout) => {}
                            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        },
                    }
                }
                debug!("Event loop exited");
            })
            .map_err(CaptureError::Spawn)?;

        self.thread = Some(handle);
        self.started = true;
        Ok(())
    }

    /// Asks the loop to exit. Does not wait for it.
    pub fn quit(&self) {
        let _ = self.quit_tx.try_send(());
    }

    /// Blocks until the loop thread has exited. No timeout.
    pub fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.quit();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn quit_wakes_an_idle_loop() {
        let mut event_loop = EventLoop::new(Duration::from_secs(60));
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = steps.clone();
        event_loop
            .spawn("test-loop", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Step::Idle
            })
            .unwrap();

        while steps.load(Ordering::SeqCst) == 0 {
            thread::yield_now();
        }

        let started = Instant::now();
        event_loop.quit();
        event_loop.join();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!event_loop.is_running());
    }

    #[test]
    fn step_can_end_the_loop() {
        let mut event_loop = EventLoop::new(Duration::from_millis(1));
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = steps.clone();
        event_loop
            .spawn("test-loop", move || {
                if counter.fetch_add(1, Ordering::SeqCst) < 4 {
                    Step::Busy
                } else {
                    Step::Quit
                }
            })
            .unwrap();

        event_loop.join();
        assert_eq!(steps.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn cannot_spawn_twice() {
        let mut event_loop = EventLoop::new(Duration::from_millis(1));
        event_loop.spawn("once", || Step::Quit).unwrap();
        event_loop.join();
        assert!(matches!(
            event_loop.spawn("twice", || Step::Quit),
            Err(CaptureError::AlreadyStarted)
        ));
    }
}
