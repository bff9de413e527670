use crate::tick::{TickCallback, TickSource};
use crate::{DeviceError, DeviceResult};
use log::{debug, trace, warn};
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A [TickSource] backed by a thread that calls the handler at a fixed rate.
///
/// Deadlines are absolute, so the rate doesn't drift with the time the handler takes. Ticks that
/// are missed entirely are dropped instead of being delivered in a burst.
pub struct ThreadTicker {
    period: Duration,
    callback: Option<TickCallback>,
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    handle: Option<JoinHandle<Option<TickCallback>>>,
}

impl ThreadTicker {
    pub fn new(period: Duration) -> Self {
        ThreadTicker {
            period,
            callback: None,
            running: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Changes the time between two ticks.
    ///
    /// # Errors
    /// - [DeviceError::InvalidArgument] while running.
    pub fn set_period(&mut self, period: Duration) -> DeviceResult<()> {
        if self.is_running() {
            return Err(DeviceError::InvalidArgument);
        }

        self.period = period;
        Ok(())
    }

    /// Gets the number of ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Starts calling the registered handler.
    ///
    /// The handler is only handed to the thread once it is running, so it stays registered when
    /// starting fails.
    ///
    /// # Errors
    /// - [DeviceError::NotConfigured] if no handler is registered.
    /// - [DeviceError::InvalidArgument] if already running or the period is zero.
    /// - [DeviceError::Io] if the thread could not be spawned.
    pub fn start(&mut self) -> DeviceResult<()> {
        if self.is_running() || self.period.is_zero() {
            return Err(DeviceError::InvalidArgument);
        }
        if self.callback.is_none() {
            return Err(DeviceError::NotConfigured);
        }

        let (handoff, receiver) = mpsc::channel::<TickCallback>();
        let period = self.period;
        let running = Arc::clone(&self.running);
        let ticks = Arc::clone(&self.ticks);
        running.store(true, Ordering::Release);

        let spawned = thread::Builder::new()
            .name("tick".to_string())
            .spawn(move || {
                let Ok(mut callback) = receiver.recv() else {
                    return None;
                };
                let mut deadline = Instant::now() + period;

                while running.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    }
                    if !running.load(Ordering::Acquire) {
                        break;
                    }

                    callback();
                    ticks.fetch_add(1, Ordering::Relaxed);

                    deadline += period;
                    let now = Instant::now();
                    if now > deadline + period {
                        trace!("Tick late by {:?}, skipping", now - deadline);
                        deadline = now + period;
                    }
                }

                Some(callback)
            });

        match spawned {
            Ok(handle) => {
                if let Some(callback) = self.callback.take() {
                    if let Err(mpsc::SendError(callback)) = handoff.send(callback) {
                        self.callback = Some(callback);
                    }
                }
                self.handle = Some(handle);
                debug!("Ticking every {:?}", period);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                warn!("Cannot spawn the tick thread: {}", err);
                Err(err.into())
            }
        }
    }

    /// Stops ticking and waits for the thread to finish. The handler stays registered.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        match handle.join() {
            Ok(Some(callback)) => self.callback = Some(callback),
            Ok(None) => {}
            Err(_) => warn!("Tick handler panicked, it has been dropped"),
        }
        debug!("Stopped ticking after {} ticks", self.ticks());
    }
}

impl TickSource for ThreadTicker {
    /// # Errors
    /// - [DeviceError::InvalidArgument] while running.
    fn register(&mut self, callback: TickCallback) -> DeviceResult<()> {
        if self.is_running() {
            return Err(DeviceError::InvalidArgument);
        }

        self.callback = Some(callback);
        Ok(())
    }

    fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Debug for ThreadTicker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ThreadTicker({:?}, running: {})", self.period, self.is_running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Arc<AtomicU64>, TickCallback) {
        let count = Arc::new(AtomicU64::new(0));
        let shared = Arc::clone(&count);
        let callback: TickCallback = Box::new(move || {
            shared.fetch_add(1, Ordering::Relaxed);
        });
        (count, callback)
    }

    #[test]
    fn start_requires_a_handler() {
        let mut ticker = ThreadTicker::new(Duration::from_millis(1));
        assert_eq!(ticker.start(), Err(DeviceError::NotConfigured));
        assert!(!ticker.is_running());
    }

    #[test]
    fn zero_period_is_rejected() {
        let (_, callback) = counter();
        let mut ticker = ThreadTicker::new(Duration::ZERO);
        ticker.register(callback).unwrap();
        assert_eq!(ticker.start(), Err(DeviceError::InvalidArgument));
    }

    #[test]
    fn failed_start_keeps_the_handler() {
        let (count, callback) = counter();
        let mut ticker = ThreadTicker::new(Duration::ZERO);
        ticker.register(callback).unwrap();
        assert_eq!(ticker.start(), Err(DeviceError::InvalidArgument));

        ticker.set_period(Duration::from_millis(1)).unwrap();
        ticker.start().unwrap();
        assert_eq!(ticker.set_period(Duration::from_millis(2)), Err(DeviceError::InvalidArgument));
        thread::sleep(Duration::from_millis(20));
        ticker.stop();

        assert!(count.load(Ordering::Relaxed) > 0);
        assert_eq!(ticker.period(), Duration::from_millis(1));
    }

    #[test]
    fn calls_the_handler_once_per_tick() {
        let (count, callback) = counter();
        let mut ticker = ThreadTicker::new(Duration::from_millis(1));
        ticker.register(callback).unwrap();

        ticker.start().unwrap();
        assert_eq!(ticker.start(), Err(DeviceError::InvalidArgument));
        thread::sleep(Duration::from_millis(50));
        ticker.stop();

        assert!(ticker.ticks() > 0);
        assert_eq!(count.load(Ordering::Relaxed), ticker.ticks());
    }

    #[test]
    fn handler_cannot_change_while_running() {
        let (_, callback) = counter();
        let (_, other) = counter();
        let mut ticker = ThreadTicker::new(Duration::from_millis(1));
        ticker.register(callback).unwrap();
        ticker.start().unwrap();

        assert_eq!(ticker.register(other), Err(DeviceError::InvalidArgument));
    }

    #[test]
    fn restarts_with_the_same_handler() {
        let (count, callback) = counter();
        let mut ticker = ThreadTicker::new(Duration::from_millis(1));
        ticker.register(callback).unwrap();

        ticker.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        ticker.stop();
        let first = count.load(Ordering::Relaxed);

        ticker.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        ticker.stop();
        assert!(count.load(Ordering::Relaxed) > first);
    }

    #[test]
    fn dropping_stops_the_thread() {
        let (count, callback) = counter();
        let mut ticker = ThreadTicker::new(Duration::from_millis(1));
        ticker.register(callback).unwrap();
        ticker.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        drop(ticker);

        let stopped = count.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::Relaxed), stopped);
    }
}
