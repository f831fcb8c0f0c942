//! Background poller for the deck daemon
//!
//! The daemon answers slowly and stalls while the device is suspended, so
//! polling runs on its own thread. The latest report is published into a
//! single slot that the tick only reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::{DeckApi, DeckError, DeckReport};

/// A timeout usually means the device went to sleep
const TIMEOUT_PENALTY: u32 = 1;
const ERROR_PENALTY: u32 = 10;
const MAX_FAILURE_SCORE: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub poll_timeout: Duration,
    /// Pause after a timed-out poll
    pub timeout_backoff: Duration,
    /// How long `stop` waits for the thread before detaching it
    pub close_timeout: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(1),
            timeout_backoff: Duration::from_millis(500),
            close_timeout: Duration::from_secs(2),
        }
    }
}

pub type LatestReport = Arc<Mutex<Option<DeckReport>>>;

pub struct DeckPoller {
    latest: LatestReport,
    cancel: Arc<AtomicBool>,
    exited: Receiver<u32>,
    close_timeout: Duration,
}

impl DeckPoller {
    /// Move `api` onto a new poller thread
    ///
    /// `keyboard_requested` is checked between polls; when set the thread asks
    /// the daemon to show its on-screen keyboard.
    pub fn spawn(
        mut api: Box<dyn DeckApi>,
        settings: PollerSettings,
        keyboard_requested: Arc<AtomicBool>,
    ) -> Result<Self, DeckError> {
        let latest: LatestReport = Arc::new(Mutex::new(None));
        let cancel = Arc::new(AtomicBool::new(false));
        let (exit_tx, exited) = channel::bounded(1);

        let thread_latest = latest.clone();
        let thread_cancel = cancel.clone();
        thread::Builder::new()
            .name("deck-poller".to_string())
            .spawn(move || {
                poll_loop(
                    api.as_mut(),
                    settings,
                    &thread_latest,
                    &thread_cancel,
                    &keyboard_requested,
                    exit_tx,
                )
            })?;
        debug!("Deck poller thread started");

        Ok(Self {
            latest,
            cancel,
            exited,
            close_timeout: settings.close_timeout,
        })
    }

    /// Most recent report, if the daemon answered at least once
    pub fn latest(&self) -> Option<DeckReport> {
        self.latest.lock().clone()
    }

    /// Signal cancellation and wait a bounded time for the thread to finish
    ///
    /// Returns `false` if the thread did not finish in time and was detached.
    pub fn stop(&self) -> bool {
        self.cancel.store(true, Ordering::SeqCst);
        match self.exited.recv_timeout(self.close_timeout) {
            Ok(score) => {
                debug!("Deck poller stopped (failure score {})", score);
                true
            },
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Deck poller did not stop within {:?}, detaching",
                    self.close_timeout
                );
                false
            },
        }
    }
}

fn poll_loop(
    api: &mut dyn DeckApi,
    settings: PollerSettings,
    latest: &Mutex<Option<DeckReport>>,
    cancel: &AtomicBool,
    keyboard_requested: &AtomicBool,
    exit_tx: Sender<u32>,
) {
    let mut failure_score = 0;

    while !cancel.load(Ordering::SeqCst) && failure_score < MAX_FAILURE_SCORE {
        if keyboard_requested.swap(false, Ordering::SeqCst) {
            if let Err(e) = api.open_keyboard() {
                warn!("Failed to open deck keyboard: {}", e);
            }
        }

        match api.poll(settings.poll_timeout) {
            Ok(report) => *latest.lock() = Some(report),
            Err(DeckError::Timeout) => {
                debug!("Deck poll timed out, assuming the device is suspended");
                failure_score += TIMEOUT_PENALTY;
                thread::sleep(settings.timeout_backoff);
            },
            Err(e) => {
                error!("Deck poll failed: {}", e);
                failure_score += ERROR_PENALTY;
            },
        }
    }

    if failure_score >= MAX_FAILURE_SCORE {
        error!("Deck poller giving up after failure score {}", failure_score);
    }

    if let Err(e) = api.close() {
        warn!("Failed to close deck api: {}", e);
    }
    // The receiver may already be gone if the driver detached
    let _ = exit_tx.send(failure_score);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Plays back a fixed list of poll results, then times out forever
    struct Scripted {
        results: Vec<Result<DeckReport, DeckError>>,
        polls: Arc<AtomicUsize>,
        keyboards: Arc<AtomicUsize>,
    }

    impl DeckApi for Scripted {
        fn poll(&mut self, timeout: Duration) -> Result<DeckReport, DeckError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            if self.results.is_empty() {
                thread::sleep(timeout);
                return Err(DeckError::Timeout);
            }
            self.results.remove(0)
        }

        fn open_keyboard(&mut self) -> Result<(), DeckError> {
            self.keyboards.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast() -> PollerSettings {
        PollerSettings {
            poll_timeout: Duration::from_millis(5),
            timeout_backoff: Duration::from_millis(1),
            close_timeout: Duration::from_secs(2),
        }
    }

    fn scripted(results: Vec<Result<DeckReport, DeckError>>) -> (Box<dyn DeckApi>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let polls = Arc::new(AtomicUsize::new(0));
        let keyboards = Arc::new(AtomicUsize::new(0));
        let api = Scripted {
            results,
            polls: polls.clone(),
            keyboards: keyboards.clone(),
        };
        (Box::new(api), polls, keyboards)
    }

    #[test]
    fn test_publishes_latest_report() {
        let report = DeckReport {
            game_focused: true,
            ..DeckReport::default()
        };
        let (api, _, _) = scripted(vec![Ok(report.clone())]);
        let poller = DeckPoller::spawn(api, fast(), Arc::new(AtomicBool::new(false))).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while poller.latest().is_none() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(poller.latest(), Some(report));
        assert!(poller.stop());
    }

    #[test]
    fn test_gives_up_after_repeated_errors() {
        let errors = (0..5).map(|_| Err(DeckError::Api("socket closed".into()))).collect();
        let (api, polls, _) = scripted(errors);
        let poller = DeckPoller::spawn(api, fast(), Arc::new(AtomicBool::new(false))).unwrap();

        // Five errors reach the limit, the thread exits on its own
        let score = poller.exited.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(score, 50);
        assert_eq!(polls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_timeouts_count_one_each() {
        let (api, polls, _) = scripted(Vec::new());
        let poller = DeckPoller::spawn(api, fast(), Arc::new(AtomicBool::new(false))).unwrap();

        let score = poller.exited.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(score, 50);
        assert_eq!(polls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_keyboard_request_is_forwarded() {
        let (api, _, keyboards) = scripted(Vec::new());
        let requested = Arc::new(AtomicBool::new(true));
        let poller = DeckPoller::spawn(api, fast(), requested.clone()).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while keyboards.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(keyboards.load(Ordering::SeqCst), 1);
        assert!(!requested.load(Ordering::SeqCst));
        assert!(poller.stop());
    }
}
