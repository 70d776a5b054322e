//! Commit guard.
//!
//! For a short window after a measurement starts, leaving the dashboard
//! would abandon a session that has barely collected anything. The guard
//! installs an exit interceptor when armed and removes it once the window
//! has elapsed, the measurement is stopped, or the guard is dropped.

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Default commit window.
pub const COMMIT_WINDOW: Duration = Duration::from_secs(60);

/// Prompt shown when leaving during the commit window.
pub const EXIT_WARNING: &str =
    "A measurement started less than a minute ago. Leaving now may lose it. Quit anyway?";

/// Hook that asks for confirmation before the application exits.
pub trait ExitInterceptor: Send + Debug {
    fn install(&mut self, warning: &'static str);
    fn remove(&mut self);
}

/// Time-bounded protection of a running session.
pub trait SessionGuard {
    /// Start the window at `now`. No-op if already armed.
    fn arm(&mut self, now: Instant);
    /// Remove protection. Idempotent.
    fn disarm(&mut self);
    fn is_armed(&self) -> bool;
}

#[derive(Debug)]
pub struct CommitGuard {
    window: Duration,
    armed_at: Option<Instant>,
    interceptor: Box<dyn ExitInterceptor>,
}

impl CommitGuard {
    pub fn new(window: Duration, interceptor: Box<dyn ExitInterceptor>) -> Self {
        Self {
            window,
            armed_at: None,
            interceptor,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Time left in the window, or `None` when disarmed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let armed_at = self.armed_at?;
        Some(self.window.saturating_sub(now.saturating_duration_since(armed_at)))
    }

    /// Disarm if the window has elapsed by `now`. Returns `true` when it did.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed_at) if now.saturating_duration_since(armed_at) >= self.window => {
                info!("commit window elapsed");
                self.disarm();
                true
            }
            _ => false,
        }
    }
}

impl SessionGuard for CommitGuard {
    fn arm(&mut self, now: Instant) {
        if self.armed_at.is_some() {
            debug!("commit guard already armed");
            return;
        }
        self.armed_at = Some(now);
        self.interceptor.install(EXIT_WARNING);
        info!(window = ?self.window, "commit guard armed");
    }

    fn disarm(&mut self) {
        if self.armed_at.take().is_some() {
            self.interceptor.remove();
            debug!("commit guard disarmed");
        }
    }

    fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }
}

impl Drop for CommitGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Shared exit prompt checked by the UI before quitting.
#[derive(Debug, Clone, Default)]
pub struct ExitLock {
    warning: Arc<Mutex<Option<&'static str>>>,
}

impl ExitLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// The prompt to show before quitting, if exiting is guarded.
    pub fn warning(&self) -> Option<&'static str> {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, Option<&'static str>> {
        self.warning.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExitInterceptor for ExitLock {
    fn install(&mut self, warning: &'static str) {
        *self.lock() = Some(warning);
    }

    fn remove(&mut self) {
        *self.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Recorder {
        events: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ExitInterceptor for Recorder {
        fn install(&mut self, _warning: &'static str) {
            self.events.lock().unwrap().push("install");
        }

        fn remove(&mut self) {
            self.events.lock().unwrap().push("remove");
        }
    }

    #[test]
    fn test_arm_installs_once() {
        let recorder = Recorder::default();
        let mut guard = CommitGuard::new(COMMIT_WINDOW, Box::new(recorder.clone()));
        let now = Instant::now();

        guard.arm(now);
        guard.arm(now + Duration::from_secs(5));

        assert!(guard.is_armed());
        assert_eq!(recorder.events(), vec!["install"]);
        assert_eq!(guard.remaining(now + Duration::from_secs(10)), Some(Duration::from_secs(50)));
    }

    #[test]
    fn test_expires_after_window() {
        let lock = ExitLock::new();
        let mut guard = CommitGuard::new(COMMIT_WINDOW, Box::new(lock.clone()));
        let start = Instant::now();

        guard.arm(start);
        assert_eq!(lock.warning(), Some(EXIT_WARNING));

        assert!(!guard.poll_expired(start + Duration::from_secs(59)));
        assert!(guard.is_armed());

        assert!(guard.poll_expired(start + Duration::from_secs(60)));
        assert!(!guard.is_armed());
        assert_eq!(lock.warning(), None);
        assert_eq!(guard.remaining(start + Duration::from_secs(61)), None);
    }

    #[test]
    fn test_disarm_is_idempotent() {
        let recorder = Recorder::default();
        let mut guard = CommitGuard::new(COMMIT_WINDOW, Box::new(recorder.clone()));

        guard.disarm();
        guard.arm(Instant::now());
        guard.disarm();
        guard.disarm();

        assert_eq!(recorder.events(), vec!["install", "remove"]);
    }

    #[test]
    fn test_drop_removes_interceptor() {
        let lock = ExitLock::new();
        {
            let mut guard = CommitGuard::new(COMMIT_WINDOW, Box::new(lock.clone()));
            guard.arm(Instant::now());
            assert!(lock.warning().is_some());
        }
        assert!(lock.warning().is_none());
    }

    #[test]
    fn test_rearm_after_expiry_starts_new_window() {
        let lock = ExitLock::new();
        let mut guard = CommitGuard::new(Duration::from_secs(1), Box::new(lock.clone()));
        let start = Instant::now();

        guard.arm(start);
        guard.poll_expired(start + Duration::from_secs(1));
        guard.arm(start + Duration::from_secs(5));

        assert!(guard.is_armed());
        assert_eq!(
            guard.remaining(start + Duration::from_secs(5)),
            Some(Duration::from_secs(1))
        );
    }
}
