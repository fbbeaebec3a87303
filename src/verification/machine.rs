//! Driver for the checkout confirmation state machine.

use crate::config::VerificationConfig;
use crate::gateway::{AccessClient, PaymentGateway};
use crate::verification::{FailureReason, Phase, VerificationTarget};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Starts verification sessions against a payment gateway and access backend.
///
/// The verifier itself is cheap to clone and holds no per-session state; each
/// [`start`](Self::start) call spawns an independent session task, so two
/// concurrent sessions (two confirmation pages) never share mutable state.
#[derive(Clone)]
pub struct Verifier {
    gateway: Arc<dyn PaymentGateway>,
    access: Arc<dyn AccessClient>,
    config: VerificationConfig,
}

impl Verifier {
    /// Create a verifier over the given collaborators.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        access: Arc<dyn AccessClient>,
        config: VerificationConfig,
    ) -> Self {
        Self {
            gateway,
            access,
            config,
        }
    }

    /// Start a verification session.
    ///
    /// An empty (or whitespace) session token fails immediately with
    /// [`FailureReason::MissingSession`] and no network call is made.
    /// Otherwise the session runs on a spawned task: one verify call, then
    /// bounded polling of the target predicate. Progress is observable
    /// through the returned handle.
    #[must_use]
    pub fn start(
        &self,
        session_token: impl Into<String>,
        target: VerificationTarget,
    ) -> VerificationHandle {
        let session_token = session_token.into();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        if session_token.trim().is_empty() {
            warn!("Confirmation entered without a session token");
            let (_, phase_rx) = watch::channel(Phase::Failed(FailureReason::MissingSession));
            return VerificationHandle {
                phase_rx,
                cancel_tx,
                task: None,
            };
        }

        let (phase_tx, phase_rx) = watch::channel(Phase::Verifying);
        let session = Session {
            gateway: Arc::clone(&self.gateway),
            access: Arc::clone(&self.access),
            token: session_token,
            max_attempts: target.max_attempts(&self.config),
            poll_interval: self.config.poll_interval(),
            target,
            phase_tx,
            cancel_rx,
        };

        let task = tokio::spawn(session.run());

        VerificationHandle {
            phase_rx,
            cancel_tx,
            task: Some(task),
        }
    }
}

/// Handle to a running verification session.
///
/// Dropping the handle cancels the session: the task observes the closed
/// cancel channel at its next suspension point and stops without emitting
/// further phases or issuing further calls.
pub struct VerificationHandle {
    phase_rx: watch::Receiver<Phase>,
    cancel_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl VerificationHandle {
    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase_rx.borrow().clone()
    }

    /// Subscribe to phase changes (for UI observers).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase_rx.clone()
    }

    /// Stop the session. Idempotent; a cancelled session emits no further
    /// phases and issues no further network calls.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Wait for the session to reach a terminal phase and return it.
    ///
    /// If the session was cancelled before reaching a terminal phase, the
    /// last observed phase is returned as-is.
    pub async fn outcome(mut self) -> Phase {
        loop {
            let current = self.phase_rx.borrow().clone();
            if current.is_terminal() {
                // Let the task finish emitting logs before returning.
                if let Some(task) = self.task.take() {
                    let _ = task.await;
                }
                return current;
            }
            if self.phase_rx.changed().await.is_err() {
                return self.phase_rx.borrow().clone();
            }
        }
    }
}

/// One in-flight verification session.
struct Session {
    gateway: Arc<dyn PaymentGateway>,
    access: Arc<dyn AccessClient>,
    token: String,
    target: VerificationTarget,
    max_attempts: u32,
    poll_interval: Duration,
    phase_tx: watch::Sender<Phase>,
    cancel_rx: watch::Receiver<bool>,
}

impl Session {
    async fn run(self) {
        let Self {
            gateway,
            access,
            token,
            target,
            max_attempts,
            poll_interval,
            phase_tx,
            mut cancel_rx,
        } = self;

        // Verify exactly once. A failed verify is terminal and never falls
        // through to polling. Cancellation is checked first in every select
        // so a torn-down session never observes another call result.
        let receipt = tokio::select! {
            biased;
            () = cancelled(&mut cancel_rx) => {
                debug!("Verification cancelled during verify call");
                return;
            }
            receipt = gateway.verify_session(&token) => receipt,
        };

        match receipt {
            Ok(receipt) if receipt.paid => {
                info!("Checkout session verified as paid, polling for {target}");
            }
            Ok(_) => {
                warn!("Checkout session reported unpaid");
                let _ = phase_tx.send(Phase::Failed(FailureReason::NotPaid));
                return;
            }
            Err(e) => {
                warn!("Could not verify checkout session: {e}");
                let _ = phase_tx.send(Phase::Failed(FailureReason::Unreachable));
                return;
            }
        }

        if max_attempts == 0 {
            let _ = phase_tx.send(Phase::Exhausted);
            return;
        }

        for attempt in 1..=max_attempts {
            let _ = phase_tx.send(Phase::Polling { attempt });

            let satisfied = tokio::select! {
                biased;
                () = cancelled(&mut cancel_rx) => {
                    debug!("Verification cancelled during poll {attempt}");
                    return;
                }
                satisfied = check_predicate(access.as_ref(), &target) => satisfied,
            };

            if satisfied {
                info!("{target} confirmed after {attempt} poll(s)");
                let _ = phase_tx.send(Phase::Succeeded);
                return;
            }

            if attempt == max_attempts {
                break;
            }

            tokio::select! {
                biased;
                () = cancelled(&mut cancel_rx) => {
                    debug!("Verification cancelled between polls");
                    return;
                }
                () = tokio::time::sleep(poll_interval) => {}
            }
        }

        info!("{target} not confirmed after {max_attempts} polls, giving up");
        let _ = phase_tx.send(Phase::Exhausted);
    }
}

/// One poll of the target predicate. Backend errors count as "not yet".
async fn check_predicate(access: &dyn AccessClient, target: &VerificationTarget) -> bool {
    match target {
        VerificationTarget::PortalAccess => match access.portal_access().await {
            Ok(granted_at) => granted_at.is_some(),
            Err(e) => {
                debug!("Portal access poll failed, treating as not yet granted: {e}");
                false
            }
        },
        VerificationTarget::CourseEnrollment { course } => {
            match access.course_enrollment(course).await {
                Ok(enrolled) => enrolled,
                Err(e) => {
                    debug!("Enrollment poll failed, treating as not yet enrolled: {e}");
                    false
                }
            }
        }
    }
}

/// Resolves when cancellation is requested or the handle is dropped.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if *rx.borrow() {
        return;
    }
    loop {
        if rx.changed().await.is_err() {
            // Handle dropped: treat as cancellation.
            return;
        }
        if *rx.borrow() {
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::gateway::PaymentReceipt;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Gateway double: `None` scripts a transport error.
    struct ScriptedGateway {
        paid: Option<bool>,
        calls: AtomicU32,
    }

    impl ScriptedGateway {
        fn paid() -> Self {
            Self {
                paid: Some(true),
                calls: AtomicU32::new(0),
            }
        }

        fn unpaid() -> Self {
            Self {
                paid: Some(false),
                calls: AtomicU32::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                paid: None,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for ScriptedGateway {
        async fn verify_session(&self, _session_token: &str) -> Result<PaymentReceipt> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.paid {
                Some(paid) => Ok(PaymentReceipt { paid }),
                None => Err(Error::Gateway("connection refused".into())),
            }
        }
    }

    /// Access double: predicate turns true on the `grant_on`-th poll
    /// (1-based); polls listed in `error_on` fail with a transport error.
    struct ScriptedAccess {
        grant_on: Option<u32>,
        error_on: Vec<u32>,
        calls: AtomicU32,
    }

    impl ScriptedAccess {
        fn granting_on(attempt: u32) -> Self {
            Self {
                grant_on: Some(attempt),
                error_on: Vec::new(),
                calls: AtomicU32::new(0),
            }
        }

        fn never_granting() -> Self {
            Self {
                grant_on: None,
                error_on: Vec::new(),
                calls: AtomicU32::new(0),
            }
        }

        fn poll(&self) -> Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.error_on.contains(&call) {
                return Err(Error::Gateway("backend hiccup".into()));
            }
            Ok(self.grant_on == Some(call))
        }
    }

    #[async_trait]
    impl AccessClient for ScriptedAccess {
        async fn portal_access(&self) -> Result<Option<DateTime<Utc>>> {
            self.poll().map(|granted| granted.then(Utc::now))
        }

        async fn course_enrollment(&self, _course: &str) -> Result<bool> {
            self.poll()
        }
    }

    fn verifier(gateway: &Arc<ScriptedGateway>, access: &Arc<ScriptedAccess>) -> Verifier {
        let gw: Arc<dyn PaymentGateway> = Arc::<ScriptedGateway>::clone(gateway);
        let ac: Arc<dyn AccessClient> = Arc::<ScriptedAccess>::clone(access);
        Verifier::new(gw, ac, VerificationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn empty_token_fails_without_network() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::granting_on(1));
        let handle = verifier(&gateway, &access).start("   ", VerificationTarget::PortalAccess);

        assert_eq!(
            handle.outcome().await,
            Phase::Failed(FailureReason::MissingSession)
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(access.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unpaid_session_never_polls() {
        let gateway = Arc::new(ScriptedGateway::unpaid());
        let access = Arc::new(ScriptedAccess::granting_on(1));
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        assert_eq!(handle.outcome().await, Phase::Failed(FailureReason::NotPaid));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(access.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn verify_error_never_polls_and_never_retries() {
        let gateway = Arc::new(ScriptedGateway::unreachable());
        let access = Arc::new(ScriptedAccess::granting_on(1));
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        assert_eq!(
            handle.outcome().await,
            Phase::Failed(FailureReason::Unreachable)
        );
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(access.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_k_polls_with_interval_spacing() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::granting_on(5));
        let started = tokio::time::Instant::now();

        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        assert_eq!(handle.outcome().await, Phase::Succeeded);
        assert_eq!(access.calls.load(Ordering::SeqCst), 5);
        // Four sleeps separate five polls.
        assert!(started.elapsed() >= Duration::from_millis(4 * 2000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_budget_without_error() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::never_granting());
        let handle = verifier(&gateway, &access).start(
            "sess_abc",
            VerificationTarget::CourseEnrollment {
                course: "course_42".into(),
            },
        );

        assert_eq!(handle.outcome().await, Phase::Exhausted);
        assert_eq!(access.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_count_against_budget_but_do_not_abort() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess {
            grant_on: Some(3),
            error_on: vec![1, 2],
            calls: AtomicU32::new(0),
        });
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        assert_eq!(handle.outcome().await, Phase::Succeeded);
        assert_eq!(access.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn all_polls_erroring_exhausts_exactly_at_budget() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess {
            grant_on: None,
            error_on: (1..=15).collect(),
            calls: AtomicU32::new(0),
        });
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        assert_eq!(handle.outcome().await, Phase::Exhausted);
        assert_eq!(access.calls.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_polling() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::never_granting());
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        // Let the first poll land, then cancel during the sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let polls_before = access.calls.load(Ordering::SeqCst);
        assert!(polls_before >= 1);
        handle.cancel();

        // Even after the budget's worth of time passes, no further polls.
        tokio::time::sleep(Duration::from_millis(16 * 2000)).await;
        assert_eq!(access.calls.load(Ordering::SeqCst), polls_before);
        assert!(!handle.phase().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::never_granting());
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let polls_before = access.calls.load(Ordering::SeqCst);
        drop(handle);

        tokio::time::sleep(Duration::from_millis(16 * 2000)).await;
        assert_eq!(access.calls.load(Ordering::SeqCst), polls_before);
    }

    #[tokio::test(start_paused = true)]
    async fn phase_stream_reports_polling_attempts() {
        let gateway = Arc::new(ScriptedGateway::paid());
        let access = Arc::new(ScriptedAccess::granting_on(2));
        let handle =
            verifier(&gateway, &access).start("sess_abc", VerificationTarget::PortalAccess);
        let mut phases = handle.subscribe();

        let mut seen = vec![phases.borrow().clone()];
        while phases.changed().await.is_ok() {
            seen.push(phases.borrow().clone());
            if seen.last().map(Phase::is_terminal) == Some(true) {
                break;
            }
        }

        assert_eq!(seen.first(), Some(&Phase::Verifying));
        // The watch channel coalesces rapid updates, so assert on the shape
        // of the stream rather than every intermediate attempt number.
        assert!(seen.iter().any(|p| matches!(p, Phase::Polling { .. })));
        assert_eq!(seen.last(), Some(&Phase::Succeeded));
    }
}
