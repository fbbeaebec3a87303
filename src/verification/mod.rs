//! Checkout confirmation state machine.
//!
//! After the payment processor redirects back to the portal with a session
//! token, the backend still needs a moment to process the webhook that grants
//! access. This module bridges that gap:
//!
//! ```text
//! confirmation page mounts
//!         │
//!         ▼
//! ┌─────────────────────┐   token empty      ┌────────┐
//! │ Verifying           │───────────────────▶│ Failed │
//! │ (one verify call)   │   unpaid / error   └────────┘
//! └─────────┬───────────┘
//!           │ paid
//!           ▼
//! ┌─────────────────────┐   predicate true   ┌───────────┐
//! │ Polling (2s cycle)  │───────────────────▶│ Succeeded │
//! └─────────┬───────────┘                    └───────────┘
//!           │ budget spent
//!           ▼
//!     ┌───────────┐
//!     │ Exhausted │  (non-error: "still processing, check back")
//!     └───────────┘
//! ```
//!
//! The verify call happens exactly once and is never retried; poll errors are
//! absorbed and count against the attempt budget. All terminal phases stop
//! network activity for good, and cancelling (or dropping) the handle stops
//! the machine at its next suspension point.

mod machine;

pub use machine::{VerificationHandle, Verifier};

use std::fmt;

/// What a verification session is trying to confirm.
///
/// The target picks both the predicate polled against the backend and the
/// attempt budget: portal-wide access waits through 15 polls, a single course
/// enrollment through 10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationTarget {
    /// Portal-wide access entitlement.
    PortalAccess,
    /// Enrollment in one course.
    CourseEnrollment {
        /// Course identifier the enrollment webhook targets.
        course: String,
    },
}

impl VerificationTarget {
    /// Attempt budget for this target under the given configuration.
    #[must_use]
    pub fn max_attempts(&self, config: &crate::config::VerificationConfig) -> u32 {
        match self {
            Self::PortalAccess => config.portal_max_attempts,
            Self::CourseEnrollment { .. } => config.course_max_attempts,
        }
    }
}

impl fmt::Display for VerificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PortalAccess => write!(f, "portal access"),
            Self::CourseEnrollment { course } => write!(f, "enrollment in {course}"),
        }
    }
}

/// Why a verification session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The confirmation page was entered without a session token.
    MissingSession,
    /// The processor verified the session but it was never paid.
    NotPaid,
    /// The verify call itself failed; payment state is unknown.
    Unreachable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSession => write!(f, "missing session"),
            Self::NotPaid => write!(f, "payment not completed"),
            Self::Unreachable => write!(f, "could not verify"),
        }
    }
}

/// Observable phase of a verification session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// The one-time verify call is in flight.
    Verifying,
    /// Polling the access/enrollment predicate.
    Polling {
        /// Poll cycles issued so far, counting the one in flight (1-based).
        attempt: u32,
    },
    /// The predicate turned true; the caller should navigate to the target.
    Succeeded,
    /// Verification failed; no polling happened.
    Failed(FailureReason),
    /// Attempt budget spent without the predicate turning true.
    ///
    /// Not an error: the backend may still be processing the webhook, so
    /// callers show "still processing, check back" rather than a failure.
    Exhausted,
}

impl Phase {
    /// Whether the machine performs no further network activity.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Exhausted)
    }
}
