//! Backend and payment-processor contracts.
//!
//! The checkout confirmation flow talks to two remote collaborators:
//!
//! 1. The payment-processor proxy, asked exactly once per session whether a
//!    checkout session was actually paid ([`PaymentGateway`]).
//! 2. The portal backend, polled for the access/enrollment predicate until it
//!    turns true or the attempt budget runs out ([`AccessClient`]).
//!
//! The verification machine depends only on these traits; [`HttpGateway`] is
//! the production implementation against the portal's REST API, and tests
//! substitute scripted doubles.

mod http;

pub use http::HttpGateway;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Outcome of verifying a checkout session with the payment processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
pub struct PaymentReceipt {
    /// Whether the processor recorded the session as paid.
    pub paid: bool,
}

/// Payment-processor proxy contract.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Verify a checkout session with the payment processor.
    ///
    /// Called exactly once per verification session.
    ///
    /// # Errors
    ///
    /// Returns an error if the processor is unreachable or the response
    /// cannot be decoded. The caller treats any error as terminal.
    async fn verify_session(&self, session_token: &str) -> Result<PaymentReceipt>;
}

/// Portal backend predicate contract, polled during confirmation.
#[async_trait]
pub trait AccessClient: Send + Sync {
    /// When portal-wide access was granted to the current user, if ever.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable. Poll errors are
    /// absorbed by the caller and count as "not yet granted".
    async fn portal_access(&self) -> Result<Option<DateTime<Utc>>>;

    /// Whether the current user is enrolled in the given course.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable. Poll errors are
    /// absorbed by the caller and count as "not enrolled yet".
    async fn course_enrollment(&self, course: &str) -> Result<bool>;
}
