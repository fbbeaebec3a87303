//! Client core for the LearnHub training portal.
//!
//! The portal frontend is a thin presentation layer over a REST backend; the
//! two pieces with real invariants live here, UI-free, so they can be tested
//! rigorously and reused by any shell (desktop app, headless tool, embedded
//! webview host):
//!
//! 1. **Checkout confirmation** ([`verification`]): after the payment gateway
//!    redirects back with a session token, verify the payment exactly once,
//!    then poll the backend's access/enrollment predicate on a fixed interval
//!    until it turns true or a bounded attempt budget runs out.
//! 2. **Lesson progress** ([`progress`]): device-local persistence of video
//!    resume positions and freeform lesson notes, with eviction of
//!    near-complete and stale records. Never synced to the backend.
//!
//! Supporting modules: [`gateway`] (the backend/payment-processor contracts
//! plus a reqwest implementation), [`auth`] (the application-scoped session
//! container route guards read from), [`config`].

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod progress;
pub mod verification;

pub use auth::{AuthSession, AuthStore};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use gateway::{AccessClient, HttpGateway, PaymentGateway, PaymentReceipt};
pub use progress::{LessonNote, ProgressStore};
pub use verification::{FailureReason, Phase, VerificationHandle, VerificationTarget, Verifier};
