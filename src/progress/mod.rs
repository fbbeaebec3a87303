//! Device-local lesson progress and notes.
//!
//! Resume positions and freeform notes are per-device conveniences, not
//! account data: this store never talks to the backend. Records live as JSON
//! under the client data directory, one `progress.json` object for all resume
//! positions and one array file per lesson for notes, mirroring the key space
//! the web player uses in browser-local storage.
//!
//! Durability is intentionally best-effort. Every storage failure (quota,
//! permissions, serialization, a corrupted file) is swallowed: the player
//! degrades to "no resume position / no notes" and never shows a storage
//! error. Two retention rules keep resume data useful:
//!
//! - a position within 5 seconds of the end is evicted on write (finished
//!   videos are not worth resuming);
//! - a position older than 30 days is never returned by a read, even though
//!   the entry stays on disk until the next write.
//!
//! Notes have no eviction policy and accumulate indefinitely.

mod store;

pub use store::ProgressStore;

use serde::{Deserialize, Serialize};

/// Resume position for one lesson's video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressRecord {
    /// Playback position in seconds.
    pub current_time_seconds: f64,
    /// Video duration in seconds.
    pub duration_seconds: f64,
    /// When this record was last written (epoch milliseconds).
    pub saved_at_epoch_ms: i64,
}

/// One freeform note attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonNote {
    /// Opaque unique token.
    pub id: String,
    /// Trimmed, non-empty note text.
    pub content: String,
    /// When the note was created (epoch milliseconds).
    pub created_at_epoch_ms: i64,
}
