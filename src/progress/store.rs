//! File-backed store for resume positions and lesson notes.

use crate::config::ProgressConfig;
use crate::progress::{LessonNote, LessonProgressRecord};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Monotonic suffix so two notes created in the same millisecond still get
/// distinct ids.
static NOTE_SEQ: AtomicU32 = AtomicU32::new(0);

/// Device-local store for [`LessonProgressRecord`]s and [`LessonNote`]s.
///
/// Cloning is cheap; clones share one in-process lock so concurrent writers
/// (a player saving progress while a note is added) serialise their
/// read-modify-write cycles. Across processes the policy is last-writer-wins,
/// which is acceptable because one user's device runs one active player.
///
/// No method of this store returns an error: invalid input makes the call a
/// no-op and storage failures degrade to "nothing saved".
#[derive(Clone)]
pub struct ProgressStore {
    dir: PathBuf,
    policy: ProgressConfig,
    io_lock: Arc<Mutex<()>>,
}

impl ProgressStore {
    /// Open (or create) a store rooted at `dir`.
    ///
    /// Directory creation failure is swallowed like every other storage
    /// failure; the store then behaves as permanently empty.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>, policy: ProgressConfig) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            debug!("Could not create progress directory {}: {e}", dir.display());
        }
        Self {
            dir,
            policy,
            io_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record the playback position for a lesson, overwriting any previous
    /// record.
    ///
    /// No-op if `lesson_id` is empty or either time value is non-finite or
    /// negative. A position within the resume threshold of the end evicts the
    /// record instead: a nearly finished video is not worth resuming.
    pub fn save_progress(&self, lesson_id: &str, current_time: f64, duration: f64) {
        if lesson_id.is_empty() {
            debug!("Ignoring progress write with empty lesson id");
            return;
        }
        if !current_time.is_finite() || !duration.is_finite() || current_time < 0.0 || duration < 0.0
        {
            debug!("Ignoring progress write with invalid times for {lesson_id}");
            return;
        }

        let _guard = self.io_lock.lock();
        let mut records = self.read_records();

        if duration - current_time > self.policy.resume_threshold_secs {
            records.insert(
                lesson_id.to_string(),
                LessonProgressRecord {
                    current_time_seconds: current_time,
                    duration_seconds: duration,
                    saved_at_epoch_ms: Utc::now().timestamp_millis(),
                },
            );
        } else {
            // Near the end: evict rather than store a useless resume point.
            records.remove(lesson_id);
        }

        self.write_json(&self.progress_path(), &records);
    }

    /// Saved playback position for a lesson, in seconds.
    ///
    /// Absent if no record exists, the record is older than the retention
    /// window, or the stored position is not past the start.
    #[must_use]
    pub fn saved_progress(&self, lesson_id: &str) -> Option<f64> {
        let _guard = self.io_lock.lock();
        let records = self.read_records();
        let record = records.get(lesson_id)?;

        let cutoff = Utc::now() - chrono::Duration::days(self.policy.retention_days);
        if record.saved_at_epoch_ms < cutoff.timestamp_millis() {
            debug!("Resume position for {lesson_id} is stale, ignoring");
            return None;
        }
        if record.current_time_seconds <= 0.0 {
            return None;
        }
        Some(record.current_time_seconds)
    }

    /// Add a note to a lesson, newest first.
    ///
    /// Returns the stored note, or `None` if the trimmed content is empty.
    /// Newest-first ordering is maintained in storage, not applied at read
    /// time.
    pub fn add_note(&self, lesson_id: &str, content: &str) -> Option<LessonNote> {
        let content = content.trim();
        if lesson_id.is_empty() || content.is_empty() {
            return None;
        }

        let now = Utc::now().timestamp_millis();
        let seq = NOTE_SEQ.fetch_add(1, Ordering::Relaxed);
        let note = LessonNote {
            id: format!("note-{now:x}-{seq:04x}"),
            content: content.to_string(),
            created_at_epoch_ms: now,
        };

        let _guard = self.io_lock.lock();
        let mut notes = self.read_notes(lesson_id);
        notes.insert(0, note.clone());
        self.write_json(&self.notes_path(lesson_id), &notes);

        Some(note)
    }

    /// Delete a note by id. Silent no-op if the note does not exist.
    pub fn delete_note(&self, lesson_id: &str, note_id: &str) {
        let _guard = self.io_lock.lock();
        let mut notes = self.read_notes(lesson_id);
        let before = notes.len();
        notes.retain(|note| note.id != note_id);
        if notes.len() != before {
            self.write_json(&self.notes_path(lesson_id), &notes);
        }
    }

    /// All notes for a lesson, newest first.
    ///
    /// Empty if storage is absent, unreadable, or malformed.
    #[must_use]
    pub fn notes(&self, lesson_id: &str) -> Vec<LessonNote> {
        let _guard = self.io_lock.lock();
        self.read_notes(lesson_id)
    }

    fn progress_path(&self) -> PathBuf {
        self.dir.join("progress.json")
    }

    fn notes_path(&self, lesson_id: &str) -> PathBuf {
        self.dir.join(format!("notes.{}.json", file_key(lesson_id)))
    }

    fn read_records(&self) -> HashMap<String, LessonProgressRecord> {
        read_json(&self.progress_path()).unwrap_or_default()
    }

    fn read_notes(&self, lesson_id: &str) -> Vec<LessonNote> {
        read_json(&self.notes_path(lesson_id)).unwrap_or_default()
    }

    fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Could not serialize {}: {e}", path.display());
                return;
            }
        };
        if let Err(e) = std::fs::write(path, payload) {
            debug!("Could not write {}: {e}", path.display());
        }
    }
}

/// Read and parse a JSON file; any failure reads as "nothing stored".
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read(path).ok()?;
    match serde_json::from_slice(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Malformed JSON in {}, treating as empty: {e}", path.display());
            None
        }
    }
}

/// Sanitize a lesson id into a filename component.
///
/// Lesson ids are backend-issued slugs, so this is defensive only; distinct
/// ids that differ solely in stripped characters would share a file.
fn file_key(lesson_id: &str) -> String {
    let key: String = lesson_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if key.is_empty() {
        "lesson".to_string()
    } else {
        key
    }
}
