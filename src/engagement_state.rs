use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{info, warn};
use sled::Db;

use crate::app_response::AppResponse;
use crate::engagement_model::{
    comment_key, interaction_key, migrate_legacy, share_key, slug_from_path, CommentEntry,
    InteractionRecord, PostDescriptor, ShareOutcome, ShareStats, LEGACY_LIKED_KEY,
    LEGACY_LIKES_KEY,
};

/// Cooldown applied between two like toggles on the same post, matching
/// the re-enable delay the page applies to its like button.
pub const DEFAULT_LIKE_COOLDOWN: Duration = Duration::from_millis(300);

/// Engagement store for one site: a sled environment holding every
/// per-post record, plus the in-memory guards that serialize rapid user
/// input within one session.
///
/// The guards live here rather than in the UI layer so the debounce and
/// single-flight discipline can be tested without DOM timers. They are
/// scoped to this instance's lifetime and are not persisted.
pub struct AppEngagementState {
    pub db: Db,
    like_cooldown: Duration,
    recent_likes: Mutex<HashMap<String, Instant>>,
    shares_in_flight: Mutex<HashSet<String>>,
}

impl AppEngagementState {
    /// Opens (or creates) the store at `name` with the default cooldown.
    pub fn init(name: String) -> Result<Self, AppResponse> {
        Self::with_cooldown(name, DEFAULT_LIKE_COOLDOWN)
    }

    /// Opens the store with an explicit like cooldown. Tests use a zero
    /// cooldown to exercise toggles back to back.
    pub fn with_cooldown(name: String, like_cooldown: Duration) -> Result<Self, AppResponse> {
        let config = sled::Config::new()
            .path(name)
            .mode(sled::Mode::HighThroughput)
            .flush_every_ms(Some(1000));

        let db = config.open()?;
        db.flush()?;

        Ok(Self {
            db,
            like_cooldown,
            recent_likes: Mutex::new(HashMap::new()),
            shares_in_flight: Mutex::new(HashSet::new()),
        })
    }

    // --- storage adapter ---
    //
    // Raw key/value access. Failures never escape: a failed read is
    // "absent", a failed write is a logged no-op, so callers keep a
    // consistent in-memory state regardless of the engine's mood.

    /// Reads the raw string stored under `key`, treating every failure
    /// (engine error, non-UTF-8 payload) as absent.
    pub fn read_raw(&self, key: &str) -> Option<String> {
        match self.db.get(key) {
            Ok(Some(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("Discarding non-UTF-8 value under '{key}': {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Storage read failed for '{key}': {e}");
                None
            }
        }
    }

    /// Writes `value` under `key` and flushes. Returns false (after
    /// logging) when the write failed; a failed flush is logged but the
    /// write still counts, sled will retry flushing on its timer.
    pub fn write_raw(&self, key: &str, value: &str) -> bool {
        if let Err(e) = self.db.insert(key, value.as_bytes()) {
            warn!("Storage write failed for '{key}': {e}");
            return false;
        }
        if let Err(e) = self.db.flush() {
            warn!("Flush failed after writing '{key}': {e}");
        }
        true
    }

    /// Removes `key`. Missing keys count as success.
    pub fn remove_raw(&self, key: &str) -> bool {
        match self.db.remove(key) {
            Ok(_) => {
                if let Err(e) = self.db.flush() {
                    warn!("Flush failed after removing '{key}': {e}");
                }
                true
            }
            Err(e) => {
                warn!("Storage remove failed for '{key}': {e}");
                false
            }
        }
    }

    // --- interaction record store ---

    /// Loads the interaction record for the post at `page_path`.
    ///
    /// Resolution order: the per-post record if present and well-formed; a
    /// malformed record starts fresh; otherwise the legacy global keys are
    /// promoted into a per-post record exactly once — the migrated record
    /// is persisted and the legacy keys deleted, so a second load takes
    /// the first branch. With nothing stored, returns a fresh zeroed
    /// record (not persisted until the first mutation).
    pub fn load_interactions(&self, page_path: &str) -> InteractionRecord {
        let key = interaction_key(page_path);

        if let Some(raw) = self.read_raw(&key) {
            match serde_json::from_str(&raw) {
                Ok(record) => return record,
                Err(e) => {
                    warn!("Malformed interaction record under '{key}', starting fresh: {e}");
                    return InteractionRecord::new();
                }
            }
        }

        let legacy_likes = self.read_raw(LEGACY_LIKES_KEY);
        let legacy_liked = self.read_raw(LEGACY_LIKED_KEY);
        if let Some(migrated) = migrate_legacy(legacy_likes.as_deref(), legacy_liked.as_deref()) {
            info!("Migrating legacy like data into '{key}'");
            self.save_interactions(page_path, &migrated);
            // A failed delete leaves a stale legacy key behind; tolerated,
            // since the per-post record now shadows it on every load.
            self.remove_raw(LEGACY_LIKES_KEY);
            self.remove_raw(LEGACY_LIKED_KEY);
            return migrated;
        }

        InteractionRecord::new()
    }

    /// Write-through persistence of a post's interaction record.
    pub fn save_interactions(&self, page_path: &str, record: &InteractionRecord) -> bool {
        let key = interaction_key(page_path);
        match serde_json::to_string(record) {
            Ok(json) => self.write_raw(&key, &json),
            Err(e) => {
                warn!("Could not serialize interaction record for '{key}': {e}");
                false
            }
        }
    }

    /// Toggles the like state for the post at `page_path` and persists the
    /// result.
    ///
    /// A second call within the cooldown window is rejected with
    /// `ValidationError` and changes nothing, which is what absorbs rapid
    /// repeated clicks on the like button.
    pub fn toggle_like(&self, page_path: &str) -> Result<InteractionRecord, AppResponse> {
        if !self.admit_like(page_path) {
            return Err(AppResponse::ValidationError(format!(
                "Like for '{page_path}' is still cooling down"
            )));
        }

        let mut record = self.load_interactions(page_path);
        record.toggle_like();
        self.save_interactions(page_path, &record);
        Ok(record)
    }

    fn admit_like(&self, page_path: &str) -> bool {
        let mut recent = lock(&self.recent_likes);
        let now = Instant::now();
        if let Some(last) = recent.get(page_path) {
            if now.duration_since(*last) < self.like_cooldown {
                return false;
            }
        }
        recent.insert(page_path.to_string(), now);
        true
    }

    /// Best-effort baseline enrichment from the post catalog.
    ///
    /// Only a record that still has zero likes and was not migrated gets
    /// seeded, and only when the catalog actually lists a positive
    /// baseline for the post's slug. Everything else — including an empty
    /// catalog, the caller's stand-in for a failed fetch — leaves the
    /// record untouched.
    pub fn seed_from_catalog(
        &self,
        page_path: &str,
        catalog: &[PostDescriptor],
    ) -> InteractionRecord {
        let mut record = self.load_interactions(page_path);
        if record.likes > 0 || record.migrated {
            return record;
        }

        let slug = slug_from_path(page_path);
        let baseline = crate::catalog::baseline_likes(catalog, slug);
        if baseline > 0 {
            record.likes = baseline;
            self.save_interactions(page_path, &record);
        }
        record
    }

    // --- comment store ---

    /// All comments for the post at `page_path`, in insertion order.
    /// Absent or malformed stored data reads as an empty list.
    pub fn comments(&self, page_path: &str) -> Vec<CommentEntry> {
        let key = comment_key(slug_from_path(page_path));
        let Some(raw) = self.read_raw(&key) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!("Malformed comment list under '{key}', treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Appends a comment to the post at `page_path`.
    ///
    /// Blank-after-trim `name` or `text` is rejected with
    /// `ValidationError` and nothing is persisted. On acceptance the whole
    /// list is written back and the new entry returned for immediate
    /// display.
    pub fn add_comment(
        &self,
        page_path: &str,
        name: &str,
        text: &str,
    ) -> Result<CommentEntry, AppResponse> {
        let mut list = self.comments(page_path);
        let entry = CommentEntry::build(name, text, list.last().map(|c| c.id)).ok_or_else(|| {
            AppResponse::ValidationError("Comment name and text must be non-empty".to_string())
        })?;
        list.push(entry.clone());

        let key = comment_key(slug_from_path(page_path));
        match serde_json::to_string(&list) {
            Ok(json) => {
                self.write_raw(&key, &json);
            }
            Err(e) => warn!("Could not serialize comment list for '{key}': {e}"),
        }
        Ok(entry)
    }

    // --- share tracker ---

    /// Share statistics for the post at `page_path`; absent or malformed
    /// stored data reads as zeroed counters.
    pub fn share_stats(&self, page_path: &str) -> ShareStats {
        let key = share_key(page_path);
        let Some(raw) = self.read_raw(&key) else {
            return ShareStats::default();
        };
        match serde_json::from_str(&raw) {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Malformed share stats under '{key}', starting from zero: {e}");
                ShareStats::default()
            }
        }
    }

    fn save_share_stats(&self, page_path: &str, stats: &ShareStats) -> bool {
        let key = share_key(page_path);
        match serde_json::to_string(stats) {
            Ok(json) => self.write_raw(&key, &json),
            Err(e) => {
                warn!("Could not serialize share stats for '{key}': {e}");
                false
            }
        }
    }

    /// Counts a share attempt and persists.
    pub fn record_share_attempt(&self, page_path: &str) -> ShareStats {
        let mut stats = self.share_stats(page_path);
        stats.record_attempt();
        self.save_share_stats(page_path, &stats);
        stats
    }

    /// Counts a completed native share and persists.
    pub fn record_share_success(&self, page_path: &str) -> ShareStats {
        self.apply_share_outcome(page_path, ShareOutcome::Succeeded)
    }

    /// Counts a copy-link fallback and persists. A distinct success
    /// channel, kept separate from native share successes.
    pub fn record_clipboard_fallback(&self, page_path: &str) -> ShareStats {
        self.apply_share_outcome(page_path, ShareOutcome::ClipboardFallback)
    }

    fn apply_share_outcome(&self, page_path: &str, outcome: ShareOutcome) -> ShareStats {
        let mut stats = self.share_stats(page_path);
        stats.record_outcome(outcome);
        self.save_share_stats(page_path, &stats);
        stats
    }

    /// Admits one share action for the post at `page_path`.
    ///
    /// Returns `None` while another share for the same post is still in
    /// flight (the second click is ignored, not queued). On admission the
    /// attempt is recorded immediately and the action stays in flight
    /// until [`finish_share`](Self::finish_share).
    pub fn begin_share(&self, page_path: &str) -> Option<ShareStats> {
        {
            let mut in_flight = lock(&self.shares_in_flight);
            if !in_flight.insert(page_path.to_string()) {
                return None;
            }
        }
        Some(self.record_share_attempt(page_path))
    }

    /// Resolves the in-flight share action with its terminal outcome and
    /// releases the single-flight guard. An abandoned share records
    /// nothing beyond the attempt already counted by
    /// [`begin_share`](Self::begin_share).
    pub fn finish_share(&self, page_path: &str, outcome: ShareOutcome) -> ShareStats {
        {
            let mut in_flight = lock(&self.shares_in_flight);
            in_flight.remove(page_path);
        }
        match outcome {
            ShareOutcome::Abandoned => self.share_stats(page_path),
            other => self.apply_share_outcome(page_path, other),
        }
    }

    /// Whether a share action for `page_path` is currently in flight.
    pub fn share_in_flight(&self, page_path: &str) -> bool {
        lock(&self.shares_in_flight).contains(page_path)
    }

    /// Flushes pending writes. The environment closes when the instance
    /// drops; this is the explicit "stop using me" signal for hosts that
    /// manage the store through FFI.
    pub fn close(&self) -> Result<(), AppResponse> {
        self.db.flush()?;
        Ok(())
    }
}

// Guard state is plain bookkeeping; a poisoned lock just means another
// test thread panicked mid-update, and stale cooldown entries are harmless.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
