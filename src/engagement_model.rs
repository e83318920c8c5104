//! Data model definitions for per-post engagement state.
//!
//! This module defines the records persisted by the store — one
//! [`InteractionRecord`] and one [`ShareStats`] per post, plus an ordered
//! list of [`CommentEntry`] values — together with the pure state
//! transitions on them (like toggling, legacy migration, comment
//! validation, share counting) and the storage-key layout.
//!
//! Everything here is deliberately free of storage concerns: functions take
//! values in and return values out, so every transition can be tested
//! without touching the key-value engine.

use chrono::{Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Pre-migration global key holding a single shared like count.
pub const LEGACY_LIKES_KEY: &str = "blog-likes";

/// Pre-migration global key holding a single shared like flag.
pub const LEGACY_LIKED_KEY: &str = "blog-liked";

/// Storage key for a post's interaction record, derived from its page path.
pub fn interaction_key(page_path: &str) -> String {
    format!("blog-interactions-{page_path}")
}

/// Storage key for a post's comment list, derived from its slug.
pub fn comment_key(slug: &str) -> String {
    format!("blog-comments-{slug}")
}

/// Storage key for a post's share statistics, derived from its page path.
pub fn share_key(page_path: &str) -> String {
    format!("share-{page_path}")
}

/// Extracts the post slug from a page path: the last `/`-separated segment,
/// or `"default"` when the path is empty or ends in a slash.
pub fn slug_from_path(path: &str) -> &str {
    match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => "default",
    }
}

/// Current instant as an RFC 3339 / ISO 8601 string with millisecond
/// precision, the format all persisted timestamps use.
pub(crate) fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Per-post like/share interaction state.
///
/// One record is stored per post under [`interaction_key`]. Field names
/// follow the persisted JSON layout, which predates this crate and must
/// keep decoding data written by earlier versions of the site.
///
/// Invariants:
/// - `likes` never goes negative; unliking at zero stays at zero.
/// - each [`toggle_like`](Self::toggle_like) flips `is_liked` and moves
///   `likes` by exactly one (subject to the clamp).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Non-negative like counter.
    pub likes: u64,
    /// Whether the current viewer has the post liked.
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
    /// Legacy share counter. Retained for records written by earlier
    /// versions; [`ShareStats`] carries the live counters and nothing in
    /// this crate increments this field.
    #[serde(default)]
    pub shares: u64,
    /// Timestamp of the last like/unlike action.
    #[serde(rename = "lastInteraction", default)]
    pub last_interaction: Option<String>,
    /// Timestamp set when the record was first materialized.
    pub created: String,
    /// True only when this record was synthesized from the legacy global
    /// keys. Omitted from JSON when false, matching the legacy layout.
    #[serde(default, skip_serializing_if = "is_false")]
    pub migrated: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl InteractionRecord {
    /// Fresh zeroed record with `created` set to now.
    pub fn new() -> Self {
        Self {
            likes: 0,
            is_liked: false,
            shares: 0,
            last_interaction: None,
            created: now_iso(),
            migrated: false,
        }
    }

    /// Toggles the viewer's like state.
    ///
    /// Not liked becomes liked with `likes + 1`; liked becomes not liked
    /// with `likes - 1`, clamped at zero. `last_interaction` is stamped on
    /// every call. Returns the new `is_liked` state.
    pub fn toggle_like(&mut self) -> bool {
        if self.is_liked {
            self.is_liked = false;
            self.likes = self.likes.saturating_sub(1);
        } else {
            self.is_liked = true;
            self.likes += 1;
        }
        self.last_interaction = Some(now_iso());
        self.is_liked
    }
}

impl Default for InteractionRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot upgrade from the legacy global-key layout to a per-post record.
///
/// `raw_likes` and `raw_liked` are the raw string values of
/// [`LEGACY_LIKES_KEY`] and [`LEGACY_LIKED_KEY`]. Returns `None` when
/// neither key holds a non-empty value, i.e. there is nothing to migrate.
/// The like count is read as a leading decimal integer, so values like
/// `"5 stars"` migrate as 5; anything unparseable becomes 0.
pub fn migrate_legacy(raw_likes: Option<&str>, raw_liked: Option<&str>) -> Option<InteractionRecord> {
    let raw_likes = raw_likes.filter(|value| !value.is_empty());
    let raw_liked = raw_liked.filter(|value| !value.is_empty());
    if raw_likes.is_none() && raw_liked.is_none() {
        return None;
    }

    let now = now_iso();
    Some(InteractionRecord {
        likes: leading_int(raw_likes.unwrap_or("0")),
        is_liked: raw_liked == Some("true"),
        shares: 0,
        last_interaction: Some(now.clone()),
        created: now,
        migrated: true,
    })
}

fn leading_int(raw: &str) -> u64 {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// A single visitor comment on a post.
///
/// Comments are append-only: the store never edits or deletes them, and
/// the list order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentEntry {
    /// Millisecond-epoch id, strictly increasing within one post's list.
    /// Used by renderers as a stable key; not unique across posts.
    pub id: i64,
    pub name: String,
    pub text: String,
    /// Human-readable creation date, e.g. "August 30, 2026".
    pub date: String,
}

impl CommentEntry {
    /// Validates and constructs a new comment.
    ///
    /// Returns `None` when `name` or `text` is empty after trimming.
    /// `last_id` is the id at the tail of the post's current list; the new
    /// id is bumped past it so ids stay strictly increasing even when two
    /// comments land within the same millisecond.
    pub fn build(name: &str, text: &str, last_id: Option<i64>) -> Option<Self> {
        let name = name.trim();
        let text = text.trim();
        if name.is_empty() || text.is_empty() {
            return None;
        }

        let mut id = Utc::now().timestamp_millis();
        if let Some(previous) = last_id {
            if id <= previous {
                id = previous + 1;
            }
        }

        Some(Self {
            id,
            name: name.to_string(),
            text: text.to_string(),
            date: Local::now().format("%B %-d, %Y").to_string(),
        })
    }
}

/// Per-post share analytics, stored under [`share_key`].
///
/// `attempts` counts every admitted share action; `successes` counts
/// completed native shares; `clipboard_copies` counts the copy-link
/// fallback, which is a distinct success channel rather than a native
/// share. The three are never reconciled with
/// [`InteractionRecord::shares`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareStats {
    #[serde(default)]
    pub attempts: u64,
    #[serde(default)]
    pub successes: u64,
    #[serde(default)]
    pub clipboard_copies: u64,
    #[serde(rename = "lastAttempt", default)]
    pub last_attempt: Option<String>,
}

impl ShareStats {
    /// Counts a share attempt and stamps `last_attempt`.
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.last_attempt = Some(now_iso());
    }

    /// Applies the terminal outcome of a share action. An abandoned share
    /// keeps only the attempt already counted.
    pub fn record_outcome(&mut self, outcome: ShareOutcome) {
        match outcome {
            ShareOutcome::Succeeded => self.successes += 1,
            ShareOutcome::ClipboardFallback => self.clipboard_copies += 1,
            ShareOutcome::Abandoned => {}
        }
    }
}

/// Terminal state of one share action: `attempting` resolves to exactly
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The native share dialog completed.
    Succeeded,
    /// Native share was unavailable or failed for a reason other than
    /// user cancellation, and the link was copied to the clipboard.
    ClipboardFallback,
    /// The viewer cancelled the dialog. Only the attempt is recorded and
    /// no clipboard fallback follows.
    Abandoned,
}

impl ShareOutcome {
    /// Parses the action name used at the FFI boundary.
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "success" => Some(Self::Succeeded),
            "clipboard" => Some(Self::ClipboardFallback),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// One entry of the read-only post catalog served next to the site.
///
/// Used to seed baseline like counts and to render listing pages. Only
/// `slug` and `title` are required in the served JSON; everything else
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDescriptor {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub image: Option<String>,
}
