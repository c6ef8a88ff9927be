//! The set of record keys that participate in sync.

/// Version of [`STANDARD_KEYS`].
pub const STANDARD_KEYS_VERSION: u32 = 1;

/// Record keys synchronized by the app.
pub const STANDARD_KEYS: &[&str] = &[
    "verse_data",
    "reading_streaks",
    "achievements",
    "journal_notes",
    "highlight_custom_names",
    "fivefold_todos",
    "fivefold_user_stats",
    "selectedBibleVersion",
    "weightUnit",
    "purchasedBibleVersions",
    "prayer_history",
    "prayer_completions",
    "total_points",
    "user_profile",
    "userProfile",
    "userName",
    "app_settings",
    "onboarding_complete",
    "onboardingCompleted",
    "theme_preference",
    "app_streak_data",
];

/// A fixed, versioned, ordered list of record keys eligible for sync.
///
/// Only keys in this set are ever read from or written to the remote store.
/// Adding a key starts syncing it on the next pass; removing one stops new
/// syncs but leaves any remote blob in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKeySet {
    version: u32,
    keys: Vec<String>,
}

impl RecordKeySet {
    /// Creates a key set. Duplicate keys are dropped, keeping first occurrence.
    pub fn new<I, S>(version: u32, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            if !deduped.contains(&key) {
                deduped.push(key);
            }
        }
        Self {
            version,
            keys: deduped,
        }
    }

    /// The app's standard key set.
    pub fn standard() -> Self {
        Self::new(STANDARD_KEYS_VERSION, STANDARD_KEYS.iter().copied())
    }

    /// Returns the key set version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns true if `key` participates in sync.
    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Iterates keys in configured order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the set has no keys.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for RecordKeySet {
    fn default() -> Self {
        Self::standard()
    }
}
