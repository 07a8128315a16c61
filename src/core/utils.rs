use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

/// Server-wide tick generator for collection, index and revision ids
static CURRENT_TICK: AtomicU64 = AtomicU64::new(0);

pub fn new_tick() -> u64 {
    CURRENT_TICK.fetch_add(1, Ordering::SeqCst) + 1
}

/// Moves the generator past a tick seen on disk so reloaded ids are never reissued.
pub fn update_tick(tick: u64) {
    CURRENT_TICK.fetch_max(tick, Ordering::SeqCst);
}

pub fn current_tick() -> u64 {
    CURRENT_TICK.load(Ordering::SeqCst)
}

static KEY_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static NAME_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
static SYSTEM_NAME_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn matches(cell: &'static OnceLock<Option<Regex>>, source: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(source).ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(value))
}

pub const MAX_KEY_LENGTH: usize = 254;

/// `_key` values: 1..=254 characters from a restricted ASCII set
pub fn is_valid_document_key(key: &str) -> bool {
    key.len() <= MAX_KEY_LENGTH
        && matches(&KEY_PATTERN, r"^[a-zA-Z0-9_\-:.@()+,=;$!*'%]+$", key)
}

pub fn is_valid_collection_name(name: &str, allow_system: bool) -> bool {
    if allow_system && matches(&SYSTEM_NAME_PATTERN, r"^_[a-zA-Z0-9_\-]{1,63}$", name) {
        return true;
    }
    matches(&NAME_PATTERN, r"^[a-zA-Z][a-zA-Z0-9_\-]{0,63}$", name)
}
