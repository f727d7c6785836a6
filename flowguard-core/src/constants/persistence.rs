//! Wear-Aware Persistence Defaults
//!
//! NOR flash behind a key-value store is typically rated for ~100k erase
//! cycles per sector. Saving on every litre or every five minutes, whichever
//! comes first, keeps a busy household meter well inside that budget.

use super::time::MS_PER_MINUTE;

/// Volume change that forces a save (litres).
pub const DEFAULT_SAVE_THRESHOLD: f64 = 1.0;

/// Maximum time between saves (milliseconds).
pub const DEFAULT_MAX_SAVE_INTERVAL_MS: u64 = 5 * MS_PER_MINUTE;

/// Storage namespace for the durable record.
pub const DEFAULT_NAMESPACE: &str = "flowmeter";

/// Longest namespace the key-value store accepts (bytes).
///
/// Source: ESP-IDF NVS key length limit
pub const MAX_NAMESPACE_LEN: usize = 15;
