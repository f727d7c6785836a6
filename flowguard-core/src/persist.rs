//! Wear-aware persistence
//!
//! Flash endures a limited number of erase cycles, so the volume is not
//! written on every change. A save happens when either:
//!
//! - the volume moved by at least `save_threshold` since the last save, or
//! - more than `max_save_interval` passed since the last save.
//!
//! At most one write per call. A write that fails leaves the "last saved"
//! markers alone, so the very next call tries again.
//!
//! With the defaults (1 L, 5 min) a power cut loses at most 1 L or five
//! minutes of flow, whichever is less.

use crate::config::{Namespace, PersistConfig};
use crate::errors::StorageError;
use crate::storage::{DurableRecord, DurableStore};
use crate::time::{elapsed_ms, Timestamp};

/// Owns the durable store and decides when to write to it
#[derive(Debug)]
pub struct PersistenceManager<S> {
    store: S,
    namespace: Namespace,
    save_threshold: f64,
    max_save_interval_ms: u64,
    boot_count: u32,
    last_saved_volume: f64,
    last_saved_pulses: u64,
    last_save_time: Timestamp,
}

impl<S: DurableStore> PersistenceManager<S> {
    /// Manager for a validated `PersistConfig`; call `load` before saving
    pub fn new(config: &PersistConfig, store: S) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            save_threshold: config.save_threshold,
            max_save_interval_ms: config.max_save_interval_ms,
            boot_count: 0,
            last_saved_volume: 0.0,
            last_saved_pulses: 0,
            last_save_time: 0,
        }
    }

    /// Restore the durable record and count this start
    ///
    /// A missing or unreadable record is a cold start from zero. The
    /// incremented boot count is written back immediately; if that write
    /// fails the node still runs and the count is carried by the next save.
    pub fn load(&mut self, now: Timestamp) -> DurableRecord {
        let previous = match self.store.load(&self.namespace) {
            Ok(Some(record)) => {
                log_info!(
                    "Restored {} L, {} pulses, boot #{}",
                    record.volume_total,
                    record.pulse_count,
                    record.boot_count
                );
                record
            }
            Ok(None) => {
                log_info!("No saved state, starting from zero");
                DurableRecord::default()
            }
            Err(StorageError::Corrupt { reason }) => {
                log_warn!("Saved state is corrupt ({}), starting from zero", reason);
                DurableRecord::default()
            }
            Err(_) => {
                log_warn!("Saved state unreadable, starting from zero");
                DurableRecord::default()
            }
        };

        let record = DurableRecord {
            boot_count: previous.boot_count.wrapping_add(1),
            ..previous
        };
        self.boot_count = record.boot_count;
        log_info!("Boot #{}", record.boot_count);

        if self.store.save(&self.namespace, &record).is_err() {
            log_warn!("Could not persist boot count");
        }

        self.last_saved_volume = record.volume_total;
        self.last_saved_pulses = record.pulse_count;
        self.last_save_time = now;
        record
    }

    /// Either save rule holds
    pub fn save_due(&self, volume_total: f64, now: Timestamp) -> bool {
        libm::fabs(volume_total - self.last_saved_volume) >= self.save_threshold
            || elapsed_ms(self.last_save_time, now) > self.max_save_interval_ms
    }

    /// Save if due; returns whether a write succeeded
    pub fn maybe_save(&mut self, volume_total: f64, pulse_count: u64, now: Timestamp) -> bool {
        if !self.save_due(volume_total, now) {
            return false;
        }
        match self.save_now(volume_total, pulse_count, now) {
            Ok(()) => true,
            Err(_) => {
                log_warn!("Save failed, will retry next cycle");
                false
            }
        }
    }

    /// Save unconditionally, e.g. before a planned shutdown
    pub fn save_now(
        &mut self,
        volume_total: f64,
        pulse_count: u64,
        now: Timestamp,
    ) -> Result<(), StorageError> {
        let record = DurableRecord {
            volume_total,
            pulse_count,
            boot_count: self.boot_count,
        };
        self.store.save(&self.namespace, &record)?;

        self.last_saved_volume = volume_total;
        self.last_saved_pulses = pulse_count;
        self.last_save_time = now;
        log_debug!("Saved {} L", volume_total);
        Ok(())
    }

    /// Boot count of this run
    pub fn boot_count(&self) -> u32 {
        self.boot_count
    }

    /// Volume in the last successful save
    pub fn last_saved_volume(&self) -> f64 {
        self.last_saved_volume
    }

    /// Pulse count in the last successful save
    pub fn last_saved_pulses(&self) -> u64 {
        self.last_saved_pulses
    }

    /// Time of the last successful save (or of `load`)
    pub fn last_save_time(&self) -> Timestamp {
        self.last_save_time
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying store, mutably
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give the store back
    pub fn into_store(self) -> S {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    type Store = MemoryStore<1>;

    fn manager(store: Store) -> PersistenceManager<Store> {
        PersistenceManager::new(&PersistConfig::default(), store)
    }

    #[test]
    fn cold_start_writes_first_boot() {
        let mut pm = manager(Store::new());
        let record = pm.load(0);
        assert_eq!(record, DurableRecord { volume_total: 0.0, pulse_count: 0, boot_count: 1 });
        assert_eq!(pm.store().writes(), 1);
    }

    #[test]
    fn restart_continuity() {
        let saved = DurableRecord { volume_total: 12.5, pulse_count: 94, boot_count: 4 };
        let mut pm = manager(Store::with_record("flowmeter", &saved));

        let record = pm.load(0);
        assert_eq!(record.volume_total, 12.5);
        assert_eq!(record.boot_count, 5);
        assert_eq!(pm.boot_count(), 5);
        assert_eq!(pm.last_saved_volume(), 12.5);

        let mut store = pm.store().clone();
        assert_eq!(store.load("flowmeter").unwrap().unwrap().boot_count, 5);
    }

    #[test]
    fn corrupt_record_is_cold_start() {
        let saved = DurableRecord { volume_total: 12.5, pulse_count: 94, boot_count: 4 };
        let mut store = Store::with_record("flowmeter", &saved);
        store.corrupt("flowmeter");

        let record = manager(store).load(0);
        assert_eq!(record.volume_total, 0.0);
        assert_eq!(record.boot_count, 1);
    }

    #[test]
    fn threshold_trigger() {
        let mut pm = manager(Store::new());
        pm.load(0);

        assert!(!pm.maybe_save(0.5, 4, 10_000));
        assert!(pm.maybe_save(1.0, 8, 10_000));
        assert_eq!(pm.last_saved_volume(), 1.0);
        assert_eq!(pm.last_saved_pulses(), 8);
        assert!(!pm.maybe_save(1.4, 11, 11_000));
    }

    #[test]
    fn interval_trigger_with_no_change() {
        let mut pm = manager(Store::new());
        pm.load(0);

        assert!(!pm.maybe_save(0.0, 0, 300_000));
        assert!(pm.maybe_save(0.0, 0, 300_001));
        assert_eq!(pm.last_save_time(), 300_001);
    }

    #[test]
    fn failed_save_retries_next_call() {
        let mut pm = manager(Store::new());
        pm.load(0);
        pm.store_mut().fail_next_writes(1);

        assert!(!pm.maybe_save(2.0, 15, 1000));
        assert_eq!(pm.last_saved_volume(), 0.0);
        assert_eq!(pm.last_save_time(), 0);

        assert!(pm.maybe_save(2.0, 15, 2000));
        assert_eq!(pm.last_saved_volume(), 2.0);
    }

    #[test]
    fn failed_boot_write_is_not_fatal() {
        let mut store = Store::new();
        store.fail_next_writes(1);
        let mut pm = manager(store);

        assert_eq!(pm.load(0).boot_count, 1);
        // Boot count reaches flash with the first regular save
        assert!(pm.maybe_save(1.0, 8, 1000));
        let mut store = pm.store().clone();
        assert_eq!(store.load("flowmeter").unwrap().unwrap().boot_count, 1);
    }
}
