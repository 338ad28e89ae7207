//! Monitored-zone registry.
//!
//! Each group's zone set is read from the store once (eagerly at startup via
//! [`ZoneRegistry::load_all`], or lazily on the first event for that group) and
//! then kept current by [`ZoneRegistry::register`] / [`ZoneRegistry::unregister`].
//! Events never trigger a re-fetch for a group that is already cached.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use pt_core::{GroupId, ZoneId};

use crate::{SharedDatabase, TrackerError, lock};

pub struct ZoneRegistry {
    db: SharedDatabase,
    cache: HashMap<GroupId, HashSet<ZoneId>>,
}

impl ZoneRegistry {
    #[must_use]
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            cache: HashMap::new(),
        }
    }

    /// Loads every group known to the store. Returns the number of groups loaded.
    pub fn load_all(&mut self) -> Result<usize, TrackerError> {
        let groups = lock(&self.db)?.list_zone_groups()?;
        let count = groups.len();
        for group_id in groups {
            self.load_for_group(&group_id)?;
        }
        tracing::info!(groups = count, "monitored zones loaded");
        Ok(count)
    }

    /// Replaces the cached zone set for a group with the stored one.
    pub fn load_for_group(&mut self, group_id: &GroupId) -> Result<&HashSet<ZoneId>, TrackerError> {
        let zones: HashSet<ZoneId> = lock(&self.db)?.list_zones(group_id)?.into_iter().collect();
        tracing::debug!(group = %group_id, zones = zones.len(), "zone cache filled");
        Ok(self.cache.entry(group_id.clone()).insert_entry(zones).into_mut())
    }

    fn zones_for(&mut self, group_id: &GroupId) -> Result<&mut HashSet<ZoneId>, TrackerError> {
        if !self.cache.contains_key(group_id) {
            self.load_for_group(group_id)?;
        }
        Ok(self.cache.entry(group_id.clone()).or_default())
    }

    pub fn is_monitored(&mut self, group_id: &GroupId, zone_id: &ZoneId) -> Result<bool, TrackerError> {
        Ok(self.zones_for(group_id)?.contains(zone_id))
    }

    /// Registers a zone. Returns `false` if it was already monitored.
    pub fn register(&mut self, group_id: &GroupId, zone_id: &ZoneId) -> Result<bool, TrackerError> {
        let inserted = lock(&self.db)?.register_zone(group_id, zone_id, Utc::now())?;
        self.zones_for(group_id)?.insert(zone_id.clone());
        tracing::info!(group = %group_id, zone = %zone_id, inserted, "zone registered");
        Ok(inserted)
    }

    /// Stops monitoring a zone. Returns `false` if it was not monitored.
    pub fn unregister(&mut self, group_id: &GroupId, zone_id: &ZoneId) -> Result<bool, TrackerError> {
        let removed = lock(&self.db)?.unregister_zone(group_id, zone_id)?;
        self.zones_for(group_id)?.remove(zone_id);
        tracing::info!(group = %group_id, zone = %zone_id, removed, "zone unregistered");
        Ok(removed)
    }

    /// Monitored zones for a group, sorted by ID.
    pub fn zones(&mut self, group_id: &GroupId) -> Result<Vec<ZoneId>, TrackerError> {
        let mut zones: Vec<ZoneId> = self.zones_for(group_id)?.iter().cloned().collect();
        zones.sort();
        Ok(zones)
    }

    /// Number of groups currently cached.
    #[must_use]
    pub fn cached_groups(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::share;
    use pt_db::Database;

    fn group(id: &str) -> GroupId {
        GroupId::new(id).unwrap()
    }

    fn zone(id: &str) -> ZoneId {
        ZoneId::new(id).unwrap()
    }

    #[test]
    fn register_is_idempotent_and_visible() {
        let mut registry = ZoneRegistry::new(share(Database::open_in_memory().unwrap()));
        assert!(!registry.is_monitored(&group("g1"), &zone("z1")).unwrap());
        assert!(registry.register(&group("g1"), &zone("z1")).unwrap());
        assert!(!registry.register(&group("g1"), &zone("z1")).unwrap());
        assert!(registry.is_monitored(&group("g1"), &zone("z1")).unwrap());
        assert!(!registry.is_monitored(&group("g2"), &zone("z1")).unwrap());
    }

    #[test]
    fn lazy_load_reads_store_once() {
        let db = share(Database::open_in_memory().unwrap());
        db.lock()
            .unwrap()
            .register_zone(&group("g1"), &zone("z1"), Utc::now())
            .unwrap();

        let mut registry = ZoneRegistry::new(db.clone());
        assert_eq!(registry.cached_groups(), 0);
        assert!(registry.is_monitored(&group("g1"), &zone("z1")).unwrap());
        assert_eq!(registry.cached_groups(), 1);

        // Written behind the registry's back: the cache is not refetched.
        db.lock()
            .unwrap()
            .register_zone(&group("g1"), &zone("z2"), Utc::now())
            .unwrap();
        assert!(!registry.is_monitored(&group("g1"), &zone("z2")).unwrap());

        registry.load_for_group(&group("g1")).unwrap();
        assert!(registry.is_monitored(&group("g1"), &zone("z2")).unwrap());
    }

    #[test]
    fn load_all_fills_every_known_group() {
        let db = share(Database::open_in_memory().unwrap());
        {
            let mut guard = db.lock().unwrap();
            guard.register_zone(&group("g1"), &zone("z1"), Utc::now()).unwrap();
            guard.register_zone(&group("g2"), &zone("z9"), Utc::now()).unwrap();
        }
        let mut registry = ZoneRegistry::new(db);
        assert_eq!(registry.load_all().unwrap(), 2);
        assert_eq!(registry.cached_groups(), 2);
    }

    #[test]
    fn unregister_removes_from_cache_and_store() {
        let db = share(Database::open_in_memory().unwrap());
        let mut registry = ZoneRegistry::new(db.clone());
        registry.register(&group("g1"), &zone("z1")).unwrap();
        registry.register(&group("g1"), &zone("z2")).unwrap();
        assert!(registry.unregister(&group("g1"), &zone("z1")).unwrap());
        assert_eq!(registry.zones(&group("g1")).unwrap(), vec![zone("z2")]);
        assert_eq!(db.lock().unwrap().list_zones(&group("g1")).unwrap(), vec![zone("z2")]);
    }
}
