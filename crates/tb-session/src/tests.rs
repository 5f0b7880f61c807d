//! Unit tests for tb-session.

/// Test accessors over a `person` store.
#[cfg(test)]
mod fixtures {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tb_core::RowId;
    use tb_store::{Attribute, IntColumn, RefColumn, Store, StoreResult, StoreView, StringColumn};

    use crate::{
        ComponentAccessor, ComponentKey, ComponentRegistry, Entity, EntityResolver,
    };

    #[derive(Clone, Debug, PartialEq, Default)]
    pub struct Health {
        pub hp:    i32,
        pub label: Option<String>,
    }

    /// Counts every column write so dirty-skipping is observable.
    #[derive(Default)]
    pub struct HealthAccessor {
        hp:               Option<Arc<IntColumn>>,
        label:            Option<Arc<StringColumn>>,
        pub hp_writes:    Arc<AtomicUsize>,
        pub label_writes: Arc<AtomicUsize>,
    }

    impl HealthAccessor {
        fn hp(&self) -> &IntColumn {
            self.hp.as_deref().expect("attached")
        }

        fn label(&self) -> &StringColumn {
            self.label.as_deref().expect("attached")
        }
    }

    impl ComponentAccessor for HealthAccessor {
        type Component = Health;

        fn name(&self) -> &str {
            "health"
        }

        fn configure_store(&self, store: &Store) -> StoreResult<()> {
            store.add_int("health_hp")?;
            store.add_string("health_label")?;
            Ok(())
        }

        fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
            self.hp = Some(store.add_int("health_hp")?);
            self.label = Some(store.add_string("health_label")?);
            Ok(())
        }

        fn create(&self) -> Health {
            Health::default()
        }

        fn load(&self, _: &mut dyn EntityResolver, c: &mut Health, row: RowId) -> StoreResult<()> {
            c.hp = self.hp().get(row);
            c.label = self.label().get(row);
            Ok(())
        }

        fn save(&self, c: &Health, row: RowId) -> StoreResult<()> {
            if self.hp().value(row) != Some(c.hp) {
                self.hp().set(row, c.hp);
                self.hp_writes.fetch_add(1, Ordering::Relaxed);
            }
            if !self.label().is_equal(row, c.label.as_deref()) {
                self.label().set(row, c.label.as_deref());
                self.label_writes.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        }

        fn is_present(&self, row: RowId) -> bool {
            !self.hp().is_empty(row)
        }

        fn is_modified(&self, c: &Health, row: RowId) -> bool {
            self.hp().value(row) != Some(c.hp) || !self.label().is_equal(row, c.label.as_deref())
        }

        fn erase(&self, row: RowId) {
            self.hp().set_empty(row);
            self.label().set_empty(row);
        }

        fn ensure_capacity(&self, n: usize) {
            self.hp().ensure_capacity(n);
            self.label().ensure_capacity(n);
        }
    }

    /// A reference to another person, resolved into a session handle.
    pub struct Partner {
        pub other: Entity,
    }

    #[derive(Default)]
    pub struct PartnerAccessor {
        column: Option<Arc<RefColumn>>,
    }

    impl PartnerAccessor {
        fn column(&self) -> &RefColumn {
            self.column.as_deref().expect("attached")
        }
    }

    impl ComponentAccessor for PartnerAccessor {
        type Component = Partner;

        fn name(&self) -> &str {
            "partner"
        }

        fn configure_store(&self, store: &Store) -> StoreResult<()> {
            store.add_ref("partner").map(|_| ())
        }

        fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
            self.column = Some(store.add_ref("partner")?);
            Ok(())
        }

        fn create(&self) -> Partner {
            Partner { other: Entity::Stub(RowId::ABSENT) }
        }

        fn load(&self, resolver: &mut dyn EntityResolver, c: &mut Partner, row: RowId) -> StoreResult<()> {
            c.other = resolver.resolve(self.column().get(row));
            Ok(())
        }

        fn save(&self, c: &Partner, row: RowId) -> StoreResult<()> {
            self.column().set(row, c.other.id());
            Ok(())
        }

        fn is_present(&self, row: RowId) -> bool {
            !self.column().is_empty(row)
        }

        fn is_modified(&self, c: &Partner, row: RowId) -> bool {
            self.column().get(row) != c.other.id()
        }

        fn erase(&self, row: RowId) {
            self.column().set_empty(row);
        }

        fn ensure_capacity(&self, n: usize) {
            self.column().ensure_capacity(n);
        }
    }

    pub struct World {
        pub store:        Arc<Store>,
        pub registry:     Arc<ComponentRegistry>,
        pub health:       ComponentKey<HealthAccessor>,
        pub partner:      ComponentKey<PartnerAccessor>,
        pub hp_writes:    Arc<AtomicUsize>,
        pub label_writes: Arc<AtomicUsize>,
    }

    impl World {
        pub fn hp(&self) -> Arc<IntColumn> {
            self.store.add_int("health_hp").unwrap()
        }

        pub fn writes(&self) -> (usize, usize) {
            (self.hp_writes.load(Ordering::Relaxed), self.label_writes.load(Ordering::Relaxed))
        }
    }

    /// A store with `rows` persons, each with `hp = row index`.
    pub fn world(rows: usize) -> World {
        let store = Arc::new(Store::new("person", 64));
        let accessor = HealthAccessor::default();
        let hp_writes = Arc::clone(&accessor.hp_writes);
        let label_writes = Arc::clone(&accessor.label_writes);

        let mut builder = ComponentRegistry::builder(Arc::clone(&store));
        let health = builder.register(accessor).unwrap();
        let partner = builder.register(PartnerAccessor::default()).unwrap();
        let registry = builder.build();

        let hp = store.add_int("health_hp").unwrap();
        for _ in 0..rows {
            let row = store.allocate();
            hp.set(row, row.0);
        }
        World { store, registry, health, partner, hp_writes, label_writes }
    }
}

#[cfg(test)]
mod registry {
    use super::fixtures::{HealthAccessor, world};
    use crate::{ComponentId, ComponentRegistry, SessionError};
    use std::sync::Arc;
    use tb_core::RowId;
    use tb_store::{Store, StoreView};

    #[test]
    fn registration_declares_columns() {
        let w = world(0);
        assert!(w.store.get("health_hp").is_some());
        assert!(w.store.get("partner").is_some());
        assert_eq!(w.registry.len(), 2);
        assert_eq!(w.registry.id_of("partner"), Some(ComponentId(1)));
        assert_eq!(w.registry.name_of(w.health.id()), Some("health"));
        assert!(w.registry.accessor(w.health).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut builder = ComponentRegistry::builder(Arc::new(Store::new("p", 8)));
        builder.register(HealthAccessor::default()).unwrap();
        let err = builder.register(HealthAccessor::default()).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateComponent(ref n) if n == "health"));
    }

    #[test]
    fn presence_by_id() {
        let w = world(2);
        assert!(w.registry.is_present(w.health.id(), RowId(1)));
        assert!(!w.registry.is_present(w.partner.id(), RowId(1)));
        assert!(!w.registry.is_present(ComponentId(9), RowId(1)));
    }
}

#[cfg(test)]
mod entities {
    use super::fixtures::{Health, Partner, world};
    use crate::{Entity, Session, SessionError};
    use tb_core::RowId;
    use tb_store::{Attribute, StoreView};

    #[test]
    fn repeat_touch_returns_same_handle() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let a = s.get_entity(RowId(2));
        let b = s.get_entity(RowId(2));
        assert_eq!(a, b);
        assert_eq!(a, Entity::Cached { index: 0, id: RowId(2) });
        assert_eq!(s.len(), 1);
        assert_eq!(s.get_entity(RowId::ABSENT), Entity::Stub(RowId::ABSENT));
    }

    #[test]
    fn capacity_is_only_a_hint() {
        let w = world(10);
        let mut s = Session::new(w.registry.clone(), 2);
        for i in 0..10 {
            s.get_entity(RowId(i));
        }
        assert_eq!(s.len(), 10);
    }

    #[test]
    fn create_allocates_a_fresh_row() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.create_entity();
        assert_eq!(e.id(), RowId(3));
        assert_eq!(w.store.count(), 4);
        assert_eq!(s.get(e, w.health).unwrap(), None);

        s.add(e, w.health, Health { hp: 9, label: None }).unwrap();
        s.close().unwrap();
        assert_eq!(w.hp().get(RowId(3)), 9);
    }

    #[test]
    fn create_with_attaches_initial_components() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let mate = s.get_entity(RowId(0));
        let e = s
            .create_entity_with()
            .with(w.health, Health { hp: 12, label: Some("new".into()) })
            .unwrap()
            .with(w.partner, Partner { other: mate })
            .unwrap()
            .entity();
        assert_eq!(e.id(), RowId(3));
        assert_eq!(s.get(e, w.health).unwrap().map(|h| h.hp), Some(12));

        s.close().unwrap();
        assert_eq!(w.hp().get(RowId(3)), 12);
        assert_eq!(w.store.add_ref("partner").unwrap().get(RowId(3)), RowId(0));
    }

    #[test]
    fn deleted_rows_stay_readable_until_clear() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(1));
        s.delete_entity(e).unwrap();
        assert!(s.is_deleted(e));
        assert_eq!(s.get(e, w.health).unwrap().map(|h| h.hp), Some(1));
        assert!(matches!(s.add(e, w.health, Health::default()), Err(SessionError::Deleted(_))));

        s.get_mut(e, w.health).unwrap().unwrap().hp = 50;
        assert_eq!(s.flush().unwrap().saved, 0);
        assert_eq!(w.hp().get(RowId(1)), 1);
        assert_eq!(w.store.counter().free_ring().len(), 0);

        assert_eq!(s.clear(), 1);
        assert!(w.hp().is_empty(RowId(1)));
        assert_eq!(w.store.counter().free_ring().len(), 1);
        assert!(s.is_empty());
    }

    #[test]
    fn handles_from_other_passes_are_rejected() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let old = s.get_entity(RowId(0));
        s.clear();
        s.get_entity(RowId(2));

        assert!(matches!(s.get(old, w.health), Err(SessionError::NotCached(_))));
        assert!(matches!(s.get(old.detach(), w.health), Err(SessionError::NotCached(_))));

        let again = s.attach(old.detach());
        assert_eq!(s.get(again, w.health).unwrap().map(|h| h.hp), Some(0));
    }

    #[test]
    fn detached_loads_bypass_the_cache() {
        let w = world(3);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(2));
        s.get_mut(e, w.health).unwrap().unwrap().hp = 77;

        let fresh = s.load_detached(e.detach(), w.health).unwrap().unwrap();
        assert_eq!(fresh.hp, 2);
        assert_eq!(s.load_detached(Entity::Stub(RowId::ABSENT), w.health).unwrap(), None);
    }

    #[test]
    fn references_resolve_into_the_session() {
        let w = world(3);
        let partner = w.store.add_ref("partner").unwrap();
        partner.set(RowId(0), RowId(2));

        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(0));
        let other = s.get(e, w.partner).unwrap().unwrap().other;
        assert_eq!(other, Entity::Cached { index: 1, id: RowId(2) });
        assert_eq!(s.len(), 2);
    }
}

#[cfg(test)]
mod flushing {
    use super::fixtures::{Health, Partner, world};
    use crate::{FlushStats, Session};
    use tb_core::RowId;
    use tb_store::{Attribute, StoreView};

    #[test]
    fn unmodified_components_are_not_written() {
        let w = world(4);
        let mut s = Session::new(w.registry.clone(), 8);
        for i in 0..4 {
            let e = s.get_entity(RowId(i));
            s.get(e, w.health).unwrap();
        }
        let stats = s.flush().unwrap();
        assert_eq!(stats, FlushStats { saved: 0, skipped: 4, erased: 0 });
        assert_eq!(w.writes(), (0, 0));
    }

    #[test]
    fn changed_field_writes_only_its_column() {
        let w = world(4);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(3));
        s.get_mut(e, w.health).unwrap().unwrap().hp = 100;

        let stats = s.flush().unwrap();
        assert_eq!(stats.saved, 1);
        assert_eq!(w.writes(), (1, 0));
        assert_eq!(w.hp().get(RowId(3)), 100);

        // Second flush of the same, now persisted, value is free.
        assert_eq!(s.flush().unwrap().skipped, 1);
        assert_eq!(w.writes(), (1, 0));
    }

    #[test]
    fn added_components_wait_for_flush() {
        let w = world(2);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(0));
        s.add(e, w.health, Health { hp: 5, label: Some("sick".into()) }).unwrap();
        assert_eq!(w.hp().get(RowId(0)), 0);

        s.flush().unwrap();
        assert_eq!(w.hp().get(RowId(0)), 5);
        assert_eq!(w.writes(), (1, 1));
    }

    #[test]
    fn get_or_create_fills_missing() {
        let w = world(0);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.create_entity();
        s.get_or_create(e, w.health).unwrap().hp = 3;
        assert_eq!(s.get_or_create(e, w.health).unwrap().hp, 3);
        assert!(s.has(e, w.health).unwrap());
        assert!(!s.has(e, w.partner).unwrap());
    }

    #[test]
    fn removed_components_are_erased_at_flush() {
        let w = world(2);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(1));
        s.remove(e, w.health).unwrap();
        assert!(!w.hp().is_empty(RowId(1)));

        let stats = s.flush().unwrap();
        assert_eq!(stats.erased, 1);
        assert!(w.hp().is_empty(RowId(1)));
        assert_eq!(s.get(e, w.health).unwrap(), None);
    }

    #[test]
    fn flush_only_restricts_components() {
        let w = world(2);
        let mut s = Session::new(w.registry.clone(), 8);
        let a = s.get_entity(RowId(0));
        let b = s.get_entity(RowId(1));
        s.get_mut(a, w.health).unwrap().unwrap().hp = 40;
        s.add(b, w.partner, Partner { other: a }).unwrap();

        let stats = s.flush_only(&[w.partner.id()]).unwrap();
        assert_eq!(stats.saved, 1);
        assert_eq!(w.hp().get(RowId(0)), 0);
        assert_eq!(w.store.add_ref("partner").unwrap().get(RowId(1)), RowId(0));
    }

    #[test]
    fn abandon_discards_everything() {
        let w = world(2);
        let mut s = Session::new(w.registry.clone(), 8);
        let e = s.get_entity(RowId(0));
        s.get_mut(e, w.health).unwrap().unwrap().hp = 99;
        let created = s.create_entity();
        s.delete_entity(created).unwrap();

        s.abandon();
        assert!(s.is_empty());
        assert_eq!(w.hp().get(RowId(0)), 0);
        assert_eq!(w.store.counter().free_ring().len(), 0);
        assert_eq!(w.writes(), (0, 0));
    }
}
