//! Unit tests for tb-iter.

#[cfg(test)]
mod fixtures {
    use std::sync::Arc;

    use tb_core::{EngineConfig, RowId};
    use tb_session::{ComponentAccessor, ComponentKey, ComponentRegistry, EntityResolver};
    use tb_store::{Attribute, IntColumn, Store, StoreResult, StoreView};

    /// One `i32` column per component.
    pub struct IntAccessor {
        name:   &'static str,
        column: Option<Arc<IntColumn>>,
    }

    impl IntAccessor {
        pub fn new(name: &'static str) -> Self {
            Self { name, column: None }
        }

        fn col(&self) -> &IntColumn {
            self.column.as_deref().expect("attached")
        }
    }

    impl ComponentAccessor for IntAccessor {
        type Component = i32;

        fn name(&self) -> &str {
            self.name
        }

        fn configure_store(&self, store: &Store) -> StoreResult<()> {
            store.add_int(self.name).map(|_| ())
        }

        fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
            self.column = Some(store.add_int(self.name)?);
            Ok(())
        }

        fn create(&self) -> i32 {
            0
        }

        fn load(&self, _: &mut dyn EntityResolver, c: &mut i32, row: RowId) -> StoreResult<()> {
            *c = self.col().get(row);
            Ok(())
        }

        fn save(&self, c: &i32, row: RowId) -> StoreResult<()> {
            self.col().set(row, *c);
            Ok(())
        }

        fn is_present(&self, row: RowId) -> bool {
            !self.col().is_empty(row)
        }

        fn is_modified(&self, c: &i32, row: RowId) -> bool {
            self.col().value(row) != Some(*c)
        }

        fn erase(&self, row: RowId) {
            self.col().set_empty(row);
        }

        fn ensure_capacity(&self, n: usize) {
            self.col().ensure_capacity(n);
        }
    }

    pub struct World {
        pub store:    Arc<Store>,
        pub registry: Arc<ComponentRegistry>,
        pub input:    ComponentKey<IntAccessor>,
        pub score:    ComponentKey<IntAccessor>,
    }

    impl World {
        pub fn column(&self, name: &str) -> Arc<IntColumn> {
            self.store.add_int(name).unwrap()
        }

        pub fn scores(&self) -> Vec<Option<i32>> {
            let score = self.column("score");
            self.store.row_ids().map(|r| score.value(r)).collect()
        }
    }

    /// `rows` rows with `input = row index`.
    pub fn world(rows: usize) -> World {
        let store = Arc::new(Store::new("cell", 1024));
        let mut builder = ComponentRegistry::builder(Arc::clone(&store));
        let input = builder.register(IntAccessor::new("input")).unwrap();
        let score = builder.register(IntAccessor::new("score")).unwrap();
        let registry = builder.build();

        let column = store.add_int("input").unwrap();
        for _ in 0..rows {
            let row = store.allocate();
            column.set(row, row.0);
        }
        World { store, registry, input, score }
    }

    pub fn sequential(chunk_size: usize) -> EngineConfig {
        EngineConfig { chunk_size, ..EngineConfig::sequential() }
    }

    pub fn parallel(chunk_size: usize, threads: usize) -> EngineConfig {
        EngineConfig { chunk_size, num_threads: Some(threads), parallel: true, ..EngineConfig::default() }
    }
}

#[cfg(test)]
mod selectors {
    use tb_core::{ChunkId, RowId};

    use super::fixtures::world;
    use crate::{GroupedSelector, PresenceSelector, RangeSelector, Selector};

    #[test]
    fn range_splits_into_fixed_chunks() {
        let mut chunks = RangeSelector::new(0..10, 4).chunks();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.size()).collect();
        assert_eq!(sizes, [4, 4, 2]);
        assert_eq!(chunks[2].id(), ChunkId(2));

        let rows: Vec<RowId> = chunks[1].take_rows().collect();
        assert_eq!(rows, [RowId(4), RowId(5), RowId(6), RowId(7)]);
        assert_eq!(chunks[1].take_rows().count(), 0);
    }

    #[test]
    fn empty_range_has_no_chunks() {
        assert!(RangeSelector::new(5..5, 4).chunks().is_empty());
    }

    #[test]
    fn groups_are_sorted_and_labelled() {
        let selector = GroupedSelector::new()
            .group(Some("north"), [RowId(9), RowId(2), RowId(9), RowId::ABSENT])
            .group(None, [RowId(1)]);
        let mut chunks = selector.chunks();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].label(), Some("north"));
        assert_eq!(chunks[0].size(), 2);
        assert_eq!(chunks[0].take_rows().collect::<Vec<_>>(), [RowId(2), RowId(9)]);
        assert_eq!(chunks[1].label(), None);
    }

    #[test]
    fn presence_requires_every_component() {
        let w = world(6);
        let score = w.column("score");
        for r in [1, 3, 4] {
            score.set(RowId(r), 0);
        }
        let selector = PresenceSelector::new(w.registry.clone(), &[w.input.id(), w.score.id()], 2);
        let mut chunks = selector.chunks();
        assert_eq!(chunks.len(), 2);
        let rows: Vec<RowId> = chunks.iter_mut().flat_map(|c| c.take_rows().collect::<Vec<_>>()).collect();
        assert_eq!(rows, [RowId(1), RowId(3), RowId(4)]);
    }
}

#[cfg(test)]
mod runs {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tb_core::{EngineConfig, RowId, RowRng};
    use tb_session::{Entity, Session};
    use tb_store::{Attribute, StoreView};

    use super::fixtures::{parallel, sequential, world};
    use crate::{
        ChunkAction, ChunkInfo, GroupedSelector, IterError, IterResult, Iteration, ParallelHook,
        Persist, RangeSelector,
    };

    #[test]
    fn doubles_every_row() {
        let w = world(10);
        let (input, score) = (w.input, w.score);
        let stats = Iteration::new(w.registry.clone(), &sequential(4))
            .unwrap()
            .for_each_row(move |s, e| {
                let v = s.get(e, input)?.copied().unwrap_or_default();
                s.add(e, score, v * 2)?;
                Ok(())
            })
            .run(&RangeSelector::all(&w.store, 4))
            .unwrap();

        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.rows, 10);
        assert_eq!(stats.flush.saved, 10);
        assert_eq!(stats.flush.skipped, 10);
        assert_eq!(w.scores(), (0..10).map(|i| Some(i * 2)).collect::<Vec<_>>());
    }

    fn noisy_pass(config: &EngineConfig) -> Vec<Option<i32>> {
        let w = world(500);
        let (input, score) = (w.input, w.score);
        Iteration::new(w.registry.clone(), config)
            .unwrap()
            .for_each_row(move |s, e| {
                let base = s.get(e, input)?.copied().unwrap_or_default();
                let mut rng = RowRng::new(42, e.id(), 3);
                s.add(e, score, base + rng.gen_range(0..1_000))?;
                Ok(())
            })
            .run(&RangeSelector::all(&w.store, config.chunk_size))
            .unwrap();
        w.scores()
    }

    #[test]
    fn results_do_not_depend_on_chunking() {
        let reference = noisy_pass(&sequential(500));
        assert_eq!(noisy_pass(&sequential(7)), reference);
        assert_eq!(noisy_pass(&parallel(7, 4)), reference);
        assert_eq!(noisy_pass(&parallel(64, 2)), reference);
    }

    /// Records each chunk's rows in a per-chunk context.
    struct Recorder {
        begun: Arc<AtomicUsize>,
        seen:  Arc<Mutex<Vec<Vec<RowId>>>>,
    }

    impl ChunkAction for Recorder {
        type Context = Vec<RowId>;

        fn begin(&self, chunk: &ChunkInfo) -> Vec<RowId> {
            self.begun.fetch_add(1, Ordering::Relaxed);
            Vec::with_capacity(chunk.size)
        }

        fn row(&self, ctx: &mut Vec<RowId>, _: &mut Session, entity: Entity) -> IterResult<()> {
            ctx.push(entity.id());
            Ok(())
        }

        fn end(&self, ctx: Vec<RowId>, _: &mut Session) -> IterResult<()> {
            self.seen.lock().push(ctx);
            Ok(())
        }
    }

    #[test]
    fn one_context_per_chunk_rows_ascending() {
        let w = world(100);
        let begun = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        Iteration::new(w.registry.clone(), &parallel(9, 4))
            .unwrap()
            .action(Recorder { begun: begun.clone(), seen: seen.clone() })
            .run(&RangeSelector::all(&w.store, 9))
            .unwrap();

        assert_eq!(begun.load(Ordering::Relaxed), 12);
        let seen = seen.lock();
        assert_eq!(seen.len(), 12);
        assert!(seen.iter().all(|rows| rows.windows(2).all(|p| p[0] < p[1])));
        assert_eq!(seen.iter().map(Vec::len).sum::<usize>(), 100);
    }

    #[test]
    fn read_only_pass_writes_nothing() {
        let w = world(5);
        let score = w.score;
        let stats = Iteration::new(w.registry.clone(), &sequential(2))
            .unwrap()
            .persist(Persist::Nothing)
            .for_each_row(move |s, e| s.add(e, score, 1).map_err(Into::into))
            .run(&RangeSelector::all(&w.store, 2))
            .unwrap();
        assert_eq!(stats.flush.saved, 0);
        assert!(w.scores().iter().all(Option::is_none));
    }

    #[test]
    fn persist_only_named_components() {
        let w = world(4);
        let (input, score) = (w.input, w.score);
        Iteration::new(w.registry.clone(), &sequential(4))
            .unwrap()
            .persist(Persist::Only(vec![score.id()]))
            .for_each_row(move |s, e| {
                *s.get_mut(e, input)?.unwrap() = -1;
                s.add(e, score, 7)?;
                Ok(())
            })
            .run(&RangeSelector::all(&w.store, 4))
            .unwrap();
        assert_eq!(w.column("input").get(RowId(2)), 2);
        assert_eq!(w.column("score").get(RowId(2)), 7);
    }

    #[test]
    fn failing_chunk_is_abandoned() {
        let w = world(9);
        let score = w.score;
        let err = Iteration::new(w.registry.clone(), &sequential(3))
            .unwrap()
            .for_each_row(move |s, e| {
                s.add(e, score, 1)?;
                if e.id() == RowId(4) {
                    return Err(IterError::Action("boom".into()));
                }
                Ok(())
            })
            .run(&RangeSelector::all(&w.store, 3))
            .unwrap_err();

        assert!(matches!(err, IterError::Action(ref m) if m == "boom"));
        let scores = w.scores();
        assert!(scores[..3].iter().all(|s| *s == Some(1)));
        assert!(scores[3..].iter().all(Option::is_none));
    }

    #[test]
    fn deletions_free_rows_after_the_chunk() {
        let w = world(6);
        let input = w.input;
        Iteration::new(w.registry.clone(), &sequential(3))
            .unwrap()
            .for_each_row(move |s, e| {
                if s.get(e, input)?.is_some_and(|v| v % 2 == 1) {
                    s.delete_entity(e)?;
                }
                Ok(())
            })
            .run(&RangeSelector::all(&w.store, 3))
            .unwrap();
        assert_eq!(w.store.counter().free_ring().len(), 3);
        assert!(w.column("input").is_empty(RowId(3)));
        assert!(!w.store.is_row_present(RowId(3)));
    }

    #[derive(Default)]
    struct CountingHook {
        pre:  AtomicUsize,
        post: AtomicUsize,
    }

    impl ParallelHook for CountingHook {
        fn pre_parallel(&self, _chunks: usize) {
            self.pre.fetch_add(1, Ordering::Relaxed);
        }

        fn post_parallel(&self) {
            self.post.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn hooks_wrap_parallel_runs_only() {
        let w = world(20);
        let hook = Arc::new(CountingHook::default());

        Iteration::new(w.registry.clone(), &sequential(5))
            .unwrap()
            .hook(hook.clone())
            .run(&RangeSelector::all(&w.store, 5))
            .unwrap();
        assert_eq!(hook.pre.load(Ordering::Relaxed), 0);

        Iteration::new(w.registry.clone(), &parallel(5, 2))
            .unwrap()
            .hook(hook.clone())
            .run(&RangeSelector::all(&w.store, 5))
            .unwrap();
        assert_eq!(hook.pre.load(Ordering::Relaxed), 1);
        assert_eq!(hook.post.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn overlapping_chunks_are_detected() {
        let w = world(10);
        let selector = GroupedSelector::new()
            .group(None, [RowId(1), RowId(2), RowId(3)])
            .group(None, [RowId(3), RowId(4)]);
        let err = Iteration::new(w.registry.clone(), &parallel(5, 2))
            .unwrap()
            .track_ownership()
            .run(&selector)
            .unwrap_err();
        assert!(matches!(err, IterError::OwnershipConflict { row: RowId(3), .. }));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let w = world(1);
        let config = EngineConfig { chunk_size: 0, ..EngineConfig::default() };
        assert!(matches!(Iteration::new(w.registry.clone(), &config), Err(IterError::Config(_))));
    }
}

#[cfg(test)]
mod ownership {
    use std::sync::Arc;

    use tb_core::{ChunkId, RowId};
    use tb_store::Store;

    use crate::{ChunkOwnership, IterError, ParallelHook};

    #[test]
    fn claims_only_while_tracking() {
        let store = Arc::new(Store::new("cell", 16));
        store.allocate_block(4);
        let owners = ChunkOwnership::new(store);

        assert!(owners.claim(RowId(1), ChunkId(0)).is_ok());
        assert!(owners.claim(RowId(1), ChunkId(1)).is_ok());

        owners.pre_parallel(2);
        assert!(owners.is_tracking());
        owners.claim(RowId(1), ChunkId(0)).unwrap();
        owners.claim(RowId(1), ChunkId(0)).unwrap();
        assert_eq!(owners.owner(RowId(1)), Some(ChunkId(0)));
        assert!(matches!(
            owners.claim(RowId(1), ChunkId(1)),
            Err(IterError::OwnershipConflict { first: ChunkId(0), second: ChunkId(1), .. })
        ));
        assert!(owners.claim(RowId(99), ChunkId(1)).is_ok());

        owners.post_parallel();
        assert!(!owners.is_tracking());
        assert_eq!(owners.owner(RowId(1)), None);
    }
}
