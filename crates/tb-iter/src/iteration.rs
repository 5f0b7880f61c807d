//! The chunked iteration engine.
//!
//! # Run
//!
//! ```text
//! selector.chunks()
//!   │  parallel?  hooks.pre_parallel
//!   ├─ chunk 0 ─┐
//!   ├─ chunk 1 ─┼─ per chunk, on one thread:
//!   └─ …       ─┘     session  = Session::new(registry, chunk.size)
//!                     contexts = actions.begin(chunk)
//!                     for row in chunk (ascending): every action, in order
//!                     actions.end;  flush per Persist;  clear
//!      parallel?  hooks.post_parallel
//! ```
//!
//! A failing action abandons its chunk's session unflushed and the error
//! propagates; with Rayon, chunks not yet started are skipped.

use std::ops::AddAssign;
use std::sync::Arc;

use tb_core::EngineConfig;
use tb_session::{ComponentId, ComponentRegistry, Entity, FlushStats, Session};
use tb_store::StoreView;

use crate::{Chunk, ChunkInfo, ChunkOwnership, IterError, IterResult, ParallelHook, RowIter, Selector};

// ── Persist ───────────────────────────────────────────────────────────────────

/// What each chunk writes back.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Persist {
    #[default]
    All,
    Only(Vec<ComponentId>),
    /// Read-only pass: sessions are abandoned, deletions included.
    Nothing,
}

// ── Actions ───────────────────────────────────────────────────────────────────

/// User logic run against every row.
///
/// `Context` is created once per chunk and only ever touched by the thread
/// processing that chunk, so it need not be thread-safe.
pub trait ChunkAction: Send + Sync + 'static {
    type Context: 'static;

    fn begin(&self, chunk: &ChunkInfo) -> Self::Context;

    fn row(&self, ctx: &mut Self::Context, session: &mut Session, entity: Entity) -> IterResult<()>;

    fn end(&self, _ctx: Self::Context, _session: &mut Session) -> IterResult<()> {
        Ok(())
    }
}

/// A context-free action from a closure.
pub struct RowFn<F>(pub F);

impl<F> ChunkAction for RowFn<F>
where
    F: Fn(&mut Session, Entity) -> IterResult<()> + Send + Sync + 'static,
{
    type Context = ();

    fn begin(&self, _chunk: &ChunkInfo) {}

    fn row(&self, _ctx: &mut (), session: &mut Session, entity: Entity) -> IterResult<()> {
        (self.0)(session, entity)
    }
}

trait ErasedAction: Send + Sync {
    fn start<'a>(&'a self, chunk: &ChunkInfo) -> Box<dyn RowStep + 'a>;
}

trait RowStep {
    fn row(&mut self, session: &mut Session, entity: Entity) -> IterResult<()>;

    fn finish(self: Box<Self>, session: &mut Session) -> IterResult<()>;
}

struct Bound<'a, A: ChunkAction> {
    action: &'a A,
    ctx:    A::Context,
}

impl<A: ChunkAction> ErasedAction for A {
    fn start<'a>(&'a self, chunk: &ChunkInfo) -> Box<dyn RowStep + 'a> {
        Box::new(Bound { action: self, ctx: self.begin(chunk) })
    }
}

impl<A: ChunkAction> RowStep for Bound<'_, A> {
    fn row(&mut self, session: &mut Session, entity: Entity) -> IterResult<()> {
        self.action.row(&mut self.ctx, session, entity)
    }

    fn finish(self: Box<Self>, session: &mut Session) -> IterResult<()> {
        self.action.end(self.ctx, session)
    }
}

// ── RunStats ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct RunStats {
    pub chunks: usize,
    pub rows:   usize,
    pub flush:  FlushStats,
}

impl AddAssign for RunStats {
    fn add_assign(&mut self, rhs: RunStats) {
        self.chunks += rhs.chunks;
        self.rows += rhs.rows;
        self.flush += rhs.flush;
    }
}

// ── Iteration ─────────────────────────────────────────────────────────────────

/// A configured pass: registry, persistence policy, actions and hooks.
/// Reusable across runs.
pub struct Iteration {
    registry:  Arc<ComponentRegistry>,
    config:    EngineConfig,
    persist:   Persist,
    actions:   Vec<Box<dyn ErasedAction>>,
    hooks:     Vec<Arc<dyn ParallelHook>>,
    ownership: Option<Arc<ChunkOwnership>>,
    #[cfg(feature = "parallel")]
    pool:      Option<rayon::ThreadPool>,
}

impl Iteration {
    /// Validate `config` and, if it pins a thread count, build a dedicated
    /// Rayon pool.
    pub fn new(registry: Arc<ComponentRegistry>, config: &EngineConfig) -> IterResult<Self> {
        config.validate()?;

        #[cfg(feature = "parallel")]
        let pool = match config.num_threads {
            Some(n) if config.parallel => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| IterError::ThreadPool(e.to_string()))?,
            ),
            _ => None,
        };

        Ok(Self {
            registry,
            config: config.clone(),
            persist: Persist::All,
            actions: Vec::new(),
            hooks: Vec::new(),
            ownership: None,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn persist(mut self, persist: Persist) -> Self {
        self.persist = persist;
        self
    }

    /// Append an action; actions run in registration order for each row.
    pub fn action<A: ChunkAction>(mut self, action: A) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn for_each_row<F>(self, f: F) -> Self
    where
        F: Fn(&mut Session, Entity) -> IterResult<()> + Send + Sync + 'static,
    {
        self.action(RowFn(f))
    }

    pub fn hook(mut self, hook: Arc<dyn ParallelHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Claim every visited row for its chunk during parallel runs, failing
    /// the run if two chunks visit the same row.
    pub fn track_ownership(mut self) -> Self {
        let ownership = Arc::new(ChunkOwnership::new(Arc::clone(self.registry.store())));
        self.hooks.push(Arc::clone(&ownership) as Arc<dyn ParallelHook>);
        self.ownership = Some(ownership);
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    /// Process every chunk of `selector`.
    pub fn run(&self, selector: &dyn Selector) -> IterResult<RunStats> {
        let chunks = selector.chunks();
        let parallel = cfg!(feature = "parallel") && self.config.parallel && chunks.len() > 1;
        tracing::info!(
            store = %self.registry.store().name(),
            chunks = chunks.len(),
            parallel,
            persist = ?self.persist,
            "iteration started",
        );

        if !parallel {
            let mut stats = RunStats::default();
            for chunk in chunks {
                stats += self.run_chunk(chunk)?;
            }
            return Ok(stats);
        }

        for hook in &self.hooks {
            hook.pre_parallel(chunks.len());
        }
        let result = self.run_parallel(chunks);
        for hook in &self.hooks {
            hook.post_parallel();
        }
        result
    }

    #[cfg(feature = "parallel")]
    fn run_parallel(&self, chunks: Vec<Chunk>) -> IterResult<RunStats> {
        use rayon::prelude::*;

        let work = move || {
            chunks
                .into_par_iter()
                .map(|chunk| self.run_chunk(chunk))
                .try_reduce(RunStats::default, |mut a, b| {
                    a += b;
                    Ok(a)
                })
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_parallel(&self, chunks: Vec<Chunk>) -> IterResult<RunStats> {
        let mut stats = RunStats::default();
        for chunk in chunks {
            stats += self.run_chunk(chunk)?;
        }
        Ok(stats)
    }

    fn run_chunk(&self, mut chunk: Chunk) -> IterResult<RunStats> {
        let info = chunk.info().clone();
        let capacity = info.size.min(self.config.session_capacity);
        let mut session = Session::new(Arc::clone(&self.registry), capacity);
        let steps: Vec<Box<dyn RowStep + '_>> = self.actions.iter().map(|a| a.start(&info)).collect();

        let rows = match self.drive(&info, steps, &mut session, chunk.take_rows()) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(chunk = %info.id, error = %err, "chunk abandoned");
                session.abandon();
                return Err(err);
            }
        };

        let flush = match &self.persist {
            Persist::All => session.flush()?,
            Persist::Only(ids) => session.flush_only(ids)?,
            Persist::Nothing => {
                session.abandon();
                FlushStats::default()
            }
        };
        session.clear();

        tracing::trace!(
            chunk = %info.id,
            rows,
            saved = flush.saved,
            skipped = flush.skipped,
            "chunk done",
        );
        Ok(RunStats { chunks: 1, rows, flush })
    }

    fn drive(
        &self,
        info:        &ChunkInfo,
        mut steps:   Vec<Box<dyn RowStep + '_>>,
        session:     &mut Session,
        rows:        RowIter,
    ) -> IterResult<usize> {
        let mut visited = 0;
        for row in rows {
            if let Some(ownership) = &self.ownership {
                ownership.claim(row, info.id)?;
            }
            let entity = session.get_entity(row);
            for step in &mut steps {
                step.row(session, entity)?;
            }
            visited += 1;
        }
        for step in steps {
            step.finish(session)?;
        }
        Ok(visited)
    }
}
