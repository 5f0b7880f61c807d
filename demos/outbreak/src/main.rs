//! `outbreak` — a toy epidemic over a column store.
//!
//! Every person visits one to three places a day.  A place visited by an
//! infected person is contagious the next day; susceptible, unvaccinated
//! visitors catch the infection with probability `TRANSMISSION`.  Each day
//! runs two passes:
//!
//! 1. a read-only pass collecting contagious places, one set per chunk,
//! 2. an update pass advancing every condition and drawing new visits.
//!
//! Every random draw comes from a `RowRng` keyed by (seed, row, day), so the
//! result is identical whatever the thread count.
//!
//! Run with:
//!   RUST_LOG=info cargo run -p outbreak --release -- [out.csv]

mod model;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing_subscriber::EnvFilter;

use tb_core::{EngineConfig, RowRng};
use tb_iter::{ChunkAction, ChunkInfo, IterResult, Iteration, Persist, RangeSelector};
use tb_session::{ComponentKey, ComponentRegistry, Entity, Session};
use tb_store::{Store, StoreView};

use model::{
    Condition, ConditionAccessor, State, Vaccination, VaccinationAccessor, Visits, VisitsAccessor,
};

// ── Constants ─────────────────────────────────────────────────────────────────

const POPULATION:       usize = 200_000;
const PLACES:           i32   = 5_000;
const INITIAL_CASES:    usize = 50;
const SEED:             u64   = 7;
const DAYS:             u64   = 60;
const TRANSMISSION:     f64   = 0.08;
const VACCINATION_RATE: f64   = 0.25;
const INFECTIOUS_DAYS:  i32   = 7;

// ── Keys ──────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone)]
struct Keys {
    condition:   ComponentKey<ConditionAccessor>,
    visits:      ComponentKey<VisitsAccessor>,
    vaccination: ComponentKey<VaccinationAccessor>,
}

fn draw_visits(rng: &mut RowRng) -> Visits {
    let n = rng.gen_range(1..=3);
    Visits((0..n).map(|_| rng.gen_range(0..PLACES)).collect())
}

// ── Passes ────────────────────────────────────────────────────────────────────

/// Collects the places infected people visited, merging once per chunk.
struct ContagiousPlaces {
    keys: Keys,
    sink: Arc<Mutex<FxHashSet<i32>>>,
}

impl ChunkAction for ContagiousPlaces {
    type Context = FxHashSet<i32>;

    fn begin(&self, _chunk: &ChunkInfo) -> FxHashSet<i32> {
        FxHashSet::default()
    }

    fn row(&self, places: &mut FxHashSet<i32>, session: &mut Session, entity: Entity) -> IterResult<()> {
        let infected = session
            .get(entity, self.keys.condition)?
            .is_some_and(|c| c.state == State::Infected);
        if infected {
            if let Some(visits) = session.get(entity, self.keys.visits)? {
                places.extend(visits.0.iter().copied());
            }
        }
        Ok(())
    }

    fn end(&self, places: FxHashSet<i32>, _session: &mut Session) -> IterResult<()> {
        self.sink.lock().extend(places);
        Ok(())
    }
}

fn contagious_places(
    registry: &Arc<ComponentRegistry>,
    config:   &EngineConfig,
    keys:     Keys,
) -> Result<Arc<FxHashSet<i32>>> {
    let sink = Arc::new(Mutex::new(FxHashSet::default()));
    Iteration::new(Arc::clone(registry), config)?
        .persist(Persist::Nothing)
        .action(ContagiousPlaces { keys, sink: Arc::clone(&sink) })
        .run(&RangeSelector::all(registry.store(), config.chunk_size))?;
    let places = std::mem::take(&mut *sink.lock());
    Ok(Arc::new(places))
}

fn advance_day(
    registry: &Arc<ComponentRegistry>,
    config:   &EngineConfig,
    keys:     Keys,
    day:      u64,
    hot:      Arc<FxHashSet<i32>>,
) -> Result<()> {
    let stats = Iteration::new(Arc::clone(registry), config)?
        .persist(Persist::Only(vec![keys.condition.id(), keys.visits.id()]))
        .track_ownership()
        .for_each_row(move |session, entity| {
            let vaccinated = session.has(entity, keys.vaccination)?;
            let exposed = session
                .get(entity, keys.visits)?
                .is_some_and(|v| v.0.iter().any(|p| hot.contains(p)));
            let mut rng = RowRng::new(SEED, entity.id(), day);

            let Some(condition) = session.get_mut(entity, keys.condition)? else {
                return Ok(());
            };
            match condition.state {
                State::Susceptible if exposed && !vaccinated && rng.gen_bool(TRANSMISSION) => {
                    condition.state = State::Infected;
                    condition.days = 0;
                }
                State::Infected if condition.days >= INFECTIOUS_DAYS => {
                    condition.state = State::Recovered;
                    condition.days = 0;
                }
                _ => condition.days += 1,
            }

            session.add(entity, keys.visits, draw_visits(&mut rng))?;
            Ok(())
        })
        .run(&RangeSelector::all(registry.store(), config.chunk_size))?;
    tracing::debug!(day, rows = stats.rows, saved = stats.flush.saved, "day advanced");
    Ok(())
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let out = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("outbreak_person.csv"));

    let config = EngineConfig { chunk_size: 8_192, ..EngineConfig::default() };
    config.validate()?;

    let store = Arc::new(Store::from_config("person", &config));
    let mut builder = ComponentRegistry::builder(Arc::clone(&store));
    let keys = Keys {
        condition:   builder.register(ConditionAccessor::new(&store)?)?,
        visits:      builder.register(VisitsAccessor::new(&store)?)?,
        vaccination: builder.register(VaccinationAccessor::new(&store)?)?,
    };
    let registry = builder.build();

    // ── Population ────────────────────────────────────────────────────────
    let t = Instant::now();
    let mut session = Session::new(Arc::clone(&registry), POPULATION);
    for i in 0..POPULATION {
        let person = session.create_entity();
        let mut rng = RowRng::new(SEED, person.id(), 0);
        let state = if i < INITIAL_CASES { State::Infected } else { State::Susceptible };
        session.add(person, keys.condition, Condition { state, days: 0 })?;
        session.add(person, keys.visits, draw_visits(&mut rng))?;
        if rng.gen_bool(VACCINATION_RATE) {
            session.add(person, keys.vaccination, Vaccination { day: 0 })?;
        }
    }
    let stats = session.close()?;
    tracing::info!(
        people = store.count(),
        visits = store.store(model::VISIT_STORE).map_or(0, |s| s.count()),
        doses = store.store(model::DOSE_STORE).map_or(0, |s| s.count()),
        saved = stats.saved,
        elapsed_ms = t.elapsed().as_millis() as u64,
        "population created",
    );

    // ── Days ──────────────────────────────────────────────────────────────
    let condition = registry.accessor(keys.condition)?;
    for day in 1..=DAYS {
        let hot = contagious_places(&registry, &config, keys)?;
        advance_day(&registry, &config, keys, day, Arc::clone(&hot))?;

        let [susceptible, infected, recovered] = condition.census(&store);
        tracing::info!(day, contagious = hot.len(), susceptible, infected, recovered, "census");
        if infected == 0 {
            break;
        }
    }

    let rows = tb_io::export_csv_path(store.as_ref(), &out)?;
    tracing::info!(rows, path = %out.display(), "exported");
    Ok(())
}
