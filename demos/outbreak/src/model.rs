//! Components of the outbreak model and their column bindings.
//!
//! ```text
//! person
//! ├── condition_state: Enum   condition_days: Int
//! ├── visits_start / visits_length ──RangeJoin──► visit { place: Int }
//! └── vaccination ──SingleJoin (with reverse)──► dose { day: Int, reverse: Int }
//! ```

use std::sync::Arc;

use tb_core::RowId;
use tb_session::{ComponentAccessor, EntityResolver};
use tb_store::{
    Attribute, EnumColumn, IntColumn, Join, RangeJoin, SingleJoin, SingleMode, Sizing, Store,
    StoreResult, StoreView,
};

pub const VISIT_STORE: &str = "visit";
pub const DOSE_STORE: &str = "dose";

// ── Condition ─────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum State {
    #[default]
    Susceptible,
    Infected,
    Recovered,
}

impl State {
    const NAMES: [&'static str; 3] = ["susceptible", "infected", "recovered"];

    fn ordinal(self) -> u16 {
        self as u16
    }

    fn from_ordinal(ordinal: u16) -> State {
        match ordinal {
            1 => State::Infected,
            2 => State::Recovered,
            _ => State::Susceptible,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Condition {
    pub state: State,
    /// Days spent in the current state.
    pub days:  i32,
}

pub struct ConditionAccessor {
    state: Arc<EnumColumn>,
    days:  Arc<IntColumn>,
}

impl ConditionAccessor {
    pub fn new(store: &Store) -> StoreResult<Self> {
        Ok(Self {
            state: store.add_enum("condition_state", &State::NAMES)?,
            days:  store.add_int("condition_days")?,
        })
    }

    /// People per state, read straight from the columns.
    pub fn census(&self, store: &Store) -> [usize; 3] {
        let mut counts = [0; 3];
        for row in store.row_ids() {
            if let Some(ordinal) = self.state.get(row) {
                counts[State::from_ordinal(ordinal) as usize] += 1;
            }
        }
        counts
    }
}

impl ComponentAccessor for ConditionAccessor {
    type Component = Condition;

    fn name(&self) -> &str {
        "condition"
    }

    fn configure_store(&self, store: &Store) -> StoreResult<()> {
        store.add_enum("condition_state", &State::NAMES)?;
        store.add_int("condition_days")?;
        Ok(())
    }

    fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
        *self = Self::new(store)?;
        Ok(())
    }

    fn create(&self) -> Condition {
        Condition::default()
    }

    fn load(&self, _: &mut dyn EntityResolver, c: &mut Condition, row: RowId) -> StoreResult<()> {
        c.state = self.state.get(row).map(State::from_ordinal).unwrap_or_default();
        c.days = self.days.value(row).unwrap_or(0);
        Ok(())
    }

    fn save(&self, c: &Condition, row: RowId) -> StoreResult<()> {
        self.state.set(row, c.state.ordinal());
        self.days.set(row, c.days);
        Ok(())
    }

    fn is_present(&self, row: RowId) -> bool {
        self.state.get(row).is_some()
    }

    fn is_modified(&self, c: &Condition, row: RowId) -> bool {
        self.state.get(row) != Some(c.state.ordinal()) || self.days.value(row) != Some(c.days)
    }

    fn erase(&self, row: RowId) {
        self.state.set_empty(row);
        self.days.set_empty(row);
    }

    fn ensure_capacity(&self, n: usize) {
        self.state.ensure_capacity(n);
        self.days.ensure_capacity(n);
    }
}

// ── Visits ────────────────────────────────────────────────────────────────────

/// Places a person went to today.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Visits(pub Vec<i32>);

pub struct VisitsAccessor {
    join:  Arc<RangeJoin>,
    place: Arc<IntColumn>,
}

impl VisitsAccessor {
    pub fn new(store: &Store) -> StoreResult<Self> {
        let visits = store.add_store(VISIT_STORE, store.counter().free_ring().capacity());
        let place = visits.add_int("place")?;
        let join = RangeJoin::attach(store, "visits", visits, Sizing::new(2, 1), true)?;
        Ok(Self { join, place })
    }

    fn places(&self, row: RowId) -> Vec<i32> {
        self.join.load_list(row, |child| self.place.get(child))
    }
}

impl ComponentAccessor for VisitsAccessor {
    type Component = Visits;

    fn name(&self) -> &str {
        "visits"
    }

    fn configure_store(&self, store: &Store) -> StoreResult<()> {
        Self::new(store).map(|_| ())
    }

    fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
        *self = Self::new(store)?;
        Ok(())
    }

    fn create(&self) -> Visits {
        Visits::default()
    }

    fn load(&self, _: &mut dyn EntityResolver, c: &mut Visits, row: RowId) -> StoreResult<()> {
        c.0 = self.places(row);
        Ok(())
    }

    fn save(&self, c: &Visits, row: RowId) -> StoreResult<()> {
        self.join.save_list(row, &c.0, |child, place| self.place.set(child, *place))
    }

    fn is_present(&self, row: RowId) -> bool {
        !self.join.start(row).is_absent()
    }

    fn is_modified(&self, c: &Visits, row: RowId) -> bool {
        self.places(row) != c.0
    }

    fn erase(&self, row: RowId) {
        if let Err(e) = self.join.set_size(row, 0) {
            tracing::warn!(%row, error = %e, "failed to erase visits");
        }
    }

    fn ensure_capacity(&self, n: usize) {
        for column in self.join.attributes() {
            column.ensure_capacity(n);
        }
    }
}

// ── Vaccination ───────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Vaccination {
    pub day: i32,
}

pub struct VaccinationAccessor {
    join: Arc<SingleJoin>,
    day:  Arc<IntColumn>,
}

impl VaccinationAccessor {
    pub fn new(store: &Store) -> StoreResult<Self> {
        let doses = store.add_store(DOSE_STORE, store.counter().free_ring().capacity());
        let day = doses.add_int("day")?;
        let join = SingleJoin::attach(store, "vaccination", doses, SingleMode::WithReverse)?;
        Ok(Self { join, day })
    }

    fn dose(&self, row: RowId) -> RowId {
        self.join.get_row(row, 0)
    }
}

impl ComponentAccessor for VaccinationAccessor {
    type Component = Vaccination;

    fn name(&self) -> &str {
        "vaccination"
    }

    fn configure_store(&self, store: &Store) -> StoreResult<()> {
        Self::new(store).map(|_| ())
    }

    fn attach_store(&mut self, store: &Store) -> StoreResult<()> {
        *self = Self::new(store)?;
        Ok(())
    }

    fn create(&self) -> Vaccination {
        Vaccination::default()
    }

    fn load(&self, _: &mut dyn EntityResolver, c: &mut Vaccination, row: RowId) -> StoreResult<()> {
        c.day = self.day.value(self.dose(row)).unwrap_or(0);
        Ok(())
    }

    fn save(&self, c: &Vaccination, row: RowId) -> StoreResult<()> {
        if self.dose(row).is_absent() {
            self.join.set_size(row, 1)?;
        }
        self.day.set(self.dose(row), c.day);
        Ok(())
    }

    fn is_present(&self, row: RowId) -> bool {
        !self.dose(row).is_absent()
    }

    fn is_modified(&self, c: &Vaccination, row: RowId) -> bool {
        self.day.value(self.dose(row)) != Some(c.day)
    }

    fn erase(&self, row: RowId) {
        if let Err(e) = self.join.set_size(row, 0) {
            tracing::warn!(%row, error = %e, "failed to erase vaccination");
        }
    }

    fn ensure_capacity(&self, n: usize) {
        for column in self.join.attributes() {
            column.ensure_capacity(n);
        }
    }
}
