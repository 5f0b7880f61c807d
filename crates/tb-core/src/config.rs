//! Engine configuration.
//!
//! Typically loaded from a TOML/JSON file by the application crate (with the
//! `serde` feature) and passed to store and iteration constructors.

use crate::{CoreError, CoreResult};

/// Tuning knobs shared by the allocator, sessions and the iteration engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Slots in each store's free ring.  Frees beyond this are dropped.
    pub free_list_capacity: usize,

    /// Rows per chunk for dense range selectors.
    pub chunk_size: usize,

    /// Initial slot capacity of a session.  Grows on demand.
    pub session_capacity: usize,

    /// Worker thread count passed to Rayon.  `None` uses the global pool.
    pub num_threads: Option<usize>,

    /// Run chunks on the Rayon pool.  `false` processes them in order on the
    /// calling thread.
    pub parallel: bool,
}

impl EngineConfig {
    pub const DEFAULT_FREE_LIST_CAPACITY: usize = 65_536;
    pub const DEFAULT_CHUNK_SIZE: usize = 4_096;

    /// Reject configurations that cannot make progress.
    pub fn validate(&self) -> CoreResult<()> {
        if self.free_list_capacity == 0 {
            return Err(CoreError::Config("free_list_capacity must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(CoreError::Config("chunk_size must be > 0".into()));
        }
        if self.session_capacity == 0 {
            return Err(CoreError::Config("session_capacity must be > 0".into()));
        }
        if self.num_threads == Some(0) {
            return Err(CoreError::Config("num_threads must be > 0 when set".into()));
        }
        Ok(())
    }

    /// A single-threaded configuration, convenient for tests.
    pub fn sequential() -> Self {
        Self { parallel: false, num_threads: Some(1), ..Self::default() }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            free_list_capacity: Self::DEFAULT_FREE_LIST_CAPACITY,
            chunk_size:         Self::DEFAULT_CHUNK_SIZE,
            session_capacity:   Self::DEFAULT_CHUNK_SIZE,
            num_threads:        None,
            parallel:           true,
        }
    }
}
