//! `tb-iter` — chunked, optionally parallel passes over a store.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                      |
//! |-----------------|---------------------------------------------------------------|
//! | [`chunk`]       | `Chunk`, `ChunkInfo`, `RowIter`                               |
//! | [`selector`]    | `Selector`, `RangeSelector`, `GroupedSelector`, `PresenceSelector` |
//! | [`iteration`]   | `Iteration`, `ChunkAction`, `RowFn`, `Persist`, `RunStats`    |
//! | [`hook`]        | `ParallelHook`, `ChunkOwnership`                              |
//! | [`error`]       | `IterError`, `IterResult`                                     |
//!
//! # Guarantees
//!
//! - Exactly one `Session` and one set of action contexts per chunk.
//! - Every row of a chunk is processed on one thread, in ascending order.
//! - No ordering between chunks.
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | (default) Runs chunks on Rayon when `EngineConfig::parallel` is set. |

pub mod chunk;
pub mod error;
pub mod hook;
pub mod iteration;
pub mod selector;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use chunk::{Chunk, ChunkInfo, RowIter};
pub use error::{IterError, IterResult};
pub use hook::{ChunkOwnership, ParallelHook};
pub use iteration::{ChunkAction, Iteration, Persist, RowFn, RunStats};
pub use selector::{GroupedSelector, PresenceSelector, RangeSelector, Selector};
