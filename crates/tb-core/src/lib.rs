//! `tb-core` — foundational types for the `tabula` columnar entity store.
//!
//! This crate is a dependency of every other `tb-*` crate.  It has no `tb-*`
//! dependencies and minimal external ones (`rand`, `thiserror`, `tracing`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module          | Contents                                              |
//! |-----------------|-------------------------------------------------------|
//! | [`ids`]         | `RowId`, `ChunkId`, the `ABSENT` sentinel             |
//! | [`counter`]     | `Counter` (row allocator), `FreeRing`                 |
//! | [`config`]      | `EngineConfig`                                        |
//! | [`rng`]         | `RowRng` (per-row deterministic RNG)                  |
//! | [`error`]       | `CoreError`, `CoreResult`                             |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids and `EngineConfig`.  |

pub mod config;
pub mod counter;
pub mod error;
pub mod ids;
pub mod rng;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::EngineConfig;
pub use counter::{Counter, FreeRing};
pub use error::{CoreError, CoreResult};
pub use ids::{ABSENT, ChunkId, RowId, encode_base36};
pub use rng::RowRng;
