//! `tb-session` — typed component access to a [`Store`](tb_store::Store)
//! for one iteration pass.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`accessor`]  | `ComponentAccessor`, the per-component storage contract    |
//! | [`registry`]  | `ComponentRegistry`, `ComponentKey`, `ComponentId`         |
//! | [`entity`]    | `Entity` handle, `EntityResolver`                          |
//! | [`session`]   | `Session`, `EntityBuilder`, `FlushStats`                   |
//! | [`error`]     | `SessionError`, `SessionResult`                            |
//!
//! # Lifecycle
//!
//! ```text
//! registry = builder.register(..)*.build()      once per engine
//! session  = Session::new(registry, capacity)    once per chunk
//!   get_entity / create_entity[_with] / delete_entity
//!   get / get_mut / get_or_create / add / remove
//!   flush | flush_only                           dirty rows only
//!   clear                                        frees deleted rows
//! ```

pub mod accessor;
pub mod entity;
pub mod error;
pub mod registry;
pub mod session;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use accessor::ComponentAccessor;
pub use entity::{Entity, EntityResolver};
pub use error::{SessionError, SessionResult};
pub use registry::{ComponentId, ComponentKey, ComponentRegistry, ComponentRegistryBuilder};
pub use session::{EntityBuilder, FlushStats, Session};
