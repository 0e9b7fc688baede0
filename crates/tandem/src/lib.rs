//! Hierarchical identity and state-serialization registry.
//!
//! This crate gives every stateful runtime object a unique, path-derived id
//! and describes how its state is saved and restored:
//! - [`Catalog`]: the explicit registry owning the identity tree, the
//!   pre-launch registration buffer, listeners and every defined type
//! - [`Tandem`]: a node of the identity tree (`sim.screen.particle_3`)
//! - [`Registrable`] / [`Instrumentation`]: objects that enter the catalog
//! - [`IoType`] / [`StateSchema`]: serialization contracts
//! - [`Group`] / [`Capsule`]: containers of objects created at runtime
//! - cached parametric types such as [`Catalog::reference_io`] and
//!   [`Catalog::or_io`]

pub mod api;
mod catalog;
mod combinators;
mod config;
pub mod dynamic;
mod emitter;
mod error;
mod instrument;
pub mod io_type;
pub mod restore;
pub mod tandem;

pub use catalog::{Catalog, TandemListener};
pub use combinators::{NEGATIVE_INFINITY, POSITIVE_INFINITY};
pub use config::{CatalogConfig, DEFAULT_RESTORE_RETRY_LIMIT};
pub use dynamic::{Capsule, ContainerOptions, ElementContainer, ElementSlot, Group, GroupOptions};
pub use emitter::{Emitter, ListenerId, Property};
pub use error::{StateError, TandemError};
pub use instrument::{Instrumentation, ObjectRef, Registrable, dispose, register, same_object};
pub use io_type::{Field, FieldAccess, IoType, IoTypeBuilder, StateMode, StateSchema, StateValue, Validity};
pub use tandem::{Tandem, TandemOptions};
