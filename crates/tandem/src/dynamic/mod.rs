//! Objects created and destroyed while the application runs.
//!
//! A [`DynamicContainer`] owns the lifecycle shared by every container kind:
//! the optional archetype, element creation under freshly minted tandems,
//! and the created/disposed notification channels with their deferred
//! queues. [`Group`] keeps an indexed list of elements; [`Capsule`] holds at
//! most one.

mod capsule;
mod container;
mod group;

pub use capsule::Capsule;
pub use container::{ContainerOptions, DynamicContainer, ElementFactory, StateToArgs};
pub use group::{Group, GroupOptions};

use crate::error::{StateError, TandemError};
use crate::instrument::ObjectRef;
use crate::io_type::StateValue;
use crate::tandem::Tandem;

#[cfg(test)]
mod tests;

/// Where a state-restored element goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementSlot {
	/// The group element with this index.
	Indexed(usize),
	/// The only element of a capsule.
	Single,
}

/// Type-erased view of a dynamic container for restoration drivers and the
/// container types' `add_child_element` hooks.
pub trait ElementContainer {
	fn container_tandem(&self) -> &Tandem;

	/// Ids of the current elements, oldest first.
	fn element_ids(&self) -> Vec<String>;

	/// Builds an element from its saved state. Only legal while the catalog
	/// is setting state.
	fn create_element_from_state(
		&self,
		slot: ElementSlot,
		state: &StateValue,
	) -> Result<ObjectRef, StateError>;

	/// Disposes every element, oldest first.
	fn clear_elements(&self, reset_index: bool) -> Result<(), TandemError>;

	fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError>;

	fn notifications_deferred(&self) -> bool;
}
