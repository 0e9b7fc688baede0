//! Registrable objects.
//!
//! An object takes part in the catalog by embedding an [`Instrumentation`]
//! (its tandem and type) and implementing [`Registrable`]. Objects are shared
//! as [`ObjectRef`] and added/removed with [`register`] and [`dispose`].

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::dynamic::ElementContainer;
use crate::error::TandemError;
use crate::io_type::IoType;
use crate::tandem::Tandem;

/// Shared handle to a registrable object.
pub type ObjectRef = Rc<dyn Registrable>;

/// A runtime object paired with an identity node and a type.
pub trait Registrable: Any {
	fn instrumentation(&self) -> &Instrumentation;

	/// Dynamic containers expose their element lifecycle here.
	fn as_element_container(&self) -> Option<&dyn ElementContainer> {
		None
	}
}

impl dyn Registrable {
	pub fn tandem(&self) -> &Tandem {
		self.instrumentation().tandem()
	}

	pub fn io_type(&self) -> &IoType {
		self.instrumentation().io_type()
	}

	pub fn phetio_id(&self) -> &str {
		self.instrumentation().phetio_id()
	}
}

impl fmt::Debug for dyn Registrable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registrable")
			.field("id", &self.phetio_id())
			.field("type", &self.io_type().type_name())
			.finish()
	}
}

/// Identity, type and lifecycle flags of a registrable object.
pub struct Instrumentation {
	tandem: Tandem,
	io_type: IoType,
	dynamic_element: bool,
	container_owned: Cell<bool>,
	disposed: Cell<bool>,
}

impl fmt::Debug for Instrumentation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instrumentation")
			.field("id", &self.tandem.phetio_id())
			.field("type", &self.io_type.type_name())
			.field("dynamic_element", &self.dynamic_element)
			.field("container_owned", &self.container_owned.get())
			.field("disposed", &self.disposed.get())
			.finish()
	}
}

impl Instrumentation {
	pub fn new(tandem: Tandem, io_type: IoType) -> Self {
		Self {
			tandem,
			io_type,
			dynamic_element: false,
			container_owned: Cell::new(false),
			disposed: Cell::new(false),
		}
	}

	/// Marks the object as created and destroyed at runtime by a container.
	pub fn dynamic_element(mut self, on: bool) -> Self {
		self.dynamic_element = on;
		self
	}

	pub fn tandem(&self) -> &Tandem {
		&self.tandem
	}

	pub fn io_type(&self) -> &IoType {
		&self.io_type
	}

	pub fn phetio_id(&self) -> &str {
		self.tandem.phetio_id()
	}

	pub fn is_dynamic_element(&self) -> bool {
		self.dynamic_element
	}

	/// True once a dynamic container has taken over the object's lifecycle.
	pub fn is_container_owned(&self) -> bool {
		self.container_owned.get()
	}

	pub(crate) fn mark_container_owned(&self) {
		self.container_owned.set(true);
	}

	pub fn is_archetype(&self) -> bool {
		self.tandem.is_archetype()
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.get()
	}
}

/// Adds `object` to its tandem's registration stream.
pub fn register(object: &ObjectRef) -> Result<(), TandemError> {
	object.tandem().add_registration(object)
}

/// Removes `object` from the registration stream and disposes its tandem.
///
/// Disposing twice is an error, and so is disposing an element a dynamic
/// container owns.
pub fn dispose(object: &ObjectRef) -> Result<(), TandemError> {
	if object.instrumentation().is_container_owned() {
		return Err(TandemError::ContainerOwned {
			id: object.phetio_id().to_string(),
		});
	}
	release(object)
}

/// [`dispose`] without the ownership check, for containers.
pub(crate) fn release(object: &ObjectRef) -> Result<(), TandemError> {
	let instrumentation = object.instrumentation();
	if instrumentation.is_disposed() {
		return Err(TandemError::Disposed {
			id: instrumentation.phetio_id().to_string(),
		});
	}
	instrumentation.tandem().remove_registration(object)?;
	instrumentation.disposed.set(true);
	Ok(())
}

/// Address identity of two objects, ignoring vtables.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
	std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
