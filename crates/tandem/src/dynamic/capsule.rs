use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::container::{ContainerOptions, DynamicContainer, ElementFactory};
use super::{ElementContainer, ElementSlot};
use crate::emitter::Emitter;
use crate::error::{StateError, TandemError};
use crate::instrument::{self, Instrumentation, ObjectRef, Registrable};
use crate::io_type::{IoType, StateValue};
use crate::tandem::Tandem;

/// A container holding at most one lazily created element.
///
/// The element is named after the container minus its suffix
/// (`heldItemCapsule` holds `heldItem`).
pub struct Capsule<T, A> {
	container: DynamicContainer<T, A>,
	element: RefCell<Option<Rc<T>>>,
}

impl<T, A> fmt::Debug for Capsule<T, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Capsule")
			.field("container", &self.container)
			.field("has_element", &self.element.borrow().is_some())
			.finish()
	}
}

impl<T: Registrable, A: 'static> Capsule<T, A> {
	/// Builds and registers a capsule typed `PhetioCapsuleIO<element_type>`.
	pub fn new(
		tandem: Tandem,
		element_type: &IoType,
		factory: impl Fn(&Tandem, A) -> Result<Rc<T>, TandemError> + 'static,
		archetype_args: A,
		options: ContainerOptions<A>,
	) -> Result<Rc<Self>, TandemError> {
		let io_type = tandem.catalog()?.capsule_io(element_type);
		let factory: ElementFactory<T, A> = Rc::new(factory);
		let container = DynamicContainer::new(
			tandem,
			io_type,
			element_type.clone(),
			factory,
			options,
			"Capsule",
		)?;
		let capsule = Rc::new(Self {
			container,
			element: RefCell::new(None),
		});
		capsule.container.create_archetype(archetype_args)?;
		let object: ObjectRef = capsule.clone();
		instrument::register(&object)?;
		Ok(capsule)
	}

	pub fn tandem(&self) -> &Tandem {
		self.container.tandem()
	}

	pub fn archetype(&self) -> Option<Rc<T>> {
		self.container.archetype()
	}

	pub fn element_created(&self) -> &Emitter<Rc<T>> {
		self.container.element_created()
	}

	pub fn element_disposed(&self) -> &Emitter<Rc<T>> {
		self.container.element_disposed()
	}

	pub fn has_element(&self) -> bool {
		self.element.borrow().is_some()
	}

	/// The current element without creating one.
	pub fn element(&self) -> Option<Rc<T>> {
		self.element.borrow().clone()
	}

	/// Returns the element, creating it from `args` on first use.
	pub fn get_element(&self, args: A) -> Result<Rc<T>, TandemError> {
		if let Some(element) = self.element() {
			return Ok(element);
		}
		self.create_element(args, false)
	}

	fn create_element(&self, args: A, during_restore: bool) -> Result<Rc<T>, TandemError> {
		let name = self.container.element_prefix().to_string();
		if during_restore {
			self.container.check_restore_path(&name)?;
		}
		if let Some(existing) = self.element() {
			return Err(TandemError::InvalidDynamicElement {
				id: existing.instrumentation().phetio_id().to_string(),
				reason: "capsule already holds an element".to_string(),
			});
		}
		let element = self.container.create_dynamic_element(&name, args)?;
		*self.element.borrow_mut() = Some(element.clone());
		self.container.notify_element_created(&element);
		Ok(element)
	}

	/// Disposes the element, if any.
	pub fn dispose_element(&self) -> Result<(), TandemError> {
		let Some(element) = self.element() else {
			return Err(TandemError::ElementNotInContainer {
				id: format!("{}.{}", self.tandem().phetio_id(), self.container.element_prefix()),
				container: self.tandem().phetio_id().to_string(),
			});
		};
		self.container.dispose_element(&element, || {
			self.element.borrow_mut().take();
		})
	}

	pub fn notifications_deferred(&self) -> bool {
		self.container.notifications_deferred()
	}

	pub fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError> {
		self.container.set_notifications_deferred(deferred)
	}
}

impl<T: Registrable, A: 'static> Registrable for Capsule<T, A> {
	fn instrumentation(&self) -> &Instrumentation {
		self.container.instrumentation()
	}

	fn as_element_container(&self) -> Option<&dyn ElementContainer> {
		Some(self)
	}
}

impl<T: Registrable, A: 'static> ElementContainer for Capsule<T, A> {
	fn container_tandem(&self) -> &Tandem {
		self.tandem()
	}

	fn element_ids(&self) -> Vec<String> {
		self.element()
			.map(|e| e.instrumentation().phetio_id().to_string())
			.into_iter()
			.collect()
	}

	fn create_element_from_state(
		&self,
		_slot: ElementSlot,
		state: &StateValue,
	) -> Result<ObjectRef, StateError> {
		let args = self.container.state_to_args(state)?;
		let element = self.create_element(args, true)?;
		Ok(element as ObjectRef)
	}

	fn clear_elements(&self, _reset_index: bool) -> Result<(), TandemError> {
		if self.has_element() {
			self.dispose_element()?;
		}
		Ok(())
	}

	fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError> {
		Capsule::set_notifications_deferred(self, deferred)
	}

	fn notifications_deferred(&self) -> bool {
		Capsule::notifications_deferred(self)
	}
}
