use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::container::{ContainerOptions, DynamicContainer, ElementFactory};
use super::{ElementContainer, ElementSlot};
use crate::emitter::{Emitter, Property};
use crate::error::{StateError, TandemError};
use crate::instrument::{self, Instrumentation, ObjectRef, Registrable};
use crate::io_type::{IoType, StateValue};
use crate::tandem::{GROUP_SEPARATOR, Tandem, group_element_index};

/// Options for [`Group::new`].
pub struct GroupOptions<A> {
	container: ContainerOptions<A>,
	starting_index: usize,
}

impl<A> Default for GroupOptions<A> {
	fn default() -> Self {
		Self {
			container: ContainerOptions::default(),
			starting_index: 1,
		}
	}
}

impl<A> fmt::Debug for GroupOptions<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GroupOptions")
			.field("container", &self.container)
			.field("starting_index", &self.starting_index)
			.finish()
	}
}

impl<A> GroupOptions<A> {
	pub fn new() -> Self {
		Self::default()
	}

	/// First index handed out, and the index a reset returns to.
	pub fn starting_index(mut self, index: usize) -> Self {
		self.starting_index = index;
		self
	}

	pub fn container_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.container = self.container.container_suffix(suffix);
		self
	}

	pub fn dynamic_element_name(mut self, name: impl Into<String>) -> Self {
		self.container = self.container.dynamic_element_name(name);
		self
	}

	pub fn state_to_args(
		mut self,
		state_to_args: impl Fn(&StateValue) -> Result<A, StateError> + 'static,
	) -> Self {
		self.container = self.container.state_to_args(state_to_args);
		self
	}
}

/// An ordered, indexed collection of dynamic elements.
///
/// Elements are named `<prefix>_<index>`. The allocation counter only moves
/// forward (or back to the starting index on a resetting clear), so indices
/// of disposed elements are not reused.
pub struct Group<T, A> {
	container: DynamicContainer<T, A>,
	elements: RefCell<Vec<Rc<T>>>,
	group_element_index: Cell<usize>,
	starting_index: usize,
	count: Property<usize>,
}

impl<T, A> fmt::Debug for Group<T, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Group")
			.field("container", &self.container)
			.field("len", &self.elements.borrow().len())
			.field("group_element_index", &self.group_element_index.get())
			.finish()
	}
}

impl<T: Registrable, A: 'static> Group<T, A> {
	/// Builds and registers a group typed `PhetioGroupIO<element_type>`. When
	/// generating the API, the archetype is built first from `archetype_args`.
	pub fn new(
		tandem: Tandem,
		element_type: &IoType,
		factory: impl Fn(&Tandem, A) -> Result<Rc<T>, TandemError> + 'static,
		archetype_args: A,
		options: GroupOptions<A>,
	) -> Result<Rc<Self>, TandemError> {
		let io_type = tandem.catalog()?.group_io(element_type);
		let factory: ElementFactory<T, A> = Rc::new(factory);
		let container = DynamicContainer::new(
			tandem,
			io_type,
			element_type.clone(),
			factory,
			options.container,
			"Group",
		)?;
		let group = Rc::new(Self {
			container,
			elements: RefCell::new(Vec::new()),
			group_element_index: Cell::new(options.starting_index),
			starting_index: options.starting_index,
			count: Property::new(0),
		});
		group.container.create_archetype(archetype_args)?;
		let object: ObjectRef = group.clone();
		instrument::register(&object)?;
		Ok(group)
	}

	pub fn tandem(&self) -> &Tandem {
		self.container.tandem()
	}

	pub fn element_type(&self) -> &IoType {
		self.container.element_type()
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

	/// Reactive element count.
	pub fn count(&self) -> &Property<usize> {
		&self.count
	}

	/// The index the next [`create_next_element`](Self::create_next_element) uses.
	pub fn group_element_index(&self) -> usize {
		self.group_element_index.get()
	}

	pub fn len(&self) -> usize {
		self.elements.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.elements.borrow().is_empty()
	}

	/// Element at array position `i`, oldest first.
	pub fn get_element(&self, i: usize) -> Option<Rc<T>> {
		self.elements.borrow().get(i).cloned()
	}

	pub fn last_element(&self) -> Option<Rc<T>> {
		self.elements.borrow().last().cloned()
	}

	/// Snapshot of the elements, oldest first.
	pub fn elements(&self) -> Vec<Rc<T>> {
		self.elements.borrow().clone()
	}

	pub fn includes(&self, element: &Rc<T>) -> bool {
		self.index_of(element).is_some()
	}

	pub fn index_of(&self, element: &Rc<T>) -> Option<usize> {
		self.elements
			.borrow()
			.iter()
			.position(|e| Rc::ptr_eq(e, element))
	}

	/// Creates the element at the current allocation index.
	pub fn create_next_element(&self, args: A) -> Result<Rc<T>, TandemError> {
		self.create_indexed_element(self.group_element_index.get(), args, false)
	}

	/// Creates the element whose index matches the peer name's numeric suffix
	/// (`otherParticle_4` yields index 4).
	pub fn create_corresponding_element(
		&self,
		peer_name: &str,
		args: A,
	) -> Result<Rc<T>, TandemError> {
		let index = group_element_index(peer_name).ok_or_else(|| TandemError::MissingGroupIndex {
			name: peer_name.to_string(),
		})?;
		self.create_indexed_element(index, args, false)
	}

	/// Creates, appends, counts and announces the element at `index`.
	///
	/// `during_restore` is only legal while the catalog is setting state. The
	/// allocation counter moves past `index` if it was not already.
	pub fn create_indexed_element(
		&self,
		index: usize,
		args: A,
		during_restore: bool,
	) -> Result<Rc<T>, TandemError> {
		let Some(following) = index.checked_add(1) else {
			return Err(TandemError::GroupIndexOverflow {
				container: self.tandem().phetio_id().to_string(),
				index,
			});
		};
		let name = format!("{}{}{}", self.container.element_prefix(), GROUP_SEPARATOR, index);
		if during_restore {
			self.container.check_restore_path(&name)?;
		}
		let element = self.container.create_dynamic_element(&name, args)?;
		let len = {
			let mut elements = self.elements.borrow_mut();
			elements.push(element.clone());
			elements.len()
		};
		self.count.set(len);
		self.group_element_index
			.set(self.group_element_index.get().max(following));
		self.container.notify_element_created(&element);
		Ok(element)
	}

	/// Removes and disposes one element. Elements not in the group (including
	/// already disposed ones) are rejected.
	pub fn dispose_element(&self, element: &Rc<T>) -> Result<(), TandemError> {
		if !self.includes(element) {
			return Err(TandemError::ElementNotInContainer {
				id: element.instrumentation().phetio_id().to_string(),
				container: self.tandem().phetio_id().to_string(),
			});
		}
		self.container.dispose_element(element, || {
			let len = {
				let mut elements = self.elements.borrow_mut();
				elements.retain(|e| !Rc::ptr_eq(e, element));
				elements.len()
			};
			self.count.set(len);
		})
	}

	/// Disposes every element oldest-first; with `reset_index` the next
	/// element gets the starting index again.
	pub fn clear(&self, reset_index: bool) -> Result<(), TandemError> {
		loop {
			let next = self.elements.borrow().first().cloned();
			let Some(element) = next else { break };
			self.dispose_element(&element)?;
		}
		if reset_index {
			self.group_element_index.set(self.starting_index);
		}
		Ok(())
	}

	pub fn notifications_deferred(&self) -> bool {
		self.container.notifications_deferred()
	}

	pub fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError> {
		self.container.set_notifications_deferred(deferred)
	}
}

impl<T: Registrable, A: 'static> Registrable for Group<T, A> {
	fn instrumentation(&self) -> &Instrumentation {
		self.container.instrumentation()
	}

	fn as_element_container(&self) -> Option<&dyn ElementContainer> {
		Some(self)
	}
}

impl<T: Registrable, A: 'static> ElementContainer for Group<T, A> {
	fn container_tandem(&self) -> &Tandem {
		self.tandem()
	}

	fn element_ids(&self) -> Vec<String> {
		self.elements
			.borrow()
			.iter()
			.map(|e| e.instrumentation().phetio_id().to_string())
			.collect()
	}

	fn create_element_from_state(
		&self,
		slot: ElementSlot,
		state: &StateValue,
	) -> Result<ObjectRef, StateError> {
		let ElementSlot::Indexed(index) = slot else {
			return Err(TandemError::MissingGroupIndex {
				name: self.tandem().phetio_id().to_string(),
			}
			.into());
		};
		let args = self.container.state_to_args(state)?;
		let element = self.create_indexed_element(index, args, true)?;
		Ok(element as ObjectRef)
	}

	fn clear_elements(&self, reset_index: bool) -> Result<(), TandemError> {
		self.clear(reset_index)
	}

	fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError> {
		Group::set_notifications_deferred(self, deferred)
	}

	fn notifications_deferred(&self) -> bool {
		Group::notifications_deferred(self)
	}
}
