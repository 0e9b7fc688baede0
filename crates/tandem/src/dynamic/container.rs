use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::catalog::Catalog;
use crate::emitter::Emitter;
use crate::error::{StateError, TandemError};
use crate::instrument::{self, Instrumentation, ObjectRef, Registrable};
use crate::io_type::{IoType, StateValue};
use crate::tandem::Tandem;

/// Builds an element instrumented with the given tandem.
pub type ElementFactory<T, A> = Rc<dyn Fn(&Tandem, A) -> Result<Rc<T>, TandemError>>;
/// Turns an element's saved state into factory arguments.
pub type StateToArgs<A> = Rc<dyn Fn(&StateValue) -> Result<A, StateError>>;

/// Naming and restoration options shared by every container kind.
pub struct ContainerOptions<A> {
	container_suffix: Option<String>,
	dynamic_element_name: Option<String>,
	state_to_args: Option<StateToArgs<A>>,
}

impl<A> Default for ContainerOptions<A> {
	fn default() -> Self {
		Self {
			container_suffix: None,
			dynamic_element_name: None,
			state_to_args: None,
		}
	}
}

impl<A> fmt::Debug for ContainerOptions<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContainerOptions")
			.field("container_suffix", &self.container_suffix)
			.field("dynamic_element_name", &self.dynamic_element_name)
			.field("state_to_args", &self.state_to_args.is_some())
			.finish()
	}
}

impl<A> ContainerOptions<A> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Suffix the container's own name must end with.
	pub fn container_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.container_suffix = Some(suffix.into());
		self
	}

	/// Prefix for element names. Defaults to the container name minus its suffix.
	pub fn dynamic_element_name(mut self, name: impl Into<String>) -> Self {
		self.dynamic_element_name = Some(name.into());
		self
	}

	/// Enables creating elements from saved state.
	pub fn state_to_args(
		mut self,
		state_to_args: impl Fn(&StateValue) -> Result<A, StateError> + 'static,
	) -> Self {
		self.state_to_args = Some(Rc::new(state_to_args));
		self
	}
}

/// Lifecycle core shared by [`Group`](super::Group) and [`Capsule`](super::Capsule).
pub struct DynamicContainer<T, A> {
	instrumentation: Instrumentation,
	element_type: IoType,
	element_prefix: String,
	factory: ElementFactory<T, A>,
	state_to_args: Option<StateToArgs<A>>,
	archetype: RefCell<Option<Rc<T>>>,
	element_created: Emitter<Rc<T>>,
	element_disposed: Emitter<Rc<T>>,
	deferred_creations: RefCell<VecDeque<Rc<T>>>,
	deferred_disposals: RefCell<VecDeque<Rc<T>>>,
	deferred: Cell<bool>,
	flushing: Cell<bool>,
}

impl<T, A> fmt::Debug for DynamicContainer<T, A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DynamicContainer")
			.field("id", &self.instrumentation.phetio_id())
			.field("element_type", &self.element_type)
			.field("element_prefix", &self.element_prefix)
			.field("deferred", &self.deferred.get())
			.field("queued_creations", &self.deferred_creations.borrow().len())
			.field("queued_disposals", &self.deferred_disposals.borrow().len())
			.finish_non_exhaustive()
	}
}

impl<T: Registrable, A: 'static> DynamicContainer<T, A> {
	/// Checks the container name against its suffix and derives the element
	/// prefix.
	pub fn new(
		tandem: Tandem,
		io_type: IoType,
		element_type: IoType,
		factory: ElementFactory<T, A>,
		options: ContainerOptions<A>,
		default_suffix: &str,
	) -> Result<Self, TandemError> {
		let suffix = options
			.container_suffix
			.unwrap_or_else(|| default_suffix.to_string());
		let stripped = tandem.name().strip_suffix(suffix.as_str());
		if tandem.is_supplied() && stripped.is_none_or(str::is_empty) {
			return Err(TandemError::MissingContainerSuffix {
				name: tandem.name().to_string(),
				suffix,
			});
		}
		let element_prefix = options
			.dynamic_element_name
			.unwrap_or_else(|| stripped.unwrap_or(tandem.name()).to_string());

		Ok(Self {
			instrumentation: Instrumentation::new(tandem, io_type),
			element_type,
			element_prefix,
			factory,
			state_to_args: options.state_to_args,
			archetype: RefCell::new(None),
			element_created: Emitter::new(),
			element_disposed: Emitter::new(),
			deferred_creations: RefCell::new(VecDeque::new()),
			deferred_disposals: RefCell::new(VecDeque::new()),
			deferred: Cell::new(false),
			flushing: Cell::new(false),
		})
	}

	pub fn instrumentation(&self) -> &Instrumentation {
		&self.instrumentation
	}

	pub fn tandem(&self) -> &Tandem {
		self.instrumentation.tandem()
	}

	pub fn element_type(&self) -> &IoType {
		&self.element_type
	}

	/// Name prefix of elements (`particle` for `particleGroup`).
	pub fn element_prefix(&self) -> &str {
		&self.element_prefix
	}

	pub fn element_created(&self) -> &Emitter<Rc<T>> {
		&self.element_created
	}

	pub fn element_disposed(&self) -> &Emitter<Rc<T>> {
		&self.element_disposed
	}

	pub fn archetype(&self) -> Option<Rc<T>> {
		self.archetype.borrow().clone()
	}

	fn catalog(&self) -> Result<Catalog, TandemError> {
		self.tandem().catalog()
	}

	/// Builds the archetype exemplar in API-generation mode; otherwise does
	/// nothing. Fails once the application has fully started.
	pub fn create_archetype(&self, args: A) -> Result<Option<Rc<T>>, TandemError> {
		let catalog = self.catalog()?;
		if catalog.is_fully_started() {
			return Err(TandemError::NestedDynamicContainer {
				id: self.tandem().phetio_id().to_string(),
			});
		}
		if !catalog.config().generate_api || self.archetype.borrow().is_some() {
			return Ok(self.archetype());
		}
		let tandem = self.tandem().create_archetype_child()?;
		let archetype = (self.factory)(&tandem, args)?;
		let object: ObjectRef = archetype.clone();
		instrument::register(&object)?;
		tracing::debug!(id = %tandem.phetio_id(), "created archetype");
		*self.archetype.borrow_mut() = Some(archetype.clone());
		Ok(Some(archetype))
	}

	/// Runs the factory under a freshly minted child tandem named `name` and
	/// registers the result.
	///
	/// With validation on, the element must use that tandem, be flagged as a
	/// dynamic element and be a valid value of the element type. A node minted
	/// here is unlinked again when creation fails.
	pub fn create_dynamic_element(&self, name: &str, args: A) -> Result<Rc<T>, TandemError> {
		let minted = self.tandem().child(name).is_none();
		let tandem = self.tandem().create_dynamic_child(name)?;
		match self.build_element(&tandem, args) {
			Ok(element) => {
				element.instrumentation().mark_container_owned();
				tracing::trace!(id = %tandem.phetio_id(), "created dynamic element");
				Ok(element)
			}
			Err(e) => {
				if minted {
					tandem.dispose();
				}
				Err(e)
			}
		}
	}

	fn build_element(&self, tandem: &Tandem, args: A) -> Result<Rc<T>, TandemError> {
		let element = (self.factory)(tandem, args)?;
		let object: ObjectRef = element.clone();

		if self.catalog()?.validation_enabled() {
			let invalid = |reason: String| TandemError::InvalidDynamicElement {
				id: tandem.phetio_id().to_string(),
				reason,
			};
			if object.tandem() != tandem {
				return Err(invalid(format!(
					"instrumented with {} instead of its minted tandem",
					object.tandem()
				)));
			}
			if !object.instrumentation().is_dynamic_element() {
				return Err(invalid("not flagged as a dynamic element".to_string()));
			}
			if !object.io_type().is_subtype_of(&self.element_type) {
				return Err(invalid(format!(
					"{} does not extend {}",
					object.io_type(),
					self.element_type
				)));
			}
			if !self.element_type.is_valid_value(&*element as &dyn Any) {
				return Err(invalid(format!("rejected by {}", self.element_type)));
			}
		}

		instrument::register(&object)?;
		Ok(element)
	}

	/// Disposes an element's instrumentation, runs `detach` to drop it from
	/// the concrete container, then announces it. Nothing is detached or
	/// announced when disposal fails.
	pub fn dispose_element(
		&self,
		element: &Rc<T>,
		detach: impl FnOnce(),
	) -> Result<(), TandemError> {
		let object: ObjectRef = element.clone();
		instrument::release(&object)?;
		detach();
		tracing::trace!(id = %object.phetio_id(), "disposed dynamic element");
		self.notify_element_disposed(element);
		Ok(())
	}

	/// Announces a creation now, or queues it while deferred. Archetypes are
	/// never announced.
	pub fn notify_element_created(&self, element: &Rc<T>) {
		if element.instrumentation().is_archetype() {
			return;
		}
		if self.deferred.get() {
			self.deferred_creations.borrow_mut().push_back(element.clone());
		} else {
			self.element_created.emit(element);
		}
	}

	pub fn notify_element_disposed(&self, element: &Rc<T>) {
		if element.instrumentation().is_archetype() {
			return;
		}
		if self.deferred.get() {
			self.deferred_disposals.borrow_mut().push_back(element.clone());
		} else {
			self.element_disposed.emit(element);
		}
	}

	pub fn notifications_deferred(&self) -> bool {
		self.deferred.get()
	}

	/// Toggles deferred delivery. Turning it off flushes every queued
	/// creation, then every queued disposal, in arrival order.
	pub fn set_notifications_deferred(&self, deferred: bool) -> Result<(), TandemError> {
		let id = || self.tandem().phetio_id().to_string();
		if self.flushing.get() {
			return Err(TandemError::ReentrantFlush { id: id() });
		}
		if self.deferred.get() == deferred {
			return Err(TandemError::DeferredUnchanged { id: id(), deferred });
		}
		self.deferred.set(deferred);
		if deferred {
			return Ok(());
		}

		self.flushing.set(true);
		let creations = std::mem::take(&mut *self.deferred_creations.borrow_mut());
		let disposals = std::mem::take(&mut *self.deferred_disposals.borrow_mut());
		tracing::debug!(
			id = %self.tandem().phetio_id(),
			creations = creations.len(),
			disposals = disposals.len(),
			"flushing deferred notifications"
		);
		for element in &creations {
			self.element_created.emit(element);
		}
		for element in &disposals {
			self.element_disposed.emit(element);
		}
		self.flushing.set(false);
		Ok(())
	}

	/// Factory arguments for an element restored from `state`.
	pub fn state_to_args(&self, state: &StateValue) -> Result<A, StateError> {
		match &self.state_to_args {
			Some(state_to_args) => state_to_args(state),
			None => Err(StateError::NoStateConstructor {
				container: self.tandem().phetio_id().to_string(),
			}),
		}
	}

	/// Fails unless the catalog is mid-restoration.
	pub(crate) fn check_restore_path(&self, name: &str) -> Result<(), TandemError> {
		if self.catalog()?.is_setting_state() {
			Ok(())
		} else {
			Err(TandemError::OffPathCreation {
				id: format!("{}.{}", self.tandem().phetio_id(), name),
			})
		}
	}
}
