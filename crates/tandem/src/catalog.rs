//! The explicitly constructed registry that owns all shared state.
//!
//! A [`Catalog`] holds the identity tree root, the pre-launch registration
//! buffer, the one-shot launch flag, registration listeners, the live object
//! index and every defined [`IoType`], including the parametric caches.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::config::CatalogConfig;
use crate::emitter::ListenerId;
use crate::error::TandemError;
use crate::instrument::{ObjectRef, same_object};
use crate::io_type::builtins::Builtins;
use crate::io_type::{IoType, IoTypeBuilder, StateValue, TypeKey, TypeSignature};
use crate::tandem::{NodeKind, OPT_OUT_NAME, OPTIONAL_NAME, REQUIRED_NAME, Tandem};

/// Receives objects as they enter and leave the catalog.
pub trait TandemListener {
	fn object_added(&self, object: &ObjectRef);
	fn object_removed(&self, object: &ObjectRef);
}

pub(crate) struct TypeTable {
	by_name: FxHashMap<String, IoType>,
	order: Vec<IoType>,
	parametric: FxHashMap<TypeSignature, IoType>,
	next_key: u32,
	root: Option<IoType>,
}

impl TypeTable {
	fn new() -> Self {
		Self {
			by_name: FxHashMap::default(),
			order: Vec::new(),
			parametric: FxHashMap::default(),
			next_key: 0,
			root: None,
		}
	}

	pub(crate) fn define(&mut self, mut builder: IoTypeBuilder) -> Result<IoType, TandemError> {
		if self.by_name.contains_key(builder.name()) {
			return Err(TandemError::DuplicateTypeName {
				name: builder.name().to_string(),
			});
		}
		if let Some(root) = &self.root {
			builder.default_supertype(root);
		}
		let io_type = builder.build(TypeKey(self.next_key));
		self.next_key += 1;
		if self.root.is_none() {
			self.root = Some(io_type.clone());
		}
		self.by_name
			.insert(io_type.type_name().to_string(), io_type.clone());
		self.order.push(io_type.clone());
		Ok(io_type)
	}
}

pub(crate) struct CatalogState {
	config: CatalogConfig,
	root: Tandem,
	required: Tandem,
	optional: Tandem,
	opt_out: Tandem,
	launched: Cell<bool>,
	fully_started: Cell<bool>,
	restore_depth: Cell<u32>,
	buffered: RefCell<VecDeque<ObjectRef>>,
	live: RefCell<FxHashMap<String, ObjectRef>>,
	listeners: RefCell<Vec<(ListenerId, Rc<dyn TandemListener>)>>,
	next_listener: Cell<u64>,
	types: RefCell<TypeTable>,
	builtins: Builtins,
}

/// Shared handle to the registry. Cloning is cheap.
#[derive(Clone)]
pub struct Catalog(Rc<CatalogState>);

impl fmt::Debug for Catalog {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Catalog")
			.field("root", &self.0.root.phetio_id())
			.field("launched", &self.0.launched.get())
			.field("buffered", &self.0.buffered.borrow().len())
			.field("live", &self.0.live.borrow().len())
			.finish()
	}
}

impl Default for Catalog {
	fn default() -> Self {
		Self::new(CatalogConfig::default())
	}
}

impl Catalog {
	/// Builds a catalog with its root tandem, sentinel tandems and builtin types.
	pub fn new(config: CatalogConfig) -> Self {
		let mut types = TypeTable::new();
		let builtins = Builtins::install(&mut types);
		let state = Rc::new_cyclic(|weak| {
			let root = Tandem::new_root(weak.clone(), &config.root_name);
			let sentinel = |name, required| {
				root.insert_child(name, required, false, NodeKind::Static)
					.unwrap_or_else(|e| unreachable!("fresh root rejected sentinel: {e}"))
			};
			let required = sentinel(REQUIRED_NAME, true);
			let optional = sentinel(OPTIONAL_NAME, false);
			let opt_out = sentinel(OPT_OUT_NAME, false);
			CatalogState {
				root,
				required,
				optional,
				opt_out,
				launched: Cell::new(false),
				fully_started: Cell::new(false),
				restore_depth: Cell::new(0),
				buffered: RefCell::new(VecDeque::new()),
				live: RefCell::new(FxHashMap::default()),
				listeners: RefCell::new(Vec::new()),
				next_listener: Cell::new(0),
				types: RefCell::new(types),
				builtins,
				config,
			}
		});
		Catalog(state)
	}

	pub(crate) fn from_state(state: Rc<CatalogState>) -> Self {
		Catalog(state)
	}

	pub(crate) fn downgrade(&self) -> std::rc::Weak<CatalogState> {
		Rc::downgrade(&self.0)
	}

	pub fn config(&self) -> &CatalogConfig {
		&self.0.config
	}

	/// Whether assertion-only checks run.
	pub fn validation_enabled(&self) -> bool {
		self.0.config.validation
	}

	pub fn root(&self) -> Tandem {
		self.0.root.clone()
	}

	/// Sentinel for objects that must be given a real tandem.
	pub fn required_tandem(&self) -> Tandem {
		self.0.required.clone()
	}

	/// Sentinel for objects that may go uninstrumented.
	pub fn optional_tandem(&self) -> Tandem {
		self.0.optional.clone()
	}

	/// Sentinel for objects that explicitly opt out.
	pub fn opt_out_tandem(&self) -> Tandem {
		self.0.opt_out.clone()
	}

	pub fn is_launched(&self) -> bool {
		self.0.launched.get()
	}

	/// Switches from buffering registrations to delivering them directly.
	///
	/// Drains the buffer in registration order. Only callable once.
	pub fn launch(&self) -> Result<(), TandemError> {
		if self.0.launched.replace(true) {
			return Err(TandemError::DoubleLaunch);
		}
		tracing::debug!(
			buffered = self.0.buffered.borrow().len(),
			"launching catalog"
		);
		loop {
			let next = self.0.buffered.borrow_mut().pop_front();
			let Some(object) = next else { break };
			self.notify_added(&object);
		}
		Ok(())
	}

	/// Marks application construction complete. Dynamic containers may not be
	/// created afterwards.
	pub fn mark_fully_started(&self) {
		self.0.fully_started.set(true);
	}

	pub fn is_fully_started(&self) -> bool {
		self.0.fully_started.get()
	}

	/// True while a state restoration is in progress.
	pub fn is_setting_state(&self) -> bool {
		self.0.restore_depth.get() > 0
	}

	pub(crate) fn enter_restore(&self) {
		self.0.restore_depth.set(self.0.restore_depth.get() + 1);
	}

	pub(crate) fn exit_restore(&self) {
		self.0
			.restore_depth
			.set(self.0.restore_depth.get().saturating_sub(1));
	}

	/// Attaches a registration listener.
	pub fn add_listener(&self, listener: Rc<dyn TandemListener>) -> ListenerId {
		let id = ListenerId(self.0.next_listener.get());
		self.0.next_listener.set(id.0 + 1);
		self.0.listeners.borrow_mut().push((id, listener));
		id
	}

	pub fn remove_listener(&self, id: ListenerId) -> bool {
		let mut listeners = self.0.listeners.borrow_mut();
		let before = listeners.len();
		listeners.retain(|(lid, _)| *lid != id);
		listeners.len() != before
	}

	fn listener_snapshot(&self) -> Vec<Rc<dyn TandemListener>> {
		self.0
			.listeners
			.borrow()
			.iter()
			.map(|(_, l)| Rc::clone(l))
			.collect()
	}

	fn notify_added(&self, object: &ObjectRef) {
		tracing::trace!(id = %object.phetio_id(), "delivering registration");
		for listener in self.listener_snapshot() {
			listener.object_added(object);
		}
	}

	pub(crate) fn add_registration(&self, object: &ObjectRef) -> Result<(), TandemError> {
		let id = object.phetio_id().to_string();
		{
			let mut live = self.0.live.borrow_mut();
			if live.contains_key(&id) {
				return Err(TandemError::DuplicateRegistration { id });
			}
			live.insert(id.clone(), Rc::clone(object));
		}
		if self.is_launched() {
			self.notify_added(object);
		} else {
			tracing::trace!(id = %id, "buffering registration");
			self.0.buffered.borrow_mut().push_back(Rc::clone(object));
		}
		Ok(())
	}

	pub(crate) fn remove_registration(&self, object: &ObjectRef) -> Result<(), TandemError> {
		let id = object.phetio_id();
		{
			let mut live = self.0.live.borrow_mut();
			match live.get(id) {
				Some(existing) if same_object(existing, object) => {
					live.remove(id);
				}
				_ => {
					return Err(TandemError::NeverAdded { id: id.to_string() });
				}
			}
		}
		if self.is_launched() {
			for listener in self.listener_snapshot() {
				listener.object_removed(object);
			}
		} else {
			let mut buffered = self.0.buffered.borrow_mut();
			if let Some(pos) = buffered.iter().position(|o| same_object(o, object)) {
				buffered.remove(pos);
			}
		}
		Ok(())
	}

	/// Looks up a registered object by id.
	pub fn get_object(&self, id: &str) -> Option<ObjectRef> {
		self.0.live.borrow().get(id).cloned()
	}

	pub fn has_object(&self, id: &str) -> bool {
		self.0.live.borrow().contains_key(id)
	}

	/// Registered ids, sorted.
	pub fn object_ids(&self) -> Vec<String> {
		let mut ids: Vec<_> = self.0.live.borrow().keys().cloned().collect();
		ids.sort();
		ids
	}

	/// Number of registrations waiting for launch.
	pub fn buffered_count(&self) -> usize {
		self.0.buffered.borrow().len()
	}

	/// Resets registration state: buffer, live index, listeners, launch and
	/// startup flags, and every non-sentinel child of the root. Types survive.
	pub fn teardown(&self) {
		self.0.buffered.borrow_mut().clear();
		self.0.live.borrow_mut().clear();
		self.0.listeners.borrow_mut().clear();
		self.0.launched.set(false);
		self.0.fully_started.set(false);
		self.0.restore_depth.set(0);
		for name in self.0.root.child_names() {
			if matches!(name.as_str(), REQUIRED_NAME | OPTIONAL_NAME | OPT_OUT_NAME) {
				continue;
			}
			if let Some(child) = self.0.root.child(&name) {
				child.dispose();
			}
		}
		tracing::debug!("catalog torn down");
	}

	/// Defines a named type. Types without an explicit supertype extend `ObjectIO`.
	pub fn define_type(&self, builder: IoTypeBuilder) -> Result<IoType, TandemError> {
		self.0.types.borrow_mut().define(builder)
	}

	/// Checks `state` against `io_type`, asserting on failure when validation
	/// is enabled.
	pub fn is_state_valid(&self, io_type: &IoType, state: &StateValue) -> bool {
		io_type.is_state_valid(state, self.validation_enabled())
	}

	pub fn get_type(&self, name: &str) -> Option<IoType> {
		self.0.types.borrow().by_name.get(name).cloned()
	}

	/// Every defined type in definition order.
	pub fn types(&self) -> Vec<IoType> {
		self.0.types.borrow().order.clone()
	}

	/// Returns the cached type for `signature`, defining it on first use.
	///
	/// # Panics
	///
	/// Panics if the generated name collides with a type defined outside the
	/// cache.
	pub fn parametric_type(
		&self,
		signature: TypeSignature,
		build: impl FnOnce() -> IoTypeBuilder,
	) -> IoType {
		if let Some(cached) = self.0.types.borrow().parametric.get(&signature) {
			return cached.clone();
		}
		let builder = build();
		let mut types = self.0.types.borrow_mut();
		if let Some(cached) = types.parametric.get(&signature) {
			return cached.clone();
		}
		let io_type = match types.define(builder) {
			Ok(io_type) => io_type,
			Err(e) => panic!("parametric type {signature:?}: {e}"),
		};
		tracing::trace!(type_name = io_type.type_name(), "cached parametric type");
		types.parametric.insert(signature, io_type.clone());
		io_type
	}

	/// Root of the type hierarchy.
	pub fn object_io(&self) -> IoType {
		self.0.builtins.object.clone()
	}

	pub fn number_io(&self) -> IoType {
		self.0.builtins.number.clone()
	}

	pub fn string_io(&self) -> IoType {
		self.0.builtins.string.clone()
	}

	pub fn boolean_io(&self) -> IoType {
		self.0.builtins.boolean.clone()
	}
}
