//! Hierarchical identity tree.
//!
//! Every instrumented object owns a [`Tandem`]: a node whose id is the path of
//! names from the root joined with [`SEPARATOR`]. Nodes are created through
//! their parent, so asking for the same child name twice yields the same node.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::catalog::{Catalog, CatalogState};
use crate::error::TandemError;
use crate::instrument::ObjectRef;


/// Joins ancestor names into an id.
pub const SEPARATOR: char = '.';
/// Separates a dynamic element's prefix from its index (`particle_3`).
pub const GROUP_SEPARATOR: char = '_';
/// Separates terms inside a single component name.
pub const INTER_TERM_SEPARATOR: char = '-';

/// Name of the sentinel whose descendants must be supplied before registration.
pub const REQUIRED_NAME: &str = "required";
/// Name of the sentinel whose descendants are silently skipped when unsupplied.
pub const OPTIONAL_NAME: &str = "optional";
/// Name of the sentinel for objects that opt out of instrumentation.
pub const OPT_OUT_NAME: &str = "opt_out";
/// Child name used for a dynamic container's archetype.
pub const ARCHETYPE_NAME: &str = "archetype";

const RESERVED_NAMES: &[&str] = &[REQUIRED_NAME, OPTIONAL_NAME, OPT_OUT_NAME, ARCHETYPE_NAME];

/// Predicate deciding whether a component name is acceptable.
pub type NamePredicate = fn(&str) -> bool;

/// Default character class: ASCII alphanumerics plus `_ - , [ ]`.
pub fn is_valid_tandem_name(name: &str) -> bool {
	!name.is_empty()
		&& name
			.chars()
			.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ',' | '[' | ']'))
}

/// Returns the last segment of an id.
pub fn component_name(id: &str) -> &str {
	id.rsplit(SEPARATOR).next().unwrap_or(id)
}

/// Returns the id with its last segment removed, or `None` for a root id.
pub fn parent_id(id: &str) -> Option<&str> {
	id.rfind(SEPARATOR).map(|i| &id[..i])
}

/// Parses the index suffix of a group element name (`particle_3` → 3).
pub fn group_element_index(name: &str) -> Option<usize> {
	let (prefix, index) = component_name(name).rsplit_once(GROUP_SEPARATOR)?;
	if prefix.is_empty() {
		return None;
	}
	index.parse().ok()
}

/// Options for [`Tandem::create_child_with`].
///
/// Unset flags are inherited from the parent node.
#[derive(Clone, Copy, Default)]
pub struct TandemOptions {
	required: Option<bool>,
	supplied: Option<bool>,
	is_valid_tandem_name: Option<NamePredicate>,
}

impl fmt::Debug for TandemOptions {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TandemOptions")
			.field("required", &self.required)
			.field("supplied", &self.supplied)
			.field("custom_name_predicate", &self.is_valid_tandem_name.is_some())
			.finish()
	}
}

impl TandemOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether registration under this node is mandatory.
	pub fn required(mut self, required: bool) -> Self {
		self.required = Some(required);
		self
	}

	/// Whether the caller actually provided this node.
	pub fn supplied(mut self, supplied: bool) -> Self {
		self.supplied = Some(supplied);
		self
	}

	/// Replaces the default name character class.
	pub fn name_predicate(mut self, predicate: NamePredicate) -> Self {
		self.is_valid_tandem_name = Some(predicate);
		self
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum NodeKind {
	#[default]
	Static,
	Dynamic,
	Archetype,
}

pub(crate) struct TandemNode {
	catalog: Weak<CatalogState>,
	parent: Option<Weak<TandemNode>>,
	name: String,
	id: String,
	required: bool,
	supplied: bool,
	kind: NodeKind,
	children: RefCell<IndexMap<String, Tandem>>,
	disposed: Cell<bool>,
}

/// Shared handle to a node in the identity tree.
///
/// Equality is node identity.
#[derive(Clone)]
pub struct Tandem(Rc<TandemNode>);

impl PartialEq for Tandem {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}

impl Eq for Tandem {}

impl fmt::Debug for Tandem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Tandem")
			.field("id", &self.0.id)
			.field("required", &self.0.required)
			.field("supplied", &self.0.supplied)
			.field("disposed", &self.0.disposed.get())
			.finish()
	}
}

impl fmt::Display for Tandem {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0.id)
	}
}

impl Tandem {
	pub(crate) fn new_root(catalog: Weak<CatalogState>, name: &str) -> Self {
		Tandem(Rc::new(TandemNode {
			catalog,
			parent: None,
			name: name.to_string(),
			id: name.to_string(),
			required: true,
			supplied: true,
			kind: NodeKind::Static,
			children: RefCell::new(IndexMap::new()),
			disposed: Cell::new(false),
		}))
	}

	/// Rebuilds the node for a fully qualified id, creating missing segments.
	///
	/// The first segment must be the catalog's root name.
	pub fn from_phetio_id(catalog: &Catalog, id: &str) -> Result<Tandem, TandemError> {
		let mut segments = id.split(SEPARATOR);
		let root = catalog.root();
		if segments.next() != Some(root.name()) {
			return Err(TandemError::InvalidName {
				name: id.to_string(),
			});
		}
		segments.try_fold(root, |tandem, name| match tandem.child(name) {
			Some(existing) => Ok(existing),
			None => tandem.create_child(name),
		})
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// The fully qualified id of this node.
	pub fn phetio_id(&self) -> &str {
		&self.0.id
	}

	pub fn is_required(&self) -> bool {
		self.0.required
	}

	pub fn is_supplied(&self) -> bool {
		self.0.supplied
	}

	pub fn is_disposed(&self) -> bool {
		self.0.disposed.get()
	}

	/// True for nodes minted by a dynamic container (including archetypes).
	pub fn is_dynamic(&self) -> bool {
		self.0.kind != NodeKind::Static
			|| self.parent().is_some_and(|parent| parent.is_dynamic())
	}

	/// True for an archetype node or any of its descendants.
	pub fn is_archetype(&self) -> bool {
		self.0.kind == NodeKind::Archetype
			|| self.parent().is_some_and(|parent| parent.is_archetype())
	}

	pub fn parent(&self) -> Option<Tandem> {
		self.0.parent.as_ref().and_then(Weak::upgrade).map(Tandem)
	}

	/// Returns the live child with this name, if any.
	pub fn child(&self, name: &str) -> Option<Tandem> {
		self.0.children.borrow().get(name).cloned()
	}

	/// Child names in creation order.
	pub fn child_names(&self) -> Vec<String> {
		self.0.children.borrow().keys().cloned().collect()
	}

	/// The catalog this tree belongs to.
	pub fn catalog(&self) -> Result<Catalog, TandemError> {
		self.0
			.catalog
			.upgrade()
			.map(Catalog::from_state)
			.ok_or(TandemError::CatalogDropped)
	}

	/// Creates or returns the child `name`, inheriting this node's flags.
	pub fn create_child(&self, name: &str) -> Result<Tandem, TandemError> {
		self.create_child_with(name, TandemOptions::default())
	}

	/// Creates or returns the child `name`.
	///
	/// Re-requesting an existing name yields the same node; the requested
	/// `required`/`supplied` flags must match the existing ones.
	pub fn create_child_with(
		&self,
		name: &str,
		options: TandemOptions,
	) -> Result<Tandem, TandemError> {
		let predicate = options.is_valid_tandem_name.unwrap_or(is_valid_tandem_name);
		if !predicate(name) || name.contains(SEPARATOR) {
			return Err(TandemError::InvalidName {
				name: name.to_string(),
			});
		}
		if RESERVED_NAMES.contains(&name) {
			return Err(TandemError::ReservedName {
				name: name.to_string(),
			});
		}
		self.insert_child(
			name,
			options.required.unwrap_or(self.0.required),
			options.supplied.unwrap_or(self.0.supplied),
			NodeKind::Static,
		)
	}

	/// Mints the node for a dynamic element named `name`.
	pub(crate) fn create_dynamic_child(&self, name: &str) -> Result<Tandem, TandemError> {
		if !is_valid_tandem_name(name) {
			return Err(TandemError::InvalidName {
				name: name.to_string(),
			});
		}
		self.insert_child(name, self.0.required, self.0.supplied, NodeKind::Dynamic)
	}

	pub(crate) fn create_archetype_child(&self) -> Result<Tandem, TandemError> {
		self.insert_child(
			ARCHETYPE_NAME,
			self.0.required,
			self.0.supplied,
			NodeKind::Archetype,
		)
	}

	/// Inserts a child without name validation. Used for sentinels.
	pub(crate) fn insert_child(
		&self,
		name: &str,
		required: bool,
		supplied: bool,
		kind: NodeKind,
	) -> Result<Tandem, TandemError> {
		if self.is_disposed() {
			return Err(TandemError::Disposed {
				id: self.0.id.clone(),
			});
		}

		if let Some(existing) = self.child(name) {
			if existing.0.required != required || existing.0.supplied != supplied {
				return Err(TandemError::OptionsMismatch {
					id: existing.0.id.clone(),
					existing_required: existing.0.required,
					existing_supplied: existing.0.supplied,
					required,
					supplied,
				});
			}
			return Ok(existing);
		}

		let child = Tandem(Rc::new(TandemNode {
			catalog: self.0.catalog.clone(),
			parent: Some(Rc::downgrade(&self.0)),
			name: name.to_string(),
			id: format!("{}{}{}", self.0.id, SEPARATOR, name),
			required,
			supplied,
			kind,
			children: RefCell::new(IndexMap::new()),
			disposed: Cell::new(false),
		}));
		self.0
			.children
			.borrow_mut()
			.insert(name.to_string(), child.clone());
		Ok(child)
	}

	/// True if `candidate` is a strict ancestor of this node.
	pub fn has_ancestor(&self, candidate: &Tandem) -> bool {
		let mut current = self.parent();
		while let Some(node) = current {
			if node == *candidate {
				return true;
			}
			current = node.parent();
		}
		false
	}

	/// Registers `object`, which must be instrumented with this node.
	///
	/// Unsupplied optional nodes are skipped; unsupplied required nodes are a
	/// configuration error. Before launch the object is buffered, afterwards
	/// it is delivered to every listener.
	pub fn add_registration(&self, object: &ObjectRef) -> Result<(), TandemError> {
		if !self.0.supplied {
			if self.0.required {
				return Err(TandemError::RequiredNotSupplied {
					id: self.0.id.clone(),
				});
			}
			tracing::trace!(id = %self.0.id, "skipping unsupplied optional tandem");
			return Ok(());
		}
		if self.is_disposed() {
			return Err(TandemError::Disposed {
				id: self.0.id.clone(),
			});
		}
		self.catalog()?.add_registration(object)
	}

	/// Mirror of [`add_registration`](Self::add_registration); disposes this
	/// node afterwards.
	pub fn remove_registration(&self, object: &ObjectRef) -> Result<(), TandemError> {
		if !self.0.supplied {
			if self.0.required {
				return Err(TandemError::RequiredNotSupplied {
					id: self.0.id.clone(),
				});
			}
			return Ok(());
		}
		self.catalog()?.remove_registration(object)?;
		self.dispose();
		Ok(())
	}

	/// Unlinks this node from its parent. Idempotent.
	pub fn dispose(&self) {
		if self.0.disposed.replace(true) {
			return;
		}
		if let Some(parent) = self.parent() {
			let mut children = parent.0.children.borrow_mut();
			if children.get(&self.0.name).is_some_and(|c| c == self) {
				children.shift_remove(&self.0.name);
			}
		}
	}
}
