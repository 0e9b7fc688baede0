use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use pretty_assertions::assert_eq;
use serde_json::json;

use super::*;
use crate::catalog::Catalog;
use crate::config::CatalogConfig;
use crate::instrument::{Instrumentation, Registrable};
use crate::io_type::IoType;
use crate::restore::RestoreGuard;

struct Particle {
	instrumentation: Instrumentation,
	x: Cell<f64>,
}

impl Registrable for Particle {
	fn instrumentation(&self) -> &Instrumentation {
		&self.instrumentation
	}
}

struct Fixture {
	catalog: Catalog,
	particle_io: IoType,
}

fn fixture(config: CatalogConfig) -> Fixture {
	let catalog = Catalog::new(config.with_validation(true));
	let particle_io = catalog
		.define_type(IoType::builder("ParticleIO").value_type::<Particle>())
		.unwrap();
	Fixture {
		catalog,
		particle_io,
	}
}

fn factory(
	io_type: &IoType,
) -> impl Fn(&Tandem, f64) -> Result<Rc<Particle>, TandemError> + 'static {
	let io_type = io_type.clone();
	move |tandem, x| {
		Ok(Rc::new(Particle {
			instrumentation: Instrumentation::new(tandem.clone(), io_type.clone()).dynamic_element(true),
			x: Cell::new(x),
		}))
	}
}

fn x_from_state(state: &StateValue) -> Result<f64, StateError> {
	state["x"].as_f64().ok_or_else(|| StateError::InvalidState {
		type_name: "ParticleIO".to_string(),
		reason: "missing x".to_string(),
	})
}

fn particle_group(f: &Fixture, options: GroupOptions<f64>) -> Rc<Group<Particle, f64>> {
	let tandem = f.catalog.root().create_child("particleGroup").unwrap();
	Group::new(tandem, &f.particle_io, factory(&f.particle_io), 0.0, options).unwrap()
}

fn id(p: &Rc<Particle>) -> String {
	p.instrumentation().phetio_id().to_string()
}

/// Records `+id` / `-id` for each created / disposed notification.
fn record<A: 'static>(group: &Group<Particle, A>) -> Rc<RefCell<Vec<String>>> {
	let log = Rc::new(RefCell::new(Vec::new()));
	let created = Rc::clone(&log);
	group
		.element_created()
		.add_listener(move |p| created.borrow_mut().push(format!("+{}", id(p))));
	let disposed = Rc::clone(&log);
	group
		.element_disposed()
		.add_listener(move |p| disposed.borrow_mut().push(format!("-{}", id(p))));
	log
}

#[test]
fn test_group_names_and_counts_elements() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let counts = Rc::new(RefCell::new(Vec::new()));
	let c = Rc::clone(&counts);
	group.count().link(move |new, _| c.borrow_mut().push(*new));

	let a = group.create_next_element(1.0).unwrap();
	let b = group.create_next_element(2.0).unwrap();
	let c = group.create_next_element(3.0).unwrap();

	assert_eq!(
		vec![id(&a), id(&b), id(&c)],
		vec![
			"sim.particleGroup.particle_1",
			"sim.particleGroup.particle_2",
			"sim.particleGroup.particle_3"
		]
	);
	assert_eq!(*counts.borrow(), vec![1, 2, 3]);
	assert_eq!(group.len(), 3);
	assert_eq!(group.group_element_index(), 4);
	assert_eq!(group.index_of(&b), Some(1));
	assert!(Rc::ptr_eq(&group.last_element().unwrap(), &c));
	assert_eq!(group.get_element(0).unwrap().x.get(), 1.0);
	assert!(f.catalog.has_object("sim.particleGroup.particle_2"));
	assert!(b.instrumentation().tandem().is_dynamic());
	assert_eq!(group.element_ids(), f.catalog.object_ids()[1..].to_vec());
}

#[test]
fn test_group_registers_with_container_type() {
	let f = fixture(CatalogConfig::default());
	particle_group(&f, GroupOptions::new());
	let object = f.catalog.get_object("sim.particleGroup").unwrap();
	assert_eq!(object.io_type().type_name(), "PhetioGroupIO<ParticleIO>");
	assert!(object.as_element_container().is_some());
}

#[test]
fn test_clear_oldest_first_and_reset() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let log = record(&group);
	for x in [1.0, 2.0, 3.0] {
		group.create_next_element(x).unwrap();
	}
	log.borrow_mut().clear();

	group.clear(true).unwrap();
	assert_eq!(
		*log.borrow(),
		vec![
			"-sim.particleGroup.particle_1",
			"-sim.particleGroup.particle_2",
			"-sim.particleGroup.particle_3"
		]
	);
	assert!(group.is_empty());
	assert_eq!(group.count().get(), 0);
	assert_eq!(group.group_element_index(), 1);
	assert!(!f.catalog.has_object("sim.particleGroup.particle_1"));

	let next = group.create_next_element(4.0).unwrap();
	assert_eq!(id(&next), "sim.particleGroup.particle_1");
}

#[test]
fn test_clear_without_reset_keeps_counter() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new().starting_index(0));
	group.create_next_element(1.0).unwrap();
	group.create_next_element(2.0).unwrap();
	group.clear(false).unwrap();
	assert_eq!(id(&group.create_next_element(3.0).unwrap()), "sim.particleGroup.particle_2");
}

#[test]
fn test_double_dispose_rejected() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let element = group.create_next_element(1.0).unwrap();
	group.dispose_element(&element).unwrap();
	assert!(element.instrumentation().is_disposed());
	assert_eq!(
		group.dispose_element(&element),
		Err(TandemError::ElementNotInContainer {
			id: "sim.particleGroup.particle_1".to_string(),
			container: "sim.particleGroup".to_string(),
		})
	);
}

#[test]
fn test_deferred_flush_order() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let log = record(&group);

	group.set_notifications_deferred(true).unwrap();
	let a = group.create_next_element(1.0).unwrap();
	group.create_next_element(2.0).unwrap();
	group.dispose_element(&a).unwrap();
	let c = group.create_next_element(3.0).unwrap();
	group.dispose_element(&c).unwrap();
	assert!(log.borrow().is_empty());

	group.set_notifications_deferred(false).unwrap();
	assert_eq!(
		*log.borrow(),
		vec![
			"+sim.particleGroup.particle_1",
			"+sim.particleGroup.particle_2",
			"+sim.particleGroup.particle_3",
			"-sim.particleGroup.particle_1",
			"-sim.particleGroup.particle_3",
		]
	);

	// Queues are empty: another round trip delivers nothing new.
	group.set_notifications_deferred(true).unwrap();
	group.set_notifications_deferred(false).unwrap();
	assert_eq!(log.borrow().len(), 5);
}

#[test]
fn test_deferred_flag_must_change() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	assert_eq!(
		group.set_notifications_deferred(false),
		Err(TandemError::DeferredUnchanged {
			id: "sim.particleGroup".to_string(),
			deferred: false,
		})
	);
	group.set_notifications_deferred(true).unwrap();
	assert!(group.notifications_deferred());
	assert!(matches!(
		group.set_notifications_deferred(true),
		Err(TandemError::DeferredUnchanged { deferred: true, .. })
	));
}

#[test]
fn test_flush_is_not_reentrant() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let weak: Weak<Group<Particle, f64>> = Rc::downgrade(&group);
	let seen = Rc::new(RefCell::new(None));
	let s = Rc::clone(&seen);
	group.element_created().add_listener(move |_| {
		if let Some(group) = weak.upgrade() {
			*s.borrow_mut() = Some(group.set_notifications_deferred(true));
		}
	});

	group.set_notifications_deferred(true).unwrap();
	group.create_next_element(1.0).unwrap();
	group.set_notifications_deferred(false).unwrap();
	assert_eq!(
		*seen.borrow(),
		Some(Err(TandemError::ReentrantFlush {
			id: "sim.particleGroup".to_string()
		}))
	);
	assert!(!group.notifications_deferred());
}

#[test]
fn test_corresponding_element_bumps_counter() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let early = group.create_corresponding_element("otherParticle_1", 0.0).unwrap();
	assert_eq!(id(&early), "sim.particleGroup.particle_1");
	assert_eq!(group.group_element_index(), 2);

	let peer = group
		.create_corresponding_element("sim.screen.otherParticle_5", 0.0)
		.unwrap();
	assert_eq!(id(&peer), "sim.particleGroup.particle_5");
	assert_eq!(id(&group.create_next_element(0.0).unwrap()), "sim.particleGroup.particle_6");

	assert_eq!(
		group.create_corresponding_element("otherParticle", 0.0).map(|_| ()),
		Err(TandemError::MissingGroupIndex {
			name: "otherParticle".to_string()
		})
	);
}

#[test]
fn test_archetype_only_when_generating_api() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	assert!(group.archetype().is_none());

	let f = fixture(CatalogConfig::default().with_generate_api(true));
	let group = particle_group(&f, GroupOptions::new());
	let log = record(&group);
	let archetype = group.archetype().unwrap();
	assert_eq!(id(&archetype), "sim.particleGroup.archetype");
	assert!(archetype.instrumentation().is_archetype());
	assert!(f.catalog.has_object("sim.particleGroup.archetype"));

	group.create_next_element(1.0).unwrap();
	group.clear(true).unwrap();
	assert_eq!(log.borrow().len(), 2);
	assert!(f.catalog.has_object("sim.particleGroup.archetype"));
	assert!(group.is_empty());
}

#[test]
fn test_no_containers_after_startup() {
	let f = fixture(CatalogConfig::default());
	f.catalog.mark_fully_started();
	let tandem = f.catalog.root().create_child("lateGroup").unwrap();
	let result = Group::new(tandem, &f.particle_io, factory(&f.particle_io), 0.0, GroupOptions::new());
	assert_eq!(
		result.map(|_| ()),
		Err(TandemError::NestedDynamicContainer {
			id: "sim.lateGroup".to_string()
		})
	);
	assert!(!f.catalog.has_object("sim.lateGroup"));
}

#[test]
fn test_container_suffix() {
	let f = fixture(CatalogConfig::default());
	let tandem = f.catalog.root().create_child("particles").unwrap();
	let result = Group::new(tandem.clone(), &f.particle_io, factory(&f.particle_io), 0.0, GroupOptions::new());
	assert_eq!(
		result.map(|_| ()),
		Err(TandemError::MissingContainerSuffix {
			name: "particles".to_string(),
			suffix: "Group".to_string(),
		})
	);

	let group = Group::new(
		tandem,
		&f.particle_io,
		factory(&f.particle_io),
		0.0,
		GroupOptions::new()
			.container_suffix("s")
			.dynamic_element_name("dot"),
	)
	.unwrap();
	assert_eq!(id(&group.create_next_element(0.0).unwrap()), "sim.particles.dot_1");
}

#[test]
fn test_elements_must_be_dynamic() {
	let f = fixture(CatalogConfig::default());
	let io_type = f.particle_io.clone();
	let group = Group::new(
		f.catalog.root().create_child("staticGroup").unwrap(),
		&f.particle_io,
		move |tandem: &Tandem, x: f64| {
			Ok(Rc::new(Particle {
				instrumentation: Instrumentation::new(tandem.clone(), io_type.clone()),
				x: Cell::new(x),
			}))
		},
		0.0,
		GroupOptions::new(),
	)
	.unwrap();
	assert!(matches!(
		group.create_next_element(1.0),
		Err(TandemError::InvalidDynamicElement { .. })
	));
	assert!(group.is_empty());
	assert_eq!(group.tandem().child("static_1"), None);
}

#[test]
fn test_failed_factory_unlinks_minted_tandem() {
	let f = fixture(CatalogConfig::default());
	let group = Group::new(
		f.catalog.root().create_child("brokenGroup").unwrap(),
		&f.particle_io,
		|tandem: &Tandem, _: f64| -> Result<Rc<Particle>, TandemError> {
			Err(TandemError::InvalidName {
				name: tandem.name().to_string(),
			})
		},
		0.0,
		GroupOptions::new(),
	)
	.unwrap();
	assert_eq!(
		group.create_next_element(1.0).map(|_| ()),
		Err(TandemError::InvalidName {
			name: "broken_1".to_string()
		})
	);
	assert_eq!(group.tandem().child_names(), Vec::<String>::new());
	assert_eq!(group.group_element_index(), 1);
}

#[test]
fn test_duplicate_element_keeps_live_tandem() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let first = group.create_indexed_element(1, 1.0, false).unwrap();
	assert_eq!(
		group.create_indexed_element(1, 2.0, false).map(|_| ()),
		Err(TandemError::DuplicateRegistration {
			id: "sim.particleGroup.particle_1".to_string()
		})
	);
	assert_eq!(group.tandem().child("particle_1").as_ref(), Some(first.instrumentation().tandem()));
	assert!(!first.instrumentation().tandem().is_disposed());
	assert_eq!(group.len(), 1);
}

#[test]
fn test_group_index_overflow_rejected() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new().state_to_args(x_from_state));
	let overflow = TandemError::GroupIndexOverflow {
		container: "sim.particleGroup".to_string(),
		index: usize::MAX,
	};

	let peer = format!("peer_{}", usize::MAX);
	assert_eq!(
		group.create_corresponding_element(&peer, 1.0).map(|_| ()),
		Err(overflow.clone())
	);

	let group_io = group.instrumentation().io_type().clone();
	let _guard = RestoreGuard::begin(&f.catalog);
	let saved = format!("particle_{}", usize::MAX);
	assert_eq!(
		group_io
			.add_child_element(&*group, &saved, &json!({ "x": 1.0 }))
			.map(|_| ()),
		Err(StateError::Tandem(overflow))
	);

	assert!(group.is_empty());
	assert_eq!(group.count().get(), 0);
	assert_eq!(group.group_element_index(), 1);
	assert_eq!(group.tandem().child_names(), Vec::<String>::new());
	assert_eq!(f.catalog.object_ids(), vec!["sim.particleGroup"]);
}

#[test]
fn test_elements_disposed_only_through_group() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let log = record(&group);
	let element = group.create_next_element(1.0).unwrap();
	let object: ObjectRef = element.clone();

	assert_eq!(
		crate::instrument::dispose(&object),
		Err(TandemError::ContainerOwned {
			id: "sim.particleGroup.particle_1".to_string()
		})
	);
	assert!(!element.instrumentation().is_disposed());
	assert!(group.includes(&element));
	assert_eq!(group.count().get(), 1);

	group.dispose_element(&element).unwrap();
	assert_eq!(
		*log.borrow(),
		vec!["+sim.particleGroup.particle_1", "-sim.particleGroup.particle_1"]
	);
}

#[test]
fn test_failed_disposal_keeps_element() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let log = record(&group);
	let element = group.create_next_element(1.0).unwrap();

	// Teardown empties the live index, so the element can no longer be removed.
	f.catalog.teardown();
	assert_eq!(
		group.dispose_element(&element),
		Err(TandemError::NeverAdded {
			id: "sim.particleGroup.particle_1".to_string()
		})
	);
	assert_eq!(group.len(), 1);
	assert_eq!(group.count().get(), 1);
	assert!(!element.instrumentation().is_disposed());
	assert_eq!(*log.borrow(), vec!["+sim.particleGroup.particle_1"]);
}

#[test]
fn test_restore_path_requires_setting_state() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	assert_eq!(
		group.create_indexed_element(2, 0.0, true).map(|_| ()),
		Err(TandemError::OffPathCreation {
			id: "sim.particleGroup.particle_2".to_string()
		})
	);

	let _guard = RestoreGuard::begin(&f.catalog);
	assert_eq!(id(&group.create_indexed_element(2, 0.0, true).unwrap()), "sim.particleGroup.particle_2");
	assert_eq!(group.group_element_index(), 3);
}

#[test]
fn test_group_type_restores_elements_from_state() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new().state_to_args(x_from_state));
	let log = record(&group);
	let object = f.catalog.get_object("sim.particleGroup").unwrap();
	let container = object.as_element_container().unwrap();

	let _guard = RestoreGuard::begin(&f.catalog);
	container.set_notifications_deferred(true).unwrap();
	let restored = object
		.io_type()
		.add_child_element(container, "particle_7", &json!({ "x": 4.5 }))
		.unwrap();
	assert_eq!(restored.phetio_id(), "sim.particleGroup.particle_7");
	assert_eq!(group.get_element(0).unwrap().x.get(), 4.5);
	assert_eq!(group.group_element_index(), 8);
	assert!(log.borrow().is_empty());

	container.set_notifications_deferred(false).unwrap();
	assert_eq!(*log.borrow(), vec!["+sim.particleGroup.particle_7"]);
	assert_eq!(container.element_ids(), vec!["sim.particleGroup.particle_7"]);

	assert!(matches!(
		object.io_type().add_child_element(container, "particle", &json!({ "x": 1.0 })),
		Err(StateError::Tandem(TandemError::MissingGroupIndex { .. }))
	));

	container.clear_elements(true).unwrap();
	assert!(group.is_empty());
}

#[test]
fn test_restore_waits_for_dependencies() {
	let f = fixture(CatalogConfig::default());
	let reference = f.catalog.reference_io(&f.particle_io);
	let group = particle_group(
		&f,
		GroupOptions::new().state_to_args(move |state| {
			reference.from_state(&state["partner"])?;
			x_from_state(state)
		}),
	);
	let _guard = RestoreGuard::begin(&f.catalog);
	let state = json!({ "x": 1.0, "partner": { "id": "sim.particleGroup.particle_1" } });

	let err = group
		.create_element_from_state(ElementSlot::Indexed(2), &state)
		.map(|_| ())
		.unwrap_err();
	assert!(err.is_retryable());
	assert!(group.is_empty());

	group.create_indexed_element(1, 0.0, true).unwrap();
	let second = group.create_element_from_state(ElementSlot::Indexed(2), &state).unwrap();
	assert_eq!(second.phetio_id(), "sim.particleGroup.particle_2");
}

#[test]
fn test_restore_without_state_constructor() {
	let f = fixture(CatalogConfig::default());
	let group = particle_group(&f, GroupOptions::new());
	let _guard = RestoreGuard::begin(&f.catalog);
	assert_eq!(
		group
			.create_element_from_state(ElementSlot::Indexed(1), &json!({}))
			.map(|_| ()),
		Err(StateError::NoStateConstructor {
			container: "sim.particleGroup".to_string()
		})
	);
	assert!(matches!(
		f.catalog.number_io().add_child_element(&*group, "particle_1", &json!({})),
		Err(StateError::NoStateConstructor { .. })
	));
}

#[test]
fn test_capsule_lifecycle() {
	let f = fixture(CatalogConfig::default().with_generate_api(true));
	let capsule = Capsule::new(
		f.catalog.root().create_child("heldItemCapsule").unwrap(),
		&f.particle_io,
		factory(&f.particle_io),
		0.0,
		ContainerOptions::new().state_to_args(x_from_state),
	)
	.unwrap();
	assert_eq!(id(&capsule.archetype().unwrap()), "sim.heldItemCapsule.archetype");
	assert!(!capsule.has_element());

	let log = Rc::new(RefCell::new(Vec::new()));
	let l = Rc::clone(&log);
	capsule
		.element_created()
		.add_listener(move |p| l.borrow_mut().push(id(p)));

	let first = capsule.get_element(1.0).unwrap();
	let again = capsule.get_element(2.0).unwrap();
	assert!(Rc::ptr_eq(&first, &again));
	assert_eq!(again.x.get(), 1.0);
	assert_eq!(id(&first), "sim.heldItemCapsule.heldItem");
	assert_eq!(*log.borrow(), vec!["sim.heldItemCapsule.heldItem"]);

	capsule.dispose_element().unwrap();
	assert!(!capsule.has_element());
	assert!(matches!(
		capsule.dispose_element(),
		Err(TandemError::ElementNotInContainer { .. })
	));

	let _guard = RestoreGuard::begin(&f.catalog);
	let restored = f
		.catalog
		.capsule_io(&f.particle_io)
		.add_child_element(&*capsule, "heldItem", &json!({ "x": 9.0 }))
		.unwrap();
	assert_eq!(restored.phetio_id(), "sim.heldItemCapsule.heldItem");
	assert_eq!(capsule.element().unwrap().x.get(), 9.0);
	capsule.clear_elements(false).unwrap();
	assert!(capsule.element_ids().is_empty());
}
