use std::{
    cell::{Cell, Ref, RefCell, RefMut},
    rc::{Rc, Weak},
};

use crate::{
    object::{class_kinds::ClassKind, object_id::ObjectId, replicate::Replicate},
    ConnectionId,
};

/// How an object takes part in dormancy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetDormancy {
    /// Never goes dormant
    Never,
    /// May go dormant but currently wants updates
    Awake,
    /// Goes dormant on every connection which is fully caught up
    DormantAll,
}

/// Per-object knobs read by the scheduler
#[derive(Clone, Debug)]
pub struct ReplicationSettings {
    /// How often per second the object is considered for replication
    pub net_update_frequency: f32,
    /// Lowest rate adaptive frequency may throttle an idle object down to
    pub min_net_update_frequency: f32,
    pub net_priority: f32,
    pub always_relevant: bool,
    pub only_relevant_to_owner: bool,
    pub net_cull_distance_squared: f32,
    pub dormancy: NetDormancy,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            net_update_frequency: 100.0,
            min_net_update_frequency: 2.0,
            net_priority: 1.0,
            always_relevant: false,
            only_relevant_to_owner: false,
            net_cull_distance_squared: 15000.0 * 15000.0,
            dormancy: NetDormancy::Awake,
        }
    }
}

/// A replicated object instance.
///
/// Objects with a path are "static": both sides can find them by name, so
/// they are identified with static GUIDs. Objects without a path are spawned
/// at runtime and identified with dynamic GUIDs.
pub struct NetObject {
    id: ObjectId,
    class: ClassKind,
    class_name: &'static str,
    path: Option<String>,
    outer: Option<Weak<NetObject>>,
    owner: Cell<Option<ConnectionId>>,
    settings: RefCell<ReplicationSettings>,
    state: RefCell<Box<dyn Replicate>>,
}

impl NetObject {
    pub fn new<R: Replicate>(state: R) -> Rc<Self> {
        let class_name = R::describe().name;
        Self::from_boxed(ClassKind::of::<R>(), class_name, None, None, Box::new(state))
    }

    pub fn new_static<R: Replicate>(
        path: impl Into<String>,
        outer: Option<&Rc<NetObject>>,
        state: R,
    ) -> Rc<Self> {
        let class_name = R::describe().name;
        Self::from_boxed(
            ClassKind::of::<R>(),
            class_name,
            Some(path.into()),
            outer,
            Box::new(state),
        )
    }

    pub fn from_boxed(
        class: ClassKind,
        class_name: &'static str,
        path: Option<String>,
        outer: Option<&Rc<NetObject>>,
        state: Box<dyn Replicate>,
    ) -> Rc<Self> {
        Rc::new(Self {
            id: ObjectId::generate(),
            class,
            class_name,
            path,
            outer: outer.map(Rc::downgrade),
            owner: Cell::new(None),
            settings: RefCell::new(ReplicationSettings::default()),
            state: RefCell::new(state),
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn class(&self) -> ClassKind {
        self.class
    }

    pub fn class_name(&self) -> &'static str {
        self.class_name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_static(&self) -> bool {
        self.path.is_some()
    }

    pub fn outer(&self) -> Option<Rc<NetObject>> {
        self.outer.as_ref().and_then(Weak::upgrade)
    }

    pub fn owner(&self) -> Option<ConnectionId> {
        self.owner.get()
    }

    pub fn set_owner(&self, owner: Option<ConnectionId>) {
        self.owner.set(owner);
    }

    pub fn settings(&self) -> Ref<'_, ReplicationSettings> {
        self.settings.borrow()
    }

    pub fn settings_mut(&self) -> RefMut<'_, ReplicationSettings> {
        self.settings.borrow_mut()
    }

    pub fn state(&self) -> Ref<'_, Box<dyn Replicate>> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, Box<dyn Replicate>> {
        self.state.borrow_mut()
    }

    /// Borrows the state as its concrete class
    pub fn with<R: Replicate, O>(&self, func: impl FnOnce(&R) -> O) -> Option<O> {
        let state = self.state.borrow();
        state.as_any().downcast_ref::<R>().map(func)
    }

    /// Mutably borrows the state as its concrete class
    pub fn with_mut<R: Replicate, O>(&self, func: impl FnOnce(&mut R) -> O) -> Option<O> {
        let mut state = self.state.borrow_mut();
        state.as_any_mut().downcast_mut::<R>().map(func)
    }
}

impl std::fmt::Debug for NetObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetObject")
            .field("id", &self.id)
            .field("class", &self.class_name)
            .field("path", &self.path)
            .finish()
    }
}
