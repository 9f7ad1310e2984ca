use std::{any::TypeId, collections::HashMap, rc::Rc};

use crate::{
    layout::class_checksum,
    object::{
        error::ClassError,
        replicate::{ClassDescription, Replicate},
    },
};

pub type ClassNetId = u16;

/// ClassKind - should be one unique value for each type of replicated class
#[derive(Eq, Hash, Copy, Clone, PartialEq, Debug)]
pub struct ClassKind {
    type_id: TypeId,
}

impl From<TypeId> for ClassKind {
    fn from(type_id: TypeId) -> Self {
        Self { type_id }
    }
}

impl ClassKind {
    pub fn of<R: Replicate>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
        }
    }
}

struct ClassEntry {
    net_id: ClassNetId,
    description: Rc<ClassDescription>,
    checksum: u32,
    builder: fn() -> Box<dyn Replicate>,
}

fn build_default<R: Replicate + Default>() -> Box<dyn Replicate> {
    Box::new(R::default())
}

/// A map to hold all registered replicated classes
#[derive(Clone)]
pub struct ClassKinds {
    current_net_id: ClassNetId,
    kind_map: HashMap<ClassKind, Rc<ClassEntry>>,
    net_id_map: HashMap<ClassNetId, ClassKind>,
}

impl ClassKinds {
    pub fn new() -> Self {
        Self {
            current_net_id: 0,
            kind_map: HashMap::new(),
            net_id_map: HashMap::new(),
        }
    }

    pub fn add_class<R: Replicate + Default>(&mut self) {
        let class_kind = ClassKind::of::<R>();
        if self.kind_map.contains_key(&class_kind) {
            return;
        }

        let net_id = self.current_net_id;
        let description = R::describe();
        let checksum = class_checksum(&description);
        self.kind_map.insert(
            class_kind,
            Rc::new(ClassEntry {
                net_id,
                description: Rc::new(description),
                checksum,
                builder: build_default::<R>,
            }),
        );
        self.net_id_map.insert(net_id, class_kind);
        self.current_net_id += 1;
    }

    pub fn contains(&self, class_kind: &ClassKind) -> bool {
        self.kind_map.contains_key(class_kind)
    }

    pub fn len(&self) -> usize {
        self.kind_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kind_map.is_empty()
    }

    pub fn net_id(&self, class_kind: &ClassKind, class_name: &'static str) -> Result<ClassNetId, ClassError> {
        self.kind_map
            .get(class_kind)
            .map(|entry| entry.net_id)
            .ok_or(ClassError::ClassNotRegistered { class_name })
    }

    pub fn kind_from_net_id(&self, net_id: ClassNetId) -> Result<ClassKind, ClassError> {
        self.net_id_map
            .get(&net_id)
            .copied()
            .ok_or(ClassError::NetIdNotFound { net_id })
    }

    pub fn description(&self, class_kind: &ClassKind) -> Option<Rc<ClassDescription>> {
        self.kind_map
            .get(class_kind)
            .map(|entry| entry.description.clone())
    }

    /// Network compatibility checksum of a class, 0 if it isn't registered
    pub fn checksum(&self, class_kind: &ClassKind) -> u32 {
        self.kind_map
            .get(class_kind)
            .map(|entry| entry.checksum)
            .unwrap_or(0)
    }

    /// Builds a default instance of a registered class, used when the remote
    /// side spawns a dynamic object
    pub fn create(&self, net_id: ClassNetId) -> Result<(ClassKind, Rc<ClassDescription>, Box<dyn Replicate>), ClassError> {
        let class_kind = self.kind_from_net_id(net_id)?;
        let entry = self
            .kind_map
            .get(&class_kind)
            .ok_or(ClassError::NetIdNotFound { net_id })?;
        Ok((class_kind, entry.description.clone(), (entry.builder)()))
    }
}

impl Default for ClassKinds {
    fn default() -> Self {
        Self::new()
    }
}
