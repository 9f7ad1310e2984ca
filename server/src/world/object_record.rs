use std::rc::{Rc, Weak};

use replicore_shared::{
    ChangelistManager, ClassNetId, NetObject, NetworkGuid, ObjectId, RepLayout, ReplicationConfig,
};

use crate::scheduler::UpdateTiming;

/// Server-side bookkeeping for one replicated object, shared by every
/// connection
pub(crate) struct ObjectRecord {
    object: Weak<NetObject>,
    pub id: ObjectId,
    pub guid: NetworkGuid,
    pub class_name: &'static str,
    pub class_net_id: ClassNetId,
    /// Kept so a destroy record can still be sent once the object is gone
    pub path: Option<String>,
    pub layout: Rc<RepLayout>,
    pub changelists: ChangelistManager,
    pub timing: UpdateTiming,
    /// Treated as relevant to every connection on its next update
    pub force_relevant: bool,
}

impl ObjectRecord {
    pub fn new(
        object: &Rc<NetObject>,
        guid: NetworkGuid,
        class_net_id: ClassNetId,
        layout: Rc<RepLayout>,
        config: &ReplicationConfig,
        now: f64,
    ) -> Self {
        Self {
            object: Rc::downgrade(object),
            id: object.id(),
            guid,
            class_name: object.class_name(),
            class_net_id,
            path: object.path().map(str::to_string),
            changelists: ChangelistManager::new(layout.clone(), config),
            layout,
            timing: UpdateTiming::new(now),
            force_relevant: false,
        }
    }

    pub fn object(&self) -> Option<Rc<NetObject>> {
        self.object.upgrade()
    }
}
