use std::rc::Rc;

use replicore_shared::{NetObject, ObjectReplicator};

/// A replicated object as received from the server, with the replicator
/// feeding it
pub(crate) struct RemoteObject {
    pub object: Rc<NetObject>,
    pub replicator: ObjectReplicator,
}
