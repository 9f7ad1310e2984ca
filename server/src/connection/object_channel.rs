use replicore_shared::{ChannelHandle, ObjectReplicator};

/// An open channel for one object on one connection
pub(crate) struct ObjectChannel {
    pub handle: ChannelHandle,
    pub replicator: ObjectReplicator,
    /// Last time the object was found relevant, jittered forward
    pub relevant_time: f64,
    pub last_update_time: f64,
    pub dormant: bool,
}

impl ObjectChannel {
    pub fn new(handle: ChannelHandle, replicator: ObjectReplicator, now: f64) -> Self {
        Self {
            handle,
            replicator,
            relevant_time: now,
            last_update_time: now,
            dormant: false,
        }
    }
}
