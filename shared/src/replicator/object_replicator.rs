use std::{
    collections::{HashMap, HashSet, VecDeque},
    rc::{Rc, Weak},
};

use log::{trace, warn};

use replicore_serde::{BitReader, BitWriter, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{
    changelist::{merge_changelists, ChangelistManager, RepState},
    delta::DeltaRetirement,
    guid::{GuidCache, PackageMap, Resolution},
    layout::{FieldHandle, FieldStrategy, LayoutError, ObjectValue, RepFlags, RepLayout, RepValue},
    object::{class_kinds::ClassNetId, net_object::NetObject, replicate::RpcKind},
    replicator::{
        bunch_header::{BunchHeader, OpenHeader},
        error::ReplicatorError,
        rpc::{PendingRpc, QueuedRpc, RpcThrottle},
    },
    transport::ChannelHandle,
    FrameId, HostType, NetworkGuid, PacketId, PacketIdRange, ReplicationConfig,
};

type PayloadLength = UnsignedVariableInteger<7>;

/// A bunch ready to be handed to the transport
#[derive(Clone, Debug)]
pub struct OutgoingBunch {
    pub bytes: Vec<u8>,
    pub reliable: bool,
    /// Carries the channel open header
    pub opens_channel: bool,
}

/// What applying a bunch, or re-evaluating unmapped references, did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceivedBunch {
    /// Fields written to the object, plain and custom delta
    pub fields: Vec<usize>,
    /// Functions executed, in execution order
    pub executed_rpcs: Vec<usize>,
    /// Calls held back behind unresolved references
    pub delayed_rpcs: usize,
}

fn write_field_payload(writer: &mut BitWriter, net_index: usize, payload: BitWriter) {
    FieldHandle::from_u64(net_index as u64 + 1).ser(writer);
    PayloadLength::from_u64(payload.bits_written() as u64).ser(writer);
    writer.append_writer(payload);
}

/// Resolved references replace unresolved ones, broken and destroyed ones
/// become null, the rest stay as they are
fn resolve_reference(package_map: &mut PackageMap, reference: &ObjectValue) -> Option<ObjectValue> {
    let guid = reference.guid();
    match package_map.resolve_guid(guid) {
        Resolution::Resolved(object) => Some(ObjectValue::resolved(guid, &object)),
        Resolution::Broken | Resolution::Null => Some(ObjectValue::null()),
        Resolution::Pending | Resolution::Unknown => None,
    }
}

/// Replicates one object over one connection.
///
/// On the authority it turns the shared changelists into bunches and tracks
/// what the connection still has to acknowledge. On the receiving side it
/// applies bunches, keeps fields with unresolved references on an unmapped
/// list and holds back calls whose arguments aren't resolved yet.
pub struct ObjectReplicator {
    object: Weak<NetObject>,
    guid: NetworkGuid,
    class_net_id: ClassNetId,
    layout: Rc<RepLayout>,
    host_type: HostType,
    max_rpcs_per_net_update: u32,
    delay_unmapped_rpcs: bool,
    channel: Option<ChannelHandle>,

    rep_state: RepState,
    delta_retirement: HashMap<usize, DeltaRetirement>,
    open_sent: bool,
    open_packet: Option<PacketIdRange>,
    last_flags: Option<RepFlags>,
    last_replicate_wrote: bool,
    queued_rpcs: Vec<QueuedRpc>,
    rpc_throttle: RpcThrottle,
    net_owner: bool,

    pending_rpcs: VecDeque<PendingRpc>,
    unmapped_fields: HashMap<usize, Vec<NetworkGuid>>,
    referenced_guids: HashSet<NetworkGuid>,
    incompatible: HashSet<usize>,
    warned_incompatible: HashSet<usize>,
}

impl ObjectReplicator {
    pub fn new(
        object: &Rc<NetObject>,
        guid: NetworkGuid,
        class_net_id: ClassNetId,
        layout: Rc<RepLayout>,
        host_type: HostType,
        config: &ReplicationConfig,
    ) -> Self {
        Self {
            object: Rc::downgrade(object),
            guid,
            class_net_id,
            layout,
            host_type,
            max_rpcs_per_net_update: config.max_rpcs_per_net_update,
            delay_unmapped_rpcs: config.delay_unmapped_rpcs,
            channel: None,
            rep_state: RepState::new(config.max_rep_state_history),
            delta_retirement: HashMap::new(),
            open_sent: false,
            open_packet: None,
            last_flags: None,
            last_replicate_wrote: false,
            queued_rpcs: Vec::new(),
            rpc_throttle: RpcThrottle::default(),
            net_owner: false,
            pending_rpcs: VecDeque::new(),
            unmapped_fields: HashMap::new(),
            referenced_guids: HashSet::new(),
            incompatible: HashSet::new(),
            warned_incompatible: HashSet::new(),
        }
    }

    pub fn start_replicating(&mut self, channel: ChannelHandle) {
        self.channel = Some(channel);
        self.delta_retirement = self
            .layout
            .custom_delta_fields()
            .map(|field| (field.index, DeltaRetirement::new()))
            .collect();
    }

    /// Unbinds from the channel and drops everything queued on it
    pub fn stop_replicating(&mut self, cache: &mut GuidCache) {
        self.channel = None;
        self.queued_rpcs.clear();
        self.pending_rpcs.clear();
        self.unmapped_fields.clear();
        self.delta_retirement.clear();
        self.sync_references(cache);
    }

    pub fn guid(&self) -> NetworkGuid {
        self.guid
    }

    pub fn layout(&self) -> &Rc<RepLayout> {
        &self.layout
    }

    pub fn channel(&self) -> Option<ChannelHandle> {
        self.channel
    }

    pub fn object(&self) -> Option<Rc<NetObject>> {
        self.object.upgrade()
    }

    /// The next property bunch opens the channel
    pub fn is_initial(&self) -> bool {
        !self.open_sent
    }

    pub fn net_owner(&self) -> bool {
        self.net_owner
    }

    pub fn rep_state(&self) -> &RepState {
        &self.rep_state
    }

    pub fn has_unmapped(&self) -> bool {
        !self.unmapped_fields.is_empty() || !self.pending_rpcs.is_empty()
    }

    pub fn pending_rpc_count(&self) -> usize {
        self.pending_rpcs.len()
    }

    /// GUIDs this replicator waits on, mirrored into the cache's reference counts
    pub fn referenced_guids(&self) -> &HashSet<NetworkGuid> {
        &self.referenced_guids
    }

    fn is_authority(&self) -> bool {
        self.host_type.is_authority()
    }

    fn live_object(&self) -> Result<Rc<NetObject>, ReplicatorError> {
        self.object
            .upgrade()
            .ok_or(ReplicatorError::ObjectDestroyed { guid: self.guid })
    }

    /// Refreshes the shared changelists and writes everything this connection
    /// is missing. Returns `None` if there was nothing to send.
    pub fn replicate_properties(
        &mut self,
        manager: &mut ChangelistManager,
        frame: FrameId,
        flags: &RepFlags,
        force_compare: bool,
        package_map: &mut PackageMap,
    ) -> Result<Option<OutgoingBunch>, ReplicatorError> {
        let object = self.live_object()?;
        let layout = self.layout.clone();
        if self.channel.is_none() {
            return Err(ReplicatorError::NotReplicating {
                class_name: layout.class_name(),
            });
        }

        let initial = !self.open_sent;
        let flags = RepFlags {
            net_initial: initial,
            ..*flags
        };
        self.net_owner = flags.net_owner;

        {
            let state = object.state();
            manager.update(
                &**state,
                frame,
                self.rep_state.last_compare_index(),
                &flags,
                force_compare,
            );
        }
        let mut changed = self.rep_state.collect_changes(manager, &flags);
        if let Some(last_flags) = self.last_flags.replace(flags) {
            if last_flags.role() != flags.role() {
                let newly_active: Vec<usize> = layout
                    .fields()
                    .iter()
                    .filter(|field| field.strategy == FieldStrategy::Plain)
                    .filter(|field| field.condition.is_active(&flags) && !field.condition.is_active(&last_flags))
                    .map(|field| field.index)
                    .collect();
                changed = merge_changelists(&changed, &newly_active);
            }
        }

        let mut bunch = BitWriter::new();
        let header = BunchHeader {
            guid: self.guid,
            open: initial.then(|| OpenHeader {
                class_net_id: self.class_net_id,
                checksums: layout.checksums(),
            }),
            net_owner: flags.net_owner,
        };
        header.write(&mut bunch, package_map);

        let mut body = BitWriter::new();
        let written = layout.serialize_changed(&changed, manager.shadow(), &flags, &mut body, package_map)?;

        let mut wrote_fields = false;
        {
            let state = object.state();
            for field in layout.custom_delta_fields() {
                if !field.condition.is_active(&flags) {
                    continue;
                }
                let Some(delta) = state.delta_field(field.index) else {
                    return Err(ReplicatorError::MissingDeltaField {
                        class_name: layout.class_name(),
                        field: field.name,
                    });
                };
                let retirement = self.delta_retirement.entry(field.index).or_default();
                let mut payload = BitWriter::new();
                if let Some(new_base) = delta.delta_serialize(retirement.recent(), &mut payload) {
                    write_field_payload(&mut body, field.index, payload);
                    retirement.record_send(new_base, initial);
                    wrote_fields = true;
                }
            }
        }

        for queued in std::mem::take(&mut self.queued_rpcs) {
            let Some(function) = layout.function(queued.function) else {
                continue;
            };
            let mut payload = BitWriter::new();
            layout.write_rpc_args(queued.function, &queued.args, &mut payload, package_map)?;
            write_field_payload(&mut body, function.net_index, payload);
            wrote_fields = true;
        }
        self.rpc_throttle.reset();
        FieldHandle::new(0).ser(&mut body);

        self.last_replicate_wrote = initial || wrote_fields || !written.is_empty();
        if !self.last_replicate_wrote {
            package_map.discard_exports();
            return Ok(None);
        }

        bunch.append_writer(body);
        self.rep_state.record_sent(written, initial);
        self.open_sent = true;

        Ok(Some(OutgoingBunch {
            bytes: bunch.to_bytes(),
            reliable: initial,
            opens_channel: initial,
        }))
    }

    /// Stamps everything written since the last send with the packets it
    /// went out on
    pub fn post_send_bunch(&mut self, packet_range: PacketIdRange) {
        self.rep_state.post_replicate(packet_range);
        for retirement in self.delta_retirement.values_mut() {
            retirement.post_send(packet_range);
        }
        if self.open_sent && self.open_packet.is_none() && self.is_authority() {
            self.open_packet = Some(packet_range);
        }
    }

    /// The transport refused the bunch written last. Its fields and custom
    /// delta state are sent again, and if it was the channel open the next
    /// bunch opens the channel again.
    pub fn send_failed(&mut self) {
        self.rep_state.send_failed();
        for retirement in self.delta_retirement.values_mut() {
            retirement.send_failed();
        }
        if self.is_authority() && self.open_packet.is_none() {
            self.open_sent = false;
        }
    }

    pub fn received_ack(&mut self, packet_id: PacketId) {
        self.rep_state.received_ack(packet_id);
        for retirement in self.delta_retirement.values_mut() {
            retirement.received_ack(packet_id);
        }
        if let Some(open_packet) = self.open_packet {
            if !self.rep_state.open_acked() && open_packet.contains(packet_id) {
                self.rep_state.set_open_acked();
            }
        }
    }

    /// Marks lost plain fields for resending and rewinds custom delta base
    /// states. Returns whether anything has to be sent again.
    pub fn received_nak(&mut self, packet_id: PacketId) -> bool {
        let mut resend = self.rep_state.received_nak(packet_id);
        for retirement in self.delta_retirement.values_mut() {
            resend |= retirement.rollback_to(packet_id);
        }
        if resend {
            trace!("{} {}: resending after loss of packet {}", self.layout.class_name(), self.guid, packet_id);
        }
        resend
    }

    /// The last replication wrote nothing and the peer has acknowledged everything
    pub fn ready_for_dormancy(&self) -> bool {
        self.open_sent
            && !self.last_replicate_wrote
            && self.queued_rpcs.is_empty()
            && self.rep_state.all_acked()
            && self.delta_retirement.values().all(DeltaRetirement::is_retired)
    }

    /// Sends a remote call. Reliable calls and unreliable unicast calls
    /// produce a bunch right away. Unreliable multicast calls wait for the
    /// next property update and are throttled per function.
    pub fn call_remote_function(
        &mut self,
        function: usize,
        args: Vec<RepValue>,
        package_map: &mut PackageMap,
    ) -> Result<Option<OutgoingBunch>, ReplicatorError> {
        let layout = self.layout.clone();
        let rep_function = layout.function(function).ok_or(ReplicatorError::UnknownNetIndex {
            class_name: layout.class_name(),
            index: layout.fields().len() + function,
            count: layout.net_index_count(),
        })?;

        let allowed = match rep_function.kind {
            RpcKind::Server => !self.is_authority(),
            RpcKind::Client | RpcKind::Multicast => self.is_authority(),
        };
        if !allowed {
            return Err(ReplicatorError::WrongRpcDirection {
                function: rep_function.name,
                kind: rep_function.kind,
            });
        }
        if rep_function.kind == RpcKind::Server && !self.net_owner {
            return Err(ReplicatorError::NotOwner {
                function: rep_function.name,
            });
        }
        if self.channel.is_none() || (self.is_authority() && !self.open_sent) {
            return Err(ReplicatorError::NotReplicating {
                class_name: layout.class_name(),
            });
        }
        layout.check_rpc_args(function, &args)?;

        if rep_function.kind == RpcKind::Multicast && !rep_function.reliable {
            if self
                .rpc_throttle
                .admit(function, rep_function.name, self.max_rpcs_per_net_update)
            {
                self.queued_rpcs.push(QueuedRpc { function, args });
            }
            return Ok(None);
        }

        let mut bunch = BitWriter::new();
        BunchHeader {
            guid: self.guid,
            open: None,
            net_owner: self.net_owner,
        }
        .write(&mut bunch, package_map);
        FieldHandle::new(0).ser(&mut bunch);
        let mut payload = BitWriter::new();
        layout.write_rpc_args(function, &args, &mut payload, package_map)?;
        write_field_payload(&mut bunch, rep_function.net_index, payload);
        FieldHandle::new(0).ser(&mut bunch);

        Ok(Some(OutgoingBunch {
            bytes: bunch.to_bytes(),
            reliable: rep_function.reliable,
            opens_channel: false,
        }))
    }

    /// Applies the body of a bunch whose header was already read. Any error
    /// is a protocol error for the channel.
    pub fn received_bunch(
        &mut self,
        header: &BunchHeader,
        reader: &mut BitReader,
        package_map: &mut PackageMap,
    ) -> Result<ReceivedBunch, ReplicatorError> {
        let object = self.live_object()?;
        let layout = self.layout.clone();
        let mut report = ReceivedBunch::default();

        if let Some(open) = &header.open {
            self.check_compatibility(&open.checksums)?;
        }

        if self.is_authority() {
            let handle = FieldHandle::de(reader)?.get_u64() as usize;
            if handle != 0 {
                return Err(ReplicatorError::UnexpectedProperty {
                    class_name: layout.class_name(),
                    field: layout
                        .field(handle - 1)
                        .map(|field| field.name.to_string())
                        .unwrap_or_else(|| format!("#{}", handle - 1)),
                });
            }
        } else {
            self.net_owner = header.net_owner;
            let received = {
                let mut state = object.state_mut();
                layout.deserialize(reader, &mut **state, package_map)?
            };
            for field in received {
                report.fields.push(field.index);
                self.set_unmapped_field(field.index, field.unresolved);
            }
        }

        let field_count = layout.fields().len();
        loop {
            let handle = FieldHandle::de(reader)?.get_u64() as usize;
            if handle == 0 {
                break;
            }
            let net_index = handle - 1;
            let bit_length = u32::try_from(PayloadLength::de(reader)?.get_u64())
                .map_err(|_| SerdeErr::VarIntOverflow)?;
            let payload = reader.read_payload(bit_length)?;

            if self.incompatible.contains(&net_index) {
                self.skip_incompatible(net_index);
                continue;
            }
            if net_index >= layout.net_index_count() {
                return Err(ReplicatorError::UnknownNetIndex {
                    class_name: layout.class_name(),
                    index: net_index,
                    count: layout.net_index_count(),
                });
            }

            if net_index < field_count {
                let field = &layout.fields()[net_index];
                if self.is_authority() {
                    return Err(ReplicatorError::UnexpectedProperty {
                        class_name: layout.class_name(),
                        field: field.name.to_string(),
                    });
                }
                if field.strategy != FieldStrategy::CustomDelta {
                    return Err(LayoutError::StrategyMismatch {
                        class_name: layout.class_name(),
                        field: field.name,
                    }
                    .into());
                }
                let applied = {
                    let mut state = object.state_mut();
                    let Some(delta) = state.delta_field_mut(net_index) else {
                        return Err(ReplicatorError::MissingDeltaField {
                            class_name: layout.class_name(),
                            field: field.name,
                        });
                    };
                    delta.delta_deserialize(&mut payload.borrow())?
                };
                if applied {
                    report.fields.push(net_index);
                }
            } else {
                self.receive_rpc(
                    &object,
                    net_index - field_count,
                    &mut payload.borrow(),
                    package_map,
                    &mut report,
                )?;
            }
        }

        if !report.fields.is_empty() {
            let mut state = object.state_mut();
            layout.notify_fields(&report.fields, &mut **state);
        }
        self.sync_references(package_map.cache());
        Ok(report)
    }

    fn receive_rpc(
        &mut self,
        object: &Rc<NetObject>,
        function: usize,
        reader: &mut BitReader,
        package_map: &mut PackageMap,
        report: &mut ReceivedBunch,
    ) -> Result<(), ReplicatorError> {
        let layout = self.layout.clone();
        let rep_function = layout.function(function).ok_or(ReplicatorError::UnknownNetIndex {
            class_name: layout.class_name(),
            index: layout.fields().len() + function,
            count: layout.net_index_count(),
        })?;
        let allowed = match rep_function.kind {
            RpcKind::Server => self.is_authority(),
            RpcKind::Client | RpcKind::Multicast => !self.is_authority(),
        };
        if !allowed {
            return Err(ReplicatorError::WrongRpcDirection {
                function: rep_function.name,
                kind: rep_function.kind,
            });
        }
        if self.is_authority() && !self.net_owner {
            return Err(ReplicatorError::NotOwner {
                function: rep_function.name,
            });
        }

        let args = layout.read_rpc_args(function, reader, package_map)?;
        let wait_for_references = rep_function.reliable && self.delay_unmapped_rpcs;
        let call = PendingRpc::new(function, args, wait_for_references);

        // calls run in receipt order, so nothing overtakes a waiting call
        if !self.pending_rpcs.is_empty() || (wait_for_references && !call.unresolved.is_empty()) {
            trace!(
                "delaying call to {}.{}, waiting on {:?}",
                layout.class_name(),
                rep_function.name,
                call.unresolved
            );
            self.pending_rpcs.push_back(call);
            report.delayed_rpcs += 1;
            return Ok(());
        }

        Self::execute_rpc(object, call);
        report.executed_rpcs.push(function);
        Ok(())
    }

    fn execute_rpc(object: &Rc<NetObject>, mut call: PendingRpc) {
        // whatever is still unresolved is passed as null
        for arg in call.args.iter_mut() {
            arg.resolve_objects(&mut |_| Some(ObjectValue::null()));
        }
        object.state_mut().receive_rpc(call.function, call.args);
    }

    /// Retries every unresolved reference: patches unmapped fields and runs
    /// held-back calls whose references resolved, in receipt order. Calls
    /// waiting on a GUID that turned out broken are dropped.
    pub fn update_unmapped(&mut self, package_map: &mut PackageMap) -> Result<ReceivedBunch, ReplicatorError> {
        let object = self.live_object()?;
        let layout = self.layout.clone();
        let mut report = ReceivedBunch::default();

        let mut indices: Vec<usize> = self.unmapped_fields.keys().copied().collect();
        indices.sort_unstable();
        for index in indices {
            let mut value = object.state().read_field(index);
            let changed = value.resolve_objects(&mut |reference| resolve_reference(package_map, reference));
            if !changed {
                continue;
            }
            let mut unresolved = Vec::new();
            value.collect_unresolved(&mut unresolved);
            object.state_mut().write_field(index, value)?;
            self.set_unmapped_field(index, unresolved);
            report.fields.push(index);
        }
        if !report.fields.is_empty() {
            let mut state = object.state_mut();
            layout.notify_fields(&report.fields, &mut **state);
        }

        while let Some(call) = self.pending_rpcs.front_mut() {
            let mut broken = false;
            for arg in call.args.iter_mut() {
                arg.resolve_objects(&mut |reference| {
                    let resolved = resolve_reference(package_map, reference);
                    if resolved.as_ref().map(ObjectValue::is_null).unwrap_or(false) {
                        broken = true;
                    }
                    resolved
                });
            }
            call.refresh_unresolved();
            if !broken && call.wait_for_references && !call.unresolved.is_empty() {
                break;
            }

            let Some(call) = self.pending_rpcs.pop_front() else {
                break;
            };
            let function_name = layout
                .function(call.function)
                .map(|function| function.name)
                .unwrap_or("?");
            if broken && call.wait_for_references {
                warn!(
                    "dropping call to {}.{}: a referenced object can never resolve",
                    layout.class_name(),
                    function_name
                );
                continue;
            }
            let function = call.function;
            Self::execute_rpc(&object, call);
            report.executed_rpcs.push(function);
        }

        self.sync_references(package_map.cache());
        Ok(report)
    }

    fn set_unmapped_field(&mut self, index: usize, unresolved: Vec<NetworkGuid>) {
        if unresolved.is_empty() {
            self.unmapped_fields.remove(&index);
        } else {
            self.unmapped_fields.insert(index, unresolved);
        }
    }

    fn sync_references(&mut self, cache: &mut GuidCache) {
        let mut current = HashSet::new();
        for guids in self.unmapped_fields.values() {
            current.extend(guids.iter().copied());
        }
        for call in &self.pending_rpcs {
            current.extend(call.unresolved.iter().copied());
        }
        for guid in current.difference(&self.referenced_guids) {
            cache.add_reference(*guid);
        }
        for guid in self.referenced_guids.difference(&current) {
            cache.release_reference(*guid);
        }
        self.referenced_guids = current;
    }

    fn check_compatibility(&mut self, remote: &[u32]) -> Result<(), ReplicatorError> {
        let local = self.layout.checksums();
        self.incompatible.clear();
        for index in 0..local.len().max(remote.len()) {
            if local.get(index) == remote.get(index) {
                continue;
            }
            if let Some(field) = self.layout.field(index) {
                if field.strategy == FieldStrategy::Plain {
                    return Err(ReplicatorError::IncompatibleField {
                        class_name: self.layout.class_name(),
                        field: field.name,
                    });
                }
            }
            self.incompatible.insert(index);
        }
        Ok(())
    }

    fn skip_incompatible(&mut self, net_index: usize) {
        if self.warned_incompatible.insert(net_index) {
            warn!(
                "{}: skipping net index {}, it doesn't match the remote class",
                self.layout.class_name(),
                net_index
            );
        } else {
            trace!("{}: skipping net index {}", self.layout.class_name(), net_index);
        }
    }
}
