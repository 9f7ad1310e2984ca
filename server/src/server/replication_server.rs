use std::{
    collections::{HashMap, HashSet},
    rc::Rc,
};

use log::{debug, info, trace, warn};

use replicore_shared::{
    BitReader, BunchHeader, ChangelistManager, ChannelHandle, ClassKinds, CloseReason,
    ConnectionId, DestroyRecord, FrameId, GuidCache, HostType, LayoutCache, LayoutError,
    NetDormancy, NetObject, NetworkGuid, ObjectId, ObjectReplicator, PackageMap, PacketId,
    Protocol, RepFlags, RepValue, ReplicationTransport, ReplicatorError, RpcKind, Viewer,
};

use crate::{
    connection::{connection::Connection, object_channel::ObjectChannel},
    events::ServerEvents,
    scheduler::{is_relevant, priority, sort_by_priority, PrioritizedObject},
    world::object_record::ObjectRecord,
    ServerConfig, ServerError, ServerTickStats,
};

/// The authority side of replication. Owns the object identity cache, the
/// shared changelists of every replicated object and one channel per
/// (connection, relevant object) pair.
pub struct ReplicationServer {
    config: ServerConfig,
    class_kinds: ClassKinds,
    layout_cache: LayoutCache,
    guid_cache: GuidCache,
    objects: HashMap<ObjectId, ObjectRecord>,
    // insertion order, so equal priorities replicate in a stable order
    object_order: Vec<ObjectId>,
    connections: HashMap<ConnectionId, Connection>,
    frame: FrameId,
    time: f64,
    events: ServerEvents,
}

impl ReplicationServer {
    pub fn new<P: Into<Protocol>>(config: ServerConfig, protocol: P) -> Self {
        let protocol: Protocol = protocol.into();
        let Protocol { class_kinds, .. } = protocol;

        Self {
            config,
            guid_cache: GuidCache::new(HostType::Server, class_kinds.clone()),
            class_kinds,
            layout_cache: LayoutCache::new(),
            objects: HashMap::new(),
            object_order: Vec::new(),
            connections: HashMap::new(),
            frame: 0,
            time: 0.0,
            events: ServerEvents::new(),
        }
    }

    // Connections

    pub fn add_connection(&mut self, connection: ConnectionId) {
        if self.connections.contains_key(&connection) {
            warn!("connection {:?} was already added", connection);
            return;
        }
        info!("connection {:?} added", connection);
        self.connections.insert(connection, Connection::new(connection));
    }

    /// Points of view used for relevancy and priority. A connection with no
    /// viewers sees the world from the origin.
    pub fn set_viewers(
        &mut self,
        connection: ConnectionId,
        viewers: Vec<Viewer>,
    ) -> Result<(), ServerError> {
        self.connections
            .get_mut(&connection)
            .ok_or(ServerError::UnknownConnection { connection })?
            .set_viewers(viewers);
        Ok(())
    }

    pub fn remove_connection(
        &mut self,
        connection: ConnectionId,
        transport: &mut dyn ReplicationTransport,
    ) -> Result<(), ServerError> {
        let mut removed = self
            .connections
            .remove(&connection)
            .ok_or(ServerError::UnknownConnection { connection })?;
        removed.close_all(Some(transport), &mut self.guid_cache, CloseReason::Disconnected);
        info!("connection {:?} removed", connection);
        Ok(())
    }

    pub fn has_connection(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // Objects

    /// Starts replicating an object. Its GUID is assigned here and stays the
    /// same for the object's lifetime.
    pub fn add_object(&mut self, object: &Rc<NetObject>) -> Result<NetworkGuid, ServerError> {
        if let Some(record) = self.objects.get(&object.id()) {
            return Ok(record.guid);
        }

        let class_kind = object.class();
        let class_net_id = self.class_kinds.net_id(&class_kind, object.class_name())?;
        let Some(layout) = self.layout_cache.layout_for(&class_kind, &self.class_kinds) else {
            return Err(ServerError::UnknownObject {
                class_name: object.class_name(),
            });
        };
        let guid = self.guid_cache.get_or_assign(object)?;

        let record = ObjectRecord::new(
            object,
            guid,
            class_net_id,
            layout,
            &self.config.replication,
            self.time,
        );
        debug!("replicating {} as {}", record.class_name, guid);
        self.object_order.push(record.id);
        self.objects.insert(record.id, record);
        Ok(guid)
    }

    /// Stops replicating an object and tells every connection it is gone
    pub fn remove_object(
        &mut self,
        object: &NetObject,
        transport: &mut dyn ReplicationTransport,
    ) -> Result<NetworkGuid, ServerError> {
        if !self.objects.contains_key(&object.id()) {
            return Err(ServerError::UnknownObject {
                class_name: object.class_name(),
            });
        }
        Ok(self.destroy_object(object.id(), transport))
    }

    pub fn guid_for(&self, object: &NetObject) -> Option<NetworkGuid> {
        self.objects.get(&object.id()).map(|record| record.guid)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn guid_cache(&self) -> &GuidCache {
        &self.guid_cache
    }

    /// Shared changelist history of an object
    pub fn changelists(&self, object: &NetObject) -> Option<&ChangelistManager> {
        self.objects.get(&object.id()).map(|record| &record.changelists)
    }

    pub fn has_channel(&self, object: &NetObject, connection: ConnectionId) -> bool {
        self.channel(object, connection).is_some()
    }

    pub fn channel(&self, object: &NetObject, connection: ConnectionId) -> Option<ChannelHandle> {
        self.connections
            .get(&connection)?
            .channels
            .get(&object.id())
            .map(|channel| channel.handle)
    }

    pub fn is_dormant(&self, object: &NetObject, connection: ConnectionId) -> bool {
        self.connections
            .get(&connection)
            .and_then(|connection| connection.channels.get(&object.id()))
            .map(|channel| channel.dormant)
            .unwrap_or(false)
    }

    /// Replicates the object on the next tick and treats it as relevant to
    /// every connection for that update
    pub fn force_relevant_next_update(&mut self, object: &NetObject) -> Result<(), ServerError> {
        let record = self.record_mut(object)?;
        record.timing.force_update();
        record.force_relevant = true;
        Ok(())
    }

    /// Wakes every dormant channel of the object so pending changes go out
    pub fn flush_dormancy(&mut self, object: &NetObject) -> Result<(), ServerError> {
        let object_id = object.id();
        self.record_mut(object)?.timing.force_update();
        for connection in self.connections.values_mut() {
            if let Some(channel) = connection.channels.get_mut(&object_id) {
                if channel.dormant {
                    debug!("{} woken on connection {:?}", channel.replicator.guid(), connection.id);
                    channel.dormant = false;
                }
            }
        }
        Ok(())
    }

    /// Calls a client or multicast function. Client functions go to the
    /// owning connection. Multicast functions go to every connection with the
    /// object's channel open.
    pub fn call_remote_function(
        &mut self,
        object: &NetObject,
        function: &str,
        args: Vec<RepValue>,
        transport: &mut dyn ReplicationTransport,
    ) -> Result<(), ServerError> {
        let object_id = object.id();
        let record = self.objects.get(&object_id).ok_or(ServerError::UnknownObject {
            class_name: object.class_name(),
        })?;
        let layout = record.layout.clone();
        let function_index = layout.function_index(function)?;
        let rep_function = layout
            .function(function_index)
            .ok_or_else(|| LayoutError::UnknownFunction {
                class_name: layout.class_name(),
                name: function.to_string(),
            })?;

        let targets: Vec<ConnectionId> = match rep_function.kind {
            RpcKind::Client => vec![object.owner().ok_or_else(|| ServerError::NoOwner {
                class_name: layout.class_name(),
                function: function.to_string(),
            })?],
            RpcKind::Multicast => self.connections.keys().copied().collect(),
            RpcKind::Server => {
                return Err(ReplicatorError::WrongRpcDirection {
                    function: rep_function.name,
                    kind: rep_function.kind,
                }
                .into())
            }
        };

        let mut fatal = Vec::new();
        for target in targets {
            let Some(connection) = self.connections.get_mut(&target) else {
                continue;
            };
            let Some(channel) = connection.channels.get_mut(&object_id) else {
                trace!("{} has no channel on {:?}, {} not sent", layout.class_name(), target, function);
                continue;
            };
            if channel.replicator.is_initial() || (channel.dormant && !rep_function.reliable) {
                continue;
            }

            let result = {
                let mut package_map = PackageMap::exporting(&mut self.guid_cache, &mut connection.exports);
                channel
                    .replicator
                    .call_remote_function(function_index, args.clone(), &mut package_map)
            };
            if let Some(bunch) = result? {
                let limit = self.config.max_reliable_bytes_in_flight;
                if let Err(error) = connection.send_bunch(&object_id, bunch, transport, limit) {
                    if error.is_fatal() {
                        fatal.push((target, error));
                    } else {
                        warn!("{} on {:?} not sent: {}", function, target, error);
                    }
                }
            }
        }

        for (connection, error) in fatal {
            self.close_connection(connection, error, transport);
        }
        Ok(())
    }

    // Ticking

    /// Runs one replication pass. Returns the number of bunches sent.
    pub fn server_tick(&mut self, delta_time: f32, transport: &mut dyn ReplicationTransport) -> usize {
        self.server_tick_with_stats(delta_time, transport).replicated
    }

    pub fn server_tick_with_stats(
        &mut self,
        delta_time: f32,
        transport: &mut dyn ReplicationTransport,
    ) -> ServerTickStats {
        let mut stats = ServerTickStats::default();
        self.frame = self.frame.wrapping_add(1);
        let tick_delta = f64::from(delta_time.max(0.0));
        self.time += tick_delta;
        let now = self.time;

        self.remove_dead_objects(transport);

        let mut considered = Vec::new();
        for object_id in &self.object_order {
            let Some(record) = self.objects.get_mut(object_id) else {
                continue;
            };
            if !record.timing.is_due(now) {
                continue;
            }
            let Some(object) = record.object() else {
                continue;
            };
            record.timing.schedule_next(
                now,
                tick_delta,
                &object.settings(),
                self.config.adaptive_net_update_frequency,
            );
            considered.push((*object_id, record.force_relevant));
            record.force_relevant = false;
        }
        stats.considered = considered.len();

        let mut connection_ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        connection_ids.sort();
        fastrand::shuffle(&mut connection_ids);

        let mut replicated_objects = HashSet::new();
        let mut fatal = Vec::new();
        for connection_id in connection_ids {
            if let Err(error) = self.replicate_connection(
                connection_id,
                &considered,
                now,
                transport,
                &mut stats,
                &mut replicated_objects,
            ) {
                fatal.push((connection_id, error));
            }
        }
        for (connection_id, error) in fatal {
            self.close_connection(connection_id, error, transport);
        }

        for object_id in replicated_objects {
            if let Some(record) = self.objects.get_mut(&object_id) {
                if let Some(object) = record.object() {
                    record.timing.replicated(now, &object.settings());
                }
            }
        }
        self.trim_changelists();

        trace!(
            "frame {}: {} considered, {} replicated, {} bytes",
            self.frame,
            stats.considered,
            stats.replicated,
            stats.bytes_sent
        );
        stats
    }

    fn replicate_connection(
        &mut self,
        connection_id: ConnectionId,
        considered: &[(ObjectId, bool)],
        now: f64,
        transport: &mut dyn ReplicationTransport,
        stats: &mut ServerTickStats,
        replicated_objects: &mut HashSet<ObjectId>,
    ) -> Result<(), ServerError> {
        let Self {
            config,
            guid_cache,
            objects,
            connections,
            frame,
            events,
            ..
        } = self;
        let Some(connection) = connections.get_mut(&connection_id) else {
            return Ok(());
        };

        if !transport.is_connection_ready(connection_id) {
            debug!("connection {:?} saturated, nothing replicated", connection_id);
            stats.saturated_connections += 1;
            for (object_id, _) in considered {
                if let Some(record) = objects.get_mut(object_id) {
                    record.timing.set_pending();
                }
            }
            return Ok(());
        }

        let viewers = connection.viewers();
        let mut prioritized = Vec::with_capacity(considered.len());
        for (object_id, force_relevant) in considered {
            let Some(object) = objects.get(object_id).and_then(ObjectRecord::object) else {
                continue;
            };
            let relevant = match connection.channels.get(object_id) {
                Some(channel) => {
                    if channel.dormant {
                        stats.dormant += 1;
                        continue;
                    }
                    // recently confirmed channels skip the check, the
                    // timeout below keeps them open meanwhile
                    *force_relevant
                        || (now - channel.relevant_time > f64::from(config.relevancy_recheck_interval)
                            && is_relevant(&object, connection_id, &viewers))
                }
                None => *force_relevant || is_relevant(&object, connection_id, &viewers),
            };
            let Some(channel) = connection.channels.get(object_id) else {
                if !relevant {
                    continue;
                }
                prioritized.push(PrioritizedObject {
                    object_id: *object_id,
                    priority: priority(&object, connection_id, &viewers, config.spawn_priority_seconds),
                    relevant,
                });
                stats.relevant += 1;
                continue;
            };
            let waiting_time = (now - channel.last_update_time) as f32;
            prioritized.push(PrioritizedObject {
                object_id: *object_id,
                priority: priority(&object, connection_id, &viewers, waiting_time),
                relevant,
            });
            if relevant {
                stats.relevant += 1;
            }
        }
        sort_by_priority(&mut prioritized);

        let mut bytes_sent = 0;
        for (position, entry) in prioritized.iter().enumerate() {
            if bytes_sent >= config.max_bytes_per_connection_tick
                || !transport.is_connection_ready(connection_id)
            {
                debug!(
                    "connection {:?} saturated, {} objects deferred",
                    connection_id,
                    prioritized.len() - position
                );
                stats.saturated_connections += 1;
                for deferred in &prioritized[position..] {
                    if let Some(record) = objects.get_mut(&deferred.object_id) {
                        record.timing.set_pending();
                    }
                }
                break;
            }

            let Some(record) = objects.get_mut(&entry.object_id) else {
                continue;
            };
            let Some(object) = record.object() else {
                continue;
            };

            if !connection.channels.contains_key(&entry.object_id) {
                let handle = match transport.open_channel(connection_id, record.guid) {
                    Ok(handle) => handle,
                    Err(error) => {
                        warn!("can't open a channel for {} on {:?}: {}", record.guid, connection_id, error);
                        record.timing.set_pending();
                        continue;
                    }
                };
                let mut replicator = ObjectReplicator::new(
                    &object,
                    record.guid,
                    record.class_net_id,
                    record.layout.clone(),
                    HostType::Server,
                    &config.replication,
                );
                replicator.start_replicating(handle);
                info!(
                    "opened {:?} for {} {} on {:?}",
                    handle, record.class_name, record.guid, connection_id
                );
                connection.add_channel(entry.object_id, ObjectChannel::new(handle, replicator, now));
                stats.channels_opened += 1;
            }
            let Some(channel) = connection.channels.get_mut(&entry.object_id) else {
                continue;
            };

            if entry.relevant {
                channel.relevant_time = now + 0.5 * fastrand::f64();
            } else if now - channel.relevant_time >= f64::from(config.relevant_timeout) {
                info!(
                    "{} {} no longer relevant to {:?}",
                    record.class_name, record.guid, connection_id
                );
                if let Some(mut closed) = connection.remove_channel(&entry.object_id) {
                    transport.close_channel(connection_id, closed.handle, CloseReason::NotRelevant);
                    closed.replicator.stop_replicating(guid_cache);
                }
                stats.channels_closed += 1;
                continue;
            }

            if !transport.is_ready(connection_id, channel.handle) {
                record.timing.set_pending();
                continue;
            }

            let flags = RepFlags::for_connection(
                channel.replicator.is_initial(),
                object.owner() == Some(connection_id),
            );
            let result = {
                let mut package_map = PackageMap::exporting(guid_cache, &mut connection.exports);
                channel.replicator.replicate_properties(
                    &mut record.changelists,
                    *frame,
                    &flags,
                    false,
                    &mut package_map,
                )
            };

            match result {
                Ok(Some(bunch)) => {
                    channel.last_update_time = now;
                    match connection.send_bunch(
                        &entry.object_id,
                        bunch,
                        transport,
                        config.max_reliable_bytes_in_flight,
                    ) {
                        Ok(sent) => {
                            bytes_sent += sent;
                            stats.bytes_sent += sent;
                            stats.replicated += 1;
                            replicated_objects.insert(entry.object_id);
                        }
                        Err(error) if error.is_fatal() => return Err(error),
                        Err(error) => {
                            warn!("{} not sent to {:?}: {}", record.guid, connection_id, error);
                            record.timing.set_pending();
                        }
                    }
                }
                Ok(None) => {
                    if object.settings().dormancy == NetDormancy::DormantAll
                        && channel.replicator.ready_for_dormancy()
                    {
                        debug!("{} {} dormant on {:?}", record.class_name, record.guid, connection_id);
                        channel.dormant = true;
                    }
                }
                Err(error) => {
                    warn!(
                        "replicating {} {} to {:?} failed: {}",
                        record.class_name, record.guid, connection_id, error
                    );
                    if let Some(mut closed) = connection.remove_channel(&entry.object_id) {
                        transport.close_channel(connection_id, closed.handle, CloseReason::Error);
                        closed.replicator.stop_replicating(guid_cache);
                    }
                    stats.channels_closed += 1;
                    events.push_error(connection_id, error.into());
                }
            }
        }
        Ok(())
    }

    // Incoming

    /// Handles a bunch the transport delivered on one of a connection's
    /// channels. Errors which corrupt the stream close the connection.
    pub fn received_bunch(
        &mut self,
        connection: ConnectionId,
        channel: ChannelHandle,
        bytes: &[u8],
        transport: &mut dyn ReplicationTransport,
    ) -> Result<(), ServerError> {
        let result = self.read_bunch(connection, channel, bytes);
        if let Err(error) = &result {
            if error.is_fatal() {
                self.close_connection(connection, error.clone(), transport);
            }
        }
        result
    }

    fn read_bunch(
        &mut self,
        connection_id: ConnectionId,
        handle: ChannelHandle,
        bytes: &[u8],
    ) -> Result<(), ServerError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(ServerError::UnknownConnection { connection: connection_id })?;
        let unknown_channel = ServerError::UnknownChannel {
            connection: connection_id,
            channel: handle,
        };
        let Some(object_id) = connection.object_for_channel(&handle) else {
            return Err(unknown_channel);
        };
        let Some(channel) = connection.channels.get_mut(&object_id) else {
            return Err(unknown_channel);
        };

        let mut reader = BitReader::new(bytes);
        let mut package_map = PackageMap::new(&mut self.guid_cache);
        let header = BunchHeader::read(&mut reader, &mut package_map)?;
        let guid = channel.replicator.guid();
        if header.guid != guid {
            return Err(ServerError::GuidMismatch {
                expected: guid,
                found: header.guid,
            });
        }

        let report = channel
            .replicator
            .received_bunch(&header, &mut reader, &mut package_map)?;
        let layout = channel.replicator.layout().clone();
        for function in report.executed_rpcs {
            if let Some(rep_function) = layout.function(function) {
                trace!("{:?} called {} on {}", connection_id, rep_function.name, guid);
                self.events.push_rpc(connection_id, guid, rep_function.name);
            }
        }
        Ok(())
    }

    pub fn received_ack(&mut self, connection: ConnectionId, packet_id: PacketId) -> Result<(), ServerError> {
        self.connections
            .get_mut(&connection)
            .ok_or(ServerError::UnknownConnection { connection })?
            .received_ack(packet_id);
        Ok(())
    }

    /// Marks the data in a lost packet for resending on the next tick
    pub fn received_nak(&mut self, connection: ConnectionId, packet_id: PacketId) -> Result<(), ServerError> {
        let resend = self
            .connections
            .get_mut(&connection)
            .ok_or(ServerError::UnknownConnection { connection })?
            .received_nak(packet_id);
        for object_id in resend {
            if let Some(record) = self.objects.get_mut(&object_id) {
                record.timing.set_pending();
            }
        }
        Ok(())
    }

    /// Drops cache entries nothing references anymore
    pub fn collect_garbage(&mut self) -> usize {
        self.guid_cache.collect_garbage()
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // Events

    pub fn take_events(&mut self) -> ServerEvents {
        std::mem::replace(&mut self.events, ServerEvents::new())
    }

    // Private

    fn record_mut(&mut self, object: &NetObject) -> Result<&mut ObjectRecord, ServerError> {
        self.objects
            .get_mut(&object.id())
            .ok_or(ServerError::UnknownObject {
                class_name: object.class_name(),
            })
    }

    fn remove_dead_objects(&mut self, transport: &mut dyn ReplicationTransport) {
        let dead: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|record| record.object().is_none())
            .map(|record| record.id)
            .collect();
        for object_id in dead {
            debug!("object {:?} dropped without being removed", object_id);
            self.destroy_object(object_id, transport);
        }
    }

    fn destroy_object(&mut self, object_id: ObjectId, transport: &mut dyn ReplicationTransport) -> NetworkGuid {
        let Some(record) = self.objects.remove(&object_id) else {
            return NetworkGuid::INVALID;
        };
        self.object_order.retain(|id| *id != object_id);

        let destroy_record = match (&record.path, record.guid.is_static()) {
            (Some(path), true) => Some(DestroyRecord::encode_all(&[DestroyRecord::new(record.guid, path)])),
            _ => None,
        };

        // connections without a channel only learn about static objects
        // through the control stream
        for connection in self.connections.values_mut() {
            if let Some(mut channel) = connection.remove_channel(&object_id) {
                transport.close_channel(connection.id, channel.handle, CloseReason::Destroyed);
                channel.replicator.stop_replicating(&mut self.guid_cache);
            } else if let Some(bytes) = &destroy_record {
                if let Err(error) = transport.send_control(connection.id, bytes.clone()) {
                    warn!("destroy of {} not sent to {:?}: {}", record.guid, connection.id, error);
                }
            }
        }

        self.guid_cache.object_destroyed(object_id);
        info!("{} {} destroyed", record.class_name, record.guid);
        record.guid
    }

    fn close_connection(
        &mut self,
        connection: ConnectionId,
        error: ServerError,
        transport: &mut dyn ReplicationTransport,
    ) {
        warn!("closing connection {:?}: {}", connection, error);
        if let Some(mut removed) = self.connections.remove(&connection) {
            removed.close_all(Some(transport), &mut self.guid_cache, CloseReason::Error);
        }
        self.events.push_error(connection, error);
        self.events.push_disconnection(connection);
    }

    /// Forgets history every open channel has already consumed
    fn trim_changelists(&mut self) {
        for record in self.objects.values_mut() {
            let consumed = self
                .connections
                .values()
                .filter_map(|connection| connection.channels.get(&record.id))
                .map(|channel| channel.replicator.rep_state().last_changelist_index())
                .min();
            if let Some(consumed) = consumed {
                record.changelists.trim_history(consumed);
            }
        }
    }
}
