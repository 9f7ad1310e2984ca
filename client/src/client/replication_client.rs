use std::{collections::HashMap, rc::Rc};

use log::{debug, info, trace, warn};

use replicore_shared::{
    BitReader, BunchHeader, ChannelHandle, ClassKinds, CloseReason, DestroyRecord, GuidCache,
    HostType, LayoutCache, NetObject, NetworkGuid, ObjectReplicator, ObjectResolver, OpenHeader,
    PackageMap, Protocol, ReceivedBunch, RepLayout, RepValue, ReplicationTransport, Resolution,
};

use crate::{
    client::{ClientConfig, RemoteObject},
    events::ClientEvents,
    ClientError,
};

/// The receiving side of replication. Spawns objects when the server opens
/// their channel, applies property bunches, keeps unresolved references
/// pending until they can be mapped and dispatches remote calls.
pub struct ReplicationClient {
    config: ClientConfig,
    class_kinds: ClassKinds,
    layout_cache: LayoutCache,
    guid_cache: GuidCache,
    channels: HashMap<ChannelHandle, RemoteObject>,
    guid_channels: HashMap<NetworkGuid, ChannelHandle>,
    /// Channels of static objects whose package is still loading, with
    /// every bunch received on them so far
    pending_opens: HashMap<ChannelHandle, PendingOpen>,
    events: ClientEvents,
}

struct PendingOpen {
    guid: NetworkGuid,
    bunches: Vec<Vec<u8>>,
}

impl ReplicationClient {
    pub fn new<P: Into<Protocol>>(config: ClientConfig, protocol: P) -> Self {
        let protocol: Protocol = protocol.into();
        let Protocol { class_kinds, .. } = protocol;

        Self {
            config,
            guid_cache: GuidCache::new(HostType::Client, class_kinds.clone()),
            class_kinds,
            layout_cache: LayoutCache::new(),
            channels: HashMap::new(),
            guid_channels: HashMap::new(),
            pending_opens: HashMap::new(),
            events: ClientEvents::new(),
        }
    }

    // Incoming

    /// Handles a bunch the server sent on `channel`. The first bunch of a
    /// channel spawns, or for static objects binds, the local object.
    pub fn received_bunch(
        &mut self,
        channel: ChannelHandle,
        bytes: &[u8],
        resolver: &mut dyn ObjectResolver,
    ) -> Result<(), ClientError> {
        let result = self.read_bunch(channel, bytes, resolver);
        if let Err(error) = &result {
            if error.is_fatal() {
                warn!("closing channel {:?}: {}", channel, error);
                self.despawn(channel, CloseReason::Error);
                self.events.push_error(error.clone());
            }
        }
        result
    }

    fn read_bunch(
        &mut self,
        channel: ChannelHandle,
        bytes: &[u8],
        resolver: &mut dyn ObjectResolver,
    ) -> Result<(), ClientError> {
        let allow_async = self.config.replication.allow_async_loading;
        let mut reader = BitReader::new(bytes);
        let header = {
            let mut package_map = PackageMap::resolving(&mut self.guid_cache, resolver, allow_async);
            BunchHeader::read(&mut reader, &mut package_map)?
        };

        if let Some(pending) = self.pending_opens.get_mut(&channel) {
            pending.bunches.push(bytes.to_vec());
            return Ok(());
        }
        if !self.channels.contains_key(&channel) {
            let Some(open) = &header.open else {
                return Err(ClientError::UnknownChannel { channel });
            };
            if !self.open_channel(channel, header.guid, open, resolver)? {
                debug!("{:?} waits for {} to load", channel, header.guid);
                self.pending_opens.insert(
                    channel,
                    PendingOpen {
                        guid: header.guid,
                        bunches: vec![bytes.to_vec()],
                    },
                );
                return Ok(());
            }
        }
        let Some(remote) = self.channels.get_mut(&channel) else {
            return Err(ClientError::UnknownChannel { channel });
        };
        let guid = remote.replicator.guid();
        if header.guid != guid {
            return Err(ClientError::GuidMismatch {
                expected: guid,
                found: header.guid,
            });
        }

        let report = {
            let mut package_map = PackageMap::resolving(&mut self.guid_cache, resolver, allow_async);
            remote
                .replicator
                .received_bunch(&header, &mut reader, &mut package_map)?
        };
        let layout = remote.replicator.layout().clone();
        push_report(&mut self.events, guid, &layout, report);
        Ok(())
    }

    /// Spawns or binds the channel's object. Returns `false` if the object
    /// is static and its package is still loading.
    fn open_channel(
        &mut self,
        channel: ChannelHandle,
        guid: NetworkGuid,
        open: &OpenHeader,
        resolver: &mut dyn ObjectResolver,
    ) -> Result<bool, ClientError> {
        let class_kind = self.class_kinds.kind_from_net_id(open.class_net_id)?;

        let object = if guid.is_static() {
            let allow_async = self.config.replication.allow_async_loading;
            match self.guid_cache.resolve(guid, Some(resolver), allow_async) {
                Resolution::Resolved(object) => object,
                Resolution::Pending => return Ok(false),
                _ => return Err(ClientError::UnresolvedStatic { guid }),
            }
        } else {
            let (class_kind, description, state) = self.class_kinds.create(open.class_net_id)?;
            let object = NetObject::from_boxed(class_kind, description.name, None, None, state);
            self.guid_cache.register_object(guid, &object)?;
            object
        };

        let Some(layout) = self.layout_cache.layout_for(&class_kind, &self.class_kinds) else {
            return Err(ClientError::NotReplicated {
                class_name: object.class_name(),
            });
        };
        let mut replicator = ObjectReplicator::new(
            &object,
            guid,
            open.class_net_id,
            layout,
            HostType::Client,
            &self.config.replication,
        );
        replicator.start_replicating(channel);

        info!("{:?} opened for {} {}", channel, object.class_name(), guid);
        self.guid_channels.insert(guid, channel);
        self.channels.insert(
            channel,
            RemoteObject {
                object: object.clone(),
                replicator,
            },
        );
        self.events.push_spawn(guid, object);
        Ok(true)
    }

    /// The server closed a channel. Dynamic objects are destroyed, static
    /// objects stay with the resolver.
    pub fn channel_closed(&mut self, channel: ChannelHandle, reason: CloseReason) {
        if let Some(pending) = self.pending_opens.remove(&channel) {
            debug!("{:?} closed while {} was loading", channel, pending.guid);
            return;
        }
        if !self.channels.contains_key(&channel) {
            trace!("close of unknown {:?}", channel);
            return;
        }
        self.despawn(channel, reason);
    }

    /// Handles connection-level data, currently destroy records for static
    /// objects this client has no channel for
    pub fn received_control(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        let mut reader = BitReader::new(bytes);
        for record in DestroyRecord::read_all(&mut reader)? {
            debug!("{} ({}) destroyed by the server", record.guid, record.path);
            if let Some(channel) = self.guid_channels.get(&record.guid).copied() {
                self.despawn(channel, CloseReason::Destroyed);
                continue;
            }
            if let Resolution::Resolved(object) = self.guid_cache.resolve(record.guid, None, false) {
                self.guid_cache.object_destroyed(object.id());
            }
            self.events.push_destroy(record.guid, record.path);
        }
        Ok(())
    }

    // Ticking

    /// Finishes async loads and retries references and delayed calls which
    /// were waiting on them
    pub fn client_tick(&mut self, resolver: &mut dyn ObjectResolver) {
        let loaded = self.guid_cache.poll_async_loads(resolver);
        if !loaded.is_empty() {
            debug!("{} GUIDs finished loading", loaded.len());
        }
        self.finish_pending_opens(resolver);

        let allow_async = self.config.replication.allow_async_loading;
        let mut failed = Vec::new();
        for (channel, remote) in self.channels.iter_mut() {
            if !remote.replicator.has_unmapped() && remote.replicator.pending_rpc_count() == 0 {
                continue;
            }
            let result = {
                let mut package_map = PackageMap::resolving(&mut self.guid_cache, resolver, allow_async);
                remote.replicator.update_unmapped(&mut package_map)
            };
            let guid = remote.replicator.guid();
            match result {
                Ok(report) => {
                    let layout = remote.replicator.layout().clone();
                    push_report(&mut self.events, guid, &layout, report);
                }
                Err(error) => {
                    warn!("retrying references of {} failed: {}", guid, error);
                    failed.push((*channel, ClientError::from(error)));
                }
            }
        }
        for (channel, error) in failed {
            self.despawn(channel, CloseReason::Error);
            self.events.push_error(error);
        }
    }

    /// Opens the channels whose static object finished loading and replays
    /// what arrived on them in the meantime
    fn finish_pending_opens(&mut self, resolver: &mut dyn ObjectResolver) {
        let allow_async = self.config.replication.allow_async_loading;
        let mut ready = Vec::new();
        let mut failed = Vec::new();
        for (channel, pending) in self.pending_opens.iter() {
            match self.guid_cache.resolve(pending.guid, Some(&mut *resolver), allow_async) {
                Resolution::Pending => {}
                Resolution::Resolved(_) => ready.push(*channel),
                _ => failed.push((*channel, pending.guid)),
            }
        }

        for (channel, guid) in failed {
            self.pending_opens.remove(&channel);
            warn!("{:?} dropped, static object {} failed to load", channel, guid);
            self.events.push_error(ClientError::UnresolvedStatic { guid });
        }
        for channel in ready {
            let Some(pending) = self.pending_opens.remove(&channel) else {
                continue;
            };
            for bytes in pending.bunches {
                if let Err(error) = self.read_bunch(channel, &bytes, resolver) {
                    warn!("replaying {:?} failed: {}", channel, error);
                    self.despawn(channel, CloseReason::Error);
                    self.events.push_error(error);
                    break;
                }
            }
        }
    }

    // Outgoing

    /// Calls a server function on an object this client received
    pub fn call_remote_function(
        &mut self,
        object: &NetObject,
        function: &str,
        args: Vec<RepValue>,
        transport: &mut dyn ReplicationTransport,
    ) -> Result<(), ClientError> {
        let not_replicated = ClientError::NotReplicated {
            class_name: object.class_name(),
        };
        let Some(guid) = self.guid_cache.guid_for_object(object) else {
            return Err(not_replicated);
        };
        let Some(channel) = self.guid_channels.get(&guid).copied() else {
            return Err(not_replicated);
        };
        let Some(remote) = self.channels.get_mut(&channel) else {
            return Err(not_replicated);
        };

        let function_index = remote.replicator.layout().function_index(function)?;
        let bunch = {
            let mut package_map = PackageMap::new(&mut self.guid_cache);
            remote
                .replicator
                .call_remote_function(function_index, args, &mut package_map)?
        };
        if let Some(bunch) = bunch {
            match transport.send(self.config.server_connection, channel, bunch.bytes, bunch.reliable) {
                Ok(packet_range) => remote.replicator.post_send_bunch(packet_range),
                Err(error) => {
                    remote.replicator.send_failed();
                    return Err(error.into());
                }
            }
        }
        Ok(())
    }

    // Queries

    pub fn object(&self, guid: NetworkGuid) -> Option<Rc<NetObject>> {
        let channel = self.guid_channels.get(&guid)?;
        self.channels.get(channel).map(|remote| remote.object.clone())
    }

    pub fn guid_for(&self, object: &NetObject) -> Option<NetworkGuid> {
        self.guid_cache.guid_for_object(object)
    }

    pub fn object_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_owner(&self, guid: NetworkGuid) -> bool {
        self.guid_channels
            .get(&guid)
            .and_then(|channel| self.channels.get(channel))
            .map(|remote| remote.replicator.net_owner())
            .unwrap_or(false)
    }

    pub fn has_unmapped(&self, guid: NetworkGuid) -> bool {
        self.guid_channels
            .get(&guid)
            .and_then(|channel| self.channels.get(channel))
            .map(|remote| remote.replicator.has_unmapped())
            .unwrap_or(false)
    }

    pub fn pending_rpc_count(&self, guid: NetworkGuid) -> usize {
        self.guid_channels
            .get(&guid)
            .and_then(|channel| self.channels.get(channel))
            .map(|remote| remote.replicator.pending_rpc_count())
            .unwrap_or(0)
    }

    pub fn guid_cache(&self) -> &GuidCache {
        &self.guid_cache
    }

    /// Drops cache entries nothing references anymore
    pub fn collect_garbage(&mut self) -> usize {
        self.guid_cache.collect_garbage()
    }

    // Events

    pub fn take_events(&mut self) -> ClientEvents {
        std::mem::replace(&mut self.events, ClientEvents::new())
    }

    // Private

    fn despawn(&mut self, channel: ChannelHandle, reason: CloseReason) {
        let Some(mut remote) = self.channels.remove(&channel) else {
            return;
        };
        let guid = remote.replicator.guid();
        self.guid_channels.remove(&guid);
        remote.replicator.stop_replicating(&mut self.guid_cache);
        if !guid.is_static() {
            self.guid_cache.object_destroyed(remote.object.id());
        }
        info!("{} {} despawned ({:?})", remote.object.class_name(), guid, reason);
        self.events.push_despawn(guid, reason);
    }
}

fn push_report(events: &mut ClientEvents, guid: NetworkGuid, layout: &RepLayout, report: ReceivedBunch) {
    for field in report.fields {
        if let Some(rep_field) = layout.field(field) {
            events.push_update(guid, rep_field.name);
        }
    }
    for function in report.executed_rpcs {
        if let Some(rep_function) = layout.function(function) {
            events.push_rpc(guid, rep_function.name);
        }
    }
    if report.delayed_rpcs > 0 {
        trace!("{} has {} calls waiting on references", guid, report.delayed_rpcs);
    }
}
