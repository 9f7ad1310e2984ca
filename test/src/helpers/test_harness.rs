use log::debug;

use replicore_client::{ClientConfig, ClientError, ClientEvents, ReplicationClient};
use replicore_server::{ReplicationServer, ServerConfig, ServerError, ServerTickStats};
use replicore_shared::{ConnectionId, NetworkGuid, Protocol, Replicate};

use crate::{
    helpers::{LoopbackTransport, Outgoing, TestResolver},
    test_protocol::protocol,
};

/// What happens to an unreliable bunch on its way to a client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Deliver,
    Drop,
}

pub struct TestClient {
    pub connection: ConnectionId,
    pub client: ReplicationClient,
    pub transport: LoopbackTransport,
    pub resolver: TestResolver,
    pub errors: Vec<ClientError>,
}

impl TestClient {
    pub fn new(connection: ConnectionId, protocol: Protocol) -> Self {
        Self {
            connection,
            client: ReplicationClient::new(ClientConfig::default(), protocol),
            transport: LoopbackTransport::new(),
            resolver: TestResolver::new(),
            errors: Vec::new(),
        }
    }

    pub fn take_events(&mut self) -> ClientEvents {
        self.client.take_events()
    }

    /// Reads the client's copy of a replicated object
    pub fn with_object<R: Replicate, O>(&self, guid: NetworkGuid, func: impl FnOnce(&R) -> O) -> Option<O> {
        self.client.object(guid)?.with(func)
    }
}

/// One server and its clients wired through loopback transports
pub struct TestHarness {
    pub server: ReplicationServer,
    pub transport: LoopbackTransport,
    pub clients: Vec<TestClient>,
    pub server_errors: Vec<ServerError>,
}

/// Server settings under which every object is due on every tick of 0.1s
/// or longer
pub fn test_config() -> ServerConfig {
    ServerConfig {
        adaptive_net_update_frequency: false,
        ..ServerConfig::default()
    }
}

impl TestHarness {
    pub fn new(client_count: u32) -> Self {
        Self::with_config(test_config(), client_count)
    }

    pub fn with_config(config: ServerConfig, client_count: u32) -> Self {
        let mut server = ReplicationServer::new(config, protocol());
        let mut clients = Vec::new();
        for index in 1..=client_count {
            let connection = ConnectionId(index);
            server.add_connection(connection);
            clients.push(TestClient::new(connection, protocol()));
        }
        Self {
            server,
            transport: LoopbackTransport::new(),
            clients,
            server_errors: Vec::new(),
        }
    }

    pub fn client(&mut self, connection: ConnectionId) -> &mut TestClient {
        let position = self
            .clients
            .iter()
            .position(|client| client.connection == connection)
            .expect("no client with that connection");
        &mut self.clients[position]
    }

    pub fn tick(&mut self, delta_time: f32) -> ServerTickStats {
        self.server.server_tick_with_stats(delta_time, &mut self.transport)
    }

    /// Ticks the server, delivers everything and lets clients retry references
    pub fn step(&mut self, delta_time: f32) -> ServerTickStats {
        let stats = self.tick(delta_time);
        self.deliver();
        self.tick_clients();
        stats
    }

    pub fn tick_clients(&mut self) {
        for client in self.clients.iter_mut() {
            client.client.client_tick(&mut client.resolver);
        }
    }

    pub fn deliver(&mut self) {
        self.deliver_filtered(|_| Delivery::Deliver);
    }

    /// Delivers the server's output. Unreliable bunches the filter drops are
    /// reported lost to the server. Reliable bunches always arrive, as the
    /// transport resends them under their original packet id.
    pub fn deliver_filtered(&mut self, mut filter: impl FnMut(&Outgoing) -> Delivery) {
        for outgoing in self.transport.drain() {
            let connection = outgoing.connection();
            let Some(client) = self
                .clients
                .iter_mut()
                .find(|client| client.connection == connection)
            else {
                continue;
            };

            match outgoing {
                Outgoing::Open { .. } => {}
                Outgoing::Close { channel, reason, .. } => {
                    client.client.channel_closed(channel, reason);
                }
                Outgoing::Control { ref bytes, packet_id, .. } => {
                    if let Err(error) = client.client.received_control(bytes) {
                        client.errors.push(error);
                    }
                    let _ = self.server.received_ack(connection, packet_id);
                }
                Outgoing::Bunch {
                    channel,
                    ref bytes,
                    reliable,
                    packet_id,
                    ..
                } => {
                    if !reliable && filter(&outgoing) == Delivery::Drop {
                        debug!("dropping packet {} to {:?}", packet_id, connection);
                        let _ = self.server.received_nak(connection, packet_id);
                        continue;
                    }
                    if let Err(error) = client.client.received_bunch(channel, bytes, &mut client.resolver) {
                        client.errors.push(error);
                    }
                    let _ = self.server.received_ack(connection, packet_id);
                }
            }
        }
    }

    /// Delivers everything the clients sent to the server
    pub fn deliver_to_server(&mut self) {
        for client in self.clients.iter_mut() {
            for outgoing in client.transport.drain() {
                if let Outgoing::Bunch { channel, bytes, .. } = outgoing {
                    if let Err(error) =
                        self.server
                            .received_bunch(client.connection, channel, &bytes, &mut self.transport)
                    {
                        self.server_errors.push(error);
                    }
                }
            }
        }
    }
}
