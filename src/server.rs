// Improvement potential. Support several independent sessions by keying coordinators with a
//   session ID taken from the connection URL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use enum_map::{EnumMap, enum_map};
use lazy_static::lazy_static;
use log::{info, warn};
use prometheus::{
    IntCounter, IntCounterVec, IntGauge, register_int_counter, register_int_counter_vec,
    register_int_gauge,
};

use crate::coordinator::SessionCoordinator;
use crate::event::{ClientEvent, ServerEvent};
use crate::messenger::Messenger;
use crate::registry::{ConnectionId, Role, SessionStatus};
use crate::rules::RulesEngine;
use crate::side::Side;


pub const SHUTDOWN_NOTICE: &str = "Server is shutting down.";

lazy_static! {
    static ref CONNECTIONS_TOTAL: IntCounter =
        register_int_counter!("connections_total", "Client connections accepted.").unwrap();
    static ref CONNECTIONS_ACTIVE: IntGauge =
        register_int_gauge!("connections_active", "Currently connected clients.").unwrap();
    static ref MOVES_ACCEPTED: IntCounter =
        register_int_counter!("moves_accepted", "Moves applied to the board.").unwrap();
    static ref MOVES_REJECTED: IntCounterVec = register_int_counter_vec!(
        "moves_rejected",
        "Move proposals turned down, by reason.",
        &["reason"]
    )
    .unwrap();
    static ref SESSION_RESETS: IntCounter = register_int_counter!(
        "session_resets",
        "Games abandoned because a player disconnected."
    )
    .unwrap();
}

#[derive(Debug)]
pub enum IncomingEvent {
    Connect {
        id: ConnectionId,
        events_tx: async_std::channel::Sender<ServerEvent>,
        logging_id: String,
    },
    Network(ConnectionId, ClientEvent),
    Disconnect(ConnectionId),
    Terminate,
}


struct Client {
    events_tx: async_std::channel::Sender<ServerEvent>,
    logging_id: String,
}

impl Client {
    fn send(&self, event: ServerEvent) {
        // Fails only if the connection is gone, which the transport reports on its own.
        let _ = self.events_tx.try_send(event);
    }
}

// Outgoing channels of all live connections.
pub struct Clients {
    map: HashMap<ConnectionId, Client>,
}

impl Clients {
    pub fn new() -> Self { Clients { map: HashMap::new() } }

    pub fn add_client(
        &mut self, id: ConnectionId, events_tx: async_std::channel::Sender<ServerEvent>,
        logging_id: String,
    ) {
        let client = Client { events_tx, logging_id };
        if self.map.insert(id, client).is_some() {
            warn!("Connection {:?} registered twice", id);
        }
    }

    // Returns client logging ID if the client existed.
    // Dropping the sender closes the channel, which lets the transport wind down the connection.
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<String> {
        self.map.remove(&id).map(|client| client.logging_id)
    }

    pub fn logging_id(&self, id: ConnectionId) -> Option<&str> {
        self.map.get(&id).map(|client| client.logging_id.as_str())
    }

    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl Messenger for Clients {
    fn send(&mut self, to: ConnectionId, event: ServerEvent) {
        if let Some(client) = self.map.get(&to) {
            client.send(event);
        }
    }
    fn broadcast(&mut self, event: ServerEvent) {
        for client in self.map.values() {
            client.send(event.clone());
        }
    }
}


// Snapshot for the status page.
#[derive(Clone, Debug)]
pub struct ServerInfo {
    pub num_connections: usize,
    pub num_spectators: usize,
    pub seats_taken: EnumMap<Side, bool>,
    pub status: SessionStatus,
    pub board_state: String,
}

impl ServerInfo {
    pub fn new() -> Self {
        ServerInfo {
            num_connections: 0,
            num_spectators: 0,
            seats_taken: enum_map! { _ => false },
            status: SessionStatus::WaitingForPlayers,
            board_state: String::new(),
        }
    }
}


// Owns the session. `apply_event` must only ever be called from one thread: this is what
// serializes connects, moves and disconnects against each other.
pub struct ServerState<R: RulesEngine> {
    clients: Clients,
    coordinator: SessionCoordinator<R>,
    server_info: Arc<Mutex<ServerInfo>>,
    shutting_down: bool,
}

impl<R: RulesEngine> ServerState<R> {
    pub fn new(rules: R, server_info: Arc<Mutex<ServerInfo>>) -> Self {
        let mut state = ServerState {
            clients: Clients::new(),
            coordinator: SessionCoordinator::new(rules),
            server_info,
            shutting_down: false,
        };
        state.update_server_info();
        state
    }

    pub fn coordinator(&self) -> &SessionCoordinator<R> { &self.coordinator }
    pub fn clients(&self) -> &Clients { &self.clients }
    pub fn is_shutting_down(&self) -> bool { self.shutting_down }

    pub fn apply_event(&mut self, event: IncomingEvent) {
        match event {
            IncomingEvent::Connect { id, events_tx, logging_id } => {
                info!("Client {} connected as {:?}", logging_id, id);
                CONNECTIONS_TOTAL.inc();
                self.clients.add_client(id, events_tx, logging_id);
                self.coordinator.attach(id, &mut self.clients);
            }
            IncomingEvent::Network(id, event) => {
                self.process_client_event(id, event);
            }
            IncomingEvent::Disconnect(id) => {
                // Both the reading and the writing half of a connection may report its end.
                if let Some(logging_id) = self.clients.remove_client(id) {
                    info!("Client {} disconnected", logging_id);
                    if let Some(Role::Player(_)) = self.coordinator.detach(id, &mut self.clients) {
                        SESSION_RESETS.inc();
                    }
                }
            }
            IncomingEvent::Terminate => {
                info!("Shutting down");
                self.clients.broadcast(ServerEvent::Connection(SHUTDOWN_NOTICE.to_owned()));
                self.shutting_down = true;
            }
        }
        self.update_server_info();
    }

    fn process_client_event(&mut self, id: ConnectionId, event: ClientEvent) {
        let Some(logging_id) = self.clients.logging_id(id).map(str::to_owned) else {
            warn!("Dropping {:?} from unknown connection {:?}", event, id);
            return;
        };
        match event {
            ClientEvent::Move(payload) => {
                match self.coordinator.propose_move(id, &payload, &mut self.clients) {
                    Ok(()) => MOVES_ACCEPTED.inc(),
                    Err(err) => {
                        warn!("Rejected move {} from client {}: {}", payload, logging_id, err);
                        MOVES_REJECTED.with_label_values(&[err.label()]).inc();
                    }
                }
            }
        }
    }

    fn update_server_info(&mut self) {
        CONNECTIONS_ACTIVE.set(self.clients.len().try_into().unwrap_or(i64::MAX));
        let registry = self.coordinator.registry();
        let info = ServerInfo {
            num_connections: registry.num_connections(),
            num_spectators: registry.num_spectators(),
            seats_taken: EnumMap::from_fn(|side| registry.seat_holder(side).is_some()),
            status: registry.status(),
            board_state: self.coordinator.board_state(),
        };
        // A poisoned lock means the status page panicked; the session itself is fine.
        match self.server_info.lock() {
            Ok(mut server_info) => *server_info = info,
            Err(poisoned) => *poisoned.into_inner() = info,
        }
    }
}
