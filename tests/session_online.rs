// Improvement potential. Run a couple of sessions over real websockets once the console crate
//   exposes its transport as a library.

use std::sync::{Arc, Mutex};

use chess_duel::coordinator::{READY_NOTICE, disconnect_notice};
use chess_duel::event::{ClientEvent, ServerEvent, SpectatorGreeting};
use chess_duel::registry::{ConnectionId, SessionStatus};
use chess_duel::rules::{ChessRulesEngine, GameOutcome, RulesEngine};
use chess_duel::server::{self, IncomingEvent, ServerInfo, ServerState};
use chess_duel::side::Side;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use serde_json::json;


struct Server {
    state: ServerState<ChessRulesEngine>,
    server_info: Arc<Mutex<ServerInfo>>,
}

impl Server {
    fn new() -> Self { Self::with_rules(ChessRulesEngine::new()) }

    fn with_rules(rules: ChessRulesEngine) -> Self {
        let server_info = Arc::new(Mutex::new(ServerInfo::new()));
        let state = ServerState::new(rules, Arc::clone(&server_info));
        Server { state, server_info }
    }

    fn apply(&mut self, event: IncomingEvent) {
        println!(">>> {:?}", event);
        self.state.apply_event(event);
    }

    fn board_state(&self) -> String { self.state.coordinator().board_state() }
    fn initial_board_state(&self) -> String {
        let rules = self.state.coordinator().rules();
        rules.serialize(&rules.initial_position())
    }
    fn info(&self) -> ServerInfo { self.server_info.lock().unwrap().clone() }
}


struct Client {
    id: ConnectionId,
    incoming_rx: async_std::channel::Receiver<ServerEvent>,
}

impl Client {
    fn connect(server: &mut Server) -> Self {
        let (incoming_tx, incoming_rx) = async_std::channel::unbounded();
        let id = ConnectionId::new_unique();
        server.apply(IncomingEvent::Connect {
            id,
            events_tx: incoming_tx,
            logging_id: format!("client{:?}", id),
        });
        Client { id, incoming_rx }
    }

    fn propose(&self, server: &mut Server, payload: serde_json::Value) {
        server.apply(IncomingEvent::Network(self.id, ClientEvent::Move(payload)));
    }

    fn disconnect(&self, server: &mut Server) { server.apply(IncomingEvent::Disconnect(self.id)); }

    // Everything received since the last call.
    fn events(&self) -> Vec<ServerEvent> {
        let mut events = vec![];
        while let Ok(event) = self.incoming_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

fn connection(text: &str) -> ServerEvent { ServerEvent::Connection(text.to_owned()) }

fn spectator_role(board_state: String) -> ServerEvent {
    ServerEvent::SpectatorRole(SpectatorGreeting { board_state })
}

// Connects two players and drains their inboxes.
fn start_game(server: &mut Server) -> (Client, Client) {
    let white = Client::connect(server);
    let black = Client::connect(server);
    white.events();
    black.events();
    (white, black)
}


#[test]
fn seats_in_connection_order() {
    let mut server = Server::new();
    let c1 = Client::connect(&mut server);
    assert_eq!(c1.events(), vec![ServerEvent::PlayerRole(Side::White)]);
    assert_eq!(server.state.coordinator().status(), SessionStatus::WaitingForPlayers);

    let c2 = Client::connect(&mut server);
    assert_eq!(c2.events(), vec![
        ServerEvent::PlayerRole(Side::Black),
        connection(READY_NOTICE),
    ]);
    assert_eq!(c1.events(), vec![connection(READY_NOTICE)]);

    let c3 = Client::connect(&mut server);
    assert_eq!(c3.events(), vec![
        spectator_role(server.initial_board_state()),
        connection(READY_NOTICE),
    ]);
    let c4 = Client::connect(&mut server);
    assert_eq!(c4.events()[0], spectator_role(server.initial_board_state()));
}

#[test]
fn spectator_sees_current_position() {
    let mut server = Server::new();
    let (white, _black) = start_game(&mut server);
    white.propose(&mut server, json!({ "from": "d2", "to": "d4" }));
    let spectator = Client::connect(&mut server);
    let board_state = server.board_state();
    assert_ne!(board_state, server.initial_board_state());
    assert_eq!(spectator.events()[0], spectator_role(board_state));
}

#[test]
fn full_session() {
    let mut server = Server::new();
    let c1 = Client::connect(&mut server);
    let c2 = Client::connect(&mut server);
    let c3 = Client::connect(&mut server);
    assert_eq!(c1.events()[0], ServerEvent::PlayerRole(Side::White));
    assert_eq!(c2.events()[0], ServerEvent::PlayerRole(Side::Black));
    assert_eq!(c3.events()[0], spectator_role(server.initial_board_state()));

    let e4 = json!({ "from": "e2", "to": "e4" });
    c1.propose(&mut server, e4.clone());
    let after_e4 = server.board_state();
    let expected = vec![
        ServerEvent::Turn(Side::Black),
        ServerEvent::Move(e4),
        ServerEvent::BoardState(after_e4.clone()),
    ];
    for client in [&c1, &c2, &c3] {
        assert_eq!(client.events(), expected);
    }

    // e2 is empty now, and Black has nothing there anyway.
    let bad_move = json!({ "from": "e2", "to": "e4" });
    c2.propose(&mut server, bad_move.clone());
    assert_eq!(c2.events(), vec![ServerEvent::InvalidMove(bad_move)]);
    assert!(c1.events().is_empty());
    assert!(c3.events().is_empty());
    assert_eq!(server.board_state(), after_e4);

    c1.disconnect(&mut server);
    let expected = vec![
        connection(&disconnect_notice(Side::White)),
        ServerEvent::BoardState(server.initial_board_state()),
    ];
    assert_eq!(c2.events(), expected);
    assert_eq!(c3.events(), expected);
    assert_eq!(server.board_state(), server.initial_board_state());

    let c4 = Client::connect(&mut server);
    assert_eq!(c4.events(), vec![
        ServerEvent::PlayerRole(Side::White),
        connection(READY_NOTICE),
    ]);
    assert_eq!(c2.events(), vec![connection(READY_NOTICE)]);
}

#[test]
fn accepted_move_is_echoed_as_sent() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    let spectator = Client::connect(&mut server);
    for client in [&white, &black, &spectator] {
        client.events();
    }
    let payload = json!({ "from": "e2", "to": "e4", "promotion": null, "color": "w" });
    white.propose(&mut server, payload.clone());
    for client in [&white, &black, &spectator] {
        assert_eq!(client.events()[1], ServerEvent::Move(payload.clone()));
    }
}

#[test]
fn out_of_turn_moves_are_unicast_rejections() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    let spectator = Client::connect(&mut server);
    white.events();
    black.events();
    spectator.events();
    let initial = *server.state.coordinator().position();

    let payload = json!({ "from": "e7", "to": "e5" });
    black.propose(&mut server, payload.clone());
    assert_eq!(black.events(), vec![ServerEvent::InvalidMove(payload.clone())]);
    spectator.propose(&mut server, payload.clone());
    assert_eq!(spectator.events(), vec![ServerEvent::InvalidMove(payload)]);

    assert!(white.events().is_empty());
    assert_eq!(*server.state.coordinator().position(), initial);
}

#[test]
fn repeated_illegal_move_is_idempotent() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    let initial = *server.state.coordinator().position();
    let payload = json!({ "from": "e2", "to": "e5" });
    for _ in 0..2 {
        white.propose(&mut server, payload.clone());
        assert_eq!(white.events(), vec![ServerEvent::InvalidMove(payload.clone())]);
        assert!(black.events().is_empty());
        assert_eq!(*server.state.coordinator().position(), initial);
    }
}

#[test]
fn malformed_proposals_echo_payload() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    for payload in [
        json!("e2e4"),
        json!({ "from": "e2" }),
        json!({ "from": "e2", "to": "e9" }),
        json!({ "from": "e2", "to": "e4", "promotion": 5 }),
    ] {
        white.propose(&mut server, payload.clone());
        assert_eq!(white.events(), vec![ServerEvent::InvalidMove(payload)]);
    }
    assert!(black.events().is_empty());
    assert_eq!(server.board_state(), server.initial_board_state());
}

#[test]
fn moves_need_two_players() {
    let mut server = Server::new();
    let white = Client::connect(&mut server);
    white.events();
    let payload = json!({ "from": "e2", "to": "e4" });
    white.propose(&mut server, payload.clone());
    assert_eq!(white.events(), vec![ServerEvent::InvalidMove(payload)]);
    assert_eq!(server.board_state(), server.initial_board_state());
}

#[test]
fn turns_alternate() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    let moves = [
        (&white, "g1", "f3"),
        (&black, "g8", "f6"),
        (&white, "f3", "g1"),
        (&black, "f6", "g8"),
        (&white, "b1", "c3"),
    ];
    let mut turns = vec![];
    for (client, from, to) in moves {
        client.propose(&mut server, json!({ "from": from, "to": to }));
        turns.extend(white.events().into_iter().filter_map(|ev| match ev {
            ServerEvent::Turn(side) => Some(side),
            _ => None,
        }));
    }
    assert_eq!(turns.len(), moves.len());
    assert!(turns.iter().tuple_windows().all(|(a, b)| a != b));
    assert_eq!(turns[0], Side::Black);
    assert_eq!(server.state.coordinator().whose_turn(), Side::Black);
}

#[test]
fn black_disconnect_keeps_white_seat() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    white.propose(&mut server, json!({ "from": "e2", "to": "e4" }));
    black.disconnect(&mut server);
    white.events();

    let registry = server.state.coordinator().registry();
    assert_eq!(registry.seat_holder(Side::White), Some(white.id));
    assert_eq!(registry.seat_holder(Side::Black), None);
    assert_eq!(server.board_state(), server.initial_board_state());

    let newcomer = Client::connect(&mut server);
    assert_eq!(newcomer.events()[0], ServerEvent::PlayerRole(Side::Black));
}

#[test]
fn spectator_leaves_quietly() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    let spectator = Client::connect(&mut server);
    white.events();
    black.events();
    white.propose(&mut server, json!({ "from": "e2", "to": "e4" }));
    white.events();
    black.events();
    let board_state = server.board_state();

    spectator.disconnect(&mut server);
    assert!(white.events().is_empty());
    assert!(black.events().is_empty());
    assert_eq!(server.board_state(), board_state);
    assert_eq!(server.state.coordinator().status(), SessionStatus::Active);
}

#[test]
fn duplicate_disconnect_is_harmless() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    white.disconnect(&mut server);
    assert_eq!(black.events().len(), 2);
    white.disconnect(&mut server);
    assert!(black.events().is_empty());
    assert_eq!(server.state.clients().len(), 1);
}

#[test]
fn messages_from_unknown_connections_are_dropped() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    white.disconnect(&mut server);
    black.events();
    let payload = json!({ "from": "e2", "to": "e4" });
    white.propose(&mut server, payload.clone());
    server.apply(IncomingEvent::Network(ConnectionId::new_unique(), ClientEvent::Move(payload)));
    assert!(black.events().is_empty());
    assert!(white.events().is_empty());
}

#[test]
fn checkmate_ends_the_game() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    white.propose(&mut server, json!({ "from": "f2", "to": "f3" }));
    black.propose(&mut server, json!({ "from": "e7", "to": "e5" }));
    white.propose(&mut server, json!({ "from": "g2", "to": "g4" }));
    white.events();
    black.events();
    black.propose(&mut server, json!({ "from": "d8", "to": "h4" }));
    let events = white.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[3], ServerEvent::GameOver(GameOutcome::Checkmate { winner: Side::Black }));

    let payload = json!({ "from": "a2", "to": "a3" });
    white.propose(&mut server, payload.clone());
    assert_eq!(white.events(), vec![ServerEvent::InvalidMove(payload)]);
}

#[test]
fn custom_starting_position() {
    let fen = "8/P6k/8/8/8/8/8/K7 w - - 0 1";
    let mut server = Server::with_rules(ChessRulesEngine::with_starting_position(fen).unwrap());
    let (white, black) = start_game(&mut server);
    let payload = json!({ "from": "a7", "to": "a8", "promotion": "q" });
    white.propose(&mut server, payload.clone());
    assert_eq!(black.events()[1], ServerEvent::Move(payload));
    assert!(server.board_state().starts_with("Q7/7k/"));
}

#[test]
fn server_info_follows_session() {
    let mut server = Server::new();
    assert_eq!(server.info().num_connections, 0);
    assert_eq!(server.info().board_state, server.initial_board_state());

    let (white, _black) = start_game(&mut server);
    let _spectator = Client::connect(&mut server);
    let info = server.info();
    assert_eq!(info.num_connections, 3);
    assert_eq!(info.num_spectators, 1);
    assert_eq!(info.status, SessionStatus::Active);
    assert!(info.seats_taken.values().all(|&taken| taken));

    white.disconnect(&mut server);
    let info = server.info();
    assert_eq!(info.num_connections, 2);
    assert_eq!(info.status, SessionStatus::WaitingForPlayers);
    assert!(!info.seats_taken[Side::White]);
}

#[test]
fn terminate_notifies_everybody() {
    let mut server = Server::new();
    let (white, black) = start_game(&mut server);
    assert!(!server.state.is_shutting_down());
    server.apply(IncomingEvent::Terminate);
    assert!(server.state.is_shutting_down());
    for client in [&white, &black] {
        assert_eq!(client.events(), vec![connection(server::SHUTDOWN_NOTICE)]);
    }
}
