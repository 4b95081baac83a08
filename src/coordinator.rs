use log::{debug, info};

use crate::error::ProposalError;
use crate::event::{ServerEvent, SpectatorGreeting};
use crate::messenger::Messenger;
use crate::proposal::MoveProposal;
use crate::registry::{ConnectionId, ConnectionRegistry, Role, SessionStatus};
use crate::rules::{IllegalMove, RulesEngine};
use crate::side::Side;


pub const READY_NOTICE: &str = "Connected!";

pub fn disconnect_notice(side: Side) -> String { format!("{} player disconnected.", side.name()) }

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AttachResult {
    Seated(Side),
    Spectating { board_state: String },
}



// The one and only game session: two seats, any number of spectators, one position.
//
// All methods run to completion without yielding, and the coordinator is owned by a single
// thread (see `server::ServerState`), so events are processed strictly one at a time. Clients
// are reached only through the `Messenger` passed in; by the time `detach` is called the
// messenger must already have stopped delivering to the departing connection.
pub struct SessionCoordinator<R: RulesEngine> {
    rules: R,
    position: R::Position,
    registry: ConnectionRegistry,
}

impl<R: RulesEngine> SessionCoordinator<R> {
    pub fn new(rules: R) -> Self {
        let position = rules.initial_position();
        SessionCoordinator {
            rules,
            position,
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn rules(&self) -> &R { &self.rules }
    pub fn position(&self) -> &R::Position { &self.position }
    pub fn board_state(&self) -> String { self.rules.serialize(&self.position) }
    pub fn registry(&self) -> &ConnectionRegistry { &self.registry }
    pub fn status(&self) -> SessionStatus { self.registry.status() }
    pub fn whose_turn(&self) -> Side { self.rules.whose_turn(&self.position) }

    pub fn attach(&mut self, id: ConnectionId, messenger: &mut impl Messenger) -> AttachResult {
        let result = match self.registry.register(id) {
            Role::Player(side) => {
                info!("{:?} takes the {} seat", id, side.name());
                messenger.send(id, ServerEvent::PlayerRole(side));
                AttachResult::Seated(side)
            }
            Role::Spectator => {
                info!("{:?} joins as a spectator", id);
                let board_state = self.board_state();
                let greeting = SpectatorGreeting { board_state: board_state.clone() };
                messenger.send(id, ServerEvent::SpectatorRole(greeting));
                AttachResult::Spectating { board_state }
            }
        };
        if self.status() == SessionStatus::Active {
            messenger.broadcast(ServerEvent::Connection(READY_NOTICE.to_owned()));
        }
        result
    }

    // On success the new turn, the move and the new position go to everybody. On failure
    // only the proposer hears back; the returned error is informational.
    pub fn propose_move(
        &mut self, id: ConnectionId, payload: &serde_json::Value, messenger: &mut impl Messenger,
    ) -> Result<(), ProposalError> {
        match self.try_move(id, payload) {
            Ok(proposal) => {
                debug!("{:?} plays {}-{}", id, proposal.from, proposal.to);
                messenger.broadcast(ServerEvent::Turn(self.whose_turn()));
                messenger.broadcast(ServerEvent::Move(payload.clone()));
                messenger.broadcast(ServerEvent::BoardState(self.board_state()));
                if let Some(outcome) = self.rules.outcome(&self.position) {
                    info!("Game over: {:?}", outcome);
                    messenger.broadcast(ServerEvent::GameOver(outcome));
                }
                Ok(())
            }
            Err(err) => {
                messenger.send(id, ServerEvent::InvalidMove(payload.clone()));
                Err(err)
            }
        }
    }

    // Leaving spectators go quietly. A leaving player ends the game: the board is reset and
    // the seat is up for grabs. Returns the role the connection had, if it was attached.
    pub fn detach(&mut self, id: ConnectionId, messenger: &mut impl Messenger) -> Option<Role> {
        let role = self.registry.unregister(id)?;
        match role {
            Role::Spectator => info!("Spectator {:?} left", id),
            Role::Player(side) => {
                info!("{} player {:?} left, resetting the game", side.name(), id);
                self.position = self.rules.initial_position();
                messenger.broadcast(ServerEvent::Connection(disconnect_notice(side)));
                messenger.broadcast(ServerEvent::BoardState(self.board_state()));
            }
        }
        Some(role)
    }

    fn try_move(
        &mut self, id: ConnectionId, payload: &serde_json::Value,
    ) -> Result<MoveProposal, ProposalError> {
        if self.status() != SessionStatus::Active {
            return Err(ProposalError::GameNotActive);
        }
        let side = self.registry.role(id).and_then(Role::side).ok_or(ProposalError::SeatNotHeld)?;
        if side != self.whose_turn() {
            return Err(ProposalError::NotYourTurn);
        }
        let proposal = MoveProposal::from_json(payload)?;
        let new_position = self
            .rules
            .apply_move(&self.position, &proposal)
            .map_err(|IllegalMove| ProposalError::IllegalMove)?;
        self.position = new_position;
        Ok(proposal)
    }
}
