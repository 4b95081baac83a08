use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{self, AtomicU64};

use enum_map::{EnumMap, enum_map};
use log::error;
use strum::IntoEnumIterator;

use crate::internal_error_message;
use crate::side::Side;


// Identifies one connection for its whole lifetime. Never reused within a process.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new_unique() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT_ID.fetch_add(1, atomic::Ordering::Relaxed))
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
    Player(Side),
    Spectator,
}

impl Role {
    pub fn side(self) -> Option<Side> {
        match self {
            Role::Player(side) => Some(side),
            Role::Spectator => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionStatus {
    WaitingForPlayers,
    Active,
}


// Who is connected and in which capacity.
//
// Invariants:
//   - A connection holds at most one seat, and each seat is held by at most one connection.
//   - `roles` and `seats` agree: `roles[id] == Player(side)` iff `seats[side] == Some(id)`.
// Spectators are exactly the registered connections without a seat.
#[derive(Clone, Debug)]
pub struct ConnectionRegistry {
    roles: HashMap<ConnectionId, Role>,
    seats: EnumMap<Side, Option<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            roles: HashMap::new(),
            seats: enum_map! { _ => None },
        }
    }

    // First come, first seated. A connection that is already known keeps its role.
    pub fn register(&mut self, id: ConnectionId) -> Role {
        if let Some(&role) = self.roles.get(&id) {
            return role;
        }
        let role = match Side::iter().find(|&side| self.seats[side].is_none()) {
            Some(side) => {
                self.seats[side] = Some(id);
                Role::Player(side)
            }
            None => Role::Spectator,
        };
        self.roles.insert(id, role);
        role
    }

    pub fn unregister(&mut self, id: ConnectionId) -> Option<Role> {
        let role = self.roles.remove(&id)?;
        if let Role::Player(side) = role {
            if self.seats[side] == Some(id) {
                self.seats[side] = None;
            } else {
                error!(
                    "{}",
                    internal_error_message!(
                        "{:?} was a {} player, but the seat is held by {:?}",
                        id,
                        side.name(),
                        self.seats[side]
                    )
                );
            }
        }
        Some(role)
    }

    pub fn role(&self, id: ConnectionId) -> Option<Role> { self.roles.get(&id).copied() }
    pub fn seat_holder(&self, side: Side) -> Option<ConnectionId> { self.seats[side] }
    pub fn num_connections(&self) -> usize { self.roles.len() }
    pub fn num_spectators(&self) -> usize { self.spectators().count() }

    pub fn spectators(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.roles.iter().filter(|(_, role)| **role == Role::Spectator).map(|(&id, _)| id)
    }

    pub fn status(&self) -> SessionStatus {
        if self.seats.values().all(Option::is_some) {
            SessionStatus::Active
        } else {
            SessionStatus::WaitingForPlayers
        }
    }
}
