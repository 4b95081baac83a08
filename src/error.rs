use std::fmt;


#[macro_export]
macro_rules! internal_error_message {
    () => {
        format!("Internal error at {}:{}.", file!(), line!())
    };
    ($($arg:tt)+) => {
        format!("Internal error at {}:{}: {}.", file!(), line!(), format!($($arg)*))
    };
}


// Reasons a move proposal can be turned down. None of these are fatal: the proposer gets an
// `invalidMove` reply and the shared session state is left as is.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ProposalError {
    // Fewer than two seats are taken.
    GameNotActive,
    // The proposer is a spectator (or not attached at all).
    SeatNotHeld,
    // The proposer holds a seat, but it's the other side to move.
    NotYourTurn,
    // The payload is not a `{from, to, promotion?}` object with valid squares.
    MalformedProposal(String),
    // The rules engine rejected the move.
    IllegalMove,
}

impl ProposalError {
    // Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProposalError::GameNotActive => "game_not_active",
            ProposalError::SeatNotHeld => "seat_not_held",
            ProposalError::NotYourTurn => "not_your_turn",
            ProposalError::MalformedProposal(_) => "malformed_proposal",
            ProposalError::IllegalMove => "illegal_move",
        }
    }
}

impl fmt::Display for ProposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalError::GameNotActive => write!(f, "game requires two players"),
            ProposalError::SeatNotHeld => write!(f, "only seated players can move"),
            ProposalError::NotYourTurn => write!(f, "not your turn"),
            ProposalError::MalformedProposal(reason) => write!(f, "malformed move: {reason}"),
            ProposalError::IllegalMove => write!(f, "illegal move"),
        }
    }
}
