// The rules engine is the single source of truth about chess itself. The session layer never
// looks inside a position: it asks the engine whose turn it is, whether a move is legal, and
// how to turn a position into a string for the clients.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::coord::Coord;
use crate::piece::PieceKind;
use crate::proposal::MoveProposal;
use crate::side::Side;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IllegalMove;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GameOutcome {
    Checkmate { winner: Side },
    Stalemate,
}

pub trait RulesEngine {
    type Position: Clone + PartialEq + fmt::Debug;

    fn initial_position(&self) -> Self::Position;

    // Must not have side effects: on `Err` the caller keeps using the original position.
    fn apply_move(
        &self, position: &Self::Position, proposal: &MoveProposal,
    ) -> Result<Self::Position, IllegalMove>;

    fn serialize(&self, position: &Self::Position) -> String;
    fn deserialize(&self, position: &str) -> Result<Self::Position, String>;

    fn whose_turn(&self, position: &Self::Position) -> Side;

    // `None` while the game goes on.
    fn outcome(&self, position: &Self::Position) -> Option<GameOutcome>;
}


// Standard chess; positions are exchanged as FEN.
#[derive(Clone, Debug)]
pub struct ChessRulesEngine {
    starting_position: chess::Board,
}

impl ChessRulesEngine {
    pub fn new() -> Self { ChessRulesEngine { starting_position: chess::Board::default() } }

    pub fn with_starting_position(fen: &str) -> Result<Self, String> {
        let starting_position = parse_fen(fen)?;
        Ok(ChessRulesEngine { starting_position })
    }
}

impl Default for ChessRulesEngine {
    fn default() -> Self { Self::new() }
}

impl RulesEngine for ChessRulesEngine {
    type Position = chess::Board;

    fn initial_position(&self) -> chess::Board { self.starting_position }

    fn apply_move(
        &self, position: &chess::Board, proposal: &MoveProposal,
    ) -> Result<chess::Board, IllegalMove> {
        let from = to_square(proposal.from);
        let to = to_square(proposal.to);
        // Clients attach a promotion letter to every move, so it only counts when a pawn
        // actually reaches the last rank.
        let promotion = if is_promotion(position, from, to) {
            Some(to_piece(proposal.promotion.ok_or(IllegalMove)?))
        } else {
            None
        };
        let mv = chess::ChessMove::new(from, to, promotion);
        if position.legal(mv) {
            Ok(position.make_move_new(mv))
        } else {
            Err(IllegalMove)
        }
    }

    fn serialize(&self, position: &chess::Board) -> String { position.to_string() }

    fn deserialize(&self, position: &str) -> Result<chess::Board, String> { parse_fen(position) }

    fn whose_turn(&self, position: &chess::Board) -> Side { from_color(position.side_to_move()) }

    fn outcome(&self, position: &chess::Board) -> Option<GameOutcome> {
        match position.status() {
            chess::BoardStatus::Ongoing => None,
            chess::BoardStatus::Stalemate => Some(GameOutcome::Stalemate),
            chess::BoardStatus::Checkmate => Some(GameOutcome::Checkmate {
                winner: from_color(position.side_to_move()).opponent(),
            }),
        }
    }
}

fn parse_fen(fen: &str) -> Result<chess::Board, String> {
    chess::Board::from_str(fen.trim()).map_err(|err| format!("invalid position '{fen}': {err:?}"))
}

fn is_promotion(position: &chess::Board, from: chess::Square, to: chess::Square) -> bool {
    position.piece_on(from) == Some(chess::Piece::Pawn)
        && matches!(to.get_rank(), chess::Rank::First | chess::Rank::Eighth)
}

fn to_square(coord: Coord) -> chess::Square {
    chess::Square::make_square(
        chess::Rank::from_index(coord.row.to_zero_based().into()),
        chess::File::from_index(coord.col.to_zero_based().into()),
    )
}

fn to_piece(kind: PieceKind) -> chess::Piece {
    match kind {
        PieceKind::Pawn => chess::Piece::Pawn,
        PieceKind::Knight => chess::Piece::Knight,
        PieceKind::Bishop => chess::Piece::Bishop,
        PieceKind::Rook => chess::Piece::Rook,
        PieceKind::Queen => chess::Piece::Queen,
        PieceKind::King => chess::Piece::King,
    }
}

fn from_color(color: chess::Color) -> Side {
    match color {
        chess::Color::White => Side::White,
        chess::Color::Black => Side::Black,
    }
}
