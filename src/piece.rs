use strum::EnumIter;

use crate::util::as_single_char;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    // Lowercase letter, as used for promotion targets in `{from, to, promotion}` moves.
    pub fn to_algebraic_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    pub fn can_promote_to(self) -> bool {
        use PieceKind::*;
        match self {
            Pawn | King => false,
            Knight | Bishop | Rook | Queen => true,
        }
    }

    pub fn from_promotion_char(notation: char) -> Option<Self> {
        let kind = match notation {
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            _ => return None,
        };
        debug_assert!(kind.can_promote_to());
        Some(kind)
    }

    pub fn from_promotion(notation: &str) -> Option<Self> {
        as_single_char(notation).and_then(Self::from_promotion_char)
    }
}
