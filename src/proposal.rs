use serde::Deserialize;

use crate::coord::Coord;
use crate::error::ProposalError;
use crate::piece::PieceKind;


// A move as submitted by a client: `{ "from": "e7", "to": "e8", "promotion": "q" }`.
//
// Nothing is known about legality at this point, only that both squares exist and the
// promotion letter (if any) names a piece one can promote to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MoveProposal {
    pub from: Coord,
    pub to: Coord,
    pub promotion: Option<PieceKind>,
}

#[derive(Deserialize)]
struct RawMoveProposal {
    from: String,
    to: String,
    #[serde(default)]
    promotion: Option<String>,
}

impl MoveProposal {
    pub fn new(from: Coord, to: Coord) -> Self { MoveProposal { from, to, promotion: None } }

    pub fn with_promotion(self, promotion: PieceKind) -> Self {
        MoveProposal { promotion: Some(promotion), ..self }
    }

    pub fn from_algebraic(from: &str, to: &str) -> Option<Self> {
        Some(Self::new(Coord::from_algebraic(from)?, Coord::from_algebraic(to)?))
    }

    pub fn from_json(payload: &serde_json::Value) -> Result<Self, ProposalError> {
        let raw = RawMoveProposal::deserialize(payload)
            .map_err(|err| ProposalError::MalformedProposal(err.to_string()))?;
        let parse_square = |s: &str| {
            Coord::from_algebraic(s).ok_or_else(|| {
                ProposalError::MalformedProposal(format!("'{s}' is not a square"))
            })
        };
        let promotion = match raw.promotion {
            None => None,
            Some(p) => Some(PieceKind::from_promotion(&p).ok_or_else(|| {
                ProposalError::MalformedProposal(format!("cannot promote to '{p}'"))
            })?),
        };
        Ok(MoveProposal {
            from: parse_square(&raw.from)?,
            to: parse_square(&raw.to)?,
            promotion,
        })
    }
}
