//! Static position evaluation

use std::fmt;
use std::ops::{Neg, Sub};

use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Color, Position, Role, Square};

const CENTER: [Square; 4] = [Square::D4, Square::E4, Square::D5, Square::E5];
const CENTER_BONUS: i32 = 10;
const CHECK_PENALTY: i32 = 50;

/// Evaluation in centipawns. Positive favours White regardless of who is to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(i32);

impl Score {
    pub const ZERO: Score = Score(0);

    pub fn from_centipawns(cp: i32) -> Self {
        Score(cp)
    }

    pub fn centipawns(self) -> i32 {
        self.0
    }

    pub fn as_pawns(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// The score seen from `side`'s point of view
    pub fn for_side(self, side: Color) -> Score {
        match side {
            Color::White => self,
            Color::Black => -self,
        }
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        Score(-self.0)
    }
}

impl Sub for Score {
    type Output = Score;

    fn sub(self, rhs: Score) -> Score {
        Score(self.0 - rhs.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pawns = self.as_pawns();
        if pawns >= 0.0 {
            write!(f, "+{:.2}", pawns)
        } else {
            write!(f, "{:.2}", pawns)
        }
    }
}

pub fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 100,
        Role::Knight => 300,
        Role::Bishop => 300,
        Role::Rook => 500,
        Role::Queen => 900,
        Role::King => 0,
    }
}

/// Material plus small check and centre terms.
///
/// Being in check costs the side to move half a pawn; each occupied centre
/// square is worth a tenth of a pawn to its occupant.
pub fn evaluate(position: &Chess) -> Score {
    let board = position.board();
    let mut cp = 0;

    for square in board.occupied() {
        if let Some(piece) = board.piece_at(square) {
            cp += sign(piece.color) * piece_value(piece.role);
        }
    }

    if position.is_check() {
        cp -= sign(position.turn()) * CHECK_PENALTY;
    }

    for square in CENTER {
        if let Some(piece) = board.piece_at(square) {
            cp += sign(piece.color) * CENTER_BONUS;
        }
    }

    Score(cp)
}

fn sign(color: Color) -> i32 {
    match color {
        Color::White => 1,
        Color::Black => -1,
    }
}
