use std::fmt;

use anyhow::{anyhow, bail, Result};
use arrayvec::ArrayVec;
use chess::ChessMove;

use super::{File, Game, Piece, Rank, Square, MAX_NUM_MOVES};

/// A list of [`LegalMove`]s, sized to hold every move of any reachable position.
pub type MoveList = ArrayVec<LegalMove, MAX_NUM_MOVES>;

/// Represents a move made on a chess board: a source [`Square`], a destination [`Square`], and an optional promotion.
///
/// Castling is encoded as the king's two-square move (`e1g1`), en passant as the pawn's diagonal move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Move(ChessMove);

impl Move {
    /// The [`Square`] this move starts from.
    pub fn from(&self) -> Square {
        self.0.get_source()
    }

    /// The [`Square`] this move ends on.
    pub fn to(&self) -> Square {
        self.0.get_dest()
    }

    /// The piece a pawn is promoted to, if this is a promotion.
    pub fn promotion(&self) -> Option<Piece> {
        self.0.get_promotion()
    }

    /// Returns `true` if `input` is syntactically a move in long algebraic notation (`e2e4`, `e7e8q`).
    ///
    /// This says nothing about whether the move is legal in any position.
    ///
    /// # Example
    /// ```
    /// # use ember_board::Move;
    /// assert!(Move::is_uci("b7c8n"));
    /// assert!(!Move::is_uci("e2e9"));
    /// assert!(!Move::is_uci("0000"));
    /// ```
    pub fn is_uci(input: &str) -> bool {
        Self::parse_uci(input).is_ok()
    }

    /// Parses `input` into a [`Move`] without consulting any position.
    pub fn parse_uci(input: &str) -> Result<Self> {
        let too_short = || anyhow!("Invalid move {input:?}: expected at least 4 characters");
        let from = input.get(0..2).ok_or_else(too_short)?;
        let to = input.get(2..4).ok_or_else(too_short)?;
        let promotion = input.get(4..).unwrap_or_default();

        let promotion = match promotion {
            "" => None,
            "n" | "N" => Some(Piece::Knight),
            "b" | "B" => Some(Piece::Bishop),
            "r" | "R" => Some(Piece::Rook),
            "q" | "Q" => Some(Piece::Queen),
            _ => bail!("Invalid move {input:?}: invalid promotion {promotion:?}"),
        };

        Ok(Self(ChessMove::new(parse_square(from)?, parse_square(to)?, promotion)))
    }

    /// Parses `input` as a move in the context of `game`, failing if it is not legal there.
    ///
    /// # Example
    /// ```
    /// # use ember_board::{Game, Move};
    /// let game = Game::default();
    /// let mv = Move::from_uci(&game, "e2e4").unwrap();
    /// assert_eq!(mv.to_string(), "e2e4");
    /// assert!(Move::from_uci(&game, "e2e5").is_err());
    /// ```
    pub fn from_uci(game: &Game, input: &str) -> Result<Self> {
        let mv = Self::parse_uci(input)?;

        if !game.is_legal(mv) {
            bail!("Illegal move {input:?} in position {game}");
        }

        Ok(mv)
    }

    /// Accesses the underlying move generator's representation of this move.
    pub(crate) fn inner(&self) -> ChessMove {
        self.0
    }
}

impl From<ChessMove> for Move {
    fn from(mv: ChessMove) -> Self {
        Self(mv)
    }
}

impl fmt::Display for Move {
    /// Displays this move in long algebraic notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from(), self.to())?;

        if let Some(promotion) = self.promotion() {
            write!(f, "{}", piece_char(promotion))?;
        }

        Ok(())
    }
}

/// A [`Move`] as produced by move generation, tagged with what it does to the opponent.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LegalMove {
    pub mv: Move,

    /// The opponent is in check after this move.
    pub is_check: bool,

    /// The opponent is checkmated by this move.
    pub is_mate: bool,

    /// The opponent has no legal moves after this move, but is not in check.
    pub is_stalemate: bool,
}

impl fmt::Display for LegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.is_mate {
            "#"
        } else if self.is_check {
            "+"
        } else {
            ""
        };

        write!(f, "{}{suffix}", self.mv)
    }
}

/// Parses a square in the form `e4`.
fn parse_square(input: &str) -> Result<Square> {
    let &[file @ b'a'..=b'h', rank @ b'1'..=b'8'] = input.as_bytes() else {
        bail!("Invalid square {input:?}: must be a file `a`-`h` followed by a rank `1`-`8`");
    };

    Ok(Square::make_square(
        Rank::from_index((rank - b'1') as usize),
        File::from_index((file - b'a') as usize),
    ))
}

/// The lowercase character for a piece kind, as used in FEN and move text.
pub(crate) fn piece_char(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}
