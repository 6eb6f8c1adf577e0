use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};
use chess::{Board, BoardStatus, MoveGen};

use super::{
    moves::piece_char, Color, File, LegalMove, Move, MoveList, Piece, Rank, Square, ALL_SQUARES,
};

/// Everything needed to take back one move.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    board: Board,
    ep_square: Option<Square>,
    halfmove: usize,
    fullmove: usize,
    mv: Move,
}

/// The state of a chess game: the current position, its move counters, and the moves that led to it.
///
/// Move generation is delegated to the [`chess`] crate. The FEN-only fields (the en passant target as
/// written in FEN, and the move counters) are tracked here so that positions round-trip through FEN
/// exactly, and every [`Game::make_move`] can be undone by [`Game::unmake_move`].
#[derive(Clone, PartialEq, Eq)]
pub struct Game {
    /// Piece placement, side to move, and castling rights.
    board: Board,

    /// En passant target square as it appears in FEN.
    ///
    /// Set after every double pawn push, whether or not a capture is possible.
    ep_square: Option<Square>,

    /// Used to enforce the fifty-move rule.
    /// - Incremented after each move.
    /// - Reset after a capture or a pawn moves.
    halfmove: usize,

    /// Number of moves since the beginning of the game.
    /// A fullmove is a complete turn by white and then by black.
    fullmove: usize,

    history: Vec<Snapshot>,
}

impl Game {
    /// Creates a new [`Game`] from the provided FEN string.
    ///
    /// All six fields are required. Runs of whitespace between fields are accepted.
    ///
    /// # Example
    /// ```
    /// # use ember_board::Game;
    /// let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    /// let game = Game::from_fen(fen).unwrap();
    /// assert_eq!(game.to_fen(), fen);
    /// assert!(Game::from_fen("8/8/8/8/8/8/8/8 w - -").is_err());
    /// ```
    pub fn from_fen(fen: &str) -> Result<Self> {
        let fields = fen.split_ascii_whitespace().collect::<Vec<_>>();
        let &[placements, active_color, castling, en_passant_target, halfmove, fullmove] =
            fields.as_slice()
        else {
            bail!(
                "Invalid FEN string {fen:?}: expected 6 fields, found {}",
                fields.len()
            );
        };

        validate_placements(placements)?;

        if !matches!(active_color, "w" | "b") {
            bail!("Invalid FEN string: active color must be `w` or `b`. Got {active_color:?}");
        }

        if castling != "-"
            && (castling.is_empty()
                || !castling.chars().all(|c| "KQkq".contains(c))
                || castling.chars().enumerate().any(|(i, c)| castling[i + 1..].contains(c)))
        {
            bail!("Invalid FEN string: castling rights must be `-` or a subset of `KQkq`. Got {castling:?}");
        }

        let ep_square = match en_passant_target {
            "-" => None,
            square => {
                let square = Square::from_str(square).map_err(|_| {
                    anyhow!("Invalid FEN string: invalid en passant target {square:?}")
                })?;
                if !matches!(square.get_rank(), Rank::Third | Rank::Sixth) {
                    bail!("Invalid FEN string: en passant target {square} must be on the third or sixth rank");
                }
                Some(square)
            }
        };

        let halfmove = halfmove.parse().map_err(|_| {
            anyhow!("Invalid FEN string: FEN string must have valid halfmove counter. Got {halfmove}")
        })?;

        let fullmove = fullmove.parse().map_err(|_| {
            anyhow!("Invalid FEN string: FEN string must have valid fullmove counter. Got {fullmove}")
        })?;

        let board = Board::from_str(&fields.join(" "))
            .map_err(|err| anyhow!("Invalid FEN string {fen:?}: {err:?}"))?;

        Ok(Self {
            board,
            ep_square,
            halfmove,
            fullmove,
            history: Vec::with_capacity(128),
        })
    }

    /// Generates a FEN string of the current position.
    pub fn to_fen(&self) -> String {
        let mut placements = String::with_capacity(72);
        for rank in (0..8).rev() {
            let mut empty = 0;

            for file in 0..8 {
                let square = Square::make_square(Rank::from_index(rank), File::from_index(file));

                if let Some((color, piece)) = self.piece_at(square) {
                    if empty > 0 {
                        placements += &empty.to_string();
                        empty = 0;
                    }
                    placements.push(fen_char(color, piece));
                } else {
                    empty += 1;
                }
            }

            if empty > 0 {
                placements += &empty.to_string();
            }
            if rank > 0 {
                placements.push('/');
            }
        }

        let active_color = match self.side_to_move() {
            Color::White => 'w',
            Color::Black => 'b',
        };

        let en_passant_target = self
            .ep_square
            .map(|square| square.to_string())
            .unwrap_or(String::from("-"));

        format!(
            "{placements} {active_color} {} {en_passant_target} {} {}",
            self.castling_rights(),
            self.halfmove,
            self.fullmove
        )
    }

    /// Returns the current player as a [`Color`].
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Castling rights of both players, in FEN form (`KQkq`, `Kq`, `-`, ...).
    pub fn castling_rights(&self) -> String {
        let mut rights = String::with_capacity(4);
        for (color, kingside, queenside) in [(Color::White, 'K', 'Q'), (Color::Black, 'k', 'q')] {
            let castle_rights = self.board.castle_rights(color);
            if castle_rights.has_kingside() {
                rights.push(kingside);
            }
            if castle_rights.has_queenside() {
                rights.push(queenside);
            }
        }

        if rights.is_empty() {
            rights.push('-');
        }
        rights
    }

    /// The en passant target square, as it would be written in FEN.
    pub fn ep_square(&self) -> Option<Square> {
        self.ep_square
    }

    /// Returns the half-move counter of the current position.
    pub fn halfmove(&self) -> usize {
        self.halfmove
    }

    /// Returns the full-move counter of the current position.
    pub fn fullmove(&self) -> usize {
        self.fullmove
    }

    /// Number of moves made on this [`Game`] that can still be unmade.
    pub fn ply(&self) -> usize {
        self.history.len()
    }

    /// The moves made on this [`Game`] so far, oldest first.
    pub fn played_moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.history.iter().map(|snapshot| snapshot.mv)
    }

    /// Fetches the color and kind of the piece on `square`, if there is one.
    pub fn piece_at(&self, square: Square) -> Option<(Color, Piece)> {
        Some((self.board.color_on(square)?, self.board.piece_on(square)?))
    }

    /// Iterates over every occupied square, from a1 to h8.
    pub fn pieces(&self) -> impl Iterator<Item = (Square, Color, Piece)> + '_ {
        ALL_SQUARES.into_iter().filter_map(|square| {
            self.piece_at(square)
                .map(|(color, piece)| (square, color, piece))
        })
    }

    /// Returns `true` if the side to move is in check.
    pub fn is_in_check(&self) -> bool {
        self.board.checkers().popcnt() > 0
    }

    /// Generates all legal moves in the current position, flagged with their effect on the opponent.
    ///
    /// The order is deterministic for a given position.
    pub fn legal_moves(&self) -> MoveList {
        let mut moves = MoveList::new();

        for mv in MoveGen::new_legal(&self.board) {
            let child = self.board.make_move_new(mv);
            let status = child.status();

            moves.push(LegalMove {
                mv: mv.into(),
                is_check: child.checkers().popcnt() > 0,
                is_mate: matches!(status, BoardStatus::Checkmate),
                is_stalemate: matches!(status, BoardStatus::Stalemate),
            });
        }

        moves
    }

    /// Generates all legal moves in the current position, without flags.
    ///
    /// Cheaper than [`Game::legal_moves`], for when only the moves themselves are needed.
    pub fn moves(&self) -> impl Iterator<Item = Move> {
        MoveGen::new_legal(&self.board).map(|mv| -> Move { mv.into() })
    }

    /// Returns `true` if `mv` is legal in the current position.
    pub fn is_legal(&self, mv: Move) -> bool {
        self.board.legal(mv.inner())
    }

    /// Applies the move, if it is legal to make. If it is not legal, returns an `Err` explaining why.
    pub fn make_move_checked(&mut self, mv: Move) -> Result<()> {
        if !self.is_legal(mv) {
            bail!("Illegal move {mv} in position {self}");
        }

        self.make_move(mv);
        Ok(())
    }

    /// Applies the provided [`Move`]. No enforcement of legality.
    pub fn make_move(&mut self, mv: Move) {
        let (from, to) = (mv.from(), mv.to());
        let is_pawn = self.board.piece_on(from) == Some(Piece::Pawn);
        let is_capture = self.board.piece_on(to).is_some();
        let side = self.side_to_move();

        self.history.push(Snapshot {
            board: self.board,
            ep_square: self.ep_square,
            halfmove: self.halfmove,
            fullmove: self.fullmove,
            mv,
        });

        self.board = self.board.make_move_new(mv.inner());

        self.halfmove = if is_pawn || is_capture {
            0
        } else {
            self.halfmove + 1
        };

        if side == Color::Black {
            self.fullmove += 1;
        }

        let (from_rank, to_rank) = (from.get_rank().to_index(), to.get_rank().to_index());
        self.ep_square = (is_pawn && from_rank.abs_diff(to_rank) == 2).then(|| {
            Square::make_square(Rank::from_index((from_rank + to_rank) / 2), from.get_file())
        });
    }

    /// Takes back the most recent move, returning it. Returns `None` if no moves have been made.
    pub fn unmake_move(&mut self) -> Option<Move> {
        let snapshot = self.history.pop()?;

        self.board = snapshot.board;
        self.ep_square = snapshot.ep_square;
        self.halfmove = snapshot.halfmove;
        self.fullmove = snapshot.fullmove;

        Some(snapshot.mv)
    }
}

impl Default for Game {
    /// The standard starting position.
    fn default() -> Self {
        Self {
            board: Board::default(),
            ep_square: None,
            halfmove: 0,
            fullmove: 1,
            history: Vec::with_capacity(128),
        }
    }
}

impl FromStr for Game {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_fen(s)
    }
}

impl fmt::Display for Game {
    /// Display this game's FEN string
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ep = self
            .ep_square
            .map(|square| square.to_string())
            .unwrap_or(String::from("-"));
        let side = match self.side_to_move() {
            Color::White => "White",
            Color::Black => "Black",
        };

        let mut board_str = String::with_capacity(512);
        for rank in (0..8).rev() {
            board_str += &format!("{}|", rank + 1);
            for file in 0..8 {
                let square = Square::make_square(Rank::from_index(rank), File::from_index(file));
                let piece_char = self
                    .piece_at(square)
                    .map(|(color, piece)| fen_char(color, piece))
                    .unwrap_or('.');
                board_str += &format!(" {piece_char}");
            }

            match rank {
                6 => board_str += &format!("           FEN: {}", self.to_fen()),
                5 => board_str += &format!("          Side: {side}"),
                4 => board_str += &format!("      Castling: {}", self.castling_rights()),
                3 => board_str += &format!("            EP: {ep}"),
                2 => board_str += &format!("     Half-move: {}", self.halfmove),
                1 => board_str += &format!("     Full-move: {}", self.fullmove),
                _ => {}
            }
            board_str += "\n";
        }
        board_str += " +----------------\n   a b c d e f g h";

        write!(f, "{board_str}")
    }
}

/// Checks that the piece placement field describes exactly 8 ranks of 8 squares, with one king per
/// side and no pawns on the first or eighth rank.
///
/// The move generator assumes both kings are on the board, so positions without them must never
/// reach it.
fn validate_placements(placements: &str) -> Result<()> {
    let ranks = placements.split('/').collect::<Vec<_>>();
    if ranks.len() != 8 {
        bail!("Invalid FEN string: piece placements must have 8 ranks. Got {placements:?}");
    }

    for (color, king) in [("white", 'K'), ("black", 'k')] {
        let kings = placements.chars().filter(|c| *c == king).count();
        if kings != 1 {
            bail!("Invalid FEN string: expected exactly one {color} king, found {kings}");
        }
    }

    if [ranks[0], ranks[7]].iter().any(|rank| rank.contains(['p', 'P'])) {
        bail!("Invalid FEN string: pawns cannot stand on the first or eighth rank");
    }

    for rank in ranks {
        let mut files = 0;
        for c in rank.chars() {
            files += match c {
                '1'..='8' => c as usize - '0' as usize,
                'p' | 'n' | 'b' | 'r' | 'q' | 'k' | 'P' | 'N' | 'B' | 'R' | 'Q' | 'K' => 1,
                _ => bail!("Invalid FEN string: invalid character {c:?} in piece placements"),
            };
        }

        if files != 8 {
            bail!("Invalid FEN string: rank {rank:?} does not describe 8 squares");
        }
    }

    Ok(())
}

/// The FEN character for a piece: uppercase for White, lowercase for Black.
fn fen_char(color: Color, piece: Piece) -> char {
    let c = piece_char(piece);
    match color {
        Color::White => c.to_ascii_uppercase(),
        Color::Black => c,
    }
}
