/// High-level abstraction of the game of chess: the current position, its FEN bookkeeping, and a move history.
///
/// You probably want to look here.
pub mod game;
/// Enums and structs for modeling the movement of a piece on a chessboard.
pub mod moves;
/// Utility functions for performance testing.
pub mod perft;

pub use game::*;
pub use moves::*;
pub use perft::*;

/// Board primitives from the underlying move generator that appear in this crate's API.
pub use chess::{Color, File, Piece, Rank, Square, ALL_SQUARES};

/// FEN string for the starting position of chess.
pub const FEN_STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Maximum possible number of legal moves in any reachable position.
pub const MAX_NUM_MOVES: usize = 218;
