use std::fmt;

use ember_board::{Color, Piece, Square};

#[rustfmt::skip]
const PAWNS: Psq = Psq([
    0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
    5,  5, 10, 25, 25, 10,  5,  5,
    0,  0,  0, 20, 20,  0,  0,  0,
    5, -5,-10,  0,  0,-10, -5,  5,
    5, 10, 10,-20,-20, 10, 10,  5,
    0,  0,  0,  0,  0,  0,  0,  0
]);

#[rustfmt::skip]
const KNIGHTS: Psq = Psq([
    -50,-40,-30,-30,-30,-30,-40,-50,
    -40,-20,  0,  0,  0,  0,-20,-40,
    -30,  0, 10, 15, 15, 10,  0,-30,
    -30,  5, 15, 20, 20, 15,  5,-30,
    -30,  0, 15, 20, 20, 15,  0,-30,
    -30,  5, 10, 15, 15, 10,  5,-30,
    -40,-20,  0,  5,  5,  0,-20,-40,
    -50,-40,-30,-30,-30,-30,-40,-50,
]);

#[rustfmt::skip]
const BISHOPS: Psq = Psq([
    -20,-10,-10,-10,-10,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5, 10, 10,  5,  0,-10,
    -10,  5,  5, 10, 10,  5,  5,-10,
    -10,  0, 10, 10, 10, 10,  0,-10,
    -10, 10, 10, 10, 10, 10, 10,-10,
    -10,  5,  0,  0,  0,  0,  5,-10,
    -20,-10,-10,-10,-10,-10,-10,-20,
]);

#[rustfmt::skip]
const ROOKS: Psq = Psq([
    0,  0,  0,  0,  0,  0,  0,  0,
    5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    0,  0,  0,  5,  5,  0,  0,  0
]);

#[rustfmt::skip]
const QUEENS: Psq = Psq([
    -20,-10,-10, -5, -5,-10,-10,-20,
    -10,  0,  0,  0,  0,  0,  0,-10,
    -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
    0,  0,  5,  5,  5,  5,  0, -5,
    -10,  5,  5,  5,  5,  5,  0,-10,
    -10,  0,  5,  0,  0,  0,  0,-10,
    -20,-10,-10, -5, -5,-10,-10,-20
]);

#[rustfmt::skip]
const KING_MG: Psq = Psq([
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -30,-40,-40,-50,-50,-40,-40,-30,
    -20,-30,-30,-40,-40,-30,-30,-20,
    -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20
]);

#[rustfmt::skip]
const KING_EG: Psq = Psq([
    -50,-40,-30,-20,-20,-30,-40,-50,
    -30,-20,-10,  0,  0,-10,-20,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 30, 40, 40, 30,-10,-30,
    -30,-10, 20, 30, 30, 20,-10,-30,
    -30,-30,  0,  0,  0,  0,-30,-30,
    -50,-30,-30,-30,-30,-30,-30,-50
]);

/// A [Piece-Square Table](https://www.chessprogramming.org/Piece-Square_Tables) for weighting locations on the board.
///
/// Tables are written as White sees the board: the first row in code is the eighth rank.
#[derive(PartialEq, Eq, Debug)]
struct Psq([i32; 64]);

impl Psq {
    /// Fetches the entry for a piece of `color` standing on `square`.
    fn get_relative(&self, square: Square, color: Color) -> i32 {
        let index = square.to_index();
        match color {
            // a1 is index 0, but is written in the last row
            Color::White => self.0[index ^ 56],
            Color::Black => self.0[index],
        }
    }
}

impl fmt::Display for Psq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pst = String::with_capacity(278);

        for (i, row) in self.0.chunks(8).enumerate() {
            pst += &format!("{}| ", 8 - i);
            for entry in row {
                pst += &format!("{entry:3} ");
            }
            pst += "\n";
        }
        pst += " +--------------------------------\n    a   b   c   d   e   f   g   h";

        write!(f, "{pst}")
    }
}

/// Positional bonus of a `piece` of `color` on `square`.
///
/// `endgame_weight` is in `[0.0, 1.0]` and blends the King's middlegame table into its endgame table.
pub fn positional_eval(piece: Piece, square: Square, color: Color, endgame_weight: f32) -> f32 {
    let table = match piece {
        Piece::Pawn => &PAWNS,
        Piece::Knight => &KNIGHTS,
        Piece::Bishop => &BISHOPS,
        Piece::Rook => &ROOKS,
        Piece::Queen => &QUEENS,
        Piece::King => {
            let mg = KING_MG.get_relative(square, color) as f32;
            let eg = KING_EG.get_relative(square, color) as f32;
            return mg * (1.0 - endgame_weight) + eg * endgame_weight;
        }
    };

    table.get_relative(square, color) as f32
}
