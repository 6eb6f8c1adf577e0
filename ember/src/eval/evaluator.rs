use anyhow::{bail, Result};
use ember_board::{Color, Game, Piece};

use super::piece_square_tables::positional_eval;

/// Initial material value of all pieces of a given side (minus King)
const INITIAL_MATERIAL_VALUE: i32 = value_of(Piece::Pawn) * 8
    + value_of(Piece::Knight) * 2
    + value_of(Piece::Bishop) * 2
    + value_of(Piece::Rook) * 2
    + value_of(Piece::Queen);

/// A static scoring function for leaf positions.
///
/// Scores are in centipawns and always from White's point of view: positive is good for White,
/// negative is good for Black, regardless of whose turn it is.
pub trait Evaluator {
    /// A short name for this evaluator, for logs and `info string` output.
    fn name(&self) -> &str;

    /// Loads whatever this evaluator needs before it can score positions.
    ///
    /// Calling this again after a successful load is harmless.
    fn load(&mut self) -> Result<()>;

    /// Returns `true` once [`Evaluator::load`] has succeeded.
    fn is_ready(&self) -> bool;

    /// Scores the current position of `game`.
    ///
    /// Fails if the evaluator is not ready.
    fn score(&self, game: &Game) -> Result<f32>;
}

/// Scores positions by counting material and weighting where each piece stands.
///
/// Values and tables are from the [Simplified Evaluation Function](https://www.chessprogramming.org/Simplified_Evaluation_Function).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct MaterialEvaluator {
    loaded: bool,
}

impl MaterialEvaluator {
    /// Creates a new, unloaded, [`MaterialEvaluator`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the evaluation score for `color` only.
    pub fn compute_score_for(game: &Game, color: Color) -> f32 {
        // The King's table depends on how much material the opponent has lost
        let endgame_weight = endgame_weight(game, !color);

        game.pieces()
            .filter(|(_, c, _)| *c == color)
            .map(|(square, _, piece)| {
                let material = if piece == Piece::King {
                    0
                } else {
                    value_of(piece)
                };

                material as f32 + positional_eval(piece, square, color, endgame_weight)
            })
            .sum()
    }
}

impl Evaluator for MaterialEvaluator {
    fn name(&self) -> &str {
        "material"
    }

    fn load(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.loaded
    }

    fn score(&self, game: &Game) -> Result<f32> {
        if !self.loaded {
            bail!("model has not been loaded; send `isready` first");
        }

        let white = Self::compute_score_for(game, Color::White);
        let black = Self::compute_score_for(game, Color::Black);

        Ok(white - black)
    }
}

/// Returns a value of the provided [`Piece`].
///
/// Values are obtained from here: <https://www.chessprogramming.org/Simplified_Evaluation_Function>
pub const fn value_of(kind: Piece) -> i32 {
    match kind {
        Piece::Pawn => 100,
        Piece::Knight => 320,
        Piece::Bishop => 330,
        Piece::Rook => 500,
        Piece::Queen => 900,
        Piece::King => 20_000,
    }
}

/// Counts the material value of all pieces of the specified color.
///
/// Does NOT count the material of the King, as it cannot be removed from the board.
pub fn count_material(game: &Game, color: Color) -> i32 {
    game.pieces()
        .filter(|(_, c, piece)| *c == color && *piece != Piece::King)
        .map(|(_, _, piece)| value_of(piece))
        .sum()
}

/// Computes how much of `color`'s starting material is gone, as an `f32` in the range `[0.0, 1.0]`.
///
/// Lower numbers are closer to the beginning of the game. Higher numbers are closer to the end of the game.
///
/// The King is ignored when performing this calculation.
pub fn endgame_weight(game: &Game, color: Color) -> f32 {
    let missing = (INITIAL_MATERIAL_VALUE - count_material(game, color)).max(0);
    missing as f32 / INITIAL_MATERIAL_VALUE as f32
}

#[cfg(test)]
mod tests {
    use ember_board::FEN_STARTPOS;

    use super::*;

    fn loaded() -> MaterialEvaluator {
        let mut eval = MaterialEvaluator::new();
        eval.load().unwrap();
        eval
    }

    fn score(fen: &str) -> f32 {
        loaded().score(&Game::from_fen(fen).unwrap()).unwrap()
    }

    #[test]
    fn test_unloaded_evaluator_refuses_to_score() {
        let eval = MaterialEvaluator::new();
        assert!(!eval.is_ready());
        assert!(eval.score(&Game::default()).is_err());
        assert!(loaded().is_ready());
    }

    #[test]
    fn test_startpos_is_balanced() {
        assert_eq!(score(FEN_STARTPOS), 0.0);
        // Side to move does not change the sign
        assert_eq!(
            score("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR b KQkq - 0 1"),
            0.0
        );
    }

    #[test]
    fn test_score_is_white_relative() {
        // White is up a queen
        assert!(score("4k3/8/8/8/8/8/8/4K2Q w - - 0 1") > 800.0);
        assert!(score("4k3/8/8/8/8/8/8/4K2Q b - - 0 1") > 800.0);
        // Black is up a queen
        assert!(score("4k2q/8/8/8/8/8/8/4K3 w - - 0 1") < -800.0);
    }

    #[test]
    fn test_mirrored_positions_negate() {
        let white = score("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
        let black = score("rnbqkb1r/pppp1ppp/5n2/4p3/4P3/2N5/PPPP1PPP/R1BQKBNR b KQkq - 2 3");
        assert_eq!(white, -black);
    }

    #[test]
    fn test_endgame_weight() {
        let game = Game::default();
        assert_eq!(endgame_weight(&game, Color::White), 0.0);

        let game = Game::from_fen("4k3/8/8/8/8/8/8/4K2Q w - - 0 1").unwrap();
        assert_eq!(endgame_weight(&game, Color::Black), 1.0);
        assert!(endgame_weight(&game, Color::White) > 0.0);
    }
}
