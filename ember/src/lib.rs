pub mod config;
pub use config::*;

pub mod engine;
pub use engine::*;

pub mod search {
    pub mod searcher;
    pub use searcher::*;

    pub mod time;
    pub use time::*;
}

pub mod eval {
    pub mod evaluator;
    pub use evaluator::*;

    pub mod network;
    pub use network::*;

    pub mod piece_square_tables;
}

/// # Universal Chess Interface (UCI)
///
/// ## Description
///
/// [Source](https://gist.github.com/aliostad/f4470274f39d29b788c1b09519e67372)
///
/// * All communication is done via standard input and output with text commands.
///
/// * The engine boots and waits for input. Anything slow to set up, such as reading a weight file,
///   is deferred until `isready`.
///
/// * All command strings the engine receives end with `\n`, and so does everything it sends.
///
/// * Arbitrary white space between tokens is allowed.
///   * Example: `debug on\n` and  `   debug     on  \n` and `\t  debug \t  \t\ton\t  \n`
///
/// * The engine never starts calculating without receiving a `go` command first.
///
/// * Before the engine is asked to search on a position, there will always be a position command
///   to tell the engine about the current position.
///
/// * Unknown or malformed commands are reported on `stderr` and otherwise ignored.
///
/// ## Move Format
/// The move format is in long algebraic notation.
///
/// A nullmove from the Engine to the GUI should be sent as `0000`.
/// Examples:  `e2e4`, `e7e5`, `e1g1` (white short castling), `e7e8q` (for promotion)
pub mod protocols {
    pub mod uci;
    pub use uci::*;
}

pub mod prelude {
    pub use crate::engine::*;
    pub use crate::eval::*;
    pub use crate::search::*;
}

pub use prelude::*;
