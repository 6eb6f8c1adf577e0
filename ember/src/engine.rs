use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use ember_board::{split_perft, Game, Move};
use log::{error, info, warn};

use super::{
    protocols::{UciCommand, UciEngine, UciInfo, UciResponse, POSITION_USAGE},
    search::{ClockParams, SearchBudget, SearchClock, SearchLimits, SearchOutcome, Searcher},
    Evaluator,
};

/// A chess engine responds to inputs (such as from a GUI or terminal) and
/// responds with computed outputs. The most common modern protocol is UCI.
///
/// The engine does not have a "game loop" that iterates until the game ends.
/// Rather, it holds the current state of the board and an evaluator, and waits
/// to be told to search.
///
/// Everything happens on the calling thread: a line is read, handled to completion
/// (including any search), and only then is the next line read.
///
/// Protocol responses are written to `W` (`stdout` for the binary). Diagnostics go to `stderr`.
pub struct Engine<W: Write = io::Stdout> {
    /// State of the game, including castling rights, piece placement, move history, etc.
    game: Game,

    /// Scores the leaves of every search.
    evaluator: Box<dyn Evaluator>,

    /// Whether to display additional information with `info string`.
    ///
    /// Defaults to `false`.
    debug: bool,

    /// Where responses are sent.
    out: W,
}

impl Engine<io::Stdout> {
    /// Construct a new [`Engine`] that responds over `stdout`.
    pub fn new(evaluator: Box<dyn Evaluator>) -> Self {
        Self::with_writer(evaluator, io::stdout())
    }

    /// Main entrypoint of the engine.
    ///
    /// This function launches the engine and awaits user input via `stdin`.
    pub fn run(&mut self) -> Result<()> {
        // Print some metadata about the engine
        let name = env!("CARGO_PKG_NAME");
        let version = env!("CARGO_PKG_VERSION");
        let authors = env!("CARGO_PKG_AUTHORS").replace(':', ", "); // Split multiple authors by comma-space
        writeln!(self, "{name} {version} by {authors}")?;
        info!("Starting with the {} evaluator", self.evaluator.name());

        self.run_with(io::stdin().lock())
    }
}

impl<W: Write> Engine<W> {
    /// Construct a new [`Engine`] at the starting position that responds over `out`.
    pub fn with_writer(evaluator: Box<dyn Evaluator>, out: W) -> Self {
        Self {
            game: Game::default(),
            evaluator,
            debug: false,
            out,
        }
    }

    /// The position that the next search will run on.
    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Consumes the engine, yielding its writer.
    pub fn into_writer(self) -> W {
        self.out
    }

    /// Handle commands from `input`, one line at a time, until `quit` or the end of input.
    ///
    /// Malformed or failing commands are reported on `stderr` and do not end the loop.
    pub fn run_with(&mut self, mut input: impl BufRead) -> Result<()> {
        let mut buffer = String::with_capacity(2048);

        loop {
            // Clear the buffer, read input, and trim the trailing newline
            buffer.clear();
            let bytes = input
                .read_line(&mut buffer)
                .context("Failed to read line when parsing UCI commands")?;

            // For ctrl + d
            if 0 == bytes {
                warn!("Engine received input of 0 bytes and is quitting");
                return Ok(());
            }

            // Ignore empty lines
            let buf = buffer.trim();
            if buf.is_empty() {
                continue;
            }

            // UCI protocol states to continue running when invalid input is received.
            let cmd = match Self::parse_command(buf) {
                Ok(EngineCommand::Exit) => return Ok(()),
                Ok(cmd) => cmd,
                Err(err) => {
                    eprintln!("{err:#}");
                    continue;
                }
            };

            if let Err(err) = self.execute(cmd) {
                error!("Failed to execute {buf:?}: {err:#}");
                eprintln!("{err:#}");
            }
        }
    }

    /// Executes a single [`EngineCommand`].
    pub fn execute(&mut self, cmd: EngineCommand) -> Result<()> {
        match cmd {
            EngineCommand::Help => self.help(),
            EngineCommand::Show => self.show(),
            EngineCommand::Fen => self.fen(),
            EngineCommand::Moves => self.moves(),
            EngineCommand::Perft(depth) => self.perft(depth),
            EngineCommand::Eval => self.eval(),
            EngineCommand::UciCommand(uci_cmd) => self.execute_uci_command(uci_cmd),
            EngineCommand::Exit => Ok(()),
        }
    }

    /// Parses an input string a yields an [`EngineCommand`], if possible.
    pub fn parse_command(input: &str) -> Result<EngineCommand> {
        let input = input.trim();
        let (cmd, rest) = input
            .split_once(char::is_whitespace)
            .unwrap_or((input, ""));

        match cmd {
            "help" => Ok(EngineCommand::Help),
            "d" | "show" => Ok(EngineCommand::Show),
            "fen" => Ok(EngineCommand::Fen),
            "moves" => Ok(EngineCommand::Moves),
            "perft" => Self::parse_perft_command(rest),
            "eval" => Ok(EngineCommand::Eval),
            "quit" | "exit" => Ok(EngineCommand::Exit),
            _ => UciCommand::parse(input).map(EngineCommand::UciCommand),
        }
    }

    /// Parses the custom `perft` command
    fn parse_perft_command(rest: &str) -> Result<EngineCommand> {
        let mut args = rest.split_ascii_whitespace();

        let (Some(depth), None) = (args.next(), args.next()) else {
            bail!("usage: perft <depth>");
        };

        let Ok(depth) = depth.parse() else {
            bail!("usage: perft <depth>");
        };

        Ok(EngineCommand::Perft(depth))
    }

    /// Replaces the held position with `fen` (or the starting position), after playing `moves` on it.
    ///
    /// The held position is only replaced once every step has succeeded.
    pub fn set_position<T: AsRef<str>>(&mut self, fen: Option<&str>, moves: &[T]) -> Result<()> {
        let mut game = match fen {
            Some(fen) => Game::from_fen(fen).context(POSITION_USAGE)?,
            None => Game::default(),
        };

        for mv in moves {
            let mv = Move::from_uci(&game, mv.as_ref()).context(POSITION_USAGE)?;
            game.make_move(mv);
        }

        self.game = game;
        Ok(())
    }

    /// Searches the held position within the budget `clock` allows for the side to move.
    ///
    /// An `info` line is sent after every completed depth. `started` is when the request for this
    /// search arrived, and the budget is measured from then.
    pub fn search(&mut self, clock: ClockParams, started: SearchClock) -> Result<SearchOutcome> {
        if !self.evaluator.is_ready() {
            bail!(
                "{} evaluator is not ready; send `isready` first",
                self.evaluator.name()
            );
        }

        let budget = SearchBudget::for_side(&clock, self.game.side_to_move());
        let limits = SearchLimits::with_clock(budget, started);
        info!("Searching {} for {budget}", self.game);

        // The searcher borrows the game and evaluator, so infos are written straight to `out`
        let out = &mut self.out;
        let mut nodes = 0;
        let mut sent = Ok(());
        let outcome = Searcher::new(&mut self.game, &*self.evaluator, limits).search(
            |report| {
                nodes += report.nodes;
                let elapsed = report.elapsed.as_secs_f64().max(0.001);

                let info = UciInfo::new()
                    .depth(report.depth)
                    .score(report.score.round() as i64)
                    .nodes(nodes)
                    .nps((nodes as f64 / elapsed) as u64)
                    .time(report.elapsed.as_millis())
                    .pv([report.bestmove]);

                if sent.is_ok() {
                    sent = writeln!(out, "{}", UciResponse::<String>::Info(info));
                }
            },
        );
        sent.context("Failed to send search info")?;

        if self.debug {
            let info = UciInfo::new().string(format!(
                "budget {budget} elapsed {}ms depth {} nodes {}",
                started.elapsed().as_millis(),
                outcome.depth,
                outcome.nodes
            ));
            self.info(info)?;
        }

        Ok(outcome)
    }

    /// Scores the held position, from White's point of view.
    pub fn evaluate(&self) -> Result<f32> {
        self.evaluator.score(&self.game).with_context(|| {
            format!(
                "{} evaluator could not score the position",
                self.evaluator.name()
            )
        })
    }

    /// Executes the `help` command, displaying a list of available commands this engine has.
    fn help(&mut self) -> Result<()> {
        writeln!(
            self,
            "available commands: uci, isready, ucinewgame, debug, position, go, eval, d, fen, moves, perft, help, quit"
        )?;
        Ok(())
    }

    /// Executes the `show` command, printing the current state of the board.
    fn show(&mut self) -> Result<()> {
        let shown = format!("{:?}", self.game);
        writeln!(self, "{shown}")?;
        Ok(())
    }

    /// Executes the `fen` command, displaying the current state as a FEN string.
    fn fen(&mut self) -> Result<()> {
        let fen = self.game.to_fen();
        writeln!(self, "{fen}")?;
        Ok(())
    }

    /// Executes the `moves` command, displaying all legal moves available.
    fn moves(&mut self) -> Result<()> {
        let mut moves = self
            .game
            .legal_moves()
            .into_iter()
            .map(|legal| legal.to_string())
            .collect::<Vec<_>>();
        moves.sort();
        writeln!(self, "{}", moves.join(" "))?;
        Ok(())
    }

    /// Executes the `perft` command, printing the node count below every legal move.
    pub fn perft(&mut self, depth: usize) -> Result<()> {
        let mut game = self.game.clone();
        let split = split_perft(&mut game, depth);

        let mut total = 0;
        for (mv, nodes) in split {
            writeln!(self, "{mv}: {nodes}")?;
            total += nodes;
        }
        writeln!(self, "\nNodes searched: {total}")?;
        Ok(())
    }

    /// Executes the `eval` command, printing the evaluator's score of the current position.
    fn eval(&mut self) -> Result<()> {
        let score = self.evaluate()?;
        writeln!(self, "{score}")?;
        Ok(())
    }
}

impl<W: Write> Write for Engine<W> {
    /// [`Engine`] can `write` to its writer.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Represents a custom command that can be sent to this engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCommand {
    /// For displaying the list of available commands.
    Help,

    /// Pretty-print the current state of the board.
    Show,

    /// Show the current state of of the board as a FEN string.
    Fen,

    /// Show all legal moves from the current position.
    Moves,

    /// Run a split perft at the provided depth.
    Perft(usize),

    /// Evaluates the current position.
    Eval,

    /// Wraps a [`UciCommand`], sent by a UCI-compatible GUI to the engine.
    UciCommand(UciCommand),

    /// Exit the engine as quickly as possible.
    Exit,
}

impl<W: Write> UciEngine for Engine<W> {
    fn send_uci_response<T: std::fmt::Display>(&mut self, resp: UciResponse<T>) -> Result<()> {
        writeln!(self, "{resp}").context("Failed to send UCI response")?;
        self.flush()?;
        Ok(())
    }

    /* GUI to Engine communication */

    fn debug(&mut self, status: bool) -> Result<()> {
        self.debug = status;
        Ok(())
    }

    fn isready(&mut self) -> Result<()> {
        if !self.evaluator.is_ready() {
            if let Err(err) = self.evaluator.load() {
                error!("Failed to load the {} evaluator: {err:#}", self.evaluator.name());
                eprintln!("{err:#}");
            }
        }

        self.readyok()
    }

    fn ucinewgame(&mut self) -> Result<()> {
        self.game = Game::default();
        Ok(())
    }

    fn position(&mut self, fen: Option<String>, moves: Vec<String>) -> Result<()> {
        self.set_position(fen.as_deref(), moves.as_slice())
    }

    fn go(&mut self, clock: ClockParams) -> Result<()> {
        let started = SearchClock::start();

        let outcome = self.search(clock, started)?;
        info!(
            "Search finished at depth {} after {}ms: {:?}",
            outcome.depth,
            started.elapsed().as_millis(),
            outcome.bestmove.map(|mv| mv.to_string())
        );

        self.bestmove(outcome.bestmove)
    }
}
