use std::{fmt, time::Duration};

use anyhow::{anyhow, bail, Result};
use ember_board::Move;
use log::info;

use crate::search::ClockParams;

/// Usage hint for malformed `position` commands.
pub const POSITION_USAGE: &str =
    "usage: position startpos | position fen <FEN> [moves <move_1> [<move_2> ...]]";

/// Usage hint for malformed `go` commands.
pub const GO_USAGE: &str = "usage: go wtime <wtime> btime <btime> winc <winc> binc <binc>";

/// Represents an engine that has implemented the
/// [Universal Chess Interface (UCI)](https://backscattering.de/chess/uci/) protocol.
///
/// Implementing this trait requires you to implement the following methods:
///  - [`UciEngine::send_uci_response`] to deliver responses to the GUI.
///  - [`UciEngine::position`] to set the state of the game in your engine.
///  - [`UciEngine::go`] to search the previously-set position and reply with `bestmove`.
///
/// The remaining methods all have default implementations, all of which are detailed
/// in their documentation.
pub trait UciEngine {
    /// Executes the provided [`UciCommand`].
    ///
    /// This is just a convenience method that `match`es on `cmd` and calls the
    /// appropriate method.
    fn execute_uci_command(&mut self, cmd: UciCommand) -> Result<()> {
        use UciCommand::*;
        match cmd {
            Uci => self.uci(),
            Debug(status) => self.debug(status),
            IsReady => self.isready(),
            UciNewGame => self.ucinewgame(),
            Position { fen, moves } => self.position(fen, moves),
            Go(clock) => self.go(clock),
        }
    }

    /// Send a response from this engine to the GUI.
    ///
    /// Implementors decide where responses go (`stdout`, a buffer, ...). Each response must be
    /// terminated with `\n`.
    fn send_uci_response<T: fmt::Display>(&mut self, resp: UciResponse<T>) -> Result<()>;

    /******************************************************************/
    /*                  GUI to Engine communication                   */
    /******************************************************************/

    /// Called when the engine receives:
    /// ```text
    /// uci
    /// ```
    ///
    /// The engine must identify itself with `id`, then acknowledge with `uciok`.
    fn uci(&mut self) -> Result<()> {
        self.id()?;
        self.uciok()
    }

    /// Called when the engine receives:
    /// ```text
    /// debug [on | off]
    /// ```
    /// where `on = true`
    ///
    /// In debug mode the engine should send additional infos to the GUI with `info string`.
    ///
    /// # Default
    ///
    /// The default implementation of this method does nothing and returns `Ok(())`.
    fn debug(&mut self, status: bool) -> Result<()> {
        info!("using default implementation of UciEngine::debug({status:?})");
        Ok(())
    }

    /// Called when the engine receives:
    /// ```text
    /// isready
    /// ```
    ///
    /// This is used to synchronize the engine with the GUI, and is sent once before the first
    /// search so the engine can finish initializing. It must always be answered with `readyok`.
    ///
    /// # Default
    ///
    /// The default implementation of this method simply immediately sends `readyok`.
    fn isready(&mut self) -> Result<()> {
        self.readyok()
    }

    /// Called when the engine receives:
    /// ```text
    /// ucinewgame
    /// ```
    ///
    /// The next search will be from a different game.
    ///
    /// # Default
    ///
    /// The default implementation of this method does nothing and returns `Ok(())`.
    fn ucinewgame(&mut self) -> Result<()> {
        info!("using default implementation of UciEngine::ucinewgame");
        Ok(())
    }

    /// Called when the engine receives:
    /// ```text
    /// position [fen <fenstring> | startpos] [moves <move_1> [<move_2> ...]]
    /// ```
    ///
    /// Set up the position described in the FEN string (or the starting position) and play the
    /// moves on it.
    fn position(&mut self, fen: Option<String>, moves: Vec<String>) -> Result<()>;

    /// Called when the engine receives:
    /// ```text
    /// go wtime <x> btime <x> winc <x> binc <x>
    /// ```
    ///
    /// Start calculating on the current position, within a budget derived from the clock, and
    /// finish by sending `bestmove`.
    fn go(&mut self, clock: ClockParams) -> Result<()>;

    /******************************************************************/
    /*                  Engine to GUI communication                   */
    /******************************************************************/

    /// Sends
    /// ```text
    /// id name <x>
    /// id author <x>
    /// ```
    fn id(&mut self) -> Result<()> {
        let name = format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        let author = env!("CARGO_PKG_AUTHORS").replace(':', ", ");

        self.send_uci_response(UciResponse::Id { name, author })
    }

    /// Sends
    /// ```text
    /// uciok
    /// ```
    fn uciok(&mut self) -> Result<()> {
        self.send_uci_response(UciResponse::<&str>::UciOk)
    }

    /// Sends
    /// ```text
    /// readyok
    /// ```
    fn readyok(&mut self) -> Result<()> {
        self.send_uci_response(UciResponse::<&str>::ReadyOk)
    }

    /// Sends
    /// ```text
    /// bestmove <move>
    /// ```
    /// A missing move is sent as the null move, `0000`.
    fn bestmove(&mut self, bestmove: Option<Move>) -> Result<()> {
        let bestmove = bestmove
            .map(|mv| mv.to_string())
            .unwrap_or(String::from("0000"));

        self.send_uci_response(UciResponse::BestMove(bestmove))
    }

    /// Sends
    /// ```text
    /// info [depth <x>] [score cp <x>] [nodes <x>] [nps <x>] [time <x>] [string <str>] [pv <move_1> ...]
    /// ```
    fn info(&mut self, info: UciInfo) -> Result<()> {
        self.send_uci_response(UciResponse::<String>::Info(info))
    }
}

/// Commands that are sent from the GUI to your engine via `stdin`.
///
/// Each of these corresponds to a method on the [`UciEngine`] trait.
/// For example, when your engine receives `uci`, it should execute
/// [`UciEngine::uci`].
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum UciCommand {
    /// The `uci` command.
    Uci,

    /// The `debug` command.
    ///
    ///  - `on` <=> `true`
    ///  - `off` <=> `false`
    Debug(bool),

    /// The `isready` command.
    IsReady,

    /// The `ucinewgame` command.
    UciNewGame,

    /// The `position` command. A `fen` of `None` means `startpos`.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },

    /// The `go` command.
    Go(ClockParams),
}

impl UciCommand {
    /// Parse a string of input, returning a [`UciCommand`], if possible.
    ///
    /// If not possible, bails with a standard "unknown command X" message.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        // Split into the first word and the remaining arguments
        let (first, rest) = input
            .split_once(char::is_whitespace)
            .unwrap_or((input, ""));
        let rest = rest.trim();

        match first {
            "uci" => Ok(Self::Uci),
            "debug" => Self::parse_debug(rest),
            "isready" => Ok(Self::IsReady),
            "ucinewgame" => Ok(Self::UciNewGame),
            "position" => Self::parse_position(rest),
            "go" => Self::parse_go(rest),
            _ => bail!("unknown command {input:?}"),
        }
    }

    /// Attempt to parse the arguments of [`UciCommand::Debug`].
    pub fn parse_debug(args: &str) -> Result<Self> {
        // This one's simple
        match args {
            "on" => Ok(Self::Debug(true)),
            "off" => Ok(Self::Debug(false)),
            _ => bail!("usage: debug [on | off]"),
        }
    }

    /// Attempt to parse the arguments of [`UciCommand::Position`].
    ///
    /// A FEN must have exactly six fields. Moves are only checked for syntax here; legality
    /// depends on the position they are played on.
    pub fn parse_position(args: &str) -> Result<Self> {
        let (setup, moves) = match args.split_once("moves") {
            Some((setup, moves)) => (
                setup.trim(),
                moves
                    .split_ascii_whitespace()
                    .map(String::from)
                    .collect::<Vec<_>>(),
            ),
            None => (args.trim(), vec![]),
        };

        let fen = if setup == "startpos" {
            None
        } else if let Some(fen) = setup.strip_prefix("fen") {
            let fields = fen.split_ascii_whitespace().collect::<Vec<_>>();
            if fields.len() != 6 {
                bail!(
                    "expected a FEN with 6 fields, found {}\n{POSITION_USAGE}",
                    fields.len()
                );
            }
            Some(fields.join(" "))
        } else {
            bail!(POSITION_USAGE);
        };

        if let Some(invalid) = moves.iter().find(|mv| !Move::is_uci(mv)) {
            bail!("invalid move {invalid:?}\n{POSITION_USAGE}");
        }

        Ok(UciCommand::Position { fen, moves })
    }

    /// Attempt to parse the arguments of [`UciCommand::Go`].
    ///
    /// All four clock fields are required, in the order `wtime btime winc binc`.
    pub fn parse_go(args: &str) -> Result<Self> {
        // Parse a duration in milliseconds
        fn parse_duration(arg: &str, input: &str) -> Result<Duration> {
            input
                .parse()
                .map(Duration::from_millis)
                .map_err(|_| anyhow!("invalid argument for {arg}: {input:?}\n{GO_USAGE}"))
        }

        let args = args.split_ascii_whitespace().collect::<Vec<_>>();
        let &["wtime", w_time, "btime", b_time, "winc", w_inc, "binc", b_inc] = args.as_slice()
        else {
            bail!(GO_USAGE);
        };

        Ok(UciCommand::Go(ClockParams {
            w_time: parse_duration("wtime", w_time)?,
            b_time: parse_duration("btime", b_time)?,
            w_inc: parse_duration("winc", w_inc)?,
            b_inc: parse_duration("binc", b_inc)?,
        }))
    }
}

/// # Responses sent from the Engine to the GUI.
#[derive(Debug, Clone)]
pub enum UciResponse<T: fmt::Display = String> {
    /// ```text
    /// id name <x>
    /// id author <x>
    /// ```
    Id { name: T, author: T },

    /// ```text
    /// uciok
    /// ```
    UciOk,

    /// ```text
    /// readyok
    /// ```
    ReadyOk,

    /// ```text
    /// bestmove <move>
    /// ```
    BestMove(T),

    /// ```text
    /// info [depth <x>] [score cp <x>] [nodes <x>] [nps <x>] [time <x>] [string <str>] [pv <move_1> ...]
    /// ```
    Info(UciInfo),
}

impl<T: fmt::Display> fmt::Display for UciResponse<T> {
    /// Responses are formatted to display appropriately according to the UCI specifications.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id { name, author } => write!(f, "id name {name}\nid author {author}"),
            Self::UciOk => write!(f, "uciok"),
            Self::ReadyOk => write!(f, "readyok"),
            Self::BestMove(bestmove) => write!(f, "bestmove {bestmove}"),
            Self::Info(info) => write!(f, "info {info}"),
        }
    }
}

/// Represents the information this engine sends with the `info` command.
///
/// See [`UciEngine::info`] for more details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UciInfo {
    /// ```text
    /// depth <x>
    /// ```
    /// Search depth (in plies).
    pub depth: Option<String>,

    /// ```text
    /// score cp <x>
    /// ```
    /// The score from White's point of view, in centipawns.
    pub score: Option<String>,

    /// ```text
    /// nodes <x>
    /// ```
    /// `<x>` nodes searched.
    pub nodes: Option<String>,

    /// ```text
    /// nps <x>
    /// ```
    /// `<x>` nodes per second searched.
    pub nps: Option<String>,

    /// ```text
    /// time <x>
    /// ```
    /// The time searched (in ms).
    pub time: Option<String>,

    /// ```text
    /// string <str>
    /// ```
    /// Any string `str` which will be displayed by the GUI.
    pub string: Option<String>,

    /// ```text
    /// pv <move_1> [<move_2> ... <move_i>]
    /// ```
    /// The best line found.
    pub pv: Vec<String>,
}

impl UciInfo {
    /// Creates a new, empty, [`UciInfo`] struct.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `self` and adds the provided `depth` value.
    pub fn depth(mut self, depth: impl fmt::Display) -> Self {
        self.depth = Some(depth.to_string());
        self
    }

    /// Consumes `self` and adds the provided `score` value.
    pub fn score(mut self, score: impl fmt::Display) -> Self {
        self.score = Some(score.to_string());
        self
    }

    /// Consumes `self` and adds the provided `nodes` value.
    pub fn nodes(mut self, nodes: impl fmt::Display) -> Self {
        self.nodes = Some(nodes.to_string());
        self
    }

    /// Consumes `self` and adds the provided `nps` value.
    pub fn nps(mut self, nps: impl fmt::Display) -> Self {
        self.nps = Some(nps.to_string());
        self
    }

    /// Consumes `self` and adds the provided `time` value.
    pub fn time(mut self, time: impl fmt::Display) -> Self {
        self.time = Some(time.to_string());
        self
    }

    /// Consumes `self` and adds the provided `string` value.
    pub fn string(mut self, string: impl fmt::Display) -> Self {
        self.string = Some(string.to_string());
        self
    }

    /// Consumes `self` and adds the provided `pv` value.
    pub fn pv<T: fmt::Display>(mut self, pv: impl IntoIterator<Item = T>) -> Self {
        self.pv = pv.into_iter().map(|x| x.to_string()).collect();
        self
    }
}

impl fmt::Display for UciInfo {
    /// An info command will only display data that it has.
    ///
    /// Any `None` fields are not displayed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(7);

        if let Some(x) = &self.depth {
            parts.push(format!("depth {x}"));
        }
        if let Some(x) = &self.score {
            parts.push(format!("score cp {x}"));
        }
        if let Some(x) = &self.nodes {
            parts.push(format!("nodes {x}"));
        }
        if let Some(x) = &self.nps {
            parts.push(format!("nps {x}"));
        }
        if let Some(x) = &self.time {
            parts.push(format!("time {x}"));
        }
        if !self.pv.is_empty() {
            parts.push(format!("pv {}", self.pv.join(" ")));
        }
        // Everything after `string` is part of the string
        if let Some(x) = &self.string {
            parts.push(format!("string {x}"));
        }

        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DEFAULT_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn parse_simple_commands() {
        assert_eq!(UciCommand::parse("uci").unwrap(), UciCommand::Uci);
        assert_eq!(UciCommand::parse("  isready \n").unwrap(), UciCommand::IsReady);
        assert_eq!(
            UciCommand::parse("ucinewgame").unwrap(),
            UciCommand::UciNewGame
        );
        assert!(UciCommand::parse("stop").is_err());
        assert!(UciCommand::parse("gopher").is_err());
    }

    #[test]
    fn parse_debug() {
        assert_eq!(
            UciCommand::parse("debug on").unwrap(),
            UciCommand::Debug(true)
        );
        assert_eq!(
            UciCommand::parse("debug   off").unwrap(),
            UciCommand::Debug(false)
        );
        assert!(UciCommand::parse("debug maybe").is_err());
    }

    #[test]
    fn parse_position() {
        assert_eq!(
            UciCommand::parse("position startpos").unwrap(),
            UciCommand::Position {
                fen: None,
                moves: vec![],
            },
        );

        assert_eq!(
            UciCommand::parse(
                "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
            )
            .unwrap(),
            UciCommand::Position {
                fen: Some(DEFAULT_FEN.into()),
                moves: vec![],
            },
        );

        assert_eq!(
            UciCommand::parse("position startpos moves e2e4 e7e5").unwrap(),
            UciCommand::Position {
                fen: None,
                moves: vec!["e2e4".into(), "e7e5".into()],
            },
        );

        assert_eq!(UciCommand::parse(
            "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR  w KQkq -  0 1 moves e2e4 e7e5").unwrap(),
            UciCommand::Position {
                fen: Some(DEFAULT_FEN.into()),
                moves: vec!["e2e4".into(), "e7e5".into()],
            },
        );
    }

    #[test]
    fn parse_malformed_position() {
        assert!(UciCommand::parse("position").is_err());
        assert!(UciCommand::parse("position middlegame").is_err());
        assert!(UciCommand::parse("position fen 8/8/8/8/8/8/8/K6k w - -").is_err());
        assert!(UciCommand::parse("position fen").is_err());
        assert!(UciCommand::parse("position startpos moves e2e4 castle").is_err());

        let err = UciCommand::parse("position nonsense").unwrap_err();
        assert_eq!(err.to_string(), POSITION_USAGE);
    }

    #[test]
    fn parse_go() {
        assert_eq!(
            UciCommand::parse("go wtime 30000 btime 29000 winc 10 binc 42").unwrap(),
            UciCommand::Go(ClockParams {
                w_time: Duration::from_millis(30_000),
                b_time: Duration::from_millis(29_000),
                w_inc: Duration::from_millis(10),
                b_inc: Duration::from_millis(42),
            }),
        );

        assert_eq!(
            UciCommand::parse("go wtime 0 btime 0 winc 0 binc 0").unwrap(),
            UciCommand::Go(ClockParams::default()),
        );
    }

    #[test]
    fn parse_malformed_go() {
        // Missing fields, reordered fields, extra fields, bad values
        for input in [
            "go",
            "go infinite",
            "go wtime 1000 btime 1000",
            "go btime 1000 wtime 1000 winc 0 binc 0",
            "go wtime 1000 btime 1000 winc 0 binc 0 movestogo 5",
            "go wtime -5 btime 1000 winc 0 binc 0",
            "go wtime 1000 btime 1000 winc 0 binc zero",
            "go wtime 1.5 btime 1000 winc 0 binc 0",
        ] {
            let err = UciCommand::parse(input).unwrap_err();
            assert!(err.to_string().ends_with(GO_USAGE), "{input:?}: {err}");
        }
    }

    #[test]
    fn test_responses() {
        assert_eq!(UciResponse::<&str>::ReadyOk.to_string(), "readyok");
        assert_eq!(UciResponse::BestMove("e2e4").to_string(), "bestmove e2e4");
        assert_eq!(
            UciResponse::Id {
                name: "ember",
                author: "someone"
            }
            .to_string(),
            "id name ember\nid author someone"
        );
    }

    #[test]
    fn test_info() {
        let info = UciInfo::new()
            .depth(3)
            .score(-42)
            .nodes(1200)
            .nps(60000)
            .time(20)
            .pv(["e2e4", "e7e5"]);

        assert_eq!(
            UciResponse::<String>::Info(info).to_string(),
            "info depth 3 score cp -42 nodes 1200 nps 60000 time 20 pv e2e4 e7e5"
        );

        let info = UciInfo::new().string("budget 50ms");
        assert_eq!(info.to_string(), "string budget 50ms");
    }
}
