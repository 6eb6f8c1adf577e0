use std::{fmt, time::Duration};

use ember_board::{Color, Game, LegalMove, Move};
use log::{debug, error, warn};

use super::{SearchBudget, SearchClock};
use crate::{Evaluator, DRAW, INF, MATE, MAX_DEPTH};

/// Why a search pass ended before finishing.
#[derive(Debug)]
pub enum SearchAbort {
    /// The clock ran past the budget.
    OutOfTime,

    /// The evaluator failed to score a leaf.
    Evaluator(anyhow::Error),

    /// A position below the root had no legal moves, yet was reached without being flagged as mate or stalemate.
    NoLegalMoves(String),
}

impl fmt::Display for SearchAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfTime => write!(f, "search ran out of time"),
            Self::Evaluator(err) => write!(f, "evaluator failed: {err:#}"),
            Self::NoLegalMoves(fen) => write!(f, "unflagged position without legal moves: {fen}"),
        }
    }
}

impl std::error::Error for SearchAbort {}

/// Bounds on a single search.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SearchLimits {
    /// How long the search may think for.
    pub budget: SearchBudget,

    /// Started when the search request arrived.
    pub clock: SearchClock,

    /// Deepest iteration to run, even if time remains.
    pub max_depth: u8,
}

impl SearchLimits {
    /// Limits for a search that starts now and may think for `budget`.
    pub fn new(budget: SearchBudget) -> Self {
        Self::with_clock(budget, SearchClock::start())
    }

    /// Limits for a search whose clock was started earlier.
    pub fn with_clock(budget: SearchBudget, clock: SearchClock) -> Self {
        Self {
            budget,
            clock,
            max_depth: MAX_DEPTH,
        }
    }

    /// Consumes `self` and caps the iterations at `max_depth`.
    pub fn max_depth(mut self, max_depth: u8) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn is_expired(&self) -> bool {
        self.clock.is_expired(self.budget)
    }
}

/// What a completed depth found.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct SearchReport {
    pub depth: u8,

    /// Score of `bestmove`, from White's point of view.
    pub score: f32,

    pub bestmove: Move,

    /// Nodes visited during this depth alone.
    pub nodes: u64,

    /// Time since the search started.
    pub elapsed: Duration,
}

/// Result of an iterative deepening search.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SearchOutcome {
    /// Move to play, or `None` if the root had no legal moves.
    pub bestmove: Option<Move>,

    /// Score of the last completed depth, if any depth completed.
    pub score: Option<f32>,

    /// Deepest completed depth, or `0` if none completed.
    pub depth: u8,

    /// Nodes visited across all depths, including the interrupted one.
    pub nodes: u64,

    /// One report per completed depth, shallowest first.
    pub reports: Vec<SearchReport>,
}

/// A struct to encapsulate the logic of searching through moves for a given chess position.
///
/// The search is plain minimax with alpha-beta pruning. White maximizes, Black minimizes, and all
/// scores are from White's point of view.
pub struct Searcher<'a> {
    /// Game to search on. Left as it was found when the search returns.
    game: &'a mut Game,

    evaluator: &'a dyn Evaluator,

    limits: SearchLimits,

    /// Nodes visited so far, across all depths.
    nodes: u64,

    /// Best root move of the pass in progress.
    root_best: Option<Move>,
}

impl<'a> Searcher<'a> {
    /// Create a new search over the current position of `game`.
    pub fn new(game: &'a mut Game, evaluator: &'a dyn Evaluator, limits: SearchLimits) -> Self {
        Self {
            game,
            evaluator,
            limits,
            nodes: 0,
            root_best: None,
        }
    }

    /// Runs iterative deepening until the budget runs out or the depth limit is reached.
    ///
    /// `on_depth` is called after every completed depth. The returned move is the best move of the
    /// deepest completed depth. If not even depth 1 completed, it is the best root move the
    /// interrupted pass had found so far, or failing that the first legal move.
    pub fn search(mut self, mut on_depth: impl FnMut(&SearchReport)) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();

        let Some(first) = self.game.legal_moves().first().map(|legal| legal.mv) else {
            warn!("Asked to search {}, which has no legal moves", self.game);
            return outcome;
        };

        for depth in 1..=self.limits.max_depth {
            let nodes_before = self.nodes;

            match self.search_depth(depth) {
                Ok((score, bestmove)) => {
                    let report = SearchReport {
                        depth,
                        score,
                        bestmove: bestmove.unwrap_or(first),
                        nodes: self.nodes - nodes_before,
                        elapsed: self.limits.clock.elapsed(),
                    };
                    debug!("Completed depth {depth}: {report:?}");

                    outcome.bestmove = Some(report.bestmove);
                    outcome.score = Some(score);
                    outcome.depth = depth;
                    on_depth(&report);
                    outcome.reports.push(report);
                }

                Err(abort) => {
                    match abort {
                        SearchAbort::OutOfTime => debug!("Stopped during depth {depth}: {abort}"),
                        _ => error!("Stopped during depth {depth}: {abort}"),
                    }

                    if outcome.bestmove.is_none() {
                        outcome.bestmove = self.root_best.or(Some(first));
                    }
                    break;
                }
            }
        }

        outcome.nodes = self.nodes;
        outcome
    }

    /// Runs a single alpha-beta pass to `depth`, yielding the root score and the best root move.
    ///
    /// The move is `None` only if no root move improved on the initial bound.
    pub fn search_depth(&mut self, depth: u8) -> Result<(f32, Option<Move>), SearchAbort> {
        self.root_best = None;
        let score = self.alphabeta(depth, -INF, INF, true)?;
        Ok((score, self.root_best))
    }

    /// Minimax with alpha-beta pruning.
    ///
    /// Every move made here is unmade before the result of searching it is inspected, so the game
    /// is restored on every return path.
    fn alphabeta(
        &mut self,
        depth: u8,
        mut alpha: f32,
        mut beta: f32,
        is_root: bool,
    ) -> Result<f32, SearchAbort> {
        if self.limits.is_expired() {
            return Err(SearchAbort::OutOfTime);
        }
        self.nodes += 1;

        if depth == 0 {
            return self
                .evaluator
                .score(self.game)
                .map_err(SearchAbort::Evaluator);
        }

        let moves = self.game.legal_moves();
        if moves.is_empty() {
            return Err(SearchAbort::NoLegalMoves(self.game.to_fen()));
        }

        let maximizing = self.game.side_to_move() == Color::White;
        let mut best = if maximizing { -INF } else { INF };

        for LegalMove {
            mv,
            is_mate,
            is_stalemate,
            ..
        } in moves
        {
            let score = if is_mate {
                if maximizing {
                    MATE
                } else {
                    -MATE
                }
            } else if is_stalemate {
                DRAW
            } else {
                self.game.make_move(mv);
                let score = self.alphabeta(depth - 1, alpha, beta, false);
                self.game.unmake_move();
                score?
            };

            let improved = if maximizing {
                score > best
            } else {
                score < best
            };
            if improved {
                best = score;
                if is_root {
                    self.root_best = Some(mv);
                }
            }

            if maximizing {
                alpha = alpha.max(score);
            } else {
                beta = beta.min(score);
            }

            if beta <= alpha {
                break;
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use anyhow::{bail, Result};
    use ember_board::FEN_STARTPOS;
    use proptest::prelude::*;

    use super::*;
    use crate::MaterialEvaluator;

    const AN_HOUR: SearchBudget = SearchBudget::new(Duration::from_secs(3600));

    fn evaluator() -> MaterialEvaluator {
        let mut eval = MaterialEvaluator::new();
        eval.load().unwrap();
        eval
    }

    fn search_to_depth(fen: &str, depth: u8) -> SearchOutcome {
        let mut game = Game::from_fen(fen).unwrap();
        let eval = evaluator();
        let limits = SearchLimits::new(AN_HOUR).max_depth(depth);
        let outcome = Searcher::new(&mut game, &eval, limits).search(|_| {});
        assert_eq!(game.to_fen(), fen, "search did not restore the game");
        outcome
    }

    /// Scores every position the same.
    struct Constant(f32);

    impl Evaluator for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn load(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn score(&self, _game: &Game) -> Result<f32> {
            Ok(self.0)
        }
    }

    /// Fails on every position.
    struct Broken;

    impl Evaluator for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn load(&mut self) -> Result<()> {
            Ok(())
        }
        fn is_ready(&self) -> bool {
            true
        }
        fn score(&self, _game: &Game) -> Result<f32> {
            bail!("no scores today")
        }
    }

    /// Minimax without pruning, scoring terminal moves the same way the searcher does.
    fn minimax(game: &mut Game, eval: &dyn Evaluator, depth: u8) -> (f32, Option<Move>) {
        if depth == 0 {
            return (eval.score(game).unwrap(), None);
        }

        let maximizing = game.side_to_move() == Color::White;
        let mut best = if maximizing { -INF } else { INF };
        let mut bestmove = None;

        for legal in game.legal_moves() {
            let score = if legal.is_mate {
                if maximizing {
                    MATE
                } else {
                    -MATE
                }
            } else if legal.is_stalemate {
                DRAW
            } else {
                game.make_move(legal.mv);
                let (score, _) = minimax(game, eval, depth - 1);
                game.unmake_move();
                score
            };

            if (maximizing && score > best) || (!maximizing && score < best) {
                best = score;
                bestmove = Some(legal.mv);
            }
        }

        (best, bestmove)
    }

    #[test]
    fn test_finds_mate_in_one_for_white() {
        let outcome = search_to_depth(
            "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 4 4",
            2,
        );
        assert_eq!(outcome.bestmove.unwrap().to_string(), "f3f7");
        assert_eq!(outcome.score, Some(MATE));
        assert_eq!(outcome.depth, 2);
        assert!(outcome.reports.iter().all(|r| r.score == MATE));
    }

    #[test]
    fn test_finds_mate_in_one_for_black() {
        let outcome = search_to_depth(
            "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3 0 2",
            2,
        );
        assert_eq!(outcome.bestmove.unwrap().to_string(), "d8h4");
        assert_eq!(outcome.score, Some(-MATE));
    }

    #[test]
    fn test_stalemate_scores_zero() {
        // Qf7 stalemates, but Qf8 mates
        let mut game = Game::from_fen("7k/8/6K1/8/8/8/8/5Q2 w - - 0 1").unwrap();
        let eval = evaluator();
        let mut searcher = Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR));
        assert_eq!(searcher.search_depth(1).unwrap(), (MATE, Some(Move::parse_uci("f1f8").unwrap())));

        // Nf6 is the only stalemate, and beats every position Black is better in
        let mut game = Game::from_fen("7k/8/6K1/8/4N3/8/8/8 w - - 0 1").unwrap();
        let eval = Constant(-500.0);
        let mut searcher = Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR));
        let (score, bestmove) = searcher.search_depth(1).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(bestmove.unwrap().to_string(), "e4f6");
    }

    #[test]
    fn test_ties_keep_the_first_move() {
        let mut game = Game::default();
        let first = game.legal_moves()[0].mv;
        let eval = Constant(0.0);
        let limits = SearchLimits::new(AN_HOUR).max_depth(2);
        let outcome = Searcher::new(&mut game, &eval, limits).search(|_| {});
        assert_eq!(outcome.bestmove, Some(first));
        assert_eq!(outcome.score, Some(0.0));
    }

    #[test]
    fn test_timeout_before_depth_one_falls_back_to_first_move() {
        let mut game = Game::from_fen(FEN_STARTPOS).unwrap();
        let first = game.legal_moves()[0].mv;
        let eval = evaluator();

        let started = Instant::now()
            .checked_sub(Duration::from_millis(20))
            .unwrap();
        let limits = SearchLimits::with_clock(
            SearchBudget::new(Duration::from_millis(1)),
            SearchClock::started_at(started),
        );

        let mut reports = 0;
        let outcome = Searcher::new(&mut game, &eval, limits).search(|_| reports += 1);

        assert_eq!(reports, 0);
        assert_eq!(outcome.depth, 0);
        assert_eq!(outcome.score, None);
        assert_eq!(outcome.bestmove, Some(first));
        assert_eq!(game.to_fen(), FEN_STARTPOS);
    }

    #[test]
    fn test_evaluator_failure_is_not_a_score() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut game = Game::from_fen(fen).unwrap();
        let eval = Broken;

        let mut searcher = Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR));
        assert!(matches!(
            searcher.search_depth(2),
            Err(SearchAbort::Evaluator(_))
        ));

        let outcome =
            Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR)).search(|_| {});
        assert_eq!(outcome.depth, 0);
        assert!(outcome.bestmove.is_some());
        assert_eq!(game.to_fen(), fen);
    }

    #[test]
    fn test_no_legal_moves_at_root() {
        let outcome = search_to_depth(
            "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3",
            4,
        );
        assert_eq!(outcome, SearchOutcome::default());
    }

    #[test]
    fn test_more_time_searches_at_least_as_deep() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let eval = evaluator();

        let mut depths = Vec::new();
        for millis in [20, 400] {
            let mut game = Game::from_fen(fen).unwrap();
            let limits = SearchLimits::new(SearchBudget::new(Duration::from_millis(millis)));
            let outcome = Searcher::new(&mut game, &eval, limits).search(|_| {});

            assert!(outcome.bestmove.is_some());
            assert_eq!(game.to_fen(), fen);
            depths.push(outcome.depth);
        }

        assert!(depths[1] >= depths[0], "depths: {depths:?}");
    }

    #[test]
    fn test_reports_every_completed_depth() {
        let mut game = Game::default();
        let eval = evaluator();
        let limits = SearchLimits::new(AN_HOUR).max_depth(3);

        let mut depths = Vec::new();
        let outcome = Searcher::new(&mut game, &eval, limits).search(|r| depths.push(r.depth));

        assert_eq!(depths, [1, 2, 3]);
        assert_eq!(outcome.reports.len(), 3);
        assert_eq!(outcome.nodes, outcome.reports.iter().map(|r| r.nodes).sum::<u64>());
        assert_eq!(outcome.bestmove, Some(outcome.reports[2].bestmove));
        assert_eq!(outcome.score, Some(outcome.reports[2].score));
    }

    #[test]
    fn test_matches_minimax_on_known_positions() {
        let eval = evaluator();
        let fens = [
            FEN_STARTPOS,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR b KQkq - 4 4",
        ];

        for fen in fens {
            for depth in 1..=2 {
                let mut game = Game::from_fen(fen).unwrap();
                let expected = minimax(&mut game, &eval, depth);

                let mut searcher = Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR));
                assert_eq!(
                    searcher.search_depth(depth).unwrap(),
                    expected,
                    "depth {depth} of {fen}"
                );
                assert_eq!(game.to_fen(), fen);
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Pruning never changes the root score or the chosen move.
        #[test]
        fn prop_alphabeta_matches_minimax(
            picks in proptest::collection::vec(any::<usize>(), 0..16),
            depth in 1u8..=3,
        ) {
            let mut game = Game::default();
            for pick in picks {
                let moves = game.legal_moves();
                if moves.is_empty() {
                    break;
                }
                game.make_move(moves[pick % moves.len()].mv);
            }
            // Only positions with moves to search
            prop_assume!(!game.legal_moves().is_empty());

            let fen = game.to_fen();
            let eval = evaluator();
            let expected = minimax(&mut game, &eval, depth);

            let mut searcher = Searcher::new(&mut game, &eval, SearchLimits::new(AN_HOUR));
            let found = searcher.search_depth(depth).unwrap();

            prop_assert_eq!(found, expected);
            prop_assert_eq!(game.to_fen(), fen);
        }
    }
}
