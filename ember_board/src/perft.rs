use super::{Game, Move};

/// Counts the leaf nodes of the legal move tree of `game` to the given `depth`.
///
/// Internally uses bulk counting. `game` is restored before this returns.
///
/// # Example
/// ```
/// # use ember_board::{perft, Game};
/// let mut game = Game::default();
/// assert_eq!(perft(&mut game, 3), 8_902);
/// ```
pub fn perft(game: &mut Game, depth: usize) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = game.moves();

    // No need to make every move at depth 1; just count them.
    if depth == 1 {
        return moves.count() as u64;
    }

    let mut nodes = 0;
    for mv in moves.collect::<Vec<_>>() {
        game.make_move(mv);
        nodes += perft(game, depth - 1);
        game.unmake_move();
    }

    nodes
}

/// Like [`perft`], but reports the node count below each root move separately, in generation order.
pub fn split_perft(game: &mut Game, depth: usize) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }

    let moves = game.moves().collect::<Vec<_>>();
    moves
        .into_iter()
        .map(|mv| {
            game.make_move(mv);
            let nodes = perft(game, depth - 1);
            game.unmake_move();
            (mv, nodes)
        })
        .collect()
}
