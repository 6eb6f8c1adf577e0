/// Larger than any score a search can produce.
pub const INF: f32 = f32::INFINITY;

/// Score of a checkmate delivered by White, in centipawns. Black's checkmates score `-MATE`.
///
/// Mates are not distinguished by distance.
pub const MATE: f32 = 10_000.0;

/// Score of a stalemate.
pub const DRAW: f32 = 0.0;

/// Maximum depth that can be searched.
pub const MAX_DEPTH: u8 = u8::MAX;

/// The remaining clock time is split as if this many moves are still to be played.
pub const MOVES_TO_GO: f64 = 40.0;

/// Share of the increment added to each move's think time, when the clock allows it.
pub const INCREMENT_SHARE: f64 = 0.8;

/// Never think for less than this many milliseconds.
pub const MIN_THINK_TIME_MS: f64 = 50.0;

/// Never think for less than this fraction of the remaining clock time.
pub const MIN_THINK_FRACTION: f64 = 0.25;
