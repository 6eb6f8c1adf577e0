use std::{
    fs::File,
    io::{BufReader, Read, Write},
    path::PathBuf,
};

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use ember_board::{Color, Game, Piece};
use log::info;

use super::Evaluator;

/// Number of piece planes in the network input.
pub const NUM_PLANES: usize = 6;

/// Number of network inputs: one 8x8 plane per piece kind.
pub const NUM_INPUTS: usize = NUM_PLANES * 64;

/// Magic bytes at the start of every weight file.
pub const WEIGHTS_MAGIC: [u8; 4] = *b"EMBR";

/// Hidden layers wider than this are rejected as a corrupt file.
const MAX_HIDDEN: usize = 1 << 16;

/// Index of `piece`'s plane. Planes are ordered pawn, rook, knight, bishop, queen, king.
const fn plane_of(piece: Piece) -> usize {
    match piece {
        Piece::Pawn => 0,
        Piece::Rook => 1,
        Piece::Knight => 2,
        Piece::Bishop => 3,
        Piece::Queen => 4,
        Piece::King => 5,
    }
}

/// Encodes the pieces of `game` as [`NUM_PLANES`] planes of 8x8 squares.
///
/// Within a plane, rows run from the eighth rank down to the first and columns from the a-file to
/// the h-file. White pieces are `1.0`, Black pieces are `-1.0`, and empty squares are `0.0`.
pub fn encode_planes(game: &Game) -> [f32; NUM_INPUTS] {
    let mut planes = [0.0; NUM_INPUTS];

    for (square, color, piece) in game.pieces() {
        let row = 7 - square.get_rank().to_index();
        let col = square.get_file().to_index();

        planes[plane_of(piece) * 64 + row * 8 + col] = match color {
            Color::White => 1.0,
            Color::Black => -1.0,
        };
    }

    planes
}

/// The [SELU](https://arxiv.org/abs/1706.02515) activation function.
fn selu(x: f32) -> f32 {
    const ALPHA: f32 = 1.673_263_2;
    const SCALE: f32 = 1.050_701;

    if x > 0.0 {
        SCALE * x
    } else {
        SCALE * ALPHA * x.exp_m1()
    }
}

/// A fully connected network with one SELU hidden layer and a single linear output.
///
/// This is a simplification. It reads the same plane encoding as a convolutional evaluator (two
/// convolutions with batch normalization, then four SELU dense layers), but it is not that
/// architecture and cannot load its weights.
///
/// # Weight file format
///
/// All values are little-endian.
///
/// | field | type | count |
/// |---|---|---|
/// | magic `EMBR` | bytes | 4 |
/// | hidden width `h` | `u32` | 1 |
/// | hidden weights, row-major per hidden unit | `f32` | `h * 384` |
/// | hidden biases | `f32` | `h` |
/// | output weights | `f32` | `h` |
/// | output bias | `f32` | 1 |
#[derive(Clone, PartialEq, Debug)]
pub struct Network {
    hidden_weights: Vec<f32>,
    hidden_biases: Vec<f32>,
    output_weights: Vec<f32>,
    output_bias: f32,
}

impl Network {
    /// Creates a network from its parameters, checking that their sizes agree.
    pub fn new(
        hidden_weights: Vec<f32>,
        hidden_biases: Vec<f32>,
        output_weights: Vec<f32>,
        output_bias: f32,
    ) -> Result<Self> {
        let hidden = hidden_biases.len();
        if hidden == 0 || hidden > MAX_HIDDEN {
            bail!("hidden layer width must be in 1..={MAX_HIDDEN}, got {hidden}");
        }
        if hidden_weights.len() != hidden * NUM_INPUTS {
            bail!(
                "expected {} hidden weights for a hidden width of {hidden}, got {}",
                hidden * NUM_INPUTS,
                hidden_weights.len()
            );
        }
        if output_weights.len() != hidden {
            bail!(
                "expected {hidden} output weights, got {}",
                output_weights.len()
            );
        }

        Ok(Self {
            hidden_weights,
            hidden_biases,
            output_weights,
            output_bias,
        })
    }

    /// Width of the hidden layer.
    pub fn hidden(&self) -> usize {
        self.hidden_biases.len()
    }

    /// Reads a network in the weight file format.
    pub fn read(mut reader: impl Read) -> Result<Self> {
        let mut magic = [0; 4];
        reader
            .read_exact(&mut magic)
            .context("Failed to read weight file header")?;
        if magic != WEIGHTS_MAGIC {
            bail!("not a weight file: expected magic {WEIGHTS_MAGIC:?}, found {magic:?}");
        }

        let hidden = reader.read_u32::<LittleEndian>()? as usize;
        if hidden == 0 || hidden > MAX_HIDDEN {
            bail!("hidden layer width must be in 1..={MAX_HIDDEN}, got {hidden}");
        }

        let mut hidden_weights = vec![0.0; hidden * NUM_INPUTS];
        reader
            .read_f32_into::<LittleEndian>(&mut hidden_weights)
            .context("Weight file ended inside the hidden weights")?;

        let mut hidden_biases = vec![0.0; hidden];
        reader
            .read_f32_into::<LittleEndian>(&mut hidden_biases)
            .context("Weight file ended inside the hidden biases")?;

        let mut output_weights = vec![0.0; hidden];
        reader
            .read_f32_into::<LittleEndian>(&mut output_weights)
            .context("Weight file ended inside the output weights")?;

        let output_bias = reader
            .read_f32::<LittleEndian>()
            .context("Weight file ended before the output bias")?;

        Self::new(hidden_weights, hidden_biases, output_weights, output_bias)
    }

    /// Writes this network in the weight file format.
    pub fn write(&self, mut writer: impl Write) -> Result<()> {
        writer.write_all(&WEIGHTS_MAGIC)?;
        writer.write_u32::<LittleEndian>(self.hidden() as u32)?;

        let params = self
            .hidden_weights
            .iter()
            .chain(&self.hidden_biases)
            .chain(&self.output_weights)
            .chain([&self.output_bias]);
        for param in params {
            writer.write_f32::<LittleEndian>(*param)?;
        }

        Ok(())
    }

    /// Runs the network on an encoded position.
    pub fn forward(&self, input: &[f32; NUM_INPUTS]) -> f32 {
        let mut output = self.output_bias;

        for (unit, weights) in self.hidden_weights.chunks_exact(NUM_INPUTS).enumerate() {
            // Most inputs are empty squares
            let activation = input
                .iter()
                .zip(weights)
                .filter(|(x, _)| **x != 0.0)
                .fold(self.hidden_biases[unit], |acc, (x, w)| acc + x * w);

            output += self.output_weights[unit] * selu(activation);
        }

        output
    }
}

/// Scores positions with a [`Network`] whose weights are read from a file on [`Evaluator::load`].
#[derive(Clone, Debug)]
pub struct NetworkEvaluator {
    path: PathBuf,
    network: Option<Network>,
}

impl NetworkEvaluator {
    /// Creates an evaluator that will read its weights from `path` once loaded.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            network: None,
        }
    }

    /// Creates an evaluator that is ready to use `network`.
    pub fn with_network(network: Network) -> Self {
        Self {
            path: PathBuf::new(),
            network: Some(network),
        }
    }
}

impl Evaluator for NetworkEvaluator {
    fn name(&self) -> &str {
        "network"
    }

    fn load(&mut self) -> Result<()> {
        if self.network.is_some() {
            return Ok(());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open weight file {}", self.path.display()))?;
        let network = Network::read(BufReader::new(file))
            .with_context(|| format!("Failed to load weight file {}", self.path.display()))?;

        info!(
            "Loaded network with {} hidden units from {}",
            network.hidden(),
            self.path.display()
        );
        self.network = Some(network);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.network.is_some()
    }

    fn score(&self, game: &Game) -> Result<f32> {
        let network = self
            .network
            .as_ref()
            .ok_or(anyhow!("model has not been loaded; send `isready` first"))?;

        Ok(network.forward(&encode_planes(game)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use ember_board::FEN_STARTPOS;

    use super::*;

    /// One hidden unit that sums a single plane.
    fn plane_counter(plane: usize, output_bias: f32) -> Network {
        let mut hidden_weights = vec![0.0; NUM_INPUTS];
        hidden_weights[plane * 64..(plane + 1) * 64].fill(1.0);
        Network::new(hidden_weights, vec![0.0], vec![1.0], output_bias).unwrap()
    }

    #[test]
    fn test_encode_planes() {
        let planes = encode_planes(&Game::from_fen(FEN_STARTPOS).unwrap());

        // White pawns on the second rank, row 6
        assert!(planes[6 * 8..7 * 8].iter().all(|x| *x == 1.0));
        // Black pawns on the seventh rank, row 1
        assert!(planes[8..2 * 8].iter().all(|x| *x == -1.0));
        // Black rook on a8, white rook on h1
        assert_eq!(planes[64], -1.0);
        assert_eq!(planes[64 + 63], 1.0);
        // White king on e1, black king on e8
        assert_eq!(planes[5 * 64 + 7 * 8 + 4], 1.0);
        assert_eq!(planes[5 * 64 + 4], -1.0);

        assert_eq!(planes.iter().filter(|x| **x != 0.0).count(), 32);
        assert_eq!(planes.iter().sum::<f32>(), 0.0);
    }

    #[test]
    fn test_forward() {
        // White is up two pawns: the pawn plane sums to 2, and selu(2) = 2 * scale
        let game = Game::from_fen("4k3/8/8/8/8/8/PP6/4K3 w - - 0 1").unwrap();
        let score = plane_counter(0, 10.0).forward(&encode_planes(&game));
        assert!((score - (10.0 + 2.0 * 1.050_701)).abs() < 1e-4);

        // Black is up a pawn: selu(-1) is negative
        let game = Game::from_fen("4k3/p7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(plane_counter(0, 0.0).forward(&encode_planes(&game)) < -1.0);
    }

    #[test]
    fn test_weight_file_round_trip() {
        let network = plane_counter(4, -3.5);
        let mut bytes = Vec::new();
        network.write(&mut bytes).unwrap();

        assert_eq!(bytes.len(), 4 + 4 + (NUM_INPUTS + 3) * 4);
        assert_eq!(Network::read(Cursor::new(&bytes)).unwrap(), network);
    }

    #[test]
    fn test_corrupt_weight_files() {
        let mut bytes = Vec::new();
        plane_counter(0, 0.0).write(&mut bytes).unwrap();

        let truncated = &bytes[..bytes.len() - 1];
        assert!(Network::read(Cursor::new(truncated)).is_err());

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(Network::read(Cursor::new(bad_magic)).is_err());

        let mut zero_width = bytes.clone();
        zero_width[4..8].copy_from_slice(&0u32.to_le_bytes());
        assert!(Network::read(Cursor::new(zero_width)).is_err());

        assert!(Network::new(vec![0.0; 3], vec![0.0], vec![0.0], 0.0).is_err());
    }

    #[test]
    fn test_evaluator_requires_load() {
        let path = std::env::temp_dir().join(format!("ember-weights-{}.bin", std::process::id()));
        let mut bytes = Vec::new();
        plane_counter(0, 42.0).write(&mut bytes).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let mut eval = NetworkEvaluator::new(&path);
        assert!(!eval.is_ready());
        assert!(eval.score(&Game::default()).is_err());

        eval.load().unwrap();
        assert!(eval.is_ready());
        // Pawn plane sums to zero in the starting position
        assert_eq!(eval.score(&Game::default()).unwrap(), 42.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_evaluator_with_network_is_ready() {
        let mut eval = NetworkEvaluator::with_network(plane_counter(5, 7.0));
        assert!(eval.is_ready());
        // One king each, so the king plane sums to zero
        assert_eq!(eval.score(&Game::default()).unwrap(), 7.0);

        // Already loaded, so the empty path is never opened
        eval.load().unwrap();
        assert_eq!(eval.name(), "network");
    }

    #[test]
    fn test_missing_weight_file() {
        let mut eval = NetworkEvaluator::new("/nonexistent/ember/weights.bin");
        assert!(eval.load().is_err());
        assert!(!eval.is_ready());
    }
}
