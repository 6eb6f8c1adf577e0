use std::path::PathBuf;

use clap::Parser;
use ember::{Engine, Evaluator, MaterialEvaluator, NetworkEvaluator};

/// A UCI chess engine. Speaks UCI over stdin/stdout.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Score positions with the network whose weights are in this file.
    ///
    /// Without it, the built-in material evaluator is used. Weights are read when the engine receives `isready`.
    #[arg(short, long, value_name = "PATH")]
    weights: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let evaluator: Box<dyn Evaluator> = match cli.weights {
        Some(path) => Box::new(NetworkEvaluator::new(path)),
        None => Box::new(MaterialEvaluator::new()),
    };

    Engine::new(evaluator).run()
}
