use anyhow::{Context, Result};
use clap::Parser;
use ndarray_rand::rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use sum_squares_network::{LossChart, TrainingBatch, TwoLayerSigmoidNetwork};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sum-squares-network")]
#[command(about = "Train a two-layer sigmoid network on XOR and plot its loss", long_about = None)]
struct Cli {
    /// Number of full-batch gradient descent steps
    #[arg(short, long, default_value = "1500", value_parser = clap::value_parser!(u64).range(1..))]
    epochs: u64,

    /// Number of hidden neurons
    #[arg(long, default_value = "4")]
    hidden: usize,

    /// Step size applied to every gradient
    #[arg(long, default_value = "1.0")]
    learning_rate: f64,

    /// Seed for the weight initialisation (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Where to write the loss chart
    #[arg(short, long, default_value = "loss_history.png")]
    output: PathBuf,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let batch = TrainingBatch::xor();
    let mut network = TwoLayerSigmoidNetwork::new(batch.feature_count(), cli.hidden, &mut rng)?
        .with_learning_rate(cli.learning_rate)?;
    info!(
        inputs = network.input_size(),
        hidden = network.hidden_size(),
        learning_rate = network.learning_rate(),
        examples = batch.len(),
        "starting training"
    );

    let epochs = usize::try_from(cli.epochs).context("epoch count does not fit in memory")?;
    let report = network
        .train(&batch, epochs)
        .context("training run failed")?;

    println!(
        "predictions after {} epochs {}, expected {}",
        epochs, report.final_predictions, batch.labels
    );

    LossChart::default()
        .save(&report.loss_history, &cli.output)
        .with_context(|| format!("failed to plot loss to {}", cli.output.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epochs_must_be_positive() {
        assert!(Cli::try_parse_from(["sum-squares-network", "--epochs", "0"]).is_err());

        let cli = Cli::try_parse_from(["sum-squares-network", "--epochs", "3"]).unwrap();
        assert_eq!(cli.epochs, 3);
        assert_eq!(cli.hidden, 4);
        assert_eq!(cli.output, PathBuf::from("loss_history.png"));
    }
}
