use anyhow::Context;
use clap::Parser;
use knn::{
    dataset::DEFAULT_SEED,
    parse::{self, LoadOptions},
    plot, KNearestNeighbors,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "knn", version, about = "k-nearest-neighbors classification of a CSV table")]
struct Cli {
    /// CSV file with a header row: four feature columns first, label last
    data: PathBuf,

    /// Number of neighbors that vote on each prediction
    #[arg(short, long, default_value_t = 3)]
    k: usize,

    /// Fraction of the shuffled records held out for testing, in [0, 1)
    #[arg(short, long, default_value_t = 0.2)]
    test_split_ratio: f64,

    /// Seed of the shuffle applied when loading
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    #[arg(long, default_value_t = ',')]
    delimiter: char,

    /// Z-score normalize feature columns before splitting
    #[arg(long)]
    standardize: bool,

    /// Sweep k from 1 to 19 and report the most accurate value
    #[arg(long)]
    best_k: bool,

    /// Write the sweep's accuracy curve to this SVG file
    #[arg(long, requires = "best_k")]
    plot: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let options = LoadOptions {
        delimiter: u8::try_from(cli.delimiter).context("delimiter must be a single-byte character")?,
        seed: cli.seed,
    };
    let mut dataset = parse::load_with(&cli.data, options)
        .with_context(|| format!("failed to load {}", cli.data.display()))?;

    if cli.standardize {
        dataset.standardize();
    }

    let mut model = KNearestNeighbors::new(cli.k, cli.test_split_ratio)?;
    model.split_dataset(&dataset)?;
    model.predict_test_set()?;

    let accuracy = model.accuracy()?;
    println!("k = {}: accuracy {accuracy:.3}%", model.k());
    println!("{}", model.confusion_matrix()?);

    if cli.best_k {
        let ((best_k, best_accuracy), curve) = model.best_k_with_curve()?;
        println!("best k = {best_k}: accuracy {best_accuracy:.3}%");

        if let Some(path) = &cli.plot {
            plot::plot_k_sweep(path, &curve)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
    }

    Ok(())
}
