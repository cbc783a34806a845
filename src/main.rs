use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use trombi::config::Config;
use trombi::faces::{ModelStore, OnnxAttributeAnalyzer, OnnxFaceEncoder};
use trombi::{logging, pipeline};

/// Analyze a folder of photos and group similar faces by person.
#[derive(Parser)]
#[command(name = "trombi", version)]
struct Cli {
    /// Folder containing the images to analyze (not searched recursively).
    #[arg(long)]
    input: PathBuf,

    /// Output folder for the per-person photo folders and results.json.
    #[arg(long)]
    output: PathBuf,

    /// Path to config file (overrides TROMBI_CONFIG and the default location).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// DBSCAN neighborhood radius between face embeddings.
    #[arg(long)]
    eps: Option<f32>,

    /// Faces needed to form a cluster, the face itself included.
    #[arg(long)]
    min_samples: Option<usize>,

    /// Directory holding the ONNX models.
    #[arg(long)]
    models_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    apply_overrides(&mut config, &cli);

    logging::init(config.logging.dir.as_deref())?;
    tracing::info!(input = ?cli.input, output = ?cli.output, "Starting run");

    let store = ModelStore::from_config(&config.models);
    let encoder = OnnxFaceEncoder::load(&store, &config.models)?;
    let analyzer = OnnxAttributeAnalyzer::load(&store, &config.models)?;

    let summary = pipeline::run(&config, &cli.input, &cli.output, &encoder, &analyzer)?;

    tracing::info!(
        faces = summary.faces,
        persons = summary.persons.len(),
        results = ?summary.results_file,
        "Run complete"
    );
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(eps) = cli.eps {
        config.clustering.eps = eps;
    }
    if let Some(min_samples) = cli.min_samples {
        config.clustering.min_samples = min_samples;
    }
    if let Some(dir) = &cli.models_dir {
        config.models.dir = dir.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_and_output_are_required() {
        assert!(Cli::try_parse_from(["trombi", "--input", "photos"]).is_err());
        assert!(Cli::try_parse_from(["trombi", "--output", "sorted"]).is_err());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "trombi", "--input", "photos", "--output", "sorted", "--eps", "0.8", "--models-dir", "/m",
        ])
        .unwrap();
        let mut config = Config::default();

        apply_overrides(&mut config, &cli);

        assert_eq!(cli.input, PathBuf::from("photos"));
        assert_eq!(config.clustering.eps, 0.8);
        assert_eq!(config.clustering.min_samples, 1);
        assert_eq!(config.models.dir, PathBuf::from("/m"));
    }
}
