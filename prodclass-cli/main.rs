use std::path::PathBuf;

use clap::Parser;
use log::info;
use prodclass_cli::{frame_report, load_config, load_feature_set, ConfigOverrides, ProductClassifier};
use prodclass_core::ScanConfig;

/// Identify which catalog product appears in a query frame
#[derive(Debug, Parser)]
#[command(name = "prodclass", version, about)]
struct Args {
    /// Catalog root holding `keypoints/` and `descriptors/`
    #[arg(long)]
    catalog: PathBuf,

    /// Query keypoint file
    #[arg(long)]
    query_keypoints: PathBuf,

    /// Query descriptor file
    #[arg(long)]
    query_descriptors: PathBuf,

    /// Scan configuration file (.toml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// MAT_BF or MAT_FLANN
    #[arg(long)]
    matcher: Option<String>,

    /// SEL_NN or SEL_KNN
    #[arg(long)]
    selector: Option<String>,

    /// DES_BINARY or DES_HOG
    #[arg(long)]
    descriptor_kind: Option<String>,

    /// Detector the catalog was built with, e.g. ORB
    #[arg(long)]
    detector: Option<String>,

    /// Descriptor extractor the catalog was built with, e.g. BRIEF
    #[arg(long)]
    descriptor: Option<String>,

    #[arg(long)]
    workers: Option<usize>,

    /// Lowe ratio for SEL_KNN
    #[arg(long)]
    ratio: Option<f32>,

    /// Scores below this are reported as "none"
    #[arg(long)]
    reject_threshold: Option<f64>,

    /// Number of simulated frames to classify
    #[arg(long, default_value_t = 1)]
    frames: usize,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            matcher: self.matcher.clone(),
            selector: self.selector.clone(),
            descriptor_kind: self.descriptor_kind.clone(),
            detector: self.detector.clone(),
            descriptor: self.descriptor.clone(),
            workers: self.workers,
            ratio_threshold: self.ratio,
            reject_threshold: self.reject_threshold,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let base = match &args.config {
        Some(path) => load_config(path)?,
        None => ScanConfig::default(),
    };
    let config = args.overrides().apply(base)?;
    info!("{}", config.summary());

    let classifier = ProductClassifier::open(&args.catalog, &config)?;
    let query = load_feature_set(&args.query_keypoints, &args.query_descriptors)?;
    info!(
        "Query has {} keypoints, catalog has {} products",
        query.keypoint_count(),
        classifier.catalog().len()
    );

    for _ in 0..args.frames {
        let outcome = classifier.classify(&query);
        println!("{}", frame_report(&outcome));
    }

    Ok(())
}
