use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use warpalign::image::io::{load_gray_image, load_image, save_image};
use warpalign::viz::draw_matches;
use warpalign::{
    AlignConfig, Aligner, Correspondence, Descriptors, DistanceMetric, Features, Homography,
    Interpolation, Keypoint,
};

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "WarpAlign CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MetricConfig {
    Euclidean,
    Hamming,
}

impl From<MetricConfig> for DistanceMetric {
    fn from(value: MetricConfig) -> Self {
        match value {
            MetricConfig::Euclidean => DistanceMetric::Euclidean,
            MetricConfig::Hamming => DistanceMetric::Hamming,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum InterpolationConfig {
    Bilinear,
    Nearest,
}

impl From<InterpolationConfig> for Interpolation {
    fn from(value: InterpolationConfig) -> Self {
        match value {
            InterpolationConfig::Bilinear => Interpolation::Bilinear,
            InterpolationConfig::Nearest => Interpolation::Nearest,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PipelineConfigJson {
    ratio_threshold: f32,
    min_match_count: usize,
    reproj_threshold: f64,
    max_iterations: usize,
    blend_alpha: f32,
    border_pad: usize,
    interpolation: InterpolationConfig,
    metric: MetricConfig,
    strict_matching: bool,
    seed: u64,
    confidence: f64,
    early_stop_inlier_ratio: f64,
    background: u8,
    parallel: bool,
}

impl Default for PipelineConfigJson {
    fn default() -> Self {
        let cfg = AlignConfig::default();
        Self {
            ratio_threshold: cfg.ratio_threshold,
            min_match_count: cfg.min_match_count,
            reproj_threshold: cfg.reproj_threshold,
            max_iterations: cfg.max_iterations,
            blend_alpha: cfg.blend_alpha,
            border_pad: cfg.border_pad,
            interpolation: InterpolationConfig::Bilinear,
            metric: MetricConfig::Euclidean,
            strict_matching: cfg.strict_matching,
            seed: cfg.seed,
            confidence: cfg.confidence,
            early_stop_inlier_ratio: cfg.early_stop_inlier_ratio,
            background: cfg.background,
            parallel: cfg.parallel,
        }
    }
}

impl From<PipelineConfigJson> for AlignConfig {
    fn from(value: PipelineConfigJson) -> Self {
        Self {
            ratio_threshold: value.ratio_threshold,
            min_match_count: value.min_match_count,
            reproj_threshold: value.reproj_threshold,
            max_iterations: value.max_iterations,
            blend_alpha: value.blend_alpha,
            border_pad: value.border_pad,
            interpolation: value.interpolation.into(),
            metric: value.metric.into(),
            strict_matching: value.strict_matching,
            seed: value.seed,
            confidence: value.confidence,
            early_stop_inlier_ratio: value.early_stop_inlier_ratio,
            background: value.background,
            parallel: value.parallel,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    image_a_path: String,
    image_b_path: String,
    features_a_path: String,
    features_b_path: String,
    composite_path: Option<String>,
    warped_path: Option<String>,
    matches_path: Option<String>,
    report_path: Option<String>,
    color: bool,
    pipeline: PipelineConfigJson,
}

/// Keypoints and descriptors in original-image pixel coordinates.
#[derive(Debug, Deserialize)]
struct FeatureFile {
    keypoints: Vec<[f32; 2]>,
    descriptors: Vec<Vec<f32>>,
    /// Descriptor length; only needed when `descriptors` may be empty.
    #[serde(default)]
    dim: Option<usize>,
}

impl FeatureFile {
    fn read(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn declared_dim(&self) -> Option<usize> {
        self.dim.or_else(|| self.descriptors.first().map(Vec::len))
    }

    fn into_features(self, dim: usize) -> Result<Features, Box<dyn std::error::Error>> {
        let keypoints = self
            .keypoints
            .iter()
            .map(|&[x, y]| Keypoint::new(x, y))
            .collect();
        let descriptors = Descriptors::from_rows_with_dim(&self.descriptors, dim)?;
        Ok(Features::new(keypoints, descriptors)?)
    }
}

/// Loads both feature files with a shared descriptor dimension, so an image
/// with no detections still reaches the pipeline.
fn load_features(
    path_a: &Path,
    path_b: &Path,
) -> Result<(Features, Features), Box<dyn std::error::Error>> {
    let file_a = FeatureFile::read(path_a)?;
    let file_b = FeatureFile::read(path_b)?;
    let dim = file_a
        .declared_dim()
        .or_else(|| file_b.declared_dim())
        .unwrap_or(1);
    Ok((file_a.into_features(dim)?, file_b.into_features(dim)?))
}

#[derive(Debug, Serialize)]
struct Report {
    homography: [[f64; 3]; 3],
    original_homography: Option<[[f64; 3]; 3]>,
    num_matches: usize,
    num_inliers: usize,
    mean_error: f64,
    trials: usize,
    fallback: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("warpalign=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_a_path.is_empty() || config.image_b_path.is_empty() {
        return Err("image_a_path and image_b_path must be set in the config".into());
    }
    if config.features_a_path.is_empty() || config.features_b_path.is_empty() {
        return Err("features_a_path and features_b_path must be set in the config".into());
    }

    let (image_a, image_b) = if config.color {
        (load_image(&config.image_a_path)?, load_image(&config.image_b_path)?)
    } else {
        (
            load_gray_image(&config.image_a_path)?,
            load_gray_image(&config.image_b_path)?,
        )
    };
    let (features_a, features_b) = load_features(
        Path::new(&config.features_a_path),
        Path::new(&config.features_b_path),
    )?;

    let aligner = Aligner::new(config.pipeline.into())?;
    let result = aligner.align_features(image_a.view(), &features_a, image_b.view(), &features_b)?;
    if result.matches.fallback {
        tracing::warn!(
            passed = result.matches.ratio_passed,
            "ratio test kept too few matches; estimated from unfiltered nearest neighbours"
        );
    }

    if let Some(path) = &config.composite_path {
        save_image(&result.composite, path)?;
    }
    if let Some(path) = &config.warped_path {
        save_image(&result.warped, path)?;
    }
    if let Some(path) = &config.matches_path {
        let inliers: Vec<Correspondence> = result
            .estimate
            .inlier_indices()
            .map(|i| result.matches.matches[i])
            .collect();
        let canvas = draw_matches(
            result.prepared_a.view(),
            result.prepared_b.view(),
            result.features_a.keypoints(),
            result.features_b.keypoints(),
            &inliers,
        )?;
        save_image(&canvas, path)?;
    }

    let report = Report {
        homography: result.homography().to_rows(),
        original_homography: result.original_homography().as_ref().map(Homography::to_rows),
        num_matches: result.matches.len(),
        num_inliers: result.estimate.num_inliers,
        mean_error: result.estimate.mean_error,
        trials: result.estimate.trials,
        fallback: result.matches.fallback,
    };
    let json = serde_json::to_string_pretty(&report)?;

    match config.report_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
