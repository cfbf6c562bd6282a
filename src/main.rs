use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use textspot::detection::contours::ContourFilterConfig;
use textspot::{run_batch, BatchError, DetectorConfig, OcrsRecognizer, TextDetector, TextRecognizer};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    /// Tight size limits plus shape limits
    Strict,
    /// Like strict with a lower area-to-height limit
    Tight,
    /// Size limits only
    Lenient,
}

impl Variant {
    fn contour_filter(self) -> ContourFilterConfig {
        match self {
            Variant::Strict => ContourFilterConfig::STRICT,
            Variant::Tight => ContourFilterConfig::TIGHT,
            Variant::Lenient => ContourFilterConfig::LENIENT,
        }
    }
}

#[derive(Parser)]
#[command(name = "textspot")]
#[command(about = "Find and highlight text regions in natural scene images")]
struct Cli {
    /// Directory with input images (jpg, jpeg, png, bmp)
    #[arg(value_name = "INPUT_DIR")]
    input_dir: PathBuf,

    /// Directory for annotated images and ExecutionTime.csv
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Save intermediate masks to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Directory holding text-detection.rten and text-recognition.rten
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Contour filter preset
    #[arg(long, value_enum, default_value_t = Variant::Strict)]
    variant: Variant,

    /// Skip the OCR gate and keep every candidate region
    #[arg(long)]
    skip_ocr: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    let recognizer: Option<Arc<dyn TextRecognizer>> = if args.skip_ocr {
        info!("OCR gate disabled, every candidate region is kept");
        None
    } else {
        let models_dir = match args.models_dir {
            Some(dir) => dir,
            None => OcrsRecognizer::default_models_dir()?,
        };
        info!(dir = %models_dir.display(), "Loading OCR models");
        Some(Arc::new(OcrsRecognizer::from_dir(&models_dir)?))
    };

    let config = DetectorConfig {
        contours: args.variant.contour_filter(),
        ..DetectorConfig::default()
    };
    let mut detector = TextDetector::new(config, recognizer);
    if let Some(debug_dir) = args.debug_out {
        detector = detector.with_debug(debug_dir)?;
    }

    match run_batch(&detector, &args.input_dir, &args.output_dir) {
        Ok(summary) => {
            info!(
                processed = summary.processed,
                failed = summary.failed,
                regions = summary.regions,
                "Batch finished"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ BatchError::Decode { .. }) => {
            error!("{e}");
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}
