use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use docparse_core::analysis::{
    labels::{DOCLAYNET_LABELS, LabelMap},
    letterbox::ChannelOrder,
    nms::NmsPolicy,
};
use docparse_core::consts::*;
use docparse_core::inference::yolo::{LayoutModel, LayoutModelConfig, LazySession};
use docparse_core::parse::{LayoutParser, PagePolicy, ParserConfigBuilder, block_on, open_output};
use docparse_core::render::PdfiumRasterizer;

#[derive(Parser)]
#[command(name = "docparse")]
#[command(version, about = "Document layout detection")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect layout regions on every page and print them as JSON Lines
    Layout(LayoutArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum OnError {
    Abort,
    Skip,
}

impl From<OnError> for PagePolicy {
    fn from(value: OnError) -> Self {
        match value {
            OnError::Abort => PagePolicy::Abort,
            OnError::Skip => PagePolicy::Skip,
        }
    }
}

#[derive(clap::Args)]
struct LayoutArgs {
    #[arg(help = "Input PDF file path")]
    input: PathBuf,

    #[arg(short, long, help = "Output JSONL file, stdout when omitted")]
    output: Option<PathBuf>,

    #[arg(short, long, default_value_t = DEFAULT_DPI, help = "Render resolution")]
    dpi: u32,

    #[arg(short, long, default_value = DEFAULT_MODEL_PATH, help = "ONNX model path")]
    model: PathBuf,

    #[arg(long, help = "JSON object mapping class index to name")]
    label_map: Option<PathBuf>,

    #[arg(
        long,
        conflicts_with = "label_map",
        help = "Use the built-in DocLayNet class names"
    )]
    doclaynet_labels: bool,

    #[arg(long, default_value_t = INPUT_SIZE, help = "Square model input size")]
    input_size: usize,

    #[arg(long, default_value_t = DOCLAYNET_LABELS.len(), help = "Classes scored by the model")]
    num_classes: usize,

    #[arg(long, default_value_t = SCORE_THRESHOLD)]
    score_threshold: f32,

    #[arg(long, default_value_t = NMS_IOU_THRESHOLD)]
    iou_threshold: f32,

    #[arg(long, help = "Only suppress overlapping boxes of the same class")]
    per_class_nms: bool,

    #[arg(long, help = "Feed the model BGR instead of RGB")]
    bgr: bool,

    #[arg(long, value_enum, default_value = "abort", help = "Behaviour on a failing page")]
    on_error: OnError,

    #[arg(long, help = "Upper bound in seconds for one page's inference")]
    timeout_secs: Option<u64>,

    #[arg(long, help = "Write annotated page images into this directory")]
    annotate_dir: Option<PathBuf>,

    #[arg(long, env = PDFIUM_LIB_PATH_ENV_NAME, help = "Directory holding the pdfium library")]
    pdfium_lib: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Layout(args) => block_on(run_layout(args))?,
    }
}

async fn run_layout(args: LayoutArgs) -> anyhow::Result<()> {
    let model = LayoutModel::new(
        args.model.clone(),
        LayoutModelConfig {
            num_classes: args.num_classes,
            ..Default::default()
        },
    );
    if let Err(err) = model.ensure_exists() {
        error!("Model not found: {}", args.model.display());
        return Err(err.into());
    }

    let labels = match (&args.label_map, args.doclaynet_labels) {
        (Some(path), _) => Some(LabelMap::from_json_file(path)?),
        (None, true) => Some(LabelMap::doclaynet()),
        (None, false) => None,
    };

    let mut builder = ParserConfigBuilder::default();
    builder
        .dpi(args.dpi)
        .input_size(args.input_size)
        .score_threshold(args.score_threshold)
        .iou_threshold(args.iou_threshold)
        .page_policy(args.on_error.into());
    if args.per_class_nms {
        builder.nms_policy(NmsPolicy::PerClass);
    }
    if args.bgr {
        builder.channel_order(ChannelOrder::Bgr);
    }
    if let Some(secs) = args.timeout_secs {
        builder.inference_timeout(Duration::from_secs(secs));
    }
    if let Some(labels) = labels {
        builder.labels(labels);
    }
    if let Some(dir) = &args.annotate_dir {
        builder.annotate_dir(dir.clone());
    }
    let config = builder.build().context("invalid parser configuration")?;

    let rasterizer = PdfiumRasterizer::new(args.pdfium_lib.as_deref())?;
    let detector = LazySession::new(model);
    let parser = LayoutParser::new(rasterizer, detector, config);

    info!("Parsing {}", args.input.display());
    let mut writer = open_output(args.output.as_deref())?;
    let pages = parser
        .parse_each(&args.input, |outcome| writer.write(&outcome))
        .await?;

    info!("Wrote layout for {} pages", pages);
    Ok(())
}
