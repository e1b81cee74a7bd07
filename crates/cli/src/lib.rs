use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::{
    merge_highlight_boxes, ClusterHeights, Comment, CommentId, CommentState, CommentStateStore,
    ConnectorStyle, EngineConfig, PageFrame, PageFrames, Rect, ViewerFrame,
};
use pdf_annotator_ui::{FrameInput, FrameOutput, FramePipeline};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "annotator")]
#[command(about = "PDF annotation positioning engine")]
pub struct Cli {
    /// Engine configuration file (TOML); defaults apply when omitted.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one frame over a scene file and print the placements as JSON.
    Layout {
        #[arg(value_name = "SCENE")]
        scene: PathBuf,
        /// Draw connectors straight to the highlight centroid.
        #[arg(long)]
        straight: bool,
    },
    /// Merge client rects from a JSON file into highlight boxes.
    Merge {
        #[arg(value_name = "RECTS")]
        rects: PathBuf,
        /// Override the merge margin in pixels.
        #[arg(long)]
        margin: Option<f64>,
    },
    /// Print the effective configuration as TOML.
    Config,
    /// Print CLI version.
    Version,
}

/// A rendered document as seen by one frame
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub pages: Vec<PageFrame>,
    pub viewer: ViewerFrame,
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub states: BTreeMap<i64, CommentState>,
    /// Measured heights of expanded clusters, keyed by cluster key
    #[serde(default)]
    pub heights: BTreeMap<i64, f64>,
}

#[derive(Debug, Serialize)]
struct MergeOutput {
    input: usize,
    merged: Vec<Rect>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Layout { scene, straight } => {
            let style = if straight {
                ConnectorStyle::Straight
            } else {
                ConnectorStyle::Orthogonal
            };
            let scene = read_json::<Scene>(&scene)?;
            print_json(&layout_scene(&scene, config, style))
        }
        Commands::Merge { rects, margin } => run_merge(&rects, &config, margin),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Diagnostics go to stderr so stdout stays machine-readable
fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env().context("invalid environment override")?;
    tracing::debug!(?config, "effective configuration");
    Ok(config)
}

/// Run the frame pipeline once over `scene`
pub fn layout_scene(scene: &Scene, config: EngineConfig, style: ConnectorStyle) -> FrameOutput {
    let pages: PageFrames = scene.pages.iter().copied().collect();

    let mut heights = ClusterHeights::new(config.badge_height_px);
    for (key, height) in &scene.heights {
        heights.record(CommentId(*key), *height);
    }
    let mut states = CommentStateStore::from_states(
        scene
            .states
            .iter()
            .map(|(id, state)| (CommentId(*id), state.clone())),
    );

    FramePipeline::new(config).with_style(style).run(
        FrameInput {
            geometry: &pages,
            viewer: &scene.viewer,
            comments: &scene.comments,
            heights: &heights,
            previous_clusters: &[],
        },
        &mut states,
    )
}

fn run_merge(path: &Path, config: &EngineConfig, margin: Option<f64>) -> Result<()> {
    let rects = read_json::<Vec<Rect>>(path)?;

    let mut options = config.pixel_merge();
    if let Some(margin) = margin {
        if !margin.is_finite() || margin < 0.0 {
            anyhow::bail!("--margin must be a non-negative number");
        }
        options = options.with_margin(margin);
    }

    let merged = merge_highlight_boxes(&rects, &options);
    print_json(&MergeOutput {
        input: rects.len(),
        merged,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        anyhow::bail!("file does not exist: {}", path.display());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
