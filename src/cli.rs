// ============================================================================
// PixelFE CLI — headless batch transforms via command-line arguments
// ============================================================================
//
// Usage examples:
//   PixelFE -i sprite.png --op flip-h -o flipped.png
//   PixelFE -i tiles/*.png --op rotate-cw --op scale=2 --output-dir out/
//   PixelFE -i scene.png --op carve=48x32 -o small.png --config my.cfg
//
// Each input is loaded as a single layer, the ops run in order, and the
// layer is written back out.  Output format follows the output extension.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{LayerId, LayerRegistry, PixelBuffer};
use crate::io::{load_image, save_image, SaveFormat};
use crate::ops::seam_carve::carve_layer;
use crate::ops::transform::{self, Transformed};
use crate::selection::SelectionState;
use crate::settings::EngineSettings;
use crate::{log_err, log_info, log_warn};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixelFE headless pixel-art processor.
#[derive(Parser, Debug)]
#[command(
    name = "PixelFE",
    about = "PixelFE headless pixel-art batch processor",
    long_about = "Apply flips, rotations, scaling, skew and content-aware shrinking to\n\
                  PNG, BMP and TGA files without a GUI.\n\n\
                  Ops: flip-h, flip-v, rotate-cw, rotate-ccw, rotate-180,\n     \
                  rotate=DEG, scale=SX[xSY], skew=KX,KY, carve=WxH\n\n\
                  Example:\n  \
                  PixelFE -i sprite.png --op rotate=45 --op carve=32x32 -o out.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Operation to apply; repeat to chain, applied in order.
    #[arg(long = "op", value_name = "OP")]
    pub ops: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Settings file (key=value). Defaults to the per-user settings file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Session log file. Defaults to the per-user data directory.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Operations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CliOp {
    FlipH,
    FlipV,
    RotateCw,
    RotateCcw,
    Rotate180,
    Rotate(f32),
    Scale(f32, f32),
    Skew(f32, f32),
    Carve(u32, u32),
}

#[derive(Debug, PartialEq)]
pub enum OpParseError {
    Unknown(String),
    BadValue { op: String, value: String },
}

impl fmt::Display for OpParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpParseError::Unknown(op) => write!(f, "unknown op '{}'", op),
            OpParseError::BadValue { op, value } => {
                write!(f, "bad value '{}' for op '{}'", value, op)
            }
        }
    }
}

impl std::error::Error for OpParseError {}

impl FromStr for CliOp {
    type Err = OpParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, value) = match s.split_once('=') {
            Some((n, v)) => (n.trim().to_lowercase(), Some(v.trim())),
            None => (s.to_lowercase(), None),
        };
        let bad = |v: &str| OpParseError::BadValue { op: name.clone(), value: v.to_string() };

        match (name.as_str(), value) {
            ("flip-h", None) => Ok(CliOp::FlipH),
            ("flip-v", None) => Ok(CliOp::FlipV),
            ("rotate-cw", None) => Ok(CliOp::RotateCw),
            ("rotate-ccw", None) => Ok(CliOp::RotateCcw),
            ("rotate-180", None) => Ok(CliOp::Rotate180),
            ("rotate", Some(v)) => parse_finite(v).map(CliOp::Rotate).ok_or_else(|| bad(v)),
            ("scale", Some(v)) => {
                let (sx, sy) = match v.split_once(['x', 'X']) {
                    Some((a, b)) => (parse_finite(a), parse_finite(b)),
                    None => (parse_finite(v), parse_finite(v)),
                };
                match (sx, sy) {
                    (Some(sx), Some(sy)) => Ok(CliOp::Scale(sx, sy)),
                    _ => Err(bad(v)),
                }
            }
            ("skew", Some(v)) => {
                let (kx, ky) = v.split_once(',').ok_or_else(|| bad(v))?;
                match (parse_finite(kx), parse_finite(ky)) {
                    (Some(kx), Some(ky)) => Ok(CliOp::Skew(kx, ky)),
                    _ => Err(bad(v)),
                }
            }
            ("carve", Some(v)) => {
                let (w, h) = v.split_once(['x', 'X']).ok_or_else(|| bad(v))?;
                match (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
                    // an empty image cannot be saved
                    (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok(CliOp::Carve(w, h)),
                    _ => Err(bad(v)),
                }
            }
            _ => Err(OpParseError::Unknown(s.to_string())),
        }
    }
}

fn parse_finite(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let parsed: Result<Vec<CliOp>, OpParseError> = args.ops.iter().map(|s| s.parse()).collect();
    let ops = match parsed {
        Ok(ops) => ops,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let settings = match &args.config {
        Some(path) => EngineSettings::load(path),
        None => EngineSettings::load_default(),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;
    log_info!("batch of {} file(s), {} op(s)", total, ops.len());

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &ops, &settings) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

pub fn run_one(
    input: &Path,
    output: &Path,
    ops: &[CliOp],
    settings: &EngineSettings,
) -> Result<(), String> {
    let src = load_image(input).map_err(|e| format!("load failed: {}", e))?;

    let mut layers = LayerRegistry::new(src.width, src.height);
    let mut selection = SelectionState::new(src.width, src.height);
    let layer = LayerId::new();
    layers.ensure(layer);
    layers.set_buffer(layer, &src.pixels);

    for op in ops {
        apply_op(&mut layers, &mut selection, layer, *op, settings)?;
    }

    let result = layers
        .layer_pixels(layer)
        .ok_or_else(|| "layer vanished during processing".to_string())?;
    save_image(&result, output).map_err(|e| format!("save failed: {}", e))
}

fn apply_op(
    layers: &mut LayerRegistry,
    selection: &mut SelectionState,
    layer: LayerId,
    op: CliOp,
    settings: &EngineSettings,
) -> Result<(), String> {
    match op {
        CliOp::FlipH => {
            transform::flip_layer_horizontal(layers, layer);
        }
        CliOp::FlipV => {
            transform::flip_layer_vertical(layers, layer);
        }
        CliOp::Rotate180 => {
            transform::rotate_layer_180(layers, layer);
        }
        CliOp::RotateCw => transform::rotate_canvas_90cw(layers, selection),
        CliOp::RotateCcw => transform::rotate_canvas_90ccw(layers, selection),
        CliOp::Rotate(deg) => {
            let src = current(layers, layer)?;
            replace_canvas(layers, selection, layer, transform::rotate_by_angle(&src, deg));
        }
        CliOp::Scale(sx, sy) => {
            let src = current(layers, layer)?;
            replace_canvas(layers, selection, layer, transform::scale(&src, sx, sy));
        }
        CliOp::Skew(kx, ky) => {
            let src = current(layers, layer)?;
            replace_canvas(layers, selection, layer, transform::skew(&src, kx, ky));
        }
        CliOp::Carve(w, h) => {
            let pixels = layers.width() as u64 * layers.height() as u64;
            if pixels > settings.max_carve_pixels {
                log_warn!(
                    "carving {} pixels (limit {}), this may be slow",
                    pixels, settings.max_carve_pixels
                );
            }
            let (nw, nh) = carve_layer(layers, layer, w, h, None, settings.importance_weight)
                .ok_or_else(|| "layer vanished during carve".to_string())?;
            layers.resize_canvas(nw, nh);
            selection.set_canvas_size(nw, nh);
            selection.clear();
        }
    }
    Ok(())
}

fn current(layers: &LayerRegistry, layer: LayerId) -> Result<PixelBuffer, String> {
    layers.layer_pixels(layer).ok_or_else(|| "layer vanished during processing".to_string())
}

/// The single-layer canvas takes the size of a free-transform result.
fn replace_canvas(
    layers: &mut LayerRegistry,
    selection: &mut SelectionState,
    layer: LayerId,
    result: Transformed,
) {
    let Transformed { buffer, .. } = result;
    layers.resize_canvas(buffer.width, buffer.height);
    layers.set_buffer(layer, &buffer.pixels);
    selection.set_canvas_size(buffer.width, buffer.height);
    selection.clear();
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Output path for one input.
///
/// 1. `--output` as given.
/// 2. `--output-dir` joined with the input's file name.
/// 3. Beside the input with `_out` appended to the stem.
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = SaveFormat::from_path(input).unwrap_or(SaveFormat::Png).extension();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or_else(|| Path::new(""));
    Some(parent.join(format!("{}_out.{}", stem, ext)))
}
