use crate::config::{Config, load_config};
use crate::placement::PlacementOutcome;
use crate::render::{render_svg, write_output_svg};
use crate::scene::{Scene, parse_manifest};
use crate::text_metrics::{ApproxMeasurer, FontMeasurer, TextMeasure};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "limitplot",
    version,
    about = "Dark-matter exclusion plots with automatic curve labels"
)]
pub struct Args {
    /// Scene manifest (.json5) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (plot, placement, theme and render settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Estimate text extents instead of measuring with system fonts
    #[arg(long = "approx-text")]
    pub approx_text: bool,

    /// Keep label positions as given in the data files and manifest
    #[arg(long = "no-autoposition")]
    pub no_autoposition: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run(args: &Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    let (source, base_dir) = read_input(&args.input)?;
    let manifest = parse_manifest(&source)?;
    let keys = manifest.autoposition.clone();
    let mut scene = Scene::from_manifest(manifest, &base_dir, &mut config)?;

    if !args.no_autoposition {
        let measurer = build_measurer(args.approx_text, &config);
        let outcomes =
            scene.place_all_labels(keys.as_deref(), measurer.as_ref(), &config.placement)?;
        let placed = outcomes.values().filter(|o| o.is_selected()).count();
        log::info!("placed {placed} of {} labels", outcomes.len());
        for (key, outcome) in &outcomes {
            if let PlacementOutcome::InvalidGeometry(issue) = outcome {
                log::warn!("{key}: label skipped ({issue:?})");
            }
        }
    }

    let svg = render_svg(&scene, &config.theme, &config.render);
    match args.output_format {
        OutputFormat::Svg => write_output_svg(&svg, args.output.as_deref()),
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&svg, &output, &config)
        }
    }
}

fn build_measurer(approx: bool, config: &Config) -> Box<dyn TextMeasure> {
    let dpi = config.plot.dpi;
    if approx {
        return Box::new(ApproxMeasurer::new(dpi));
    }
    let measurer =
        FontMeasurer::new(config.theme.font_family.clone(), dpi).with_fallback(ApproxMeasurer::new(dpi));
    if !measurer.is_available() {
        log::warn!(
            "no font found for {:?}; label sizes are estimated",
            measurer.family()
        );
    }
    Box::new(measurer)
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.theme)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

/// Manifest text and the directory its data paths are relative to.
fn read_input(path: &Path) -> Result<(String, PathBuf)> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        return Ok((buf, PathBuf::from(".")));
    }
    let content = std::fs::read_to_string(path)?;
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((content, base))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "limitplot",
            "-i",
            "plots/scene.json5",
            "-e",
            "png",
            "-o",
            "out.png",
            "--approx-text",
            "--log-level",
            "debug",
        ])
        .expect("valid arguments");
        assert!(matches!(args.output_format, OutputFormat::Png));
        assert!(args.approx_text);
        assert!(!args.no_autoposition);
        assert_eq!(args.log_level, "debug");
    }

    #[test]
    fn data_paths_resolve_next_to_manifest() {
        let dir = std::env::temp_dir().join("limitplot-cli-read-input");
        std::fs::create_dir_all(&dir).expect("temp dir");
        let manifest = dir.join("scene.json5");
        std::fs::write(&manifest, "{ series: [] }").expect("write manifest");
        let (content, base) = read_input(&manifest).expect("reads");
        assert_eq!(content, "{ series: [] }");
        assert_eq!(base, dir);
    }

    #[test]
    fn png_needs_an_output_path() {
        assert!(ensure_output(&None, "png").is_err());
        assert_eq!(
            ensure_output(&Some(PathBuf::from("a.png")), "png").expect("given"),
            PathBuf::from("a.png")
        );
    }
}
