use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clonegrade::{
    AdjustmentKey, GradeSession, GradeSettings, PixelSource, PresetExporter, PresetFormat,
    ReferenceSession, SelectionMask,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "clonegrade")]
#[command(about = "CloneGrade - Copy the color grade of a reference image onto other images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

/// Where the grade comes from: a fresh reference image or a saved session
#[derive(clap::Args)]
#[group(required = true, multiple = false)]
struct GradeInput {
    /// Reference image to analyze
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Saved grade session (JSON)
    #[arg(short, long)]
    session: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a reference image and print its fingerprint and adjustments
    Analyze {
        /// Reference image
        reference: PathBuf,

        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Render the grade onto target images
    Transfer {
        #[command(flatten)]
        input: GradeInput,

        /// Adjustments to apply (comma-separated keys or "all")
        #[arg(long)]
        select: Option<String>,

        /// Intensity percent (0-200)
        #[arg(short, long)]
        intensity: Option<f32>,

        /// Override an adjustment, e.g. --set contrast=20
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Target images
        #[arg(required = true)]
        targets: Vec<PathBuf>,
    },

    /// Write the selected adjustments as a preset file
    Preset {
        #[command(flatten)]
        input: GradeInput,

        /// Adjustments to include (comma-separated keys or "all")
        #[arg(long)]
        select: Option<String>,

        /// Preset format (xmp, cube, cube-grid)
        #[arg(short, long, default_value = "xmp")]
        format: PresetFormat,

        /// Output file path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Analyze a reference image and save a grade session
    Session {
        /// Reference image
        #[arg(short, long)]
        reference: PathBuf,

        /// Adjustments selected in the saved session
        #[arg(long)]
        select: Option<String>,

        /// Session file path
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = match &cli.config {
        Some(path) => GradeSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => GradeSettings::default(),
    };
    let source = PixelSource::new();

    match cli.command {
        Commands::Analyze { reference, json } => {
            analyze_command(reference, json, source, settings).await
        }
        Commands::Transfer {
            input,
            select,
            intensity,
            overrides,
            out,
            targets,
        } => {
            transfer_command(input, select, intensity, overrides, out, targets, source, settings).await
        }
        Commands::Preset {
            input,
            select,
            format,
            out,
        } => preset_command(input, select, format, out, source, settings).await,
        Commands::Session {
            reference,
            select,
            out,
        } => session_command(reference, select, out, source, settings).await,
    }
}

async fn analyze_command(
    reference: PathBuf,
    json: bool,
    source: PixelSource,
    settings: GradeSettings,
) -> Result<()> {
    let session = clonegrade::analyze_reference_async(reference, source, settings).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    let fp = &session.fingerprint;
    println!("Brightness: {}", fp.brightness);
    println!("Contrast:   {}", fp.contrast);
    println!("Saturation: {}", fp.saturation);
    println!("Palette:");
    for color in &fp.dominant_colors {
        println!("  {}", color);
    }
    println!("Adjustments:");
    for (key, value) in session.reference.iter() {
        println!("  {:<12} {:>5}", key, value);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn transfer_command(
    input: GradeInput,
    select: Option<String>,
    intensity: Option<f32>,
    overrides: Vec<String>,
    out: Option<PathBuf>,
    targets: Vec<PathBuf>,
    source: PixelSource,
    mut settings: GradeSettings,
) -> Result<()> {
    let mut session = load_grade(&input, select.as_deref(), &source, &settings).await?;

    for entry in &overrides {
        let (key, value) = parse_override(entry)?;
        session.set_adjustment(key, value);
    }
    if let Some(percent) = intensity {
        session.set_intensity(percent)?;
    }
    if let Some(dir) = out {
        settings.output_dir = Some(dir.to_string_lossy().into_owned());
    }

    session.add_targets(targets);
    let transform = session.build_transform()?;
    info!(
        "Rendering {} targets ({} adjustments, intensity {}%)",
        session.targets.len(),
        session.selection.len(),
        session.intensity.percent()
    );

    let report =
        clonegrade::render_batch_async(session.targets.clone(), transform, source, settings).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed > 0 && report.succeeded == 0 {
        bail!("All {} targets failed", report.failed);
    }
    Ok(())
}

async fn preset_command(
    input: GradeInput,
    select: Option<String>,
    format: PresetFormat,
    out: PathBuf,
    source: PixelSource,
    settings: GradeSettings,
) -> Result<()> {
    let session = load_grade(&input, select.as_deref(), &source, &settings).await?;
    let preset = session.export_preset(&PresetExporter::default(), format)?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&out, preset)?;
    info!("Preset written to {:?}", out);
    Ok(())
}

async fn session_command(
    reference: PathBuf,
    select: Option<String>,
    out: PathBuf,
    source: PixelSource,
    settings: GradeSettings,
) -> Result<()> {
    let reference = clonegrade::analyze_reference_async(reference, source, settings.clone()).await?;
    let mut session = GradeSession::new(reference, &settings)?;
    if let Some(list) = select {
        session.selection = SelectionMask::parse(&list)?;
    }

    session.save(&out)?;
    info!("Session saved to {:?}", out);
    Ok(())
}

/// Build the grade session for `transfer` and `preset`
///
/// A fresh reference selects every key unless `--select` narrows it; a saved
/// session keeps its own selection unless `--select` replaces it.
async fn load_grade(
    input: &GradeInput,
    select: Option<&str>,
    source: &PixelSource,
    settings: &GradeSettings,
) -> Result<GradeSession> {
    let mut session = match (&input.reference, &input.session) {
        (Some(reference), _) => {
            let analyzed: ReferenceSession =
                clonegrade::analyze_reference_async(reference.clone(), source.clone(), settings.clone())
                    .await
                    .with_context(|| format!("Failed to analyze {}", reference.display()))?;
            let mut session = GradeSession::new(analyzed, settings)?;
            session.selection = SelectionMask::all();
            session
        }
        (None, Some(path)) => load_session(path)?,
        (None, None) => bail!("Either --reference or --session is required"),
    };

    if let Some(list) = select {
        session.selection = SelectionMask::parse(list)?;
    }
    Ok(session)
}

fn load_session(path: &Path) -> Result<GradeSession> {
    GradeSession::load(path).with_context(|| format!("Failed to load session {}", path.display()))
}

fn parse_override(entry: &str) -> Result<(AdjustmentKey, f32)> {
    let Some((key, value)) = entry.split_once('=') else {
        bail!("Expected KEY=VALUE, got {:?}", entry);
    };
    let key: AdjustmentKey = key.parse()?;
    let value: f32 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))?;
    Ok((key, value))
}
