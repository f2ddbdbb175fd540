use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum, command};
use serde_json::Value;
use strum::Display;
use tracing::level_filters::LevelFilter;
use tracing::{Level, debug, info, instrument};
use tracing_subscriber::EnvFilter;

use aerosweep::types::{ObliqueParams, PlanResult, PlannerConfig, Point, Polygon, SweepParams};
use aerosweep::{export, plan_multi_block_with_config, plan_oblique_with_config, plan_single_with_config};

#[derive(Parser)]
#[command(name = "aerosweep", version, about)]
struct Args {
    #[command(subcommand)]
    cmd: Commands,

    /// Diagnostic logging level.
    #[clap(long, default_value_t = Level::WARN)]
    log: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a single-direction sweep with no coverage repair.
    PlanSingle(SweepArgs),

    /// Plan a single-direction sweep with supplementary coverage repair.
    PlanMultiBlock(MultiBlockArgs),

    /// Plan an oblique multi-direction survey from a gimbal pitch.
    PlanOblique(ObliqueArgs),

    /// Report the outward-buffered polygon and area accounting for an
    /// oblique plan, without running the planner.
    ExpandedAreaInfo(ObliqueArgs),
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// GeoJSON Polygon file describing the survey area.
    polygon: PathBuf,

    /// Sweep direction in compass degrees.
    #[clap(long, default_value_t = 0.0)]
    direction: f64,

    /// Starting latitude.
    #[clap(long)]
    start_lat: f64,

    /// Starting longitude.
    #[clap(long)]
    start_lng: f64,

    /// Camera footprint width on the ground, in meters.
    #[clap(long)]
    photo_width: f64,

    /// Camera footprint length on the ground, in meters.
    #[clap(long)]
    photo_length: f64,

    /// Side overlap target, percent.
    #[clap(long, default_value_t = 70.0)]
    side_overlap: f64,

    /// Forward overlap target, percent.
    #[clap(long, default_value_t = 75.0)]
    forward_overlap: f64,

    /// Flight height above ground level, in meters.
    #[clap(long)]
    flight_height: f64,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Parser, Debug)]
struct MultiBlockArgs {
    #[command(flatten)]
    sweep: SweepArgs,

    /// Maximum number of supplementary coverage-repair passes.
    #[clap(long, default_value_t = 10)]
    max_blocks: usize,

    /// Simplify the result before returning it.
    #[clap(long, action, default_value_t = true)]
    simplify: bool,
}

#[derive(Parser, Debug)]
struct ObliqueArgs {
    #[command(flatten)]
    sweep: SweepArgs,

    /// Gimbal pitch in degrees; must be <= 0 (nose-down).
    #[clap(long)]
    gimbal_pitch: f64,
}

#[derive(Parser, Debug)]
struct OutputArgs {
    /// Output format.
    #[clap(long, value_enum, default_value_t = OutputFormat::Geojson)]
    format: OutputFormat,

    /// Output file path; prints to stdout if omitted.
    #[clap(long)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, ValueEnum, Debug, Display)]
#[strum(serialize_all = "kebab-case")]
enum OutputFormat {
    Geojson,
    Csv,
    Summary,
}

fn load_polygon(path: &PathBuf) -> Result<Polygon> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading polygon file {path:?}"))?;
    let value: Value = serde_json::from_str(&text).context("parsing polygon file as GeoJSON")?;

    let coords = value["geometry"]["coordinates"][0]
        .as_array()
        .or_else(|| value["coordinates"][0].as_array())
        .context("expected a GeoJSON Polygon with a coordinates[0] ring")?;

    let mut vertices = Vec::with_capacity(coords.len());
    for c in coords {
        let lng = c[0].as_f64().context("vertex longitude is not a number")?;
        let lat = c[1].as_f64().context("vertex latitude is not a number")?;
        vertices.push(Point::new(lat * aerosweep::DEG, lng * aerosweep::DEG)?);
    }

    // A GeoJSON ring repeats its first vertex as its last; this crate's
    // Polygon leaves the closing edge implicit.
    if vertices.len() > 3 {
        let (first, last) = (vertices[0], *vertices.last().unwrap());
        if first.lat().0 == last.lat().0 && first.lng().0 == last.lng().0 {
            vertices.pop();
        }
    }

    Ok(Polygon::new(vertices)?)
}

fn sweep_params(args: &SweepArgs) -> Result<SweepParams> {
    Ok(SweepParams {
        direction_deg: args.direction,
        photo_width_m: args.photo_width,
        photo_length_m: args.photo_length,
        side_overlap_pct: args.side_overlap,
        forward_overlap_pct: args.forward_overlap,
        flight_height_m: args.flight_height,
        start_point: Point::new(args.start_lat * aerosweep::DEG, args.start_lng * aerosweep::DEG)?,
    })
}

fn write_output(output: &OutputArgs, polygon: &Polygon, result: &PlanResult) -> Result<()> {
    debug!(format = %output.format, "rendering plan output");
    let rendered = match output.format {
        OutputFormat::Geojson => serde_json::to_string_pretty(&export::plan_to_geojson(polygon, result))?,
        OutputFormat::Summary => serde_json::to_string_pretty(&export::plan_summary(result))?,
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            export::plan_to_csv(&mut buf, 0.0, result)?;
            String::from_utf8(buf)?
        }
    };

    match &output.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path).with_context(|| format!("creating {path:?}"))?);
            writer.write_all(rendered.as_bytes())?;
            info!("wrote plan output to {:?}", path);
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

#[instrument(level = "debug", skip(args))]
fn plan_single_cmd(args: &SweepArgs) -> Result<()> {
    let polygon = load_polygon(&args.polygon)?;
    let params = sweep_params(args)?;
    let config = PlannerConfig::default();
    let result = plan_single_with_config(&polygon, &params, &config)?;
    write_output(&args.output, &polygon, &result)
}

#[instrument(level = "debug", skip(args))]
fn plan_multi_block_cmd(args: &MultiBlockArgs) -> Result<()> {
    if args.max_blocks == 0 {
        bail!("max-blocks must be at least 1");
    }
    let polygon = load_polygon(&args.sweep.polygon)?;
    let params = sweep_params(&args.sweep)?;
    let config = PlannerConfig::default();
    let result = plan_multi_block_with_config(&polygon, &params, args.max_blocks, args.simplify, &config)?;
    write_output(&args.sweep.output, &polygon, &result)
}

#[instrument(level = "debug", skip(args))]
fn plan_oblique_cmd(args: &ObliqueArgs) -> Result<()> {
    let polygon = load_polygon(&args.sweep.polygon)?;
    let sweep = sweep_params(&args.sweep)?;
    let oblique_params = ObliqueParams {
        sweep,
        gimbal_pitch_deg: args.gimbal_pitch,
        polygon: polygon.clone(),
    };
    let config = PlannerConfig::default();
    let result = plan_oblique_with_config(&oblique_params, &config)?;

    debug!(format = %args.sweep.output.format, "rendering oblique output");
    let rendered = match args.sweep.output.format {
        OutputFormat::Geojson => serde_json::to_string_pretty(&export::oblique_to_geojson(&polygon, &result))?,
        OutputFormat::Summary => serde_json::to_string_pretty(&export::oblique_summary(&result))?,
        OutputFormat::Csv => {
            let mut buf = Vec::new();
            export::routes_to_csv(&mut buf, &result.routes)?;
            String::from_utf8(buf)?
        }
    };

    match &args.sweep.output.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path).with_context(|| format!("creating {path:?}"))?);
            writer.write_all(rendered.as_bytes())?;
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

#[instrument(level = "debug", skip(args))]
fn expanded_area_info_cmd(args: &ObliqueArgs) -> Result<()> {
    let polygon = load_polygon(&args.sweep.polygon)?;
    let sweep = sweep_params(&args.sweep)?;
    let oblique_params = ObliqueParams {
        sweep,
        gimbal_pitch_deg: args.gimbal_pitch,
        polygon,
    };
    let info = aerosweep::expanded_area_info(&oblique_params)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "expansion_distance_m": info.expansion_distance_m,
            "original_area_m2": info.original_area_m2,
            "expanded_area_m2": info.expanded_area_m2,
            "area_increase_pct": info.area_increase_pct,
        }))?
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match &args.cmd {
        Commands::PlanSingle(sub_args) => plan_single_cmd(sub_args),
        Commands::PlanMultiBlock(sub_args) => plan_multi_block_cmd(sub_args),
        Commands::PlanOblique(sub_args) => plan_oblique_cmd(sub_args),
        Commands::ExpandedAreaInfo(sub_args) => expanded_area_info_cmd(sub_args),
    }
}
