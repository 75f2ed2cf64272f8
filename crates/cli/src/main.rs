//! terraf CLI - mineral prospectivity scoring

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use terraf_algorithms::geophysics::MagneticSurface;
use terraf_algorithms::imagery::{
    AlterationIndex, Band, LandsatBands, anomaly_zone, coincident_zones, compute_indices,
    zone_area_km2,
};
use terraf_algorithms::pipeline::{ProspectingConfig, ProspectingSession, RunReport};
use terraf_algorithms::prospectivity::{Dimension, FusionWeights, classify_prospectivity};
use terraf_algorithms::signature::{
    SignatureParams, extract_signature, site_consistency, site_statistics, validate_signature,
};
use terraf_core::io::{GeoTiffOptions, read_geotiff, write_geotiff};
use terraf_core::{Connectivity, IndexStack, Raster, ReferenceSite, SamplePoint, SparsePointSet};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "terraf")]
#[command(author, version, about = "Mineral prospectivity scoring", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute alteration indices from Landsat OLI bands
    Indices {
        #[command(flatten)]
        bands: BandArgs,
        /// Output directory, one GeoTIFF per index
        #[arg(short, long)]
        output: PathBuf,
        /// Indices to compute (default: every index the given bands allow)
        #[arg(short, long, value_delimiter = ',')]
        index: Vec<String>,
        /// Also write anomaly zone masks and their intersection
        #[arg(long)]
        zones: bool,
    },
    /// Extract the spectral signature of the reference sites
    Signature {
        #[command(flatten)]
        inputs: StackArgs,
        /// Neighborhood radius around each site, in metres
        #[arg(short, long, default_value = "500")]
        radius: f64,
        /// Write the signature, validation and site statistics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score, fuse and extract ranked targets
    Run {
        #[command(flatten)]
        inputs: StackArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        /// Output JSON report (signature and ranked targets)
        #[arg(short, long)]
        output: PathBuf,
        /// Write the prospectivity surface as GeoTIFF
        #[arg(long)]
        prospectivity: Option<PathBuf>,
        /// Write the prospectivity classes (0-3) as GeoTIFF
        #[arg(long)]
        classes: Option<PathBuf>,
    },
    /// Compare targets across fusion weight sets
    Sensitivity {
        #[command(flatten)]
        inputs: StackArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        /// Weight sets to compare, e.g. spectral=0.7,magnetic=0.3 (repeatable).
        /// The configured weights are the baseline.
        #[arg(long = "weight-set", value_parser = parse_weights, required = true)]
        weight_sets: Vec<FusionWeights>,
        /// Output JSON report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct BandArgs {
    /// Blue band (B2)
    #[arg(long)]
    blue: Option<PathBuf>,
    /// Green band (B3)
    #[arg(long)]
    green: Option<PathBuf>,
    /// Red band (B4)
    #[arg(long)]
    red: Option<PathBuf>,
    /// Near infrared band (B5)
    #[arg(long)]
    nir: Option<PathBuf>,
    /// Shortwave infrared 1 band (B6)
    #[arg(long)]
    swir1: Option<PathBuf>,
    /// Shortwave infrared 2 band (B7)
    #[arg(long)]
    swir2: Option<PathBuf>,
}

#[derive(Args)]
struct StackArgs {
    /// Index raster as NAME=path (repeatable), e.g. GOSSAN=gossan.tif
    #[arg(long = "index", value_parser = parse_named_path, required = true)]
    indices: Vec<(String, PathBuf)>,
    /// Reference sites: JSON list of {name, x, y} or {name, lat, lon}
    #[arg(short, long)]
    sites: PathBuf,
}

#[derive(Args)]
struct TuningArgs {
    /// JSON configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Magnetometry points: JSON list of {x, y, value}
    #[arg(long)]
    magnetic: Option<PathBuf>,
    /// Geochemical points, one JSON file per element (repeatable)
    #[arg(long)]
    geochem: Vec<PathBuf>,
    /// Fusion weights, e.g. spectral=0.6,magnetic=0.4
    #[arg(short, long, value_parser = parse_weights)]
    weights: Option<FusionWeights>,
    /// Percentile of the prospectivity surface used as threshold
    #[arg(short, long)]
    percentile: Option<f64>,
    /// Minimum target area in hectares
    #[arg(long)]
    min_area: Option<f64>,
    /// Region connectivity: 4 or 8
    #[arg(long)]
    connectivity: Option<u8>,
    /// Neighborhood radius around each site, in metres
    #[arg(short, long)]
    radius: Option<f64>,
    /// Magnetic surface to score: field, horizontal_gradient,
    /// vertical_derivative, tilt_angle or analytic_signal
    #[arg(long)]
    magnetic_surface: Option<MagneticSurface>,
}

/// A reference site as given on disk
#[derive(Deserialize)]
#[serde(untagged)]
enum SiteRecord {
    Projected { name: String, x: f64, y: f64 },
    Geographic { name: String, lat: f64, lon: f64 },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner(&format!("Reading {}...", path.display()));
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {} ({})", raster.cols(), raster.rows(), path.display());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::float32()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_json<T: serde::Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_named_path(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected NAME=path, got '{s}'")),
    }
}

fn parse_weights(s: &str) -> std::result::Result<FusionWeights, String> {
    FusionWeights::from_str(s).map_err(|e| e.to_string())
}

fn load_stack(inputs: &StackArgs) -> Result<(IndexStack, Vec<ReferenceSite>)> {
    let mut stack = IndexStack::new();
    let mut crs = None;
    for (name, path) in &inputs.indices {
        let raster = read_raster(path)?;
        if crs.is_none() {
            crs = raster.crs().cloned();
        }
        stack
            .insert(name.clone(), raster)
            .with_context(|| format!("Index {name} is not co-registered with the stack"))?;
    }

    let records: Vec<SiteRecord> = read_json(&inputs.sites)?;
    let sites = records
        .into_iter()
        .map(|record| match record {
            SiteRecord::Projected { name, x, y } => Ok(ReferenceSite::new(name, x, y)),
            SiteRecord::Geographic { name, lat, lon } => {
                let Some(crs) = &crs else {
                    bail!("Site {name} is given in lat/lon but the index rasters carry no CRS");
                };
                ReferenceSite::from_lat_lon(&name, lat, lon, crs)
                    .with_context(|| format!("Failed to project site {name}"))
            }
        })
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} indices and {} reference sites", stack.len(), sites.len());
    Ok((stack, sites))
}

fn load_points(path: &Path) -> Result<SparsePointSet> {
    let points: Vec<SamplePoint> = read_json(path)?;
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "points".to_string());
    info!("Loaded {} points for {}", points.len(), label);
    Ok(SparsePointSet::new(label, points))
}

fn build_config(tuning: &TuningArgs) -> Result<ProspectingConfig> {
    let mut config = match &tuning.config {
        Some(path) => read_json(path)?,
        None => ProspectingConfig::default(),
    };
    if let Some(w) = &tuning.weights {
        config.weights = w.clone();
    }
    if let Some(p) = tuning.percentile {
        config.percentile_threshold = p;
    }
    if let Some(a) = tuning.min_area {
        config.min_area_ha = a;
    }
    if let Some(c) = tuning.connectivity {
        config.connectivity = Connectivity::try_from(c).map_err(anyhow::Error::msg)?;
    }
    if let Some(r) = tuning.radius {
        config.neighborhood_radius_m = r;
    }
    if let Some(m) = tuning.magnetic_surface {
        config.magnetic_surface = m;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn build_session(inputs: &StackArgs, tuning: &TuningArgs) -> Result<ProspectingSession> {
    let config = build_config(tuning)?;
    let (stack, sites) = load_stack(inputs)?;
    let mut session = ProspectingSession::new(stack, sites, config)?;
    if let Some(path) = &tuning.magnetic {
        session.add_points(Dimension::Magnetic, load_points(path)?)?;
    }
    for path in &tuning.geochem {
        session.add_points(Dimension::Geochemical, load_points(path)?)?;
    }
    Ok(session)
}

fn load_bands(args: &BandArgs) -> Result<LandsatBands> {
    let mut bands = LandsatBands::default();
    let paths = [
        (Band::Blue, &args.blue),
        (Band::Green, &args.green),
        (Band::Red, &args.red),
        (Band::Nir, &args.nir),
        (Band::Swir1, &args.swir1),
        (Band::Swir2, &args.swir2),
    ];
    for (band, path) in paths {
        if let Some(path) = path {
            bands.set(band, read_raster(path)?);
        }
    }
    Ok(bands)
}

fn print_targets(report: &RunReport) {
    match report.threshold {
        Some(t) => println!("Threshold: {:.4} ({} regions)", t, report.regions_found),
        None => println!("Prospectivity surface has no valid cells"),
    }
    println!("Targets: {}", report.targets.len());
    for t in report.targets.iter().take(10) {
        let site = match (&t.nearest_site, t.distance_km) {
            (Some(name), Some(d)) => format!("{name} at {d:.1} km"),
            _ => "-".to_string(),
        };
        println!(
            "  #{:<3} ({:.0}, {:.0})  {:>8.1} ha  mean {:.3}  score {:.3}  nearest {}",
            t.rank, t.centroid_x, t.centroid_y, t.area_ha, t.mean_prospectivity, t.ranking_score, site
        );
    }
    let a = &report.class_areas;
    println!(
        "Class areas (ha): background {:.1}, medium {:.1}, high {:.1}, very high {:.1}",
        a.background, a.medium, a.high, a.very_high
    );
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Indices ──────────────────────────────────────────────────
        Commands::Indices {
            bands,
            output,
            index,
            zones,
        } => {
            let bands = load_bands(&bands)?;
            let selected: Vec<AlterationIndex> = if index.is_empty() {
                AlterationIndex::ALL
                    .into_iter()
                    .filter(|idx| idx.required_bands().iter().all(|&b| bands.get(b).is_some()))
                    .collect()
            } else {
                index
                    .iter()
                    .map(|s| AlterationIndex::from_str(s))
                    .collect::<terraf_core::Result<_>>()?
            };
            if selected.is_empty() {
                bail!("The given bands do not allow any alteration index");
            }

            std::fs::create_dir_all(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let start = Instant::now();
            let pb = spinner("Computing alteration indices...");
            let stack = compute_indices(&bands, &selected)?;
            pb.finish_and_clear();

            for (name, raster) in stack.iter() {
                write_result(raster, &output.join(format!("{name}.tif")))?;
            }

            if zones {
                let mut masks = Vec::new();
                for idx in &selected {
                    let Some((pct, direction)) = idx.default_zone() else {
                        continue;
                    };
                    let raster = stack.require(idx.name())?;
                    let mask = anomaly_zone(raster, pct, direction)?;
                    println!("  {} zone: {:.3} km²", idx, zone_area_km2(&mask));
                    write_result(&mask, &output.join(format!("{}_zone.tif", idx.name())))?;
                    masks.push(mask);
                }
                if masks.len() > 1 {
                    let refs: Vec<&Raster<f64>> = masks.iter().collect();
                    let coincident = coincident_zones(&refs)?;
                    println!("  Coincident zones: {:.3} km²", zone_area_km2(&coincident));
                    write_result(&coincident, &output.join("coincident_zones.tif"))?;
                }
            }
            done(&format!("{} indices", stack.len()), &output, start.elapsed());
        }

        // ── Signature ────────────────────────────────────────────────
        Commands::Signature {
            inputs,
            radius,
            output,
        } => {
            let (stack, sites) = load_stack(&inputs)?;
            let params = SignatureParams {
                radius_m: radius,
                ..Default::default()
            };
            let start = Instant::now();
            let signature = extract_signature(&stack, &sites, params)?;
            let validation = validate_signature(&stack, &signature)?;
            let per_site = site_statistics(&stack, &sites, params)?;
            let consistency = site_consistency(&per_site);

            for site in signature.coverage.iter().filter(|c| c.is_outside()) {
                warn!("Site {} lies outside the raster", site.site);
            }
            println!("Signature ({} m radius):", radius);
            for (name, sig) in &signature.indices {
                let rank = validation
                    .get(name)
                    .map(|v| format!("p{:.1} {:?}", v.percentile, v.discrimination))
                    .unwrap_or_default();
                println!(
                    "  {:<16} mean {:>9.4}  std {:>8.4}  n {:>5}  {}",
                    name, sig.mean(), sig.std(), sig.summary.count, rank
                );
                if let Some(c) = consistency.get(name) {
                    println!("  {:<16} CV {:.1}% across {} sites ({:?})", "", c.cv_percent, c.sites, c.level);
                }
            }

            if let Some(path) = output {
                let doc = serde_json::json!({
                    "signature": signature,
                    "validation": validation,
                    "sites": per_site,
                    "consistency": consistency,
                });
                write_json(&doc, &path)?;
                done("Signature", &path, start.elapsed());
            }
        }

        // ── Run ──────────────────────────────────────────────────────
        Commands::Run {
            inputs,
            tuning,
            output,
            prospectivity,
            classes,
        } => {
            let mut session = build_session(&inputs, &tuning)?;
            let start = Instant::now();
            let pb = spinner("Scoring and extracting targets...");
            let report = session.run();
            pb.finish_and_clear();
            let report = report.context("Prospecting run failed")?;

            print_targets(&report);
            write_json(&report, &output)?;
            if let Some(path) = prospectivity {
                write_result(&report.prospectivity, &path)?;
            }
            if let Some(path) = classes {
                write_result(&classify_prospectivity(&report.prospectivity)?, &path)?;
            }
            done("Targets", &output, start.elapsed());
        }

        // ── Sensitivity ──────────────────────────────────────────────
        Commands::Sensitivity {
            inputs,
            tuning,
            weight_sets,
            output,
        } => {
            let mut session = build_session(&inputs, &tuning)?;
            let mut sets = vec![session.config().weights.clone()];
            sets.extend(weight_sets);

            let start = Instant::now();
            let pb = spinner("Running weight sets...");
            let report = session.sensitivity(&sets);
            pb.finish_and_clear();
            let report = report.context("Sensitivity analysis failed")?;

            for run in &report.runs {
                println!(
                    "  {:<40} {:>4} targets  {:>10.1} ha  overlap {:.3}",
                    run.weights.to_string(),
                    run.target_count,
                    run.total_area_ha,
                    run.overlap_with_baseline
                );
            }
            println!("Mean overlap with baseline: {:.3}", report.mean_overlap);
            if let Some(path) = output {
                write_json(&report, &path)?;
                done("Sensitivity report", &path, start.elapsed());
            }
        }
    }

    Ok(())
}
