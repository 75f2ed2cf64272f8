//! End-to-end scenarios on small synthetic scenes.
//!
//! The scene is a 30×30 grid of 30 m cells with two circular alteration
//! halos (red/blue ratio 2 inside, 1 outside). A known mine sits at the
//! centre of the first halo; the second is an undiscovered look-alike.

use approx::assert_relative_eq;
use terraf_algorithms::imagery::{AlterationIndex, LandsatBands, compute_indices};
use terraf_algorithms::interpolation::{RbfInterpolator, RbfParams, interpolate_to_grid};
use terraf_algorithms::pipeline::{ProspectingConfig, ProspectingSession};
use terraf_algorithms::prospectivity::{
    Dimension, FusionWeights, ScoreSet, TargetParams, extract_targets, fuse,
};
use terraf_algorithms::signature::{SignatureParams, extract_signature};
use terraf_algorithms::similarity::score;
use terraf_core::io::{read_geotiff_from_buffer, write_geotiff_to_buffer};
use terraf_core::{
    Error, GeoTransform, IndexStack, Raster, ReferenceSite, SamplePoint, SparsePointSet,
};

const SIZE: usize = 30;
const HALOS: [(usize, usize); 2] = [(8, 8), (21, 21)];

fn transform() -> GeoTransform {
    GeoTransform::new(500_000.0, 3_000_000.0, 30.0, -30.0)
}

fn band(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let values = (0..SIZE * SIZE).map(|i| f(i / SIZE, i % SIZE)).collect();
    let mut r = Raster::from_vec(values, SIZE, SIZE).unwrap();
    r.set_transform(transform());
    r
}

fn in_halo(row: usize, col: usize) -> bool {
    HALOS.iter().any(|&(hr, hc)| {
        let dr = row as f64 - hr as f64;
        let dc = col as f64 - hc as f64;
        dr * dr + dc * dc <= 9.0
    })
}

fn scene() -> LandsatBands {
    LandsatBands {
        blue: Some(band(|_, _| 0.08)),
        green: Some(band(|_, _| 0.10)),
        red: Some(band(|r, c| if in_halo(r, c) { 0.16 } else { 0.08 })),
        nir: Some(band(|_, _| 0.25)),
        swir1: Some(band(|_, _| 0.30)),
        swir2: Some(band(|_, _| 0.20)),
    }
}

fn mine() -> ReferenceSite {
    let centre = band(|_, _| 0.0).cell_center(HALOS[0].0, HALOS[0].1);
    ReferenceSite::new("known_mine", centre.x, centre.y)
}

fn stack() -> IndexStack {
    compute_indices(&scene(), &AlterationIndex::SIGNATURE).unwrap()
}

fn spectral_only() -> ProspectingConfig {
    ProspectingConfig {
        neighborhood_radius_m: 60.0,
        min_area_ha: 0.0,
        weights: FusionWeights::new([(Dimension::Spectral, 1.0)]),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[test]
fn finds_both_halos_and_ranks_the_known_one_first() {
    let mut session = ProspectingSession::new(stack(), vec![mine()], spectral_only()).unwrap();
    let report = session.run().unwrap();

    assert_eq!(report.targets.len(), 2);
    let first = &report.targets[0];
    let second = &report.targets[1];
    assert_eq!(first.rank, 1);
    assert_eq!(first.cell_count, 29);
    assert_relative_eq!(first.area_ha, 29.0 * 0.09, epsilon = 1e-9);
    assert_relative_eq!(first.centroid_x, mine().location.x, epsilon = 1e-6);
    assert_relative_eq!(first.centroid_y, mine().location.y, epsilon = 1e-6);
    assert_eq!(first.nearest_site.as_deref(), Some("known_mine"));
    assert!(first.ranking_score > second.ranking_score);
    assert_relative_eq!(first.mean_prospectivity, second.mean_prospectivity, epsilon = 1e-9);

    let gossan = report.signature.get("GOSSAN").unwrap();
    assert_relative_eq!(gossan.mean(), 2.0, epsilon = 1e-12);
    assert!(gossan.degenerate);
}

#[test]
fn magnetic_dimension_joins_the_fusion() {
    let m = mine();
    let points: Vec<SamplePoint> = (0..6)
        .flat_map(|i| (0..6).map(move |j| (i, j)))
        .map(|(i, j)| {
            let x = 500_000.0 + i as f64 * 180.0;
            let y = 3_000_000.0 - j as f64 * 180.0;
            let d = ((x - m.location.x).powi(2) + (y - m.location.y).powi(2)).sqrt();
            SamplePoint::new(x, y, 50.0 - d / 100.0)
        })
        .collect();

    let mut session = ProspectingSession::new(
        stack(),
        vec![mine()],
        ProspectingConfig {
            neighborhood_radius_m: 60.0,
            min_area_ha: 0.0,
            ..Default::default()
        },
    )
    .unwrap()
    .with_points(Dimension::Magnetic, SparsePointSet::new("magnetic", points))
    .unwrap();

    let report = session.run().unwrap();
    assert!(!report.targets.is_empty());
    let top = &report.targets[0];
    assert!(top.dimension_scores.contains_key(&Dimension::Magnetic));
    assert!(top.dimension_scores.contains_key(&Dimension::Spectral));
    assert!(report.targets.iter().all(|t| (0.0..=1.0).contains(&t.mean_prospectivity)));
}

#[test]
fn prospectivity_surface_survives_geotiff() {
    let mut session = ProspectingSession::new(stack(), vec![mine()], spectral_only()).unwrap();
    let report = session.run().unwrap();

    let bytes = write_geotiff_to_buffer(&report.prospectivity, None).unwrap();
    let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();
    assert_eq!(back.shape(), (SIZE, SIZE));
    assert!(back.transform().approx_eq(&transform()));
    let (r, c) = HALOS[1];
    assert_relative_eq!(
        back.get(r, c).unwrap(),
        report.prospectivity.get(r, c).unwrap(),
        epsilon = 1e-12
    );
}

// ---------------------------------------------------------------------------
// Edge scenarios
// ---------------------------------------------------------------------------

#[test]
fn central_block_gives_one_target() {
    let mut values = vec![0.0; 100];
    for r in 4..7 {
        for c in 4..7 {
            values[r * 10 + c] = 1.0;
        }
    }
    let mut surface = Raster::from_vec(values, 10, 10).unwrap();
    surface.set_transform(GeoTransform::new(0.0, 300.0, 30.0, -30.0));

    let params = TargetParams {
        percentile_threshold: 80.0,
        min_area_ha: 0.0,
        pixel_area_m2: Some(900.0),
        ..Default::default()
    };
    let targets = extract_targets(&surface, &ScoreSet::new(), &[], &params).unwrap();
    assert_eq!(targets.len(), 1);
    assert_relative_eq!(targets[0].area_ha, 0.81, epsilon = 1e-12);
    let centre = surface.cell_center(5, 5);
    assert_relative_eq!(targets[0].centroid_x, centre.x, epsilon = 1e-9);
    assert_relative_eq!(targets[0].centroid_y, centre.y, epsilon = 1e-9);
}

#[test]
fn flat_surface_has_no_targets() {
    let surface = band(|_, _| 0.3);
    let params = TargetParams {
        min_area_ha: 0.0,
        ..Default::default()
    };
    assert!(extract_targets(&surface, &ScoreSet::new(), &[], &params).unwrap().is_empty());
}

#[test]
fn sites_outside_the_scene_cannot_form_a_signature() {
    let sites = [
        ReferenceSite::new("north", 500_000.0, 3_100_000.0),
        ReferenceSite::new("east", 600_000.0, 3_000_000.0),
    ];
    let err = extract_signature(&stack(), &sites, SignatureParams::default()).unwrap_err();
    assert!(matches!(err, Error::Signature { .. }));
}

#[test]
fn bad_weights_fail_before_rasters_are_read() {
    // Shapes disagree, so reading the rasters would give SizeMismatch
    let mut scores = ScoreSet::new();
    scores.insert(Dimension::Spectral, Raster::filled(4, 4, 0.5));
    scores.insert(Dimension::Magnetic, Raster::filled(5, 5, 0.5));
    scores.insert(Dimension::Geochemical, Raster::filled(6, 6, 0.5));

    let weights = FusionWeights::new([
        (Dimension::Spectral, 0.6),
        (Dimension::Magnetic, 0.3),
        (Dimension::Geochemical, 0.2),
    ]);
    assert!(matches!(fuse(&scores, &weights), Err(Error::Config { .. })));

    let config = ProspectingConfig {
        weights,
        ..Default::default()
    };
    assert!(matches!(
        ProspectingSession::new(stack(), vec![mine()], config),
        Err(Error::Config { .. })
    ));
}

#[test]
fn rbf_reproduces_training_values() {
    let points = vec![
        SamplePoint::new(500_000.0, 3_000_000.0, 12.0),
        SamplePoint::new(500_600.0, 3_000_000.0, 62.0),
        SamplePoint::new(500_000.0, 2_999_400.0, -8.0),
        SamplePoint::new(500_600.0, 2_999_400.0, 122.0),
        SamplePoint::new(500_300.0, 2_999_700.0, 7.0),
    ];
    let set = SparsePointSet::new("Cu", points.clone());
    let rbf = RbfInterpolator::build(&set, RbfParams::default()).unwrap();
    for p in &points {
        assert_relative_eq!(rbf.query(p.x, p.y), p.value, epsilon = 1e-6);
    }
}

#[test]
fn interpolated_grid_matches_samples_at_their_cells() {
    let template = band(|_, _| 0.0);
    let cells = [(2, 3, 10.0), (15, 20, 40.0), (27, 5, -5.0), (9, 26, 25.0)];
    let points = cells
        .iter()
        .map(|&(r, c, v)| {
            let p = template.cell_center(r, c);
            SamplePoint::new(p.x, p.y, v)
        })
        .collect();
    let set = SparsePointSet::new("magnetic", points);

    let grid = interpolate_to_grid(&set, &template, RbfParams::default()).unwrap();
    assert_eq!(grid.shape(), (SIZE, SIZE));
    assert!(grid.transform().approx_eq(&transform()));
    for &(r, c, v) in &cells {
        assert_relative_eq!(grid.get(r, c).unwrap(), v, epsilon = 1e-6);
    }
}

#[test]
fn similarity_peaks_at_the_mean() {
    assert_eq!(score(1.8, 1.8, 0.2), 1.0);
    let mut last = 1.0;
    for step in 1..20 {
        let s = score(1.8 + step as f64 * 0.05, 1.8, 0.2);
        assert!(s <= last);
        assert!((0.0..=1.0).contains(&s));
        last = s;
    }
}
