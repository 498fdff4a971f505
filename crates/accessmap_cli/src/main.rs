//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `accessmap_core` linkage.
//! - Run one save/dedupe/route-check pass against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use accessmap_core::{
    CoreConfig, InMemoryTagRepository, LatLng, SaveOptions, SaveOutcome, TagDraft, TagStore,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("accessmap_core ping={}", accessmap_core::ping());
    println!("accessmap_core version={}", accessmap_core::core_version());

    match smoke_run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("accessmap_core smoke=failed error={err}");
            ExitCode::FAILURE
        }
    }
}

fn smoke_run() -> Result<(), Box<dyn std::error::Error>> {
    let config = CoreConfig::default();
    let store = TagStore::with_options(InMemoryTagRepository::new(), config.validation_options());

    let ramp = TagDraft::new("Ramp", 34.6835, -82.8375);
    let nearby_ramp = TagDraft::new("Ramp", 34.68351, -82.83751);
    let obstacle = TagDraft::new("Obstacle", 0.0001, 0.001);

    let first = store.save_tag(&ramp, &SaveOptions::default());
    let blocked = store.save_tag(&nearby_ramp, &SaveOptions::default());
    println!(
        "save first={} second={} duplicates={}",
        first.success,
        blocked.success,
        blocked.validation.duplicates.len()
    );

    ensure_saved(
        "forced",
        &store.save_tag(&nearby_ramp, &SaveOptions::allowing_duplicates()),
    )?;
    let removed = store.deduplicate_tags(config.spatial_threshold_m)?;
    println!("dedupe removed={removed} remaining={}", store.get_tags()?.len());

    ensure_saved("obstacle", &store.save_tag(&obstacle, &SaveOptions::default()))?;
    let route = [
        LatLng::new(0.0, 0.0),
        LatLng::new(0.0, 0.001),
        LatLng::new(0.0, 0.002),
    ];
    let hits = config
        .obstacle_detector()
        .detect_warnings(&route, &store.get_tags()?);
    for hit in &hits {
        println!(
            "obstacle type={} distance_m={:.1} segment={}",
            hit.tag.kind, hit.distance_m, hit.segment_index
        );
    }
    println!("route obstacles={}", hits.len());
    Ok(())
}

fn ensure_saved(label: &str, outcome: &SaveOutcome) -> Result<(), String> {
    if outcome.success {
        Ok(())
    } else {
        Err(format!("{label} save rejected: {}", outcome.validation))
    }
}
