//! `info`: describe the configured coverage.

use std::path::Path;

use geocoverage::config::format_size;

use super::common::{load_config, open_source};
use crate::error::CliError;

pub fn run(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let source = open_source(&config)?;
    let coverage = source.finest();
    let descriptor = coverage.descriptor()?;

    let b = &descriptor.bounds;
    println!("Coverage: {}", config.locator);
    println!("  Backend:   {}", coverage.backend().name());
    println!("  Size:      {} x {}", descriptor.raster.columns(), descriptor.raster.rows());
    println!("  Bounds:    {}, {} .. {}, {}", b.x_min, b.y_min, b.x_max, b.y_max);
    println!("  Step:      {}, {}", descriptor.step.x, descriptor.step.y);
    println!("  SRS:       {:?}", descriptor.srs);
    println!(
        "  Samples:   {} x {} band(s), bands {:?}",
        descriptor.layout.sample_type, descriptor.layout.band_count, descriptor.bands
    );
    println!("  Context:   {}", descriptor.context);
    println!("  Wrap X:    {}", descriptor.wrap_x);
    match coverage.spatial_precision()? {
        Some(precision) => println!("  Precision: {:.3}", precision),
        None => println!("  Precision: unknown"),
    }
    println!(
        "  Buffer ceiling: {}",
        format_size(coverage.config().buffer_ceiling)
    );
    if let Some(chain) = source.overviews() {
        println!("  Overviews: {} level(s), coarsest first", chain.len());
        for level in chain.levels() {
            let d = level.service.descriptor()?;
            println!(
                "    {:<16} {:>6.2}  {} x {}",
                level.service.backend().name(),
                level.resolution,
                d.raster.columns(),
                d.raster.rows()
            );
        }
    }
    Ok(())
}
