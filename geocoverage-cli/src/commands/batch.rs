//! `batch`: values for many points through the parallel batch getter.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use geocoverage::batch::{AsyncBatchGetter, CompletedRequest, FaultCheckingConsumer};
use geocoverage::coord::NativePoint;
use parking_lot::Mutex;

use super::common::{format_value, load_config, open_coverage};
use crate::error::CliError;

/// Parses `x,y` lines. Blank lines and `#` comments are skipped.
pub fn parse_points<R: BufRead>(reader: R) -> Result<Vec<NativePoint>, CliError> {
    let mut points = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|error| CliError::Input {
            path: "<points>".to_string(),
            error,
        })?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parse_err = |message: &str| CliError::Parse {
            line: index + 1,
            message: format!("{} in '{}'", message, line),
        };
        let (x, y) = line
            .split_once(',')
            .ok_or_else(|| parse_err("expected 'x,y'"))?;
        let x: f64 = x.trim().parse().map_err(|_| parse_err("bad x"))?;
        let y: f64 = y.trim().parse().map_err(|_| parse_err("bad y"))?;
        points.push(NativePoint::new(x, y));
    }
    Ok(points)
}

pub fn run(config_path: Option<&Path>, file: Option<&Path>) -> Result<(), CliError> {
    let points = match file {
        Some(path) => {
            let file = File::open(path).map_err(|error| CliError::Input {
                path: path.display().to_string(),
                error,
            })?;
            parse_points(BufReader::new(file))?
        }
        None => parse_points(io::stdin().lock())?,
    };

    let config = load_config(config_path)?;
    let coverage = open_coverage(&config)?;

    let results: Arc<Mutex<Vec<(usize, NativePoint, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = results.clone();
    let consumer = FaultCheckingConsumer::for_imagery(
        config.backend.imagery_set(),
        Arc::new(move |request: CompletedRequest| {
            let value = format_value(request.center());
            sink.lock().push((request.id, request.native, value));
        }),
    );

    let getter = AsyncBatchGetter::new(coverage, consumer, config.to_batch_config());
    getter.add_requests(points)?;
    let ok = getter.join()?;

    let mut results = results.lock();
    results.sort_by_key(|(id, _, _)| *id);
    for (_, native, value) in results.iter() {
        println!("{},{},{}", native.x, native.y, value);
    }

    if ok {
        Ok(())
    } else {
        Err(CliError::BatchFailed)
    }
}
