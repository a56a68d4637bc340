//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! The single place where INI key names are mapped to settings fields.

use std::str::FromStr;

use ini::{Ini, Properties};

use super::size::parse_size;
use super::{ConfigFile, ConfigFileError};
use crate::backend::{BackendConfig, BingConfig, ImagerySet, RawFileConfig, WcsConfig};
use crate::codec::SampleType;
use crate::coord::{Bounds, SpatialReference};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [backend] section
    if let Some(section) = ini.section(Some("backend")) {
        if let Some(timeout) = number(section, "backend", "http_timeout", "seconds")? {
            config.http_timeout_secs = timeout;
        }
        let (backend, locator) = parse_backend(section)?;
        config.backend = backend;
        config.locator = locator;
    }

    // [coverage] section
    if let Some(section) = ini.section(Some("coverage")) {
        if let Some(v) = section.get("bands") {
            config.coverage.bands = parse_list(v)
                .ok_or_else(|| invalid("coverage", "bands", v, "expected band indices like '2,1,0'"))?;
        }
        if let Some(v) = section.get("srs") {
            config.coverage.srs = Some(parse_srs("coverage", v)?);
        }
        config.coverage.axis_limit = number(section, "coverage", "axis_limit", "a positive integer")?;
        config.coverage.forced_no_data = number(section, "coverage", "forced_no_data", "a number")?;
        config.coverage.wrap_x = flag(section, "coverage", "wrap_x")?;
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(attempts) = number::<u32>(section, "retry", "max_attempts", "a positive integer")? {
            if attempts == 0 {
                return Err(invalid("retry", "max_attempts", "0", "must be at least 1"));
            }
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = number(section, "retry", "delay_ms", "milliseconds")? {
            config.retry.delay_ms = delay;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("buffer_ceiling") {
            config.cache.buffer_ceiling = parse_size(v).map_err(|_| {
                invalid("cache", "buffer_ceiling", v, "expected format like '100MB' or '1GB'")
            })?;
        }
        if let Some(capacity) = number(section, "cache", "capacity", "a positive integer")? {
            config.cache.capacity = capacity;
        }
        if let Some(trim_to) = number(section, "cache", "trim_to", "a positive integer")? {
            config.cache.trim_to = trim_to;
        }
        if config.cache.trim_to > config.cache.capacity {
            return Err(invalid(
                "cache",
                "trim_to",
                &config.cache.trim_to.to_string(),
                "must not exceed capacity",
            ));
        }
    }

    // [batch] section
    if let Some(section) = ini.section(Some("batch")) {
        if let Some(size) = number::<i64>(section, "batch", "chunk_size", "a positive integer")? {
            if size <= 0 {
                return Err(invalid("batch", "chunk_size", &size.to_string(), "must be positive"));
            }
            config.batch.chunk_size = size;
        }
        if let Some(points) = number(section, "batch", "points_per_task", "a positive integer")? {
            config.batch.points_per_task = points;
        }
        config.batch.threads = number(section, "batch", "threads", "a positive integer")?;
    }

    Ok(config)
}

/// Builds the backend named by `kind`, returning it with its locator.
fn parse_backend(section: &Properties) -> Result<(BackendConfig, String), ConfigFileError> {
    let kind = section.get("kind").unwrap_or("null").trim().to_lowercase();

    let sample_type = match section.get("sample_type") {
        Some(v) => Some(SampleType::parse(v).ok_or_else(|| {
            invalid("backend", "sample_type", v, "expected a sample type like 'byte' or 'uint16'")
        })?),
        None => None,
    };
    let band_count: usize = number(section, "backend", "bands", "a positive integer")?.unwrap_or(1);
    let no_data: Option<f64> = number(section, "backend", "no_data", "a number")?;
    let srs = match section.get("srs") {
        Some(v) => Some(parse_srs("backend", v)?),
        None => None,
    };
    let bounds = match section.get("bounds") {
        Some(v) => Some(parse_bounds(v)?),
        None => None,
    };

    match kind.as_str() {
        "memory" => {
            let width: u32 = required_number(section, "width")?;
            let height: u32 = required_number(section, "height")?;
            let config = BackendConfig::Memory {
                width,
                height,
                sample_type: sample_type.unwrap_or(SampleType::Byte),
                band_count,
                bounds: bounds
                    .unwrap_or_else(|| Bounds::new(0.0, 0.0, f64::from(width), f64::from(height))),
            };
            Ok((config, "memory".to_string()))
        }
        "raw" => {
            let path = required(section, "path")?;
            let mut raw = RawFileConfig::new(
                path,
                required_number(section, "width")?,
                required_number(section, "height")?,
                sample_type.unwrap_or(SampleType::Byte),
            )
            .with_bands(band_count);
            if let Some(bounds) = bounds {
                raw = raw.with_bounds(bounds);
            }
            if let Some(srs) = srs {
                raw = raw.with_srs(srs);
            }
            if let Some(value) = no_data {
                raw = raw.with_no_data(value);
            }
            Ok((BackendConfig::Raw(raw), path.to_string()))
        }
        "wcs" => {
            let url = required(section, "url")?;
            let bounds = bounds.ok_or_else(|| missing("bounds"))?;
            let mut wcs = WcsConfig::new(
                url,
                required(section, "coverage")?,
                bounds,
                required_number(section, "width")?,
                required_number(section, "height")?,
            )
            .with_layout(sample_type.unwrap_or(SampleType::UInt16), band_count);
            if let Some(crs) = section.get("crs") {
                wcs = wcs.with_crs(crs.trim());
            }
            if let Some(format) = section.get("format") {
                wcs = wcs.with_format(format.trim());
            }
            if let Some(levels) = number(section, "backend", "overview_levels", "a positive integer")? {
                wcs = wcs.with_overview_levels(levels);
            }
            if let Some(value) = no_data {
                wcs = wcs.with_no_data(value);
            }
            Ok((BackendConfig::Wcs(wcs), url.to_string()))
        }
        "bing" => {
            let imagery_set = match section.get("imagery_set") {
                Some(v) => ImagerySet::parse(v).ok_or_else(|| {
                    invalid(
                        "backend",
                        "imagery_set",
                        v,
                        "must be one of: aerial, aerialwithlabels, road",
                    )
                })?,
                None => ImagerySet::Aerial,
            };
            let mut bing = BingConfig::new(imagery_set, required_number(section, "zoom")?);
            if let Some(min_zoom) = number(section, "backend", "min_zoom", "a zoom level")? {
                bing = bing.with_min_zoom(min_zoom);
            }
            if let Some(template) = section.get("url_template") {
                bing = bing.with_url_template(template.trim());
            }
            let locator = format!("bing:{:?}@{}", bing.imagery_set, bing.zoom);
            Ok((BackendConfig::Bing(bing), locator))
        }
        "null" => Ok((BackendConfig::Null, "null".to_string())),
        other => Err(invalid(
            "backend",
            "kind",
            other,
            "must be one of: memory, raw, wcs, bing, null",
        )),
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(key: &str) -> ConfigFileError {
    ConfigFileError::MissingValue {
        section: "backend".to_string(),
        key: key.to_string(),
    }
}

/// Optional key parsed with `FromStr`.
fn number<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, ConfigFileError> {
    match section.get(key) {
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(name, key, v, &format!("expected {}", expected))),
        None => Ok(None),
    }
}

fn required<'a>(section: &'a Properties, key: &str) -> Result<&'a str, ConfigFileError> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| missing(key))
}

fn required_number<T: FromStr>(section: &Properties, key: &str) -> Result<T, ConfigFileError> {
    number(section, "backend", key, "a positive integer")?.ok_or_else(|| missing(key))
}

fn flag(section: &Properties, name: &str, key: &str) -> Result<Option<bool>, ConfigFileError> {
    match section.get(key) {
        Some(v) => match v.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(Some(true)),
            "false" | "no" | "0" | "off" => Ok(Some(false)),
            _ => Err(invalid(name, key, v, "must be true or false")),
        },
        None => Ok(None),
    }
}

fn parse_srs(name: &str, v: &str) -> Result<SpatialReference, ConfigFileError> {
    SpatialReference::parse(v).ok_or_else(|| {
        invalid(name, "srs", v, "expected geographic, projected or an EPSG code")
    })
}

fn parse_list(v: &str) -> Option<Vec<usize>> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

/// `x_min,y_min,x_max,y_max`
fn parse_bounds(v: &str) -> Result<Bounds, ConfigFileError> {
    let err = || invalid("backend", "bounds", v, "expected 'x_min,y_min,x_max,y_max'");
    let parts: Vec<f64> = v
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| err())?;
    match parts.as_slice() {
        [x_min, y_min, x_max, y_max] if x_min < x_max && y_min < y_max => {
            Ok(Bounds::new(*x_min, *y_min, *x_max, *y_max))
        }
        _ => Err(err()),
    }
}
