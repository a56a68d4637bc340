//! Common helpers shared across CLI commands.

use std::io;
use std::path::Path;
use std::sync::Arc;

use geocoverage::backend::open_backend;
use geocoverage::config::ConfigFile;
use geocoverage::coverage::CoverageValueService;
use geocoverage::overview::OverviewChain;
use geocoverage::TypedValue;
use tracing::info;

use crate::error::CliError;

/// Loads an explicit config file, or the default one if present.
///
/// Unlike the default path, an explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) if !path.exists() => Err(CliError::Input {
            path: path.display().to_string(),
            error: io::Error::new(io::ErrorKind::NotFound, "config file not found"),
        }),
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// An opened dataset: one coverage, or a chain of overviews for network
/// sources.
pub enum Source {
    Single(Arc<CoverageValueService>),
    Overviews(OverviewChain),
}

impl Source {
    /// The full-resolution coverage.
    pub fn finest(&self) -> &Arc<CoverageValueService> {
        match self {
            Source::Single(service) => service,
            Source::Overviews(chain) => chain.finest(),
        }
    }

    /// Coarsest coverage fine enough for `precision` metres, or the finest
    /// one when no precision is asked for.
    pub fn for_precision(&self, precision: Option<f64>) -> &Arc<CoverageValueService> {
        match (self, precision) {
            (Source::Overviews(chain), Some(precision)) => chain.select_for_precision(precision),
            _ => self.finest(),
        }
    }

    pub fn overviews(&self) -> Option<&OverviewChain> {
        match self {
            Source::Overviews(chain) => Some(chain),
            Source::Single(_) => None,
        }
    }
}

/// Creates the configured backend and opens it.
pub fn open_source(config: &ConfigFile) -> Result<Source, CliError> {
    let backend = open_backend(&config.backend, config.http_timeout_secs)?;
    info!(
        backend = backend.name(),
        locator = %config.locator,
        overviews = config.backend.serves_overviews(),
        "Opening coverage"
    );
    if config.backend.serves_overviews() {
        let chain = OverviewChain::build(backend, &config.to_overview_config())?;
        return Ok(Source::Overviews(chain));
    }
    let service = CoverageValueService::open_new(backend, config.to_coverage_config())?;
    Ok(Source::Single(Arc::new(service)))
}

/// Opens the configured dataset at full resolution.
pub fn open_coverage(config: &ConfigFile) -> Result<Arc<CoverageValueService>, CliError> {
    Ok(open_source(config)?.finest().clone())
}

/// Renders a value, or `nodata` for an absent one.
pub fn format_value(value: Option<&TypedValue>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "nodata".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geocoverage::codec::Scalar;

    #[test]
    fn test_missing_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("none.ini"))).unwrap_err();
        assert!(matches!(err, CliError::Input { .. }));
    }

    #[test]
    fn test_raw_source_is_single() {
        let config = ConfigFile::parse("[backend]\nkind = memory\nwidth = 4\nheight = 4\n").unwrap();
        let source = open_source(&config).unwrap();
        assert!(source.overviews().is_none());
        assert!(Arc::ptr_eq(source.for_precision(Some(1.0)), source.finest()));
    }

    #[test]
    fn test_wcs_source_builds_overviews() {
        // 1024 cells over one equator: detail level 10, then 9 and 8
        let config = ConfigFile::parse(
            "[backend]\nkind = wcs\nurl = http://localhost/wcs\ncoverage = dem\nbounds = 0,0,40075016.686,40075016.686\nwidth = 1024\nheight = 1024\ncrs = EPSG:3857\noverview_levels = 2\n",
        )
        .unwrap();
        let source = open_source(&config).unwrap();

        let chain = source.overviews().unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(source.finest().backend().name(), "wcs:dem@0");
        // just over half a level-8 pixel still resolves to level 8
        let coarse = source.for_precision(Some(40_075_016.686 / 256.0 / 2.0 * 1.01));
        assert_eq!(coarse.backend().name(), "wcs:dem@2");
        assert_eq!(source.for_precision(None).backend().name(), "wcs:dem@0");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(None), "nodata");
        assert_eq!(
            format_value(Some(&TypedValue::Scalar(Scalar::U16(7)))),
            TypedValue::Scalar(Scalar::U16(7)).to_string()
        );
    }
}
