//! Bing Maps tile backend.
//!
//! Presents the Web Mercator pixel grid at one zoom level as a 3-band RGB
//! raster. Regions are assembled from 256×256 quadkey tiles fetched through
//! an [`HttpClient`]. Lower zoom levels serve as overviews.

use std::sync::Arc;

use tracing::debug;

use super::decode::decode_image;
use super::http::HttpClient;
use super::{check_region, Backend, BackendError, BandInfo, ColorInterpretation, DatasetInfo};
use crate::codec::SampleType;
use crate::coord::{Bounds, RasterRect, SpatialReference, StepSize};

/// Edge length of a Bing tile in pixels.
pub const TILE_SIZE: i64 = 256;

/// Half the width of the Web Mercator plane in metres.
pub const WEB_MERCATOR_HALF_EXTENT: f64 = 20_037_508.342_789_244;

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;

/// Default tile URL. `{code}` is the imagery set code letter,
/// `{subdomain}` cycles 0 to 3.
pub const DEFAULT_BING_URL: &str =
    "https://ecn.t{subdomain}.tiles.virtualearth.net/tiles/{code}{quadkey}.jpeg?g=1";

/// Bing imagery set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagerySet {
    Aerial,
    AerialWithLabels,
    Road,
}

impl ImagerySet {
    fn code(self) -> char {
        match self {
            ImagerySet::Aerial => 'a',
            ImagerySet::AerialWithLabels => 'h',
            ImagerySet::Road => 'r',
        }
    }

    /// Imagery sets that show Bing's "no imagery" placeholder tiles.
    pub fn has_fault_tiles(self) -> bool {
        matches!(self, ImagerySet::Aerial | ImagerySet::AerialWithLabels)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "aerial" => Some(ImagerySet::Aerial),
            "aerialwithlabels" => Some(ImagerySet::AerialWithLabels),
            "road" => Some(ImagerySet::Road),
            _ => None,
        }
    }
}

/// Converts tile coordinates to a Bing quadkey.
pub fn quadkey(tile_x: i64, tile_y: i64, zoom: u8) -> String {
    let mut key = String::with_capacity(zoom as usize);
    for i in (1..=zoom).rev() {
        let mask = 1i64 << (i - 1);
        let mut digit = b'0';
        if tile_x & mask != 0 {
            digit += 1;
        }
        if tile_y & mask != 0 {
            digit += 2;
        }
        key.push(digit as char);
    }
    key
}

#[derive(Debug, Clone, PartialEq)]
pub struct BingConfig {
    pub imagery_set: ImagerySet,
    pub zoom: u8,
    /// Coarsest zoom offered as an overview.
    pub min_zoom: u8,
    pub url_template: String,
}

impl BingConfig {
    pub fn new(imagery_set: ImagerySet, zoom: u8) -> Self {
        Self {
            imagery_set,
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            min_zoom: MIN_ZOOM,
            url_template: DEFAULT_BING_URL.to_string(),
        }
    }

    pub fn with_min_zoom(mut self, min_zoom: u8) -> Self {
        self.min_zoom = min_zoom.clamp(MIN_ZOOM, self.zoom);
        self
    }

    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }
}

/// Bing tiles at one zoom level.
pub struct BingTileBackend<C: HttpClient> {
    config: BingConfig,
    client: Arc<C>,
    name: String,
}

impl<C: HttpClient + 'static> BingTileBackend<C> {
    pub fn new(config: BingConfig, client: C) -> Self {
        Self::with_shared_client(config, Arc::new(client))
    }

    fn with_shared_client(config: BingConfig, client: Arc<C>) -> Self {
        let name = format!("bing:{:?}@{}", config.imagery_set, config.zoom);
        Self {
            config,
            client,
            name,
        }
    }

    pub fn config(&self) -> &BingConfig {
        &self.config
    }

    /// Raster size in pixels on each axis.
    pub fn map_size(&self) -> u32 {
        (TILE_SIZE as u32) << self.config.zoom
    }

    pub fn tile_url(&self, tile_x: i64, tile_y: i64) -> String {
        let subdomain = (tile_x + tile_y).rem_euclid(4);
        self.config
            .url_template
            .replace("{subdomain}", &subdomain.to_string())
            .replace("{code}", &self.config.imagery_set.code().to_string())
            .replace("{quadkey}", &quadkey(tile_x, tile_y, self.config.zoom))
    }
}

impl<C: HttpClient + 'static> Backend for BingTileBackend<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, srs_override: Option<&SpatialReference>) -> Result<DatasetInfo, BackendError> {
        let size = self.map_size();
        let bounds = Bounds::new(
            -WEB_MERCATOR_HALF_EXTENT,
            -WEB_MERCATOR_HALF_EXTENT,
            WEB_MERCATOR_HALF_EXTENT,
            WEB_MERCATOR_HALF_EXTENT,
        );
        let colors = [
            ColorInterpretation::Red,
            ColorInterpretation::Green,
            ColorInterpretation::Blue,
        ];
        Ok(DatasetInfo {
            width: size,
            height: size,
            bounds,
            step: StepSize::north_up(&bounds, size, size),
            srs: srs_override.cloned().unwrap_or(SpatialReference::Projected),
            bands: colors
                .iter()
                .map(|c| BandInfo::new(SampleType::Byte, size, size).with_color(*c))
                .collect(),
        })
    }

    fn read_region(&self, rect: &RasterRect, bands: &[usize]) -> Result<Vec<u8>, BackendError> {
        let size = self.map_size();
        check_region(size, size, 3, rect, bands)?;

        let columns = rect.columns();
        let band_bytes = columns * rect.rows();
        let mut out = vec![0u8; band_bytes * bands.len()];
        let tile = TILE_SIZE as usize;

        for ty in rect.y_min.div_euclid(TILE_SIZE)..=rect.y_max.div_euclid(TILE_SIZE) {
            for tx in rect.x_min.div_euclid(TILE_SIZE)..=rect.x_max.div_euclid(TILE_SIZE) {
                let url = self.tile_url(tx, ty);
                debug!(backend = %self.name, tx, ty, "Fetching tile");
                let payload = self.client.get(&url)?;
                let pixels = decode_image(&payload, SampleType::Byte, 3, tile, tile, bands)?;

                let tile_rect = RasterRect::new(
                    tx * TILE_SIZE,
                    ty * TILE_SIZE,
                    tx * TILE_SIZE + TILE_SIZE - 1,
                    ty * TILE_SIZE + TILE_SIZE - 1,
                );
                let Some(overlap) = tile_rect.intersection(rect) else {
                    continue;
                };

                let span = overlap.columns();
                for (i, _) in bands.iter().enumerate() {
                    for y in overlap.y_min..=overlap.y_max {
                        let src = i * tile * tile
                            + (y - tile_rect.y_min) as usize * tile
                            + (overlap.x_min - tile_rect.x_min) as usize;
                        let dst = i * band_bytes
                            + (y - rect.y_min) as usize * columns
                            + (overlap.x_min - rect.x_min) as usize;
                        out[dst..dst + span].copy_from_slice(&pixels[src..src + span]);
                    }
                }
            }
        }
        Ok(out)
    }

    fn no_data_value(&self, _band: usize) -> Option<f64> {
        None
    }

    fn has_overview(&self) -> bool {
        self.config.zoom > self.config.min_zoom
    }

    fn open_overview(&self) -> Result<Arc<dyn Backend>, BackendError> {
        if !self.has_overview() {
            return Err(BackendError::Structure(format!("{} has no overviews", self.name)));
        }
        let mut config = self.config.clone();
        config.zoom -= 1;
        Ok(Arc::new(Self::with_shared_client(config, self.client.clone())))
    }
}
