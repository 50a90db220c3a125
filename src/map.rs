//! Choropleth layer state and the year-selection flow that rebuilds it.
//!
//! A [`MapOrchestrator`] owns one [`MapView`]: the sales mapping for the selected year
//! and the layer drawn from it. Both are swapped together when a selection completes, so
//! a failed or superseded load never leaves a half-updated view behind.

use crate::client::{GeometrySource, SalesApi};
use crate::color::{color_for, ColorBucket};
use crate::config::MapConfig;
use crate::error::LoadError;
use crate::resolve::{resolve_sales, CountryResolver};
use crate::spatial::FeatureIndex;
use crate::types::{sales_by_code, SalesByCode};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection};
use rayon::prelude::*;
use serde_json::{json, Map};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct LayerStyle {
    pub fill_opacity: f64,
    pub stroke_color: String,
    pub stroke_width: u32,
}

impl Default for LayerStyle {
    fn default() -> Self {
        Self::from_config(&MapConfig::default())
    }
}

impl LayerStyle {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            fill_opacity: config.fill_opacity,
            stroke_color: config.stroke_color.clone(),
            stroke_width: config.stroke_width,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyledFeature {
    pub code: String,
    pub name: String,
    pub sales: f64,
    pub bucket: ColorBucket,
    pub geometry: Option<MultiPolygon<f64>>,
}

impl StyledFeature {
    fn from_feature(feature: &Feature, sales: &SalesByCode, resolver: &CountryResolver) -> Self {
        let code = resolver.resolve_code(feature);
        let value = resolve_sales(&code, sales);
        Self {
            name: resolver.resolve_display_name(feature),
            bucket: color_for(value),
            sales: value,
            geometry: polygons_of(feature),
            code,
        }
    }

    pub fn fill_color(&self) -> &'static str {
        self.bucket.hex()
    }
}

fn polygons_of(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.as_ref()?;
    let converted: geo::Geometry<f64> = match geometry.value.clone().try_into() {
        Ok(g) => g,
        Err(e) => {
            warn!(error = ?e, "skipping unconvertible feature geometry");
            return None;
        }
    };
    match converted {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        _ => None, // Points and lines have no fill
    }
}

/// Styled features for one year, in draw order: base features first, then overlays.
#[derive(Clone)]
pub struct Layer {
    pub year: i32,
    pub style: LayerStyle,
    pub features: Vec<StyledFeature>,
    index: FeatureIndex,
}

impl Layer {
    pub fn build(
        year: i32,
        sales: &SalesByCode,
        collections: &[&FeatureCollection],
        resolver: &CountryResolver,
        style: LayerStyle,
    ) -> Self {
        let mut features: Vec<StyledFeature> = Vec::new();
        for collection in collections {
            features.par_extend(
                collection
                    .features
                    .par_iter()
                    .map(|f| StyledFeature::from_feature(f, sales, resolver)),
            );
        }
        let index = FeatureIndex::build(features.iter().map(|f| f.geometry.as_ref()));

        Self {
            year,
            style,
            features,
            index,
        }
    }

    pub fn feature_at(&self, lon: f64, lat: f64) -> Option<usize> {
        let geometries: Vec<Option<&MultiPolygon<f64>>> =
            self.features.iter().map(|f| f.geometry.as_ref()).collect();
        self.index.locate(&geometries, lon, lat)
    }

    /// The layer as GeoJSON with Leaflet-style paint properties on every feature.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|f| {
                let mut properties = Map::new();
                properties.insert("code".into(), json!(f.code));
                properties.insert("name".into(), json!(f.name));
                properties.insert("sales".into(), json!(f.sales));
                properties.insert("bucket".into(), json!(f.bucket));
                properties.insert("fillColor".into(), json!(f.fill_color()));
                properties.insert("fillOpacity".into(), json!(self.style.fill_opacity));
                properties.insert("color".into(), json!(self.style.stroke_color));
                properties.insert("weight".into(), json!(self.style.stroke_width));
                properties.insert("label".into(), json!(Label::for_feature(f).html()));
                Feature {
                    bbox: None,
                    geometry: f
                        .geometry
                        .as_ref()
                        .map(|mp| geojson::Geometry::new(geojson::Value::from(mp))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Hover text for a country.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub country: String,
    pub sales: f64,
}

impl Label {
    fn for_feature(feature: &StyledFeature) -> Self {
        Self {
            country: feature.name.clone(),
            sales: feature.sales,
        }
    }

    pub fn html(&self) -> String {
        format!("<b>{}</b><br>Cars sold: {}", self.country, format_count(self.sales))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\nCars sold: {}", self.country, format_count(self.sales))
    }
}

/// Thousands-grouped number with at most three fraction digits, e.g. `1,200,000`.
pub fn format_count(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.3}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3 + 5);
    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        grouped.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if !frac_part.is_empty() {
        grouped.push('.');
        grouped.push_str(frac_part);
    }
    grouped
}

/// What the map currently shows.
#[derive(Default)]
pub struct MapView {
    years: Vec<i32>,
    year: Option<i32>,
    sales: SalesByCode,
    layer: Option<Layer>,
}

impl MapView {
    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn year(&self) -> Option<i32> {
        self.year
    }

    pub fn sales(&self) -> &SalesByCode {
        &self.sales
    }

    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    fn replace(&mut self, year: i32, sales: SalesByCode, layer: Layer) {
        self.year = Some(year);
        self.sales = sales;
        self.layer = Some(layer);
    }

    pub fn pointer_enter(&self, index: usize) -> Option<Label> {
        let feature = self.layer.as_ref()?.features.get(index)?;
        Some(Label {
            country: feature.name.clone(),
            sales: resolve_sales(&feature.code, &self.sales),
        })
    }

    /// Leaving a feature changes nothing.
    pub fn pointer_leave(&self, _index: usize) {}

    pub fn hover_at(&self, lon: f64, lat: f64) -> Option<Label> {
        let index = self.layer.as_ref()?.feature_at(lon, lat)?;
        self.pointer_enter(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied { year: i32, features: usize },
    /// A later selection was made while this one was loading.
    Superseded { year: i32 },
    Failed { year: Option<i32> },
    NoYears,
}

pub struct MapOrchestrator<A, G> {
    api: A,
    geometry: G,
    overlay: Option<G>,
    resolver: CountryResolver,
    style: LayerStyle,
    latest_ticket: AtomicU64,
    view: Mutex<MapView>,
}

impl<A: SalesApi, G: GeometrySource> MapOrchestrator<A, G> {
    pub fn new(api: A, geometry: G, resolver: CountryResolver, style: LayerStyle) -> Self {
        Self {
            api,
            geometry,
            overlay: None,
            resolver,
            style,
            latest_ticket: AtomicU64::new(0),
            view: Mutex::new(MapView::default()),
        }
    }

    pub fn with_overlay(mut self, overlay: G) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn view(&self) -> MutexGuard<'_, MapView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the year list and shows the latest year.
    pub async fn initialize(&self) -> UpdateOutcome {
        let years = match self.api.list_years().await.map_err(LoadError::new("years", None)) {
            Ok(years) => years,
            Err(err) => {
                error!(error = %err, "map initialization abandoned");
                return UpdateOutcome::Failed { year: None };
            }
        };
        info!(?years, "available years");

        let latest = years.last().copied();
        self.view().years = years;
        match latest {
            Some(year) => self.select_year(year).await,
            None => {
                warn!("sales store has no years; nothing to draw");
                UpdateOutcome::NoYears
            }
        }
    }

    /// Rebuilds the view for `year`. On failure the previous view stays as it was.
    pub async fn select_year(&self, year: i32) -> UpdateOutcome {
        let ticket = self.latest_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        info!(year, "loading map data");

        let (sales, layer) = match self.load(year).await {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(error = %err, year, "map update abandoned; keeping previous layer");
                return UpdateOutcome::Failed { year: Some(year) };
            }
        };

        let mut view = self.view();
        if self.latest_ticket.load(Ordering::SeqCst) != ticket {
            debug!(year, ticket, "discarding superseded map update");
            return UpdateOutcome::Superseded { year };
        }
        let features = layer.features.len();
        view.replace(year, sales, layer);
        info!(year, features, "map layer replaced");
        UpdateOutcome::Applied { year, features }
    }

    async fn load(&self, year: i32) -> Result<(SalesByCode, Layer), LoadError> {
        let records = self
            .api
            .list_sales(year)
            .await
            .map_err(LoadError::new("sales rows", Some(year)))?;
        let sales = sales_by_code(&records);
        debug!(year, rows = records.len(), countries = sales.len(), "built sales mapping");

        let base = self
            .geometry
            .load()
            .await
            .map_err(LoadError::new("country geometry", Some(year)))?;
        let overlay = match &self.overlay {
            Some(source) => Some(
                source
                    .load()
                    .await
                    .map_err(LoadError::new("overlay geometry", Some(year)))?,
            ),
            None => None,
        };

        let mut collections = vec![&base];
        collections.extend(overlay.as_ref());
        let layer = Layer::build(year, &sales, &collections, &self.resolver, self.style.clone());
        Ok((sales, layer))
    }
}
