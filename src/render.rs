use crate::chart::ChartSeries;
use crate::color::hex_to_rgb;
use crate::map::Layer;
use anyhow::{anyhow, Context, Result};
use geo::{LineString, MultiPolygon};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use std::fs;
use std::path::Path;
use tracing::info;

const OCEAN: RGBColor = RGBColor(0xAA, 0xD3, 0xDF);
const BAR: RGBColor = RGBColor(54, 162, 235);

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory {:?}", parent))?;
    }
    Ok(())
}

fn rgb(hex: &str) -> RGBColor {
    let (r, g, b) = hex_to_rgb(hex).unwrap_or((0xff, 0xff, 0xff));
    RGBColor(r, g, b)
}

fn ring_points(ring: &LineString<f64>) -> Vec<(f64, f64)> {
    ring.coords().map(|c| (c.x, c.y)).collect()
}

/// Draws the layer in plate carrée projection. Only exterior rings are filled.
pub fn render_choropleth(layer: &Layer, path: &Path, (width, height): (u32, u32)) -> Result<()> {
    ensure_parent(path)?;

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&OCEAN)
        .map_err(|e| anyhow!("Failed to paint map background: {}", e))?;

    let mut chart = ChartBuilder::on(&root)
        .build_cartesian_2d(-180.0f64..180.0f64, -90.0f64..90.0f64)
        .map_err(|e| anyhow!("Failed to set up map projection: {}", e))?;

    let stroke = rgb(&layer.style.stroke_color).stroke_width(layer.style.stroke_width);
    for feature in &layer.features {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        let (r, g, b) = feature.bucket.rgb();
        let fill = RGBColor(r, g, b).mix(layer.style.fill_opacity).filled();
        draw_polygons(&mut chart, geometry, fill, stroke)?;
    }

    root.present()
        .map_err(|e| anyhow!("Failed to write map {:?}: {}", path, e))?;
    info!(year = layer.year, features = layer.features.len(), "map written to {:?}", path);
    Ok(())
}

fn draw_polygons<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    geometry: &MultiPolygon<f64>,
    fill: ShapeStyle,
    stroke: ShapeStyle,
) -> Result<()> {
    for polygon in geometry {
        let exterior = ring_points(polygon.exterior());
        if exterior.len() < 3 {
            continue;
        }
        chart
            .draw_series(std::iter::once(Polygon::new(exterior.clone(), fill)))
            .map_err(|e| anyhow!("Failed to fill polygon: {}", e))?;
        chart
            .draw_series(std::iter::once(PathElement::new(exterior, stroke)))
            .map_err(|e| anyhow!("Failed to outline polygon: {}", e))?;
    }
    Ok(())
}

pub fn render_chart(series: &ChartSeries, path: &Path, (width, height): (u32, u32)) -> Result<()> {
    ensure_parent(path)?;

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)
        .map_err(|e| anyhow!("Failed to paint chart background: {}", e))?;

    let years = series.years();
    let y_max = match series.max_total() {
        max if max > 0.0 => max * 1.1,
        _ => 1.0,
    };
    let slots = years.len().max(1) as u32;

    let mut chart = ChartBuilder::on(&root)
        .caption(ChartSeries::TITLE, ("sans-serif", 32))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d((0u32..slots).into_segmented(), 0.0f64..y_max)
        .map_err(|e| anyhow!("Failed to set up chart axes: {}", e))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(years.len().max(1))
        .x_label_formatter(&|slot| match slot {
            SegmentValue::CenterOf(i) => years
                .get(*i as usize)
                .map(|y| y.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .y_label_formatter(&|v| crate::map::format_count(v.round()))
        .draw()
        .map_err(|e| anyhow!("Failed to draw chart mesh: {}", e))?;

    let fill = BAR.mix(0.5).filled();
    let border = BAR.stroke_width(1);
    let bars = series.totals.iter().enumerate().map(|(i, t)| {
        let i = i as u32;
        [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), t.total)]
    });

    chart
        .draw_series(bars.clone().map(|corners| Rectangle::new(corners, fill)))
        .map_err(|e| anyhow!("Failed to draw bars: {}", e))?
        .label(ChartSeries::LABEL)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], fill));
    chart
        .draw_series(bars.map(|corners| Rectangle::new(corners, border)))
        .map_err(|e| anyhow!("Failed to outline bars: {}", e))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| anyhow!("Failed to draw legend: {}", e))?;

    root.present()
        .map_err(|e| anyhow!("Failed to write chart {:?}: {}", path, e))?;
    info!(years = years.len(), "chart written to {:?}", path);
    Ok(())
}

/// Writes the styled layer as a GeoJSON FeatureCollection.
pub fn write_layer_geojson(layer: &Layer, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let collection = layer.to_feature_collection();
    let text = serde_json::to_string(&collection).context("Failed to serialize layer")?;
    fs::write(path, text)
        .with_context(|| format!("Failed to write layer GeoJSON {:?}", path))?;
    info!(year = layer.year, "layer GeoJSON written to {:?}", path);
    Ok(())
}
