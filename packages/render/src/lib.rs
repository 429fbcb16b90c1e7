#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive fire map rendering.
//!
//! Produces one self-contained HTML document that loads Leaflet and the
//! `leaflet.heat` plugin from a CDN and embeds everything else: the
//! boundary outline, one circle marker per clipped detection styled by
//! intensity tier, an FRP-weighted heat overlay, a legend, and a layer
//! control. Points are inverse-projected to WGS84 before embedding, since
//! Leaflet expects geographic coordinates.

pub mod html;
pub mod legend;
pub mod popup;

use std::fmt::Write as _;
use std::path::Path;

use fire_map_detection_models::IntensityThresholds;
use fire_map_spatial::{Boundary, ClippedSet, SpatialError};
use fire_map_store::atomic::write_bytes_atomic;
use serde::Serialize;
use serde_json::json;

use crate::html::{HeaderItem, LEAFLET_CSS, LEAFLET_HEAT_JS, LEAFLET_JS, escape, script_json};

/// Default map centre (latitude, longitude): downtown Los Angeles.
pub const DEFAULT_CENTER: [f64; 2] = [34.0522, -118.2437];

pub const DEFAULT_ZOOM: u8 = 8;

/// Heat overlay point radius in pixels.
pub const HEAT_RADIUS: u32 = 15;

/// Name of the marker overlay in the layer control.
pub const FIRE_LAYER_NAME: &str = "Fires/Hotspots";

/// Name of the heat overlay in the layer control.
pub const HEAT_LAYER_NAME: &str = "Fire Intensity Heatmap";

/// Errors that can occur while rendering the map.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The boundary or clipped set could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Embedded data could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Formatting the document failed.
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// The document could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A base map tile layer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TileLayer {
    pub name: &'static str,
    pub url: &'static str,
    pub attribution: &'static str,
}

/// Base layers offered by the layer control. The first one is shown
/// initially.
pub const BASE_LAYERS: [TileLayer; 3] = [
    TileLayer {
        name: "Satellite Imagery",
        url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        attribution: "Tiles &copy; Esri World Imagery",
    },
    TileLayer {
        name: "Light Mode Tile",
        url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
        attribution: "Map data &copy; OpenStreetMap contributors, &copy; CARTO",
    },
    TileLayer {
        name: "Dark Mode Tile",
        url: "https://{s}.basemaps.cartocdn.com/dark_all/{z}/{x}/{y}{r}.png",
        attribution: "Map data &copy; OpenStreetMap contributors, &copy; CARTO",
    },
];

/// Presentation settings for the rendered map.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Document title.
    pub title: String,
    /// Initial centre as `[latitude, longitude]`.
    pub center: [f64; 2],
    pub zoom: u8,
    pub thresholds: IntensityThresholds,
    /// Name of the boundary overlay in the layer control.
    pub boundary_name: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: "Active Fire Map".to_string(),
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            thresholds: IntensityThresholds::default(),
            boundary_name: "Boundary".to_string(),
        }
    }
}

/// One circle marker as embedded in the document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Marker {
    lat: f64,
    lon: f64,
    color: &'static str,
    radius: u8,
    fill_opacity: f64,
    popup: String,
}

/// Summary of a render run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub markers: usize,
    pub bytes: usize,
}

impl std::fmt::Display for RenderReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} markers, {} bytes", self.markers, self.bytes)
    }
}

/// Builds the map client. Reads everything from the embedded `data`
/// object.
const MAP_SCRIPT: &str = r"
const map = L.map('map', { center: data.center, zoom: data.zoom });

const baseLayers = {};
data.tiles.forEach((tile, index) => {
  const layer = L.tileLayer(tile.url, { attribution: tile.attribution, maxZoom: 19 });
  if (index === 0) {
    layer.addTo(map);
  }
  baseLayers[tile.name] = layer;
});

const boundaryLayer = L.geoJSON(data.boundary, { style: () => data.boundaryStyle }).addTo(map);

const fireLayer = L.featureGroup();
data.markers.forEach((m) => {
  L.circleMarker([m.lat, m.lon], {
    radius: m.radius,
    color: m.color,
    fill: true,
    fillColor: m.color,
    fillOpacity: m.fillOpacity,
  })
    .bindPopup(m.popup, { maxWidth: 600 })
    .addTo(fireLayer);
});
fireLayer.addTo(map);

const heatLayer = L.heatLayer(data.heat, { radius: data.heatRadius }).addTo(map);

const overlays = {};
overlays[data.boundaryName] = boundaryLayer;
overlays[data.fireLayerName] = fireLayer;
overlays[data.heatLayerName] = heatLayer;
L.control.layers(baseLayers, overlays).addTo(map);
";

/// Renders the map document for a boundary and its clipped detections.
///
/// # Errors
///
/// Returns [`RenderError`] if the boundary geometry is malformed, a point
/// cannot be reprojected to WGS84, or the document cannot be assembled.
pub fn render_map(
    boundary: &Boundary,
    clipped: &ClippedSet,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let mut markers = Vec::with_capacity(clipped.detections.len());
    let mut heat = Vec::with_capacity(clipped.detections.len());

    let to_wgs84 = clipped.to_wgs84()?;
    for item in &clipped.detections {
        let (lat, lon) = item.lat_lon(&to_wgs84)?;
        let style = item.detection.tier(options.thresholds).style();
        markers.push(Marker {
            lat,
            lon,
            color: style.color,
            radius: style.radius,
            fill_opacity: style.fill_opacity,
            popup: popup::popup_html(&item.detection)?,
        });
        heat.push([lat, lon, item.detection.frp]);
    }

    let data = json!({
        "center": options.center,
        "zoom": options.zoom,
        "tiles": BASE_LAYERS,
        "boundary": boundary.outline_wgs84()?,
        "boundaryName": options.boundary_name,
        "boundaryStyle": { "color": "#3388ff", "weight": 2, "fillOpacity": 0 },
        "fireLayerName": FIRE_LAYER_NAME,
        "markers": markers,
        "heatLayerName": HEAT_LAYER_NAME,
        "heat": heat,
        "heatRadius": HEAT_RADIUS,
    });

    let header = [
        HeaderItem::Css(LEAFLET_CSS.to_string()),
        HeaderItem::Script(LEAFLET_JS.to_string()),
        HeaderItem::Script(LEAFLET_HEAT_JS.to_string()),
        HeaderItem::Style(
            "html, body { height: 100%; margin: 0; }\n#map { position: absolute; top: 0; bottom: 0; width: 100%; }"
                .to_string(),
        ),
        HeaderItem::Style(legend::LEGEND_CSS.to_string()),
    ];

    let mut buf = String::new();
    buf.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n");
    buf.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\"/>\n",
    );
    writeln!(buf, "<title>{}</title>", escape(&options.title))?;
    for item in &header {
        item.append_html(&mut buf)?;
    }
    buf.push_str("</head>\n<body>\n<div id=\"map\"></div>\n");
    buf.push_str(&legend::legend_html(options.thresholds)?);
    writeln!(buf, "<script>\nconst data = {};", script_json(&data)?)?;
    buf.push_str(MAP_SCRIPT);
    buf.push_str("</script>\n</body>\n</html>\n");

    Ok(buf)
}

/// Loads the converted boundary and clipped set, renders the map, and
/// atomically writes it to `output`.
///
/// # Errors
///
/// Returns [`RenderError`] if an input cannot be loaded or the output
/// cannot be written.
pub fn render_file(
    boundary_path: &Path,
    clipped_path: &Path,
    output: &Path,
    options: &RenderOptions,
) -> Result<RenderReport, RenderError> {
    let boundary = Boundary::load(boundary_path)?;
    let clipped = ClippedSet::load(clipped_path)?;

    let document = render_map(&boundary, &clipped, options)?;
    write_bytes_atomic(output, document.as_bytes())?;

    let report = RenderReport {
        markers: clipped.detections.len(),
        bytes: document.len(),
    };
    log::info!("Rendered {} ({report})", output.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use fire_map_detection_models::{AcqTime, Detection};
    use fire_map_spatial::{ClippedDetection, Crs};
    use geo::{Coord, Point};

    use super::*;

    fn detection(lat: f64, lon: f64, frp: f64) -> Detection {
        Detection {
            latitude: lat,
            longitude: lon,
            bright_ti4: Some(333.58),
            scan: None,
            track: None,
            acq_date: NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
            acq_time: AcqTime::new(9, 30).unwrap(),
            satellite: None,
            instrument: None,
            confidence: None,
            version: None,
            bright_ti5: Some(290.12),
            frp,
            daynight: None,
            datetime: Utc.with_ymd_and_hms(2025, 1, 8, 9, 30, 0).unwrap(),
        }
    }

    fn boundary() -> Boundary {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": { "NAME": "</script>" },
                "geometry": { "type": "Polygon", "coordinates": [[[-119, 33], [-117, 33], [-117, 35], [-119, 35], [-119, 33]]] }
            }]
        }"#;
        Boundary::from_slice(raw.as_bytes()).unwrap()
    }

    fn wgs84_set(detections: Vec<Detection>) -> ClippedSet {
        ClippedSet {
            crs: Crs::wgs84(),
            detections: detections
                .into_iter()
                .map(|d| ClippedDetection {
                    point: Point::new(d.longitude, d.latitude),
                    detection: d,
                })
                .collect(),
        }
    }

    #[test]
    fn document_has_layers_legend_and_markers() {
        let set = wgs84_set(vec![
            detection(34.1, -118.2, 5.0),
            detection(34.2, -118.3, 2.0),
            detection(34.3, -118.4, 1.0),
        ]);
        let html = render_map(&boundary(), &set, &RenderOptions::default()).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        for name in ["Satellite Imagery", "Light Mode Tile", "Dark Mode Tile"] {
            assert!(html.contains(name), "missing base layer {name}");
        }
        assert!(html.contains(LEAFLET_HEAT_JS));
        assert!(html.contains("\"heatRadius\":15"));
        assert!(html.contains("\"color\":\"#3388ff\""));
        assert!(html.contains("\"weight\":2"));
        assert!(html.contains("\"fillOpacity\":0,") || html.contains("\"fillOpacity\":0}"));
        assert!(html.contains("Active Fire Intensity"));
        assert!(html.contains("L.control.layers"));
        assert!(html.contains("\"center\":[34.0522,-118.2437]"));

        assert_eq!(html.matches("\"color\":\"#d73027\"").count(), 1);
        assert_eq!(html.matches("\"color\":\"#fc8d59\"").count(), 1);
        assert_eq!(html.matches("\"color\":\"#fee08b\"").count(), 1);
        assert!(html.contains("09:30:00"));
    }

    #[test]
    fn embedded_data_cannot_break_out_of_the_script() {
        let options = RenderOptions {
            title: "<Fires>".to_string(),
            ..RenderOptions::default()
        };
        let html = render_map(&boundary(), &wgs84_set(Vec::new()), &options).unwrap();
        assert!(html.contains("<title>&lt;Fires&gt;</title>"));
        assert_eq!(html.matches("</script>").count(), 3);
    }

    #[test]
    fn mercator_points_are_shown_in_wgs84() {
        let d = detection(34.0522, -118.2437, 2.0);
        let projected = Crs::wgs84()
            .transformer_to(&Crs::web_mercator())
            .unwrap()
            .apply(Coord {
                x: d.longitude,
                y: d.latitude,
            })
            .unwrap();
        let set = ClippedSet {
            crs: Crs::web_mercator(),
            detections: vec![ClippedDetection {
                point: Point::from(projected),
                detection: d,
            }],
        };
        let html = render_map(&boundary(), &set, &RenderOptions::default()).unwrap();
        let start = html.find("\"markers\":[").unwrap();
        let markers = &html[start..];
        let lat_start = markers.find("\"lat\":").unwrap() + "\"lat\":".len();
        let lat: f64 = markers[lat_start..]
            .split(|c| c == ',' || c == '}')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!((lat - 34.0522).abs() < 1e-7);
    }

    #[test]
    fn writes_document_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let boundary_path = dir.path().join("boundary.geojson");
        let clipped_path = dir.path().join("clipped.geojson");
        let output = dir.path().join("map.html");

        std::fs::write(&boundary_path, boundary().to_indexed_bytes().unwrap()).unwrap();
        wgs84_set(vec![detection(34.1, -118.2, 5.0)])
            .write(&clipped_path)
            .unwrap();

        let report = render_file(&boundary_path, &clipped_path, &output, &RenderOptions::default())
            .unwrap();
        assert_eq!(report.markers, 1);
        let written = std::fs::read_to_string(&output).unwrap();
        assert_eq!(written.len(), report.bytes);
        assert!(written.contains("Fires/Hotspots"));
    }
}
