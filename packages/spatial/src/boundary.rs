//! Boundary documents and their conversion to indexed `GeoJSON`.
//!
//! The indexed form is a `FeatureCollection` where every feature carries a
//! `bbox`, the collection carries the union `bbox`, and the coordinate
//! system is recorded in a `crs` member. Coordinates, properties, and ids
//! are passed through untouched. Converting an indexed document again
//! yields the same bytes.

use std::path::Path;

use fire_map_store::atomic::write_bytes_atomic;
use geo::{BoundingRect, MapCoords, MultiPolygon, Rect};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::Value;

use crate::SpatialError;
use crate::crs::Crs;

/// A parsed boundary document and its coordinate system.
#[derive(Debug, Clone)]
pub struct Boundary {
    crs: Crs,
    collection: FeatureCollection,
}

impl Boundary {
    /// Parses a `GeoJSON` boundary from bytes.
    ///
    /// A lone `Feature` or bare geometry is wrapped in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Json`] or [`SpatialError::GeoJson`] if the
    /// bytes are not valid `GeoJSON`, or [`SpatialError::UnsupportedCrs`] if
    /// the `crs` member names an unknown system.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpatialError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let crs = Crs::from_member(value.get("crs"))?;

        let collection = match GeoJson::from_json_value(value)? {
            GeoJson::FeatureCollection(collection) => collection,
            GeoJson::Feature(feature) => FeatureCollection {
                bbox: None,
                features: vec![feature],
                foreign_members: None,
            },
            GeoJson::Geometry(geometry) => FeatureCollection {
                bbox: None,
                features: vec![Feature {
                    bbox: None,
                    geometry: Some(geometry),
                    id: None,
                    properties: None,
                    foreign_members: None,
                }],
                foreign_members: None,
            },
        };

        Ok(Self { crs, collection })
    }

    /// Reads and parses a boundary file.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Io`] if the file cannot be read, or any error
    /// from [`Self::from_slice`].
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.collection.features.len()
    }

    /// Polygonal geometry of every feature, in the boundary CRS.
    ///
    /// Point and line features are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeoJson`] if a geometry is malformed.
    pub fn polygons(&self) -> Result<Vec<MultiPolygon<f64>>, SpatialError> {
        let mut polygons = Vec::new();
        for (index, feature) in self.collection.features.iter().enumerate() {
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let geometry: geo::Geometry<f64> = geometry.clone().try_into()?;
            if !collect_polygons(geometry, &mut polygons) {
                log::warn!("Boundary feature {index} has non-polygon geometry, ignoring it");
            }
        }
        Ok(polygons)
    }

    /// Serializes the boundary in indexed form.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeoJson`] if a geometry is malformed, or
    /// [`SpatialError::Json`] if serialization fails.
    pub fn to_indexed_bytes(&self) -> Result<Vec<u8>, SpatialError> {
        let mut collection = self.collection.clone();
        let mut total: Option<Rect<f64>> = None;

        for feature in &mut collection.features {
            feature.bbox = None;
            let Some(geometry) = &feature.geometry else {
                continue;
            };
            let geometry: geo::Geometry<f64> = geometry.clone().try_into()?;
            if let Some(rect) = geometry.bounding_rect() {
                feature.bbox = Some(rect_to_bbox(rect));
                total = Some(total.map_or(rect, |t| union(t, rect)));
            }
        }

        collection.bbox = total.map(rect_to_bbox);
        collection
            .foreign_members
            .get_or_insert_with(JsonObject::new)
            .insert("crs".to_string(), self.crs.to_member());

        let value = serde_json::to_value(&collection)?;
        Ok(serde_json::to_vec(&value)?)
    }

    /// Builds a WGS84 `FeatureCollection` of the boundary outline for
    /// display, one feature per polygonal source feature.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::GeoJson`] if a geometry is malformed,
    /// [`SpatialError::Gdal`] or [`SpatialError::Reprojection`] if a vertex
    /// cannot be reprojected, or [`SpatialError::Json`] if serialization
    /// fails.
    pub fn outline_wgs84(&self) -> Result<Value, SpatialError> {
        let to_wgs84 = self.crs.transformer_to(&Crs::wgs84())?;
        let features = self
            .polygons()?
            .iter()
            .map(|polygon| {
                let projected = polygon.try_map_coords(|c| to_wgs84.apply(c))?;
                Ok(Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&projected))),
                    id: None,
                    properties: None,
                    foreign_members: None,
                })
            })
            .collect::<Result<Vec<_>, SpatialError>>()?;

        Ok(serde_json::to_value(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })?)
    }
}

/// Converts a raw boundary document to indexed `GeoJSON` bytes.
///
/// # Errors
///
/// Returns any error from [`Boundary::from_slice`] or
/// [`Boundary::to_indexed_bytes`].
pub fn convert_boundary(raw: &[u8]) -> Result<Vec<u8>, SpatialError> {
    Boundary::from_slice(raw)?.to_indexed_bytes()
}

/// Converts the raw boundary at `raw_path` and atomically writes the indexed
/// document to `processed_path`, returning the parsed boundary.
///
/// # Errors
///
/// Returns [`SpatialError::Io`] if either file cannot be accessed, or any
/// conversion error.
pub fn convert_boundary_file(raw_path: &Path, processed_path: &Path) -> Result<Boundary, SpatialError> {
    let boundary = Boundary::load(raw_path)?;
    let indexed = boundary.to_indexed_bytes()?;
    write_bytes_atomic(processed_path, &indexed)?;

    log::info!(
        "Converted boundary with {} features ({}) to {}",
        boundary.feature_count(),
        boundary.crs(),
        processed_path.display()
    );
    Ok(boundary)
}

fn collect_polygons(geometry: geo::Geometry<f64>, out: &mut Vec<MultiPolygon<f64>>) -> bool {
    match geometry {
        geo::Geometry::Polygon(polygon) => {
            out.push(MultiPolygon(vec![polygon]));
            true
        }
        geo::Geometry::MultiPolygon(multi) => {
            out.push(multi);
            true
        }
        geo::Geometry::GeometryCollection(collection) => collection
            .into_iter()
            .fold(false, |found, g| collect_polygons(g, out) || found),
        _ => false,
    }
}

fn rect_to_bbox(rect: Rect<f64>) -> Vec<f64> {
    vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]
}

fn union(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        geo::Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": 7,
                "properties": { "NAME": "City of Los Angeles", "AREA": 1302.15 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-118.6, 33.7], [-118.1, 33.7], [-118.1, 34.3], [-118.6, 34.3], [-118.6, 33.7]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "NAME": "Island" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-118.5, 33.3], [-118.3, 33.3], [-118.3, 33.5], [-118.5, 33.3]]]]
                }
            }
        ]
    }"#;

    #[test]
    fn adds_bboxes_and_crs() {
        let indexed = convert_boundary(RAW.as_bytes()).unwrap();
        let value: Value = serde_json::from_slice(&indexed).unwrap();

        assert_eq!(value["bbox"], serde_json::json!([-118.6, 33.3, -118.1, 34.3]));
        assert_eq!(
            value["features"][0]["bbox"],
            serde_json::json!([-118.6, 33.7, -118.1, 34.3])
        );
        assert_eq!(value["features"][0]["id"], serde_json::json!(7));
        assert_eq!(
            value["features"][0]["properties"]["NAME"],
            serde_json::json!("City of Los Angeles")
        );
        assert_eq!(
            value["crs"]["properties"]["name"],
            serde_json::json!("urn:ogc:def:crs:EPSG::4326")
        );
    }

    #[test]
    fn conversion_is_idempotent() {
        let once = convert_boundary(RAW.as_bytes()).unwrap();
        let twice = convert_boundary(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn keeps_declared_crs() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 0]]] }
            }]
        }"#;
        let boundary = Boundary::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(boundary.crs(), &Crs::web_mercator());

        let indexed: Value = serde_json::from_slice(&boundary.to_indexed_bytes().unwrap()).unwrap();
        assert_eq!(
            indexed["crs"]["properties"]["name"],
            serde_json::json!("urn:ogc:def:crs:EPSG::3857")
        );
    }

    #[test]
    fn rejects_unknown_crs() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:999999" } },
            "features": []
        }"#;
        assert!(matches!(
            Boundary::from_slice(raw.as_bytes()),
            Err(SpatialError::UnsupportedCrs { .. })
        ));
    }

    #[test]
    fn accepts_state_plane_crs() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "urn:ogc:def:crs:EPSG::2229" } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[
                    [6400000, 1800000], [6600000, 1800000], [6600000, 1900000], [6400000, 1800000]
                ]] }
            }]
        }"#;
        let boundary = Boundary::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(boundary.crs(), &Crs::from_epsg(2229));

        let outline = boundary.outline_wgs84().unwrap();
        let lon = outline["features"][0]["geometry"]["coordinates"][0][0][0]
            .as_f64()
            .unwrap();
        let lat = outline["features"][0]["geometry"]["coordinates"][0][0][1]
            .as_f64()
            .unwrap();
        assert!((-119.5..-117.0).contains(&lon), "{lon}");
        assert!((33.0..35.0).contains(&lat), "{lat}");
    }

    #[test]
    fn extracts_polygons_and_skips_points() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [1, 2] } },
                { "type": "Feature", "properties": {}, "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] } }
            ]
        }"#;
        let boundary = Boundary::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(boundary.polygons().unwrap().len(), 1);
    }

    #[test]
    fn wraps_bare_geometry() {
        let raw = r#"{ "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]] }"#;
        let boundary = Boundary::from_slice(raw.as_bytes()).unwrap();
        assert_eq!(boundary.feature_count(), 1);
    }

    #[test]
    fn writes_processed_file() {
        let dir = tempfile::tempdir().unwrap();
        let raw_path = dir.path().join("raw.geojson");
        let processed_path = dir.path().join("processed").join("boundary.geojson");
        std::fs::write(&raw_path, RAW).unwrap();

        let boundary = convert_boundary_file(&raw_path, &processed_path).unwrap();
        assert_eq!(boundary.feature_count(), 2);
        assert_eq!(
            std::fs::read(&processed_path).unwrap(),
            convert_boundary(RAW.as_bytes()).unwrap()
        );
    }

    #[test]
    fn outline_is_reprojected_to_wgs84() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[[0, 0], [111319.49079327357, 0], [0, 0]]] }
            }]
        }"#;
        let outline = Boundary::from_slice(raw.as_bytes()).unwrap().outline_wgs84().unwrap();
        let x = outline["features"][0]["geometry"]["coordinates"][0][0][1][0]
            .as_f64()
            .unwrap();
        assert!((x - 1.0).abs() < 1e-7);
    }
}
