//! R-tree clipping of detections to a boundary and the clipped-set file.
//!
//! Boundary polygons are bulk-loaded into an R-tree keyed by their
//! envelopes. A detection is kept when any candidate polygon intersects its
//! reprojected point, so points lying exactly on an edge are retained.

use std::path::Path;

use fire_map_detection_models::Detection;
use fire_map_store::atomic::write_atomic;
use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Point};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use rstar::{AABB, RTree, RTreeObject};
use serde_json::Value;

use crate::SpatialError;
use crate::boundary::Boundary;
use crate::crs::{Crs, Transformer};

/// A boundary polygon stored in the R-tree.
struct BoundaryEntry {
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Spatial index over the polygons of one boundary.
pub struct BoundaryIndex {
    crs: Crs,
    from_wgs84: Transformer,
    polygons: RTree<BoundaryEntry>,
}

impl BoundaryIndex {
    /// Builds the index from every polygonal feature of `boundary`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::NoPolygons`] if the boundary has no polygonal
    /// geometry, [`SpatialError::Gdal`] if no transformation from WGS84 into
    /// the boundary CRS exists, or any error from [`Boundary::polygons`].
    pub fn new(boundary: &Boundary) -> Result<Self, SpatialError> {
        let entries: Vec<BoundaryEntry> = boundary
            .polygons()?
            .into_iter()
            .map(|polygon| BoundaryEntry {
                envelope: compute_envelope(&polygon),
                polygon,
            })
            .collect();

        if entries.is_empty() {
            return Err(SpatialError::NoPolygons);
        }

        log::debug!("Indexed {} boundary polygons", entries.len());
        let crs = boundary.crs().clone();
        Ok(Self {
            from_wgs84: Crs::wgs84().transformer_to(&crs)?,
            crs,
            polygons: RTree::bulk_load(entries),
        })
    }

    #[must_use]
    pub const fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Returns `true` if `point` (in the boundary CRS) lies inside or on the
    /// edge of any boundary polygon.
    #[must_use]
    pub fn contains(&self, point: Point<f64>) -> bool {
        let query_env = AABB::from_point([point.x(), point.y()]);
        self.polygons
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| entry.polygon.intersects(&point))
    }

    /// Reprojects each detection from WGS84 into the boundary CRS and keeps
    /// those inside the boundary. Detections with no position in the
    /// boundary CRS are dropped with a warning.
    #[must_use]
    pub fn clip(&self, detections: Vec<Detection>) -> Vec<ClippedDetection> {
        let total = detections.len();
        let clipped: Vec<ClippedDetection> = detections
            .into_iter()
            .filter_map(|detection| {
                let coord = Coord {
                    x: detection.longitude,
                    y: detection.latitude,
                };
                let point = match self.from_wgs84.apply(coord) {
                    Ok(projected) => Point::from(projected),
                    Err(e) => {
                        log::warn!("Dropping detection at {}, {}: {e}", coord.y, coord.x);
                        return None;
                    }
                };
                self.contains(point)
                    .then_some(ClippedDetection { point, detection })
            })
            .collect();

        log::info!(
            "Clipped {total} detections to boundary: {} inside, {} outside",
            clipped.len(),
            total - clipped.len()
        );
        clipped
    }
}

/// A detection that passed the clip, with its point in the boundary CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedDetection {
    pub point: Point<f64>,
    pub detection: Detection,
}

impl ClippedDetection {
    /// The point's position in WGS84 as `(latitude, longitude)`, given the
    /// transformer from the set's CRS (see [`ClippedSet::to_wgs84`]).
    ///
    /// # Errors
    ///
    /// Returns any reprojection error from [`Transformer::apply`].
    pub fn lat_lon(&self, to_wgs84: &Transformer) -> Result<(f64, f64), SpatialError> {
        let coord = to_wgs84.apply(self.point.0)?;
        Ok((coord.y, coord.x))
    }
}

/// A clipped detection set and the CRS its points are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct ClippedSet {
    pub crs: Crs,
    pub detections: Vec<ClippedDetection>,
}

impl ClippedSet {
    /// Builds the transformer from the set's CRS back to WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Gdal`] if GDAL cannot build it.
    pub fn to_wgs84(&self) -> Result<Transformer, SpatialError> {
        self.crs.transformer_to(&Crs::wgs84())
    }

    /// Atomically writes the set as an indexed `GeoJSON` point collection.
    /// Detection attributes become feature properties.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Json`] if serialization fails or
    /// [`SpatialError::Io`] if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), SpatialError> {
        let mut total: Option<[f64; 4]> = None;
        let mut features = Vec::with_capacity(self.detections.len());

        for clipped in &self.detections {
            let (x, y) = (clipped.point.x(), clipped.point.y());
            total = Some(total.map_or([x, y, x, y], |[x0, y0, x1, y1]| {
                [x0.min(x), y0.min(y), x1.max(x), y1.max(y)]
            }));

            let properties = match serde_json::to_value(&clipped.detection)? {
                Value::Object(map) => map,
                _ => JsonObject::new(),
            };
            features.push(Feature {
                bbox: Some(vec![x, y, x, y]),
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&clipped.point))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            });
        }

        let mut foreign_members = JsonObject::new();
        foreign_members.insert("crs".to_string(), self.crs.to_member());
        let collection = FeatureCollection {
            bbox: total.map(Vec::from),
            features,
            foreign_members: Some(foreign_members),
        };
        let value = serde_json::to_value(&collection)?;

        write_atomic(path, |w| -> Result<(), SpatialError> {
            serde_json::to_writer(w, &value)?;
            Ok(())
        })?;

        log::info!(
            "Wrote {} clipped detections to {}",
            self.detections.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads a clipped set written by [`Self::write`].
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidFeature`] if a feature is not a point
    /// with detection properties, or any parse error.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let bytes = std::fs::read(path)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let crs = Crs::from_member(value.get("crs"))?;

        let GeoJson::FeatureCollection(collection) = GeoJson::from_json_value(value)? else {
            return Err(SpatialError::InvalidFeature {
                index: 0,
                message: "clipped set is not a FeatureCollection".to_string(),
            });
        };

        let detections = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| read_feature(index, feature))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { crs, detections })
    }
}

fn read_feature(index: usize, feature: Feature) -> Result<ClippedDetection, SpatialError> {
    let invalid = |message: &str| SpatialError::InvalidFeature {
        index,
        message: message.to_string(),
    };

    let geometry = feature.geometry.ok_or_else(|| invalid("missing geometry"))?;
    let geojson::Value::Point(position) = geometry.value else {
        return Err(invalid("geometry is not a Point"));
    };
    let [x, y, ..] = position.as_slice() else {
        return Err(invalid("point has fewer than two coordinates"));
    };
    let properties = feature.properties.ok_or_else(|| invalid("missing properties"))?;
    let detection: Detection = serde_json::from_value(Value::Object(properties))?;

    Ok(ClippedDetection {
        point: Point::new(*x, *y),
        detection,
    })
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use fire_map_detection_models::AcqTime;

    use super::*;

    fn detection(latitude: f64, longitude: f64) -> Detection {
        Detection {
            latitude,
            longitude,
            bright_ti4: Some(330.5),
            scan: Some(0.39),
            track: Some(0.36),
            acq_date: NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
            acq_time: AcqTime::new(9, 30).unwrap(),
            satellite: Some("N".to_string()),
            instrument: Some("VIIRS".to_string()),
            confidence: Some("n".to_string()),
            version: Some("2.0NRT".to_string()),
            bright_ti5: None,
            frp: 2.4,
            daynight: Some("D".to_string()),
            datetime: Utc.with_ymd_and_hms(2025, 1, 8, 9, 30, 0).unwrap(),
        }
    }

    fn square(crs: &str) -> Boundary {
        let raw = format!(
            r#"{{
                "type": "FeatureCollection",
                "crs": {{ "type": "name", "properties": {{ "name": "{crs}" }} }},
                "features": [{{
                    "type": "Feature",
                    "properties": {{}},
                    "geometry": {{ "type": "Polygon", "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]] }}
                }}]
            }}"#
        );
        Boundary::from_slice(raw.as_bytes()).unwrap()
    }

    #[test]
    fn keeps_inside_and_edge_drops_outside() {
        let index = BoundaryIndex::new(&square("EPSG:4326")).unwrap();
        let clipped = index.clip(vec![
            detection(5.0, 5.0),
            detection(5.0, 10.0),
            detection(5.0, 11.0),
            detection(0.0, 0.0),
        ]);

        assert_eq!(clipped.len(), 3);
        assert_eq!(clipped[0].point, Point::new(5.0, 5.0));
        assert_eq!(clipped[0].detection, detection(5.0, 5.0));
        assert_eq!(clipped[1].point, Point::new(10.0, 5.0));
        assert_eq!(clipped[2].point, Point::new(0.0, 0.0));
    }

    #[test]
    fn reprojects_into_mercator_boundary() {
        let raw = r#"{
            "type": "FeatureCollection",
            "crs": { "type": "name", "properties": { "name": "EPSG:3857" } },
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Polygon", "coordinates": [[
                    [-13300000, 4000000], [-13100000, 4000000], [-13100000, 4100000],
                    [-13300000, 4100000], [-13300000, 4000000]
                ]] }
            }]
        }"#;
        let index = BoundaryIndex::new(&Boundary::from_slice(raw.as_bytes()).unwrap()).unwrap();
        let clipped = index.clip(vec![detection(34.0522, -118.2437), detection(36.0, -118.2437)]);

        assert_eq!(clipped.len(), 1);
        let set = ClippedSet {
            crs: index.crs().clone(),
            detections: clipped,
        };
        let (lat, lon) = set.detections[0].lat_lon(&set.to_wgs84().unwrap()).unwrap();
        assert!((lat - 34.0522).abs() < 1e-7);
        assert!((lon - -118.2437).abs() < 1e-7);
    }

    #[test]
    fn clips_against_state_plane_boundary() {
        let state_plane = Crs::from_epsg(2229);
        let to_feet = Crs::wgs84().transformer_to(&state_plane).unwrap();
        let corner = |lon: f64, lat: f64| {
            let c = to_feet.apply(Coord { x: lon, y: lat }).unwrap();
            format!("[{}, {}]", c.x, c.y)
        };
        let ring = [
            corner(-118.5, 33.9),
            corner(-118.0, 33.9),
            corner(-118.0, 34.3),
            corner(-118.5, 34.3),
            corner(-118.5, 33.9),
        ]
        .join(", ");
        let raw = format!(
            r#"{{
                "type": "FeatureCollection",
                "crs": {{ "type": "name", "properties": {{ "name": "EPSG:2229" }} }},
                "features": [{{
                    "type": "Feature",
                    "properties": {{}},
                    "geometry": {{ "type": "Polygon", "coordinates": [[{ring}]] }}
                }}]
            }}"#
        );
        let index = BoundaryIndex::new(&Boundary::from_slice(raw.as_bytes()).unwrap()).unwrap();
        assert_eq!(index.crs(), &state_plane);

        let clipped = index.clip(vec![detection(34.0522, -118.2437), detection(34.6, -118.2437)]);
        assert_eq!(clipped.len(), 1);
        assert!(clipped[0].point.x() > 1_000_000.0);
        assert_eq!(clipped[0].detection, detection(34.0522, -118.2437));
    }

    #[test]
    fn boundary_without_polygons_is_rejected() {
        let raw = r#"{
            "type": "FeatureCollection",
            "features": [{ "type": "Feature", "properties": {}, "geometry": { "type": "Point", "coordinates": [1, 2] } }]
        }"#;
        let boundary = Boundary::from_slice(raw.as_bytes()).unwrap();
        assert!(matches!(BoundaryIndex::new(&boundary), Err(SpatialError::NoPolygons)));
    }

    #[test]
    fn clipped_set_survives_write_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("clipped.geojson");
        let index = BoundaryIndex::new(&square("EPSG:4326")).unwrap();
        let set = ClippedSet {
            crs: index.crs().clone(),
            detections: index.clip(vec![detection(2.0, 3.0), detection(4.0, 5.0)]),
        };

        set.write(&path).unwrap();
        let loaded = ClippedSet::load(&path).unwrap();
        assert_eq!(loaded, set);

        let value: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["bbox"], serde_json::json!([3.0, 2.0, 5.0, 4.0]));
        assert_eq!(value["features"][0]["properties"]["acq_time"], serde_json::json!("0930"));
    }
}
