//! Coordinate reference systems and point reprojection.
//!
//! Boundaries arrive as GeoJSON, which is WGS84 unless a legacy `crs`
//! member says otherwise. Any system GDAL can resolve is accepted. EPSG
//! names in their various spellings are normalised to `EPSG:<code>`, and
//! reprojection between two equal systems never touches GDAL.

use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use geo::Coord;
use serde_json::{Value, json};

use crate::SpatialError;

const WGS84_EPSG: u32 = 4326;
const WEB_MERCATOR_EPSG: u32 = 3857;

/// Pre-registration codes that services still emit for Web Mercator.
const LEGACY_WEB_MERCATOR: [u32; 3] = [900_913, 102_100, 102_113];

/// A coordinate reference system, identified by its normalised name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs {
    definition: String,
}

impl Crs {
    /// Geographic longitude/latitude, EPSG:4326.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// Spherical Web Mercator, EPSG:3857.
    #[must_use]
    pub fn web_mercator() -> Self {
        Self::from_epsg(WEB_MERCATOR_EPSG)
    }

    #[must_use]
    pub fn from_epsg(code: u32) -> Self {
        Self {
            definition: format!("EPSG:{code}"),
        }
    }

    #[must_use]
    pub fn is_wgs84(&self) -> bool {
        self.epsg() == Some(WGS84_EPSG)
    }

    /// EPSG code, when the system is an EPSG one.
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.definition
            .strip_prefix("EPSG:")
            .and_then(|code| code.parse().ok())
    }

    /// Name used in the GeoJSON `crs` member: the OGC URN for EPSG systems,
    /// the declared definition otherwise.
    #[must_use]
    pub fn urn(&self) -> String {
        self.epsg().map_or_else(
            || self.definition.clone(),
            |code| format!("urn:ogc:def:crs:EPSG::{code}"),
        )
    }

    /// Parses a CRS name such as `EPSG:2229`, `urn:ogc:def:crs:EPSG::4326`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, or any other definition GDAL accepts.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] if GDAL cannot resolve it.
    pub fn from_name(name: &str) -> Result<Self, SpatialError> {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Ok(Self::wgs84());
        }

        let crs = epsg_code(&upper).map_or_else(
            || Self {
                definition: trimmed.to_string(),
            },
            |code| {
                if LEGACY_WEB_MERCATOR.contains(&code) {
                    Self::web_mercator()
                } else {
                    Self::from_epsg(code)
                }
            },
        );

        if !crs.is_wgs84() {
            crs.spatial_ref().map_err(|e| {
                log::debug!("GDAL rejected CRS {name}: {e}");
                SpatialError::UnsupportedCrs {
                    name: name.to_string(),
                }
            })?;
        }
        Ok(crs)
    }

    /// Reads the legacy GeoJSON `crs` member. Absent means WGS84.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] if the member names an
    /// unknown system or is not a named CRS.
    pub fn from_member(member: Option<&Value>) -> Result<Self, SpatialError> {
        let Some(member) = member else {
            return Ok(Self::wgs84());
        };
        member
            .pointer("/properties/name")
            .and_then(Value::as_str)
            .map_or_else(
                || {
                    Err(SpatialError::UnsupportedCrs {
                        name: member.to_string(),
                    })
                },
                Self::from_name,
            )
    }

    /// Builds the GeoJSON `crs` member for this system.
    #[must_use]
    pub fn to_member(&self) -> Value {
        json!({
            "type": "name",
            "properties": { "name": self.urn() }
        })
    }

    /// Resolves the system through GDAL with x = easting/longitude and
    /// y = northing/latitude, whatever the authority's axis order.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Gdal`] if GDAL cannot resolve the definition.
    pub fn spatial_ref(&self) -> Result<SpatialRef, SpatialError> {
        let mut srs = match self.epsg() {
            Some(code) => SpatialRef::from_epsg(code)?,
            None => SpatialRef::from_definition(&self.definition)?,
        };
        srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
        Ok(srs)
    }

    /// Builds a transformer from this system into `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Gdal`] if either system cannot be resolved or
    /// GDAL has no operation between them.
    pub fn transformer_to(&self, target: &Self) -> Result<Transformer, SpatialError> {
        if self == target {
            return Ok(Transformer::identity(self.clone()));
        }
        let transform = CoordTransform::new(&self.spatial_ref()?, &target.spatial_ref()?)?;
        Ok(Transformer {
            source: self.clone(),
            target: target.clone(),
            transform: Some(transform),
        })
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.definition)
    }
}

/// Extracts the code from `EPSG:n`, `urn:ogc:def:crs:EPSG:<version>:n` or
/// `http://www.opengis.net/def/crs/EPSG/0/n` (already uppercased).
fn epsg_code(upper: &str) -> Option<u32> {
    if !upper.contains("EPSG") {
        return None;
    }
    upper.rsplit([':', '/']).next()?.parse().ok()
}

/// A reusable point transformation between two systems.
pub struct Transformer {
    source: Crs,
    target: Crs,
    transform: Option<CoordTransform>,
}

impl Transformer {
    #[must_use]
    pub fn identity(crs: Crs) -> Self {
        Self {
            source: crs.clone(),
            target: crs,
            transform: None,
        }
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.transform.is_none()
    }

    /// Transforms one coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::Gdal`] if GDAL fails the transformation, or
    /// [`SpatialError::Reprojection`] if the result is not finite.
    pub fn apply(&self, coord: Coord<f64>) -> Result<Coord<f64>, SpatialError> {
        let Some(transform) = &self.transform else {
            return Ok(coord);
        };

        let mut xs: [f64; 1] = [coord.x];
        let mut ys: [f64; 1] = [coord.y];
        let mut zs: [f64; 0] = [];
        transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

        if !(xs[0].is_finite() && ys[0].is_finite()) {
            return Err(SpatialError::Reprojection {
                from: self.source.to_string(),
                to: self.target.to_string(),
                x: coord.x,
                y: coord.y,
            });
        }
        Ok(Coord { x: xs[0], y: ys[0] })
    }
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("identity", &self.is_identity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LA: Coord<f64> = Coord {
        x: -118.2437,
        y: 34.0522,
    };

    #[test]
    fn parses_common_names() {
        assert_eq!(Crs::from_name("EPSG:4326").unwrap(), Crs::wgs84());
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:OGC:1.3:CRS84").unwrap(),
            Crs::wgs84()
        );
        assert_eq!(
            Crs::from_name("urn:ogc:def:crs:EPSG::3857").unwrap(),
            Crs::web_mercator()
        );
        assert_eq!(Crs::from_name("EPSG:102100").unwrap(), Crs::web_mercator());
        assert_eq!(
            Crs::from_name("http://www.opengis.net/def/crs/EPSG/0/2229").unwrap(),
            Crs::from_epsg(2229)
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            Crs::from_name("EPSG:999999"),
            Err(SpatialError::UnsupportedCrs { .. })
        ));
        assert!(matches!(
            Crs::from_name("not a crs"),
            Err(SpatialError::UnsupportedCrs { .. })
        ));
    }

    #[test]
    fn missing_member_is_wgs84() {
        assert_eq!(Crs::from_member(None).unwrap(), Crs::wgs84());
    }

    #[test]
    fn member_round_trips() {
        let member = Crs::from_epsg(2229).to_member();
        assert_eq!(
            member["properties"]["name"],
            json!("urn:ogc:def:crs:EPSG::2229")
        );
        assert_eq!(Crs::from_member(Some(&member)).unwrap(), Crs::from_epsg(2229));
    }

    #[test]
    fn identity_transform_is_exact() {
        let transformer = Crs::wgs84().transformer_to(&Crs::wgs84()).unwrap();
        assert!(transformer.is_identity());
        assert_eq!(transformer.apply(LA).unwrap(), LA);
    }

    #[test]
    fn mercator_round_trip() {
        let forward = Crs::wgs84().transformer_to(&Crs::web_mercator()).unwrap();
        let projected = forward.apply(LA).unwrap();
        assert!((projected.x - -13_162_655.0).abs() < 10.0);
        assert!((projected.y - 4_036_548.0).abs() < 10.0);

        let back = Crs::web_mercator()
            .transformer_to(&Crs::wgs84())
            .unwrap()
            .apply(projected)
            .unwrap();
        assert!((back.x - LA.x).abs() < 1e-7);
        assert!((back.y - LA.y).abs() < 1e-7);
    }

    #[test]
    fn state_plane_feet_round_trip() {
        let state_plane = Crs::from_name("EPSG:2229").unwrap();
        let projected = Crs::wgs84()
            .transformer_to(&state_plane)
            .unwrap()
            .apply(LA)
            .unwrap();
        // California zone V, US survey feet.
        assert!((6_000_000.0..7_000_000.0).contains(&projected.x), "{projected:?}");
        assert!((1_500_000.0..2_200_000.0).contains(&projected.y), "{projected:?}");

        let back = state_plane
            .transformer_to(&Crs::wgs84())
            .unwrap()
            .apply(projected)
            .unwrap();
        assert!((back.x - LA.x).abs() < 1e-7);
        assert!((back.y - LA.y).abs() < 1e-7);
    }
}
