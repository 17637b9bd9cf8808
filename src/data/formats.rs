//! Feature normalization
//!
//! Turns a raw upstream payload into a canonical [`FeatureCollection`].
//! Two payload shapes are understood:
//!
//! * [`SourceFormat::GeoJson`]: a GeoJSON `FeatureCollection`, a single
//!   `Feature` or a bare geometry object.
//! * [`SourceFormat::Lots`]: an object with a `lots` array; every lot carries
//!   `coords: {lat, lng}` and becomes one point feature whose properties are
//!   the whole lot object.
//!
//! Normalization is fail-fast: one malformed record rejects the whole batch.

use crate::data::geojson::{Feature, FeatureCollection, Geometry};
use crate::{Error, NormalizationError};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Shape of the upstream payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    GeoJson,
    Lots,
}

impl FromStr for SourceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "geojson" => Ok(SourceFormat::GeoJson),
            "lots" => Ok(SourceFormat::Lots),
            other => Err(Error::Construction(format!("unknown source format: {}", other))),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::GeoJson => f.write_str("geojson"),
            SourceFormat::Lots => f.write_str("lots"),
        }
    }
}

/// Normalizes a raw payload into a feature collection.
pub fn normalize(raw: &[u8], format: SourceFormat) -> Result<FeatureCollection, NormalizationError> {
    let value: Value = serde_json::from_slice(raw)?;
    let collection = match format {
        SourceFormat::GeoJson => from_geojson(value)?,
        SourceFormat::Lots => from_lots(value)?,
    };
    log::debug!(
        "normalized {} payload into {} features",
        format,
        collection.len()
    );
    Ok(collection)
}

fn from_geojson(value: Value) -> Result<FeatureCollection, NormalizationError> {
    let root_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| NormalizationError::UnsupportedRoot("missing `type`".to_string()))?
        .to_string();

    match root_type.as_str() {
        "FeatureCollection" => {
            let features = match value.get("features") {
                Some(Value::Array(features)) => features,
                _ => {
                    return Err(NormalizationError::UnsupportedRoot(
                        "FeatureCollection without a `features` array".to_string(),
                    ))
                }
            };
            features
                .iter()
                .enumerate()
                .map(|(index, raw)| parse_feature(index, raw))
                .collect()
        }
        "Feature" => Ok(FeatureCollection::new(vec![parse_feature(0, &value)?])),
        t if Geometry::TYPE_NAMES.contains(&t) => {
            let geometry = parse_geometry(0, value)?;
            Ok(FeatureCollection::new(vec![Feature::new(
                geometry,
                Default::default(),
            )]))
        }
        other => Err(NormalizationError::UnsupportedRoot(other.to_string())),
    }
}

fn parse_feature(index: usize, raw: &Value) -> Result<Feature, NormalizationError> {
    if raw.get("geometry").map_or(true, Value::is_null) {
        return Err(NormalizationError::InvalidFeature {
            index,
            reason: "missing geometry".to_string(),
        });
    }
    let feature = Feature::deserialize(raw).map_err(|e| NormalizationError::InvalidFeature {
        index,
        reason: e.to_string(),
    })?;
    feature
        .geometry
        .validate()
        .map_err(|reason| NormalizationError::InvalidFeature { index, reason })?;
    Ok(feature)
}

fn parse_geometry(index: usize, raw: Value) -> Result<Geometry, NormalizationError> {
    let geometry = Geometry::deserialize(raw).map_err(|e| NormalizationError::InvalidFeature {
        index,
        reason: e.to_string(),
    })?;
    geometry
        .validate()
        .map_err(|reason| NormalizationError::InvalidFeature { index, reason })?;
    Ok(geometry)
}

fn from_lots(value: Value) -> Result<FeatureCollection, NormalizationError> {
    let lots = match value.get("lots") {
        Some(Value::Array(lots)) => lots,
        _ => return Err(NormalizationError::MissingLots),
    };

    lots.iter()
        .enumerate()
        .map(|(index, lot)| lot_to_feature(index, lot))
        .collect()
}

fn lot_to_feature(index: usize, lot: &Value) -> Result<Feature, NormalizationError> {
    let invalid = |reason: &str| NormalizationError::InvalidLot {
        index,
        reason: reason.to_string(),
    };

    let properties = lot.as_object().ok_or_else(|| invalid("lot is not an object"))?;
    let coords = properties
        .get("coords")
        .and_then(Value::as_object)
        .ok_or_else(|| invalid("missing `coords` object"))?;
    let lat = coords
        .get("lat")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid("`coords.lat` is not a number"))?;
    let lng = coords
        .get("lng")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid("`coords.lng` is not a number"))?;

    // The lot keeps its coords in the properties for downstream consumers.
    Ok(Feature::new(Geometry::point(lng, lat), properties.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::Position;

    #[test]
    fn test_lots_feed_normalizes_to_points() {
        let raw = br#"{"lots":[{"coords":{"lat":48.4,"lng":9.9},"name":"A"}]}"#;
        let collection = normalize(raw, SourceFormat::Lots).unwrap();

        assert_eq!(collection.len(), 1);
        let feature = &collection.features[0];
        assert_eq!(
            feature.geometry,
            Geometry::Point {
                coordinates: Position::new(9.9, 48.4)
            }
        );
        assert_eq!(feature.properties["name"], "A");
        assert_eq!(feature.properties["coords"]["lat"], 48.4);
    }

    #[test]
    fn test_lots_preserve_order() {
        let raw = br#"{"lots":[
            {"coords":{"lat":1,"lng":2},"name":"first"},
            {"coords":{"lat":3,"lng":4},"name":"second"}
        ]}"#;
        let collection = normalize(raw, SourceFormat::Lots).unwrap();
        let names: Vec<_> = collection
            .iter()
            .map(|f| f.properties["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_lots_missing_array() {
        let err = normalize(br#"{"parking":[]}"#, SourceFormat::Lots).unwrap_err();
        assert_eq!(err, NormalizationError::MissingLots);
    }

    #[test]
    fn test_one_bad_lot_fails_the_batch() {
        let raw = br#"{"lots":[
            {"coords":{"lat":48.4,"lng":9.9}},
            {"coords":{"lat":"north","lng":9.9}}
        ]}"#;
        let err = normalize(raw, SourceFormat::Lots).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidLot { index: 1, .. }));

        let raw = br#"{"lots":[{"name":"no coords"}]}"#;
        let err = normalize(raw, SourceFormat::Lots).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidLot { index: 0, .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = normalize(b"{\"lots\": [", SourceFormat::Lots).unwrap_err();
        assert!(matches!(err, NormalizationError::Json(_)));
    }

    #[test]
    fn test_geojson_collection_passes_through() {
        let raw = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[24.94,60.17]},"properties":{"kind":"kiosk"}},
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0,0],[1,1]]},"properties":null}
        ]}"#;
        let collection = normalize(raw, SourceFormat::GeoJson).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[0].properties["kind"], "kiosk");
        assert_eq!(collection.features[1].geometry.type_name(), "LineString");
    }

    #[test]
    fn test_geojson_single_feature_and_bare_geometry() {
        let feature = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}"#;
        assert_eq!(normalize(feature, SourceFormat::GeoJson).unwrap().len(), 1);

        let geometry = br#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}"#;
        let collection = normalize(geometry, SourceFormat::GeoJson).unwrap();
        assert_eq!(collection.len(), 1);
        assert!(collection.features[0].properties.is_empty());
    }

    #[test]
    fn test_geojson_missing_geometry_is_an_error() {
        let raw = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{}}
        ]}"#;
        let err = normalize(raw, SourceFormat::GeoJson).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidFeature { index: 0, .. }));
    }

    #[test]
    fn test_geojson_bad_coordinates_are_an_error() {
        let raw = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}},
            {"type":"Feature","geometry":{"type":"Point","coordinates":["x",2]},"properties":{}}
        ]}"#;
        let err = normalize(raw, SourceFormat::GeoJson).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidFeature { index: 1, .. }));
    }

    #[test]
    fn test_geojson_unknown_root() {
        let err = normalize(br#"{"type":"Topology"}"#, SourceFormat::GeoJson).unwrap_err();
        assert_eq!(err, NormalizationError::UnsupportedRoot("Topology".to_string()));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("GeoJSON".parse::<SourceFormat>().unwrap(), SourceFormat::GeoJson);
        assert_eq!("lots".parse::<SourceFormat>().unwrap(), SourceFormat::Lots);
        assert!("csv".parse::<SourceFormat>().is_err());
    }
}
