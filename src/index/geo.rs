use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::trace;

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Cid, DocumentRef, Iid, Rid};
use crate::index::base::{Index, IndexBase, IndexType};
use crate::shape::shaper::{Pid, Shaper};

/// Mean earth radius in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(GeoPoint { latitude, longitude })
    }

    /// Great circle distance in meters (haversine).
    pub fn distance(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS * a.sqrt().min(1.0).asin()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// one attribute holding `[lat, lon]`, or `[lon, lat]` in GeoJSON order
    Combined { pid: Pid, geo_json: bool },
    Separate { latitude: Pid, longitude: Pid },
}

enum Extracted {
    Point(GeoPoint),
    Missing,
    Invalid,
}

/// Geo index over one list attribute (`geo1`) or a latitude and a longitude
/// attribute (`geo2`).
///
/// As a constraint, documents with invalid coordinates are rejected, and so are
/// documents without coordinates unless `ignoreNull` is set. Otherwise such
/// documents are simply not indexed.
pub struct GeoIndex {
    base: IndexBase,
    shaper: Arc<dyn Shaper>,
    location: Location,
    constraint: bool,
    ignore_null: bool,
    points: BTreeMap<Rid, (DocumentRef, GeoPoint)>,
}

impl GeoIndex {
    pub fn new_combined(
        iid: Iid,
        cid: Cid,
        shaper: Arc<dyn Shaper>,
        field: &str,
        geo_json: bool,
        constraint: bool,
        ignore_null: bool,
    ) -> Result<Self> {
        let pid = shaper.find_or_create_attribute_path_by_name(field)?;
        trace!(target: "index.geo", iid = iid.0, field, geo_json, constraint, "created geo1 index");
        Ok(GeoIndex {
            base: IndexBase::new(iid, IndexType::Geo1, cid, constraint, vec![field.to_string()]),
            shaper,
            location: Location::Combined { pid, geo_json },
            constraint,
            ignore_null,
            points: BTreeMap::new(),
        })
    }

    pub fn new_separate(
        iid: Iid,
        cid: Cid,
        shaper: Arc<dyn Shaper>,
        latitude: &str,
        longitude: &str,
        constraint: bool,
        ignore_null: bool,
    ) -> Result<Self> {
        let lat = shaper.find_or_create_attribute_path_by_name(latitude)?;
        let lon = shaper.find_or_create_attribute_path_by_name(longitude)?;
        trace!(target: "index.geo", iid = iid.0, latitude, longitude, constraint, "created geo2 index");
        Ok(GeoIndex {
            base: IndexBase::new(
                iid,
                IndexType::Geo2,
                cid,
                constraint,
                vec![latitude.to_string(), longitude.to_string()],
            ),
            shaper,
            location: Location::Separate { latitude: lat, longitude: lon },
            constraint,
            ignore_null,
            points: BTreeMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn value(&self, doc: &DocumentRef, pid: Pid) -> Result<Option<Value>> {
        match self.shaper.extract_shaped_json(&doc.shaped, pid)? {
            Some(sub) => match self.shaper.sub_to_json(&doc.shaped, &sub)? {
                Value::Null => Ok(None),
                value => Ok(Some(value)),
            },
            None => Ok(None),
        }
    }

    fn extract(&self, doc: &DocumentRef) -> Result<Extracted> {
        let (lat, lon) = match self.location {
            Location::Combined { pid, geo_json } => {
                let Some(value) = self.value(doc, pid)? else {
                    return Ok(Extracted::Missing);
                };
                match value.as_array().map(Vec::as_slice) {
                    Some([a, b]) if geo_json => (b.as_f64(), a.as_f64()),
                    Some([a, b]) => (a.as_f64(), b.as_f64()),
                    _ => return Ok(Extracted::Invalid),
                }
            }
            Location::Separate { latitude, longitude } => {
                match (self.value(doc, latitude)?, self.value(doc, longitude)?) {
                    (Some(lat), Some(lon)) => (lat.as_f64(), lon.as_f64()),
                    (None, None) => return Ok(Extracted::Missing),
                    _ => return Ok(Extracted::Invalid),
                }
            }
        };
        Ok(match (lat, lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).map_or(Extracted::Invalid, Extracted::Point),
            _ => Extracted::Invalid,
        })
    }

    fn violated(&self, doc: &DocumentRef, what: &str) -> Error {
        Error::new(
            ErrorKind::GeoIndexViolated,
            format!("document '{}' has {} coordinates", doc.key, what),
        )
    }

    /// Up to `limit` documents ordered by distance from the point.
    pub fn near(&self, latitude: f64, longitude: f64, limit: usize) -> Result<Vec<(DocumentRef, f64)>> {
        let origin = GeoPoint::new(latitude, longitude)
            .ok_or_else(|| Error::new(ErrorKind::BadParameter, "invalid coordinates"))?;
        let mut hits: Vec<(DocumentRef, f64)> = self
            .points
            .values()
            .map(|(doc, point)| (Arc::clone(doc), origin.distance(point)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Documents within `radius` meters of the point, nearest first.
    pub fn within(&self, latitude: f64, longitude: f64, radius: f64) -> Result<Vec<(DocumentRef, f64)>> {
        let origin = GeoPoint::new(latitude, longitude)
            .ok_or_else(|| Error::new(ErrorKind::BadParameter, "invalid coordinates"))?;
        let mut hits: Vec<(DocumentRef, f64)> = self
            .points
            .values()
            .map(|(doc, point)| (Arc::clone(doc), origin.distance(point)))
            .filter(|(_, distance)| *distance <= radius)
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(hits)
    }
}

impl Index for GeoIndex {
    fn base(&self) -> &IndexBase {
        &self.base
    }

    fn insert(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        match self.extract(doc)? {
            Extracted::Point(point) => {
                self.points.insert(doc.rid, (Arc::clone(doc), point));
                Ok(())
            }
            Extracted::Missing if self.constraint && !self.ignore_null => Err(self.violated(doc, "no")),
            Extracted::Invalid if self.constraint => Err(self.violated(doc, "invalid")),
            Extracted::Missing | Extracted::Invalid => Ok(()),
        }
    }

    fn remove(&mut self, doc: &DocumentRef, _is_rollback: bool) -> Result<()> {
        self.points.remove(&doc.rid);
        Ok(())
    }

    fn json(&self) -> Value {
        let mut map = self.base.json();
        if let Location::Combined { geo_json, .. } = self.location {
            map.insert("geoJson".to_string(), json!(geo_json));
        }
        map.insert("constraint".to_string(), json!(self.constraint));
        map.insert("ignoreNull".to_string(), json!(self.ignore_null));
        Value::Object(map)
    }

    fn memory(&self) -> usize {
        self.points.len()
            * (std::mem::size_of::<Rid>() + std::mem::size_of::<DocumentRef>() + std::mem::size_of::<GeoPoint>())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::shaper::VocShaper;
    use crate::test_support::make_doc;

    fn shaper() -> Arc<dyn Shaper> {
        Arc::new(VocShaper::new())
    }

    #[test]
    fn haversine_distance() {
        let cologne = GeoPoint::new(50.9375, 6.9603).unwrap();
        let paris = GeoPoint::new(48.8566, 2.3522).unwrap();
        let d = cologne.distance(&paris);
        assert!((d - 400_000.0).abs() < 10_000.0, "distance {}", d);
        assert_eq!(cologne.distance(&cologne), 0.0);
        assert!(GeoPoint::new(91.0, 0.0).is_none());
    }

    #[test]
    fn near_and_within_on_combined_location() {
        let shaper = shaper();
        let mut idx = GeoIndex::new_combined(Iid(3), Cid(1), Arc::clone(&shaper), "loc", false, false, false)
            .unwrap();
        for (key, lat, lon) in [("cgn", 50.9375, 6.9603), ("par", 48.8566, 2.3522), ("nyc", 40.7128, -74.006)] {
            idx.insert(&make_doc(shaper.as_ref(), key, json!({"loc": [lat, lon]})), false).unwrap();
        }
        idx.insert(&make_doc(shaper.as_ref(), "none", json!({"other": 1})), false).unwrap();
        assert_eq!(idx.len(), 3);

        let near: Vec<String> = idx.near(51.0, 7.0, 2).unwrap().into_iter().map(|(d, _)| d.key.clone()).collect();
        assert_eq!(near, vec!["cgn", "par"]);

        let within = idx.within(51.0, 7.0, 100_000.0).unwrap();
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].0.key, "cgn");
    }

    #[test]
    fn geo_json_swaps_order() {
        let shaper = shaper();
        let mut idx = GeoIndex::new_combined(Iid(3), Cid(1), Arc::clone(&shaper), "loc", true, false, false)
            .unwrap();
        idx.insert(&make_doc(shaper.as_ref(), "cgn", json!({"loc": [6.9603, 50.9375]})), false).unwrap();
        let hits = idx.within(50.9375, 6.9603, 1.0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(idx.json()["geoJson"], true);
    }

    #[test]
    fn constraint_rejects_bad_coordinates() {
        let shaper = shaper();
        let mut idx = GeoIndex::new_separate(Iid(4), Cid(1), Arc::clone(&shaper), "lat", "lon", true, true)
            .unwrap();
        let missing = make_doc(shaper.as_ref(), "m", json!({"x": 1}));
        idx.insert(&missing, false).unwrap();
        let invalid = make_doc(shaper.as_ref(), "i", json!({"lat": 100, "lon": 0}));
        assert_eq!(idx.insert(&invalid, false).unwrap_err().kind, ErrorKind::GeoIndexViolated);

        let mut strict = GeoIndex::new_separate(Iid(5), Cid(1), Arc::clone(&shaper), "lat", "lon", true, false)
            .unwrap();
        assert_eq!(strict.insert(&missing, false).unwrap_err().kind, ErrorKind::GeoIndexViolated);
        let json = strict.json();
        assert_eq!(json["type"], "geo2");
        assert_eq!(json["unique"], true);
        assert!(json.get("geoJson").is_none());
    }
}
