use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::news::NewsItem;

/// Row of the `hospitals` table. `geom` is PostGIS geography rendered as GeoJSON.
/// Identifiers pass through as whatever type the table uses.
#[derive(Debug, Deserialize)]
pub struct HospitalRow {
    pub id: Value,
    pub name: String,
    pub geom: Option<PointGeometry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub geometry: PointGeometry,
    pub properties: HospitalProperties,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HospitalProperties {
    pub id: Value,
    pub name: String,
}

impl HospitalRow {
    /// Turns the row into a point feature, or `None` when it has no usable location.
    pub fn into_feature(self) -> Option<Feature> {
        let geom = self.geom?;
        let [lng, lat] = geom.coordinates.get(..2)? else {
            return None;
        };

        Some(Feature {
            kind: "Feature",
            geometry: PointGeometry {
                kind: "Point".to_string(),
                coordinates: vec![*lng, *lat],
            },
            properties: HospitalProperties {
                id: self.id,
                name: self.name,
            },
        })
    }
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        FeatureCollection {
            kind: "FeatureCollection",
            features,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NearestHospitalQuery {
    pub start_lat: Option<String>,
    pub start_lng: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NearestHospitalParams {
    pub start_lat: f64,
    pub start_lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NearestHospital {
    pub id: Value,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tip {
    pub tip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmergencyContact {
    pub emergency_type: String,
    pub contact_number: Value,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub breaking_news: Vec<NewsItem>,
    pub all_news: Vec<NewsItem>,
}

/// First-aid tip categories, each backed by its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipCategory {
    Fire,
    Accident,
    Flood,
    Collapse,
}

impl TipCategory {
    pub fn table(self) -> &'static str {
        match self {
            TipCategory::Fire => "fire_tips",
            TipCategory::Accident => "accident_tips",
            TipCategory::Flood => "flood_tips",
            TipCategory::Collapse => "collapse_tips",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TipCategory::Fire => "fire",
            TipCategory::Accident => "accident",
            TipCategory::Flood => "flood",
            TipCategory::Collapse => "collapse",
        }
    }
}
