use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A latitude/longitude pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Where the user is. Resolved at most once per session by the geolocation acquirer.
pub type UserLocation = Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpenStatus {
    Open,
    Closed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl OpenStatus {
    pub fn label(self) -> &'static str {
        match self {
            OpenStatus::Open => "Open now",
            OpenStatus::Closed => "Closed",
            OpenStatus::Unknown => "Status unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: u64,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub rating: u8,
    pub text: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub google_rating: f32,
    #[serde(default)]
    pub cig_rating: f32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub open_status: OpenStatus,
    #[serde(default)]
    pub available_brands: BTreeSet<String>,
    #[serde(default)]
    pub available_accessories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
}

impl Place {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    pub fn is_open(&self) -> bool {
        self.open_status == OpenStatus::Open
    }

    /// Route planning is left to an external maps application.
    pub fn directions_url(&self) -> String {
        format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}",
            self.latitude, self.longitude
        )
    }
}

/// Crowd-sourced confirmation that a place is (or is not) open and which brands it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub place_id: String,
    pub open_confirm: bool,
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReport {
    pub place_id: String,
    pub brand: String,
    pub has_stock: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub place_id: String,
    pub stars: u8,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
}

impl CatalogEntry {
    const fn new(id: &'static str, name: &'static str) -> Self {
        Self { id, name }
    }
}

pub const BRAND_CATALOG: &[CatalogEntry] = &[
    CatalogEntry::new("marlboro", "Marlboro"),
    CatalogEntry::new("lucky_strike", "Lucky Strike"),
    CatalogEntry::new("dunhill", "Dunhill"),
    CatalogEntry::new("parliament", "Parliament"),
    CatalogEntry::new("camel", "Camel"),
    CatalogEntry::new("winston", "Winston"),
];

pub const ACCESSORY_CATALOG: &[CatalogEntry] = &[
    CatalogEntry::new("seda", "Rolling papers"),
    CatalogEntry::new("piteira", "Filter tips"),
    CatalogEntry::new("dechavador", "Grinder"),
    CatalogEntry::new("isqueiro", "Lighter"),
    CatalogEntry::new("cinzeiro", "Ashtray"),
];

/// Display name for a brand or accessory id, falling back to the raw id.
pub fn catalog_name(catalog: &[CatalogEntry], id: &str) -> String {
    catalog
        .iter()
        .find(|entry| entry.id == id)
        .map(|entry| entry.name.to_string())
        .unwrap_or_else(|| id.to_string())
}
