use crate::document::{FieldValue, Fields};
use serde::{Deserialize, Serialize};

/// One geocoder match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedAddress {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zipcode: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl GeocodedAddress {
    /// The stored GeoJSON-style `location` object. Coordinates are `[lng, lat]`.
    pub fn to_location(&self) -> FieldValue {
        let mut fields = Fields::new();
        fields.insert("type".into(), FieldValue::String("Point".into()));
        fields.insert(
            "coordinates".into(),
            FieldValue::Array(vec![
                FieldValue::Float(self.longitude),
                FieldValue::Float(self.latitude),
            ]),
        );
        let parts = [
            ("formattedAddress", &self.formatted_address),
            ("street", &self.street_name),
            ("city", &self.city),
            ("state", &self.state),
            ("zipcode", &self.zipcode),
            ("country", &self.country),
        ];
        for (key, value) in parts {
            if let Some(v) = value {
                fields.insert(key.into(), FieldValue::String(v.clone()));
            }
        }
        FieldValue::Object(fields)
    }
}
