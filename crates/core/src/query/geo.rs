//! Geospatial radius search: spherical caps over `[lng, lat]` coordinates.

use crate::config::EARTH_RADIUS_MILES;
use crate::document::{Document, FieldValue};
use crate::filter_types::GeoWithin;

/// Convert a distance in miles to an angular radius in radians.
pub fn angular_radius(distance_miles: f64) -> f64 {
    distance_miles / EARTH_RADIUS_MILES
}

/// Central angle in radians between two `(lng, lat)` points given in degrees
/// (haversine formula).
pub fn central_angle(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lng1, lat1) = (a.0.to_radians(), a.1.to_radians());
    let (lng2, lat2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

/// Cap centred at `(lng, lat)` covering `distance_miles` on `field`.
pub fn within_radius(field: &str, lng: f64, lat: f64, distance_miles: f64) -> GeoWithin {
    GeoWithin {
        field: field.to_string(),
        lng,
        lat,
        radius: angular_radius(distance_miles),
    }
}

/// Whether the document's coordinates lie inside the cap. Documents without
/// a `[lng, lat]` pair at the cap's field never match.
pub fn contains(cap: &GeoWithin, doc: &Document) -> bool {
    let point = match doc.get(&cap.field).as_deref() {
        Some(FieldValue::Array(items)) if items.len() >= 2 => {
            match (items[0].as_f64(), items[1].as_f64()) {
                (Some(lng), Some(lat)) => (lng, lat),
                _ => return false,
            }
        }
        _ => return false,
    };
    central_angle((cap.lng, cap.lat), point) <= cap.radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{set_path, Fields};

    fn located(lng: f64, lat: f64) -> Document {
        let mut fields = Fields::new();
        set_path(
            &mut fields,
            "location.coordinates",
            FieldValue::Array(vec![FieldValue::Float(lng), FieldValue::Float(lat)]),
        );
        Document::new(fields)
    }

    #[test]
    fn test_angular_radius() {
        assert_eq!(angular_radius(3963.0), 1.0);
        assert!((angular_radius(100.0) - 100.0 / 3963.0).abs() < 1e-15);
        assert_eq!(angular_radius(0.0), 0.0);
    }

    #[test]
    fn test_central_angle_same_point() {
        assert!(central_angle((-71.1, 42.3), (-71.1, 42.3)).abs() < 1e-12);
    }

    #[test]
    fn test_boston_to_providence() {
        // Roughly 41 miles apart.
        let boston = (-71.0589, 42.3601);
        let providence = (-71.4128, 41.824);
        let miles = central_angle(boston, providence) * EARTH_RADIUS_MILES;
        assert!(miles > 38.0 && miles < 44.0, "got {miles}");
    }

    #[test]
    fn test_contains() {
        let cap = within_radius("location.coordinates", -71.0589, 42.3601, 50.0);
        assert!(contains(&cap, &located(-71.4128, 41.824)));
        // Los Angeles
        assert!(!contains(&cap, &located(-118.2437, 34.0522)));
        assert!(!contains(&cap, &Document::new(Fields::new())));
    }

    #[test]
    fn test_integer_coordinates() {
        let cap = within_radius("location.coordinates", 0.0, 0.0, 1.0);
        let mut fields = Fields::new();
        set_path(
            &mut fields,
            "location.coordinates",
            FieldValue::Array(vec![FieldValue::Integer(0), FieldValue::Integer(0)]),
        );
        assert!(contains(&cap, &Document::new(fields)));
    }
}
