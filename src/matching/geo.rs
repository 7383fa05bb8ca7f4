/// Distance reported when either side has no coordinates.
pub const UNKNOWN_DISTANCE_KM: f64 = 9999.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Distance in km rounded to one decimal, or [`UNKNOWN_DISTANCE_KM`].
pub fn distance_between(from: (Option<f64>, Option<f64>), to: (Option<f64>, Option<f64>)) -> f64 {
    match (from, to) {
        ((Some(lat1), Some(lon1)), (Some(lat2), Some(lon2))) => {
            (haversine_km(lat1, lon1, lat2, lon2) * 10.0).round() / 10.0
        }
        _ => UNKNOWN_DISTANCE_KM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paris_to_london() {
        let d = distance_between((Some(48.8566), Some(2.3522)), (Some(51.5074), Some(-0.1278)));
        assert!((d - 343.6).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(distance_between((Some(10.0), Some(20.0)), (Some(10.0), Some(20.0))), 0.0);
    }

    #[test]
    fn test_missing_coordinates() {
        assert_eq!(distance_between((None, Some(2.0)), (Some(1.0), Some(2.0))), UNKNOWN_DISTANCE_KM);
        assert_eq!(distance_between((Some(1.0), Some(2.0)), (Some(1.0), None)), UNKNOWN_DISTANCE_KM);
    }
}
