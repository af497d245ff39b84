//! Query parameter validation

use crate::error::{ErrorCode, WinterReadyError};
use crate::models::{Coordinates, RoadRegion};
use crate::Result;

/// Identity used when the request carries no forwarding header
pub const UNKNOWN_CLIENT: &str = "unknown";

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| !n.is_nan())
}

/// Parses optional `lat`/`lon` strings, substituting `defaults` for missing values
pub fn validate_coordinates(
    lat: Option<&str>,
    lon: Option<&str>,
    defaults: Coordinates,
) -> Result<Coordinates> {
    let lat = present(lat).map_or(Some(defaults.lat), parse_number);
    let lon = present(lon).map_or(Some(defaults.lon), parse_number);

    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(WinterReadyError::validation(
            ErrorCode::InvalidCoordinates,
            "Invalid coordinates: lat and lon must be numbers",
        ));
    };

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(WinterReadyError::validation(
            ErrorCode::InvalidCoordinates,
            "Invalid coordinates: lat must be -90..90, lon must be -180..180",
        ));
    }

    Ok(Coordinates::new(lat, lon))
}

/// Missing region means `national`
pub fn validate_region(region: Option<&str>) -> Result<RoadRegion> {
    match present(region) {
        None => Ok(RoadRegion::National),
        Some(region) => region.parse(),
    }
}

/// Cloud cover in percent, `default` when missing
pub fn validate_cloud_cover(cloud_cover: Option<&str>, default: f64) -> Result<f64> {
    let Some(raw) = present(cloud_cover) else {
        return Ok(default);
    };
    parse_number(raw)
        .filter(|value| (0.0..=100.0).contains(value))
        .ok_or_else(|| {
            WinterReadyError::validation(
                ErrorCode::InvalidCloudCover,
                "Invalid cloudCover: must be a number between 0 and 100",
            )
        })
}

/// First entry of an `X-Forwarded-For` header
#[must_use]
pub fn client_identity(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}
