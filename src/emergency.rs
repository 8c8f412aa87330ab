// Emergency location payload. build_emergency_payload has no failure path:
// whatever the location subsystem produced (or failed to produce), the
// output is always transmittable to the safety endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, BookingApi};

pub const UNKNOWN_LOCATION: &str = "Unknown Location";
pub const CURRENT_LOCATION: &str = "Current Location";

// Invariants: latitude/longitude are finite, location_name is non-empty,
// timestamp parses as RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: String,
    pub timestamp: String,
}

// Whatever the location subsystem managed to gather. Every field may be
// missing or garbage.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialLocation {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
    pub timestamp: Option<String>,
}

impl From<EmergencyLocation> for PartialLocation {
    fn from(location: EmergencyLocation) -> Self {
        Self {
            latitude: Some(location.latitude),
            longitude: Some(location.longitude),
            location_name: Some(location.location_name),
            timestamp: Some(location.timestamp),
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn finite_or_zero(coordinate: Option<f64>) -> f64 {
    match coordinate {
        Some(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

// Defaults, shallow merge, then invariant enforcement in order:
// non-finite coordinates become 0; a missing or unparseable timestamp
// becomes now; at (0, 0) the name is forced to "Unknown Location";
// otherwise a still-default name is promoted to "Current Location" and a
// caller-supplied name is preserved. Normalization is a fixed point.
pub fn build_emergency_payload(partial: Option<&PartialLocation>) -> EmergencyLocation {
    let empty = PartialLocation::default();
    let partial = partial.unwrap_or(&empty);

    let latitude = finite_or_zero(partial.latitude);
    let longitude = finite_or_zero(partial.longitude);

    let timestamp = partial
        .timestamp
        .as_deref()
        .filter(|ts| DateTime::parse_from_rfc3339(ts).is_ok())
        .map(str::to_string)
        .unwrap_or_else(now_iso);

    let supplied_name = partial
        .location_name
        .as_deref()
        .filter(|name| !name.trim().is_empty());

    let location_name = if latitude == 0.0 && longitude == 0.0 {
        UNKNOWN_LOCATION.to_string()
    } else {
        match supplied_name {
            None | Some(UNKNOWN_LOCATION) => CURRENT_LOCATION.to_string(),
            Some(name) => name.to_string(),
        }
    };

    EmergencyLocation {
        latitude,
        longitude,
        location_name,
        timestamp,
    }
}

// Normalizes and submits in one step, so a dead location subsystem can
// never block the emergency trigger.
pub async fn send_emergency_alert(
    api: &dyn BookingApi,
    partial: Option<&PartialLocation>,
) -> Result<EmergencyLocation, ApiError> {
    let location = build_emergency_payload(partial);
    api.trigger_emergency(&location).await?;
    Ok(location)
}
