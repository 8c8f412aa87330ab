// HTTP layer for the AssistLink API. The BookingApi trait is the seam the
// slot client and the booking pipeline are written against; HttpApi is the
// reqwest-backed implementation.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::emergency::EmergencyLocation;

#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status} - {message}")]
    Response {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Failed to decode response body: {0}")]
    Decode(String),
}

impl ApiError {
    // HTTP status of the failure; 0 when the request never produced a
    // server response, matching the classifier's network rule.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::Response { status, .. } => *status,
            ApiError::Network(_) | ApiError::Decode(_) => 0,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Response { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Network(msg) | ApiError::Decode(msg) => msg,
            ApiError::Response { message, .. } => message,
        }
    }
}

// A bookable interval as the server reports it. `available` is never
// mutated locally; the server is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub available: bool,
    pub caregiver_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// Body of POST /api/bookings/slot. scheduled_date and duration_hours come
// from the slot the user picked; the pipeline does not re-derive them.
#[derive(Debug, Clone, Serialize)]
pub struct BookingRequest {
    pub caregiver_id: String,
    pub service_type: String,
    pub scheduled_date: DateTime<Utc>,
    pub duration_hours: f64,
    pub location: Option<serde_json::Value>,
    pub specific_needs: Option<String>,
    pub is_emergency: bool,
    pub video_call_request_id: Option<String>,
    pub chat_session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: String,
    pub caregiver_id: String,
    pub service_type: String,
    pub scheduled_date: DateTime<Utc>,
    pub duration_hours: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BookingApi: Send + Sync + 'static {
    async fn fetch_slots(
        &self,
        caregiver_id: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        slot_duration_minutes: u32,
    ) -> Result<Vec<Slot>, ApiError>;

    async fn check_availability(
        &self,
        caregiver_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SlotAvailability, ApiError>;

    async fn book_slot(&self, request: &BookingRequest) -> Result<BookingRecord, ApiError>;

    async fn trigger_emergency(&self, location: &EmergencyLocation) -> Result<(), ApiError>;
}

// The server reports failures in one of two shapes:
//   { "error": { "code", "message", "status" } }
//   { "detail": "..." } or { "detail": [{ "msg": "..." }] }
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    detail: Option<Detail>,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    status: Option<u16>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Detail {
    Text(String),
    Items(Vec<DetailItem>),
}

#[derive(Deserialize)]
struct DetailItem {
    msg: Option<String>,
}

pub(crate) fn decode_error_body(status: u16, body: &str) -> ApiError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(err) = envelope.error {
            return ApiError::Response {
                status: err.status.unwrap_or(status),
                code: err.code,
                message: err
                    .message
                    .unwrap_or_else(|| format!("Request failed with status {}", status)),
            };
        }
        if let Some(detail) = envelope.detail {
            let message = match detail {
                Detail::Text(text) => text,
                Detail::Items(items) => items
                    .into_iter()
                    .filter_map(|item| item.msg)
                    .collect::<Vec<_>>()
                    .join("; "),
            };
            if !message.is_empty() {
                return ApiError::Response {
                    status,
                    code: None,
                    message,
                };
            }
        }
    }

    ApiError::Response {
        status,
        code: None,
        message: format!("Request failed with status {}", status),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub base_url: String,
    // Opaque bearer token from the enclosing session. Absence is not an
    // error; the server decides what unauthenticated reads may see.
    pub auth_token: Option<String>,
}

pub struct HttpApi {
    config: ApiConfig,
    http: reqwest::Client,
}

fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl HttpApi {
    pub fn new(config: ApiConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn set_auth_token(&mut self, token: Option<String>) {
        self.config.auth_token = token;
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.config.base_url, path));
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn settle<T: DeserializeOwned>(
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(decode_error_body(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BookingApi for HttpApi {
    async fn fetch_slots(
        &self,
        caregiver_id: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        slot_duration_minutes: u32,
    ) -> Result<Vec<Slot>, ApiError> {
        debug!(caregiver_id, "fetching caregiver slots");
        let builder = self
            .request(
                reqwest::Method::GET,
                &format!("/api/caregivers/{}/slots", caregiver_id),
            )
            .query(&[
                ("from_date", iso(from_date)),
                ("to_date", iso(to_date)),
                ("slot_duration_minutes", slot_duration_minutes.to_string()),
            ]);
        Self::settle(builder).await
    }

    async fn check_availability(
        &self,
        caregiver_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SlotAvailability, ApiError> {
        let builder = self
            .request(reqwest::Method::GET, "/api/bookings/slot-availability")
            .query(&[
                ("caregiver_id", caregiver_id.to_string()),
                ("start_time", iso(start_time)),
                ("end_time", iso(end_time)),
            ]);
        Self::settle(builder).await
    }

    async fn book_slot(&self, request: &BookingRequest) -> Result<BookingRecord, ApiError> {
        debug!(caregiver_id = %request.caregiver_id, "submitting slot booking");
        let builder = self
            .request(reqwest::Method::POST, "/api/bookings/slot")
            .json(request);
        Self::settle(builder).await
    }

    async fn trigger_emergency(&self, location: &EmergencyLocation) -> Result<(), ApiError> {
        let builder = self
            .request(reqwest::Method::POST, "/api/emergency/trigger")
            .json(&serde_json::json!({ "location": location }));

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(decode_error_body(status, &body));
        }
        Ok(())
    }
}
