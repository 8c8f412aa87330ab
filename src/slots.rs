// Read client for a caregiver's bookable slots, with the TTL cache as a
// read-through optimization. The server's slot list and ordering are
// authoritative; nothing is merged or re-sorted locally.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::api::{ApiError, BookingApi, Slot, SlotAvailability};
use crate::cache::CacheStore;

pub const DEFAULT_SLOT_DURATION_MINUTES: u32 = 60;

const SLOTS_RESOURCE_PREFIX: &str = "caregiver_slots";

fn slots_resource(caregiver_id: &str) -> String {
    format!("{}_{}", SLOTS_RESOURCE_PREFIX, caregiver_id)
}

pub struct SlotAvailabilityClient {
    api: Arc<dyn BookingApi>,
    cache: Arc<CacheStore>,
}

impl SlotAvailabilityClient {
    pub fn new(api: Arc<dyn BookingApi>, cache: Arc<CacheStore>) -> Self {
        Self { api, cache }
    }

    // Cached read of the slot list for a date range. A cache hit skips the
    // network entirely; a miss populates the cache with the default TTL.
    pub async fn get_slots(
        &self,
        caregiver_id: &str,
        from_date: DateTime<Utc>,
        to_date: DateTime<Utc>,
        slot_duration_minutes: u32,
    ) -> Result<Vec<Slot>, ApiError> {
        let resource = slots_resource(caregiver_id);
        let from = from_date.to_rfc3339_opts(SecondsFormat::Secs, true);
        let to = to_date.to_rfc3339_opts(SecondsFormat::Secs, true);
        let duration = slot_duration_minutes.to_string();
        let params: [(&str, &str); 3] = [
            ("from_date", from.as_str()),
            ("to_date", to.as_str()),
            ("slot_duration_minutes", duration.as_str()),
        ];

        if let Some(slots) = self.cache.get::<Vec<Slot>>(&resource, &params).await {
            debug!(caregiver_id, "slot list served from cache");
            return Ok(slots);
        }

        let slots = self
            .api
            .fetch_slots(caregiver_id, from_date, to_date, slot_duration_minutes)
            .await?;
        self.cache.set(&resource, &slots, &params, None).await;
        Ok(slots)
    }

    // Point check for a single interval. Never cached: the caller asks
    // this right before booking and wants the server's current answer.
    pub async fn check_availability(
        &self,
        caregiver_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<SlotAvailability, ApiError> {
        self.api
            .check_availability(caregiver_id, start_time, end_time)
            .await
    }

    // Drops cached slot lists so the next read hits the server. With a
    // caregiver id only that caregiver's entries go; without, all of them.
    pub async fn invalidate_slots(&self, caregiver_id: Option<&str>) {
        match caregiver_id {
            Some(id) => self.cache.invalidate(Some(&slots_resource(id))).await,
            None => self.cache.invalidate(Some(SLOTS_RESOURCE_PREFIX)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;

    fn slot(hour: u32, available: bool) -> Slot {
        Slot {
            start: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2025, 6, 1, hour + 1, 0, 0).unwrap(),
            available,
        }
    }

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 2, 0, 0, 0).unwrap(),
        )
    }

    fn client_with(api: Arc<MockApi>) -> SlotAvailabilityClient {
        SlotAvailabilityClient::new(api, Arc::new(CacheStore::in_memory()))
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let api = Arc::new(MockApi::new());
        api.set_slots(vec![slot(9, true), slot(10, false)]);
        let client = client_with(api.clone());
        let (from, to) = range();

        let first = client.get_slots("cg-1", from, to, 60).await.unwrap();
        let second = client.get_slots("cg-1", from, to, 60).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_order_is_preserved() {
        let api = Arc::new(MockApi::new());
        // Deliberately not chronological; the client must not re-sort.
        api.set_slots(vec![slot(14, true), slot(9, true), slot(11, false)]);
        let client = client_with(api.clone());
        let (from, to) = range();

        let slots = client.get_slots("cg-1", from, to, 60).await.unwrap();
        assert_eq!(slots[0], slot(14, true));
        assert_eq!(slots[1], slot(9, true));
        assert_eq!(slots[2], slot(11, false));
    }

    #[tokio::test]
    async fn test_different_ranges_cache_independently() {
        let api = Arc::new(MockApi::new());
        api.set_slots(vec![slot(9, true)]);
        let client = client_with(api.clone());
        let (from, to) = range();
        let later = Utc.with_ymd_and_hms(2025, 6, 3, 0, 0, 0).unwrap();

        client.get_slots("cg-1", from, to, 60).await.unwrap();
        client.get_slots("cg-1", to, later, 60).await.unwrap();
        client.get_slots("cg-1", from, to, 30).await.unwrap();

        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let api = Arc::new(MockApi::new());
        api.set_slots(vec![slot(9, true)]);
        let client = client_with(api.clone());
        let (from, to) = range();

        client.get_slots("cg-1", from, to, 60).await.unwrap();
        client.invalidate_slots(Some("cg-1")).await;
        client.get_slots("cg-1", from, to, 60).await.unwrap();

        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_is_scoped_to_caregiver() {
        let api = Arc::new(MockApi::new());
        api.set_slots(vec![slot(9, true)]);
        let client = client_with(api.clone());
        let (from, to) = range();

        client.get_slots("cg-1", from, to, 60).await.unwrap();
        client.get_slots("cg-2", from, to, 60).await.unwrap();
        client.invalidate_slots(Some("cg-1")).await;

        client.get_slots("cg-2", from, to, 60).await.unwrap();
        // cg-2 was still cached.
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_point_check_bypasses_cache() {
        let api = Arc::new(MockApi::new());
        let client = client_with(api.clone());
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();

        api.set_availability(SlotAvailability {
            available: false,
            caregiver_id: "cg-1".into(),
            start_time: start,
            end_time: end,
        });

        let check = client.check_availability("cg-1", start, end).await.unwrap();
        assert!(!check.available);
        assert_eq!(check.caregiver_id, "cg-1");
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_status_and_code() {
        let api = Arc::new(MockApi::new());
        api.fail_next_fetch(ApiError::Response {
            status: 404,
            code: Some("NOT_FOUND".into()),
            message: "Caregiver not found".into(),
        });
        let client = client_with(api.clone());
        let (from, to) = range();

        let err = client.get_slots("cg-9", from, to, 60).await.unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(err.code(), Some("NOT_FOUND"));

        // A failed read must not poison the cache.
        api.set_slots(vec![slot(9, true)]);
        let slots = client.get_slots("cg-9", from, to, 60).await.unwrap();
        assert_eq!(slots.len(), 1);
    }
}
