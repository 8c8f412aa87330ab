// Client-side core for the AssistLink caregiver coordination app:
// cached slot reads, booking submission, failure classification, and the
// always-valid emergency payload.

pub mod api;
pub mod booking;
pub mod cache;
pub mod classifier;
pub mod emergency;
pub mod selection;
pub mod slots;

// Re-export key types for convenience
pub use api::{ApiConfig, ApiError, BookingApi, BookingRecord, BookingRequest, HttpApi, Slot, SlotAvailability};
pub use booking::{BookingOutcome, BookingPipeline, BookingState};
pub use cache::{cache_key, CacheStats, CacheStore, KeyValueStorage, MemoryStorage, StorageError};
pub use classifier::{classify, BookingErrorKind, ClassifiedError};
pub use emergency::{build_emergency_payload, send_emergency_alert, EmergencyLocation, PartialLocation};
pub use selection::SlotPicker;
pub use slots::{SlotAvailabilityClient, DEFAULT_SLOT_DURATION_MINUTES};
