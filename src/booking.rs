// Booking submission pipeline. One attempt per book() call: submit, await
// the server's verdict, classify failures. A small state machine is exposed
// to the UI; callers must disable the submit control while `Booking`.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use crate::api::{BookingApi, BookingRecord, BookingRequest};
use crate::classifier::{classify_api_error, ClassifiedError};

#[derive(Debug, Clone, PartialEq)]
pub enum BookingState {
    Idle,
    Booking,
    Succeeded(BookingRecord),
    Failed(ClassifiedError),
}

// Exactly one outcome per submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingOutcome {
    Success(BookingRecord),
    Failure(ClassifiedError),
}

pub struct BookingPipeline {
    api: Arc<dyn BookingApi>,
    state: RwLock<BookingState>,
    // Each book() takes a fresh token; a settling call whose token is no
    // longer current may not touch shared state. Guards against a stale
    // double-submit overwriting a newer result.
    token: AtomicU64,
}

impl BookingPipeline {
    pub fn new(api: Arc<dyn BookingApi>) -> Self {
        Self {
            api,
            state: RwLock::new(BookingState::Idle),
            token: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> BookingState {
        self.state.read().clone()
    }

    pub fn is_booking(&self) -> bool {
        matches!(*self.state.read(), BookingState::Booking)
    }

    // Submits one booking attempt. `Booking` is set before the request is
    // issued and cleared only when it settles, so observers always see the
    // busy state before any result.
    pub async fn book(&self, request: BookingRequest) -> BookingOutcome {
        let token = self.token.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.write() = BookingState::Booking;
        debug!(caregiver_id = %request.caregiver_id, "booking attempt started");

        let outcome = match self.api.book_slot(&request).await {
            Ok(record) => BookingOutcome::Success(record),
            Err(error) => BookingOutcome::Failure(classify_api_error(&error)),
        };

        if self.token.load(Ordering::SeqCst) == token {
            *self.state.write() = match &outcome {
                BookingOutcome::Success(record) => BookingState::Succeeded(record.clone()),
                BookingOutcome::Failure(classified) => BookingState::Failed(classified.clone()),
            };
        } else {
            debug!("stale booking attempt settled, result discarded");
        }
        outcome
    }

    // Failed -> Idle. Explicitly caller-invoked, never automatic.
    pub fn clear_error(&self) {
        let mut state = self.state.write();
        if matches!(*state, BookingState::Failed(_)) {
            *state = BookingState::Idle;
        }
    }

    // Back to Idle from any settled state; also invalidates any attempt
    // still in flight.
    pub fn reset(&self) {
        self.token.fetch_add(1, Ordering::SeqCst);
        *self.state.write() = BookingState::Idle;
    }
}
