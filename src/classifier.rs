// Maps a failed booking request (HTTP status + optional server code and
// message) onto a closed set of error kinds with a user-facing message.
// Pure function over an ordered rule table; first match wins.

use crate::api::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingErrorKind {
    SlotAlreadyBooked,
    InvalidTime,
    CaregiverUnavailable,
    NetworkFailure,
    SessionExpired,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub kind: BookingErrorKind,
    pub message: String,
}

pub mod messages {
    pub const SLOT_ALREADY_BOOKED: &str =
        "This time slot was just booked by someone else. Please choose another time or caregiver.";
    pub const PAST_SLOT: &str =
        "You cannot book a slot in the past. Please choose a future time.";
    pub const INVALID_TIME: &str =
        "Invalid time range. Please use a valid start time and duration.";
    pub const CAREGIVER_UNAVAILABLE: &str =
        "This caregiver is not available right now. Please choose another caregiver.";
    pub const SESSION_EXPIRED: &str = "Your session has expired. Please log in again.";
    pub const NETWORK_FAILURE: &str =
        "Network error. Please check your connection and try again.";
    pub const UNKNOWN: &str = "Something went wrong. Please try again.";
}

fn message_contains_any(message: &str, patterns: &[&str]) -> bool {
    let lower = message.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

fn code_is(code: Option<&str>, expected: &str) -> bool {
    code.map_or(false, |c| c.eq_ignore_ascii_case(expected))
}

struct Rule {
    kind: BookingErrorKind,
    applies: fn(u16, Option<&str>, &str) -> bool,
    message: fn(&str) -> String,
}

// Ordering is load-bearing: a message matching both the conflict patterns
// and a later rule's patterns must classify as conflict, and the catch-all
// must stay last.
static RULES: &[Rule] = &[
    Rule {
        kind: BookingErrorKind::SlotAlreadyBooked,
        applies: |status, code, message| {
            status == 409
                || code_is(code, "CONFLICT")
                || message_contains_any(
                    message,
                    &["already booked", "slot_already_booked", "conflict"],
                )
        },
        message: |_| messages::SLOT_ALREADY_BOOKED.to_string(),
    },
    Rule {
        kind: BookingErrorKind::InvalidTime,
        applies: |status, code, message| {
            status == 422
                || code_is(code, "VALIDATION_ERROR")
                || message_contains_any(message, &["invalid", "validation", "past"])
        },
        message: |message| {
            if message_contains_any(message, &["past"]) {
                messages::PAST_SLOT.to_string()
            } else {
                messages::INVALID_TIME.to_string()
            }
        },
    },
    Rule {
        kind: BookingErrorKind::CaregiverUnavailable,
        applies: |status, code, message| {
            status == 404
                || code_is(code, "NOT_FOUND")
                || message_contains_any(message, &["not found", "not available", "inactive"])
        },
        message: |_| messages::CAREGIVER_UNAVAILABLE.to_string(),
    },
    Rule {
        kind: BookingErrorKind::SessionExpired,
        applies: |status, code, message| {
            status == 401
                || code_is(code, "AUTH_ERROR")
                || message_contains_any(
                    message,
                    &["unauthorized", "session", "token", "authentication"],
                )
        },
        message: |_| messages::SESSION_EXPIRED.to_string(),
    },
    Rule {
        kind: BookingErrorKind::NetworkFailure,
        applies: |status, _, message| {
            status == 0
                || message_contains_any(
                    message,
                    &["network", "failed to fetch", "timeout", "connection"],
                )
        },
        message: |_| messages::NETWORK_FAILURE.to_string(),
    },
    Rule {
        kind: BookingErrorKind::Unknown,
        applies: |_, _, _| true,
        message: |message| {
            if message.is_empty() {
                messages::UNKNOWN.to_string()
            } else {
                // The one place raw server text reaches the user.
                message.to_string()
            }
        },
    },
];

pub fn classify(status: u16, code: Option<&str>, message: Option<&str>) -> ClassifiedError {
    let message = message.unwrap_or("");
    for rule in RULES {
        if (rule.applies)(status, code, message) {
            return ClassifiedError {
                kind: rule.kind,
                message: (rule.message)(message),
            };
        }
    }
    // The catch-all rule always applies.
    unreachable!("classifier rule table has no catch-all")
}

pub fn classify_api_error(error: &ApiError) -> ClassifiedError {
    classify(error.status(), error.code(), Some(error.message()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_by_status() {
        let c = classify(409, None, Some("duplicate key"));
        assert_eq!(c.kind, BookingErrorKind::SlotAlreadyBooked);
        assert_eq!(c.message, messages::SLOT_ALREADY_BOOKED);
    }

    #[test]
    fn test_conflict_by_code_and_message() {
        assert_eq!(
            classify(500, Some("CONFLICT"), None).kind,
            BookingErrorKind::SlotAlreadyBooked
        );
        assert_eq!(
            classify(500, None, Some("Slot already booked by another user")).kind,
            BookingErrorKind::SlotAlreadyBooked
        );
    }

    #[test]
    fn test_conflict_wins_over_later_rules() {
        // "conflict" and "invalid" both match; rule order decides.
        let c = classify(500, None, Some("Conflict: invalid overlapping booking"));
        assert_eq!(c.kind, BookingErrorKind::SlotAlreadyBooked);
    }

    #[test]
    fn test_invalid_time_past_message() {
        let c = classify(
            422,
            None,
            Some("You cannot book a slot in the past. Please choose a future time."),
        );
        assert_eq!(c.kind, BookingErrorKind::InvalidTime);
        assert_eq!(c.message, messages::PAST_SLOT);
    }

    #[test]
    fn test_invalid_time_generic_message() {
        let c = classify(422, None, Some("duration_hours must be positive"));
        assert_eq!(c.kind, BookingErrorKind::InvalidTime);
        assert_eq!(c.message, messages::INVALID_TIME);
    }

    #[test]
    fn test_caregiver_unavailable() {
        assert_eq!(
            classify(404, None, None).kind,
            BookingErrorKind::CaregiverUnavailable
        );
        assert_eq!(
            classify(400, None, Some("Caregiver is inactive")).kind,
            BookingErrorKind::CaregiverUnavailable
        );
    }

    #[test]
    fn test_session_expired() {
        let c = classify(401, None, None);
        assert_eq!(c.kind, BookingErrorKind::SessionExpired);
        assert_eq!(c.message, messages::SESSION_EXPIRED);
    }

    #[test]
    fn test_network_failure() {
        let c = classify(0, None, Some("Failed to fetch"));
        assert_eq!(c.kind, BookingErrorKind::NetworkFailure);
        assert_eq!(c.message, messages::NETWORK_FAILURE);
    }

    #[test]
    fn test_unknown_uses_server_message_verbatim() {
        let c = classify(500, None, Some("RPC book_slot_atomic crashed"));
        assert_eq!(c.kind, BookingErrorKind::Unknown);
        assert_eq!(c.message, "RPC book_slot_atomic crashed");
    }

    #[test]
    fn test_unknown_falls_back_to_generic() {
        let c = classify(500, None, None);
        assert_eq!(c.kind, BookingErrorKind::Unknown);
        assert_eq!(c.message, messages::UNKNOWN);
    }
}
