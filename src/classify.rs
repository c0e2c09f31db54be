//! Error classification for UI rendering
//!
//! Turns a failure — from the retry driver, a direct HTTP call, or local
//! validation — into a [`ClassifiedError`] tuple of message, kind, recovery
//! action, and severity, tailored to the calling context. Toast and alert
//! code renders the message and maps the action to a concrete behavior
//! (navigate to login, refetch, reset the breaker) without re-deriving
//! HTTP-status logic per component.
//!
//! Classification is a pure pattern match: deterministic, side-effect-free,
//! no I/O.
//!
//! The 400/422 refinement rules sniff substrings of the server's detail text
//! ("slot", "payment", ...). That wording coupling is inherited from the
//! backend's ad hoc error messages and is deliberately confined to the
//! [`DetailRule`] tables below, so a structured error code can replace it
//! without touching call sites.

use serde::{Deserialize, Serialize};

use crate::error::{ApiFailure, RetryError, TransportCode};

/// User-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthError,
    PermissionError,
    ValidationError,
    NotFound,
    ConflictError,
    ServerError,
    NetworkError,
    TimeoutError,
    CircuitBreaker,
    RetryFailed,
    SlotUnavailable,
    PaymentError,
    SpecialistUnavailable,
    DuplicateAction,
    UnknownError,
}

/// Symbolic recovery hint the UI maps to a concrete behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Login,
    Retry,
    RetryLater,
    RefreshSlots,
    SelectOther,
    FixForm,
    WaitRetry,
    Refresh,
    ContactSupport,
    CheckConnection,
    AdjustSearch,
    SelectDate,
    RefreshList,
    ViewDetails,
    RetryPayment,
}

/// How loudly the UI should surface the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Display-ready classification of one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    /// Human-readable message for the user.
    pub message: String,
    /// Failure category.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Suggested recovery affordance.
    pub action: RecoveryAction,
    pub severity: Severity,
}

/// Which rule set to classify under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyContext {
    /// Booking a new appointment.
    Booking,
    /// Searching the specialist directory.
    SpecialistSearch,
    /// Fetching slot availability.
    SlotAvailability,
    /// Cancelling, rescheduling, or completing an appointment.
    AppointmentManagement,
    /// Administrative CRUD over a named resource kind ("specialist",
    /// "category", ...). The resource name is spliced into messages.
    Admin { resource: String },
    /// Forum posts and replies.
    Forum,
}

/// One substring-refinement rule applied to the server's detail text on
/// validation-shaped (400/422) responses.
struct DetailRule {
    needles: &'static [&'static str],
    kind: ErrorKind,
    action: RecoveryAction,
    severity: Severity,
    message: &'static str,
}

impl DetailRule {
    fn matches(&self, detail_lower: &str) -> bool {
        self.needles.iter().any(|needle| detail_lower.contains(needle))
    }

    fn classified(&self) -> ClassifiedError {
        ClassifiedError {
            message: self.message.to_string(),
            kind: self.kind,
            action: self.action,
            severity: self.severity,
        }
    }
}

const BOOKING_DETAIL_RULES: &[DetailRule] = &[
    DetailRule {
        needles: &["slot", "time"],
        kind: ErrorKind::SlotUnavailable,
        action: RecoveryAction::RefreshSlots,
        severity: Severity::Warning,
        message: "That time slot is no longer available. Please refresh and pick another slot.",
    },
    DetailRule {
        needles: &["payment", "method"],
        kind: ErrorKind::PaymentError,
        action: RecoveryAction::RetryPayment,
        severity: Severity::Error,
        message: "Your payment could not be processed. Please check your payment method and try again.",
    },
    DetailRule {
        needles: &["specialist", "doctor"],
        kind: ErrorKind::SpecialistUnavailable,
        action: RecoveryAction::SelectOther,
        severity: Severity::Warning,
        message: "This specialist is not available for booking right now. Please choose another specialist.",
    },
    DetailRule {
        needles: &["already", "duplicate"],
        kind: ErrorKind::DuplicateAction,
        action: RecoveryAction::RefreshList,
        severity: Severity::Info,
        message: "You already have this appointment. Refresh your appointment list to see it.",
    },
];

const SLOT_DETAIL_RULES: &[DetailRule] = &[DetailRule {
    needles: &["slot", "time"],
    kind: ErrorKind::SlotUnavailable,
    action: RecoveryAction::RefreshSlots,
    severity: Severity::Warning,
    message: "Slot availability changed. Please refresh the slots.",
}];

const APPOINTMENT_DETAIL_RULES: &[DetailRule] = &[DetailRule {
    needles: &["already", "duplicate"],
    kind: ErrorKind::DuplicateAction,
    action: RecoveryAction::ViewDetails,
    severity: Severity::Info,
    message: "This appointment was already updated. View its details for the current status.",
}];

/// Detail-refinement table for a context. Contexts without ad hoc backend
/// wording get no refinement and fall back to plain validation errors.
fn detail_rules(context: &ClassifyContext) -> &'static [DetailRule] {
    match context {
        ClassifyContext::Booking => BOOKING_DETAIL_RULES,
        ClassifyContext::SlotAvailability => SLOT_DETAIL_RULES,
        ClassifyContext::AppointmentManagement => APPOINTMENT_DETAIL_RULES,
        _ => &[],
    }
}

/// Classify a failure for the given context.
///
/// Tolerates `None` (classified as unknown). Deterministic: equal inputs
/// produce equal outputs.
pub fn classify(error: Option<&RetryError>, context: &ClassifyContext) -> ClassifiedError {
    let Some(error) = error else {
        return unknown();
    };

    match error {
        RetryError::CircuitOpen { retry_after, .. } => ClassifiedError {
            message: format!(
                "This service is temporarily paused after repeated errors. Please try again in about {} seconds.",
                retry_after.as_secs().max(1)
            ),
            kind: ErrorKind::CircuitBreaker,
            action: RecoveryAction::WaitRetry,
            severity: Severity::Warning,
        },
        RetryError::Rejected { source } => classify_failure(source, context),
        RetryError::Exhausted { source, .. } => match source {
            // An exhausted HTTP failure keeps its own category; the wrapper
            // only marks exhaustion when there is nothing richer to show.
            ApiFailure::Response { .. } => classify_failure(source, context),
            _ => ClassifiedError {
                message: "We couldn't reach the server after several attempts. Check your connection and refresh the page.".to_string(),
                kind: ErrorKind::RetryFailed,
                action: RecoveryAction::Refresh,
                severity: Severity::Error,
            },
        },
    }
}

fn classify_failure(failure: &ApiFailure, context: &ClassifyContext) -> ClassifiedError {
    match failure {
        ApiFailure::Response {
            status,
            detail,
            message,
        } => classify_response(*status, detail.as_deref().unwrap_or(message), context),
        ApiFailure::Transport { code, message } => classify_transport(*code, message),
        ApiFailure::Local(message) => classify_transport(None, message),
    }
}

fn classify_response(status: u16, detail: &str, context: &ClassifyContext) -> ClassifiedError {
    match status {
        401 => ClassifiedError {
            message: "Your session has expired. Please log in again.".to_string(),
            kind: ErrorKind::AuthError,
            action: RecoveryAction::Login,
            severity: Severity::Error,
        },
        403 => ClassifiedError {
            message: "You don't have permission to do this. Contact support if this seems wrong."
                .to_string(),
            kind: ErrorKind::PermissionError,
            action: RecoveryAction::ContactSupport,
            severity: Severity::Error,
        },
        400 | 422 => classify_validation(detail, context),
        404 => classify_not_found(context),
        408 => ClassifiedError {
            message: "The request took too long. Please try again.".to_string(),
            kind: ErrorKind::TimeoutError,
            action: RecoveryAction::Retry,
            severity: Severity::Warning,
        },
        409 => classify_conflict(context),
        429 => ClassifiedError {
            message: "You're doing that too often. Please wait a moment and try again."
                .to_string(),
            kind: ErrorKind::ServerError,
            action: RecoveryAction::RetryLater,
            severity: Severity::Warning,
        },
        500.. => ClassifiedError {
            message: "Something went wrong on our end. Please try again later.".to_string(),
            kind: ErrorKind::ServerError,
            action: RecoveryAction::RetryLater,
            severity: Severity::Error,
        },
        _ => unknown(),
    }
}

fn classify_validation(detail: &str, context: &ClassifyContext) -> ClassifiedError {
    let detail_lower = detail.to_lowercase();
    if let Some(rule) = detail_rules(context)
        .iter()
        .find(|rule| rule.matches(&detail_lower))
    {
        return rule.classified();
    }

    let message = match context {
        ClassifyContext::Booking => "Some booking details are invalid. Please review the form.",
        ClassifyContext::Forum => "Your post could not be submitted. Please review its content.",
        ClassifyContext::Admin { .. } => "Some fields are invalid. Please review the form.",
        _ => "Some of the information provided is invalid. Please review the form.",
    };
    ClassifiedError {
        message: message.to_string(),
        kind: ErrorKind::ValidationError,
        action: RecoveryAction::FixForm,
        severity: Severity::Warning,
    }
}

fn classify_not_found(context: &ClassifyContext) -> ClassifiedError {
    let (message, action, severity) = match context {
        ClassifyContext::Booking => (
            "The specialist or slot you selected could not be found. Please choose another.".to_string(),
            RecoveryAction::SelectOther,
            Severity::Warning,
        ),
        ClassifyContext::SpecialistSearch => (
            "No specialists matched your search. Try adjusting the filters.".to_string(),
            RecoveryAction::AdjustSearch,
            Severity::Info,
        ),
        ClassifyContext::SlotAvailability => (
            "No slots are available for the selected date. Try another date.".to_string(),
            RecoveryAction::SelectDate,
            Severity::Info,
        ),
        ClassifyContext::AppointmentManagement => (
            "This appointment could not be found. It may have been cancelled. Refresh the list.".to_string(),
            RecoveryAction::RefreshList,
            Severity::Warning,
        ),
        ClassifyContext::Admin { resource } => (
            format!("The {resource} could not be found. Refresh the list and try again."),
            RecoveryAction::RefreshList,
            Severity::Warning,
        ),
        ClassifyContext::Forum => (
            "This post is no longer available. Refresh the forum.".to_string(),
            RecoveryAction::Refresh,
            Severity::Warning,
        ),
    };
    ClassifiedError {
        message,
        kind: ErrorKind::NotFound,
        action,
        severity,
    }
}

fn classify_conflict(context: &ClassifyContext) -> ClassifiedError {
    match context {
        ClassifyContext::Booking => ClassifiedError {
            message: "This slot was just taken by someone else. Please select another slot."
                .to_string(),
            kind: ErrorKind::ConflictError,
            action: RecoveryAction::SelectOther,
            severity: Severity::Warning,
        },
        ClassifyContext::AppointmentManagement => ClassifiedError {
            message: "This appointment was already updated. View its details for the current status.".to_string(),
            kind: ErrorKind::DuplicateAction,
            action: RecoveryAction::ViewDetails,
            severity: Severity::Info,
        },
        _ => ClassifiedError {
            message: "This item changed while you were working. Refresh and try again."
                .to_string(),
            kind: ErrorKind::ConflictError,
            action: RecoveryAction::Refresh,
            severity: Severity::Warning,
        },
    }
}

fn classify_transport(code: Option<TransportCode>, message: &str) -> ClassifiedError {
    let timed_out =
        matches!(code, Some(TransportCode::Timeout)) || message.to_lowercase().contains("timeout");
    if timed_out {
        ClassifiedError {
            message: "The request timed out. Please try again.".to_string(),
            kind: ErrorKind::TimeoutError,
            action: RecoveryAction::Retry,
            severity: Severity::Warning,
        }
    } else {
        ClassifiedError {
            message: "We couldn't reach the server. Please check your internet connection."
                .to_string(),
            kind: ErrorKind::NetworkError,
            action: RecoveryAction::CheckConnection,
            severity: Severity::Error,
        }
    }
}

fn unknown() -> ClassifiedError {
    ClassifiedError {
        message: "Something unexpected went wrong. Please try again.".to_string(),
        kind: ErrorKind::UnknownError,
        action: RecoveryAction::Retry,
        severity: Severity::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn response(status: u16, detail: &str) -> RetryError {
        ApiFailure::response(status, detail.to_string(), "request failed").into()
    }

    #[test]
    fn auth_error_in_every_context() {
        let contexts = [
            ClassifyContext::Booking,
            ClassifyContext::SpecialistSearch,
            ClassifyContext::SlotAvailability,
            ClassifyContext::AppointmentManagement,
            ClassifyContext::Admin {
                resource: "specialist".to_string(),
            },
            ClassifyContext::Forum,
        ];
        for context in &contexts {
            let classified = classify(Some(&response(401, "unauthorized")), context);
            assert_eq!(classified.kind, ErrorKind::AuthError);
            assert_eq!(classified.action, RecoveryAction::Login);
            assert_eq!(classified.severity, Severity::Error);
        }
    }

    #[test]
    fn slot_detail_upgrades_validation_in_booking() {
        let classified = classify(
            Some(&response(400, "No slot available for this time")),
            &ClassifyContext::Booking,
        );
        assert_eq!(classified.kind, ErrorKind::SlotUnavailable);
        assert_eq!(classified.action, RecoveryAction::RefreshSlots);
        assert_eq!(classified.severity, Severity::Warning);
    }

    #[test]
    fn payment_specialist_and_duplicate_details() {
        let payment = classify(
            Some(&response(422, "Invalid payment method on file")),
            &ClassifyContext::Booking,
        );
        assert_eq!(payment.kind, ErrorKind::PaymentError);
        assert_eq!(payment.action, RecoveryAction::RetryPayment);
        assert_eq!(payment.severity, Severity::Error);

        let specialist = classify(
            Some(&response(400, "Doctor is not accepting appointments")),
            &ClassifyContext::Booking,
        );
        assert_eq!(specialist.kind, ErrorKind::SpecialistUnavailable);
        assert_eq!(specialist.action, RecoveryAction::SelectOther);

        let duplicate = classify(
            Some(&response(400, "You already booked this appointment")),
            &ClassifyContext::Booking,
        );
        assert_eq!(duplicate.kind, ErrorKind::DuplicateAction);
        assert_eq!(duplicate.action, RecoveryAction::RefreshList);
        assert_eq!(duplicate.severity, Severity::Info);
    }

    #[test]
    fn validation_without_known_detail_stays_generic() {
        let classified = classify(
            Some(&response(422, "field 'notes' too long")),
            &ClassifyContext::Booking,
        );
        assert_eq!(classified.kind, ErrorKind::ValidationError);
        assert_eq!(classified.action, RecoveryAction::FixForm);
    }

    #[test]
    fn detail_rules_do_not_leak_across_contexts() {
        // "payment" wording is only refined where the backend emits it.
        let classified = classify(
            Some(&response(400, "payment required")),
            &ClassifyContext::Forum,
        );
        assert_eq!(classified.kind, ErrorKind::ValidationError);
    }

    #[test]
    fn not_found_action_varies_by_context() {
        let search = classify(Some(&response(404, "")), &ClassifyContext::SpecialistSearch);
        assert_eq!(search.kind, ErrorKind::NotFound);
        assert_eq!(search.action, RecoveryAction::AdjustSearch);
        assert_eq!(search.severity, Severity::Info);

        let slots = classify(Some(&response(404, "")), &ClassifyContext::SlotAvailability);
        assert_eq!(slots.action, RecoveryAction::SelectDate);

        let admin = classify(
            Some(&response(404, "")),
            &ClassifyContext::Admin {
                resource: "category".to_string(),
            },
        );
        assert_eq!(admin.action, RecoveryAction::RefreshList);
        assert!(admin.message.contains("category"));
    }

    #[test]
    fn booking_conflict_suggests_another_slot() {
        let classified = classify(Some(&response(409, "slot taken")), &ClassifyContext::Booking);
        assert_eq!(classified.kind, ErrorKind::ConflictError);
        assert_eq!(classified.action, RecoveryAction::SelectOther);
        assert_eq!(classified.severity, Severity::Warning);
    }

    #[test]
    fn server_errors_say_retry_later() {
        for status in [500, 502, 503, 504] {
            let classified = classify(Some(&response(status, "")), &ClassifyContext::Forum);
            assert_eq!(classified.kind, ErrorKind::ServerError);
            assert_eq!(classified.action, RecoveryAction::RetryLater);
            assert_eq!(classified.severity, Severity::Error);
        }
    }

    #[tokio::test]
    async fn circuit_open_says_how_long_to_wait() {
        let error = RetryError::CircuitOpen {
            service: "appointments".to_string(),
            next_attempt_time: Instant::now() + Duration::from_secs(25),
            retry_after: Duration::from_secs(25),
        };
        let classified = classify(Some(&error), &ClassifyContext::Booking);
        assert_eq!(classified.kind, ErrorKind::CircuitBreaker);
        assert_eq!(classified.action, RecoveryAction::WaitRetry);
        assert_eq!(classified.severity, Severity::Warning);
        assert!(classified.message.contains("25 seconds"));
    }

    #[test]
    fn exhausted_http_failure_keeps_its_category() {
        let error = RetryError::Exhausted {
            attempts: 3,
            source: ApiFailure::response(500, None, "internal error"),
        };
        let classified = classify(Some(&error), &ClassifyContext::Booking);
        assert_eq!(classified.kind, ErrorKind::ServerError);
    }

    #[test]
    fn exhausted_transport_failure_is_retry_failed() {
        let error = RetryError::Exhausted {
            attempts: 3,
            source: ApiFailure::transport(TransportCode::Network, "socket closed"),
        };
        let classified = classify(Some(&error), &ClassifyContext::Booking);
        assert_eq!(classified.kind, ErrorKind::RetryFailed);
        assert_eq!(classified.action, RecoveryAction::Refresh);
        assert_eq!(classified.severity, Severity::Error);
    }

    #[test]
    fn transport_heuristics() {
        let timeout: RetryError =
            ApiFailure::Transport {
                code: None,
                message: "request Timeout after 30s".to_string(),
            }
            .into();
        let classified = classify(Some(&timeout), &ClassifyContext::Forum);
        assert_eq!(classified.kind, ErrorKind::TimeoutError);
        assert_eq!(classified.action, RecoveryAction::Retry);

        let network: RetryError =
            ApiFailure::transport(TransportCode::Network, "dns failure").into();
        let classified = classify(Some(&network), &ClassifyContext::Forum);
        assert_eq!(classified.kind, ErrorKind::NetworkError);
        assert_eq!(classified.action, RecoveryAction::CheckConnection);
        assert_eq!(classified.severity, Severity::Error);
    }

    #[test]
    fn missing_error_is_unknown() {
        let classified = classify(None, &ClassifyContext::Booking);
        assert_eq!(classified.kind, ErrorKind::UnknownError);
        assert_eq!(classified.action, RecoveryAction::Retry);
    }

    #[test]
    fn classification_is_deterministic() {
        let error = response(400, "No slot available for this time");
        let first = classify(Some(&error), &ClassifyContext::Booking);
        let second = classify(Some(&error), &ClassifyContext::Booking);
        assert_eq!(first, second);
    }

    #[test]
    fn serializes_to_snake_case_identifiers() {
        let classified = classify(Some(&response(401, "")), &ClassifyContext::Forum);
        let json = serde_json::to_value(&classified).unwrap();
        assert_eq!(json["type"], "auth_error");
        assert_eq!(json["action"], "login");
        assert_eq!(json["severity"], "error");
    }
}
