use hyper::StatusCode;
use thiserror::Error;

/// Result type alias for userplane gateway operations
pub type Result<T, E = UserplaneError> = std::result::Result<T, E>;

/// Errors raised by the gateway itself rather than by a single request
#[derive(Error, Debug)]
pub enum UserplaneError {
    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one userplane request.
///
/// Every request ends in exactly one outcome. Failures are produced by the
/// dispatcher and the handlers and turned into a response by [`classify`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    #[error("operation successful")]
    Ok,
    #[error("no handler registered for path")]
    DispatchNoTarget,
    #[error("unsupported method or content type")]
    DispatchNoType,
    #[error("request body is not valid JSON")]
    ParsingJsonBody,
    #[error("invalid request parameter")]
    InvalidParameter,
    #[error("request field has the wrong type")]
    InvalidType,
    #[error("invalid action")]
    InvalidAction,
    #[error("backend data does not match the expected schema")]
    InvalidDataSchema,
    #[error("invalid userplane function or properties")]
    InvalidUserplaneFunction,
    #[error("backend refused to add the userplane")]
    AddedUserplane,
    #[error("userplane not found")]
    UserplaneNotFound,
    #[error("could not reach the EPC control plane")]
    ConnectEpcError,
    #[error("internal software error")]
    InternalSoftwareError,
}

/// Status line and diagnostic string for one outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: StatusCode,
    pub reason: &'static str,
    pub result: &'static str,
}

impl Classification {
    const fn new(status: StatusCode, reason: &'static str, result: &'static str) -> Self {
        Self {
            status,
            reason,
            result,
        }
    }
}

const UNKNOWN_ERROR: Classification = Classification::new(
    StatusCode::INTERNAL_SERVER_ERROR,
    "Internal Server Error",
    "UnknownError",
);

const CLASSIFICATIONS: &[(Outcome, Classification)] = &[
    (
        Outcome::Ok,
        Classification::new(StatusCode::OK, "OK. Operation Successful", "OK"),
    ),
    (
        Outcome::AddedUserplane,
        Classification::new(StatusCode::CREATED, "Added Userplane", "ADDED_USERPLANE"),
    ),
    (
        Outcome::InvalidType,
        Classification::new(StatusCode::BAD_REQUEST, "Bad Request", "ParameterInvalid"),
    ),
    (
        Outcome::InvalidParameter,
        Classification::new(StatusCode::BAD_REQUEST, "Bad Request", "ParameterInvalid"),
    ),
    (
        Outcome::InvalidUserplaneFunction,
        Classification::new(
            StatusCode::BAD_REQUEST,
            "Invalid userplane properties provided",
            "INVALID_UERPLANE_PROPERTISE",
        ),
    ),
    (
        Outcome::InvalidDataSchema,
        Classification::new(
            StatusCode::NOT_FOUND,
            "Userplane not found",
            "USERPLANE_NOT_FOUND",
        ),
    ),
    (
        Outcome::UserplaneNotFound,
        Classification::new(
            StatusCode::NOT_FOUND,
            "Userplane not found",
            "USERPLANE_NOT_FOUND",
        ),
    ),
    (
        Outcome::InternalSoftwareError,
        Classification::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Software Error",
            "INTERNAL_SOFTWARE_ERROR",
        ),
    ),
    (
        Outcome::ConnectEpcError,
        Classification::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "EPC CP Connect Error",
            "EPC CP Connect failure",
        ),
    ),
    (
        Outcome::DispatchNoTarget,
        Classification::new(StatusCode::NOT_FOUND, "Not Found", "404 not found"),
    ),
    (
        Outcome::DispatchNoType,
        Classification::new(StatusCode::BAD_REQUEST, "Bad Request", "BadRequest"),
    ),
    (
        Outcome::ParsingJsonBody,
        Classification::new(StatusCode::BAD_REQUEST, "Bad Request", "BadRequest"),
    ),
];

/// Maps an outcome to its status line and result string.
///
/// Outcomes without an entry in the table fall back to a generic
/// `500 Internal Server Error` with result `UnknownError`.
pub fn classify(outcome: Outcome) -> Classification {
    CLASSIFICATIONS
        .iter()
        .find(|(code, _)| *code == outcome)
        .map(|(_, classification)| *classification)
        .unwrap_or(UNKNOWN_ERROR)
}
