use actix_web::{
    http::{header::ContentType, StatusCode},
    HttpResponse,
    ResponseError,
};
use booking_engine::{BookingApiError, ReservationError};
use qpay_tools::QPayApiError;
use thiserror::Error;

use crate::catalog::CatalogApiError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read the request body. {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("Unspecified error. {0}")]
    Unspecified(String),
    #[error("The requested record was not found. {0}")]
    NoRecordFound(String),
    #[error("Caller identity is missing or unreadable. {0}")]
    Unauthenticated(String),
    #[error("Insufficient permissions. {0}")]
    InsufficientPermissions(String),
    #[error("The requested interval is not available for this resource.")]
    ResourceUnavailable,
    #[error("The resource is under maintenance and cannot be booked.")]
    ResourceUnderMaintenance,
    #[error("The request conflicts with the current state of the booking. {0}")]
    InvalidState(String),
    #[error("The payment gateway could not complete the request. {0}")]
    PaymentGatewayError(String),
    #[error("Catalog lookup failed. {0}")]
    CatalogError(#[from] CatalogApiError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            Self::ResourceUnavailable => StatusCode::CONFLICT,
            Self::ResourceUnderMaintenance => StatusCode::CONFLICT,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::CatalogError(CatalogApiError::ResourceNotFound(_)) => StatusCode::NOT_FOUND,
            Self::CatalogError(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<ReservationError> for ServerError {
    fn from(e: ReservationError) -> Self {
        match e {
            ReservationError::ResourceUnavailable => Self::ResourceUnavailable,
            ReservationError::InvalidInterval(s) => Self::InvalidRequestBody(s),
            ReservationError::InvalidBooking(s) => Self::InvalidRequestBody(s),
            ReservationError::BookingNotFound(id) => Self::NoRecordFound(format!("Booking #{id} does not exist.")),
            ReservationError::PaymentNotFound(code) => Self::NoRecordFound(format!("No payment with order code [{code}].")),
            ReservationError::DuplicatePayment(id) => {
                Self::InvalidState(format!("Booking #{id} already has a live payment attempt."))
            },
            ReservationError::BookingModificationNoOp => {
                Self::InvalidState("The booking is already in a terminal state.".to_string())
            },
            ReservationError::PaymentModificationNoOp => {
                Self::InvalidState("The payment has already been finalized.".to_string())
            },
            ReservationError::Forbidden(s) => Self::InsufficientPermissions(s),
            ReservationError::DatabaseError(s) => Self::BackendError(s),
            ReservationError::QueryError(e) => Self::BackendError(e.to_string()),
        }
    }
}

impl From<BookingApiError> for ServerError {
    fn from(e: BookingApiError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<QPayApiError> for ServerError {
    fn from(e: QPayApiError) -> Self {
        Self::PaymentGatewayError(e.to_string())
    }
}
