//! This module holds the handler of pairplay

use std::fmt::{Display, Formatter};

use actix_toolbox::tb_middleware::actix_session::{SessionGetError, SessionInsertError};
use actix_web::body::BoxBody;
use actix_web::error::JsonPayloadError;
use actix_web::HttpResponse;
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_repr::Serialize_repr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub use crate::server::handler::auth::*;
pub use crate::server::handler::games::*;
pub use crate::server::handler::health::*;
pub use crate::server::handler::partners::*;
pub use crate::server::handler::plays::*;
use crate::rules::RulesError;

pub mod auth;
pub mod games;
pub mod health;
pub mod partners;
pub mod plays;

/// The result that is used throughout the complete api.
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize_repr, ToSchema)]
#[repr(u16)]
pub(crate) enum ApiStatusCode {
    Unauthenticated = 1000,
    LoginFailed = 1001,
    TooManyCodeRequests = 1002,
    InvalidEmail = 1003,
    InvalidDisplayName = 1004,
    NotFound = 1005,
    NoPartner = 1006,
    AlreadyPartnered = 1007,
    RequestAlreadyPending = 1008,
    SelfRequest = 1009,
    RequestNotPending = 1010,
    RequestExpired = 1011,
    MissingPrivileges = 1012,
    InvalidDigits = 1013,
    SecretAlreadySet = 1014,
    NotYourTurn = 1015,
    WrongPhase = 1016,
    PlayModified = 1017,
    InvalidJson = 1018,

    InternalServerError = 2000,
    DatabaseError = 2001,
    SessionError = 2002,
}

#[derive(Serialize, ToSchema)]
pub(crate) struct ApiErrorResponse {
    #[schema(example = "Error message is here")]
    message: String,
    #[schema(example = 1000)]
    status_code: ApiStatusCode,
}

impl ApiErrorResponse {
    pub(crate) fn new(status_code: ApiStatusCode, message: String) -> Self {
        Self {
            message,
            status_code,
        }
    }
}

/// This enum holds all possible error types that can occur in the API
#[derive(Debug)]
pub enum ApiError {
    /// The user is not allowed to access the resource
    Unauthenticated,
    /// The submitted login code is unknown, used up or expired
    LoginFailed,
    /// Too many login codes were requested for the address recently
    TooManyCodeRequests,
    /// The submitted email address is not usable
    InvalidEmail,
    /// The submitted display name is empty or too long
    InvalidDisplayName,
    /// The requested resource does not exist
    NotFound,
    /// The action needs a partnership, but the user has none
    NoPartner,
    /// One of the involved users is already in a partnership
    AlreadyPartnered,
    /// There already is a pending request between the involved users
    RequestAlreadyPending,
    /// The user directed a request at themselves
    SelfRequest,
    /// The request was already responded to or retracted
    RequestNotPending,
    /// The request's deadline has passed
    RequestExpired,
    /// The user is no participant of the addressed resource
    MissingPrivileges,
    /// The rules engine rejected the action
    Rules(RulesError),
    /// The play was modified concurrently, the client should retry
    PlayModified,
    /// The json in the request is invalid
    InvalidJson(JsonPayloadError),

    /// Unspecified internal error
    InternalServerError,
    /// All errors that are thrown by the database
    DatabaseError(rorm::Error),
    /// An error occurred while retrieving data from the session
    SessionGet(SessionGetError),
    /// An error occurred while writing data to the session
    SessionInsert(SessionInsertError),
    /// The session is in an invalid state
    SessionCorrupt,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthenticated => write!(f, "Unauthenticated"),
            ApiError::LoginFailed => write!(f, "The login code is invalid or expired"),
            ApiError::TooManyCodeRequests => {
                write!(f, "Too many login codes requested, try again later")
            }
            ApiError::InvalidEmail => write!(f, "The email address is invalid"),
            ApiError::InvalidDisplayName => write!(f, "The display name is invalid"),
            ApiError::NotFound => write!(f, "The requested resource does not exist"),
            ApiError::NoPartner => write!(f, "You don't have a partner yet"),
            ApiError::AlreadyPartnered => write!(f, "A partnership already exists"),
            ApiError::RequestAlreadyPending => write!(f, "There already is a pending request"),
            ApiError::SelfRequest => write!(f, "You can not send a request to yourself"),
            ApiError::RequestNotPending => write!(f, "The request is not pending anymore"),
            ApiError::RequestExpired => write!(f, "The request has expired"),
            ApiError::MissingPrivileges => write!(f, "You are not allowed to access this resource"),
            ApiError::Rules(err) => write!(f, "{err}"),
            ApiError::PlayModified => {
                write!(f, "The play was changed in the meantime, please retry")
            }
            ApiError::InvalidJson(_) => write!(f, "The request contains invalid json"),
            ApiError::InternalServerError => write!(f, "Internal server error"),
            ApiError::DatabaseError(_) => write!(f, "Database error occurred"),
            ApiError::SessionGet(_) | ApiError::SessionInsert(_) | ApiError::SessionCorrupt => {
                write!(f, "Session error occurred")
            }
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            ApiError::Unauthenticated => {
                trace!("Unauthenticated");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::Unauthenticated,
                    self.to_string(),
                ))
            }
            ApiError::LoginFailed => {
                debug!("Login request failed");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::LoginFailed,
                    self.to_string(),
                ))
            }
            ApiError::TooManyCodeRequests => {
                debug!("Code request was rate limited");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::TooManyCodeRequests,
                    self.to_string(),
                ))
            }
            ApiError::InvalidEmail => {
                trace!("Invalid email");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::InvalidEmail,
                    self.to_string(),
                ))
            }
            ApiError::InvalidDisplayName => {
                trace!("Invalid display name");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::InvalidDisplayName,
                    self.to_string(),
                ))
            }
            ApiError::NotFound => {
                trace!("Resource not found");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::NotFound,
                    self.to_string(),
                ))
            }
            ApiError::NoPartner => {
                trace!("No partnership");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::NoPartner,
                    self.to_string(),
                ))
            }
            ApiError::AlreadyPartnered => {
                debug!("Partnership already exists");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::AlreadyPartnered,
                    self.to_string(),
                ))
            }
            ApiError::RequestAlreadyPending => {
                debug!("Request already pending");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::RequestAlreadyPending,
                    self.to_string(),
                ))
            }
            ApiError::SelfRequest => {
                trace!("Self request");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::SelfRequest,
                    self.to_string(),
                ))
            }
            ApiError::RequestNotPending => {
                debug!("Request not pending anymore");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::RequestNotPending,
                    self.to_string(),
                ))
            }
            ApiError::RequestExpired => {
                debug!("Request expired");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::RequestExpired,
                    self.to_string(),
                ))
            }
            ApiError::MissingPrivileges => {
                debug!("Missing privileges");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::MissingPrivileges,
                    self.to_string(),
                ))
            }
            ApiError::Rules(err) => {
                debug!("Rules engine rejected an action: {err}");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    match err {
                        RulesError::InvalidDigits(_) => ApiStatusCode::InvalidDigits,
                        RulesError::SecretAlreadySet => ApiStatusCode::SecretAlreadySet,
                        RulesError::NotYourTurn => ApiStatusCode::NotYourTurn,
                        RulesError::WrongPhase | RulesError::OpponentSecretMissing => {
                            ApiStatusCode::WrongPhase
                        }
                    },
                    self.to_string(),
                ))
            }
            ApiError::PlayModified => {
                debug!("Concurrent play modification");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::PlayModified,
                    self.to_string(),
                ))
            }
            ApiError::InvalidJson(err) => {
                debug!("Received invalid json: {err}");

                HttpResponse::BadRequest().json(ApiErrorResponse::new(
                    ApiStatusCode::InvalidJson,
                    self.to_string(),
                ))
            }
            ApiError::InternalServerError => {
                warn!("Internal server error");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::InternalServerError,
                    self.to_string(),
                ))
            }
            ApiError::DatabaseError(err) => {
                error!("Database error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::DatabaseError,
                    self.to_string(),
                ))
            }
            ApiError::SessionGet(err) => {
                error!("Session get error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
            ApiError::SessionInsert(err) => {
                error!("Session insert error: {err}");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
            ApiError::SessionCorrupt => {
                info!("Corrupt session");

                HttpResponse::InternalServerError().json(ApiErrorResponse::new(
                    ApiStatusCode::SessionError,
                    self.to_string(),
                ))
            }
        }
    }
}

impl From<rorm::Error> for ApiError {
    fn from(value: rorm::Error) -> Self {
        Self::DatabaseError(value)
    }
}

impl From<SessionGetError> for ApiError {
    fn from(value: SessionGetError) -> Self {
        Self::SessionGet(value)
    }
}

impl From<SessionInsertError> for ApiError {
    fn from(value: SessionInsertError) -> Self {
        Self::SessionInsert(value)
    }
}

impl From<RulesError> for ApiError {
    fn from(value: RulesError) -> Self {
        Self::Rules(value)
    }
}

/// A path with an uuid
#[derive(Deserialize, IntoParams)]
pub struct PathUuid {
    pub(crate) uuid: Uuid,
}
