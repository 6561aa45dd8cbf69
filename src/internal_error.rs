use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;
use rocket_multipart_form_data::MultipartFormDataError;
use serde::Serialize;
use tracing::error;

use std::error::Error;
use std::fmt;
use std::io;

use crate::diary::data::DiaryError;
use crate::gateway::GatewayError;
use crate::intake::data::IntakeError;
use crate::intake::upload::UploadError;

#[derive(Debug)]
pub struct InternalError {
    status: Status,
    what: String,
}

/// The JSON body of every error response.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

impl InternalError {
    pub fn new(status: Status, what: impl Into<String>) -> InternalError {
        InternalError {
            status,
            what: what.into(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }
}

impl Error for InternalError {}
impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.what, self.status)
    }
}

impl<'r> Responder<'r, 'static> for InternalError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        if self.status.code >= 500 {
            error!(uri = %request.uri(), status = self.status.code, error = %self.what, "request failed");
        }

        status::Custom(self.status, Json(ErrorBody { error: self.what })).respond_to(request)
    }
}

impl From<GatewayError> for InternalError {
    fn from(e: GatewayError) -> InternalError {
        let status = match &e {
            GatewayError::Network(_) => Status::ServiceUnavailable,
            GatewayError::Unauthenticated => Status::Unauthorized,
            GatewayError::NotFoundOrForbidden => Status::NotFound,
            GatewayError::Conflict(_) => Status::Conflict,
            GatewayError::Validation(_) => Status::UnprocessableEntity,
            GatewayError::Storage(_) => Status::InternalServerError,
        };

        InternalError::new(status, e.user_message())
    }
}

impl From<IntakeError> for InternalError {
    fn from(e: IntakeError) -> InternalError {
        match e {
            IntakeError::Gateway(e) => InternalError::from(e),
            IntakeError::Field { message, .. } => {
                InternalError::new(Status::UnprocessableEntity, message)
            }
            staging @ IntakeError::Staging(_) => {
                InternalError::new(Status::InternalServerError, staging.to_string())
            }
        }
    }
}

impl From<UploadError> for InternalError {
    fn from(e: UploadError) -> InternalError {
        let status = match e {
            UploadError::InvalidName => Status::BadRequest,
            UploadError::Upload(_) | UploadError::PublicUrl(_) => Status::InternalServerError,
        };

        InternalError::new(status, e.to_string())
    }
}

impl From<DiaryError> for InternalError {
    fn from(e: DiaryError) -> InternalError {
        match e {
            DiaryError::Gateway(e) => InternalError::from(e),
            DiaryError::Validation(message) => InternalError::new(Status::BadRequest, message),
            sent @ DiaryError::AlreadySent(_) => {
                InternalError::new(Status::Conflict, sent.to_string())
            }
            other => InternalError::new(Status::InternalServerError, other.to_string()),
        }
    }
}

impl From<MultipartFormDataError> for InternalError {
    fn from(e: MultipartFormDataError) -> InternalError {
        InternalError::new(Status::BadRequest, e.to_string())
    }
}

impl From<io::Error> for InternalError {
    fn from(e: io::Error) -> InternalError {
        InternalError::new(Status::InternalServerError, e.to_string())
    }
}

impl From<rocket::figment::Error> for InternalError {
    fn from(e: rocket::figment::Error) -> InternalError {
        InternalError::new(Status::InternalServerError, format!("Invalid configuration: {}", e))
    }
}

impl From<&str> for InternalError {
    fn from(s: &str) -> InternalError {
        InternalError::new(Status::BadRequest, s)
    }
}

pub type InternalResult<T> = Result<T, InternalError>;
