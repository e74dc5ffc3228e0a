use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common_auth::{AuthError, Token};
use serde::Serialize;
use thiserror::Error;

use crate::customer::Customer;
use crate::store::StoreError;

pub const MISSING_CPF_MESSAGE: &str = "CPF é obrigatório";
pub const AUTHENTICATED_MESSAGE: &str = "Cliente autenticado com sucesso";
pub const NOT_FOUND_MESSAGE: &str = "Cliente não encontrado";
pub const SERVER_ERROR_MESSAGE: &str = "Erro no servidor";

/// Reasons a lookup does not end in an authenticated customer.
///
/// Malformed request bodies and store outages both land in `Downstream`.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("{}", MISSING_CPF_MESSAGE)]
    InvalidInput,
    #[error("{}", NOT_FOUND_MESSAGE)]
    NotFound,
    #[error("{0}")]
    Downstream(String),
}

impl From<serde_json::Error> for LookupError {
    fn from(error: serde_json::Error) -> Self {
        LookupError::Downstream(error.to_string())
    }
}

impl From<std::str::Utf8Error> for LookupError {
    fn from(error: std::str::Utf8Error) -> Self {
        LookupError::Downstream(error.to_string())
    }
}

impl From<StoreError> for LookupError {
    fn from(error: StoreError) -> Self {
        LookupError::Downstream(error.to_string())
    }
}

impl From<AuthError> for LookupError {
    fn from(error: AuthError) -> Self {
        LookupError::Downstream(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Authenticated {
        message: &'static str,
        cliente: Customer,
        token: Token,
    },
    Failure {
        message: &'static str,
        error: String,
    },
    Message {
        message: &'static str,
    },
}

/// Status code plus JSON payload produced for every invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub status_code: StatusCode,
    pub body: ResponseBody,
}

impl LookupResponse {
    pub fn authenticated(customer: Customer, token: Token) -> Self {
        Self {
            status_code: StatusCode::OK,
            body: ResponseBody::Authenticated {
                message: AUTHENTICATED_MESSAGE,
                cliente: customer,
                token,
            },
        }
    }

    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self.status_code {
            StatusCode::OK => "authenticated",
            StatusCode::BAD_REQUEST => "invalid_input",
            StatusCode::NOT_FOUND => "not_found",
            _ => "error",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.body).unwrap_or_else(|error| {
            serde_json::json!({ "message": SERVER_ERROR_MESSAGE, "error": error.to_string() })
        })
    }
}

impl From<LookupError> for LookupResponse {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::InvalidInput => Self {
                status_code: StatusCode::BAD_REQUEST,
                body: ResponseBody::Message {
                    message: MISSING_CPF_MESSAGE,
                },
            },
            LookupError::NotFound => Self {
                status_code: StatusCode::NOT_FOUND,
                body: ResponseBody::Message {
                    message: NOT_FOUND_MESSAGE,
                },
            },
            LookupError::Downstream(error) => Self {
                status_code: StatusCode::INTERNAL_SERVER_ERROR,
                body: ResponseBody::Failure {
                    message: SERVER_ERROR_MESSAGE,
                    error,
                },
            },
        }
    }
}

impl IntoResponse for LookupResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status_code;
        response
    }
}
