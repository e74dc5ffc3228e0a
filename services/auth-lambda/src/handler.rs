use std::sync::Arc;

use common_auth::{Token, TokenIssuer};
use common_obs::{register_counter, CounterVec};
use once_cell::sync::Lazy;
use serde_json::{Number, Value};

use crate::customer::{mask_cpf, Customer};
use crate::error::{LookupError, LookupResponse};
use crate::store::CustomerStore;

static LOOKUPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter(
        "auth_lookups_total",
        "Customer authentication lookups by outcome",
        &["outcome"],
    )
});

/// The identifier extracted from a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub cpf: String,
}

impl LookupRequest {
    /// Parse a raw request body.
    ///
    /// A missing or falsy `cpf` (`null`, `""`, `false`, `0`) is invalid input.
    /// Numbers and `true` are looked up by their string cast; arrays and
    /// objects cannot be cast to a CPF and fail like a store error.
    pub fn parse(body: &str) -> Result<Self, LookupError> {
        let request: Value = serde_json::from_str(body)?;
        let cpf = match &request {
            Value::Null => {
                return Err(LookupError::Downstream(
                    "cannot read property 'cpf' of null request body".to_string(),
                ))
            }
            Value::Object(fields) => fields.get("cpf"),
            _ => None,
        };

        let cpf = match cpf {
            None | Some(Value::Null) | Some(Value::Bool(false)) => {
                return Err(LookupError::InvalidInput)
            }
            Some(Value::String(cpf)) if cpf.is_empty() => return Err(LookupError::InvalidInput),
            Some(Value::String(cpf)) => cpf.clone(),
            Some(Value::Number(number)) if number.as_f64() == Some(0.0) => {
                return Err(LookupError::InvalidInput)
            }
            Some(Value::Number(number)) => number_as_text(number),
            Some(Value::Bool(true)) => "true".to_string(),
            Some(other) => {
                return Err(LookupError::Downstream(format!(
                    "Cast to string failed for value {} at path \"cpf\"",
                    other
                )))
            }
        };

        Ok(Self { cpf })
    }
}

/// Decimal text of a number, with whole floats printed as integers
/// (`1e3` is `"1000"`).
fn number_as_text(number: &Number) -> String {
    if number.is_f64() {
        if let Some(value) = number.as_f64() {
            if value.fract() == 0.0 && value.abs() < 1e21 {
                return format!("{:.0}", value);
            }
        }
    }
    number.to_string()
}

/// Authenticates a customer by CPF.
///
/// Holds no per-request state; the store and issuer are owned by the host and
/// shared across invocations.
#[derive(Clone)]
pub struct LookupHandler {
    store: Arc<dyn CustomerStore>,
    issuer: Arc<dyn TokenIssuer<Customer>>,
}

impl LookupHandler {
    pub fn new(store: Arc<dyn CustomerStore>, issuer: Arc<dyn TokenIssuer<Customer>>) -> Self {
        Self { store, issuer }
    }

    /// Run one lookup for a serialized request body. Every failure is turned
    /// into a response.
    pub async fn handle(&self, body: &str) -> LookupResponse {
        let result = self.authenticate(body).await;
        self.respond(result)
    }

    /// Same as [`handle`](Self::handle) for raw bytes; invalid UTF-8 is a
    /// parse failure.
    pub async fn handle_bytes(&self, body: &[u8]) -> LookupResponse {
        match std::str::from_utf8(body) {
            Ok(body) => self.handle(body).await,
            Err(error) => self.respond(Err(error.into())),
        }
    }

    async fn authenticate(&self, body: &str) -> Result<(Customer, Token), LookupError> {
        let request = LookupRequest::parse(body)?;
        let customer = self
            .store
            .find_by_cpf(&request.cpf)
            .await?
            .ok_or(LookupError::NotFound)?;
        let token = self.issuer.issue(&customer)?;
        Ok((customer, token))
    }

    fn respond(&self, result: Result<(Customer, Token), LookupError>) -> LookupResponse {
        let response = match result {
            Ok((customer, token)) => {
                tracing::info!(
                    event = "customer_authenticated",
                    cpf = %mask_cpf(customer.cpf())
                );
                LookupResponse::authenticated(customer, token)
            }
            Err(LookupError::Downstream(error)) => {
                tracing::error!(event = "lookup_failed", %error);
                LookupError::Downstream(error).into()
            }
            Err(error) => {
                tracing::info!(event = "lookup_rejected", reason = %error);
                error.into()
            }
        };

        LOOKUPS_TOTAL.inc(&[response.outcome()], 1);
        response
    }
}
