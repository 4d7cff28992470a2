//! API handlers for the flight surety server
//!
//! The `x-caller` header carries the caller identity. The server trusts it
//! the same way the engine trusts identities handed in by the substrate.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::app::FlightSuretyApp;
use crate::error::SuretyError;
use crate::models::{Amount, ApiResponse, ClaimStatus, FlightInfo, FlightKey, Identity, LedgerTotals, RequestId};

pub const CALLER_HEADER: &str = "x-caller";

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

/// Engine summary for dashboards
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineStatus {
    pub operational: bool,
    pub flights: usize,
    pub held_balance: Amount,
    pub oracle_registration_fee: Amount,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusRequestBody {
    /// Defaults to the current unix time.
    pub timestamp: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusRequestResponse {
    pub request_id: RequestId,
    pub flight_key: FlightKey,
    pub timestamp: u64,
}

#[derive(Debug, Deserialize)]
pub struct BuyPolicyRequest {
    pub flight_key: FlightKey,
    pub premium: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuyPolicyResponse {
    pub policy_id: Uuid,
    pub flight_key: FlightKey,
    pub premium: Amount,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawResponse {
    pub customer: Identity,
    pub amount: Amount,
}

fn error_status(err: SuretyError) -> StatusCode {
    match err {
        SuretyError::Unauthorized => StatusCode::FORBIDDEN,
        SuretyError::SystemPaused => StatusCode::SERVICE_UNAVAILABLE,
        SuretyError::UnknownFlight | SuretyError::UnknownRequest => StatusCode::NOT_FOUND,
        SuretyError::AlreadyRegistered | SuretyError::FlightResolved => StatusCode::CONFLICT,
        SuretyError::TransferFailed => StatusCode::BAD_GATEWAY,
        SuretyError::NotEligible
        | SuretyError::InsufficientFunds
        | SuretyError::CapExceeded
        | SuretyError::InsufficientFee
        | SuretyError::InvalidAmount
        | SuretyError::InvalidStatusCode
        | SuretyError::LedgerOverflow => StatusCode::BAD_REQUEST,
    }
}

fn reject<T>(err: SuretyError) -> (StatusCode, Json<ApiResponse<T>>) {
    (
        error_status(err),
        Json(ApiResponse::err(format!("{} (code {})", err, err.code()))),
    )
}

fn respond<T>(result: crate::error::Result<T>) -> ApiResult<T> {
    result.map(|data| Json(ApiResponse::ok(data))).map_err(reject)
}

fn caller_of(headers: &HeaderMap) -> Option<Identity> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Identity::from)
}

/// Runs `f` on behalf of the identity in the caller header.
fn as_caller<T>(headers: &HeaderMap, f: impl FnOnce(Identity) -> crate::error::Result<T>) -> ApiResult<T> {
    match caller_of(headers) {
        Some(caller) => respond(f(caller)),
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::err(format!("missing {} header", CALLER_HEADER))),
        )),
    }
}

pub async fn root() -> &'static str {
    "Flight Surety API Server"
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn get_status(State(engine): State<Arc<FlightSuretyApp>>) -> Json<ApiResponse<EngineStatus>> {
    Json(ApiResponse::ok(EngineStatus {
        operational: engine.is_operational(),
        flights: engine.flight_list().len(),
        held_balance: engine.held_balance(),
        oracle_registration_fee: engine.registration_fee(),
    }))
}

// ===== Flight Handlers =====

pub async fn list_flights(State(engine): State<Arc<FlightSuretyApp>>) -> Json<ApiResponse<Vec<FlightInfo>>> {
    Json(ApiResponse::ok(engine.flight_list()))
}

pub async fn list_airline_flights(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(airline): Path<String>,
) -> Json<ApiResponse<Vec<FlightInfo>>> {
    Json(ApiResponse::ok(engine.flights_for(&Identity::new(airline))))
}

/// Ask the oracles for a flight's status
pub async fn request_flight_status(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(flight_key): Path<String>,
    headers: HeaderMap,
    body: Option<Json<StatusRequestBody>>,
) -> ApiResult<StatusRequestResponse> {
    let flight_key = FlightKey::from(flight_key);
    let timestamp = body
        .and_then(|Json(body)| body.timestamp)
        .unwrap_or_else(|| Utc::now().timestamp().max(0) as u64);

    as_caller(&headers, |caller| {
        engine
            .request_status(&flight_key, timestamp, &caller)
            .map(|request_id| StatusRequestResponse {
                request_id,
                flight_key: flight_key.clone(),
                timestamp,
            })
    })
}

// ===== Customer Handlers =====

/// Buy a policy for the calling customer
pub async fn buy_policy(
    State(engine): State<Arc<FlightSuretyApp>>,
    headers: HeaderMap,
    Json(request): Json<BuyPolicyRequest>,
) -> ApiResult<BuyPolicyResponse> {
    as_caller(&headers, |caller| {
        engine
            .buy_policy(&request.flight_key, &caller, request.premium, &caller)
            .map(|policy_id| BuyPolicyResponse {
                policy_id,
                flight_key: request.flight_key.clone(),
                premium: request.premium,
            })
    })
}

pub async fn list_customer_flights(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(customer): Path<String>,
) -> Json<ApiResponse<Vec<FlightInfo>>> {
    Json(ApiResponse::ok(engine.customer_flights(&Identity::new(customer))))
}

pub async fn check_claim(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(customer): Path<String>,
    headers: HeaderMap,
) -> ApiResult<ClaimStatus> {
    as_caller(&headers, |caller| engine.check_claim(&Identity::new(customer), &caller))
}

pub async fn withdraw(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(customer): Path<String>,
    headers: HeaderMap,
) -> ApiResult<WithdrawResponse> {
    let customer = Identity::new(customer);

    as_caller(&headers, |caller| match engine.withdraw(&customer, &caller) {
        Ok(amount) => Ok(WithdrawResponse {
            customer: customer.clone(),
            amount,
        }),
        Err(err) => {
            warn!(%customer, %caller, error = %err, "withdraw failed");
            Err(err)
        }
    })
}

// ===== Oracle and Ledger Handlers =====

pub async fn get_oracle_indexes(
    State(engine): State<Arc<FlightSuretyApp>>,
    Path(oracle): Path<String>,
) -> ApiResult<[u8; 3]> {
    match engine.indexes_of(&Identity::new(oracle)) {
        Some(indexes) => Ok(Json(ApiResponse::ok(indexes))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err("Oracle not registered")),
        )),
    }
}

pub async fn get_ledger(State(engine): State<Arc<FlightSuretyApp>>) -> Json<ApiResponse<LedgerTotals>> {
    Json(ApiResponse::ok(engine.ledger_totals()))
}
