//! # Loan Routes
//!
//! Thin wrappers around [`libris_db::LoanLedger`]. The ledger narrows
//! visibility to the caller's own loans unless the caller is staff.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use libris_core::loan::LoanUpdate;
use libris_core::policy::{Operation, Resource};
use libris_core::{CoreError, Loan, LoanStatus, ValidationError};

use crate::error::ApiError;
use crate::extract::{Body, MaybeCaller};
use crate::state::AppState;

/// `POST /api/loans` body.
#[derive(Debug, Deserialize)]
pub struct OpenLoanRequest {
    #[serde(default)]
    pub book: Option<String>,
}

/// `PUT/PATCH /api/loans/{id}` body. Status travels as `estado`.
#[derive(Debug, Deserialize)]
pub struct UpdateLoanRequest {
    #[serde(default, alias = "status")]
    pub estado: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
}

impl UpdateLoanRequest {
    fn into_update(self) -> Result<LoanUpdate, ApiError> {
        let status = match self.estado {
            None => None,
            Some(raw) => Some(LoanStatus::parse(&raw).ok_or_else(|| {
                CoreError::from(ValidationError::InvalidFormat {
                    field: "estado".to_string(),
                    reason: format!(
                        "'{raw}' is not one of ACTIVE, OVERDUE, RETURNED, LOST"
                    ),
                })
            })?),
        };

        Ok(LoanUpdate {
            status,
            due_at: self.due_at,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<Vec<Loan>>, ApiError> {
    let caller = caller.require(Resource::Loan, Operation::List)?;
    Ok(Json(state.db.loans().list_loans(caller).await?))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<Json<Loan>, ApiError> {
    let caller = caller.require(Resource::Loan, Operation::Retrieve)?;
    Ok(Json(state.db.loans().get_loan(caller, &id).await?))
}

/// Opens a loan for the caller. The borrower is always the caller.
pub async fn open(
    State(state): State<AppState>,
    caller: MaybeCaller,
    body: Result<Body<OpenLoanRequest>, ApiError>,
) -> Result<(StatusCode, Json<Loan>), ApiError> {
    let caller = caller.require(Resource::Loan, Operation::Create)?;
    let Body(request) = body?;

    let book_id = request
        .book
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            CoreError::from(ValidationError::Required {
                field: "book".to_string(),
            })
        })?;

    let loan = state.db.loans().open_loan(caller, book_id.trim()).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Amends or closes a loan; `estado: RETURNED` closes it.
pub async fn update(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
    body: Result<Body<UpdateLoanRequest>, ApiError>,
) -> Result<Json<Loan>, ApiError> {
    let caller = caller.require(Resource::Loan, Operation::Update)?;
    let Body(request) = body?;
    let update = request.into_update()?;

    Ok(Json(state.db.loans().update_loan(caller, &id, &update).await?))
}
