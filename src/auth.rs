//! Caller identity as forwarded by the authenticating gateway.
//!
//! Tokens are validated upstream; this service only reads the resulting claims
//! from request headers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::fleet::Role;

pub const SUBJECT_HEADER: &str = "x-subject-id";
pub const ROLE_HEADER: &str = "x-role";
pub const HOTEL_HEADER: &str = "x-hotel-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub subject_id: Uuid,
    pub role: Role,
    pub hotel_id: Option<Uuid>,
}

impl Claims {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let subject_id = header(headers, SUBJECT_HEADER)?
            .ok_or_else(|| AppError::Unauthorized(format!("missing {SUBJECT_HEADER}")))?;
        let subject_id = Uuid::parse_str(subject_id)
            .map_err(|err| AppError::Unauthorized(format!("invalid {SUBJECT_HEADER}: {err}")))?;

        let role = header(headers, ROLE_HEADER)?
            .ok_or_else(|| AppError::Unauthorized(format!("missing {ROLE_HEADER}")))?;
        let role = Role::parse(role)
            .ok_or_else(|| AppError::Unauthorized(format!("unknown role: {role}")))?;

        let hotel_id = header(headers, HOTEL_HEADER)?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| {
                Uuid::parse_str(raw.trim()).map_err(|err| {
                    AppError::Unauthorized(format!("invalid {HOTEL_HEADER}: {err}"))
                })
            })
            .transpose()?;

        Ok(Self {
            subject_id,
            role,
            hotel_id,
        })
    }

    pub fn hotel(&self) -> Result<Uuid, AppError> {
        self.hotel_id
            .ok_or_else(|| AppError::Forbidden("caller has no hotel".to_string()))
    }

    /// Supervisors and admins act on their own hotel only.
    pub fn require_supervisor(&self) -> Result<Uuid, AppError> {
        if !self.role.is_supervisory() {
            return Err(AppError::Forbidden(
                "supervisor or admin role required".to_string(),
            ));
        }
        self.hotel()
    }

    pub fn require_driver(&self) -> Result<(), AppError> {
        match self.role {
            Role::Driver => Ok(()),
            Role::Requester | Role::Supervisor | Role::Admin => {
                Err(AppError::Forbidden("driver role required".to_string()))
            }
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::Requester | Role::Driver | Role::Supervisor => {
                Err(AppError::Forbidden("admin role required".to_string()))
            }
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map(str::trim)
                .map_err(|_| AppError::Unauthorized(format!("{name} is not valid text")))
        })
        .transpose()
}

#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Claims::from_headers(&parts.headers)
    }
}
