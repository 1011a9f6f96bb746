// Clients for the remote APIs this service aggregates, plus the routines that
// combine them with the relation store.
pub mod area_response;
pub mod area_templates;
pub mod areas;
pub mod coverage;
pub mod geostore;
pub mod teams;
pub mod templates;
pub mod transformer;
pub mod upstream;
pub mod users;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::error::ApiError;

pub use upstream::{Upstream, UpstreamError};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Upstream(e) => e.into(),
            ServiceError::Database(e) => e.into(),
        }
    }
}
