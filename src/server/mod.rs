mod authn;
mod batch;
pub mod dto;
mod error_response;
mod router;
mod transfer;

pub use error_response::ApiError;
pub use router::{base_url, create_router, AppState};
