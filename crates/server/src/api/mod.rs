pub mod acquisitions;
pub mod clients;
pub mod error;
pub mod handlers;
pub mod library;
pub mod middleware;
pub mod routes;
pub mod search;
pub mod ws;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
