pub mod http;
pub mod observability;

pub use http::{create_router, AppState};
