//! HTTP glue around the authgate token engine

pub mod credentials_header;
pub mod handlers;
pub mod logging;
pub mod server;

pub use handlers::{handle_request, AppState};
pub use server::AuthServer;
