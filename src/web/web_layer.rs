// Web layer - HTTP routes, middleware and the error-to-response mapping.
// Handlers stay thin: parse, validate, call `SheetsService`, wrap the result.

#[path = "api_error.rs"]
pub mod api_error;

#[path = "middleware/api_key.rs"]
pub mod api_key;

#[path = "router.rs"]
pub mod router;

#[path = "routes/health_routes.rs"]
pub mod health_routes;

#[path = "routes/sheets_routes.rs"]
pub mod sheets_routes;

pub use router::{build_router, AppState, ServerConfig};
