//! HTTP API handlers for facegated

pub mod error;
pub mod health;
pub mod preview;
pub mod ui;
pub mod verify;

pub use error::ApiError;
pub use health::health_routes;
pub use preview::preview;
pub use ui::serve_index;
pub use verify::verify;
