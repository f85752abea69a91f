// Presentation layer - Read-only JSON view API
pub mod app_state;
pub mod handlers;
pub mod router;
