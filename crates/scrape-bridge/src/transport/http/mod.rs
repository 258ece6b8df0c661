//! HTTP transport: one `GET /scrape` route served by axum.

mod routes;
mod server;

pub use routes::routes;
pub use server::{ServerConfig, serve};
