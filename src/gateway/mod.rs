mod auth;
pub mod routes;
mod server;

pub use auth::*;
pub use server::*;
