//! External interfaces: API dispatch table and HTTP server

mod registry;
pub mod server;
pub mod sse;

pub use registry::{ApiRegistry, Args};
pub use server::{router, run};
