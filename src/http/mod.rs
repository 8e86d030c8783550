//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → request.rs (buffer body, build Exchange)
//!     → routing::RouteTable (middlewares, auth gate, MVC dispatch)
//!     → exchange.rs (response state → axum Response)
//!     → Send to client
//! ```

pub mod exchange;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use exchange::{Exchange, RouteParams};
pub use request::X_REQUEST_ID;
pub use response::ApiResponse;
pub use server::HttpServer;
