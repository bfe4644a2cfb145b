//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound connection
//!     → server.rs (Axum setup, request ID, restart hooks)
//!     → request.rs (buffer into a replayable request)
//!     → forward.rs (backpressure, ledger, send to the application)
//!     → response.rs (strip hop-by-hop headers, map errors)
//!     → Reply handle → caller
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use forward::{Admission, Forwarder, INTERCEPTOR_CONTROLLER};
pub use request::{MakeRequestUuid, RetainedRequest, X_REQUEST_ID};
pub use response::{ForwardError, ReplyHandle};
pub use server::HttpServer;
