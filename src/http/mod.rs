//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, proxy_handler's C3→C4→C2→C5→C6→C7→C8 sequence)
//!     → [routing layer decides candidate backends]
//!     → [circuit breaker + health narrow the candidates]
//!     → Send to client
//!
//! WebSocket upgrade:
//!     → server.rs selects a candidate, then hands off to websocket.rs
//!     → websocket.rs pumps frames bidirectionally
//! ```
//!
//! # Design Decisions
//! - HTTP/1.1 and HTTP/2 supported via Axum/hyper
//! - Request body buffered ahead of the candidate loop so retries and
//!   failover can replay it
//! - Request ID generated or adopted for every request (correlation)

pub mod server;
pub mod websocket;

pub use server::HttpServer;
