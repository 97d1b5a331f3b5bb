//! Routing subsystem (C7).
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (candidate lookup across all compiled routes)
//!     → matcher.rs (pattern evaluation + specificity scoring)
//!     → Return: ordered candidate backend names, most specific first
//!
//! Route Compilation (at startup / reload):
//!     RouteConfig[]
//!     → compile each pattern (matcher.rs)
//!     → Router::from_config freezes the compiled set
//! ```

pub mod matcher;
pub mod pattern;
pub mod router;

pub use matcher::{CompiledRoute, Matcher};
pub use router::Router;
