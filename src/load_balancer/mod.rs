//! Backend registry (§3: Backend identity, health, connection accounting).
//!
//! Route specificity ordering across candidate backends lives in
//! `crate::routing::Router`; this module owns only the per-backend runtime
//! object (connection accounting, cached health word) and its name-keyed
//! lookup table.

pub mod backend;
pub mod pool;
