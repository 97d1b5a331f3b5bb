//! Request/response transform pipeline (C8, §4.8). Generalizes the
//! teacher's `security::headers` sketch ("forwarded headers only") into the
//! full ordered add/rename/remove + principal + forwarded-chain + security
//! headers pipeline.

pub mod forwarded;
pub mod request;
pub mod response;

pub use forwarded::client_ip_from_chain;
pub use request::apply_request_transform;
pub use response::apply_response_transform;
