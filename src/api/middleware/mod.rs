//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: token decode + account lookup
//! 2. Audit logger: logs after auth, has account_id

pub mod audit;
pub mod auth;
