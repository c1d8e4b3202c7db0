//! Dialect neutral database access: pooled adapters, a fluent `SELECT` builder and table gateways
//! emulating referential actions on top of them.
//!
//! The drivers live in their own crates (`tabula-mysql`, `tabula-postgres`).
pub use tabula_core::*;
