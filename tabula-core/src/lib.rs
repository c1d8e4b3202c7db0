mod adapter;
mod config;
mod context;
mod decode;
mod driver;
mod error;
mod literal;
mod metadata;
mod quote;
mod registry;
mod row;
mod select;
mod session;
mod statement;
mod table;
mod transaction;
mod util;
mod value;
mod writer;

pub use ::anyhow::Context;
pub use ::tokio_util::sync::CancellationToken;
pub use adapter::*;
pub use config::*;
pub use context::*;
pub use decode::*;
pub use driver::*;
pub use error::*;
pub use literal::*;
pub use metadata::*;
pub use quote::*;
pub use registry::*;
pub use row::*;
pub use select::*;
pub use session::*;
pub use statement::*;
pub use table::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::*;
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
