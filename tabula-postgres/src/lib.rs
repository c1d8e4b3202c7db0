mod connection;
mod driver;
mod sql_writer;
mod transaction;
mod value_holder;

pub use connection::*;
pub use driver::*;
pub use sql_writer::*;
pub use transaction::*;
pub(crate) use value_holder::*;
