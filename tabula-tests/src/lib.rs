mod blog;
mod mock;

pub use blog::*;
pub use mock::*;

use log::LevelFilter;
use std::{env, sync::Arc};
use tabula_core::{Adapter, Driver};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Shared suite every driver runs against a live database.
pub async fn execute_tests<D: Driver>(adapter: Arc<Adapter<D>>, schema: &BlogSchema<'_>) {
    blog(adapter.clone(), schema).await;
    adapter.close().await.expect("Could not close the adapter");
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
