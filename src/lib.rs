//! Quarry - intermediate query algebra with a constraint-aware optimizer
//!
//! Quarry represents relational queries as immutable intermediate query
//! trees, simplifies them using the unique and foreign key constraints of the
//! underlying relations and extracts the SQL to run.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_error as error;
pub use quarry_core as core;
pub use quarry_iq as iq;
pub use quarry_optimizer as optimizer;
pub use quarry_sql as sql;

pub use quarry_optimizer::optimize;
pub use quarry_sql::{extract_sql, ExtractedSql};

use common_config::QuarryConfig;
use common_error::QuarryResult;
use quarry_core::MetadataProvider;
use quarry_iq::IQ;
use quarry_optimizer::Optimizer;
use quarry_sql::NativeQueryGenerator;

/// Quarry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optimize a query, generate its SQL and extract it, with default settings.
///
/// The result carries the root definitions next to the SQL, so answers are
/// built by evaluating [`ExtractedSql::answer_term`] over each result row.
/// Returns `EmptyQuery` when the optimizer proves the query has no answer.
pub fn compile(iq: IQ, metadata: &dyn MetadataProvider) -> QuarryResult<ExtractedSql> {
    compile_with_config(iq, metadata, &QuarryConfig::default())
}

/// [`compile`] with explicit optimizer and SQL settings.
pub fn compile_with_config(
    iq: IQ,
    metadata: &dyn MetadataProvider,
    config: &QuarryConfig,
) -> QuarryResult<ExtractedSql> {
    config.validate()?;
    let optimized = Optimizer::from_settings(&config.optimizer).optimize(iq, metadata)?;
    let generated = NativeQueryGenerator::new(metadata)
        .with_settings(config.sql.clone())
        .generate(optimized.iq)?;
    extract_sql(&generated)
}
