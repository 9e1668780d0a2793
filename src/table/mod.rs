//! Table model: the in-memory shape of one collection's table.
//!
//! A [`TableDefinition`] is built once per collection per generation pass and
//! is not mutated after the builder returns.

pub mod column;
pub mod definition;
pub mod type_mapping;

pub use column::{ColumnDefinition, SqlType};
pub use definition::{IndexDefinition, IndexInsert, TableDefinition};
