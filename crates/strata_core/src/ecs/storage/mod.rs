// mod.rs - Storage module exports

mod column;

pub use column::{Column, ColumnError};
