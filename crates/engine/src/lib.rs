//! `daybook-engine` — canonical sheet model.
//!
//! Cells, row matrices and the defensive value coercion every downstream
//! stage relies on. Pure data crate: no IO, no storage.

pub mod cell;
pub mod dates;
pub mod sheet;

pub use cell::CellValue;
pub use sheet::Sheet;
