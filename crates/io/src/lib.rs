// File I/O operations

pub mod export;
pub mod html;
pub mod sqlite;
pub mod workbook;

pub use sqlite::SqliteStore;
pub use workbook::ExcelSource;
