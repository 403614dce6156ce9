//! MM Catalog - Local movie dataset
//!
//! Loads the movie CSV, joins query matches back onto it, and renders the
//! joined rows as a table.
//!
//! Author: hephaex@gmail.com

pub mod catalog;
pub mod projection;
pub mod table;

pub use catalog::{MovieCatalog, MovieRecord};
pub use projection::{project, DisplayRow};
pub use table::{ResultTable, COLUMNS};
