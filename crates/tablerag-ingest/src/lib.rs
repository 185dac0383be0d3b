//! tablerag ingest: tabular sources for the knowledge builder.
//!
//! `CsvSource` reads a CSV file whose encoding may be unknown by trying an
//! ordered list of candidate encodings, then infers a type per column.

pub mod csv_source;
pub mod decode;
pub mod table;

pub use csv_source::{CsvOptions, CsvSource, TabularSource, DEFAULT_NULL_MARKERS};
pub use decode::{decode_with_candidates, DecodedText};
pub use table::{DecodedTable, Table};
