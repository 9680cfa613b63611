//! Records module
//!
//! Defines the typed containers the mappers fill:
//! - `EntryType` / `Value`: what an entry may hold
//! - `Entry`: value plus its storage state
//! - `Record`: ordered entries bound to a mapper

pub mod entry;
pub mod record;
pub mod value;

pub use entry::Entry;
pub use record::Record;
pub use value::{EntryType, Value};

use crate::error::MapperError;
use crate::mappers::MapperHandle;

/// Key of the entry holding the path of a page record
pub const PAGE_PATH_KEY: &str = "path";
/// Key of the entry holding the content of a page record
pub const PAGE_CONTENT_KEY: &str = "content";

/// Record with path and content entries, as used by page content mappers
pub fn page_record(mapper: MapperHandle) -> Result<Record, MapperError> {
    let mut record = Record::with_mapper(mapper);
    record
        .add_entry(PAGE_PATH_KEY, EntryType::String { max_length: 512 })?
        .add_entry(PAGE_CONTENT_KEY, EntryType::String { max_length: 0 })?;
    Ok(record)
}
