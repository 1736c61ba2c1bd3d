//! Shared data model: values, documents, the canonical comparator, dotted
//! field paths, sort specifications and projections.

pub mod compare;
pub mod document;
pub mod field;
pub mod object_id;
pub mod projection;
pub mod sort_order;
mod value;

pub use document::{normalize, Document, DOC_ID};
pub use object_id::ObjectId;
pub use sort_order::{SortOrder, SortSpec};
pub use value::Value;
