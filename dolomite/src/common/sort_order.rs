use crate::common::document::Document;
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};
use crate::common::Value;

/// Direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One field of a multi-key sort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortEntry {
    pub field: String,
    pub order: SortOrder,
}

/// A parsed multi-key sort specification, fields in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    entries: Vec<SortEntry>,
}

impl SortSpec {
    /// Parses a sort document such as `{ "age": -1, "name": 1 }`.
    ///
    /// Positive numbers sort ascending, negative descending; zero or a
    /// non-numeric direction is rejected.
    pub fn from_document(spec: &Document) -> DolomiteResult<SortSpec> {
        let mut entries = Vec::with_capacity(spec.len());
        for (field, direction) in spec.iter() {
            let direction = match direction.as_number() {
                Some(n) if n > 0.0 => SortOrder::Ascending,
                Some(n) if n < 0.0 => SortOrder::Descending,
                _ => {
                    log::error!("Invalid sort direction for field '{}'", field);
                    return Err(DolomiteError::new(
                        &format!("bad sort specification for field '{}'", field),
                        ErrorKind::Client,
                    ));
                }
            };
            entries.push(SortEntry {
                field: field.clone(),
                order: direction,
            });
        }
        Ok(SortSpec { entries })
    }

    /// Parses an optional sort value taken from a find command.
    pub fn from_value(value: Option<&Value>) -> DolomiteResult<Option<SortSpec>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Document(spec)) if spec.is_empty() => Ok(None),
            Some(Value::Document(spec)) => Ok(Some(SortSpec::from_document(spec)?)),
            Some(other) => {
                log::error!("Sort specification is not a document: {:?}", other);
                Err(DolomiteError::new(
                    "sort must be a document",
                    ErrorKind::Client,
                ))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SortEntry] {
        &self.entries
    }
}
