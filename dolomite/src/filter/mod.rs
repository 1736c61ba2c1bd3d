//! Filter interpretation: the top-level matcher, the field operator set,
//! and the `$text`, `$where` and geospatial sub-evaluators.

pub mod geo;
mod matcher;
pub mod operators;
pub mod text_search;
pub mod where_expr;

pub use matcher::is_match;
pub use operators::FilterOperator;
