//! Configuration tree model: raw fragment values, precedence merge,
//! normalization to string leaves and dotted-key lookup.

pub mod lookup;
pub mod merge;
pub mod path;
pub mod value;

pub use lookup::{value_from_flat_key, LookupError};
pub use merge::{merge_fragments, merge_into};
pub use path::{LeafPath, PathSegment};
pub use value::{canonical_float, normalize_mapping, ConfigValue, Fragment, Mapping, Value};
