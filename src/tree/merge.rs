//! Precedence merge of configuration fragments.

use super::value::{Fragment, Mapping, Value};

/// Fold fragments from lowest to highest precedence into one tree.
///
/// Where both sides hold a mapping the two are merged key by key. Anything
/// else is replaced by the later fragment's value: sequences wholesale,
/// scalars, type changes and explicit nulls alike.
pub fn merge_fragments<I>(fragments: I) -> Fragment
where
    I: IntoIterator<Item = Fragment>,
{
    fragments.into_iter().fold(Fragment::new(), |mut merged, fragment| {
        merge_into(&mut merged, fragment);
        merged
    })
}

/// Merge `overlay` on top of `base` in place.
pub fn merge_into(base: &mut Mapping, overlay: Mapping) {
    for (key, value) in overlay {
        match value {
            Value::Mapping(incoming) => match base.get_mut(&key) {
                Some(Value::Mapping(existing)) => merge_into(existing, incoming),
                _ => {
                    base.insert(key, Value::Mapping(incoming));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
