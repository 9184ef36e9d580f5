//! Property patching.

use std::sync::Arc;

use super::backend::Backend;
use crate::error::BackendError;
use crate::vdom::{Props, KEY_PROP};

/// Diff `new` against `old` and forward each change to
/// [`Backend::patch_prop`]. Keys only present in `old` are removed.
pub fn patch_props<B: Backend>(
    backend: &B,
    el: &B::Handle,
    old: Option<&Arc<Props>>,
    new: Option<&Arc<Props>>,
) -> Result<(), BackendError> {
    match (old, new) {
        (None, None) => return Ok(()),
        (Some(old), Some(new)) if Arc::ptr_eq(old, new) => return Ok(()),
        _ => {}
    }

    let empty = Props::new();
    let old = old.map_or(&empty, |props| props.as_ref());
    let new = new.map_or(&empty, |props| props.as_ref());

    for (key, next) in new {
        if key == KEY_PROP {
            continue;
        }
        let prev = old.get(key);
        if prev.is_some_and(|prev| prev.same_value(next)) {
            continue;
        }
        tracing::trace!(key = key.as_str(), "patch prop");
        backend.patch_prop(el, key, prev, Some(next))?;
    }

    for (key, prev) in old {
        if key != KEY_PROP && !new.contains_key(key) {
            tracing::trace!(key = key.as_str(), "remove prop");
            backend.patch_prop(el, key, Some(prev), None)?;
        }
    }
    Ok(())
}
