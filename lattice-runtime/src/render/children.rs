//! Children reconciliation.
//!
//! Array-to-array updates use a keyed diff: the common prefix and suffix
//! are patched in place, then the unmatched middle is matched up by key.
//! Matched nodes whose relative order survived (the longest increasing run
//! of their old positions) stay put; everything else is moved, mounted or
//! unmounted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::backend::Backend;
use super::renderer::{Node, RendererInner};
use super::sequence::longest_increasing_subsequence;
use crate::error::Result;
use crate::vdom::{Children, Key};

impl<B: Backend> RendererInner<B> {
    /// Patch the children of `old` into those of `new` inside `container`.
    pub(crate) fn patch_children(
        self: &Arc<Self>,
        old: &Node<B>,
        new: &Node<B>,
        container: &B::Handle,
        anchor: Option<&B::Handle>,
    ) -> Result<()> {
        match (old.children(), new.children()) {
            (Children::Text(prev), Children::Text(next)) => {
                if prev != next {
                    self.backend.set_element_text(container, next)?;
                }
            }
            (Children::Array(prev), Children::Text(next)) => {
                self.unmount_children(prev)?;
                self.backend.set_element_text(container, next)?;
            }
            (Children::None, Children::Text(next)) => {
                self.backend.set_element_text(container, next)?;
            }
            (Children::Array(prev), Children::Array(next)) => {
                self.patch_keyed_children(prev, next, container, anchor)?;
            }
            (Children::Text(_), Children::Array(next)) => {
                self.backend.set_element_text(container, "")?;
                self.mount_children(next, container, anchor)?;
            }
            (Children::None, Children::Array(next)) => {
                self.mount_children(next, container, anchor)?;
            }
            (Children::Array(prev), Children::None) => {
                self.unmount_children(prev)?;
            }
            (Children::Text(_), Children::None) => {
                self.backend.set_element_text(container, "")?;
            }
            (Children::None, Children::None) => {}
        }
        Ok(())
    }

    fn patch_keyed_children(
        self: &Arc<Self>,
        c1: &[Node<B>],
        c2: &[Node<B>],
        container: &B::Handle,
        parent_anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let mut i = 0;
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. common prefix
        while i < e1 && i < e2 && c1[i].same_type(&c2[i]) {
            let anchor = self.end_anchor(&c1[i + 1..], parent_anchor);
            self.patch(Some(&c1[i]), &c2[i], container, anchor.as_ref())?;
            i += 1;
        }

        // 2. common suffix
        while i < e1 && i < e2 && c1[e1 - 1].same_type(&c2[e2 - 1]) {
            let anchor = self.end_anchor(&c2[e2..], parent_anchor);
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, anchor.as_ref())?;
            e1 -= 1;
            e2 -= 1;
        }

        if i == e1 {
            // 3. only insertions left
            if i < e2 {
                let anchor = self.end_anchor(&c2[e2..], parent_anchor);
                self.mount_children(&c2[i..e2], container, anchor.as_ref())?;
            }
        } else if i == e2 {
            // 4. only removals left
            self.unmount_children(&c1[i..e1])?;
        } else {
            // 5. unknown middle
            self.patch_unknown_sequence(c1, c2, i, e1, e2, container, parent_anchor)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn patch_unknown_sequence(
        self: &Arc<Self>,
        c1: &[Node<B>],
        c2: &[Node<B>],
        start: usize,
        e1: usize,
        e2: usize,
        container: &B::Handle,
        parent_anchor: Option<&B::Handle>,
    ) -> Result<()> {
        let mut key_to_new: HashMap<&Key, usize> = HashMap::with_capacity(e2 - start);
        for (index, node) in c2.iter().enumerate().take(e2).skip(start) {
            if let Some(key) = node.key() {
                match key_to_new.entry(key) {
                    Entry::Vacant(slot) => {
                        slot.insert(index);
                    }
                    Entry::Occupied(_) => warn!(?key, "duplicate key in new children"),
                }
            }
        }

        let to_be_patched = e2 - start;
        let mut patched = 0;
        // 0 = unmatched, otherwise old index + 1
        let mut new_to_old = vec![0usize; to_be_patched];
        let mut moved = false;
        let mut max_new_index = 0;

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(start) {
            if patched >= to_be_patched {
                self.unmount(prev, true)?;
                continue;
            }

            let new_index = match prev.key() {
                Some(key) => key_to_new.get(key).copied(),
                None => (start..e2)
                    .find(|&j| new_to_old[j - start] == 0 && prev.same_type(&c2[j])),
            };

            match new_index {
                Some(j) if new_to_old[j - start] == 0 => {
                    new_to_old[j - start] = old_index + 1;
                    if j >= max_new_index {
                        max_new_index = j;
                    } else {
                        moved = true;
                    }
                    let tail = self.end_anchor(&c2[e2..], parent_anchor);
                    let anchor = self.end_anchor(&c1[old_index + 1..], tail.as_ref());
                    self.patch(Some(prev), &c2[j], container, anchor.as_ref())?;
                    patched += 1;
                }
                Some(_) => {
                    warn!(key = ?prev.key(), "duplicate key in old children");
                    self.unmount(prev, true)?;
                }
                None => self.unmount(prev, true)?,
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        let mut cursor = stable.len();

        for offset in (0..to_be_patched).rev() {
            let index = start + offset;
            let node = &c2[index];
            let anchor = self.end_anchor(&c2[index + 1..], parent_anchor);

            if new_to_old[offset] == 0 {
                self.patch(None, node, container, anchor.as_ref())?;
            } else if moved {
                if cursor > 0 && stable[cursor - 1] == offset {
                    cursor -= 1;
                } else {
                    self.move_node(node, container, anchor.as_ref())?;
                }
            }
        }
        Ok(())
    }

    /// Anchor for inserting right before `following`.
    fn end_anchor(&self, following: &[Node<B>], fallback: Option<&B::Handle>) -> Option<B::Handle> {
        self.first_host_in(following).or_else(|| fallback.cloned())
    }
}
