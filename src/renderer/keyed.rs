//! Children reconciliation.
//!
//! Keyed arrays are diffed in five steps:
//!
//! 1. patch the common prefix
//! 2. patch the common suffix
//! 3. only new nodes left: mount them
//! 4. only old nodes left: unmount them
//! 5. unknown middle: map new keys to indices, patch or unmount every old
//!    node, then walk the new middle backwards, mounting fresh nodes and
//!    moving the ones off the longest increasing subsequence of old
//!    positions
//!
//! Step 5 keeps the nodes on the subsequence where they are, so a reorder
//! costs `middle - lis` moves and nothing more.

use std::collections::{HashMap, HashSet};

use super::adapter::{HostNode, PlatformAdapter};
use super::RendererState;
use crate::component::InstanceId;
use crate::config;
use crate::error::{Result, RuntimeError};
use crate::vnode::{Children, Key, PatchFlags, VNode};

/// Indices of one longest strictly increasing subsequence of `seq`,
/// ascending. Zero entries mean "no old position" and are skipped.
pub fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    let mut predecessor: Vec<Option<usize>> = vec![None; seq.len()];
    // tails[k] = index of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();

    for (i, &value) in seq.iter().enumerate() {
        if value == 0 {
            continue;
        }
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            predecessor[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut out = vec![0; tails.len()];
    let mut current = tails.last().copied();
    for slot in out.iter_mut().rev() {
        let Some(i) = current else { break };
        *slot = i;
        current = predecessor[i];
    }
    out
}

/// Fail on the first repeated key among siblings.
pub(crate) fn ensure_unique_keys(children: &[VNode]) -> Result<()> {
    let mut seen: HashSet<&Key> = HashSet::new();
    for child in children {
        if let Some(key) = child.key() {
            if !seen.insert(key) {
                return Err(RuntimeError::DuplicateKey { key: key.to_string() });
            }
        }
    }
    Ok(())
}

fn has_keys(children: &[VNode]) -> bool {
    children.iter().any(|c| c.key().is_some())
}

impl<A: PlatformAdapter + 'static> RendererState<A> {
    /// Diff the children of `prev` into those of `next`. `container` is the
    /// host parent; `anchor` bounds the range (a fragment's end anchor).
    pub(crate) fn patch_children(
        &mut self,
        prev: &VNode,
        next: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        let flag = next.patch_flag();
        if self.block_tree {
            let (old, new) = (prev.children().nodes(), next.children().nodes());
            if flag.contains(PatchFlags::KEYED_FRAGMENT) {
                return self.patch_keyed_children(old, new, container, anchor, parent, optimized);
            }
            if flag.contains(PatchFlags::UNKEYED_FRAGMENT) {
                return self.patch_unkeyed_children(old, new, container, anchor, parent, optimized);
            }
        }

        match (prev.children(), next.children()) {
            (old, Children::Text(text)) => {
                if let Children::Nodes(nodes) = old {
                    self.unmount_children(nodes, parent, true)?;
                }
                if old.text() != Some(text.as_str()) {
                    self.adapter.set_element_text(container, text)?;
                }
            }
            (Children::Nodes(old), Children::Nodes(new)) => {
                if has_keys(old) || has_keys(new) {
                    self.patch_keyed_children(old, new, container, anchor, parent, optimized)?;
                } else {
                    if config::warn_keyless_lists() && new.len() > 1 {
                        tracing::warn!(%container, len = new.len(), "children array without keys, patching by position");
                    }
                    self.patch_unkeyed_children(old, new, container, anchor, parent, optimized)?;
                }
            }
            (old, Children::Nodes(new)) => {
                if old.text().is_some() {
                    self.adapter.set_element_text(container, "")?;
                }
                self.mount_children(new, container, anchor, parent, optimized)?;
            }
            (old, Children::None | Children::Slots(_)) => match old {
                Children::Nodes(nodes) => self.unmount_children(nodes, parent, true)?,
                Children::Text(_) => self.adapter.set_element_text(container, "")?,
                Children::None | Children::Slots(_) => {}
            },
        }
        Ok(())
    }

    fn patch_unkeyed_children(
        &mut self,
        old: &[VNode],
        new: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        let common = old.len().min(new.len());
        for (prev, next) in old.iter().zip(new) {
            self.patch(Some(prev), next, container, None, parent, optimized)?;
        }
        if old.len() > new.len() {
            self.unmount_children(&old[common..], parent, true)
        } else {
            self.mount_children(&new[common..], container, anchor, parent, optimized)
        }
    }

    fn patch_keyed_children(
        &mut self,
        c1: &[VNode],
        c2: &[VNode],
        container: HostNode,
        parent_anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        ensure_unique_keys(c2)?;

        let mut i = 0;
        let mut e1 = c1.len();
        let mut e2 = c2.len();

        // 1. prefix
        while i < e1 && i < e2 && c1[i].is_same_type(&c2[i]) {
            self.patch(Some(&c1[i]), &c2[i], container, None, parent, optimized)?;
            i += 1;
        }

        // 2. suffix
        while i < e1 && i < e2 && c1[e1 - 1].is_same_type(&c2[e2 - 1]) {
            self.patch(Some(&c1[e1 - 1]), &c2[e2 - 1], container, None, parent, optimized)?;
            e1 -= 1;
            e2 -= 1;
        }

        // 3. mount the rest
        if i == e1 {
            let anchor = match c2.get(e2) {
                Some(next) => self.first_host_node(next),
                None => parent_anchor,
            };
            for node in &c2[i..e2] {
                self.patch(None, node, container, anchor, parent, optimized)?;
            }
            return Ok(());
        }

        // 4. unmount the rest
        if i == e2 {
            return self.unmount_children(&c1[i..e1], parent, true);
        }

        // 5. unknown middle
        let start = i;
        let to_patch = e2 - start;
        let key_to_new: HashMap<&Key, usize> = c2[start..e2]
            .iter()
            .enumerate()
            .filter_map(|(offset, node)| node.key().map(|key| (key, start + offset)))
            .collect();

        // Old position + 1 for each new middle node; 0 = newly mounted.
        let mut new_to_old = vec![0usize; to_patch];
        let mut patched = 0;
        let mut moved = false;
        let mut max_new_index = 0;

        for (old_index, prev) in c1.iter().enumerate().take(e1).skip(start) {
            if patched >= to_patch {
                self.unmount(prev, parent, true)?;
                continue;
            }
            let found = match prev.key() {
                Some(key) => key_to_new.get(key).copied(),
                None => (start..e2).find(|&j| {
                    new_to_old[j - start] == 0 && c2[j].key().is_none() && prev.is_same_type(&c2[j])
                }),
            };
            match found {
                None => self.unmount(prev, parent, true)?,
                Some(new_index) => {
                    new_to_old[new_index - start] = old_index + 1;
                    if new_index >= max_new_index {
                        max_new_index = new_index;
                    } else {
                        moved = true;
                    }
                    self.patch(Some(prev), &c2[new_index], container, None, parent, optimized)?;
                    patched += 1;
                }
            }
        }

        let stable = if moved {
            longest_increasing_subsequence(&new_to_old)
        } else {
            Vec::new()
        };
        tracing::trace!(middle = to_patch, stable = stable.len(), moved, "keyed middle diff");

        let mut j = stable.len();
        for offset in (0..to_patch).rev() {
            let index = start + offset;
            let node = &c2[index];
            let anchor = match c2.get(index + 1) {
                Some(next) => self.first_host_node(next),
                None => parent_anchor,
            };
            if new_to_old[offset] == 0 {
                self.patch(None, node, container, anchor, parent, optimized)?;
            } else if moved {
                if j > 0 && stable[j - 1] == offset {
                    j -= 1;
                } else {
                    self.move_vnode(node, container, anchor)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::{element, Props};
    use proptest::prelude::*;
    use rstest::rstest;

    fn lis_len_quadratic(seq: &[usize]) -> usize {
        let mut best = vec![0usize; seq.len()];
        for i in 0..seq.len() {
            if seq[i] == 0 {
                continue;
            }
            best[i] = 1;
            for k in 0..i {
                if seq[k] != 0 && seq[k] < seq[i] {
                    best[i] = best[i].max(best[k] + 1);
                }
            }
        }
        best.into_iter().max().unwrap_or(0)
    }

    #[rstest]
    #[case(&[], &[])]
    #[case(&[3], &[0])]
    #[case(&[2, 1, 3], &[1, 2])]
    #[case(&[1, 3, 2, 4, 5], &[0, 2, 3, 4])]
    #[case(&[0, 0, 1], &[2])]
    #[case(&[5, 4, 3, 2, 1], &[4])]
    fn test_lis_cases(#[case] seq: &[usize], #[case] expected: &[usize]) {
        assert_eq!(longest_increasing_subsequence(seq), expected);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let children = vec![
            element("li").key("a").build(),
            element("li").key("b").build(),
            element("li").key("a").build(),
        ];
        assert_eq!(
            ensure_unique_keys(&children),
            Err(RuntimeError::DuplicateKey { key: "a".into() })
        );
    }

    #[test]
    fn test_unkeyed_children_never_collide() {
        let children = vec![element("li").props(Props::new()).build(), element("li").build()];
        assert!(ensure_unique_keys(&children).is_ok());
        assert!(!has_keys(&children));
    }

    proptest! {
        #[test]
        fn prop_lis_is_longest_and_increasing(seq in prop::collection::vec(0usize..40, 0..40)) {
            let lis = longest_increasing_subsequence(&seq);
            prop_assert_eq!(lis.len(), lis_len_quadratic(&seq));
            for pair in lis.windows(2) {
                prop_assert!(pair[0] < pair[1]);
                prop_assert!(seq[pair[0]] < seq[pair[1]]);
            }
            for &i in &lis {
                prop_assert!(seq[i] != 0);
            }
        }
    }
}
