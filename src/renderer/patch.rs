//! Patch dispatch, elements, text, comments and fragments.

use super::adapter::{HostNode, PlatformAdapter};
use super::RendererState;
use crate::component::InstanceId;
use crate::error::Result;
use crate::vnode::{Children, PatchFlags, Props, VNode, VNodeKind};

/// Keep the first error while continuing teardown.
pub(crate) fn keep_first(slot: &mut Result<()>, next: Result<()>) {
    if slot.is_ok() {
        if let Err(err) = next {
            *slot = Err(err);
        }
    }
}

impl<A: PlatformAdapter + 'static> RendererState<A> {
    /// Reconcile `old` into `new` under `container`.
    pub(crate) fn patch(
        &mut self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        let mut old = old;
        let mut anchor = anchor;
        if let Some(prev) = old {
            if prev.ptr_eq(new) {
                return Ok(());
            }
            if !prev.is_same_type(new) {
                anchor = self.next_host_node(prev);
                self.unmount(prev, parent, true)?;
                old = None;
            }
        }

        let optimized = optimized && self.block_tree && !new.patch_flag().contains(PatchFlags::BAIL);
        match new.kind() {
            VNodeKind::Text => self.process_text(old, new, container, anchor),
            VNodeKind::Comment => self.process_comment(old, new, container, anchor),
            VNodeKind::Fragment => self.process_fragment(old, new, container, anchor, parent, optimized),
            VNodeKind::Element(_) => match old {
                None => self.mount_element(new, container, anchor, parent, optimized),
                Some(prev) => self.patch_element(prev, new, parent, optimized),
            },
            VNodeKind::Component(_) => match old {
                None => self.mount_component(new, container, anchor, parent),
                Some(prev) => self.update_component(prev, new, optimized),
            },
        }
    }

    /// Dynamic children to use for `vnode`, if block patching applies.
    pub(crate) fn block_children<'v>(&self, vnode: &'v VNode) -> Option<&'v [VNode]> {
        if !self.block_tree || vnode.patch_flag().contains(PatchFlags::BAIL) {
            return None;
        }
        vnode.dynamic_children()
    }

    // =========================================================================
    // Text & Comment
    // =========================================================================

    fn process_text(&mut self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        match old {
            None => {
                let el = self.adapter.create_text(new.text_content())?;
                new.set_el(Some(el));
                self.adapter.insert(el, container, anchor)?;
            }
            Some(prev) => {
                let el = prev.el();
                new.set_el(el);
                if let Some(el) = el {
                    if prev.text_content() != new.text_content() {
                        self.adapter.set_text(el, new.text_content())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn process_comment(&mut self, old: Option<&VNode>, new: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        match old {
            None => {
                let el = self.adapter.create_comment(new.text_content())?;
                new.set_el(Some(el));
                self.adapter.insert(el, container, anchor)?;
            }
            // Comments are static.
            Some(prev) => new.set_el(prev.el()),
        }
        Ok(())
    }

    // =========================================================================
    // Fragment
    // =========================================================================

    fn process_fragment(
        &mut self,
        old: Option<&VNode>,
        new: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        let Some(prev) = old else {
            let start = self.adapter.create_text("")?;
            let end = self.adapter.create_text("")?;
            new.set_el(Some(start));
            new.set_anchor(Some(end));
            self.adapter.insert(start, container, anchor)?;
            self.adapter.insert(end, container, anchor)?;
            return self.mount_children(new.children().nodes(), container, Some(end), parent, optimized);
        };

        new.set_el(prev.el());
        new.set_anchor(prev.anchor());
        let stable = new.patch_flag().contains(PatchFlags::STABLE_FRAGMENT);
        match (self.block_children(prev), self.block_children(new)) {
            (Some(old_dynamic), Some(new_dynamic)) if stable && old_dynamic.len() == new_dynamic.len() => {
                self.patch_block_children(old_dynamic, new_dynamic, container, parent)?;
                inherit_static_hosts(prev, new);
                Ok(())
            }
            _ => self.patch_children(prev, new, container, prev.anchor(), parent, optimized),
        }
    }

    // =========================================================================
    // Element
    // =========================================================================

    fn mount_element(
        &mut self,
        vnode: &VNode,
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        let el = self.adapter.create_element(vnode.tag().unwrap_or_default())?;
        vnode.set_el(Some(el));
        match vnode.children() {
            Children::Text(text) => self.adapter.set_element_text(el, text)?,
            Children::Nodes(children) => {
                self.mount_children(children, el, None, parent, optimized && vnode.is_block())?;
            }
            Children::None | Children::Slots(_) => {}
        }
        for (key, value) in vnode.props() {
            self.adapter.patch_prop(el, key, None, Some(value))?;
        }
        self.adapter.insert(el, container, anchor)?;
        Ok(())
    }

    pub(crate) fn mount_children(
        &mut self,
        children: &[VNode],
        container: HostNode,
        anchor: Option<HostNode>,
        parent: Option<InstanceId>,
        optimized: bool,
    ) -> Result<()> {
        super::keyed::ensure_unique_keys(children)?;
        for child in children {
            self.patch(None, child, container, anchor, parent, optimized)?;
        }
        Ok(())
    }

    fn patch_element(&mut self, prev: &VNode, new: &VNode, parent: Option<InstanceId>, optimized: bool) -> Result<()> {
        let Some(el) = prev.el() else {
            return Ok(());
        };
        new.set_el(Some(el));
        let flag = new.patch_flag();
        let new_dynamic = self.block_children(new);

        match (self.block_children(prev), new_dynamic) {
            (Some(old_dynamic), Some(next_dynamic)) if old_dynamic.len() == next_dynamic.len() => {
                self.patch_block_children(old_dynamic, next_dynamic, el, parent)?;
                inherit_static_hosts(prev, new);
            }
            (_, Some(_)) => {
                tracing::debug!(host = %el, "block shape changed, diffing children fully");
                self.patch_children(prev, new, el, None, parent, false)?;
            }
            (_, None) if !optimized => self.patch_children(prev, new, el, None, parent, false)?,
            // Static children of a dynamic node inside a block.
            (_, None) => {}
        }

        if self.block_tree && flag.is_dynamic() {
            if flag.contains(PatchFlags::FULL_PROPS) {
                self.patch_props(el, prev.props(), new.props())?;
            } else {
                if flag.contains(PatchFlags::CLASS) {
                    self.patch_named_prop(el, "class", prev, new)?;
                }
                if flag.contains(PatchFlags::STYLE) {
                    self.patch_named_prop(el, "style", prev, new)?;
                }
                if flag.contains(PatchFlags::PROPS) {
                    for key in new.dynamic_props() {
                        self.patch_named_prop(el, key, prev, new)?;
                    }
                }
            }
            if flag.contains(PatchFlags::TEXT) {
                if let (Some(old_text), Some(new_text)) = (prev.children().text(), new.children().text()) {
                    if old_text != new_text {
                        self.adapter.set_element_text(el, new_text)?;
                    }
                }
            }
        } else if !optimized && new_dynamic.is_none() {
            self.patch_props(el, prev.props(), new.props())?;
        }
        Ok(())
    }

    fn patch_named_prop(&mut self, el: HostNode, key: &str, prev: &VNode, new: &VNode) -> Result<()> {
        let before = prev.prop(key);
        let after = new.prop(key);
        if before != after {
            self.adapter.patch_prop(el, key, before, after)?;
        }
        Ok(())
    }

    /// Full props diff.
    fn patch_props(&mut self, el: HostNode, old: &Props, new: &Props) -> Result<()> {
        for (key, next) in new {
            let prev = old.get(key);
            if prev != Some(next) {
                self.adapter.patch_prop(el, key, prev, Some(next))?;
            }
        }
        for (key, prev) in old {
            if !new.contains_key(key) {
                self.adapter.patch_prop(el, key, Some(prev), None)?;
            }
        }
        Ok(())
    }

    /// Patch two dynamic-children lists pairwise.
    fn patch_block_children(
        &mut self,
        old: &[VNode],
        new: &[VNode],
        fallback: HostNode,
        parent: Option<InstanceId>,
    ) -> Result<()> {
        for (prev, next) in old.iter().zip(new) {
            // Nodes that may be replaced or that span several host nodes need
            // their real parent; everything else patches in place.
            let needs_parent = prev.is_fragment() || prev.is_component() || !prev.is_same_type(next);
            let container = if needs_parent {
                self.first_host_node(prev)
                    .and_then(|node| self.adapter.parent_node(node))
                    .unwrap_or(fallback)
            } else {
                fallback
            };
            self.patch(Some(prev), next, container, None, parent, true)?;
        }
        Ok(())
    }

    // =========================================================================
    // Unmount & Move
    // =========================================================================

    /// Tear down `vnode`. Components are disposed deepest first; host nodes
    /// are removed only at the top of the removed subtree when `do_remove`.
    pub(crate) fn unmount(&mut self, vnode: &VNode, parent: Option<InstanceId>, do_remove: bool) -> Result<()> {
        let mut result = Ok(());
        match vnode.kind() {
            VNodeKind::Component(_) => {
                if let Some(id) = vnode.component() {
                    result = self.unmount_component(id, do_remove);
                }
            }
            VNodeKind::Fragment => {
                for child in vnode.children().nodes() {
                    let next = self.unmount(child, parent, do_remove);
                    keep_first(&mut result, next);
                }
                if do_remove {
                    for host in [vnode.el(), vnode.anchor()].into_iter().flatten() {
                        keep_first(&mut result, self.adapter.remove(host).map_err(Into::into));
                    }
                }
            }
            VNodeKind::Element(_) => {
                for child in vnode.children().nodes() {
                    let next = self.unmount(child, parent, false);
                    keep_first(&mut result, next);
                }
                if do_remove {
                    if let Some(el) = vnode.el() {
                        keep_first(&mut result, self.adapter.remove(el).map_err(Into::into));
                    }
                }
            }
            VNodeKind::Text | VNodeKind::Comment => {
                if do_remove {
                    if let Some(el) = vnode.el() {
                        result = self.adapter.remove(el).map_err(Into::into);
                    }
                }
            }
        }
        result
    }

    pub(crate) fn unmount_children(&mut self, children: &[VNode], parent: Option<InstanceId>, do_remove: bool) -> Result<()> {
        let mut result = Ok(());
        for child in children {
            let next = self.unmount(child, parent, do_remove);
            keep_first(&mut result, next);
        }
        result
    }

    /// Re-insert every host node of `vnode` before `anchor`.
    pub(crate) fn move_vnode(&mut self, vnode: &VNode, container: HostNode, anchor: Option<HostNode>) -> Result<()> {
        match vnode.kind() {
            VNodeKind::Component(_) => {
                if let Some(subtree) = self.component_subtree(vnode) {
                    self.move_vnode(&subtree, container, anchor)?;
                }
            }
            VNodeKind::Fragment => {
                if let Some(start) = vnode.el() {
                    self.adapter.insert(start, container, anchor)?;
                }
                for child in vnode.children().nodes() {
                    self.move_vnode(child, container, anchor)?;
                }
                if let Some(end) = vnode.anchor() {
                    self.adapter.insert(end, container, anchor)?;
                }
            }
            _ => {
                if let Some(el) = vnode.el() {
                    self.adapter.insert(el, container, anchor)?;
                }
            }
        }
        Ok(())
    }

    fn component_subtree(&self, vnode: &VNode) -> Option<VNode> {
        let id = vnode.component()?;
        self.instances.get(id)?.subtree().cloned()
    }

    /// First host node `vnode` occupies.
    pub(crate) fn first_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.kind() {
            VNodeKind::Component(_) => {
                let subtree = self.component_subtree(vnode)?;
                self.first_host_node(&subtree)
            }
            _ => vnode.el(),
        }
    }

    /// Host node right after everything `vnode` occupies.
    pub(crate) fn next_host_node(&self, vnode: &VNode) -> Option<HostNode> {
        match vnode.kind() {
            VNodeKind::Component(_) => {
                let subtree = self.component_subtree(vnode)?;
                self.next_host_node(&subtree)
            }
            VNodeKind::Fragment => self.adapter.next_sibling(vnode.anchor()?),
            _ => self.adapter.next_sibling(vnode.el()?),
        }
    }
}

/// After a block patch, static nodes of the new tree were never visited.
/// Copy their host handles from the old tree so later moves and removals
/// can find them.
fn inherit_static_hosts(prev: &VNode, new: &VNode) {
    let (Children::Nodes(old_children), Children::Nodes(new_children)) = (prev.children(), new.children()) else {
        return;
    };
    if old_children.len() != new_children.len() {
        return;
    }
    for (o, n) in old_children.iter().zip(new_children) {
        if o.ptr_eq(n) || !o.is_same_type(n) || n.is_component() {
            continue;
        }
        if n.el().is_none() {
            n.set_el(o.el());
            n.set_anchor(o.anchor());
        }
        inherit_static_hosts(o, n);
    }
}
