//! Patch and shape flags.
//!
//! Patch flags are compile-time hints describing which parts of a node may
//! change between renders. The renderer patches only the flagged categories.

use bitflags::bitflags;

bitflags! {
    /// Which parts of a node are dynamic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatchFlags: u16 {
        /// Text children.
        const TEXT = 1 << 0;
        /// The `class` prop.
        const CLASS = 1 << 1;
        /// The `style` prop.
        const STYLE = 1 << 2;
        /// Props named in `dynamic_props`.
        const PROPS = 1 << 3;
        /// Props with dynamic keys; requires a full props diff.
        const FULL_PROPS = 1 << 4;
        /// Only event listeners are dynamic.
        const HYDRATE_EVENTS = 1 << 5;
        /// Fragment whose children order never changes.
        const STABLE_FRAGMENT = 1 << 6;
        /// Fragment with keyed children.
        const KEYED_FRAGMENT = 1 << 7;
        /// Fragment with unkeyed children.
        const UNKEYED_FRAGMENT = 1 << 8;
        /// Needs patching for non-prop reasons (refs, directives).
        const NEED_PATCH = 1 << 9;
        /// Component with slots that may change.
        const DYNAMIC_SLOTS = 1 << 10;
        /// Static subtree, never patched.
        const HOISTED = 1 << 14;
        /// Leave optimized mode; diff this subtree fully.
        const BAIL = 1 << 15;
    }
}

impl PatchFlags {
    /// Every flag that marks a dynamic category.
    pub const DYNAMIC: Self = Self::from_bits_retain((1 << 11) - 1);

    /// Has at least one dynamic category and is not a special marker.
    pub fn is_dynamic(self) -> bool {
        !self.intersects(Self::HOISTED | Self::BAIL) && self.intersects(Self::DYNAMIC)
    }

    /// Whether an element with these flags is recorded by the enclosing block.
    pub fn tracks_in_block(self) -> bool {
        self.is_dynamic() && self != Self::HYDRATE_EVENTS
    }
}

bitflags! {
    /// What a node is and what its children are.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u8 {
        const ELEMENT = 1 << 0;
        const COMPONENT = 1 << 1;
        const TEXT_CHILDREN = 1 << 2;
        const ARRAY_CHILDREN = 1 << 3;
        const SLOTS_CHILDREN = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PatchFlags::TEXT, true)]
    #[case(PatchFlags::CLASS | PatchFlags::STYLE, true)]
    #[case(PatchFlags::NEED_PATCH, true)]
    #[case(PatchFlags::HYDRATE_EVENTS, false)]
    #[case(PatchFlags::HYDRATE_EVENTS | PatchFlags::PROPS, true)]
    #[case(PatchFlags::HOISTED, false)]
    #[case(PatchFlags::BAIL, false)]
    #[case(PatchFlags::empty(), false)]
    fn test_tracks_in_block(#[case] flags: PatchFlags, #[case] tracked: bool) {
        assert_eq!(flags.tracks_in_block(), tracked);
    }

    #[test]
    fn test_dynamic_mask_excludes_markers() {
        assert!(PatchFlags::DYNAMIC.contains(PatchFlags::DYNAMIC_SLOTS));
        assert!(!PatchFlags::DYNAMIC.intersects(PatchFlags::HOISTED | PatchFlags::BAIL));
        assert!(!(PatchFlags::TEXT | PatchFlags::BAIL).is_dynamic());
    }
}
