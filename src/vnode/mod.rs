//! VNode model.
//!
//! - [`node`] - vnodes, keys, children and slots, plus the builders
//! - [`props`] - prop values
//! - [`flags`] - patch flags and shape flags
//! - [`block`] - block tree collection
//! - [`normalize`] - class/style normalization

pub mod block;
pub mod flags;
pub mod node;
pub mod normalize;
pub mod props;

pub use block::{block, block_depth, create_block, is_tracking, open_block, BlockGuard};
pub use flags::{PatchFlags, ShapeFlags};
pub use node::{
    comment, component, create_vnode, dynamic_text, element, fragment, fragment_builder, h,
    h_component, text, Children, Key, Slot, Slots, Tag, VNode, VNodeBuilder, VNodeKind,
};
pub use normalize::{normalize_class, normalize_style, parse_string_style, stringify_style, StyleMap};
pub use props::{props, EventHandler, PropValue, Props};
