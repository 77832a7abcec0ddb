//! 评论树的组装与渲染

pub mod json;
pub mod render;
pub mod thread;

pub use render::{ThreadRenderer, ThreadView};
pub use thread::{ThreadCache, assemble};
