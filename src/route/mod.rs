//! Per-method route trie: static, named (`{name}`/`:name`), typed
//! (`{name:type}`), single-segment wildcard (`*`) and catch-all (`**`)
//! segments, matched in that priority order.

mod constraint;
mod node;
mod trie;

pub use constraint::{ParamConstraint, ParamKind};
pub use trie::{ParamVec, Trie};
