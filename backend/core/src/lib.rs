pub mod error;
pub mod escape;
pub mod kv;
pub mod query;
pub mod selector;
pub mod snapshot;
pub mod tree;

pub use error::{Result, VeilError};
pub use escape::escape_identifier;
pub use kv::{FileKvStore, KeyValueStore, MemoryKvStore};
pub use selector::{segment_count, SelectorList};
pub use snapshot::{NodeSnapshot, PageSnapshot};
pub use tree::{Document, Element, HitTest, InlineDisplay, NodeId, Rect, DISPLAY_NONE};
