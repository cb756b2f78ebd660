pub mod archive;
pub mod history;
pub mod kv;

pub use archive::{content_hash, read_image_bytes, ImageArchive};
pub use history::{HistoryStore, HISTORY_KEY};
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
