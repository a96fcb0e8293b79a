pub mod case;
pub mod exec;
pub mod storage;

pub use case::{case_fingerprint, well_form_bytes, well_form_text};
pub use storage::{BlobStore, ContentHash, FilesystemBlobStore, StorageError};
