//! Document storage core: naming, version metadata, files, and the engine
//! that keeps them consistent.

pub mod engine;
pub mod error;
pub mod locks;
pub mod naming;
pub mod storage;
pub mod versions;

pub use engine::{DeleteReport, DocumentEngine, DocumentSummary, DownloadedDocument};
pub use error::{DocumentError, TOKEN_EXPIRED_MESSAGE};
pub use naming::{parse_physical_key, to_physical_key, PhysicalKey};
pub use storage::{FileStore, LocalFileStore, StorageError};
pub use versions::{MemoryVersionRepository, PgVersionRepository, VersionRepository, VersionStore};
