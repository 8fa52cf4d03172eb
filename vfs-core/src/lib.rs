pub mod error;
pub use error::{VfsError, VfsResult};

pub mod config;
pub use config::Config;

pub mod logging;

pub mod backends;
pub use backends::{FileBody, FileContent, StorageBackend};

pub mod cache {
    pub mod cache_manager;
    pub use cache_manager::{CacheStatsSnapshot, DirectoryCache, ListingKey};
}

pub mod fs {
    pub mod decompress;

    pub mod dir_entry;
    pub use dir_entry::DirectoryEntry;

    pub mod listing;

    pub mod paths;
}

pub mod model {
    pub mod storage_root;
    pub use storage_root::{BackendKind, BackendSpec, StorageRoot};
}

pub mod net {
    pub mod http;
    pub use http::{HttpClient, HttpResponse, UreqClient};
}

pub mod operators {
    pub mod config_discovery;
    pub use config_discovery::{ListDirectory, YamlConfigSet};

    pub mod file_system_operator;
    pub use file_system_operator::{ByteStream, FileSystemOperator};
}

pub mod util {
    pub mod suspend;
}

pub use fs::DirectoryEntry;
pub use model::StorageRoot;
pub use operators::FileSystemOperator;
