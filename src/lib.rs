pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod query;
pub mod registry;
pub mod scanning;
pub mod service;
pub mod types;

pub use config::Settings;
pub use error::{Error, Result};
pub use index::{BuildStats, DependencyIndex, IndexBuilder, SearchResult};
pub use query::{Query, parse_query};
pub use registry::DocumentRegistry;
pub use scanning::{ReferenceGraph, ReferenceScanner, ScanStats};
pub use service::{DependencyService, NoHostResolver, PathResolver};
pub use types::{AssetId, DocId};
