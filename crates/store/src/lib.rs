pub mod repositories;

pub use repositories::{
    resolve_catalog_entries, Catalog, InMemoryCatalog, InMemoryLineRepository, LineRepository,
    RepositoryError,
};
