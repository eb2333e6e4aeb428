#![doc = include_str!("../README.md")]

// Core modules
pub mod cache;
pub mod errors;
pub mod global;
pub mod platform;
pub mod store;

// State containers
pub mod callbacks;
pub mod filter;
pub mod infinite;
pub mod mutation;
pub mod pagination;
pub mod query;
pub mod state;
pub mod use_mutation;
pub mod use_search;
pub mod utils;

pub mod prelude {
    //! The prelude exports the types needed to drive queries and mutations.

    // Cache and its process-wide instance
    pub use crate::cache::QueryCache;
    pub use crate::global::{get_global_cache, init_global_cache};
    pub use crate::platform::{Clock, ManualClock, SystemClock};

    // Errors and handlers
    pub use crate::callbacks::Callbacks;
    pub use crate::errors::{QueryError, QueryResult};

    // Containers
    pub use crate::infinite::{
        InfiniteQuery, InfiniteQueryOptions, PageRequest, PageResponse, PagedItem,
    };
    pub use crate::mutation::{MutationParams, MutationStore, MutationType};
    pub use crate::pagination::PaginationQuery;
    pub use crate::query::{CacheOptions, QueryStore};
    pub use crate::use_mutation::UseMutation;
    pub use crate::use_search::UseSearch;

    // State and merge helpers
    pub use crate::filter::Filter;
    pub use crate::state::RequestState;
    pub use crate::store::Store;
    pub use crate::utils::Identifiable;
}
