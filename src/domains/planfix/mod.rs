//! Planfix collaborators: REST client, request cache, directory resolver
//! and object metadata cache.

pub mod cache;
pub mod client;
pub mod directory;
mod error;
pub mod objects;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use cache::{CacheProvider, MemoryCache, RequestCache, SqliteCache};
pub use client::{CachingApi, HttpMethod, PlanfixApi, PlanfixClient, PlanfixRequest, SharedApi};
pub use directory::{Directory, DirectoryEntry, DirectoryResolver};
pub use error::{CacheError, PlanfixError, PlanfixResult};
pub use objects::{ObjectField, ObjectsCache, PlanfixObject};
