// ABOUTME: Thumbnail caching and generation on top of the protocol renderers
// ABOUTME: Re-exports the cache, eviction policies, and generator

pub mod cache;
pub mod generator;

pub use cache::{CacheStats, ClearOnOverflow, EvictionPolicy, LeastRecentlyUsed, ThumbnailCache};
pub use generator::ThumbnailGenerator;
