//! Workspace context: cache, rate limiter, and analysis
//!
//! The cache is built once by the host and shared through `Arc`; nothing
//! here reaches for a process-wide instance.

mod cache;
mod rate_limiter;
mod manager;
pub(crate) mod git;
pub(crate) mod scan;

pub use cache::{CacheEntry, ContextCache, DEFAULT_MAX_SIZE_BYTES, DEFAULT_TTL};
pub use rate_limiter::{RateLimiter, DEFAULT_LIMIT, DEFAULT_WINDOW};
pub use manager::{
    ContextError, ContextManager, ContextResult, DependencyInfo, WorkspaceContext,
    WORKSPACE_CONTEXT_KEY,
};
pub use git::{CommitInfo, GitContext};
