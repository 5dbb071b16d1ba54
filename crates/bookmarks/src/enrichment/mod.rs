//! Link enrichment module.
//!
//! Expands t.co short links to their destinations before export.

mod links;

pub use links::{
    HttpRedirectFollower, LinkResolver, RedirectFollower, ResolveError, ResolvedLinkMap,
    ResolverConfig,
};
