//! Route table for the Kiln framework.
//!
//! Routes bind a path pattern and a method set to a handler. Patterns are
//! `/`-separated segments, each a literal or a `{name}` placeholder.
//!
//! # Matching
//!
//! Both the pattern and the request path are split on `/`. The segment
//! counts must be equal, literals must match exactly and placeholders
//! capture whatever segment is in their position. There is no
//! normalization (`/users/` and `/users` are different paths) and no
//! precedence beyond registration order: the first route that accepts the
//! method and path wins.
//!
//! ```
//! use kiln_core::{HandlerError, Method, Request, Response};
//! use kiln_router::Router;
//!
//! let mut router = Router::new();
//! router
//!     .add_route(
//!         "/api/users/{id}",
//!         |request: Request| async move {
//!             let id = request.path_param("id").unwrap_or_default().to_string();
//!             Ok::<_, HandlerError>(Response::text(id))
//!         },
//!         [Method::GET, Method::HEAD],
//!     )
//!     .unwrap();
//!
//! let matched = router.match_route(&Method::GET, "/api/users/42").unwrap();
//! assert_eq!(matched.route.pattern().as_str(), "/api/users/{id}");
//! assert_eq!(matched.params.get("id"), Some("42"));
//! assert!(router.match_route(&Method::GET, "/api/users/42/").is_none());
//! ```

#![doc(html_root_url = "https://docs.rs/kiln-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod pattern;
mod router;

pub use pattern::{PathPattern, Segment};
pub use router::{Route, RouteId, Router};

use kiln_core::Params;
use thiserror::Error;

/// A matched route with its extracted parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    /// The route that matched.
    pub route: &'a Route,
    /// Values captured by the pattern's placeholders.
    pub params: Params,
}

/// Errors raised while registering routes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// The pattern does not start with `/`.
    #[error("route pattern '{pattern}' must start with '/'")]
    MissingLeadingSlash {
        /// The rejected pattern.
        pattern: String,
    },

    /// A segment has a malformed placeholder or a stray brace.
    #[error("invalid segment '{segment}' in route pattern '{pattern}'")]
    InvalidSegment {
        /// The rejected pattern.
        pattern: String,
        /// The offending segment.
        segment: String,
    },

    /// Two placeholders share a name.
    #[error("duplicate placeholder '{name}' in route pattern '{pattern}'")]
    DuplicateParam {
        /// The rejected pattern.
        pattern: String,
        /// The repeated name.
        name: String,
    },
}
