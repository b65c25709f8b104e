//! The tagged set of platform middlewares.

use edge_cache::CacheMiddleware;
use edge_core::{BoxHandler, BoxMiddleware, Middleware};
use edge_observability::ErrorHandlerMiddleware;
use edge_rewrite::{HeadersMiddleware, RedirectMiddleware};
use edge_security::CorsMiddleware;

/// One platform middleware, or a custom one.
///
/// Wrapping delegates to the variant, so a pipeline can hold any mix of
/// these next to each other.
#[derive(Clone)]
pub enum EdgeMiddleware {
    Cache(CacheMiddleware),
    Cors(CorsMiddleware),
    Headers(HeadersMiddleware),
    Error(ErrorHandlerMiddleware),
    Redirect(RedirectMiddleware),
    Custom(BoxMiddleware),
}

impl EdgeMiddleware {
    fn inner(&self) -> &dyn Middleware {
        match self {
            Self::Cache(m) => m,
            Self::Cors(m) => m,
            Self::Headers(m) => m,
            Self::Error(m) => m,
            Self::Redirect(m) => m,
            Self::Custom(m) => m.as_ref(),
        }
    }
}

impl Middleware for EdgeMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self.inner().wrap(next)
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}

impl std::fmt::Debug for EdgeMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EdgeMiddleware").field(&self.name()).finish()
    }
}

impl From<CacheMiddleware> for EdgeMiddleware {
    fn from(m: CacheMiddleware) -> Self {
        Self::Cache(m)
    }
}

impl From<CorsMiddleware> for EdgeMiddleware {
    fn from(m: CorsMiddleware) -> Self {
        Self::Cors(m)
    }
}

impl From<HeadersMiddleware> for EdgeMiddleware {
    fn from(m: HeadersMiddleware) -> Self {
        Self::Headers(m)
    }
}

impl From<ErrorHandlerMiddleware> for EdgeMiddleware {
    fn from(m: ErrorHandlerMiddleware) -> Self {
        Self::Error(m)
    }
}

impl From<RedirectMiddleware> for EdgeMiddleware {
    fn from(m: RedirectMiddleware) -> Self {
        Self::Redirect(m)
    }
}

impl From<BoxMiddleware> for EdgeMiddleware {
    fn from(m: BoxMiddleware) -> Self {
        Self::Custom(m)
    }
}
