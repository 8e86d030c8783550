//! Authentication collaborator contract.

use futures_util::future::BoxFuture;

use crate::http::Exchange;

/// Answers whether the client behind an exchange is logged in.
pub trait AuthProvider: Send + Sync {
    fn has_login<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, bool>;

    /// Where to send clients that are not logged in.
    fn login_url(&self, ex: &Exchange) -> String;
}

/// Provider used when nothing else is registered: nobody is logged in.
#[derive(Debug, Clone)]
pub struct AnonymousAuth {
    login_url: String,
}

impl AnonymousAuth {
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
        }
    }
}

impl Default for AnonymousAuth {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl AuthProvider for AnonymousAuth {
    fn has_login<'a>(&'a self, _ex: &'a Exchange) -> BoxFuture<'a, bool> {
        Box::pin(async { false })
    }

    fn login_url(&self, _ex: &Exchange) -> String {
        self.login_url.clone()
    }
}

/// Logged in when a request header is present; handy for header-based SSO
/// fronts and tests.
#[derive(Debug, Clone)]
pub struct HeaderAuth {
    header: &'static str,
    login_url: String,
}

impl HeaderAuth {
    pub fn new(header: &'static str, login_url: impl Into<String>) -> Self {
        Self {
            header,
            login_url: login_url.into(),
        }
    }
}

impl AuthProvider for HeaderAuth {
    fn has_login<'a>(&'a self, ex: &'a Exchange) -> BoxFuture<'a, bool> {
        let present = ex.header(self.header).is_some_and(|v| !v.is_empty());
        Box::pin(async move { present })
    }

    fn login_url(&self, _ex: &Exchange) -> String {
        self.login_url.clone()
    }
}
