//! Page router with authentication guards.
//!
//! ARCHITECTURE
//! ============
//! Routes are a static table. Every navigation resolves the target
//! [`Location`], runs [`before_each`] against the session store, follows any
//! redirect (re-running the guard on the new target), commits the result to
//! history, resets scroll to the top and finally runs [`after_each`] to set the
//! document title. A redirect chain longer than [`MAX_REDIRECTS`] aborts with
//! [`RouterError::RedirectLoop`].

#[cfg(test)]
#[path = "router_test.rs"]
mod router_test;

use crate::session::SessionStore;

pub const APP_TITLE: &str = "Mini CMS";
pub const REDIRECT_QUERY: &str = "redirect";
pub const MAX_REDIRECTS: usize = 8;

// =============================================================================
// ROUTE TABLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    Login,
    Dashboard,
}

impl RouteName {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Login => "Login",
            Self::Dashboard => "Dashboard",
        }
    }

    #[must_use]
    pub fn route(self) -> &'static RouteDef {
        match self {
            Self::Home => &ROUTES[0],
            Self::Login => &ROUTES[1],
            Self::Dashboard => &ROUTES[2],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub title: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDef {
    pub path: &'static str,
    pub name: RouteName,
    pub meta: RouteMeta,
}

pub static ROUTES: [RouteDef; 3] = [
    RouteDef { path: "/", name: RouteName::Home, meta: RouteMeta { requires_auth: false, title: Some("Home") } },
    RouteDef {
        path: "/login",
        name: RouteName::Login,
        meta: RouteMeta { requires_auth: false, title: Some("Sign in") },
    },
    RouteDef {
        path: "/admin",
        name: RouteName::Dashboard,
        meta: RouteMeta { requires_auth: true, title: Some("Admin Dashboard") },
    },
];

/// Paths match without regard to ASCII case.
#[must_use]
pub fn match_route(path: &str) -> Option<&'static RouteDef> {
    ROUTES.iter().find(|route| route.path.eq_ignore_ascii_case(path))
}

// =============================================================================
// LOCATION
// =============================================================================

/// A resolved navigation target. Unknown paths have no name and default meta.
///
/// The query keeps its original order and repeated keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Path as requested, so `full_path` reproduces what the user asked for.
    pub path: String,
    pub name: Option<RouteName>,
    pub meta: RouteMeta,
    pub query: Vec<(String, String)>,
    /// Fragment including the leading `#`, or empty.
    pub hash: String,
}

impl Location {
    /// Parse `path?query#hash`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (without_hash, hash) = match raw.split_once('#') {
            Some((head, fragment)) => (head, format!("#{fragment}")),
            None => (raw, String::new()),
        };
        let (raw_path, raw_query) = without_hash.split_once('?').unwrap_or((without_hash, ""));

        let path = normalize_path(raw_path);
        let query = raw_query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(k), decode_component(v))
            })
            .collect();

        let route = match_route(&path);
        Self { path, name: route.map(|r| r.name), meta: route.map(|r| r.meta).unwrap_or_default(), query, hash }
    }

    #[must_use]
    pub fn named(name: RouteName) -> Self {
        let route = name.route();
        Self {
            path: route.path.to_owned(),
            name: Some(name),
            meta: route.meta,
            query: Vec::new(),
            hash: String::new(),
        }
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// First value for `key`.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Path, percent-encoded query string, then hash.
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return format!("{}{}", self.path, self.hash);
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}{}", self.path, self.hash)
    }

    /// Where to go once the user has signed in, from the `redirect` query.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        self.query_value(REDIRECT_QUERY).filter(|t| t.starts_with('/'))
    }
}

fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let with_slash = if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") };
    let stripped = with_slash.trim_end_matches('/');
    if stripped.is_empty() { "/".to_owned() } else { stripped.to_owned() }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or(spaced.clone(), std::borrow::Cow::into_owned)
}

// =============================================================================
// GUARDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(Location),
}

/// Protected routes need a session; signed-in users skip the login page.
#[must_use]
pub fn before_each(to: &Location, authenticated: bool) -> GuardDecision {
    if to.meta.requires_auth && !authenticated {
        return GuardDecision::Redirect(Location::named(RouteName::Login).with_query(REDIRECT_QUERY, to.full_path()));
    }
    if to.name == Some(RouteName::Login) && authenticated {
        return GuardDecision::Redirect(Location::named(RouteName::Dashboard));
    }
    GuardDecision::Allow
}

/// Document title for a committed navigation.
#[must_use]
pub fn after_each(to: &Location) -> String {
    match to.meta.title {
        Some(title) => format!("{title} | {APP_TITLE}"),
        None => APP_TITLE.to_owned(),
    }
}

// =============================================================================
// ROUTER
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("too many redirects while navigating to {path}")]
    RedirectLoop { path: String },
}

/// Outcome of a committed navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub from: Option<Location>,
    pub to: Location,
    /// The originally requested target when a guard redirected.
    pub redirected_from: Option<Location>,
}

#[derive(Debug)]
pub struct Router {
    session: SessionStore,
    history: Vec<Location>,
    index: usize,
    title: String,
    scroll_top: u64,
}

impl Router {
    #[must_use]
    pub fn new(session: SessionStore) -> Self {
        Self { session, history: Vec::new(), index: 0, title: APP_TITLE.to_owned(), scroll_top: 0 }
    }

    #[must_use]
    pub fn current(&self) -> Option<&Location> {
        self.history.get(self.index)
    }

    #[must_use]
    pub fn document_title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn scroll_top(&self) -> u64 {
        self.scroll_top
    }

    pub fn scroll_to(&mut self, top: u64) {
        self.scroll_top = top;
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Navigate to `raw` and add a history entry.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RedirectLoop`] if guards keep redirecting.
    pub fn push(&mut self, raw: &str) -> Result<Navigation, RouterError> {
        let (to, redirected_from) = self.guard(Location::parse(raw))?;
        let from = self.current().cloned();
        if !self.history.is_empty() {
            self.history.truncate(self.index + 1);
        }
        self.history.push(to.clone());
        self.index = self.history.len() - 1;
        Ok(self.commit(from, to, redirected_from))
    }

    /// Navigate to `raw`, overwriting the current history entry.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RedirectLoop`] if guards keep redirecting.
    pub fn replace(&mut self, raw: &str) -> Result<Navigation, RouterError> {
        let (to, redirected_from) = self.guard(Location::parse(raw))?;
        let from = self.current().cloned();
        match self.history.get_mut(self.index) {
            Some(entry) => *entry = to.clone(),
            None => self.history.push(to.clone()),
        }
        Ok(self.commit(from, to, redirected_from))
    }

    /// Go back one entry, through the guards. `None` at the start of history.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::RedirectLoop`] if guards keep redirecting.
    pub fn back(&mut self) -> Result<Option<Navigation>, RouterError> {
        if self.index == 0 {
            return Ok(None);
        }
        let target = self.history[self.index - 1].clone();
        let (to, redirected_from) = self.guard(target)?;
        let from = self.current().cloned();
        self.index -= 1;
        if redirected_from.is_some() {
            self.history[self.index] = to.clone();
        }
        Ok(Some(self.commit(from, to, redirected_from)))
    }

    fn guard(&self, target: Location) -> Result<(Location, Option<Location>), RouterError> {
        let authenticated = self.session.is_authenticated();
        let mut to = target.clone();
        for _ in 0..=MAX_REDIRECTS {
            match before_each(&to, authenticated) {
                GuardDecision::Allow => {
                    let redirected_from = (to != target).then_some(target);
                    return Ok((to, redirected_from));
                }
                GuardDecision::Redirect(next) => {
                    tracing::debug!(from = %to.full_path(), to = %next.full_path(), "navigation redirected");
                    to = next;
                }
            }
        }
        Err(RouterError::RedirectLoop { path: target.full_path() })
    }

    fn commit(&mut self, from: Option<Location>, to: Location, redirected_from: Option<Location>) -> Navigation {
        self.scroll_top = 0;
        self.title = after_each(&to);
        Navigation { from, to, redirected_from }
    }
}
