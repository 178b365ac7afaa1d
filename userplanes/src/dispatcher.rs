use crate::errors::Outcome;
use crate::handler::Handler;
use hyper::Method;
use indexmap::IndexMap;
use std::sync::Arc;

/// Last path segment of a template route, standing in for a resource id
pub const ID_PLACEHOLDER: &str = "UUID";

/// Handler selected for one request
#[derive(Clone)]
pub struct Route {
    pub handler: Arc<dyn Handler>,
    /// Trailing path segment when a template route matched
    pub id: Option<String>,
}

#[derive(Default)]
struct MethodRoutes {
    requires_json: bool,
    handlers: IndexMap<String, Arc<dyn Handler>>,
}

/// Maps method and path to a registered handler.
///
/// Paths are registered relative to the base URI, e.g. `userplanes` and
/// `userplanes/UUID`. Lookup tries the exact path first, then the template
/// obtained by replacing the segment after the last `/` with `UUID`. Only
/// one level is templated, so `userplanes/5/xxx` never matches.
pub struct Dispatcher {
    base_uri: String,
    routes: IndexMap<Method, MethodRoutes>,
}

impl Dispatcher {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
            routes: IndexMap::new(),
        }
    }

    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        self.routes
            .entry(method)
            .or_default()
            .handlers
            .insert(path.to_string(), handler);
        self
    }

    /// Requests with `method` must declare an `application/json` body.
    pub fn require_json(&mut self, method: Method) -> &mut Self {
        self.routes.entry(method).or_default().requires_json = true;
        self
    }

    /// Registered routes as (method, path, handler name), grouped by method
    /// in the order each method was first registered
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str, &'static str)> {
        self.routes.iter().flat_map(|(method, routes)| {
            routes
                .handlers
                .iter()
                .map(move |(path, handler)| (method, path.as_str(), handler.name()))
        })
    }

    pub fn resolve(
        &self,
        method: &Method,
        content_type: Option<&str>,
        path: &str,
    ) -> Result<Route, Outcome> {
        let routes = self.routes.get(method).ok_or(Outcome::DispatchNoType)?;
        if routes.requires_json && !content_type.is_some_and(is_json) {
            return Err(Outcome::DispatchNoType);
        }

        let action = path
            .strip_prefix(self.base_uri.as_str())
            .ok_or(Outcome::DispatchNoTarget)?;

        if !is_template(action)
            && let Some(handler) = routes.handlers.get(action)
        {
            return Ok(Route {
                handler: handler.clone(),
                id: None,
            });
        }

        let (prefix, segment) = action.rsplit_once('/').ok_or(Outcome::DispatchNoTarget)?;
        let template = format!("{prefix}/{ID_PLACEHOLDER}");
        let handler = routes
            .handlers
            .get(&template)
            .ok_or(Outcome::DispatchNoTarget)?;

        if segment.is_empty() {
            return Err(Outcome::DispatchNoTarget);
        }

        Ok(Route {
            handler: handler.clone(),
            id: Some(segment.to_string()),
        })
    }
}

fn is_template(path: &str) -> bool {
    path.rsplit_once('/')
        .is_some_and(|(_, last)| last == ID_PLACEHOLDER)
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case("application/json"))
}
