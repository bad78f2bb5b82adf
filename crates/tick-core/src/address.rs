//! Bookmarkable UI state: which screen is shown and with which filter.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use url::form_urlencoded;

use crate::filter::{FilterSelection, select_filter};

const FILTER_PARAM: &str = "filter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    List,
    Stats,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::List => "/",
            Route::Stats => "/stats",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    route: Route,
    query: Vec<(String, String)>,
}

impl Address {
    pub fn list(filter: FilterSelection) -> Self {
        Self::default().with_filter(filter)
    }

    pub fn stats() -> Self {
        Self {
            route: Route::Stats,
            query: vec![],
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Filter read from the query on each call, never cached.
    pub fn filter(&self) -> FilterSelection {
        select_filter(self.param(FILTER_PARAM))
    }

    /// Same screen and other parameters, new `filter` value.
    pub fn with_filter(&self, filter: FilterSelection) -> Self {
        let mut next = self.clone();
        next.query.retain(|(k, _)| k != FILTER_PARAM);
        next.query
            .push((FILTER_PARAM.to_string(), filter.as_token().to_string()));
        next
    }

    pub fn with_route(&self, route: Route) -> Self {
        Self {
            route,
            query: self.query.clone(),
        }
    }
}

impl FromStr for Address {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (path, query) = match trimmed.split_once('?') {
            Some((path, query)) => (path, query),
            None => (trimmed, ""),
        };

        let route = match path.trim_end_matches('/') {
            "" => Route::List,
            "/stats" | "stats" => Route::Stats,
            other => return Err(anyhow!("unknown route: {other}")),
        };

        let query = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self { route, query })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.route.path())?;
        if self.query.is_empty() {
            return Ok(());
        }
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        write!(f, "?{query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Address {
        raw.parse().expect("valid address")
    }

    #[test]
    fn parses_routes_and_filter() {
        assert_eq!(parse("/").route(), Route::List);
        assert_eq!(parse("").route(), Route::List);
        assert_eq!(parse("/stats").route(), Route::Stats);
        assert_eq!(parse("stats/").route(), Route::Stats);
        assert_eq!(parse("/?filter=completed").filter(), FilterSelection::Completed);
        assert_eq!(parse("?filter=active").filter(), FilterSelection::Active);
        assert_eq!(parse("/?filter=weird").filter(), FilterSelection::All);
        assert_eq!(parse("/").filter(), FilterSelection::All);
        assert!("/settings".parse::<Address>().is_err());
    }

    #[test]
    fn changing_filter_keeps_route_and_other_params() {
        let address = parse("/?sort=created&filter=active");
        let next = address.with_filter(FilterSelection::Completed);
        assert_eq!(next.route(), Route::List);
        assert_eq!(next.param("sort"), Some("created"));
        assert_eq!(next.filter(), FilterSelection::Completed);
        assert_eq!(next.to_string(), "/?sort=created&filter=completed");
    }

    #[test]
    fn canonical_display() {
        assert_eq!(Address::default().to_string(), "/");
        assert_eq!(Address::stats().to_string(), "/stats");
        assert_eq!(
            Address::list(FilterSelection::Active).to_string(),
            "/?filter=active"
        );
        let reparsed = parse(&Address::list(FilterSelection::Completed).to_string());
        assert_eq!(reparsed.filter(), FilterSelection::Completed);
    }
}
