//! Request classification.
//!
//! An ordered rule table maps each GET request to exactly one [`Lane`]; the
//! first matching rule wins and the last rule matches everything, so
//! classification is total. Non-GET requests are never classified.

use crate::fetch::Request;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Path fragments that mark a request as medical data wherever it is hosted.
pub const MEDICAL_PATH_FRAGMENTS: &[&str] =
    &["medications", "dosing", "indications", "contraindications", "administration"];

/// Which fetch strategy handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Network first, medical-data store fallback, synthesized 503 last.
    MedicalData,
    /// Cache first, refilled into the static store.
    SameOrigin,
    /// Network first, runtime store fallback.
    External,
}

/// Router decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Let the request through untouched.
    Passthrough,
    Lane(Lane),
}

#[derive(Debug, Clone)]
enum Matcher {
    /// Host equals the suffix or is a subdomain of it.
    HostSuffix(String),
    /// Path contains any of the fragments.
    PathContainsAny(&'static [&'static str]),
    /// Scheme, host and port equal the worker origin.
    SameOrigin(url::Origin),
    Any,
}

impl Matcher {
    fn matches(&self, url: &Url) -> bool {
        match self {
            Matcher::HostSuffix(suffix) => url.host_str().is_some_and(|host| {
                host == suffix
                    || host
                        .strip_suffix(suffix.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            }),
            Matcher::PathContainsAny(fragments) => {
                let path = url.path();
                fragments.iter().any(|fragment| path.contains(fragment))
            }
            Matcher::SameOrigin(origin) => &url.origin() == origin,
            Matcher::Any => true,
        }
    }
}

/// Ordered (matcher, lane) table.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<(Matcher, Lane)>,
}

impl Router {
    /// Build the table for a worker serving `origin` in front of the data
    /// store at `data_store_host`.
    pub fn new(origin: &Url, data_store_host: &str) -> Self {
        let rules = vec![
            (Matcher::HostSuffix(data_store_host.to_ascii_lowercase()), Lane::MedicalData),
            (Matcher::PathContainsAny(MEDICAL_PATH_FRAGMENTS), Lane::MedicalData),
            (Matcher::SameOrigin(origin.origin()), Lane::SameOrigin),
            (Matcher::Any, Lane::External),
        ];
        Self { rules }
    }

    /// Lane for a URL, ignoring the method.
    pub fn lane_for(&self, url: &Url) -> Lane {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matches(url))
            .map(|(_, lane)| *lane)
            .unwrap_or(Lane::External)
    }

    /// Decide how a request is handled.
    pub fn route(&self, request: &Request) -> Route {
        if !request.is_get() {
            return Route::Passthrough;
        }
        Route::Lane(self.lane_for(&request.url))
    }

    /// Every lane whose rules match `url`, in table order.
    ///
    /// Used to check that the first match is the one `lane_for` reports.
    #[cfg(test)]
    fn matching_lanes(&self, url: &Url) -> Vec<Lane> {
        self.rules
            .iter()
            .filter(|(matcher, _)| matcher.matches(url))
            .map(|(_, lane)| *lane)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn router() -> Router {
        Router::new(&Url::parse("http://localhost:8080").unwrap(), "supabase.co")
    }

    fn lane(url: &str) -> Lane {
        router().lane_for(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_data_store_host_is_medical() {
        assert_eq!(lane("https://medref.supabase.co/rest/v1/protocols?select=*"), Lane::MedicalData);
        assert_eq!(lane("https://supabase.co/anything"), Lane::MedicalData);
    }

    #[test]
    fn test_lookalike_host_is_not_medical() {
        assert_eq!(lane("https://notsupabase.co/app.js"), Lane::External);
    }

    #[test]
    fn test_medical_path_fragments() {
        assert_eq!(lane("http://localhost:8080/api/medications?select=*"), Lane::MedicalData);
        assert_eq!(lane("https://cdn.example.com/v1/dosing/table"), Lane::MedicalData);
        assert_eq!(lane("http://localhost:8080/contraindications"), Lane::MedicalData);
    }

    #[test]
    fn test_medical_rule_wins_over_same_origin() {
        assert_eq!(lane("http://localhost:8080/medications"), Lane::MedicalData);
    }

    #[test]
    fn test_same_origin() {
        assert_eq!(lane("http://localhost:8080/"), Lane::SameOrigin);
        assert_eq!(lane("http://localhost:8080/assets/index.js"), Lane::SameOrigin);
    }

    #[test]
    fn test_different_port_is_external() {
        assert_eq!(lane("http://localhost:9090/assets/index.js"), Lane::External);
        assert_eq!(lane("https://localhost:8080/"), Lane::External);
    }

    #[test]
    fn test_external() {
        assert_eq!(lane("https://fonts.googleapis.com/css2?family=Inter"), Lane::External);
    }

    #[test]
    fn test_non_get_passes_through() {
        let router = router();
        for method in [Method::POST, Method::PATCH, Method::DELETE, Method::PUT] {
            let request = Request::new(method, "https://medref.supabase.co/rest/v1/medications").unwrap();
            assert_eq!(router.route(&request), Route::Passthrough);
        }
    }

    #[test]
    fn test_get_is_routed() {
        let request = Request::get("http://localhost:8080/favorites").unwrap();
        assert_eq!(router().route(&request), Route::Lane(Lane::SameOrigin));
    }

    #[test]
    fn test_classification_is_total_and_first_match_wins() {
        let router = router();
        let hosts = [
            "http://localhost:8080",
            "https://localhost:8080",
            "http://localhost:3000",
            "https://medref.supabase.co",
            "https://fonts.example.com",
            "http://127.0.0.1",
        ];
        let paths = [
            "/",
            "/medications",
            "/favorites",
            "/rest/v1/medication_dosing?select=*",
            "/api/indications",
            "/administration/routes",
            "/manifest.json",
            "/static/app.css",
        ];

        for host in hosts {
            for path in paths {
                let url = Url::parse(&format!("{host}{path}")).unwrap();
                let matches = router.matching_lanes(&url);
                assert!(!matches.is_empty(), "no rule matched {url}");
                assert_eq!(router.lane_for(&url), matches[0], "first match not used for {url}");
            }
        }
    }
}
