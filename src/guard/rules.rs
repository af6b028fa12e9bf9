//! Route classification for the page guard

/// Outcome of classifying a (signed-in, path) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Sessionless visit to a protected route
    RedirectToLogin(String),
    /// Signed-in visit to a login/signup page
    RedirectHome(String),
}

impl GuardDecision {
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::RedirectToLogin(location) | Self::RedirectHome(location) => Some(location),
        }
    }
}

/// Protected prefixes, auth-only paths and redirect targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRules {
    protected_prefixes: Vec<String>,
    auth_only_paths: Vec<String>,
    login_path: String,
    home_path: String,
    return_param: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        crate::settings::BillboardSettings::default().route_rules()
    }
}

impl RouteRules {
    #[must_use]
    pub fn new(protected_prefixes: Vec<String>, auth_only_paths: Vec<String>) -> Self {
        Self {
            protected_prefixes,
            auth_only_paths,
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            return_param: "redirect".to_string(),
        }
    }

    #[must_use]
    pub fn with_login_path(mut self, login_path: &str) -> Self {
        self.login_path = login_path.to_string();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, home_path: &str) -> Self {
        self.home_path = home_path.to_string();
        self
    }

    #[must_use]
    pub fn with_return_param(mut self, return_param: &str) -> Self {
        self.return_param = return_param.to_string();
        self
    }

    /// Prefix match against the protected set
    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        let route = route_of(path);
        self.protected_prefixes
            .iter()
            .any(|prefix| route.starts_with(prefix.as_str()))
    }

    /// Exact match against the auth-only set
    #[must_use]
    pub fn is_auth_only(&self, path: &str) -> bool {
        let route = route_of(path);
        self.auth_only_paths.iter().any(|p| p == route)
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Login URL carrying `original` as the return parameter
    #[must_use]
    pub fn login_redirect(&self, original: &str) -> String {
        let separator = if self.login_path.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}{}={}",
            self.login_path,
            self.return_param,
            urlencoding::encode(original)
        )
    }

    /// Classify a navigation; `path` may carry a query string, which is kept
    /// in the return parameter but ignored for matching
    #[must_use]
    pub fn decide(&self, signed_in: bool, path: &str) -> GuardDecision {
        if !signed_in && self.is_protected(path) {
            GuardDecision::RedirectToLogin(self.login_redirect(path))
        } else if signed_in && self.is_auth_only(path) {
            GuardDecision::RedirectHome(self.home_path.clone())
        } else {
            GuardDecision::Allow
        }
    }
}

/// Strip query string and fragment
fn route_of(path: &str) -> &str {
    path.split(['?', '#']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protected_membership_is_prefix_match() {
        let rules = RouteRules::default();
        assert!(rules.is_protected("/create-listing"));
        assert!(rules.is_protected("/my-listings/42/edit"));
        assert!(rules.is_protected("/send-message?to=abc"));
        assert!(!rules.is_protected("/listings/42"));
        assert!(!rules.is_protected("/"));
    }

    #[test]
    fn test_auth_only_membership_is_exact() {
        let rules = RouteRules::default();
        assert!(rules.is_auth_only("/login"));
        assert!(rules.is_auth_only("/signup?ref=nav"));
        assert!(!rules.is_auth_only("/login/help"));
        assert!(!rules.is_auth_only("/signup/"));
    }

    #[test]
    fn test_login_redirect_encodes_original_path() {
        let rules = RouteRules::default();
        assert_eq!(
            rules.login_redirect("/my-listings?page=2"),
            "/login?redirect=%2Fmy-listings%3Fpage%3D2"
        );

        let custom = RouteRules::new(vec!["/vault".into()], vec![])
            .with_login_path("/auth?mode=signin")
            .with_return_param("next");
        assert_eq!(custom.login_redirect("/vault"), "/auth?mode=signin&next=%2Fvault");
    }

    #[test]
    fn test_decide_covers_every_branch() {
        let rules = RouteRules::default();
        assert_eq!(
            rules.decide(false, "/dashboard"),
            GuardDecision::RedirectToLogin("/login?redirect=%2Fdashboard".into())
        );
        assert_eq!(
            rules.decide(true, "/login"),
            GuardDecision::RedirectHome("/".into())
        );
        assert_eq!(rules.decide(true, "/dashboard"), GuardDecision::Allow);
        assert_eq!(rules.decide(false, "/login"), GuardDecision::Allow);
        assert_eq!(rules.decide(false, "/listings/7"), GuardDecision::Allow);
        assert_eq!(rules.decide(true, "/listings/7"), GuardDecision::Allow);
    }
}
