//! Authentication endpoint paths.

use url::Url;

/// Paths of the authentication endpoints, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct AuthEndpoints {
    pub login: String,
    pub signup: String,
    pub logout: String,
    pub refresh: String,
    pub current_user: String,
    pub forgot_password: String,
    pub reset_password: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "auth/login".to_string(),
            signup: "auth/register".to_string(),
            logout: "auth/logout".to_string(),
            refresh: "auth/refresh".to_string(),
            current_user: "auth/me".to_string(),
            forgot_password: "auth/forgot-password".to_string(),
            reset_password: "auth/reset-password".to_string(),
        }
    }
}

impl AuthEndpoints {
    /// Endpoints that never carry a bearer token and never trigger
    /// refresh-on-401. The current-user endpoint is not one of them.
    fn exempt(&self) -> [&str; 6] {
        [
            &self.login,
            &self.signup,
            &self.logout,
            &self.refresh,
            &self.forgot_password,
            &self.reset_password,
        ]
    }

    /// Whether `url` targets one of the authentication endpoints under `base`.
    pub fn is_auth_endpoint(&self, base: &Url, url: &Url) -> bool {
        let target = url.path().trim_end_matches('/');
        self.exempt()
            .iter()
            .filter_map(|path| resolve(base, path).ok())
            .any(|endpoint| {
                endpoint.origin() == url.origin()
                    && endpoint.path().trim_end_matches('/') == target
            })
    }
}

/// Resolve `target` against `base`. Absolute URLs are taken as-is.
pub fn resolve(base: &Url, target: &str) -> Result<Url, url::ParseError> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(target.trim_start_matches('/'))
        }
        Err(e) => Err(e),
    }
}
