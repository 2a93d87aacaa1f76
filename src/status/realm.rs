use secrecy::SecretString;
use std::fmt;

/// Basic-auth credentials scoped to URLs under `base_url`
#[derive(Clone)]
pub struct AuthRealm {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
}

impl AuthRealm {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: &str) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: SecretString::new(password.to_string().into_boxed_str()),
        }
    }

    pub fn covers(&self, url: &str) -> bool {
        url.starts_with(&self.base_url)
    }

    /// First realm whose base URL is a prefix of `url`
    pub fn select<'a>(realms: &'a [AuthRealm], url: &str) -> Option<&'a AuthRealm> {
        realms.iter().find(|realm| realm.covers(url))
    }
}

impl fmt::Debug for AuthRealm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRealm")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
