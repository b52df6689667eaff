//! Usage: hh.ru OAuth endpoint configuration and authorize-URL construction.

use crate::infra::settings::BotSettings;
use crate::shared::error::AppResult;

#[derive(Debug, Clone)]
pub struct HhOAuthConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl HhOAuthConfig {
    pub fn from_settings(settings: &BotSettings) -> Self {
        Self {
            authorize_url: settings.hh.authorize_url.clone(),
            token_url: settings.hh.token_url.clone(),
            client_id: settings.hh.client_id.clone(),
            client_secret: settings.hh.client_secret.clone(),
            scope: settings.hh.scope.clone(),
            redirect_uri: settings.oauth.redirect_uri(),
        }
    }

    /// Authorize URL with the state token embedded as the CSRF `state` parameter.
    pub fn build_authorize_url(&self, state: &str) -> AppResult<String> {
        let mut url = reqwest::Url::parse(&self.authorize_url)
            .map_err(|e| format!("SYSTEM_ERROR: invalid oauth authorize url: {e}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.client_id);
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("state", state);
            let scope = self.scope.trim();
            if !scope.is_empty() {
                query.append_pair("scope", scope);
            }
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HhOAuthConfig {
        HhOAuthConfig {
            authorize_url: "https://hh.ru/oauth/authorize".to_string(),
            token_url: "https://api.hh.ru/token".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            scope: String::new(),
            redirect_uri: "http://127.0.0.1:8400/oauth/callback".to_string(),
        }
    }

    #[test]
    fn authorize_url_embeds_state_and_redirect() {
        let url = config().build_authorize_url("state-token").expect("url");
        assert!(url.starts_with("https://hh.ru/oauth/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-1"));
        assert!(url.contains("state=state-token"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8400%2Foauth%2Fcallback"));
        assert!(!url.contains("scope="));
    }

    #[test]
    fn scope_is_appended_only_when_set() {
        let mut cfg = config();
        cfg.scope = "resumes".to_string();
        let url = cfg.build_authorize_url("s").expect("url");
        assert!(url.contains("scope=resumes"));
    }

    #[test]
    fn invalid_authorize_url_is_reported() {
        let mut cfg = config();
        cfg.authorize_url = "not a url".to_string();
        let err = cfg.build_authorize_url("s").expect_err("invalid");
        assert_eq!(err.code(), "SYSTEM_ERROR");
    }
}
