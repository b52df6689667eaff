//! Usage: OAuth token endpoint helpers (authorization_code + refresh_token grants).

use crate::domain::credentials::HhCredential;
use crate::oauth::provider::HhOAuthConfig;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_seconds;
use serde_json::Value;
use std::collections::HashMap;

pub(crate) async fn exchange_authorization_code(
    client: &reqwest::Client,
    config: &HhOAuthConfig,
    code: &str,
) -> AppResult<HhCredential> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "authorization_code".to_string());
    form.insert("code", code.trim().to_string());
    form.insert("redirect_uri", config.redirect_uri.trim().to_string());
    form.insert("client_id", config.client_id.trim().to_string());
    form.insert("client_secret", config.client_secret.trim().to_string());

    let response = client
        .post(config.token_url.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth token exchange request failed: {e}"))?;

    parse_token_response(response).await
}

pub(crate) async fn refresh_access_token(
    client: &reqwest::Client,
    config: &HhOAuthConfig,
    refresh_token: &str,
) -> AppResult<HhCredential> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "refresh_token".to_string());
    form.insert("refresh_token", refresh_token.trim().to_string());
    form.insert("client_id", config.client_id.trim().to_string());
    form.insert("client_secret", config.client_secret.trim().to_string());

    let response = client
        .post(config.token_url.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth refresh request failed: {e}"))?;

    parse_token_response(response).await
}

async fn parse_token_response(response: reqwest::Response) -> AppResult<HhCredential> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("SYSTEM_ERROR: oauth token response read failed: {e}"))?;

    if !status.is_success() {
        let (error_code, error_message) = parse_oauth_error_details(&body);
        let snippet = sanitize_oauth_error_body_snippet(&body);
        let mut msg = format!(
            "OAUTH_PROVIDER_ERROR: token endpoint returned status={}",
            status.as_u16()
        );
        if let Some(code) = error_code {
            msg.push_str(" code=");
            msg.push_str(code.as_str());
        }
        if let Some(detail) = error_message {
            msg.push_str(" message=");
            msg.push_str(detail.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(snippet.as_str());
        return Err(msg.into());
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| format!("SYSTEM_ERROR: oauth token response json invalid: {e}"))?;

    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| "SYSTEM_ERROR: oauth token response missing access_token".to_string())?
        .to_string();

    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let expires_in = value.get("expires_in").and_then(parse_i64_lossy);
    let now = now_unix_seconds();
    let expires_at = expires_in.and_then(|v| {
        if v <= 0 {
            None
        } else {
            Some(now.saturating_add(v))
        }
    });

    Ok(HhCredential {
        access_token,
        refresh_token,
        expires_at,
    })
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token") || key_lc.contains("secret") || key_lc == "authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

fn sanitize_oauth_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(500).collect();
        }
    }
    body.chars().take(500).collect()
}

fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let mut code = None;
    let mut message = value
        .get("error_description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    if let Some(error_value) = value.get("error") {
        if let Some(err_str) = error_value.as_str() {
            code = Some(err_str.trim().to_string());
        } else if let Some(err_obj) = error_value.as_object() {
            code = err_obj
                .get("code")
                .and_then(Value::as_str)
                .or_else(|| err_obj.get("type").and_then(Value::as_str))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            if message.is_none() {
                message = err_obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
            }
        }
    }

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::security::mask_token;

    #[test]
    fn parse_i64_lossy_supports_number_and_string() {
        assert_eq!(parse_i64_lossy(&Value::from(1200)), Some(1200));
        assert_eq!(parse_i64_lossy(&Value::from("3600")), Some(3600));
        assert_eq!(parse_i64_lossy(&Value::from("x")), None);
    }

    #[test]
    fn parse_oauth_error_details_supports_standard_fields() {
        let payload = r#"{
          "error": "invalid_grant",
          "error_description": "code has expired"
        }"#;

        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("invalid_grant"));
        assert_eq!(message.as_deref(), Some("code has expired"));
    }

    #[test]
    fn parse_oauth_error_details_supports_nested_error_payload() {
        let payload = r#"{
          "error": {
            "message": "bad authorization code",
            "type": "invalid_request_error",
            "code": "invalid_code"
          }
        }"#;

        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("invalid_code"));
        assert_eq!(message.as_deref(), Some("bad authorization code"));
    }

    #[test]
    fn sanitize_oauth_error_body_snippet_masks_token_fields() {
        let raw = r#"{
          "error": {
            "message": "invalid token",
            "refresh_token": "abcd1234xyz9876",
            "nested": {"access_token": "tokenvalue123456"}
          }
        }"#;
        let snippet = sanitize_oauth_error_body_snippet(raw);
        assert!(snippet.contains(mask_token("abcd1234xyz9876").as_str()));
        assert!(snippet.contains(mask_token("tokenvalue123456").as_str()));
        assert!(!snippet.contains("abcd1234xyz9876"));
        assert!(!snippet.contains("tokenvalue123456"));
    }
}
