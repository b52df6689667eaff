//! Usage: Authenticated hh.ru API client (resumes, similar vacancies, applications).

use crate::domain::preferences::VacancyFilters;
use crate::hh::models::{ResumeList, VacancyPage};
use crate::shared::error::AppResult;
use serde::de::DeserializeOwned;
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_SNIPPET_LEN: usize = 300;

#[derive(Debug)]
pub struct HhApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl HhApiClient {
    pub fn new(base_url: &str, access_token: &str) -> AppResult<Self> {
        if access_token.trim().is_empty() {
            return Err("SEC_INVALID_INPUT: hh access token must not be empty".into());
        }
        let http = reqwest::Client::builder()
            .user_agent(format!("hh-vacancy-bot/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: hh http client init failed: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: hh api request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_LEN).collect();
            return Err(format!(
                "HH_API_ERROR: {path} returned status={} body={snippet}",
                status.as_u16()
            )
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: hh api response parse failed for {path}: {e}").into())
    }

    pub async fn my_resumes(&self) -> AppResult<ResumeList> {
        self.get_json("/resumes/mine", &[]).await
    }

    /// One page of vacancies similar to the given resume, newest first.
    pub async fn similar_vacancies(
        &self,
        resume_id: &str,
        filters: &VacancyFilters,
        page: i64,
        per_page: i64,
    ) -> AppResult<VacancyPage> {
        let mut query: Vec<(&str, String)> = vec![
            ("order_by", "publication_time".to_string()),
            ("salary_from", filters.salary_from.to_string()),
            ("per_page", per_page.to_string()),
            ("page", page.to_string()),
        ];
        for role in &filters.professional_roles {
            query.push(("professional_role", role.to_string()));
        }

        self.get_json(&format!("/resumes/{resume_id}/similar_vacancies"), &query)
            .await
    }

    /// Submit an application (negotiation) for a vacancy with the given resume.
    pub async fn apply(
        &self,
        vacancy_id: &str,
        resume_id: &str,
        message: Option<&str>,
    ) -> AppResult<()> {
        let mut form: Vec<(&str, String)> = vec![
            ("vacancy_id", vacancy_id.to_string()),
            ("resume_id", resume_id.to_string()),
        ];
        if let Some(message) = message.map(str::trim).filter(|m| !m.is_empty()) {
            form.push(("message", message.to_string()));
        }

        let url = format!("{}/negotiations", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("SYSTEM_ERROR: hh apply request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_LEN).collect();
            return Err(format!(
                "HH_API_ERROR: /negotiations returned status={} body={snippet}",
                status.as_u16()
            )
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_access_token_is_rejected() {
        let err = HhApiClient::new("https://api.hh.ru", "  ").expect_err("reject");
        assert_eq!(err.code(), "SEC_INVALID_INPUT");
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = HhApiClient::new("https://api.hh.ru/", "token").expect("client");
        assert_eq!(client.base_url, "https://api.hh.ru");
    }
}
