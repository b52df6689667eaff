//! Usage: Serde models for the subset of the hh.ru API the bot consumes.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Employer {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Salary {
    #[serde(default)]
    pub from: Option<i64>,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snippet {
    #[serde(default)]
    pub responsibility: Option<String>,
    #[serde(default)]
    pub requirement: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vacancy {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employer: Option<Employer>,
    #[serde(default)]
    pub salary: Option<Salary>,
    #[serde(default)]
    pub schedule: Option<Named>,
    #[serde(default)]
    pub employment: Option<Named>,
    #[serde(default)]
    pub area: Option<Named>,
    #[serde(default)]
    pub snippet: Option<Snippet>,
    #[serde(default)]
    pub alternate_url: Option<String>,
    #[serde(default)]
    pub apply_alternate_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Vacancy {
    /// Best URL to show the user for opening the posting.
    pub fn open_url(&self) -> Option<&str> {
        self.alternate_url
            .as_deref()
            .or(self.apply_alternate_url.as_deref())
            .or(self.url.as_deref())
    }

    /// Name + snippet text, lowercased, for the local exclude filter.
    pub fn exclude_blob(&self) -> String {
        let mut blobs: Vec<&str> = Vec::new();
        if let Some(name) = self.name.as_deref() {
            blobs.push(name);
        }
        if let Some(snippet) = &self.snippet {
            if let Some(responsibility) = snippet.responsibility.as_deref() {
                blobs.push(responsibility);
            }
            if let Some(requirement) = snippet.requirement.as_deref() {
                blobs.push(requirement);
            }
        }
        blobs.join("\n").to_lowercase()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VacancyPage {
    #[serde(default)]
    pub items: Vec<Vacancy>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub pages: i64,
    #[serde(default)]
    pub found: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resume {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResumeList {
    #[serde(default)]
    pub items: Vec<Resume>,
}
