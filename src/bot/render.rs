//! Usage: Text rendering for vacancies and filter summaries.

use crate::domain::preferences::VacancyFilters;
use crate::hh::models::Vacancy;

pub fn vacancy_to_text(vacancy: &Vacancy) -> String {
    let name = vacancy.name.as_deref().unwrap_or("");
    let employer = vacancy
        .employer
        .as_ref()
        .and_then(|e| e.name.as_deref())
        .unwrap_or("");
    let area = vacancy
        .area
        .as_ref()
        .and_then(|a| a.name.as_deref())
        .unwrap_or("");

    let salary_text = match &vacancy.salary {
        Some(salary) => {
            let from = salary.from.map(|v| v.to_string()).unwrap_or_default();
            let to = salary.to.map(|v| v.to_string()).unwrap_or_default();
            let currency = salary.currency.as_deref().unwrap_or("");
            format!("{from}-{to} {currency}")
                .trim_matches(|c: char| c == ' ' || c == '-')
                .to_string()
        }
        None => String::new(),
    };
    let salary_text = if salary_text.is_empty() {
        "не указана".to_string()
    } else {
        salary_text
    };

    let schedule = vacancy
        .schedule
        .as_ref()
        .and_then(|s| s.name.as_deref())
        .unwrap_or("");
    let employment = vacancy
        .employment
        .as_ref()
        .and_then(|e| e.name.as_deref())
        .unwrap_or("");
    let url = vacancy.open_url().unwrap_or("");

    let mut lines = vec![
        format!("💼 {name}"),
        format!("🏢 {employer}"),
        format!("📍 {area}"),
        format!("💵 Зарплата: {salary_text}"),
        format!("🕒 График: {schedule} ({employment})"),
        format!("🔗 {url}"),
    ];

    if let Some(snippet) = &vacancy.snippet {
        for text in [snippet.responsibility.as_deref(), snippet.requirement.as_deref()]
            .into_iter()
            .flatten()
        {
            lines.push(String::new());
            lines.push(text.to_string());
        }
    }

    lines
        .into_iter()
        .filter(|line| {
            // Drop rows whose payload is entirely missing, keep the blank separators.
            !matches!(
                line.as_str(),
                "💼 " | "🏢 " | "📍 " | "🔗 " | "🕒 График:  ()"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn filters_text(filters: &VacancyFilters) -> String {
    let mut lines = vec![
        "Текущие фильтры:".to_string(),
        format!("- Зарплата от {}", filters.salary_from),
    ];
    if filters.remote {
        lines.push("- Удаленно".to_string());
    }
    if filters.flexible {
        lines.push("- Гибкий график".to_string());
    }
    if !filters.exclude_text.trim().is_empty() {
        lines.push(format!("- Исключить: {}", filters.exclude_text));
    }
    lines.push(String::new());
    lines.push("Изменение фильтров через меню будет добавлено позже.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::{UserPreference, VacancyFilters};

    fn vacancy(json: &str) -> Vacancy {
        serde_json::from_str(json).expect("vacancy json")
    }

    #[test]
    fn full_vacancy_renders_all_lines() {
        let text = vacancy_to_text(&vacancy(
            r#"{
                "id": "1",
                "name": "Дизайнер",
                "employer": {"name": "Студия"},
                "area": {"name": "Москва"},
                "salary": {"from": 100000, "to": 150000, "currency": "RUR"},
                "schedule": {"name": "Удаленная работа"},
                "employment": {"name": "Полная занятость"},
                "alternate_url": "https://hh.ru/vacancy/1",
                "snippet": {"requirement": "Опыт от 1 года"}
            }"#,
        ));
        assert!(text.contains("💼 Дизайнер"));
        assert!(text.contains("💵 Зарплата: 100000-150000 RUR"));
        assert!(text.contains("🕒 График: Удаленная работа (Полная занятость)"));
        assert!(text.contains("Опыт от 1 года"));
    }

    #[test]
    fn missing_salary_renders_placeholder() {
        let text = vacancy_to_text(&vacancy(r#"{"id": "1", "name": "Дизайнер"}"#));
        assert!(text.contains("💵 Зарплата: не указана"));
        assert!(!text.contains("🏢"));
    }

    #[test]
    fn filters_text_lists_active_flags() {
        let pref = UserPreference {
            id: 1,
            user_id: 1,
            professional_roles: "4".to_string(),
            salary_from: 100_000,
            remote: true,
            flexible: false,
            exclude_text: "ux ui".to_string(),
            browse_page: 0,
            created_at: 0,
            updated_at: 0,
        };
        let text = filters_text(&VacancyFilters::from_preference(&pref));
        assert!(text.contains("Зарплата от 100000"));
        assert!(text.contains("- Удаленно"));
        assert!(!text.contains("Гибкий график"));
        assert!(text.contains("Исключить: ux ui"));
    }
}
