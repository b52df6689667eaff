//! Usage: Inline keyboard layouts for the bot menus.

use crate::bot::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub const CB_ROLE_DESIGN: &str = "role:design";
pub const CB_HOME: &str = "home";
pub const CB_FILTERS: &str = "filters";
pub const CB_BROWSE: &str = "browse";
pub const CB_NEXT: &str = "next";
pub const CB_RESUME: &str = "resume";
pub const CB_COVER: &str = "cover";
pub const CB_NOTIFY: &str = "notify";

pub fn role_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![InlineKeyboardButton::callback(
            "Графический дизайнер",
            CB_ROLE_DESIGN,
        )]],
    }
}

pub fn main_menu_kb() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![InlineKeyboardButton::callback("⚙️ Настроить фильтры", CB_FILTERS)],
            vec![InlineKeyboardButton::callback("📋 Посмотреть вакансии", CB_BROWSE)],
            vec![InlineKeyboardButton::callback("📝 Настройка резюме", CB_RESUME)],
            vec![InlineKeyboardButton::callback("✉️ Сопроводительное письмо", CB_COVER)],
            vec![InlineKeyboardButton::callback("🔔 Уведомления", CB_NOTIFY)],
        ],
    }
}

pub fn browse_kb(vacancy_url: Option<&str>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = vacancy_url {
        rows.push(vec![InlineKeyboardButton::link("🔗 Открыть вакансию", url)]);
    }
    rows.push(vec![InlineKeyboardButton::callback("➡️ Дальше", CB_NEXT)]);
    rows.push(vec![InlineKeyboardButton::callback("🏠 В главное меню", CB_HOME)]);
    InlineKeyboardMarkup {
        inline_keyboard: rows,
    }
}
