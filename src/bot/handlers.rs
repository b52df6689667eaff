//! Usage: Command and callback handling: account linking, menus, vacancy browsing.

use crate::bot::api::TelegramApi;
use crate::bot::keyboards::{
    self, CB_BROWSE, CB_COVER, CB_FILTERS, CB_HOME, CB_NEXT, CB_NOTIFY, CB_RESUME, CB_ROLE_DESIGN,
};
use crate::bot::render;
use crate::bot::types::{CallbackQuery, Message, Update};
use crate::domain::credentials::HhCredential;
use crate::domain::preferences::{UserPreference, VacancyFilters, DEFAULT_PROFESSIONAL_ROLES};
use crate::domain::users::User;
use crate::hh::client::HhApiClient;
use crate::infra::db::Db;
use crate::oauth::coordinator::{AuthCoordinator, AuthFlowOutcome};
use crate::oauth::provider::HhOAuthConfig;
use crate::oauth::token_exchange;
use crate::shared::blocking;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_seconds;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on pages scanned per browse click while the exclude filter skips.
const MAX_PAGES_PER_BROWSE: i64 = 50;
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MSG_START: &str = "Выберите направление работы. Сейчас доступно: Графический дизайнер.";
const MSG_MAIN_MENU: &str = "Главное меню";
const MSG_ROLE_SAVED: &str = "Профиль обновлен. Теперь настройте фильтры или переходите в меню.";
const MSG_NEED_AUTH: &str = "Сначала авторизуйтесь в HH через команду /auth.";
const MSG_NO_RESUME: &str = "Не найдено ни одного резюме. Добавьте резюме на HH.";
const MSG_NO_VACANCIES: &str = "Подходящих вакансий не найдено.";
const MSG_NO_MORE_VACANCIES: &str = "Больше вакансий нет.";
const MSG_HH_UNAVAILABLE: &str = "⚠️ HH сейчас недоступен. Попробуйте позже.";
const MSG_STUB_SECTION: &str = "Этот раздел будет добавлен позже.";

pub struct BotContext {
    api: Arc<TelegramApi>,
    db: Db,
    coordinator: AuthCoordinator,
    provider: HhOAuthConfig,
    hh_api_base_url: String,
    http: reqwest::Client,
}

impl BotContext {
    pub fn new(
        api: Arc<TelegramApi>,
        db: Db,
        coordinator: AuthCoordinator,
        provider: HhOAuthConfig,
        hh_api_base_url: String,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("hh-vacancy-bot/{}", env!("CARGO_PKG_VERSION")))
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| format!("SYSTEM_ERROR: bot http client init failed: {e}"))?;
        Ok(Self {
            api,
            db,
            coordinator,
            provider,
            hh_api_base_url,
            http,
        })
    }

    /// Entry point for one update; errors are logged, never propagated to the
    /// polling loop.
    pub async fn handle_update(&self, update: Update) {
        let update_id = update.update_id;
        let result = match (update.message, update.callback_query) {
            (Some(message), _) => self.handle_message(message).await,
            (None, Some(callback)) => self.handle_callback(callback).await,
            (None, None) => Ok(()),
        };
        if let Err(err) = result {
            tracing::warn!(update_id, "update handling failed: {err}");
        }
    }

    async fn handle_message(&self, message: Message) -> AppResult<()> {
        let Some(from) = message.from.as_ref() else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };

        let command = text.split_whitespace().next().unwrap_or("");
        match command {
            "/start" => self.cmd_start(message.chat.id, from.id).await,
            "/auth" => self.cmd_auth(message.chat.id, from.id).await,
            _ => Ok(()),
        }
    }

    async fn cmd_start(&self, chat_id: i64, tg_user_id: i64) -> AppResult<()> {
        self.get_or_create_user(tg_user_id).await?;
        self.api
            .send_message(chat_id, MSG_START, Some(&keyboards::role_kb()))
            .await?;
        Ok(())
    }

    /// The authorize command: one suspended task per invoking user. Concurrent
    /// invocations share the callback listener and never interfere.
    async fn cmd_auth(&self, chat_id: i64, tg_user_id: i64) -> AppResult<()> {
        let user = self.get_or_create_user(tg_user_id).await?;

        let attempt = self.coordinator.begin(user.id)?;
        self.api
            .send_message(
                chat_id,
                &format!(
                    "Перейдите по ссылке для авторизации на HH и дождитесь перенаправления на страницу подтверждения, затем вернитесь в Telegram:\n{}",
                    attempt.authorize_url
                ),
                None,
            )
            .await?;

        let redirect = self.coordinator.await_completion(attempt).await;
        let outcome = self.coordinator.complete(user.id, redirect).await?;

        match outcome {
            AuthFlowOutcome::Succeeded(_) => {
                self.api
                    .send_message(
                        chat_id,
                        "🔓 Авторизация HH успешно завершена. Теперь можно пользоваться меню.",
                        None,
                    )
                    .await?;
                self.api
                    .send_message(chat_id, MSG_MAIN_MENU, Some(&keyboards::main_menu_kb()))
                    .await?;
            }
            AuthFlowOutcome::ProviderDenied(reason) => {
                self.api
                    .send_message(
                        chat_id,
                        &format!("🚫 HH отклонил авторизацию ({reason}). Попробуйте ещё раз: /auth"),
                        None,
                    )
                    .await?;
            }
            AuthFlowOutcome::TimedOut => {
                self.api
                    .send_message(
                        chat_id,
                        "⏳ Время ожидания авторизации истекло. Попробуйте ещё раз: /auth",
                        None,
                    )
                    .await?;
            }
            AuthFlowOutcome::ExchangeFailed(_) => {
                self.api
                    .send_message(
                        chat_id,
                        "⚠️ Не удалось обменять код авторизации. Запросите новую ссылку: /auth",
                        None,
                    )
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> AppResult<()> {
        let data = callback.data.clone().unwrap_or_default();
        let tg_user_id = callback.from.id;

        let Some(message) = callback.message else {
            // Nothing to edit without the originating message; just stop the spinner.
            return self.api.answer_callback_query(&callback.id).await;
        };
        let chat_id = message.chat.id;
        let message_id = message.message_id;

        let result = match data.as_str() {
            CB_ROLE_DESIGN => self.set_design_role(chat_id, message_id, tg_user_id).await,
            CB_HOME => {
                self.api
                    .edit_message_text(
                        chat_id,
                        message_id,
                        MSG_MAIN_MENU,
                        Some(&keyboards::main_menu_kb()),
                    )
                    .await
            }
            CB_FILTERS => self.show_filters(chat_id, message_id, tg_user_id).await,
            CB_BROWSE => {
                self.send_vacancy(chat_id, message_id, tg_user_id, true)
                    .await
            }
            CB_NEXT => {
                self.send_vacancy(chat_id, message_id, tg_user_id, false)
                    .await
            }
            CB_RESUME | CB_COVER | CB_NOTIFY => {
                self.api
                    .edit_message_text(
                        chat_id,
                        message_id,
                        MSG_STUB_SECTION,
                        Some(&keyboards::main_menu_kb()),
                    )
                    .await
            }
            _ => Ok(()),
        };

        self.api.answer_callback_query(&callback.id).await?;
        result
    }

    async fn set_design_role(
        &self,
        chat_id: i64,
        message_id: i64,
        tg_user_id: i64,
    ) -> AppResult<()> {
        let user = self.get_or_create_user(tg_user_id).await?;
        let db = self.db.clone();
        blocking::run("set_design_role", move || {
            let conn = db.open_connection()?;
            crate::domain::preferences::set_professional_roles(
                &conn,
                user.id,
                DEFAULT_PROFESSIONAL_ROLES,
            )
        })
        .await?;

        self.api
            .edit_message_text(chat_id, message_id, MSG_ROLE_SAVED, None)
            .await?;
        self.api
            .send_message(chat_id, MSG_MAIN_MENU, Some(&keyboards::main_menu_kb()))
            .await?;
        Ok(())
    }

    async fn show_filters(&self, chat_id: i64, message_id: i64, tg_user_id: i64) -> AppResult<()> {
        let user = self.get_or_create_user(tg_user_id).await?;
        let preference = self.load_preference(user.id).await?;
        let filters = VacancyFilters::from_preference(&preference);
        self.api
            .edit_message_text(
                chat_id,
                message_id,
                &render::filters_text(&filters),
                Some(&keyboards::main_menu_kb()),
            )
            .await?;
        Ok(())
    }

    async fn send_vacancy(
        &self,
        chat_id: i64,
        message_id: i64,
        tg_user_id: i64,
        reset_page: bool,
    ) -> AppResult<()> {
        let user = self.get_or_create_user(tg_user_id).await?;

        let Some(hh) = self.hh_client_for(user.id).await? else {
            self.api
                .edit_message_text(
                    chat_id,
                    message_id,
                    MSG_NEED_AUTH,
                    Some(&keyboards::main_menu_kb()),
                )
                .await?;
            return Ok(());
        };

        let preference = self.load_preference(user.id).await?;
        let filters = VacancyFilters::from_preference(&preference);

        let resumes = match hh.my_resumes().await {
            Ok(resumes) => resumes,
            Err(err) => {
                tracing::warn!(user_id = user.id, "resume list failed: {err}");
                return self.edit_menu(chat_id, message_id, MSG_HH_UNAVAILABLE).await;
            }
        };
        let Some(resume) = resumes.items.first() else {
            return self.edit_menu(chat_id, message_id, MSG_NO_RESUME).await;
        };

        let mut page = if reset_page { 0 } else { preference.browse_page };
        let first_page = page;

        loop {
            if page - first_page >= MAX_PAGES_PER_BROWSE {
                return self
                    .edit_menu(chat_id, message_id, MSG_NO_MORE_VACANCIES)
                    .await;
            }

            let result = match hh.similar_vacancies(&resume.id, &filters, page, 1).await {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(user_id = user.id, page, "vacancy page fetch failed: {err}");
                    return self.edit_menu(chat_id, message_id, MSG_HH_UNAVAILABLE).await;
                }
            };

            let Some(vacancy) = result.items.first() else {
                let text = if page == first_page && first_page == 0 {
                    MSG_NO_VACANCIES
                } else {
                    MSG_NO_MORE_VACANCIES
                };
                return self.edit_menu(chat_id, message_id, text).await;
            };

            if filters.matches_exclude(&vacancy.exclude_blob()) {
                page += 1;
                if result.pages > 0 && page >= result.pages {
                    return self
                        .edit_menu(chat_id, message_id, MSG_NO_MORE_VACANCIES)
                        .await;
                }
                continue;
            }

            let text = render::vacancy_to_text(vacancy);
            self.api
                .edit_message_text(
                    chat_id,
                    message_id,
                    &text,
                    Some(&keyboards::browse_kb(vacancy.open_url())),
                )
                .await?;

            let db = self.db.clone();
            let user_id = user.id;
            let next_page = page + 1;
            blocking::run("save_browse_page", move || {
                let conn = db.open_connection()?;
                crate::domain::preferences::set_browse_page(&conn, user_id, next_page)
            })
            .await?;
            return Ok(());
        }
    }

    async fn edit_menu(&self, chat_id: i64, message_id: i64, text: &str) -> AppResult<()> {
        self.api
            .edit_message_text(chat_id, message_id, text, Some(&keyboards::main_menu_kb()))
            .await
    }

    async fn get_or_create_user(&self, tg_user_id: i64) -> AppResult<User> {
        let db = self.db.clone();
        blocking::run("get_or_create_user", move || {
            let conn = db.open_connection()?;
            crate::domain::users::get_or_create(&conn, tg_user_id)
        })
        .await
    }

    async fn load_preference(&self, user_id: i64) -> AppResult<UserPreference> {
        let db = self.db.clone();
        blocking::run("load_preference", move || {
            let conn = db.open_connection()?;
            crate::domain::preferences::ensure_defaults(&conn, user_id)
        })
        .await
    }

    /// Build an hh client from the stored credential, refreshing a stale access
    /// token first. `None` means the user has to go through `/auth` (again).
    async fn hh_client_for(&self, user_id: i64) -> AppResult<Option<HhApiClient>> {
        let db = self.db.clone();
        let stored = blocking::run("load_credential", move || {
            let conn = db.open_connection()?;
            crate::domain::credentials::get(&conn, user_id)
        })
        .await?;

        let Some(credential) = stored else {
            return Ok(None);
        };

        let credential = if credential.needs_refresh(now_unix_seconds()) {
            let Some(refresh_token) = credential.refresh_token.clone() else {
                tracing::info!(user_id, "stored credential expired without refresh token");
                return Ok(None);
            };
            match token_exchange::refresh_access_token(&self.http, &self.provider, &refresh_token)
                .await
            {
                Ok(refreshed) => {
                    // hh.ru may omit the rotated refresh token; keep the old one then.
                    let merged = HhCredential {
                        access_token: refreshed.access_token,
                        refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
                        expires_at: refreshed.expires_at,
                    };
                    let db = self.db.clone();
                    let stored = merged.clone();
                    blocking::run("save_refreshed_credential", move || {
                        let conn = db.open_connection()?;
                        crate::domain::credentials::put(&conn, user_id, &stored)
                    })
                    .await?;
                    tracing::info!(user_id, "hh access token refreshed");
                    merged
                }
                Err(err) => {
                    tracing::warn!(user_id, "hh token refresh failed: {err}");
                    return Ok(None);
                }
            }
        } else {
            credential
        };

        HhApiClient::new(&self.hh_api_base_url, &credential.access_token).map(Some)
    }
}
