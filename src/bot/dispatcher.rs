//! Update dispatcher.
//!
//! One call per incoming update. Messages are matched as commands, report
//! buttons, web-app data, or answers to a pending prompt; callback queries
//! drive the settings menu and are always answered.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::conversation::{ConversationStore, PendingInput};
use super::keyboard::{build_grid, GridButton};
use super::telegram::{
    AnswerCallbackQuery, CallbackQuery, EditMessageText, InlineKeyboardButton,
    InlineKeyboardMarkup, KeyboardButton, Message, ReplyKeyboardMarkup, ReplyMarkup, SendMessage,
    Update,
};
use super::BotApi;
use crate::report::formatter::{escape_html, format_report, money};
use crate::report::period::ReportPeriod;
use crate::report::ReportAggregator;
use crate::settings::SettingsStore;
use crate::types::{ChatId, SourceError, UserId};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub const CMD_START: &str = "/start";
pub const CMD_SETTINGS: &str = "/settings";
pub const CB_OZON: &str = "/ozonsetting";
pub const CB_LOCAL_PRICING: &str = "/settinglocalpricing";
pub const CB_PURCHASE_PRICES: &str = "/settingpurchaseprice";
/// Followed by the group's index in the user's pricing configuration.
pub const CB_SET_PURCHASE_PRICE: &str = "/setpurchaseprice:";
pub const CB_COMMISSION: &str = "/setcostozon";
pub const CB_API_KEY: &str = "/settokenozonsetting";
pub const CB_CLIENT_ID: &str = "/setclientidozonsetting";
pub const CB_BACK: &str = "/backsettings";
pub const CB_TEST_CONNECTION: &str = "/testconnectozonseller";

pub const BTN_REPORT_TODAY: &str = "Сформировать отчет за сегодня";
pub const BTN_REPORT_YESTERDAY: &str = "Сформировать отчет за вчера";
pub const BTN_REPORT_RANGE: &str = "Сформировать отчет за произвольную дату";

const TEXT_NOT_A_NUMBER: &str =
    "Не удалось распознать число. Пришлите, пожалуйста, число, например 27.5";
const TEXT_EMPTY_VALUE: &str = "Значение не может быть пустым. Пришлите, пожалуйста, текст.";
const TEXT_SAVE_FAILED: &str = "Не удалось сохранить настройки, попробуйте позже.";
const TEXT_REPORT_FAILED: &str = "Не удалось получить данные из OZON, попробуйте позже.";
const TEXT_CREDENTIALS_HINT: &str = "Для получения данных из OZON seller необходимо указать ClientId и Token. Их можно получить в личном кабинете продавца.";

/// Dispatcher settings taken from configuration.
#[derive(Debug, Clone)]
pub struct DispatcherOptions {
    pub timezone_offset_hours: i32,
    /// Date-picker web app; without it the range button is not offered.
    pub report_webapp_url: Option<String>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            timezone_offset_hours: 4,
            report_webapp_url: None,
        }
    }
}

pub struct Dispatcher {
    bot: Arc<dyn BotApi>,
    settings: Arc<dyn SettingsStore>,
    reports: ReportAggregator,
    conversations: ConversationStore,
    options: DispatcherOptions,
}

impl Dispatcher {
    pub fn new(
        bot: Arc<dyn BotApi>,
        settings: Arc<dyn SettingsStore>,
        reports: ReportAggregator,
        options: DispatcherOptions,
    ) -> Self {
        Self {
            bot,
            settings,
            reports,
            conversations: ConversationStore::new(),
            options,
        }
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub async fn dispatch(&self, update: Update) -> Result<()> {
        self.dispatch_at(update, Utc::now()).await
    }

    /// Dispatch as if the update arrived at `now`.
    pub async fn dispatch_at(&self, update: Update, now: DateTime<Utc>) -> Result<()> {
        if let Some(cb) = update.callback_query {
            return self.on_callback(cb).await;
        }
        if let Some(msg) = update.message {
            return self.on_message(msg, now).await;
        }
        debug!(update_id = update.update_id, "Ignoring update without message or callback");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    async fn on_message(&self, msg: Message, now: DateTime<Utc>) -> Result<()> {
        let Some(user_id) = msg.from.as_ref().map(|u| u.id) else {
            debug!(chat_id = msg.chat.id, "Ignoring message without sender");
            return Ok(());
        };
        let chat_id = msg.chat.id;

        if let Some(data) = &msg.web_app_data {
            return match ReportPeriod::parse_range(&data.data) {
                Ok(period) => self.send_report(user_id, chat_id, period, now).await,
                Err(e) => {
                    warn!(user_id, error = %e, "Bad date range from web app");
                    self.bot
                        .send_message(SendMessage::new(chat_id, format!("Неверный период: {e}")))
                        .await
                }
            };
        }

        let text = msg.text.as_deref().unwrap_or_default().trim();
        match text {
            CMD_START => {
                self.conversations.clear(user_id, chat_id).await;
                if let Err(e) = self.settings.register_user(user_id).await {
                    error!(user_id, error = %e, "Failed to register user");
                }
                info!(user_id, chat_id, "User started the bot");
                let keyboard = inline(vec![GridButton::new(
                    1,
                    1,
                    InlineKeyboardButton::callback("Перейти к настройкам?", CMD_SETTINGS),
                )]);
                self.bot
                    .send_message(
                        SendMessage::new(
                            chat_id,
                            "Добро пожаловать! Чтобы использовать бота необходимо его настроить",
                        )
                        .markup(ReplyMarkup::Inline(keyboard)),
                    )
                    .await
            }
            CMD_SETTINGS => {
                self.conversations.clear(user_id, chat_id).await;
                self.bot
                    .send_message(
                        SendMessage::new(chat_id, marketplace_menu_text())
                            .markup(ReplyMarkup::Inline(marketplace_menu())),
                    )
                    .await
            }
            BTN_REPORT_TODAY => self.send_report(user_id, chat_id, ReportPeriod::Today, now).await,
            BTN_REPORT_YESTERDAY => {
                self.send_report(user_id, chat_id, ReportPeriod::Yesterday, now).await
            }
            _ => match self.conversations.pending(user_id, chat_id).await {
                Some(pending) => self.on_pending_input(user_id, chat_id, pending, text).await,
                None => {
                    debug!(user_id, chat_id, "Ignoring unsolicited text");
                    Ok(())
                }
            },
        }
    }

    async fn on_pending_input(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        pending: PendingInput,
        text: &str,
    ) -> Result<()> {
        let outcome = match &pending {
            PendingInput::ClientId | PendingInput::ApiKey if text.is_empty() => {
                return self.reprompt(chat_id, TEXT_EMPTY_VALUE).await;
            }
            PendingInput::ClientId => self
                .settings
                .set_client_id(user_id, text)
                .await
                .map(|_| ("ClientId успешно сохранен.".to_string(), credentials_menu())),
            PendingInput::ApiKey => self
                .settings
                .set_api_key(user_id, text)
                .await
                .map(|_| ("Token успешно сохранен.".to_string(), credentials_menu())),
            PendingInput::CommissionPercent => {
                let Some(percent) = parse_decimal_input(text).filter(|p| *p <= Decimal::ONE_HUNDRED)
                else {
                    return self.reprompt(chat_id, TEXT_NOT_A_NUMBER).await;
                };
                self.settings
                    .set_commission_percent(user_id, percent)
                    .await
                    .map(|_| (format!("Процент сборов OZON сохранен: {percent}%"), pricing_menu()))
            }
            PendingInput::PurchasePrice { group } => {
                let Some(price) = parse_decimal_input(text) else {
                    return self.reprompt(chat_id, TEXT_NOT_A_NUMBER).await;
                };
                self.settings
                    .set_purchase_price(user_id, group, price)
                    .await
                    .map(|found| {
                        let text = if found {
                            format!("Закупочная цена группы «{group}» сохранена: {}", money(price))
                        } else {
                            format!("Группа товаров «{group}» не найдена.")
                        };
                        (text, pricing_menu())
                    })
            }
        };

        self.conversations.clear(user_id, chat_id).await;
        match outcome {
            Ok((text, keyboard)) => {
                info!(user_id, chat_id, input = ?pending_kind(&pending), "Setting saved");
                self.bot
                    .send_message(SendMessage::new(chat_id, text).markup(ReplyMarkup::Inline(keyboard)))
                    .await
            }
            Err(e) => {
                error!(user_id, chat_id, error = %e, "Failed to save setting");
                self.bot.send_message(SendMessage::new(chat_id, TEXT_SAVE_FAILED)).await
            }
        }
    }

    /// Ask again; the pending input stays in place.
    async fn reprompt(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.bot.send_message(SendMessage::new(chat_id, text)).await
    }

    async fn send_report(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let filter = match period.to_filter(now, self.options.timezone_offset_hours) {
            Ok(filter) => filter,
            Err(e) => {
                return self
                    .bot
                    .send_message(SendMessage::new(chat_id, format!("Неверный период: {e}")))
                    .await;
            }
        };

        info!(user_id, chat_id, %period, window = %filter, "Report requested");
        let text = match self.reports.build_report(user_id, &filter).await {
            Ok(report) => format_report(&report),
            Err(e) => {
                error!(user_id, chat_id, error = %e, "Report failed");
                TEXT_REPORT_FAILED.to_string()
            }
        };
        self.bot.send_message(SendMessage::new(chat_id, text).html()).await
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    async fn on_callback(&self, cb: CallbackQuery) -> Result<()> {
        let user_id = cb.from.id;
        let data = cb.data.as_deref().unwrap_or_default();
        let Some((chat_id, message_id)) = cb.message.as_ref().map(|m| (m.chat.id, m.message_id))
        else {
            debug!(user_id, data, "Callback without message");
            return self.bot.answer_callback_query(AnswerCallbackQuery::new(&cb.id)).await;
        };

        if data == CB_TEST_CONNECTION {
            return self.test_connection(&cb.id, user_id, chat_id).await;
        }

        self.bot.answer_callback_query(AnswerCallbackQuery::new(&cb.id)).await?;
        debug!(user_id, chat_id, data, "Callback");

        let edit = |text: String, keyboard: InlineKeyboardMarkup| EditMessageText {
            chat_id,
            message_id,
            text,
            reply_markup: Some(keyboard),
        };

        match data {
            CMD_SETTINGS => {
                self.bot
                    .edit_message_text(edit(marketplace_menu_text(), marketplace_menu()))
                    .await
            }
            CB_OZON => {
                self.bot
                    .edit_message_text(edit(TEXT_CREDENTIALS_HINT.to_string(), ozon_menu()))
                    .await
            }
            CB_LOCAL_PRICING => {
                self.bot
                    .edit_message_text(edit(
                        "Настройка локального ценообразования".to_string(),
                        pricing_menu(),
                    ))
                    .await
            }
            CB_PURCHASE_PRICES => {
                let (text, keyboard) = self.purchase_price_menu(user_id).await;
                self.bot.edit_message_text(edit(text, keyboard)).await
            }
            CB_COMMISSION => {
                let text = "ОК. Пришлите, пожалуйста % расходов на услуги OZON.";
                self.prompt(user_id, chat_id, PendingInput::CommissionPercent, text.into())
                    .await
            }
            CB_API_KEY => {
                let text = "ОК. Пришлите, пожалуйста Token для бота.";
                self.prompt(user_id, chat_id, PendingInput::ApiKey, text.into()).await
            }
            CB_CLIENT_ID => {
                let text = "ОК. Пришлите, пожалуйста ClientID для бота.";
                self.prompt(user_id, chat_id, PendingInput::ClientId, text.into()).await
            }
            CB_BACK => {
                let keyboard = inline(vec![GridButton::new(
                    1,
                    1,
                    InlineKeyboardButton::callback("Да", CMD_SETTINGS),
                )]);
                self.bot
                    .edit_message_text(edit("Настроить бота?".to_string(), keyboard))
                    .await
            }
            _ => match data.strip_prefix(CB_SET_PURCHASE_PRICE) {
                Some(index) => self.select_group(user_id, chat_id, index).await,
                None => {
                    debug!(user_id, data, "Unknown callback");
                    Ok(())
                }
            },
        }
    }

    async fn prompt(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        input: PendingInput,
        text: String,
    ) -> Result<()> {
        self.conversations.expect(user_id, chat_id, input).await;
        self.bot.send_message(SendMessage::new(chat_id, text)).await
    }

    async fn purchase_price_menu(&self, user_id: UserId) -> (String, InlineKeyboardMarkup) {
        let groups = match self.settings.get_pricing_config(user_id).await {
            Ok(Some(cfg)) => cfg.groups,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!(user_id, error = %e, "Failed to load product groups");
                Vec::new()
            }
        };

        let row_count = groups.len() as u32;
        let mut buttons: Vec<GridButton<InlineKeyboardButton>> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                GridButton::new(
                    i as u32 + 1,
                    1,
                    InlineKeyboardButton::callback(
                        format!("{} (Цена: {})", g.name, money(g.purchase_price)),
                        format!("{CB_SET_PURCHASE_PRICE}{i}"),
                    ),
                )
            })
            .collect();
        buttons.push(GridButton::new(
            row_count + 1,
            1,
            InlineKeyboardButton::callback("Назад", CB_LOCAL_PRICING),
        ));

        let text = if groups.is_empty() {
            "Группы товаров появятся после первого отчета.".to_string()
        } else {
            "Выберите группу товаров, чтобы указать закупочную цену.".to_string()
        };
        (text, inline(buttons))
    }

    async fn select_group(&self, user_id: UserId, chat_id: ChatId, index: &str) -> Result<()> {
        let group = match (index.parse::<usize>(), self.settings.get_pricing_config(user_id).await) {
            (Ok(i), Ok(Some(cfg))) => cfg.groups.into_iter().nth(i).map(|g| g.name),
            (_, Err(e)) => {
                error!(user_id, error = %e, "Failed to load product groups");
                None
            }
            _ => None,
        };

        match group {
            Some(group) => {
                let text = format!("ОК. Пришлите, пожалуйста себестоимость товара «{group}».");
                self.prompt(user_id, chat_id, PendingInput::PurchasePrice { group }, text)
                    .await
            }
            None => {
                self.bot
                    .send_message(SendMessage::new(chat_id, "Группа товаров не найдена."))
                    .await
            }
        }
    }

    async fn test_connection(&self, callback_id: &str, user_id: UserId, chat_id: ChatId) -> Result<()> {
        let source = self.reports.marketplace().source();
        let status = match source.check_connection(user_id).await {
            Ok(status) => status,
            Err(SourceError::MissingCredentials(_)) => "Не указаны ClientId и Token".to_string(),
            Err(e) => {
                warn!(user_id, source = source.name(), error = %e, "Connection check failed");
                format!("Ошибка подключения: {e}")
            }
        };
        info!(user_id, %status, "Connection check");

        self.bot
            .answer_callback_query(AnswerCallbackQuery {
                callback_query_id: callback_id.to_string(),
                text: Some(status.clone()),
                show_alert: false,
            })
            .await?;
        self.bot
            .send_message(
                SendMessage::new(
                    chat_id,
                    format!("Проверка подключения к Ozon Seller: {}", escape_html(&status)),
                )
                .html()
                .markup(ReplyMarkup::Reply(self.report_keyboard())),
            )
            .await
    }

    fn report_keyboard(&self) -> ReplyKeyboardMarkup {
        let mut buttons = Vec::new();
        if let Some(url) = &self.options.report_webapp_url {
            buttons.push(GridButton::new(1, 1, KeyboardButton::web_app(BTN_REPORT_RANGE, url)));
        }
        buttons.push(GridButton::new(2, 1, KeyboardButton::text(BTN_REPORT_TODAY)));
        buttons.push(GridButton::new(2, 2, KeyboardButton::text(BTN_REPORT_YESTERDAY)));
        ReplyKeyboardMarkup {
            keyboard: build_grid(buttons),
            resize_keyboard: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Menus and input parsing
// ---------------------------------------------------------------------------

fn inline(buttons: Vec<GridButton<InlineKeyboardButton>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: build_grid(buttons),
    }
}

fn marketplace_menu_text() -> String {
    "Выберите, пожалуйста маркетплейс который вы бы хотели настроить.".to_string()
}

fn marketplace_menu() -> InlineKeyboardMarkup {
    inline(vec![
        GridButton::new(1, 1, InlineKeyboardButton::callback("OZON", CB_OZON)),
        GridButton::new(2, 1, InlineKeyboardButton::callback("Назад", CB_BACK)),
    ])
}

fn ozon_menu() -> InlineKeyboardMarkup {
    inline(vec![
        GridButton::new(1, 1, InlineKeyboardButton::callback("ClientId", CB_CLIENT_ID)),
        GridButton::new(1, 2, InlineKeyboardButton::callback("Token", CB_API_KEY)),
        GridButton::new(
            3,
            1,
            InlineKeyboardButton::callback("Настройка локального ценообразования", CB_LOCAL_PRICING),
        ),
        GridButton::new(
            4,
            1,
            InlineKeyboardButton::callback("Проверка подключения к Ozon Seller", CB_TEST_CONNECTION),
        ),
        GridButton::new(5, 1, InlineKeyboardButton::callback("Назад", CB_BACK)),
    ])
}

fn credentials_menu() -> InlineKeyboardMarkup {
    inline(vec![
        GridButton::new(1, 1, InlineKeyboardButton::callback("ClientId", CB_CLIENT_ID)),
        GridButton::new(1, 2, InlineKeyboardButton::callback("Token", CB_API_KEY)),
        GridButton::new(2, 1, InlineKeyboardButton::callback("Назад", CB_BACK)),
    ])
}

fn pricing_menu() -> InlineKeyboardMarkup {
    inline(vec![
        GridButton::new(1, 1, InlineKeyboardButton::callback("Внести % сборов OZON", CB_COMMISSION)),
        GridButton::new(
            2,
            1,
            InlineKeyboardButton::callback("Указать закупочную цену групп товаров", CB_PURCHASE_PRICES),
        ),
        GridButton::new(3, 1, InlineKeyboardButton::callback("Назад", CB_OZON)),
    ])
}

fn pending_kind(pending: &PendingInput) -> &'static str {
    match pending {
        PendingInput::ClientId => "client_id",
        PendingInput::ApiKey => "api_key",
        PendingInput::CommissionPercent => "commission_percent",
        PendingInput::PurchasePrice { .. } => "purchase_price",
    }
}

/// Non-negative decimal typed by a user; accepts `,` as the separator.
pub fn parse_decimal_input(text: &str) -> Option<Decimal> {
    let normalized = text.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .ok()
        .filter(|d| !d.is_sign_negative())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
