use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fmt;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, User};
use tracing::{error, info};

/// Rendered in place of any absent payload field.
const MISSING: &str = "N/A";
/// Fallback for platform/version, matching the front-end's own default.
const UNKNOWN: &str = "unknown";

/// Reply sent when the Web App data is not valid JSON.
const PARSE_ERROR_TEXT: &str = "❌ Kechirasiz, ma'lumotlarni tahlil qilishda xatolik yuz berdi.\n\
                                Iltimos, qaytadan urinib ko'ring.";

/// Reply sent when anything else goes wrong while handling the payload.
const GENERIC_ERROR_TEXT: &str =
    "❌ Kechirasiz, ma'lumotlarni qayta ishlashda kutilmagan xatolik yuz berdi.\n\
     Iltimos, keyinroq qaytadan urinib ko'ring.";

/// Expression submitted by the Mini App keyboard.
///
/// The schema is owned by the front-end page; every field is optional and
/// absent fields render as placeholders instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpressionPayload {
    pub latex: Option<String>,
    pub text: Option<String>,
    pub user: Option<PayloadUser>,
    pub timestamp: Option<String>,
    pub platform: Option<String>,
    pub version: Option<String>,
}

/// Identity snapshot the Mini App embeds in the payload. May diverge from
/// the transport-level sender; no mismatch detection is attempted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayloadUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub id: Option<i64>,
    pub language_code: Option<String>,
    pub is_premium: Option<bool>,
}

/// Classified payload parse failure.
#[derive(Debug)]
pub enum PayloadError {
    Json(serde_json::Error),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::Json(e) => write!(f, "JSON decode error: {}", e),
        }
    }
}

impl std::error::Error for PayloadError {}

pub fn parse_payload(data: &str) -> Result<ExpressionPayload, PayloadError> {
    serde_json::from_str(data).map_err(PayloadError::Json)
}

/// Display identity after the payload-over-transport fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    pub name: String,
    pub username: String,
    pub user_id: String,
    pub language: String,
    pub is_premium: bool,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Resolves display identity: payload fields win, the transport-level
/// sender fills the gaps, placeholders cover whatever is left.
pub fn resolve_identity(payload_user: Option<&PayloadUser>, sender: Option<&User>) -> ResolvedIdentity {
    let payload_name = payload_user.map(|u| {
        format!(
            "{} {}",
            u.first_name.as_deref().unwrap_or(""),
            u.last_name.as_deref().unwrap_or("")
        )
        .trim()
        .to_string()
    });
    let sender_name = sender.map(|u| {
        format!("{} {}", u.first_name, u.last_name.as_deref().unwrap_or(""))
            .trim()
            .to_string()
    });
    let name = non_empty(payload_name.as_deref())
        .or(non_empty(sender_name.as_deref()))
        .unwrap_or("")
        .to_string();

    let username = non_empty(payload_user.and_then(|u| u.username.as_deref()))
        .or(non_empty(sender.and_then(|u| u.username.as_deref())))
        .unwrap_or(MISSING)
        .to_string();

    let user_id = payload_user
        .and_then(|u| u.id)
        .map(|id| id.to_string())
        .or_else(|| sender.map(|u| u.id.0.to_string()))
        .unwrap_or_else(|| MISSING.to_string());

    let language = non_empty(payload_user.and_then(|u| u.language_code.as_deref()))
        .or(non_empty(sender.and_then(|u| u.language_code.as_deref())))
        .map(|code| code.to_uppercase())
        .unwrap_or_else(|| MISSING.to_string());

    let is_premium = payload_user.and_then(|u| u.is_premium).unwrap_or(false)
        || sender.map(|u| u.is_premium).unwrap_or(false);

    ResolvedIdentity {
        name,
        username,
        user_id,
        language,
        is_premium,
    }
}

/// Re-formats an ISO-8601 timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
/// Anything unparsable is echoed back unchanged.
pub fn format_timestamp(raw: &str) -> String {
    const FMT: &str = "%Y-%m-%d %H:%M:%S UTC";
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc).format(FMT).to_string();
    }
    // The front-end sometimes sends naive timestamps without an offset.
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return naive.format(FMT).to_string();
    }
    raw.to_string()
}

/// Builds the multi-line confirmation message for a parsed payload.
pub fn format_confirmation(payload: &ExpressionPayload, identity: &ResolvedIdentity) -> String {
    let latex = payload.latex.as_deref().unwrap_or(MISSING);
    let text = payload.text.as_deref().unwrap_or(MISSING);
    let time = payload
        .timestamp
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_else(|| MISSING.to_string());
    let platform = payload.platform.as_deref().unwrap_or(UNKNOWN);
    let version = payload.version.as_deref().unwrap_or(UNKNOWN);

    let username = if identity.username == MISSING {
        "yoq"
    } else {
        identity.username.as_str()
    };
    let premium = if identity.is_premium { "✨ Ha" } else { "Yo'q" };

    format!(
        "✅ *Matematik Ifoda Qabul Qilindi!*\n\n\
         📊 *Ifoda Tafsilotlari:*\n\
         • LaTeX: `{latex}`\n\
         • Oddiy Matn: `{text}`\n\n\
         👤 *Foydalanuvchi Ma'lumotlari:*\n\
         • Ism: {name}\n\
         • Foydalanuvchi nomi: @{username}\n\
         • Foydalanuvchi ID: `{user_id}`\n\
         • Til: {language}\n\
         • Premium: {premium}\n\n\
         🕐 *Metadata:*\n\
         • Vaqt: {time}\n\
         • Platforma: {platform}\n\
         • WebApp Versiyasi: {version}\n\n\
         🎯 Siz istalgan vaqtda boshqa ifoda yuborishingiz mumkin!",
        latex = latex,
        text = text,
        name = identity.name,
        username = username,
        user_id = identity.user_id,
        language = identity.language,
        premium = premium,
        time = time,
        platform = platform,
        version = version,
    )
}

/// Endpoint for messages carrying Mini App data.
///
/// Nothing may escape past this handler: parse failures get the fixed
/// localized reply, everything else gets the generic one.
pub async fn handle_web_app_data(bot: Bot, msg: Message) -> ResponseResult<()> {
    let Some(web_app_data) = msg.web_app_data() else {
        return Ok(());
    };
    let data = &web_app_data.data;
    info!("Received Web App data: {}", data);

    let payload = match parse_payload(data) {
        Ok(payload) => payload,
        Err(e) => {
            error!("{}", e);
            let _ = bot
                .send_message(msg.chat.id, PARSE_ERROR_TEXT)
                .parse_mode(ParseMode::Markdown)
                .await;
            return Ok(());
        }
    };

    if let Err(e) = reply_with_confirmation(&bot, &msg, &payload).await {
        error!("Error handling web app data: {}", e);
        let _ = bot
            .send_message(msg.chat.id, GENERIC_ERROR_TEXT)
            .parse_mode(ParseMode::Markdown)
            .await;
    }

    Ok(())
}

async fn reply_with_confirmation(
    bot: &Bot,
    msg: &Message,
    payload: &ExpressionPayload,
) -> ResponseResult<()> {
    let identity = resolve_identity(payload.user.as_ref(), msg.from.as_ref());
    let confirmation = format_confirmation(payload, &identity);

    bot.send_message(msg.chat.id, confirmation)
        .parse_mode(ParseMode::Markdown)
        .await?;

    let sender_id = msg
        .from
        .as_ref()
        .map(|u| u.id.0.to_string())
        .unwrap_or_else(|| msg.chat.id.to_string());
    info!(
        "User {} ({}) sent expression: {} [LaTeX: {}] from platform: {}",
        sender_id,
        identity.name,
        payload.text.as_deref().unwrap_or(MISSING),
        payload.latex.as_deref().unwrap_or(MISSING),
        payload.platform.as_deref().unwrap_or(UNKNOWN),
    );

    Ok(())
}
