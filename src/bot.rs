use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, InlineKeyboardButton, InlineKeyboardMarkup, MenuButton, ParseMode, WebAppInfo,
};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::config::Config;
use crate::webapp;

const KEYBOARD_BUTTON_TEXT: &str = "🧮 Matematik Klaviaturani Ochish (Ma'lumot bilan)";
const MENU_BUTTON_TEXT: &str = "🧮 Klaviatura";

const HELP_TEXT: &str = "📚 *Matematik Klaviatura Boti - Yordam*\n\n\
    Ushbu bot maxsus matematik klaviatura interfeysini taqdim etadi.\n\n\
    *Buyruqlar:*\n\
    /start - Matematik klaviaturani ochish\n\
    /help - Ushbu yordam xabarini ko'rsatish\n\n\
    *Foydalanish bo'yicha ko'rsatma:*\n\
    1. '🧮 Matematik Klaviaturani Ochish' tugmasini bosing\n\
    2. Matematik ifodangizni kiritish uchun maxsus klaviaturadan foydalaning\n\
    3. Mobil klaviaturangiz aralashmaydi\n\
    4. Tayyor bo'lganda ifodangizni yuboring\n\n\
    Matematikadan bahramand bo'ling! 🎯";

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Mavjud buyruqlar:")]
pub enum Command {
    #[command(description = "matematik klaviaturani ochish")]
    Start,
    #[command(description = "yordam xabarini ko'rsatish")]
    Help,
}

/// Handler tree for the dispatcher. Web App data is checked first so the
/// Mini App branch always wins over plain text.
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.web_app_data().is_some())
                .endpoint(webapp::handle_web_app_data),
        )
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

/// Start the Telegram bot and block until interrupted.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let bot = Bot::new(&config.bot_token);

    if let Err(e) = register_commands(&bot).await {
        warn!("Failed to register bot commands: {}", e);
    }
    if let Err(e) = setup_menu_button(&bot, &config.web_app_url).await {
        warn!("Failed to set chat menu button: {}", e);
    }

    info!("Starting Telegram bot...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![config])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    config: Arc<Config>,
) -> ResponseResult<()> {
    info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

    match cmd {
        Command::Start => send_welcome(&bot, &msg, &config).await?,
        Command::Help => {
            bot.send_message(msg.chat.id, HELP_TEXT)
                .parse_mode(ParseMode::Markdown)
                .await?;
        }
    }

    Ok(())
}

async fn send_welcome(bot: &Bot, msg: &Message, config: &Config) -> ResponseResult<()> {
    let first_name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .unwrap_or("");

    let mut request = bot
        .send_message(msg.chat.id, welcome_text(first_name))
        .parse_mode(ParseMode::Markdown);

    match math_keyboard(&config.web_app_url) {
        Some(keyboard) => request = request.reply_markup(keyboard),
        None => warn!(
            "WEB_APP_URL is not a valid URL, sending /start without the keyboard button: {}",
            config.web_app_url
        ),
    }

    request.await?;
    Ok(())
}

fn welcome_text(first_name: &str) -> String {
    format!(
        "👋 Salom {first_name}!\n\n\
         Matematika Klaviaturasi Mini Ilovasiga xush kelibsiz!\n\n\
         📱 **Quyidagi tugmani bosing:**\n\
         • '🧮 Matematik Klaviaturani Ochish' - Foydalanuvchi ma'lumotlari bilan\n\n\
         Siz telefoningizning oddiy klaviaturasi aralashmasdan maxsus matematik \
         klaviaturani ko'rasiz!"
    )
}

/// One-row inline keyboard with the Mini App button. `None` when the
/// configured URL does not parse.
fn math_keyboard(web_app_url: &str) -> Option<InlineKeyboardMarkup> {
    let url = web_app_url.parse().ok()?;
    Some(InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::web_app(KEYBOARD_BUTTON_TEXT, WebAppInfo { url }),
    ]]))
}

/// Registers /start and /help in the Telegram command menu.
async fn register_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![
        BotCommand::new("start", "matematik klaviaturani ochish"),
        BotCommand::new("help", "yordam xabarini ko'rsatish"),
    ])
    .await?;
    Ok(())
}

/// Points the chat menu button at the Mini App, so the keyboard opens
/// without /start as well.
async fn setup_menu_button(bot: &Bot, web_app_url: &str) -> Result<(), teloxide::RequestError> {
    let url = match web_app_url.parse() {
        Ok(url) => url,
        Err(e) => {
            warn!("WEB_APP_URL is not a valid URL, keeping the default menu button: {}", e);
            return Ok(());
        }
    };

    bot.set_chat_menu_button()
        .menu_button(MenuButton::WebApp {
            text: MENU_BUTTON_TEXT.to_string(),
            web_app: WebAppInfo { url },
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_keyboard_has_single_web_app_button() {
        let kb = math_keyboard("https://math.example/index.html").unwrap();

        assert_eq!(kb.inline_keyboard.len(), 1);
        assert_eq!(kb.inline_keyboard[0].len(), 1);

        let button = &kb.inline_keyboard[0][0];
        assert_eq!(button.text, KEYBOARD_BUTTON_TEXT);
        match &button.kind {
            InlineKeyboardButtonKind::WebApp(info) => {
                assert_eq!(info.url.as_str(), "https://math.example/index.html");
            }
            other => panic!("expected a web_app button, got {:?}", other),
        }
    }

    #[test]
    fn test_keyboard_none_for_invalid_url() {
        assert!(math_keyboard("not a url").is_none());
    }

    #[test]
    fn test_placeholder_url_still_builds_a_button() {
        // The placeholder parses fine; startup only warns about it.
        assert!(math_keyboard(crate::config::WEB_APP_URL_PLACEHOLDER).is_some());
    }

    #[test]
    fn test_welcome_text_templates_first_name() {
        let text = welcome_text("Aziz");
        assert!(text.starts_with("👋 Salom Aziz!"));
        // Same input, same output: the reply is deterministic.
        assert_eq!(text, welcome_text("Aziz"));
    }

    #[test]
    fn test_commands_parse() {
        assert!(matches!(
            Command::parse("/start", "mathboard_bot"),
            Ok(Command::Start)
        ));
        assert!(matches!(
            Command::parse("/help", "mathboard_bot"),
            Ok(Command::Help)
        ));
        assert!(Command::parse("2+2", "mathboard_bot").is_err());
    }
}
