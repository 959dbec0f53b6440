use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Literal value the token defaults to when nothing is configured.
/// Startup refuses to run the bot while the token still equals this.
pub const BOT_TOKEN_PLACEHOLDER: &str = "YOUR_BOT_TOKEN_HERE";

/// Literal value the Mini App URL defaults to when nothing is configured.
/// The bot still runs with it, but the keyboard button leads nowhere.
pub const WEB_APP_URL_PLACEHOLDER: &str = "https://your-domain.com/index.html";

/// Resolved runtime configuration.
///
/// Sources, in order of precedence: process environment (`BOT_TOKEN`,
/// `WEB_APP_URL`), then an optional `config.toml`, then the placeholder
/// defaults above.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub web_app_url: String,
}

/// Shape of the optional settings file.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    telegram: TelegramSection,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramSection {
    bot_token: Option<String>,
    web_app_url: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            FileConfig::default()
        };

        Ok(Self::from_sources(
            std::env::var("BOT_TOKEN").ok(),
            std::env::var("WEB_APP_URL").ok(),
            file,
        ))
    }

    fn from_sources(env_token: Option<String>, env_url: Option<String>, file: FileConfig) -> Self {
        Self {
            bot_token: env_token
                .or(file.telegram.bot_token)
                .unwrap_or_else(|| BOT_TOKEN_PLACEHOLDER.to_string()),
            web_app_url: env_url
                .or(file.telegram.web_app_url)
                .unwrap_or_else(|| WEB_APP_URL_PLACEHOLDER.to_string()),
        }
    }

    pub fn token_is_placeholder(&self) -> bool {
        self.bot_token == BOT_TOKEN_PLACEHOLDER
    }

    pub fn url_is_placeholder(&self) -> bool {
        self.web_app_url == WEB_APP_URL_PLACEHOLDER
    }
}

/// Operator guidance printed when startup aborts on a placeholder token.
pub fn print_setup_guidance() {
    eprintln!();
    eprintln!("⚠️  ERROR: BOT_TOKEN not configured!");
    eprintln!("Please set your bot token:");
    eprintln!("  export BOT_TOKEN='your-token-here'");
    eprintln!();
    eprintln!("Or create a config.toml with:");
    eprintln!("  [telegram]");
    eprintln!("  bot_token = \"your-token-here\"");
    eprintln!("  web_app_url = \"https://your-domain.com/index.html\"");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_placeholders() {
        let config = Config::from_sources(None, None, FileConfig::default());
        assert!(config.token_is_placeholder());
        assert!(config.url_is_placeholder());
    }

    #[test]
    fn test_env_wins_over_file() {
        let file: FileConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "file-token"
            web_app_url = "https://file.example/app.html"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            Some("env-token".to_string()),
            Some("https://env.example/app.html".to_string()),
            file,
        );
        assert_eq!(config.bot_token, "env-token");
        assert_eq!(config.web_app_url, "https://env.example/app.html");
    }

    #[test]
    fn test_file_used_when_env_absent() {
        let file: FileConfig = toml::from_str(
            r#"
            [telegram]
            bot_token = "file-token"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(None, None, file);
        assert_eq!(config.bot_token, "file-token");
        // URL not in the file either, so it stays at the placeholder.
        assert!(config.url_is_placeholder());
    }

    #[test]
    fn test_empty_file_parses() {
        let file: FileConfig = toml::from_str("").unwrap();
        let config = Config::from_sources(None, None, file);
        assert!(config.token_is_placeholder());
    }

    #[test]
    fn test_configured_values_are_not_placeholders() {
        let config = Config::from_sources(
            Some("123456:real-token".to_string()),
            Some("https://math.example/index.html".to_string()),
            FileConfig::default(),
        );
        assert!(!config.token_is_placeholder());
        assert!(!config.url_is_placeholder());
    }
}
