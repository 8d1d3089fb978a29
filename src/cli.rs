use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use erica_tutor::{Config, RenderMode};

#[derive(Parser, Debug)]
#[command(name = "erica")]
#[command(version, about = "Chat with the Erica tutoring assistant from your terminal")]
pub struct Cli {
    /// Tutor endpoint that answers questions
    #[arg(long, env = "ERICA_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// How assistant answers are displayed (plain, html, markdown)
    #[arg(short, long, global = true)]
    pub render: Option<RenderMode>,

    /// Give up on a request after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Read settings from this file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write the log here instead of the default location
    #[arg(long, env = "ERICA_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Your question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = AskFormat::Text)]
        format: AskFormat,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the current settings
    Show,
    /// Change a setting (endpoint, render_mode, timeout, theme). An empty value unsets it.
    Set { key: String, value: String },
    /// Print where settings are stored
    Path,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskFormat {
    /// Rendered for the terminal
    Text,
    /// HTML fragment
    Html,
}

impl Cli {
    /// Fold command-line overrides over the saved settings.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if let Some(render) = self.render {
            config.render_mode = Some(render);
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        config
    }

    pub fn question(&self) -> Option<String> {
        match &self.command {
            Some(Commands::Ask { question, .. }) => Some(question.join(" ")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_starts_chat() {
        let cli = Cli::try_parse_from(["erica"]).unwrap();
        assert!(cli.command.is_none());
        let config = cli.apply(Config::default());
        assert_eq!(config.endpoint(), "http://localhost:5000/ask");
        assert_eq!(config.render_mode(), RenderMode::Markdown);
    }

    #[test]
    fn test_flags_override_saved_settings() {
        let cli = Cli::try_parse_from([
            "erica",
            "--endpoint",
            "http://tutor.local/ask",
            "-r",
            "html",
            "--timeout",
            "30",
        ])
        .unwrap();

        let saved = Config {
            endpoint: Some("http://saved/ask".into()),
            render_mode: Some(RenderMode::Plain),
            ..Config::default()
        };
        let config = cli.apply(saved);
        assert_eq!(config.endpoint(), "http://tutor.local/ask");
        assert_eq!(config.render_mode(), RenderMode::Html);
        assert_eq!(config.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::try_parse_from(["erica", "ask", "what", "is", "2+2?", "--format", "html"]).unwrap();
        assert_eq!(cli.question().as_deref(), Some("what is 2+2?"));
        match cli.command {
            Some(Commands::Ask { format, .. }) => assert_eq!(format, AskFormat::Html),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["erica", "ask"]).is_err());
    }

    #[test]
    fn test_config_set_parses() {
        let cli = Cli::try_parse_from(["erica", "config", "set", "render", "plain"]).unwrap();
        match cli.command {
            Some(Commands::Config { action: ConfigAction::Set { key, value } }) => {
                assert_eq!(key, "render");
                assert_eq!(value, "plain");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
