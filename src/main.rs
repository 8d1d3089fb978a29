use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use erica_tutor::{logging, render, Config, LazyEngine, MarkdownEngine, RenderMode, Rendered, TutorClient};

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use cli::{AskFormat, Cli, Commands, ConfigAction};

const TICK_RATE: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_path = match &cli.log_file {
        Some(path) => Ok(path.clone()),
        None => logging::default_log_path(),
    };
    if let Err(e) = log_path.and_then(|path| logging::init_tracing(&path)) {
        eprintln!("warning: logging disabled: {}", e);
    }

    let saved = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "could not read config, using defaults");
            Config::default()
        }
    };

    let result = match &cli.command {
        Some(Commands::Config { action }) => run_config(&cli, saved, action),
        Some(Commands::Ask { format, .. }) => {
            let question = cli.question().unwrap_or_default();
            ask_once(cli.apply(saved), &question, *format).await
        }
        None => run_tui(cli.apply(saved)).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "exiting with error");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn config_path(custom: Option<&std::path::Path>) -> Result<PathBuf> {
    match custom {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::get_config_path(),
    }
}

fn load_config(custom: Option<&std::path::Path>) -> Result<Config> {
    Config::load_from(&config_path(custom)?)
}

fn build_client(config: &Config) -> Result<TutorClient> {
    Ok(match config.request_timeout() {
        Some(timeout) => TutorClient::with_timeout(config.endpoint(), timeout)?,
        None => TutorClient::new(config.endpoint()),
    })
}

fn run_config(cli: &Cli, mut config: Config, action: &ConfigAction) -> Result<ExitCode> {
    let path = config_path(cli.config.as_deref())?;
    match action {
        ConfigAction::Show => {
            println!("endpoint      {}", config.endpoint());
            println!("render_mode   {}", config.render_mode());
            match config.request_timeout_secs {
                Some(secs) => println!("timeout       {}s", secs),
                None => println!("timeout       none"),
            }
            match &config.theme_path {
                Some(theme) => println!("theme         {}", theme.display()),
                None => println!("theme         default"),
            }
        }
        ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            config.save_to(&path)?;
            tracing::info!(key = %key, "config updated");
            println!("Saved {} to {}", key, path.display());
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}

/// One question, one answer on stdout.
async fn ask_once(config: Config, question: &str, format: AskFormat) -> Result<ExitCode> {
    if question.trim().is_empty() {
        eprintln!("Please ask a question.");
        return Ok(ExitCode::FAILURE);
    }

    let client = build_client(&config)?;
    let mode = config.render_mode();

    let mut engine = LazyEngine::new();
    if mode == RenderMode::Markdown {
        let theme_path = config.theme_path.clone();
        engine.ensure_loading(move || MarkdownEngine::load_or_default(theme_path));
    }

    let answer = match client.ask(question).await {
        Ok(answer) => answer,
        Err(e) => {
            tracing::error!(error = %e, endpoint = %client.endpoint(), "ask failed");
            eprintln!("Failed to get an answer. Check the log for details.");
            return Ok(ExitCode::FAILURE);
        }
    };

    let engine = engine.wait().await;
    match format {
        AskFormat::Html => {
            if let Some(html) = render::render_html(mode, engine, &answer) {
                println!("{}", html);
            }
        }
        AskFormat::Text => {
            if let Rendered::Text(text) = render::render_content(mode, engine, &answer) {
                for line in text.lines {
                    let line: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
                    println!("{}", line);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_tui(config: Config) -> Result<ExitCode> {
    let client = build_client(&config)?;
    let mut app = App::new(client, config.render_mode());
    app.load_engine(config.theme_path.clone());
    tracing::info!(endpoint = %app.endpoint(), mode = %app.render_mode, "starting chat");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new(TICK_RATE);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result.map(|_| ExitCode::SUCCESS)
}

async fn run_loop(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut tui::EventHandler,
) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
