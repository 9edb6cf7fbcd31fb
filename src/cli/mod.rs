//! CLI commands for chainchat using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{load_settings, Settings};
use crate::core::handle_chat;
use crate::logging::LogOptions;
use crate::oracle::supported_symbols;
use crate::web::{run_server, AppState};

/// chainchat - natural-language commands for a smart-contract chain.
#[derive(Parser)]
#[command(name = "chainchat")]
#[command(version)]
#[command(about = "Chat bridge between users, a smart-contract chain and a price oracle", long_about = None)]
pub struct Commands {
    /// Settings file (defaults to ~/.chainchat/settings.json)
    #[arg(long, global = true, env = "CHAINCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write the log file as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Log directory (defaults to the platform data dir)
    #[arg(long, global = true, env = "CHAINCHAT_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Bind address (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port (overrides server.port and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Interpret and resolve one message, printing the result
    Chat {
        /// Message to interpret
        message: String,

        /// Wallet of the user sending the message
        #[arg(short, long)]
        sender: Option<String>,
    },

    /// Print oracle quotes
    Price {
        /// Symbols to quote (BTC, ETH, ...)
        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// List the symbols the oracle can quote
    Supported,

    /// Show the effective configuration with secrets redacted
    Config,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Command::Serve { host, port } => {
                let settings = self.settings()?;
                cmd_serve(&settings, host.as_deref(), *port).await
            }
            Command::Chat { message, sender } => {
                let settings = self.settings()?;
                cmd_chat(&settings, message, sender.as_deref()).await
            }
            Command::Price { symbols } => {
                let settings = self.settings()?;
                cmd_price(&settings, symbols).await
            }
            Command::Supported => cmd_supported(),
            Command::Config => cmd_config(&self.settings()?),
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            json: self.log_json,
            dir: self.log_dir.clone(),
            level: self.log_level.clone(),
        }
    }

    fn settings(&self) -> Result<Settings> {
        load_settings(self.config.as_deref()).context("Failed to load settings")
    }
}

// Command implementations

async fn cmd_serve(settings: &Settings, host: Option<&str>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or(&settings.server.host);
    let port = port.unwrap_or(settings.server.port);

    let state = AppState::from_settings(settings)?;

    println!("Starting chainchat on {}:{}...", host, port);
    println!("  http://{}:{}/chat", host, port);
    println!("  http://{}:{}/health", host, port);
    println!();
    println!("Press Ctrl+C to stop");

    run_server(state, host, port).await?;
    Ok(())
}

async fn cmd_chat(settings: &Settings, message: &str, sender: Option<&str>) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    let interpreter = state
        .interpreter
        .as_ref()
        .context("LLM no configurado (set DEEPSEEK_API_KEY)")?;

    let intent = handle_chat(interpreter, &state.resolver, message, sender).await?;
    println!("{}", serde_json::to_string_pretty(&intent)?);
    Ok(())
}

async fn cmd_price(settings: &Settings, symbols: &[String]) -> Result<()> {
    let state = AppState::from_settings(settings)?;
    let result = state.oracle.quotes(symbols).await?;

    for quote in &result.prices {
        println!(
            "{:<6} ${:<14.4} ±{:.4} ({:.3}%) volatility={}",
            quote.symbol,
            quote.price,
            quote.confidence,
            quote.confidence_percentage,
            quote.volatility.label()
        );
    }
    for err in &result.errors {
        println!("{:<6} {}", err.symbol, err.error);
    }
    Ok(())
}

fn cmd_supported() -> Result<()> {
    println!("{}", supported_symbols().join(", "));
    Ok(())
}

fn cmd_config(settings: &Settings) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
    Ok(())
}
