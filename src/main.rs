use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use lingua_relay::app::{Controller, RelayClient};
use lingua_relay::config::Config;
use lingua_relay::gemini::GeminiClient;
use lingua_relay::prompt::{Mode, Style};
use lingua_relay::{languages, relay, ui};

#[derive(Parser)]
#[command(name = "lingua-relay", version, about = "Stream translations and paraphrases through Gemini")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the relay server.
    Serve {
        /// Address to bind, e.g. 127.0.0.1:3000
        #[arg(long)]
        listen: Option<String>,
    },
    /// Translate text through the relay.
    Translate {
        /// Source language code, or "auto"
        #[arg(long, default_value = "auto")]
        from: String,
        /// Target language code
        #[arg(long, default_value = "en")]
        to: String,
        #[command(flatten)]
        common: ClientArgs,
    },
    /// Rewrite text in its own language.
    Paraphrase {
        /// Language of the text, or "auto"
        #[arg(long, default_value = "auto")]
        lang: String,
        #[command(flatten)]
        common: ClientArgs,
    },
    /// List supported language codes.
    Languages,
    /// Store the Gemini API key in the config file.
    SetKey { key: String },
}

#[derive(Args)]
struct ClientArgs {
    /// Casual, Formal, Professional, Creative, Humorous, Academic, Technical, Conversational
    #[arg(long, default_value = "Formal")]
    style: String,
    /// Copy the finished result to the clipboard
    #[arg(long)]
    copy: bool,
    /// Relay endpoint URL (overrides config)
    #[arg(long)]
    relay: Option<String>,
    /// Text to process; read from stdin when omitted
    text: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut config = Config::load();

    match cli.command {
        Command::Serve { listen } => {
            if let Some(addr) = listen {
                config.listen_addr = addr;
            }
            if config.gemini_api_key.is_empty() {
                log::warn!("No Gemini API key set; requests will fail until one is configured");
            }
            log::info!("Lingua relay starting (model {})", config.model);
            let listener = tokio::net::TcpListener::bind(&config.listen_addr)
                .await
                .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
            relay::serve(listener, Arc::new(GeminiClient::new(&config))).await
        }
        Command::Translate { from, to, common } => {
            let mut controller = client_for(&config, &common)?;
            controller.set_mode(Mode::Translate);
            controller.set_source_language(&from)?;
            controller.set_target_language(&to)?;
            run_client(controller, common.copy).await
        }
        Command::Paraphrase { lang, common } => {
            let mut controller = client_for(&config, &common)?;
            controller.set_mode(Mode::Paraphrase);
            controller.set_source_language(&lang)?;
            run_client(controller, common.copy).await
        }
        Command::Languages => {
            for lang in languages::LANGUAGES {
                println!("{:<4}{:<20}{}", lang.code, lang.name, lang.native);
            }
            Ok(())
        }
        Command::SetKey { key } => {
            config.gemini_api_key = key.trim().to_string();
            config.save().map_err(|e| anyhow::anyhow!("Failed to save config: {e}"))?;
            println!("Saved API key to {}", Config::path().display());
            Ok(())
        }
    }
}

fn client_for(config: &Config, args: &ClientArgs) -> Result<Controller> {
    let url = args.relay.clone().unwrap_or_else(|| config.relay_url.clone());
    let mut controller = Controller::new(RelayClient::new(url));
    controller.set_style(Style::from(args.style.clone()));

    let text = if args.text.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read text from stdin")?;
        buf
    } else {
        args.text.join(" ")
    };
    controller.set_input(text);
    Ok(controller)
}

async fn run_client(mut controller: Controller, copy: bool) -> Result<()> {
    controller.submit()?;
    ui::stream_to_terminal(&mut controller, &mut std::io::stdout()).await?;
    if copy {
        ui::copy_result(&controller);
    }
    Ok(())
}
