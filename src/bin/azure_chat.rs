use std::io::{self, Write};

use azure_openai_runtime::{
    AzureOpenAiAdapter, ChatAdapter, ChatMessage, ChatOptions, ChatRequest, StreamEventType,
};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "gpt-4o";
const MODEL_ENV: &str = "AZURE_CHAT_MODEL";

struct CliConfig {
    model: String,
    max_tokens: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = parse_config(std::env::args().skip(1).collect())?;
    let adapter = AzureOpenAiAdapter::from_env()
        .map_err(|e| format!("failed to build Azure adapter: {e}"))?;

    eprintln!(
        "azure_chat: endpoint={}, model={}, commands=/exit /quit /clear /models",
        adapter.redacted_endpoint(),
        config.model
    );

    let mut history: Vec<ChatMessage> = Vec::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        let bytes = stdin.read_line(&mut input)?;
        if bytes == 0 {
            break;
        }

        let user_text = input.trim();
        if user_text.is_empty() {
            continue;
        }

        if user_text.eq_ignore_ascii_case("/exit") || user_text.eq_ignore_ascii_case("/quit") {
            break;
        }

        if user_text.eq_ignore_ascii_case("/clear") {
            history.clear();
            println!("(history cleared)");
            continue;
        }

        if user_text.eq_ignore_ascii_case("/models") {
            for model in adapter.catalog().iter() {
                let marker = if model.enabled_by_default { "*" } else { " " };
                println!("{marker} {:<18} {}", model.id, model.display_name);
            }
            continue;
        }

        let checkpoint_len = history.len();
        history.push(ChatMessage::user(user_text));

        let mut request = ChatRequest::new(config.model.clone(), history.clone());
        request.max_tokens = config.max_tokens;

        let response = match adapter.chat(request, ChatOptions::default()).await {
            Ok(response) => response,
            Err(err) => {
                eprintln!("error: {err}");
                history.truncate(checkpoint_len);
                continue;
            }
        };

        let mut events = response.into_events();
        let mut reply = String::new();
        let mut turn_failed = false;

        while let Some(event) = events.next().await {
            match event.event {
                StreamEventType::Text => {
                    if let Some(text) = event.as_text() {
                        print!("{text}");
                        io::stdout().flush()?;
                        reply.push_str(text);
                    }
                }
                StreamEventType::ToolCalls => {
                    println!("\n[tool_calls emitted: {}]", event.data);
                }
                StreamEventType::Error => {
                    eprintln!("\nerror: {}", event.data);
                    turn_failed = true;
                }
                StreamEventType::Stop | StreamEventType::Data => {}
            }
        }

        if !reply.ends_with('\n') {
            println!();
        }

        if turn_failed {
            history.truncate(checkpoint_len);
        } else {
            history.push(ChatMessage::assistant(reply));
        }
    }

    Ok(())
}

fn parse_config(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut model = std::env::var(MODEL_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let mut max_tokens = None;

    let mut i = 0usize;
    while i < args.len() {
        match args[i].as_str() {
            "--model" => {
                let value = args
                    .get(i + 1)
                    .ok_or("missing value for --model")?
                    .trim()
                    .to_string();
                if value.is_empty() {
                    return Err("--model must be non-empty".into());
                }
                model = value;
                i += 2;
            }
            "--max-tokens" => {
                let value = args.get(i + 1).ok_or("missing value for --max-tokens")?;
                max_tokens = Some(
                    value
                        .parse::<u32>()
                        .map_err(|_| "--max-tokens must be a positive integer")?,
                );
                i += 2;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    Ok(CliConfig { model, max_tokens })
}

fn print_help() {
    println!(
        "Usage:\n  cargo run --bin azure_chat -- [--model MODEL] [--max-tokens N]\n\nEnv:\n  AZURE_ENDPOINT\n  AZURE_API_KEY\n  AZURE_API_VERSION (default 2024-02-15-preview)\n  AZURE_CHAT_MODEL\n  DEBUG_AZURE_CHAT_COMPLETION=1 logs raw stream chunks at debug level\n  RUST_LOG\n\nCommands:\n  /models  list catalog models (* = enabled by default)\n  /clear   clear conversation history\n  /exit    quit\n  /quit    quit"
    );
}
