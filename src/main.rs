// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Quill - streaming LLM chat for your terminal
//!
//! Entry point for the Quill CLI application.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;

use quill::attachments;
use quill::cli::{ChatArgs, Cli, Commands, SessionsArgs};
use quill::client::SamplingParams;
use quill::config::Settings;
use quill::error::{QuillError, Result};
use quill::limiter::RateLimiter;
use quill::provider::ProviderRegistry;
use quill::session::ChatSession;
use quill::store::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    // `-v` enables crate diagnostics without requiring target names up
    // front. `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        if let Ok(directive) = "quill=debug".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = Settings::load()?;
    Settings::ensure_directories()?;

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await,
        Some(Commands::Chat(args)) => run_chat(args, settings).await,
        Some(Commands::Sessions(args)) => run_sessions(args),
    }
}

/// Run interactive chat mode
async fn run_chat(args: ChatArgs, settings: Settings) -> Result<()> {
    let registry = ProviderRegistry::builtin();
    let provider_name = args
        .provider
        .unwrap_or_else(|| settings.defaults.provider.clone());
    let mut provider = registry.get(&provider_name)?.clone();
    if let Some(model) = args.model {
        provider.model = model;
    }

    let credential = Settings::api_key_for(&provider_name)
        .ok_or_else(|| QuillError::MissingCredential(provider_name.clone()))?;

    let params = SamplingParams {
        temperature: args.temperature.unwrap_or(settings.defaults.temperature),
        repetition_penalty: args
            .repetition_penalty
            .unwrap_or(settings.defaults.repetition_penalty),
    };
    let preamble = args
        .preamble
        .unwrap_or_else(|| settings.defaults.preamble.clone());

    // First prompt carries the attachment text, if any survives extraction.
    let mut pending_attachment = match args.attach {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            let text = attachments::extract_text(attachments::media_type_for_path(&path), &bytes);
            if text.is_empty() {
                eprintln!("warning: no text extracted from {}", path.display());
                None
            } else {
                Some(text)
            }
        }
        None => None,
    };

    let store = Arc::new(SessionStore::open(Settings::sessions_dir())?);
    let limiter = Arc::new(RateLimiter::new(
        settings.rate_limit.max_calls,
        settings.rate_limit_window(),
    ));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut stdout = std::io::stdout();
        while let Some(delta) = rx.recv().await {
            let _ = write!(stdout, "{delta}");
            let _ = stdout.flush();
        }
    });

    let mut builder = ChatSession::builder()
        .with_provider(provider)
        .with_credential(credential)
        .with_preamble(preamble)
        .with_params(params)
        .with_store(store)
        .with_limiter(limiter)
        .with_delta_sink(tx);
    if let Some(id) = args.resume {
        builder = builder.resume(id);
    }
    let mut session = builder.build()?;

    println!("quill - chatting via {provider_name} (session {})", session.id());
    println!("type 'exit' to quit, '/new' to start a fresh session\n");

    // Replay the transcript when resuming
    for message in session.history()? {
        println!("{}: {}\n", message.role, message.content);
    }

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "exit" | "quit" => break,
            "/new" => {
                let id = session.new_chat();
                println!("started new session {id}");
                continue;
            }
            _ => {}
        }

        match session.submit(input, pending_attachment.as_deref()).await {
            Ok(_) => {
                // Attachment text is part of the persisted turn now
                pending_attachment = None;
                println!("\n");
            }
            Err(e) => {
                eprintln!("\nerror: {e}");
            }
        }
    }

    Ok(())
}

/// List or delete stored sessions
fn run_sessions(args: SessionsArgs) -> Result<()> {
    let store = SessionStore::open(Settings::sessions_dir())?;

    if let Some(id) = args.delete {
        if store.delete(id)? {
            println!("deleted session {id}");
        } else {
            println!("no session {id}");
        }
        return Ok(());
    }

    let summaries = store.list()?;
    if summaries.is_empty() {
        println!("no stored sessions");
        return Ok(());
    }
    for summary in summaries {
        println!(
            "{}  {}  {} message{}",
            summary.id,
            summary.timestamp.format("%Y-%m-%d %H:%M:%S"),
            summary.message_count,
            if summary.message_count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
