//! colloquy: terminal chat client for an agent/tool-orchestration backend.
//!
//! Thin presentation layer over `colloquy-core`: reads stdin lines, prints
//! conversation and notice updates, and calls `send` on the session handle.

use std::path::Path;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use colloquy_common::{NoticeLevel, NoticeQueue};
use colloquy_core::{config, ChatClient, ChatConfig, Role};

#[derive(Parser)]
#[command(name = "colloquy", version, about = "Chat client for an agent/tool backend")]
struct Args {
    /// Config file path override.
    #[arg(long)]
    config: Option<String>,

    /// Backend WebSocket URL override.
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquy=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut chat_config = match &args.config {
        Some(path) => match config::load_from_path(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load config");
                std::process::exit(1);
            }
        },
        None => config::load_config().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Using default config");
            ChatConfig::default()
        }),
    };
    if let Some(url) = args.url {
        chat_config.endpoint.url = url;
    }

    let (client, mut notices) = ChatClient::new(chat_config);
    client.connect().await;

    // Print non-user turns as they land (including placeholder resolution).
    let mut messages_rx = client.subscribe_messages();
    tokio::spawn(async move {
        let mut last_printed = String::new();
        while messages_rx.changed().await.is_ok() {
            let tail = messages_rx.borrow().last().cloned();
            if let Some(message) = tail {
                if message.role == Role::User {
                    continue;
                }
                let line = format!(
                    "[{}] agent: {}",
                    message.timestamp.format("%H:%M:%S"),
                    message.content
                );
                if line != last_printed {
                    println!("{line}");
                    last_printed = line;
                }
            }
        }
    });

    let recent = Arc::new(Mutex::new(NoticeQueue::default()));
    let recent_writer = recent.clone();
    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            match notice.level {
                NoticeLevel::Info => println!("* {}\n{}", notice.title, notice.body),
                NoticeLevel::Error => eprintln!("! {}: {}", notice.title, notice.body),
            }
            recent_writer.lock().unwrap().push(notice);
        }
    });

    println!("Type a message, /tools for the tool list, /notices for recent notices, /connect to retry, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line {
            "/quit" => break,
            "/connect" => client.connect().await,
            "/notices" => {
                let mut queue = recent.lock().unwrap();
                if queue.is_empty() {
                    println!("No recent notices.");
                }
                for notice in queue.visible() {
                    println!("{}: {}", notice.title, notice.body);
                }
            }
            "/tools" => {
                let groups = client.tools_by_category();
                if groups.is_empty() {
                    println!("No tools advertised yet.");
                }
                for (category, tools) in groups {
                    println!("{category}");
                    for tool in tools {
                        println!("  {} ({}): {}", tool.name, tool.provider_name, tool.description);
                    }
                }
            }
            text => {
                if let Err(e) = client.send(text).await {
                    eprintln!("! send failed: {e}");
                }
            }
        }
    }

    client.disconnect().await;
}
