// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Quill - streaming LLM chat for your terminal
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(version, about = "Streaming LLM chat for your terminal")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// List or delete stored sessions
    Sessions(SessionsArgs),
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Provider to use (e.g. "deepseek", "openrouter")
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Override the provider's default model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Repetition penalty
    #[arg(long)]
    pub repetition_penalty: Option<f32>,

    /// System preamble override
    #[arg(long)]
    pub preamble: Option<String>,

    /// Text file whose content is prepended to the first prompt
    #[arg(short, long)]
    pub attach: Option<PathBuf>,

    /// Resume an existing session by id
    #[arg(short, long)]
    pub resume: Option<Uuid>,
}

/// Arguments for the sessions subcommand
#[derive(clap::Args, Debug, Default)]
pub struct SessionsArgs {
    /// Delete the session with this id instead of listing
    #[arg(long)]
    pub delete: Option<Uuid>,
}
