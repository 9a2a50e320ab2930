// Copyright 2020. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! # ZChat console
//!
//! An interactive client for memo messaging over a shielded node.
//!
//! ## Running
//!
//! `zchat_console --init` writes a sample `config.toml` and `log4rs.yml` to the base directory (`~/.zchat` unless
//! `--base-path` is given). Point `node.rpc_url` and the credentials at a running node, then start the console without
//! `--init`.
//!
//! The ledger is swept once at startup; anything that arrived while the console was closed is reported as a single
//! summary. After that new requests and messages are printed as they are found. Type `help` for the list of commands.

mod node_client;
mod parser;

use crate::{
    node_client::NodeClient,
    parser::{print_message, CommandHandler, CommandOutcome, Parser},
};
use futures::FutureExt;
use log::*;
use rustyline::{config::OutputStreamType, error::ReadlineError, CompletionType, Config, EditMode, Editor};
use std::{process, sync::Arc};
use tokio::{
    runtime,
    sync::broadcast::{self, RecvError},
    task,
};
use zchat_common::{
    initialize_logging,
    load_configuration,
    structopt::StructOpt,
    ConfigBootstrap,
    GlobalConfig,
};
use zchat_messaging::{
    spawn_messaging_service,
    storage::sqlite_db::MessagingSqliteDatabase,
    types::Amount,
    MessagingConfig,
    MessagingEvent,
    MessagingHandle,
};
use zchat_shutdown::{Shutdown, ShutdownSignal};

const LOG_TARGET: &str = "zchat::console::app";

/// Enum to show failure information
enum ExitCodes {
    ConfigError = 101,
    StorageError = 102,
    UnknownError = 103,
}

fn main() {
    match main_inner() {
        Ok(_) => process::exit(0),
        Err(exit_code) => process::exit(exit_code as i32),
    }
}

fn main_inner() -> Result<(), ExitCodes> {
    let mut bootstrap = ConfigBootstrap::from_args();
    bootstrap.init_dirs().map_err(|err| {
        println!("{}", err);
        ExitCodes::ConfigError
    })?;
    if bootstrap.init {
        println!("Edit the configuration and start the console again.");
        return Ok(());
    }

    if !initialize_logging(&bootstrap.log_config) {
        println!("Continuing without logs. Run with --init to create a log configuration.");
    }

    let cfg = load_configuration(&bootstrap).map_err(|err| {
        println!("{}", err);
        ExitCodes::ConfigError
    })?;
    let config = GlobalConfig::convert_from(cfg, &bootstrap.base_path).map_err(|err| {
        println!("The configuration file has an error. {}", err);
        ExitCodes::ConfigError
    })?;
    let fee = config.default_message_fee.parse::<Amount>().map_err(|err| {
        println!("messaging.default_message_fee: {}", err);
        ExitCodes::ConfigError
    })?;
    let messaging_config = MessagingConfig {
        scan_interval: config.scan_interval,
        history_page_size: config.history_page_size,
        ..Default::default()
    };

    std::fs::create_dir_all(&config.data_dir).map_err(|err| {
        println!("Could not create {}: {}", config.data_dir.display(), err);
        ExitCodes::StorageError
    })?;
    let backend = MessagingSqliteDatabase::open(&config.db_path).map_err(|err| {
        error!(target: LOG_TARGET, "Could not open the message store: {}", err);
        println!("Could not open the message store at {}: {}", config.db_path.display(), err);
        ExitCodes::StorageError
    })?;
    let node = NodeClient::new(
        config.node_rpc_url.clone(),
        config.node_rpc_user.clone(),
        config.node_rpc_password.clone(),
    );

    let mut rt = runtime::Builder::new()
        .threaded_scheduler()
        .enable_all()
        .build()
        .map_err(|err| {
            println!("Could not start the tokio runtime: {}", err);
            ExitCodes::UnknownError
        })?;

    info!(target: LOG_TARGET, "Using node at {}", config.node_rpc_url);
    rt.block_on(async move {
        let shutdown = Shutdown::new();
        let handle = spawn_messaging_service(messaging_config, backend, node, shutdown.to_signal());
        run_console(handle, fee, shutdown).await
    });
    info!(target: LOG_TARGET, "Console closed");
    Ok(())
}

fn editor_config() -> Config {
    Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .output_stream(OutputStreamType::Stdout)
        .build()
}

async fn run_console(handle: MessagingHandle, fee: Amount, mut shutdown: Shutdown) {
    let events = tokio::spawn(print_events(handle.get_event_stream(), shutdown.to_signal()));
    let mut handler = CommandHandler::new(handle, fee);
    let mut rl = Editor::with_config(editor_config());
    rl.set_helper(Some(Parser::new()));

    println!("Type `help` for the list of commands.");
    loop {
        let prompt = handler.prompt();
        // Readline blocks the thread it runs on
        let (editor, readline) = match task::spawn_blocking(move || {
            let readline = rl.readline(&prompt);
            (rl, readline)
        })
        .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(target: LOG_TARGET, "Line editor task failed: {}", e);
                break;
            },
        };
        rl = editor;

        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                if handler.handle_command(&line).await == CommandOutcome::Exit {
                    break;
                }
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Shutting down");
                break;
            },
            Err(err) => {
                error!(target: LOG_TARGET, "Readline error: {:?}", err);
                println!("Error: {:?}", err);
                break;
            },
        }
    }

    shutdown.trigger();
    let _ = events.await;
}

async fn print_events(mut events: broadcast::Receiver<Arc<MessagingEvent>>, mut shutdown: ShutdownSignal) {
    loop {
        futures::select! {
            event = events.recv().fuse() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(n)) => warn!(target: LOG_TARGET, "Missed {} messaging events", n),
                Err(RecvError::Closed) => break,
            },
            _ = shutdown => break,
        }
    }
}

fn print_event(event: &MessagingEvent) {
    match event {
        MessagingEvent::PendingRequestReceived(request) => println!(
            "\nContact request from {} ({}). Use `accept {}` or `reject {}`.",
            request.username, request.address, request.id, request.id
        ),
        MessagingEvent::RequestAccepted(contact) => {
            println!("\n{} accepted your request. Open the conversation with `open {}`.", contact.username, contact.contact_id)
        },
        MessagingEvent::NewMessage(message) => print_message(message),
        MessagingEvent::StartupSummary {
            requests,
            accepted,
            messages,
        } => {
            if requests + accepted + messages > 0 {
                println!(
                    "\nWhile you were away: {} new requests, {} accepted requests, {} new messages",
                    requests, accepted, messages
                );
            }
        },
    }
}
