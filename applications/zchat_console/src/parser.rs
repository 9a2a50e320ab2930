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

use chrono::{Local, TimeZone};
use log::*;
use rustyline::{
    completion::Completer,
    error::ReadlineError,
    highlight::Highlighter,
    hint::{Hinter, HistoryHinter},
    validate::Validator,
    Context,
};
use rustyline_derive::Helper;
use std::str::FromStr;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use zchat_messaging::{
    directory::MessagePage,
    error::MessagingError,
    types::{Amount, Contact, Message},
    MessagingHandle,
};

const LOG_TARGET: &str = "zchat::console::parser";

/// Console commands. Each maps onto one messaging operation, apart from the session helpers.
#[derive(Debug, PartialEq, EnumIter, EnumString, Display)]
#[strum(serialize_all = "kebab_case")]
pub enum ConsoleCommand {
    Help,
    Setup,
    Whoami,
    Rename,
    Request,
    Pending,
    Accept,
    Reject,
    Contacts,
    SentRequests,
    Banned,
    Ban,
    Open,
    More,
    Close,
    Send,
    Fee,
    Unread,
    Poll,
    Exit,
    Quit,
}

impl ConsoleCommand {
    fn usage(&self) -> &'static str {
        use ConsoleCommand::*;
        match self {
            Help => "help [command] - show available commands",
            Setup => "setup <username> - create the local identity",
            Whoami => "whoami - show the local identity",
            Rename => "rename <username> - change the local username",
            Request => "request <address> - send a contact request",
            Pending => "pending - list incoming contact requests",
            Accept => "accept <id> - accept an incoming request",
            Reject => "reject <id> - reject an incoming request and ban its sender",
            Contacts => "contacts - list contacts with unread counts",
            SentRequests => "sent-requests - list addresses with an unanswered request",
            Banned => "banned - list banned addresses",
            Ban => "ban <contact id> - ban a contact",
            Open => "open <contact id> - open a conversation and show its latest messages",
            More => "more - load older messages of the open conversation",
            Close => "close - close the open conversation",
            Send => "send <text> - send a message to the open conversation",
            Fee => "fee [amount] - show or set the fee attached to messages",
            Unread => "unread <contact id> - number of unread messages from a contact",
            Poll => "poll - check the ledger for new messages now",
            Exit | Quit => "exit - leave the console",
        }
    }
}

/// Line editing helper: completes command names and hints from history
#[derive(Helper)]
pub struct Parser {
    commands: Vec<String>,
    hinter: HistoryHinter,
}

impl Parser {
    pub fn new() -> Self {
        Parser {
            commands: ConsoleCommand::iter().map(|c| c.to_string()).collect(),
            hinter: HistoryHinter {},
        }
    }
}

impl Completer for Parser {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<String>), ReadlineError> {
        let prefix = &line[..pos];
        // Only the command word is completed
        if prefix.contains(' ') {
            return Ok((pos, Vec::new()));
        }
        let completions = self
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect();
        Ok((0, completions))
    }
}

impl Hinter for Parser {
    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        self.hinter.hint(line, pos, ctx)
    }
}

impl Highlighter for Parser {}

impl Validator for Parser {}

#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    Continue,
    Exit,
}

/// The conversation the user is looking at and how far back its history has been loaded
#[derive(Debug, Default)]
struct Session {
    open: Option<Contact>,
    cursor: Option<i64>,
}

/// Runs console commands against the messaging service
pub struct CommandHandler {
    messaging: MessagingHandle,
    session: Session,
    fee: Amount,
}

impl CommandHandler {
    pub fn new(messaging: MessagingHandle, fee: Amount) -> Self {
        Self {
            messaging,
            session: Session::default(),
            fee,
        }
    }

    pub fn prompt(&self) -> String {
        match &self.session.open {
            Some(contact) => format!("{}> ", contact.username),
            None => ">> ".to_string(),
        }
    }

    pub async fn handle_command(&mut self, line: &str) -> CommandOutcome {
        let line = line.trim();
        if line.is_empty() {
            return CommandOutcome::Continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let word = parts.next().unwrap_or_default();
        let args = parts.next().unwrap_or_default().trim();

        let command = match ConsoleCommand::from_str(word) {
            Ok(command) => command,
            Err(_) => {
                println!("{} is not a valid command, please enter a valid command", word);
                println!("Enter help or press tab for available commands");
                return CommandOutcome::Continue;
            },
        };

        match command {
            ConsoleCommand::Exit | ConsoleCommand::Quit => return CommandOutcome::Exit,
            ConsoleCommand::Help => self.print_help(args),
            command => {
                if let Err(e) = self.process_command(command, args).await {
                    debug!(target: LOG_TARGET, "Command '{}' failed: {}", line, e);
                    println!("Error: {}", e);
                }
            },
        }
        CommandOutcome::Continue
    }

    async fn process_command(&mut self, command: ConsoleCommand, args: &str) -> Result<(), MessagingError> {
        use ConsoleCommand::*;
        match command {
            Setup => {
                let identity = self.messaging.setup_identity(args.to_string()).await?;
                println!("Identity created for {}", identity.username);
                println!("Share your address to receive requests: {}", identity.address);
            },
            Whoami => match self.messaging.get_identity().await? {
                Some(identity) => {
                    println!("Username: {}", identity.username);
                    println!("Id:       {}", identity.id);
                    println!("Address:  {}", identity.address);
                },
                None => println!("No identity yet. Create one with `setup <username>`."),
            },
            Rename => {
                self.messaging.rename_identity(args.to_string()).await?;
                println!("Username changed to {}", args);
            },
            Request => {
                println!("Sending request...");
                let txid = self.messaging.send_request(args.to_string()).await?;
                println!("Request sent to {} ({})", args, txid);
            },
            Pending => {
                let pending = self.messaging.list_pending().await?;
                if pending.is_empty() {
                    println!("No pending requests");
                }
                for request in pending {
                    println!("{}  {}  {}", request.id, request.username, request.address);
                }
            },
            Accept => {
                println!("Sending identity...");
                let contact = self.messaging.accept_pending(args.to_string()).await?;
                println!("{} is now a contact", contact.username);
            },
            Reject => {
                self.messaging.reject_pending(args.to_string()).await?;
                println!("Request rejected");
            },
            Contacts => {
                let contacts = self.messaging.list_contacts().await?;
                if contacts.is_empty() {
                    println!("No contacts yet");
                }
                for contact in contacts {
                    let unread = self.messaging.unread_count(contact.contact_id.clone()).await?;
                    println!(
                        "{}  {:<20} {}",
                        contact.contact_id,
                        contact.username,
                        if unread > 0 { format!("({} unread)", unread) } else { String::new() }
                    );
                }
            },
            SentRequests => print_list("No unanswered requests", self.messaging.list_sent_requests().await?),
            Banned => print_list("No banned addresses", self.messaging.list_banned().await?),
            Ban => {
                self.messaging.ban_contact(args.to_string()).await?;
                if self.session.open.as_ref().map(|c| c.contact_id.as_str()) == Some(args) {
                    self.session = Session::default();
                }
                println!("Contact banned");
            },
            Open => self.open_conversation(args).await?,
            More => self.load_more().await?,
            Close => {
                self.messaging.close_conversation().await?;
                self.session = Session::default();
            },
            Send => {
                let contact_id = self
                    .session
                    .open
                    .as_ref()
                    .map(|c| c.contact_id.clone())
                    .unwrap_or_default();
                println!("Sending...");
                let message = self.messaging.send_message(contact_id, args.to_string(), self.fee).await?;
                print_message(&message);
            },
            Fee => {
                if !args.is_empty() {
                    match args.parse::<Amount>() {
                        Ok(fee) => self.fee = fee,
                        Err(e) => {
                            println!("{}", e);
                            return Ok(());
                        },
                    }
                }
                println!("Message fee: {}", self.fee);
            },
            Unread => {
                let count = self.messaging.unread_count(args.to_string()).await?;
                println!("{} unread", count);
            },
            Poll => {
                let report = self.messaging.poll().await?;
                println!(
                    "Checked {} outputs: {} requests, {} accepted, {} messages",
                    report.outputs_seen, report.requests, report.accepted, report.messages
                );
            },
            Help | Exit | Quit => {},
        }
        Ok(())
    }

    async fn open_conversation(&mut self, contact_id: &str) -> Result<(), MessagingError> {
        let contact = self
            .messaging
            .list_contacts()
            .await?
            .into_iter()
            .find(|c| c.contact_id == contact_id);
        let contact = match contact {
            Some(c) => c,
            None => {
                println!("No contact with id '{}'", contact_id);
                return Ok(());
            },
        };

        self.messaging.open_conversation(contact.contact_id.clone()).await?;
        let unread = self.messaging.unread_count(contact.contact_id.clone()).await?;
        self.messaging.mark_read(contact.contact_id.clone()).await?;
        let page = self
            .messaging
            .load_messages(contact.contact_id.clone(), None, None)
            .await?;

        println!("Conversation with {} ({})", contact.username, contact.address);
        if unread > 0 {
            println!("{} new", unread);
        }
        self.session = Session {
            open: Some(contact),
            cursor: None,
        };
        self.show_page(page);
        Ok(())
    }

    async fn load_more(&mut self) -> Result<(), MessagingError> {
        let (contact_id, before) = match (&self.session.open, self.session.cursor) {
            (Some(contact), Some(cursor)) => (contact.contact_id.clone(), cursor),
            (Some(_), None) => {
                println!("No older messages");
                return Ok(());
            },
            (None, _) => {
                println!("Open a conversation first");
                return Ok(());
            },
        };
        let page = self.messaging.load_messages(contact_id, Some(before), None).await?;
        self.show_page(page);
        Ok(())
    }

    fn show_page(&mut self, page: MessagePage) {
        self.session.cursor = page.next_cursor;
        if page.messages.is_empty() {
            println!("No messages");
        }
        for message in page.messages.iter().rev() {
            print_message(message);
        }
        if page.next_cursor.is_some() {
            println!("(more)");
        }
    }

    fn print_help(&self, args: &str) {
        match ConsoleCommand::from_str(args) {
            Ok(command) => println!("{}", command.usage()),
            Err(_) => {
                println!("Available commands:");
                for command in ConsoleCommand::iter().filter(|c| *c != ConsoleCommand::Quit) {
                    println!("  {}", command.usage());
                }
            },
        }
    }
}

fn print_list(empty: &str, items: Vec<String>) {
    if items.is_empty() {
        println!("{}", empty);
    }
    for item in items {
        println!("{}", item);
    }
}

pub fn format_timestamp(timestamp: i64) -> String {
    Local.timestamp_millis(timestamp).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn print_message(message: &Message) {
    println!("[{}] {}: {}", format_timestamp(message.timestamp), message.author, message.text);
}
