//! Terminal front end: prompts for login, then renders the chat on stdout.

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Local};
use greenchat_core::{
    chat::ChatView,
    config::Config,
    domain::MessageKey,
    flow::{LoginFlow, Stage},
    gateway::Gateway,
    transcript::{DisplayMessage, Transcript},
};
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tracing::debug;

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "/unread  fetch unread messages\n\
/contact show contact info\n\
/back    choose another number\n\
/logout  forget credentials\n\
/quit    exit";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    Unread,
    Contact,
    Back,
    Logout,
    Quit,
    Help,
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(cmd) = line.strip_prefix('/') else {
            return Command::Send(line);
        };
        match cmd.split_whitespace().next().unwrap_or("") {
            "unread" => Command::Unread,
            "contact" => Command::Contact,
            "back" => Command::Back,
            "logout" => Command::Logout,
            "quit" | "exit" => Command::Quit,
            "help" => Command::Help,
            other => Command::Unknown(other),
        }
    }
}

enum ChatExit {
    Back,
    Logout,
    Quit,
}

pub async fn run(cfg: &Config, gateway: Arc<dyn Gateway>) -> anyhow::Result<()> {
    let mut input = BufReader::new(stdin()).lines();
    let mut flow = LoginFlow::new(gateway);

    loop {
        match flow.stage() {
            Stage::Credentials => {
                let Some(id) = prompt(&mut input, "Instance ID: ").await? else {
                    return Ok(());
                };
                let Some(token) = prompt(&mut input, "API token: ").await? else {
                    return Ok(());
                };
                if let Err(e) = flow.submit_credentials(&id, &token).await {
                    println!("! {}", e.user_message());
                }
            }
            Stage::Phone { .. } => {
                let Some(raw) = prompt(&mut input, "Phone number (/back to log out): ").await?
                else {
                    return Ok(());
                };
                if raw.trim() == "/back" {
                    flow.back();
                    continue;
                }
                if let Err(e) = flow.submit_phone(&raw).await {
                    println!("! {}", e.user_message());
                }
            }
            Stage::Chat { session } => {
                println!("Opening chat with {}...", session.phone);
                let view = match flow.open_chat(cfg.chat_options()).await {
                    Ok(view) => view,
                    Err(e) => {
                        println!("! {}", e.user_message());
                        if matches!(flow.stage(), Stage::Chat { .. }) {
                            flow.back();
                        }
                        continue;
                    }
                };
                match chat_loop(&mut input, view).await? {
                    ChatExit::Back => flow.back(),
                    ChatExit::Logout => flow.logout(),
                    ChatExit::Quit => return Ok(()),
                }
            }
        }
    }
}

async fn prompt(input: &mut Input, label: &str) -> anyhow::Result<Option<String>> {
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?)
}

async fn chat_loop(input: &mut Input, view: ChatView) -> anyhow::Result<ChatExit> {
    println!("Connected to {}. Type /help for commands.", view.session().phone);

    let mut snapshots = view.subscribe();
    let mut printed: HashSet<MessageKey> = HashSet::new();
    let (notice_tx, mut notices) = mpsc::unbounded_channel::<String>();

    render_new(&snapshots.borrow_and_update(), &mut printed);

    let exit = loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break ChatExit::Back;
                }
                render_new(&snapshots.borrow_and_update(), &mut printed);
            }
            Some(notice) = notices.recv() => println!("! {notice}"),
            line = input.next_line() => {
                let Some(line) = line? else {
                    break ChatExit::Quit;
                };
                match Command::parse(&line) {
                    Command::Empty => {}
                    Command::Send(text) => {
                        let composer = view.composer();
                        let text = text.to_string();
                        let notice_tx = notice_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = composer.send(&text).await {
                                let _ = notice_tx.send(format!("not sent: {}", e.user_message()));
                            }
                        });
                    }
                    Command::Unread => match view.load_unread().await {
                        Ok(0) => println!("No unread messages."),
                        Ok(n) => debug!("fetched {n} unread messages"),
                        Err(e) => println!("! {}", e.user_message()),
                    },
                    Command::Contact => match view.contact().await {
                        Ok(info) => println!("{} ({})", info.display_name(), info.chat_id),
                        Err(e) => println!("! {}", e.user_message()),
                    },
                    Command::Help => println!("{HELP}"),
                    Command::Unknown(cmd) => println!("Unknown command /{cmd}. Type /help."),
                    Command::Back => break ChatExit::Back,
                    Command::Logout => break ChatExit::Logout,
                    Command::Quit => break ChatExit::Quit,
                }
            }
        }
    };

    view.close().await;
    Ok(exit)
}

fn render_new(transcript: &Transcript, printed: &mut HashSet<MessageKey>) {
    for msg in transcript.messages() {
        if printed.insert(msg.id.clone()) {
            println!("{}", format_line(msg));
        }
    }
}

fn format_line(msg: &DisplayMessage) -> String {
    let time = DateTime::from_timestamp(msg.timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let arrow = if msg.is_outgoing { ">" } else { "<" };
    format!("[{time}] {arrow} {}", msg.text)
}
