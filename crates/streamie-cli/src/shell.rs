//! Line-oriented front-end over the session manager and sync controller.
//!
//! Only presentation lives here; every state change goes through
//! `streamie_core`.

use std::io::Write;

use anyhow::Result;
use streamie_core::config::ENV_PASSWORD;
use streamie_core::{Config, Context, Credentials, Platform, SessionEvent, SyncError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const HELP: &str = "\
Commands:
  login [username]          log in (password is prompted)
  logout                    end the session
  show [--reveal]           show the current draft
  status                    session and change summary
  key <platform> <value>    set a stream key
  enable <platform>         turn a destination on
  disable <platform>        turn a destination off
  submit                    send changes to the server
  discard                   drop local changes
  reload                    fetch the configuration again
  help                      this text
  quit                      exit

Platforms: youtube, twitch, facebook";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Option<String>),
    Logout,
    Show { reveal: bool },
    Status,
    Key(Platform, String),
    Enable(Platform),
    Disable(Platform),
    Submit,
    Discard,
    Reload,
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for a blank line.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };

    let platform = |arg: Option<&str>| -> Result<Platform, String> {
        arg.ok_or_else(|| format!("'{}' needs a platform", verb))?
            .parse::<Platform>()
    };

    let command = match verb.to_lowercase().as_str() {
        "login" => Command::Login(parts.next().map(str::to_string)),
        "logout" => Command::Logout,
        "show" | "ls" => Command::Show {
            reveal: parts.next() == Some("--reveal"),
        },
        "status" => Command::Status,
        "key" => {
            let platform = platform(parts.next())?;
            // Empty value clears the key
            let value = parts.collect::<Vec<_>>().join(" ");
            Command::Key(platform, value)
        }
        "enable" | "on" => Command::Enable(platform(parts.next())?),
        "disable" | "off" => Command::Disable(platform(parts.next())?),
        "submit" | "update" => Command::Submit,
        "discard" | "reset" => Command::Discard,
        "reload" | "refresh" => Command::Reload,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("Unknown command '{}'. Type 'help'.", other)),
    };
    Ok(Some(command))
}

pub struct Shell {
    config: Config,
    context: Context,
    events: broadcast::Receiver<SessionEvent>,
    input: Lines<BufReader<Stdin>>,
}

impl Shell {
    pub fn new(config: Config, context: Context) -> Self {
        let events = context.session.subscribe();
        Self {
            config,
            context,
            events,
            input: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("streamie - connected to {}", self.context.api.base_url());

        if let Some(subject) = self.context.session.current_subject() {
            println!("Resumed session for {}", subject);
            let _ = self.context.sync.load_for_session().await;
        } else {
            println!("Not logged in. Type 'login' to start, 'help' for commands.");
        }
        self.print_notice();

        loop {
            self.drain_session_events().await;
            self.print_notice();

            let prompt = self.prompt();
            let Some(line) = self.read_line(&prompt).await? else {
                break;
            };

            let command = match parse_command(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(message) => {
                    println!("{}", message);
                    continue;
                }
            };

            if command == Command::Quit {
                if self.context.sync.is_dirty() {
                    println!("Discarding unsaved changes.");
                }
                break;
            }
            self.execute(command).await?;
        }
        Ok(())
    }

    fn prompt(&self) -> String {
        match self.context.session.current_subject() {
            Some(subject) if self.context.sync.is_dirty() => format!("{}*> ", subject),
            Some(subject) => format!("{}> ", subject),
            None => "streamie> ".to_string(),
        }
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        print!("{}", prompt);
        std::io::stdout().flush()?;
        Ok(self.input.next_line().await?)
    }

    /// Apply session transitions to the sync controller before the next prompt.
    async fn drain_session_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.context.sync.handle_session_event(&event).await,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed session events");
                }
                Err(_) => break,
            }
        }
    }

    fn print_notice(&self) {
        if let Some(notice) = self.context.sync.take_notice() {
            if notice.is_error() {
                println!("! {}", notice);
            } else {
                println!("{}", notice);
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        let sync = self.context.sync.clone();
        let outcome = match command {
            Command::Login(username) => {
                self.login(username).await?;
                Ok(())
            }
            Command::Logout => {
                self.context.session.logout();
                println!("Logged out.");
                Ok(())
            }
            Command::Show { reveal } => {
                self.show(reveal);
                Ok(())
            }
            Command::Status => {
                self.status();
                Ok(())
            }
            Command::Key(platform, value) => sync.set_stream_key(platform, value).map(|_| ()),
            Command::Enable(platform) => sync.set_enabled(platform, true).map(|_| ()),
            Command::Disable(platform) => sync.set_enabled(platform, false).map(|_| ()),
            Command::Submit => sync.submit().await,
            Command::Discard => sync.discard(),
            Command::Reload => sync.load_for_session().await,
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => Ok(()),
        };

        match outcome {
            // API failures already surface as a notice
            Err(SyncError::Api(e)) => debug!(error = %e, "Command failed"),
            Err(SyncError::Stale) => debug!("Result dropped after session change"),
            Err(e) => println!("{}", e),
            Ok(()) => {}
        }
        Ok(())
    }

    async fn login(&mut self, username: Option<String>) -> Result<()> {
        let username = match username.or_else(|| self.config.default_username()) {
            Some(u) => u,
            None => match self.read_line("Username: ").await? {
                Some(u) => u.trim().to_string(),
                None => return Ok(()),
            },
        };

        let password = match std::env::var(ENV_PASSWORD) {
            Ok(p) if !p.is_empty() => p,
            _ => tokio::task::spawn_blocking(|| rpassword::prompt_password("Password: ")).await??,
        };

        match self
            .context
            .session
            .login(Credentials::new(username.clone(), password))
            .await
        {
            Ok(subject) => {
                println!("Logged in as {}", subject);
                self.config.last_username = Some(username);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => {
                debug!(error = %e, "Login failed");
                println!("{}", e.user_message());
            }
        }
        Ok(())
    }

    fn show(&self, reveal: bool) {
        let Some(draft) = self.context.sync.draft() else {
            println!("No configuration loaded.");
            return;
        };
        let changed = self.context.sync.changed_platforms();

        for (platform, dest) in draft.iter() {
            let marker = if changed.contains(&platform) { "*" } else { " " };
            let state = if dest.enabled { "on " } else { "off" };
            let key = if reveal {
                dest.stream_key.clone()
            } else {
                dest.masked_key()
            };
            println!(
                "{} {:<9} {}  {:<24} {}",
                marker,
                platform.display_name(),
                state,
                key,
                platform.ingest_url()
            );
        }
    }

    fn status(&self) {
        let session = &self.context.session;
        match session.current_subject() {
            Some(subject) => {
                let minutes = session.seconds_until_expiry().unwrap_or(0) / 60;
                println!("Logged in as {} (session expires in {}m)", subject, minutes);
            }
            None => println!("Not logged in"),
        }

        let sync = &self.context.sync;
        if !sync.is_loaded() {
            return;
        }
        let changed = sync.changed_platforms();
        if changed.is_empty() {
            println!("No unsaved changes");
        } else {
            let names: Vec<&str> = changed.iter().map(|p| p.display_name()).collect();
            println!("Unsaved changes: {}", names.join(", "));
        }
    }
}
