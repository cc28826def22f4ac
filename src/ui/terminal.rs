use log::debug;
use std::io;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines };
use tokio::sync::mpsc::UnboundedReceiver;

use super::flow::{ welcome_message, AuthForm, FlowEvent, Screen, ScreenFlow };
use crate::client::{ ChatSession, ProxyClient, SendError, SendOutcome };
use crate::fallback::FallbackResponder;
use crate::models::chat::ChatMode;

const SPLASH: &str = "\n  ✨ Lumi ✨\n\n(press Enter)";
const WELCOME: &str =
    "Hello! I'm Lumi\n\
     I'm your friendly AI assistant, here to help you with anything you need!\n\
     From answering questions to having conversations, I'm excited to chat with you.\n\
     Let's get you set up so we can start our journey together!\n\n\
     (press Enter to get started)";
const CHAT_HELP: &str = "Commands: /diary (mood diary), /back (general chat), /quit";

/// Line-oriented front end over [`ScreenFlow`] and [`ChatSession`].
///
/// Each message on `interrupts` (Ctrl-C in the binary) cancels the request in
/// flight, or ends the app when it arrives at a prompt.
pub struct TerminalApp<R, W> {
    lines: Lines<R>,
    out: W,
    interrupts: UnboundedReceiver<()>,
    flow: ScreenFlow,
    session: ChatSession,
}

impl<R, W> TerminalApp<R, W> where R: AsyncBufRead + Unpin, W: AsyncWrite + Unpin {
    pub fn new(
        input: R,
        out: W,
        interrupts: UnboundedReceiver<()>,
        client: ProxyClient,
        fallback: FallbackResponder
    ) -> Self {
        Self {
            lines: input.lines(),
            out,
            interrupts,
            flow: ScreenFlow::new(),
            session: ChatSession::new(client, fallback, ChatMode::General),
        }
    }

    pub fn flow(&self) -> &ScreenFlow {
        &self.flow
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs until `/quit`, an interrupt at a prompt, or end of input.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            let keep_going = match self.flow.screen() {
                Screen::Splash => self.tap_through(SPLASH).await?,
                Screen::Welcome => self.tap_through(WELCOME).await?,
                Screen::Auth => self.auth().await?,
                Screen::Chat => {
                    self.chat().await?;
                    false
                }
            };
            if !keep_going {
                return Ok(());
            }
        }
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }

    /// `None` on end of input or interrupt.
    async fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.out.write_all(prompt.as_bytes()).await?;
        self.out.flush().await?;
        tokio::select! {
            line = self.lines.next_line() => line,
            Some(()) = self.interrupts.recv() => {
                debug!("Interrupted at prompt");
                Ok(None)
            }
        }
    }

    async fn tap_through(&mut self, screen_text: &str) -> io::Result<bool> {
        self.say(screen_text).await?;
        if self.ask("").await?.is_none() {
            return Ok(false);
        }
        if let Err(e) = self.flow.handle(FlowEvent::Tap) {
            debug!("Ignored tap: {}", e);
        }
        Ok(true)
    }

    async fn auth(&mut self) -> io::Result<bool> {
        let Some(choice) = self.ask("Log in or sign up? [l/s]: ").await? else {
            return Ok(false);
        };
        let form = if choice.trim().eq_ignore_ascii_case("s") {
            self.say("Join Lumi").await?;
            let Some(username) = self.ask("Username: ").await? else { return Ok(false) };
            let Some(email) = self.ask("Email: ").await? else { return Ok(false) };
            let Some(password) = self.ask("Password: ").await? else { return Ok(false) };
            let Some(confirm_password) = self.ask("Confirm password: ").await? else {
                return Ok(false);
            };
            AuthForm::SignUp { username, email, password, confirm_password }
        } else {
            self.say("Welcome Back!").await?;
            let Some(identifier) = self.ask("Username or email: ").await? else { return Ok(false) };
            let Some(password) = self.ask("Password: ").await? else { return Ok(false) };
            AuthForm::Login { identifier, password }
        };

        match self.flow.handle(FlowEvent::Submit(form)) {
            Ok(_) => Ok(true),
            Err(e) => {
                self.say(&format!("⚠ {}", e)).await?;
                Ok(true)
            }
        }
    }

    async fn greet(&mut self) -> io::Result<()> {
        let greeting = match self.flow.user() {
            Some(user) => welcome_message(self.flow.mode(), user),
            None => return Ok(()),
        };
        let header = match self.flow.mode() {
            ChatMode::General => "── Lumi Chat ──",
            ChatMode::Diary => "── Mood Diary ──",
        };
        self.say(header).await?;
        self.say(&format!("Lumi: {}", greeting)).await
    }

    async fn switch_mode(&mut self, mode: ChatMode) -> io::Result<()> {
        self.session.reset(mode);
        self.greet().await
    }

    async fn chat(&mut self) -> io::Result<()> {
        self.say(CHAT_HELP).await?;
        self.greet().await?;

        loop {
            let Some(line) = self.ask("You: ").await? else {
                return Ok(());
            };
            match line.trim() {
                "" => {}
                "/quit" => {
                    return Ok(());
                }
                "/diary" => {
                    if self.flow.mode() == ChatMode::Diary {
                        self.say("You're already in your mood diary.").await?;
                        continue;
                    }
                    if let Err(e) = self.flow.request_diary() {
                        self.say(&format!("⚠ {}", e)).await?;
                        continue;
                    }
                    let answer = self
                        .ask("Switch to your mood diary? [y/N]: ").await?
                        .unwrap_or_default();
                    if answer.trim().eq_ignore_ascii_case("y") {
                        if let Ok(mode) = self.flow.confirm_diary() {
                            self.switch_mode(mode).await?;
                        }
                    } else if let Err(e) = self.flow.dismiss_diary() {
                        debug!("Diary prompt already closed: {}", e);
                    }
                }
                "/back" => {
                    if self.flow.mode() == ChatMode::General {
                        continue;
                    }
                    if let Ok(mode) = self.flow.back_to_general() {
                        self.switch_mode(mode).await?;
                    }
                }
                text => {
                    self.converse(text).await?;
                }
            }
        }
    }

    async fn converse(&mut self, text: &str) -> io::Result<()> {
        self.say("Lumi is thinking...").await?;

        let cancel = self.session.cancel_handle();
        let result = {
            let send = self.session.send(text);
            tokio::pin!(send);
            loop {
                tokio::select! {
                    result = &mut send => break result,
                    Some(()) = self.interrupts.recv() => {
                        cancel.cancel();
                    }
                }
            }
        };

        match result {
            Ok(SendOutcome::Replied(reply)) | Ok(SendOutcome::Fallback(reply)) => {
                self.say(&format!("Lumi: {}", reply.content())).await
            }
            Ok(SendOutcome::Cancelled) => self.say("(cancelled)").await,
            Err(SendError::EmptyMessage) => Ok(()),
            Err(e) => self.say(&format!("⚠ {}", e)).await,
        }
    }
}
