use std::fmt;
use thiserror::Error;

use crate::models::chat::{ ChatMode, UserSession };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Splash,
    Welcome,
    Auth,
    Chat,
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Screen::Splash => "splash",
            Screen::Welcome => "welcome",
            Screen::Auth => "auth",
            Screen::Chat => "chat",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthForm {
    Login {
        identifier: String,
        password: String,
    },
    SignUp {
        username: String,
        email: String,
        password: String,
        confirm_password: String,
    },
}

impl AuthForm {
    /// Checks the form the way the auth screen does. No credential is verified.
    pub fn validate(&self) -> Result<UserSession, FlowError> {
        match self {
            AuthForm::Login { identifier, password } => {
                if identifier.trim().is_empty() || password.trim().is_empty() {
                    return Err(FlowError::MissingFields);
                }
                Ok(UserSession {
                    username: identifier.trim().to_string(),
                    email: None,
                })
            }
            AuthForm::SignUp { username, email, password, confirm_password } => {
                let blank = [username, email, password, confirm_password]
                    .iter()
                    .any(|field| field.trim().is_empty());
                if blank {
                    return Err(FlowError::MissingFields);
                }
                if password != confirm_password {
                    return Err(FlowError::PasswordMismatch);
                }
                Ok(UserSession {
                    username: username.trim().to_string(),
                    email: Some(email.trim().to_string()),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Tap,
    Submit(AuthForm),
}

impl FlowEvent {
    fn name(&self) -> &'static str {
        match self {
            FlowEvent::Tap => "tap",
            FlowEvent::Submit(_) => "submit",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("'{event}' is not valid on the {screen} screen")]
    InvalidTransition {
        screen: Screen,
        event: &'static str,
    },
    #[error("Please fill in all fields")]
    MissingFields,
    #[error("Passwords don't match")]
    PasswordMismatch,
    #[error("the diary toggle is only available in chat")]
    NotInChat,
    #[error("no diary prompt is open")]
    NoPendingPrompt,
}

/// Top-level screen machine plus the chat/diary submode. Rejected events
/// leave every field untouched.
#[derive(Debug, Clone)]
pub struct ScreenFlow {
    screen: Screen,
    user: Option<UserSession>,
    mode: ChatMode,
    diary_prompt_open: bool,
}

impl Default for ScreenFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenFlow {
    pub fn new() -> Self {
        Self {
            screen: Screen::Splash,
            user: None,
            mode: ChatMode::General,
            diary_prompt_open: false,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn user(&self) -> Option<&UserSession> {
        self.user.as_ref()
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn diary_prompt_open(&self) -> bool {
        self.diary_prompt_open
    }

    pub fn handle(&mut self, event: FlowEvent) -> Result<Screen, FlowError> {
        let next = match (self.screen, &event) {
            (Screen::Splash, FlowEvent::Tap) => Screen::Welcome,
            (Screen::Welcome, FlowEvent::Tap) => Screen::Auth,
            (Screen::Auth, FlowEvent::Submit(form)) => {
                let session = form.validate()?;
                self.user = Some(session);
                self.mode = ChatMode::General;
                Screen::Chat
            }
            (screen, event) => {
                return Err(FlowError::InvalidTransition {
                    screen,
                    event: event.name(),
                });
            }
        };
        self.screen = next;
        Ok(next)
    }

    fn require_chat(&self) -> Result<(), FlowError> {
        if self.screen == Screen::Chat { Ok(()) } else { Err(FlowError::NotInChat) }
    }

    /// Opens the "switch to diary?" confirmation.
    pub fn request_diary(&mut self) -> Result<(), FlowError> {
        self.require_chat()?;
        self.diary_prompt_open = true;
        Ok(())
    }

    pub fn confirm_diary(&mut self) -> Result<ChatMode, FlowError> {
        self.require_chat()?;
        if !self.diary_prompt_open {
            return Err(FlowError::NoPendingPrompt);
        }
        self.diary_prompt_open = false;
        self.mode = ChatMode::Diary;
        Ok(self.mode)
    }

    pub fn dismiss_diary(&mut self) -> Result<(), FlowError> {
        self.require_chat()?;
        if !self.diary_prompt_open {
            return Err(FlowError::NoPendingPrompt);
        }
        self.diary_prompt_open = false;
        Ok(())
    }

    pub fn back_to_general(&mut self) -> Result<ChatMode, FlowError> {
        self.require_chat()?;
        self.diary_prompt_open = false;
        self.mode = ChatMode::General;
        Ok(self.mode)
    }
}

/// Greeting shown when a chat screen opens. Display only; never sent upstream.
pub fn welcome_message(mode: ChatMode, user: &UserSession) -> String {
    match mode {
        ChatMode::General =>
            format!(
                "Hello {}! I'm Lumi, your friendly AI assistant! What's on your mind today?",
                user.username
            ),
        ChatMode::Diary =>
            format!(
                "Hello {}! Welcome to your mood diary space. I'm here to listen and support you as you express your thoughts and feelings. What's on your heart today?",
                user.username
            ),
    }
}
