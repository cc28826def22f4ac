pub mod flow;
pub mod terminal;

pub use flow::{ welcome_message, AuthForm, FlowError, FlowEvent, Screen, ScreenFlow };
pub use terminal::TerminalApp;
