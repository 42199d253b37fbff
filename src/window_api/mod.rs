//! Contains logic for reaching application windows and desktop notifications from the agent.
//! [WindowHost] and [NotificationCenter] are the contracts, [process::ProcessWindowHost] and
//! [command::CommandNotificationCenter] are the implementations used outside of tests.

pub mod command;
pub mod process;

use std::fmt::Display;

use anyhow::Result;

/// Base title of a wizard terminal. Focus commands find windows by [window_title].
pub const WINDOW_TITLE: &str = "Dalos check-in";

/// Title the wizard with process id `pid` gives its terminal.
pub fn window_title(pid: u32) -> String {
    format!("{WINDOW_TITLE} [{pid}]")
}

/// Path an application window is opened at. It's the first step of the wizard.
pub const ROOT_PATH: &str = "/";

/// An open application window, which is a running foreground check-in process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub pid: u32,
    /// Seconds since epoch. Windows are ordered by it, oldest first.
    pub started_at: u64,
}

impl Display for WindowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "window(pid {})", self.pid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub body: String,
}

/// Intended to serve as a contract the agent uses to reach application windows.
#[cfg_attr(test, mockall::automock)]
pub trait WindowHost {
    /// All open windows, including ones the agent doesn't control, oldest first.
    fn match_all(&mut self) -> Result<Vec<WindowClient>>;

    fn focus(&mut self, client: &WindowClient) -> Result<()>;

    fn open_window(&mut self, path: &str) -> Result<()>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationCenter {
    fn show(&mut self, notification: &Notification) -> Result<()>;

    /// Dismisses a notification. Unknown ids are ignored.
    fn close(&mut self, id: &str) -> Result<()>;
}
