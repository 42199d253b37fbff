use std::{
    future::Future,
    io::{IsTerminal, Write},
    time::Duration,
};

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::{
    agent::ipc::{send_message, AgentMessage},
    config::AppConfig,
    submission::{http::HttpSubmissionClient, Submitter},
    utils::clock::DefaultClock,
    window_api::window_title,
    wizard::{
        controller::WizardController,
        session::{Step, SubmissionState},
    },
};

use super::screen::render;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnswerArg {
    Yes,
    No,
}

impl From<AnswerArg> for bool {
    fn from(value: AnswerArg) -> Self {
        value == AnswerArg::Yes
    }
}

#[derive(Debug, Default, Parser)]
pub struct CheckinCommand {
    #[arg(
        long,
        requires = "zero_sugar",
        help = "Answer the skincare question and submit without prompting"
    )]
    skincare: Option<AnswerArg>,
    #[arg(long = "zero-sugar", requires = "skincare", help = "Answer the zero sugar question")]
    zero_sugar: Option<AnswerArg>,
    #[arg(long, requires = "skincare", help = "Notes sent with a non-interactive check-in")]
    notes: Option<String>,
}

/// Schedules a "check in later" notification.
pub trait ReminderScheduler {
    fn schedule(&self, delay: Duration) -> impl Future<Output = Result<()>>;
}

/// Asks the background agent to show the reminder.
pub struct AgentReminders {
    pub port: u16,
}

impl ReminderScheduler for AgentReminders {
    async fn schedule(&self, delay: Duration) -> Result<()> {
        send_message(
            self.port,
            &AgentMessage::ScheduleReminder {
                delay_secs: delay.as_secs(),
            },
        )
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReviewAction {
    Submit,
    Remind,
    Quit,
}

/// Reads input one line at a time. Bytes that aren't UTF-8 are replaced instead of failing, so a
/// stray byte never costs the session.
struct InputLines<I> {
    input: I,
    buf: Vec<u8>,
}

impl<I: AsyncBufRead + Unpin> InputLines<I> {
    fn new(input: I) -> Self {
        Self { input, buf: vec![] }
    }

    /// Cancel safe, a partially read line is kept for the next call.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.input.read_until(b'\n', &mut self.buf).await?;
        if self.buf.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}

fn parse_choice(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn parse_review(line: &str) -> Option<ReviewAction> {
    match line.trim().to_lowercase().as_str() {
        "s" | "submit" => Some(ReviewAction::Submit),
        "r" | "remind" => Some(ReviewAction::Remind),
        "q" | "quit" => Some(ReviewAction::Quit),
        _ => None,
    }
}

/// Command to process `checkin`. Without answers on the command line it runs the interactive
/// wizard on the terminal.
pub async fn process_checkin_command(command: CheckinCommand, config: &AppConfig) -> Result<()> {
    let endpoint = config.endpoint_url()?;
    let client =
        HttpSubmissionClient::new(endpoint, &config.submission, Box::new(DefaultClock))?;
    let mut controller = WizardController::new(Box::new(DefaultClock));
    let mut out = std::io::stdout();

    if let (Some(skincare), Some(zero_sugar)) = (command.skincare, command.zero_sugar) {
        return run_unattended(
            &mut controller,
            &client,
            skincare.into(),
            zero_sugar.into(),
            command.notes.unwrap_or_default(),
            &mut out,
        )
        .await;
    }

    if out.is_terminal() {
        write!(out, "\x1b]0;{}\x07", window_title(std::process::id()))?;
    }
    let reminders = AgentReminders {
        port: config.agent.port,
    };
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    run_interactive(
        &mut controller,
        &client,
        &reminders,
        config.agent.reminder_delay(),
        input,
        &mut out,
    )
    .await
}

/// Answers every step from arguments and submits once. A failed submission is an error so that
/// scripts see a non-zero exit code.
pub async fn run_unattended(
    controller: &mut WizardController,
    client: &impl Submitter,
    skincare: bool,
    zero_sugar: bool,
    notes: String,
    out: &mut impl Write,
) -> Result<()> {
    controller.answer(skincare)?;
    controller.answer(zero_sugar)?;
    controller.set_notes(notes)?;
    controller.continue_to_review()?;
    controller.submit(client).await?;

    match controller.session().submission() {
        SubmissionState::Succeeded(_) => {
            draw(out, controller, Duration::ZERO)?;
            Ok(())
        }
        SubmissionState::Failed(message) => Err(anyhow!("{message}")),
        state => Err(anyhow!("unexpected submission state {state:?}")),
    }
}

fn draw(
    out: &mut impl Write,
    controller: &WizardController,
    reminder_delay: Duration,
) -> Result<()> {
    writeln!(out)?;
    for line in render(controller.session(), reminder_delay) {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

/// Runs the wizard reading one line at a time from `input`. End of input quits.
pub async fn run_interactive<I: AsyncBufRead + Unpin>(
    controller: &mut WizardController,
    client: &impl Submitter,
    reminders: &impl ReminderScheduler,
    reminder_delay: Duration,
    input: I,
    out: &mut impl Write,
) -> Result<()> {
    let mut lines = InputLines::new(input);
    let mut notes: Vec<String> = vec![];
    let mut redraw = true;

    loop {
        if redraw {
            draw(out, controller, reminder_delay)?;
            redraw = false;
        }
        let step = controller.session().step();
        if step == Step::Success {
            return Ok(());
        }
        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };

        match step {
            Step::AskSkincare | Step::AskZeroSugar => match parse_choice(&line) {
                Some(value) => {
                    controller.answer(value)?;
                    redraw = true;
                }
                None => writeln!(out, "Please answer y or n.")?,
            },
            Step::AskNotes if line.trim().is_empty() => {
                controller.set_notes(notes.join("\n"))?;
                controller.continue_to_review()?;
                redraw = true;
            }
            Step::AskNotes => notes.push(line),
            Step::Review => match parse_review(&line) {
                Some(ReviewAction::Submit) => {
                    submit_while_reading(controller, client, &mut lines, out).await?;
                    redraw = true;
                }
                Some(ReviewAction::Remind) => match reminders.schedule(reminder_delay).await {
                    Ok(()) => {
                        info!("Reminder requested in {reminder_delay:?}");
                        writeln!(out, "Okay, I'll remind you later.")?;
                    }
                    Err(e) => {
                        warn!("Couldn't schedule reminder {e:?}");
                        writeln!(out, "Couldn't schedule a reminder: {e}")?;
                    }
                },
                Some(ReviewAction::Quit) => return Ok(()),
                None => writeln!(out, "Type s to submit, r to be reminded later or q to quit.")?,
            },
            Step::Success => return Ok(()),
        }
    }
}

/// Sends the check-in while still reading input. Repeated submits are dropped by the controller
/// for as long as the request is pending.
async fn submit_while_reading<I: AsyncBufRead + Unpin>(
    controller: &mut WizardController,
    client: &impl Submitter,
    lines: &mut InputLines<I>,
    out: &mut impl Write,
) -> Result<()> {
    let Some(record) = controller.begin_submit()? else {
        return Ok(());
    };
    draw(out, controller, Duration::ZERO)?;

    let pending = client.submit(&record);
    tokio::pin!(pending);
    let mut input_open = true;

    let result = loop {
        tokio::select! {
            result = &mut pending => break result,
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) if parse_review(&line) == Some(ReviewAction::Submit) => {
                    if controller.begin_submit()?.is_none() {
                        writeln!(out, "Saving...")?;
                    }
                }
                Ok(Some(_)) => writeln!(out, "Still saving, please wait.")?,
                Ok(None) => input_open = false,
                // The request is still out, its result has to land before giving up on input.
                Err(e) => {
                    warn!("Stopped reading input while saving {e:?}");
                    input_open = false;
                }
            }
        }
    };

    controller.complete_submit(result);
    Ok(())
}
