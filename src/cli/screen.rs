use std::time::Duration;

use ansi_term::{Colour, Style};

use crate::wizard::session::{Session, Step, SubmissionState};

/// Progress dots for the question steps, the current one highlighted.
pub fn progress_dots(step: Step) -> String {
    (0..Step::QUESTION_COUNT)
        .map(|index| {
            if index == step.index() {
                Style::new().bold().paint("●").to_string()
            } else {
                Colour::Fixed(8).paint("○").to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn hours(delay: Duration) -> u64 {
    (delay.as_secs() / 3600).max(1)
}

/// Lines describing the current screen of the wizard.
pub fn render(session: &Session, reminder_delay: Duration) -> Vec<String> {
    let mut lines = vec![];
    let step = session.step();
    if step.is_question() {
        lines.push(progress_dots(step));
        lines.push(String::new());
    }

    let title = |text: &str| Style::new().bold().paint(text.to_owned()).to_string();
    match step {
        Step::AskSkincare => {
            lines.push(title("Did you do your skincare today?"));
            lines.push("[y]es / [n]o".into());
        }
        Step::AskZeroSugar => {
            lines.push(title("Zero sugar today?"));
            lines.push("[y]es / [n]o".into());
        }
        Step::AskNotes => {
            lines.push(title("Anything worth noting?"));
            lines.push("Optional notes, finish with an empty line.".into());
        }
        Step::Review => {
            lines.push(title("All set 🎯"));
            if let Some(error) = session.error() {
                lines.push(Colour::Red.paint(error.to_owned()).to_string());
            }
            if session.is_pending() {
                lines.push("Saving...".into());
            } else {
                lines.push(format!(
                    "[s]ubmit / [r]emind me in {} hours / [q]uit",
                    hours(reminder_delay)
                ));
            }
        }
        Step::Success => {
            lines.push(title("Done for today ✨"));
            lines.push("Your check-in has been saved.".into());
            if let SubmissionState::Succeeded(Some(streak)) = session.submission() {
                let days = if *streak == 1 { "day" } else { "days" };
                lines.push(format!("Streak: {streak} {days}"));
            }
        }
    }
    lines
}
