use std::fmt::Display;

use serde::{Serialize, Serializer};

/// Response to a yes/no question. `Unanswered` is sent to the ledger as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Answer {
    #[default]
    Unanswered,
    Yes,
    No,
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        if value {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

impl Serialize for Answer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Answer::Unanswered => serializer.serialize_none(),
            Answer::Yes => serializer.serialize_str("yes"),
            Answer::No => serializer.serialize_str("no"),
        }
    }
}

impl Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Unanswered => write!(f, "-"),
            Answer::Yes => write!(f, "yes"),
            Answer::No => write!(f, "no"),
        }
    }
}

/// Position in the wizard. The ordinal is the step counter: 0 for the first question, up to
/// [Step::Success].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Step {
    #[default]
    AskSkincare = 0,
    AskZeroSugar = 1,
    AskNotes = 2,
    Review = 3,
    Success = 4,
}

impl Step {
    pub const COUNT: usize = 5;
    /// Steps that show progress dots.
    pub const QUESTION_COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_question(self) -> bool {
        self.index() < Self::QUESTION_COUNT
    }

    pub(super) fn next(self) -> Option<Step> {
        match self {
            Step::AskSkincare => Some(Step::AskZeroSugar),
            Step::AskZeroSugar => Some(Step::AskNotes),
            Step::AskNotes => Some(Step::Review),
            Step::Review => Some(Step::Success),
            Step::Success => None,
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::AskSkincare => "skincare question",
            Step::AskZeroSugar => "zero sugar question",
            Step::AskNotes => "notes",
            Step::Review => "review",
            Step::Success => "success",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Pending,
    Succeeded(Option<u32>),
    Failed(String),
}

/// Live state of one check-in attempt. Lives only in memory and is dropped with the process.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(super) step: Step,
    pub(super) skincare: Answer,
    pub(super) zero_sugar: Answer,
    pub(super) notes: String,
    pub(super) submission: SubmissionState,
}

impl Session {
    pub fn step(&self) -> Step {
        self.step
    }

    pub fn skincare(&self) -> Answer {
        self.skincare
    }

    pub fn zero_sugar(&self) -> Answer {
        self.zero_sugar
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.submission, SubmissionState::Pending)
    }

    /// Error from the last attempt, shown on the review screen.
    pub fn error(&self) -> Option<&str> {
        match &self.submission {
            SubmissionState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Answer, Session, Step, SubmissionState};

    #[test]
    fn fresh_session_has_defaults() {
        let session = Session::default();
        assert_eq!(session.step(), Step::AskSkincare);
        assert_eq!(session.step().index(), 0);
        assert_eq!(session.skincare(), Answer::Unanswered);
        assert_eq!(session.zero_sugar(), Answer::Unanswered);
        assert_eq!(session.notes(), "");
        assert_eq!(session.submission(), &SubmissionState::Idle);
    }

    #[test]
    fn answers_serialize_as_ledger_values() {
        assert_eq!(serde_json::to_string(&Answer::Yes).unwrap(), "\"yes\"");
        assert_eq!(serde_json::to_string(&Answer::No).unwrap(), "\"no\"");
        assert_eq!(serde_json::to_string(&Answer::Unanswered).unwrap(), "null");
    }

    #[test]
    fn steps_advance_one_at_a_time() {
        let mut step = Step::AskSkincare;
        let mut visited = vec![step.index()];
        while let Some(next) = step.next() {
            assert_eq!(next.index(), step.index() + 1);
            step = next;
            visited.push(step.index());
        }
        assert_eq!(visited, (0..Step::COUNT).collect::<Vec<_>>());
    }
}
