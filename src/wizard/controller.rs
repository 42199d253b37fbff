use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    submission::{SubmissionResult, Submitter},
    utils::clock::Clock,
};

use super::{
    record::CheckinRecord,
    session::{Answer, Session, Step, SubmissionState},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("can't {action} on the {step} step")]
    InvalidAction { action: &'static str, step: Step },
}

/// Drives a [Session] through the wizard. All mutation goes through here, one user action at a
/// time. The only suspension point is the submission, which is split into
/// [WizardController::begin_submit] and [WizardController::complete_submit] so that a front-end
/// can keep reading input while the request is in flight.
pub struct WizardController {
    session: Session,
    date_provider: Box<dyn Clock>,
}

impl WizardController {
    pub fn new(date_provider: Box<dyn Clock>) -> Self {
        Self {
            session: Session::default(),
            date_provider,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn expect_step(&self, step: Step, action: &'static str) -> Result<(), WizardError> {
        if self.session.step == step {
            Ok(())
        } else {
            Err(WizardError::InvalidAction {
                action,
                step: self.session.step,
            })
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.session.step.next() {
            debug!("Moving from {} to {}", self.session.step, next);
            self.session.step = next;
        }
    }

    /// Records a yes/no answer for the current question and moves to the next step.
    pub fn answer(&mut self, value: bool) -> Result<Step, WizardError> {
        let answer = Answer::from(value);
        match self.session.step {
            Step::AskSkincare => self.session.skincare = answer,
            Step::AskZeroSugar => self.session.zero_sugar = answer,
            step => {
                return Err(WizardError::InvalidAction {
                    action: "answer",
                    step,
                })
            }
        }
        self.advance();
        Ok(self.session.step)
    }

    /// Replaces the notes text. Any text is accepted, including an empty one.
    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), WizardError> {
        self.expect_step(Step::AskNotes, "edit notes")?;
        self.session.notes = notes.into();
        Ok(())
    }

    pub fn continue_to_review(&mut self) -> Result<Step, WizardError> {
        self.expect_step(Step::AskNotes, "continue")?;
        self.advance();
        Ok(self.session.step)
    }

    /// Starts a submission. Returns the record to send, or `None` when a submission is already
    /// pending, in which case nothing changes. The record is dated with the current day.
    pub fn begin_submit(&mut self) -> Result<Option<CheckinRecord>, WizardError> {
        self.expect_step(Step::Review, "submit")?;
        if self.session.is_pending() {
            debug!("Ignoring submit while another submission is pending");
            return Ok(None);
        }

        let record = CheckinRecord::from_session(&self.session, self.date_provider.today());
        self.session.submission = SubmissionState::Pending;
        info!("Submitting check-in for {}", record.date);
        Ok(Some(record))
    }

    /// Applies the outcome of the pending submission. Outcomes without a pending submission are
    /// dropped.
    pub fn complete_submit(&mut self, result: SubmissionResult) {
        if !self.session.is_pending() {
            warn!("Got a submission result without a pending submission {result:?}");
            return;
        }

        match result {
            SubmissionResult::Success { streak } => {
                info!("Check-in saved, streak {streak:?}");
                self.session.submission = SubmissionState::Succeeded(streak);
                self.advance();
            }
            SubmissionResult::Failure { message } => {
                warn!("Check-in failed: {message}");
                self.session.submission = SubmissionState::Failed(message);
            }
        }
    }

    /// Convenience for front-ends that don't need to read input while waiting.
    pub async fn submit(&mut self, client: &impl Submitter) -> Result<Option<Step>, WizardError> {
        let Some(record) = self.begin_submit()? else {
            return Ok(None);
        };
        let result = client.submit(&record).await;
        self.complete_submit(result);
        Ok(Some(self.session.step))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use chrono::{NaiveDate, NaiveTime};

    use crate::{
        submission::{SubmissionResult, Submitter},
        utils::{clock::test_clock::FixedClock, logging::TEST_LOGGING},
        wizard::{
            record::CheckinRecord,
            session::{Answer, Step, SubmissionState},
        },
    };

    use super::{WizardController, WizardError};

    fn test_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn controller() -> WizardController {
        WizardController::new(Box::new(FixedClock::at(
            test_day(),
            NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
        )))
    }

    fn at_review() -> WizardController {
        let mut controller = controller();
        controller.answer(true).unwrap();
        controller.answer(false).unwrap();
        controller.continue_to_review().unwrap();
        controller
    }

    /// Answers with a canned result and remembers what it was asked to send.
    struct CannedSubmitter {
        result: SubmissionResult,
        sent: Mutex<Vec<CheckinRecord>>,
        calls: AtomicUsize,
    }

    impl CannedSubmitter {
        fn new(result: SubmissionResult) -> Self {
            Self {
                result,
                sent: Mutex::new(vec![]),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Submitter for CannedSubmitter {
        async fn submit(&self, record: &CheckinRecord) -> SubmissionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(record.clone());
            self.result.clone()
        }
    }

    #[test]
    fn step_increases_by_one_per_transition() {
        let mut controller = controller();
        let mut seen = vec![controller.session().step().index()];

        seen.push(controller.answer(true).unwrap().index());
        seen.push(controller.answer(true).unwrap().index());
        controller.set_notes("").unwrap();
        seen.push(controller.continue_to_review().unwrap().index());

        assert_eq!(seen, vec![0, 1, 2, 3]);
    }

    #[test]
    fn answers_are_recorded_per_question() {
        let controller = at_review();
        assert_eq!(controller.session().skincare(), Answer::Yes);
        assert_eq!(controller.session().zero_sugar(), Answer::No);
    }

    #[test]
    fn invalid_actions_leave_session_untouched() {
        let mut controller = controller();

        assert_eq!(
            controller.set_notes("early"),
            Err(WizardError::InvalidAction {
                action: "edit notes",
                step: Step::AskSkincare
            })
        );
        assert!(controller.continue_to_review().is_err());
        assert!(controller.begin_submit().is_err());
        assert_eq!(controller.session().step(), Step::AskSkincare);
        assert_eq!(controller.session().notes(), "");

        let mut controller = at_review();
        assert!(controller.answer(true).is_err());
        assert_eq!(controller.session().step(), Step::Review);
    }

    #[test]
    fn record_uses_day_of_finalization() {
        let mut controller = controller();
        controller.answer(false).unwrap();
        controller.answer(true).unwrap();
        controller.set_notes("tired\nbut fine").unwrap();
        controller.continue_to_review().unwrap();

        let record = controller.begin_submit().unwrap().unwrap();

        assert_eq!(
            record,
            CheckinRecord {
                date: test_day(),
                skincare: Answer::No,
                zero_sugar: Answer::Yes,
                notes: "tired\nbut fine".into(),
            }
        );
        assert_eq!(controller.session().submission(), &SubmissionState::Pending);
    }

    #[test]
    fn submit_is_noop_while_pending() {
        let mut controller = at_review();

        assert!(controller.begin_submit().unwrap().is_some());
        assert_eq!(controller.begin_submit(), Ok(None));
        assert_eq!(controller.session().submission(), &SubmissionState::Pending);
    }

    #[test]
    fn failure_returns_to_review_and_allows_retry() {
        let mut controller = at_review();
        controller.begin_submit().unwrap();
        controller.complete_submit(SubmissionResult::Failure {
            message: "Duplicate entry".into(),
        });

        assert_eq!(controller.session().step(), Step::Review);
        assert_eq!(controller.session().error(), Some("Duplicate entry"));

        assert!(controller.begin_submit().unwrap().is_some());
        assert_eq!(controller.session().error(), None);
        controller.complete_submit(SubmissionResult::Success { streak: Some(2) });

        assert_eq!(controller.session().step(), Step::Success);
        assert_eq!(
            controller.session().submission(),
            &SubmissionState::Succeeded(Some(2))
        );
    }

    #[test]
    fn results_without_pending_submission_are_ignored() {
        let mut controller = at_review();
        controller.complete_submit(SubmissionResult::Success { streak: Some(1) });

        assert_eq!(controller.session().step(), Step::Review);
        assert_eq!(controller.session().submission(), &SubmissionState::Idle);
    }

    #[test]
    fn success_is_terminal() {
        let mut controller = at_review();
        controller.begin_submit().unwrap();
        controller.complete_submit(SubmissionResult::Success { streak: None });

        assert!(controller.begin_submit().is_err());
        assert!(controller.answer(true).is_err());
        assert_eq!(controller.session().step(), Step::Success);
    }

    #[tokio::test]
    async fn submit_sends_record_once() {
        *TEST_LOGGING;
        let client = CannedSubmitter::new(SubmissionResult::Success { streak: Some(5) });
        let mut controller = controller();
        controller.answer(true).unwrap();
        controller.answer(false).unwrap();
        controller.continue_to_review().unwrap();

        let step = controller.submit(&client).await.unwrap();

        assert_eq!(step, Some(Step::Success));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        let sent = client.sent.lock().unwrap();
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            serde_json::json!({
                "date": "2026-10-19",
                "skincare": "yes",
                "zeroSugar": "no",
                "notes": "",
            })
        );
        assert_eq!(
            controller.session().submission(),
            &SubmissionState::Succeeded(Some(5))
        );
    }
}
