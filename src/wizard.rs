//! The report wizard as an explicit state machine.
//!
//! All transitions go through [`reduce`], which is pure: it takes the current
//! [`Wizard`] and an event and returns the next wizard plus, at most, one
//! effect for the caller to perform. The only effect is submitting the draft;
//! the caller reports the outcome back as another event.
//!
//! ```text
//! Idle -> Step1 <-> Step2 -> Submitting -> Submitted
//!                     ^          |
//!                     |          v
//!                     +------- Error  (Submit from Error retries)
//! ```

use serde::Serialize;

use crate::attachment::attach_evidence;
use crate::model::{DraftField, EvidenceFile, ReportDraft, SubmissionResult};
use crate::validation::{Notice, validate_step};

/// Where the user is in the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    /// Form not yet opened.
    Idle,
    /// Incident details.
    Step1,
    /// Additional information and evidence.
    Step2,
    /// Waiting for the server to accept the report.
    Submitting,
    /// The report was accepted.
    Submitted,
    /// The last submission attempt failed; the draft is intact.
    Error,
}

/// Input to the state machine.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    Start,
    FieldChanged(DraftField),
    EvidenceSelected(EvidenceFile),
    EvidenceCleared,
    Continue,
    Back,
    Submit,
    SubmitSucceeded(SubmissionResult),
    SubmitFailed(String),
    DismissNotice,
    ReportAnother,
    Leave,
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardEffect {
    SubmitReport(ReportDraft),
}

/// Complete wizard state.
#[derive(Debug, Clone, PartialEq)]
pub struct Wizard {
    pub phase: WizardPhase,
    pub draft: ReportDraft,
    /// Blocking notice, shown as a modal and inline until dismissed.
    pub notice: Option<Notice>,
    /// Last attachment rejection, cleared by the next valid selection.
    pub attachment_error: Option<String>,
    /// Server response for the accepted report.
    pub submission: Option<SubmissionResult>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            phase: WizardPhase::Idle,
            draft: ReportDraft::default(),
            notice: None,
            attachment_error: None,
            submission: None,
        }
    }

    /// The 1-3 step number shown in the progress indicator.
    pub fn wizard_step(&self) -> u8 {
        match self.phase {
            WizardPhase::Idle | WizardPhase::Step1 => 1,
            WizardPhase::Step2 | WizardPhase::Submitting | WizardPhase::Error => 2,
            WizardPhase::Submitted => 3,
        }
    }

    /// Whether the form accepts edits in the current phase.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.phase,
            WizardPhase::Step1 | WizardPhase::Step2 | WizardPhase::Error
        )
    }

    /// Follow-up text for the confirmation screen.
    pub fn confirmation_message(&self) -> Option<&'static str> {
        if self.phase != WizardPhase::Submitted {
            return None;
        }
        Some(if self.draft.anonymous {
            "You've submitted this report anonymously. The appropriate team will review and take action."
        } else {
            "A representative will contact you soon via the contact information provided."
        })
    }

    fn reset(phase: WizardPhase) -> Self {
        Self {
            phase,
            ..Self::new()
        }
    }
}

/// Apply one event to the wizard.
///
/// Events that make no sense in the current phase are ignored and return the
/// wizard unchanged.
pub fn reduce(wizard: Wizard, event: WizardEvent) -> (Wizard, Option<WizardEffect>) {
    use WizardPhase::*;

    match (wizard.phase, event) {
        (Idle, WizardEvent::Start) => (Wizard { phase: Step1, ..wizard }, None),

        (_, WizardEvent::FieldChanged(field)) if wizard.is_editable() => {
            let draft = wizard.draft.with_field(field);
            (Wizard { draft, ..wizard }, None)
        }

        (_, WizardEvent::EvidenceSelected(file)) if wizard.is_editable() => {
            match attach_evidence(&wizard.draft, file) {
                Ok(draft) => (
                    Wizard {
                        draft,
                        attachment_error: None,
                        ..wizard
                    },
                    None,
                ),
                Err(e) => (
                    Wizard {
                        attachment_error: Some(e.to_string()),
                        ..wizard
                    },
                    None,
                ),
            }
        }

        (_, WizardEvent::EvidenceCleared) if wizard.is_editable() => {
            let draft = wizard.draft.with_evidence(None);
            (
                Wizard {
                    draft,
                    attachment_error: None,
                    ..wizard
                },
                None,
            )
        }

        (Step1, WizardEvent::Continue) => match validate_step(&wizard.draft, 1).notice() {
            None => (
                Wizard {
                    phase: Step2,
                    notice: None,
                    ..wizard
                },
                None,
            ),
            Some(notice) => (
                Wizard {
                    notice: Some(notice),
                    ..wizard
                },
                None,
            ),
        },

        (Step2 | Error, WizardEvent::Continue | WizardEvent::Submit) => {
            match validate_step(&wizard.draft, 2).notice() {
                None => {
                    let effect = WizardEffect::SubmitReport(wizard.draft.clone());
                    (
                        Wizard {
                            phase: Submitting,
                            notice: None,
                            ..wizard
                        },
                        Some(effect),
                    )
                }
                Some(notice) => (
                    Wizard {
                        notice: Some(notice),
                        ..wizard
                    },
                    None,
                ),
            }
        }

        (Step2 | Error, WizardEvent::Back) => (
            Wizard {
                phase: Step1,
                notice: None,
                ..wizard
            },
            None,
        ),

        (Submitting, WizardEvent::SubmitSucceeded(result)) => (
            Wizard {
                phase: Submitted,
                notice: None,
                submission: Some(result),
                ..wizard
            },
            None,
        ),

        (Submitting, WizardEvent::SubmitFailed(message)) => (
            Wizard {
                phase: Error,
                notice: Some(Notice::submission_failed(message)),
                ..wizard
            },
            None,
        ),

        (Error, WizardEvent::DismissNotice) => (
            Wizard {
                phase: Step2,
                notice: None,
                ..wizard
            },
            None,
        ),

        (_, WizardEvent::DismissNotice) => (
            Wizard {
                notice: None,
                ..wizard
            },
            None,
        ),

        (Submitting, WizardEvent::ReportAnother | WizardEvent::Leave) => (wizard, None),

        (_, WizardEvent::ReportAnother) => (Wizard::reset(Step1), None),

        (_, WizardEvent::Leave) => (Wizard::reset(Idle), None),

        (_, _) => (wizard, None),
    }
}
