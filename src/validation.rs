//! Step validation for the report wizard.
//!
//! Validation is a pure function of the draft and the step the user is
//! trying to leave. A failed check produces a [`Notice`], which carries both
//! the blocking title and the inline message so the reason is visible
//! wherever the user is on the page.

use serde::Serialize;

use crate::model::{Category, ReportDraft};

/// Title of the blocking notice shown when a step cannot be completed.
pub const SUBMISSION_FAILED_TITLE: &str = "Submission Failed";

pub const MISSING_CATEGORY: &str = "Please select a category of incident.";
pub const INVALID_CATEGORY: &str = "Please select a valid category of incident.";
pub const MISSING_DESCRIPTION: &str = "Please describe what happened.";
pub const MISSING_CONTACT: &str =
    "Please provide a phone number or email address, or choose to report anonymously.";

/// A message to surface both as a modal and inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn submission_failed(message: impl Into<String>) -> Self {
        Self {
            title: SUBMISSION_FAILED_TITLE.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of validating a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCheck {
    Pass,
    Fail { reason: &'static str },
}

impl StepCheck {
    pub fn passed(&self) -> bool {
        matches!(self, StepCheck::Pass)
    }

    /// Convert a failure into the notice to display.
    pub fn notice(&self) -> Option<Notice> {
        match self {
            StepCheck::Pass => None,
            StepCheck::Fail { reason } => Some(Notice::submission_failed(*reason)),
        }
    }
}

/// Check whether the user may leave `step` (1 = incident details,
/// 2 = additional information, which submits).
pub fn validate_step(draft: &ReportDraft, step: u8) -> StepCheck {
    match step {
        2 => validate_submission(draft),
        _ => StepCheck::Pass,
    }
}

/// Check a draft is complete enough to submit. The category must be one of
/// the fixed [`Category`] labels.
pub fn validate_submission(draft: &ReportDraft) -> StepCheck {
    if draft.category.trim().is_empty() {
        return StepCheck::Fail {
            reason: MISSING_CATEGORY,
        };
    }
    if draft.known_category().is_none() {
        return StepCheck::Fail {
            reason: INVALID_CATEGORY,
        };
    }
    if draft.description.trim().is_empty() {
        return StepCheck::Fail {
            reason: MISSING_DESCRIPTION,
        };
    }
    if !draft.anonymous && !draft.has_contact() {
        return StepCheck::Fail {
            reason: MISSING_CONTACT,
        };
    }
    StepCheck::Pass
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DraftField;

    fn complete_draft() -> ReportDraft {
        ReportDraft::default()
            .with_field(DraftField::Category("Stalking".to_string()))
            .with_field(DraftField::Description("followed home".to_string()))
            .with_field(DraftField::Anonymous(true))
    }

    #[test]
    fn test_step_one_has_no_gate() {
        assert_eq!(validate_step(&ReportDraft::default(), 1), StepCheck::Pass);
    }

    #[test]
    fn test_missing_category_blocks() {
        let draft = complete_draft().with_field(DraftField::Category(String::new()));
        assert_eq!(
            validate_step(&draft, 2),
            StepCheck::Fail {
                reason: MISSING_CATEGORY
            }
        );
    }

    #[test]
    fn test_unknown_category_blocks() {
        let draft = complete_draft().with_field(DraftField::Category("Burglary".to_string()));
        assert_eq!(
            validate_submission(&draft),
            StepCheck::Fail {
                reason: INVALID_CATEGORY
            }
        );

        for category in Category::ALL {
            let draft = complete_draft().with_field(DraftField::Category(category.label().to_string()));
            assert!(validate_submission(&draft).passed(), "{category}");
        }

        let draft = complete_draft().with_field(DraftField::Category("sexual assault".to_string()));
        assert!(validate_submission(&draft).passed());
    }

    #[test]
    fn test_blank_description_blocks() {
        let draft = complete_draft().with_field(DraftField::Description("   ".to_string()));
        let check = validate_step(&draft, 2);

        assert!(!check.passed());
        let notice = check.notice().unwrap();
        assert_eq!(notice.title, "Submission Failed");
        assert_eq!(notice.message, MISSING_DESCRIPTION);
    }

    #[test]
    fn test_named_report_needs_contact() {
        let draft = complete_draft().with_field(DraftField::Anonymous(false));
        assert_eq!(
            validate_step(&draft, 2),
            StepCheck::Fail {
                reason: MISSING_CONTACT
            }
        );

        let draft = draft.with_field(DraftField::ContactPhone("0712 000000".to_string()));
        assert!(validate_step(&draft, 2).passed());
    }

    #[test]
    fn test_anonymous_report_needs_no_contact() {
        let draft = complete_draft();
        assert!(!draft.has_contact());
        assert!(validate_step(&draft, 2).passed());
        assert!(validate_step(&draft, 2).notice().is_none());
    }

    #[test]
    fn test_every_incomplete_combination_is_blocked() {
        for category in ["", "Burglary", "Other"] {
            for description in ["", "details"] {
                for anonymous in [false, true] {
                    for contact in ["", "a@b.ke"] {
                        let draft = ReportDraft::default()
                            .with_field(DraftField::Category(category.to_string()))
                            .with_field(DraftField::Description(description.to_string()))
                            .with_field(DraftField::Anonymous(anonymous))
                            .with_field(DraftField::ContactEmail(contact.to_string()));

                        let expected = Category::parse(category).is_some()
                            && !description.is_empty()
                            && (anonymous || !contact.is_empty());
                        assert_eq!(validate_submission(&draft).passed(), expected);
                    }
                }
            }
        }
    }
}
