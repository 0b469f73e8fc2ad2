// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the editor surface.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Three severity levels drive presentation (toast, inline hint, dialog).

use crate::error::BlattwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Slow or busy — trying again may work.
    Transient,
    /// The user must change their input (order list, crop, session name).
    ActionRequired,
    /// The source itself is unusable.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same action can succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(
        message: impl Into<String>,
        suggestion: impl Into<String>,
        retriable: bool,
        severity: Severity,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `BlattwerkError` into a `HumanError`.
pub fn humanize_error(err: &BlattwerkError) -> HumanError {
    match err {
        // -- Per-unit errors --
        BlattwerkError::Decode(_) => HumanError::new(
            "This file couldn't be read.",
            "It may be damaged or in an unusual format. Try saving it as PNG, JPEG or PDF first.",
            false,
            Severity::Permanent,
        ),

        BlattwerkError::RenderTimeout { seconds, .. } => HumanError::new(
            "A page took too long to render and was left out.",
            format!(
                "Very large pages can take more than {seconds} seconds. Try cropping the page or exporting it on its own."
            ),
            true,
            Severity::Transient,
        ),

        BlattwerkError::OversizeInput { name, .. } => HumanError::new(
            format!("{name} is too large to open."),
            "Try reducing the image resolution or splitting the document first.",
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::Encode(_) => HumanError::new(
            "A page couldn't be prepared for export.",
            "Try exporting again. If this keeps happening, reset the page to its original.",
            true,
            Severity::Transient,
        ),

        BlattwerkError::Pdf(_) => HumanError::new(
            "There's a problem with this PDF file.",
            "The file may be damaged. Try opening it in another viewer to check it works, or try a different file.",
            false,
            Severity::Permanent,
        ),

        BlattwerkError::Task(_) => HumanError::new(
            "Something went wrong while working on a page.",
            "Try again. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),

        // -- Editing --
        BlattwerkError::InvalidReorderSpecification(detail) => HumanError::new(
            "That page order doesn't work.",
            format!("List every page number exactly once, separated by commas, e.g. 3,1,2. ({detail})"),
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::InvalidCrop { .. } => HumanError::new(
            "The crop area is outside the page.",
            "Drag the crop handles so the area stays inside the page.",
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::SplitLinesOnSegment(_) => HumanError::new(
            "This page has already been split.",
            "Reset or undo the split first if you want to split it differently.",
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::PageNotFound(_) => HumanError::new(
            "That page no longer exists.",
            "It may have been deleted or split. Select a page again.",
            false,
            Severity::ActionRequired,
        ),

        // -- Sessions --
        BlattwerkError::EmptySessionSetViolation => HumanError::new(
            "The last tab can't be closed.",
            "Open another tab first, then close this one.",
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::SessionNotFound(_) => HumanError::new(
            "That tab is no longer open.",
            "Choose one of the open tabs.",
            false,
            Severity::ActionRequired,
        ),

        BlattwerkError::InvalidSessionName => HumanError::new(
            "Tab names can't be empty.",
            "Type at least one letter or number.",
            false,
            Severity::ActionRequired,
        ),

        // -- Jobs --
        BlattwerkError::JobNotFound(_) | BlattwerkError::JobAlreadyFinished(_) => HumanError::new(
            "That task has already finished.",
            "Check the task list for its result.",
            false,
            Severity::Permanent,
        ),

        // -- Storage --
        BlattwerkError::StorageQuotaExceeded { .. } => HumanError::new(
            "Your tabs couldn't be saved for next time.",
            "Storage is full. Your work is still open; close unused tabs to free space.",
            false,
            Severity::Transient,
        ),

        BlattwerkError::Storage(_) => HumanError::new(
            "Saved data couldn't be read or written.",
            "Try closing and reopening the app. Open tabs are not affected.",
            true,
            Severity::Transient,
        ),

        BlattwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file couldn't be found.",
                "It may have been moved or deleted. Try choosing the file again.",
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "The app doesn't have permission to use that file.",
                "Check the file permissions, or copy the file to a different location first.",
                false,
                Severity::ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, your disk may be full.",
                true,
                Severity::Transient,
            ),
        },

        BlattwerkError::Serialization(_) => HumanError::new(
            "The app had an internal data problem.",
            "Try again. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        let err = BlattwerkError::RenderTimeout {
            unit: "page 4".into(),
            seconds: 30,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(human.suggestion.contains("30 seconds"));
    }

    #[test]
    fn last_session_is_action_required() {
        let human = humanize_error(&BlattwerkError::EmptySessionSetViolation);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn bad_order_mentions_detail() {
        let err = BlattwerkError::InvalidReorderSpecification("duplicate page 2".into());
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("duplicate page 2"));
    }

    #[test]
    fn missing_file_is_action_required() {
        let err = BlattwerkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn decode_is_permanent() {
        let human = humanize_error(&BlattwerkError::Decode("truncated".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
