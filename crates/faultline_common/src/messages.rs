//! User-facing message formatting.
//!
//! Messages are short and jargon-free. The host application decides how
//! (or whether) to present them.

use crate::kind::{ErrorKind, Severity};

/// Formats the text shown to a user for a fault
pub trait MessageFormatter: Send + Sync {
    /// Message for an accepted fault of `kind`
    fn user_message(&self, kind: ErrorKind, severity: Severity) -> String;

    /// Message for a fault that recovery could not fix
    fn unrecoverable_message(&self, kind: ErrorKind) -> String {
        format!(
            "{} If this persists, please restart the app.",
            self.user_message(kind, kind.severity())
        )
    }

    /// Message shown once when safe mode is entered
    fn safe_mode_message(&self) -> String {
        "Some features have been turned off to keep things running smoothly.".to_string()
    }
}

/// Built-in English messages
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainMessages;

impl MessageFormatter for PlainMessages {
    fn user_message(&self, kind: ErrorKind, severity: Severity) -> String {
        let base = match kind {
            ErrorKind::TrackingLoss => {
                "Having trouble understanding your surroundings. Try moving slowly in a well-lit area."
            }
            ErrorKind::AssetLoadFailure => "Couldn't load an image. Please try again.",
            ErrorKind::ProcessingFailure => "Couldn't apply that effect. Please try again.",
            ErrorKind::AnalysisFailure => "Couldn't read the colours in this view.",
            ErrorKind::ResourcePressure => "Running low on memory. Closing other apps may help.",
            ErrorKind::ThroughputDegradation => "Things may feel a little slow for a moment.",
            ErrorKind::InteractionFailure => "That gesture didn't register. Please try again.",
            ErrorKind::AnchorFailure => "Couldn't place that item. Try pointing at a flat surface.",
            ErrorKind::CaptureDeviceFailure => "The camera isn't available right now.",
            ErrorKind::DataCorruption => "Some saved data couldn't be read and was skipped.",
            ErrorKind::Unknown => "Something went wrong.",
        };

        if severity == Severity::Critical {
            format!("{} We're working on fixing it.", base)
        } else {
            base.to_string()
        }
    }
}
