//! Wizard positions: the fine-grained phase, the three visible steps, and
//! the screen the presentation layer should show.

use serde::Serialize;
use std::fmt;

/// Where the try-on flow is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    SelectProduct,
    UploadPhoto,
    /// A try-on is in flight. Not navigable away from until it resolves.
    Submitting,
    ResultReady,
    Failed,
}

impl Phase {
    pub fn step(&self) -> WizardStep {
        match self {
            Phase::SelectProduct => WizardStep::SelectProduct,
            Phase::UploadPhoto => WizardStep::UploadPhoto,
            Phase::Submitting | Phase::ResultReady | Phase::Failed => WizardStep::ResultOrProgress,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::SelectProduct => "product selection",
            Phase::UploadPhoto => "photo upload",
            Phase::Submitting => "generation",
            Phase::ResultReady => "result",
            Phase::Failed => "failure",
        };
        f.write_str(s)
    }
}

/// The three steps shown in the step indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectProduct,
    UploadPhoto,
    ResultOrProgress,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::SelectProduct,
        WizardStep::UploadPhoto,
        WizardStep::ResultOrProgress,
    ];

    /// 1-based position.
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::SelectProduct => 1,
            WizardStep::UploadPhoto => 2,
            WizardStep::ResultOrProgress => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WizardStep::SelectProduct => "Choose set",
            WizardStep::UploadPhoto => "Upload photo",
            WizardStep::ResultOrProgress => "Result",
        }
    }

    /// Whether this step is highlighted when `current` is active.
    pub fn is_reached(&self, current: WizardStep) -> bool {
        self.number() <= current.number()
    }
}

/// What the presentation layer must render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Startup probe has not answered yet.
    Probing,
    /// No usable credential; only credential selection is offered.
    CredentialRequired,
    Step(WizardStep),
}
