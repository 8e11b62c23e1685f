pub mod collect;

use console::Style;
use localstyle_core::LocalStyleKind;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INPUT_ERROR: u8 = 2;
pub const EXIT_COLLECT_ERROR: u8 = 3;

/// A failed command: the message for stderr and the process exit code.
#[derive(Debug)]
pub struct CommandError {
    pub code: u8,
    pub message: String,
}

impl CommandError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: EXIT_FAILURE,
            message: message.into(),
        }
    }

    pub fn input(message: impl ToString) -> Self {
        Self {
            code: EXIT_INPUT_ERROR,
            message: message.to_string(),
        }
    }

    pub fn collect(message: impl ToString) -> Self {
        Self {
            code: EXIT_COLLECT_ERROR,
            message: message.to_string(),
        }
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, CommandError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CommandError::failure(format!("JSON serialization failed: {e}")))
}

pub fn colorize_kind(kind: LocalStyleKind) -> String {
    match kind {
        LocalStyleKind::Inline => Style::new().cyan().apply_to("inline").to_string(),
        LocalStyleKind::External => Style::new().green().apply_to("external").to_string(),
        LocalStyleKind::Defaults => Style::new().yellow().apply_to("defaults").to_string(),
    }
}
