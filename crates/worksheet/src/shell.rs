//! Presentation state
//!
//! The browser renders straight from [`ShellState`]; it changes only through
//! [`ShellState::apply`].

use crate::{JobRecord, TemplateOrigin};
use serde::Serialize;

const FILENAME_SUFFIX: &str = "Installation Worksheet.pdf";

/// Whether a template is available for stamping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TemplateStatus {
    #[default]
    Missing,
    Loading,
    Ready { origin: TemplateOrigin },
}

/// Everything the page needs to draw itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellState {
    pub input: String,
    pub loading: bool,
    pub error: Option<String>,
    pub success: bool,
    pub previewing: bool,
    pub template: TemplateStatus,
}

/// Events that move the shell between states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    InputChanged(String),
    TemplateLoading,
    TemplateReady(TemplateOrigin),
    TemplateFailed(String),
    /// A user file was refused; any cached template stays in use
    UploadRejected(String),
    GenerateStarted,
    GenerateSucceeded { preview: bool },
    GenerateFailed(String),
    PreviewClosed,
}

impl ShellState {
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::InputChanged(text) => {
                self.input = text;
                self.error = None;
            }
            Action::TemplateLoading => {
                self.template = TemplateStatus::Loading;
            }
            Action::TemplateReady(origin) => {
                self.template = TemplateStatus::Ready { origin };
                self.error = None;
            }
            Action::TemplateFailed(message) => {
                self.template = TemplateStatus::Missing;
                self.error = Some(message);
            }
            Action::UploadRejected(message) => {
                self.error = Some(message);
            }
            Action::GenerateStarted => {
                self.loading = true;
                self.error = None;
                self.success = false;
            }
            Action::GenerateSucceeded { preview } => {
                self.loading = false;
                if preview {
                    self.previewing = true;
                } else {
                    self.success = true;
                    self.input.clear();
                }
            }
            Action::GenerateFailed(message) => {
                self.loading = false;
                self.error = Some(message);
            }
            Action::PreviewClosed => {
                self.previewing = false;
            }
        }
    }

    /// True when the generate buttons should be enabled
    pub fn can_generate(&self) -> bool {
        !self.loading
            && !self.input.trim().is_empty()
            && matches!(self.template, TemplateStatus::Ready { .. })
    }
}

/// Download name for a stamped worksheet
///
/// Characters that are not allowed in file names on common platforms are
/// replaced with `-`.
pub fn output_filename(record: &JobRecord) -> String {
    let name = format!(
        "{} {} {FILENAME_SUFFIX}",
        record.customer_name, record.order_number
    );
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ready() -> ShellState {
        let mut state = ShellState::default();
        state.apply(Action::TemplateReady(TemplateOrigin::Synthesized));
        state.apply(Action::InputChanged("Acme".to_string()));
        state
    }

    #[test]
    fn test_initial_state() {
        let state = ShellState::default();
        assert_eq!(state.template, TemplateStatus::Missing);
        assert!(!state.loading);
        assert!(!state.can_generate());
    }

    #[test]
    fn test_input_clears_error() {
        let mut state = ShellState::default();
        state.apply(Action::GenerateFailed("boom".to_string()));
        assert_eq!(state.error.as_deref(), Some("boom"));

        state.apply(Action::InputChanged("x".to_string()));
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_generate_started_resets_flags() {
        let mut state = ready();
        state.success = true;
        state.error = Some("old".to_string());

        state.apply(Action::GenerateStarted);
        assert!(state.loading);
        assert!(!state.success);
        assert_eq!(state.error, None);
        assert!(!state.can_generate());
    }

    #[test]
    fn test_download_success_clears_input() {
        let mut state = ready();
        state.apply(Action::GenerateStarted);
        state.apply(Action::GenerateSucceeded { preview: false });

        assert!(!state.loading);
        assert!(state.success);
        assert_eq!(state.input, "");
    }

    #[test]
    fn test_preview_success_keeps_input() {
        let mut state = ready();
        state.apply(Action::GenerateStarted);
        state.apply(Action::GenerateSucceeded { preview: true });

        assert!(state.previewing);
        assert!(!state.success);
        assert_eq!(state.input, "Acme");

        state.apply(Action::PreviewClosed);
        assert!(!state.previewing);
    }

    #[test]
    fn test_failure_keeps_input() {
        let mut state = ready();
        state.apply(Action::GenerateStarted);
        state.apply(Action::GenerateFailed("too few lines".to_string()));

        assert!(!state.loading);
        assert_eq!(state.input, "Acme");
        assert!(state.can_generate());
    }

    #[test]
    fn test_blank_input_cannot_generate() {
        let mut state = ready();
        state.apply(Action::InputChanged("  \n ".to_string()));
        assert!(!state.can_generate());
    }

    #[test]
    fn test_template_failure() {
        let mut state = ShellState::default();
        state.apply(Action::TemplateLoading);
        assert_eq!(state.template, TemplateStatus::Loading);

        state.apply(Action::TemplateFailed("Failed to synthesize template".to_string()));
        assert_eq!(state.template, TemplateStatus::Missing);
        assert!(state.error.is_some());
    }

    #[test]
    fn test_rejected_upload_keeps_ready_template() {
        let mut state = ready();
        state.apply(Action::UploadRejected("Please upload a PDF file".to_string()));

        assert_eq!(
            state.template,
            TemplateStatus::Ready {
                origin: TemplateOrigin::Synthesized
            }
        );
        assert_eq!(state.error.as_deref(), Some("Please upload a PDF file"));
        assert!(state.can_generate());
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let state = ready();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["template"]["status"], "ready");
        assert_eq!(json["template"]["origin"]["kind"], "synthesized");
        assert_eq!(json["previewing"], false);
    }

    #[test]
    fn test_output_filename() {
        let record = JobRecord {
            customer_name: "Acme Ltd".to_string(),
            order_number: "SORD100".to_string(),
            ..JobRecord::default()
        };
        assert_eq!(
            output_filename(&record),
            "Acme Ltd SORD100 Installation Worksheet.pdf"
        );
    }

    #[test]
    fn test_output_filename_sanitized() {
        let record = JobRecord {
            customer_name: "A/B: \"C\"".to_string(),
            order_number: "S<1>|*?\\\t".to_string(),
            ..JobRecord::default()
        };
        assert_eq!(
            output_filename(&record),
            "A-B- -C- S-1------ Installation Worksheet.pdf"
        );
    }
}
