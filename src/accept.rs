//! Accept-label validation
//!
//! A button wired to an accept-class response grants the client access to
//! whatever the user selects, so its label has to say so. Labels are compared
//! against a fixed list of English verbs after removing the mnemonic marker.
//! There is no translation awareness: a localized "Öffnen" is rejected.

use tracing::warn;

use crate::dialog::ButtonSpec;

/// Character that marks the mnemonic in a button label (`_Open`).
pub const MNEMONIC_MARKER: char = '_';

/// Labels allowed on accept-class buttons, compared case-insensitively.
pub const ACCEPT_LABELS: &[&str] = &[
    "Accept",
    "Add",
    "Apply",
    "Attach",
    "Browse",
    "Choose",
    "Confirm",
    "Continue",
    "Copy",
    "Create",
    "Done",
    "Download",
    "Export",
    "Extract",
    "Finish",
    "Import",
    "Insert",
    "Load",
    "Move",
    "OK",
    "Open",
    "Overwrite",
    "Pick",
    "Print",
    "Rename",
    "Replace",
    "Save",
    "Save As",
    "Select",
    "Send",
    "Share",
    "Submit",
    "Upload",
    "Use",
    "Yes",
];

/// Whether `label` may be attached to an accept-class response.
pub fn is_accept_label(label: &str) -> bool {
    let stripped: String = label.chars().filter(|c| *c != MNEMONIC_MARKER).collect();
    let stripped = stripped.trim();
    ACCEPT_LABELS
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(stripped))
}

/// Drop every accept-class button whose label is not an accept label.
///
/// Only the offending buttons are removed; the rest keep their order.
pub fn filter_buttons(buttons: Vec<ButtonSpec>) -> Vec<ButtonSpec> {
    buttons
        .into_iter()
        .filter(|button| {
            let allowed = !button.response.is_accept_class() || is_accept_label(&button.label);
            if !allowed {
                warn!(
                    "Rejected button {:?}: label not allowed for response {:?}",
                    button.label, button.response
                );
            }
            allowed
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::ResponseType;

    #[test]
    fn test_accept_label_case_and_mnemonic() {
        assert!(is_accept_label("_Open"));
        assert!(is_accept_label("OPEN"));
        assert!(is_accept_label("open"));
        assert!(is_accept_label("_Save _As"));
        assert!(is_accept_label("O_K"));
    }

    #[test]
    fn test_non_accept_labels() {
        assert!(!is_accept_label("Cancel"));
        assert!(!is_accept_label("_Cancel"));
        assert!(!is_accept_label(""));
        assert!(!is_accept_label("Open Sesame"));
        // No translation awareness
        assert!(!is_accept_label("Öffnen"));
    }

    #[test]
    fn test_filter_drops_only_mislabeled_accept_buttons() {
        let buttons = vec![
            ButtonSpec::new("Cancel", ResponseType::Accept),
            ButtonSpec::new("Cancel", ResponseType::Reject),
            ButtonSpec::new("_Open", ResponseType::Accept),
            ButtonSpec::new("Delete everything", ResponseType::Yes),
            ButtonSpec::new("Help", ResponseType::Help),
        ];

        let kept = filter_buttons(buttons);

        assert_eq!(
            kept,
            vec![
                ButtonSpec::new("Cancel", ResponseType::Reject),
                ButtonSpec::new("_Open", ResponseType::Accept),
                ButtonSpec::new("Help", ResponseType::Help),
            ]
        );
    }

    #[test]
    fn test_filter_checks_every_accept_class_code() {
        for response in [
            ResponseType::Accept,
            ResponseType::Ok,
            ResponseType::Yes,
            ResponseType::Apply,
        ] {
            let kept = filter_buttons(vec![ButtonSpec::new("Cancel", response)]);
            assert!(kept.is_empty(), "{:?} should be rejected", response);
        }
    }

    #[test]
    fn test_filter_sees_through_custom_accept_codes() {
        let literal = ButtonSpec {
            label: "Cancel".to_string(),
            response: ResponseType::Custom(-3),
        };
        assert!(filter_buttons(vec![literal]).is_empty());

        let kept = filter_buttons(vec![ButtonSpec::new("Cancel", ResponseType::Custom(-5))]);
        assert!(kept.is_empty());

        let kept = filter_buttons(vec![ButtonSpec::new("Later", ResponseType::Custom(7))]);
        assert_eq!(kept.len(), 1);
    }
}
