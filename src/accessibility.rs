/*
 * Accessibility wrapper exposed per control.
 *
 * The wrapper only carries descriptive data; the core creates it lazily on first
 * request and forwards "notify clients" calls to an optional notifier installed on
 * the tree. Nothing in the core depends on what the notifier does.
 */
use crate::types::ControlId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessibleRole {
    #[default]
    Default,
    Client,
    Window,
    Grouping,
    PushButton,
    CheckButton,
    RadioButton,
    Text,
    StaticText,
    List,
    Outline,
    ProgressBar,
    PageTabList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessibleEvent {
    Create,
    Destroy,
    Show,
    Hide,
    Focus,
    Selection,
    StateChange,
    NameChange,
    DescriptionChange,
    ValueChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessibleObject {
    owner: ControlId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub role: AccessibleRole,
    pub default_action: Option<String>,
}

impl AccessibleObject {
    pub(crate) fn new(owner: ControlId) -> Self {
        Self {
            owner,
            name: None,
            description: None,
            role: AccessibleRole::Default,
            default_action: None,
        }
    }

    pub fn owner(&self) -> ControlId {
        self.owner
    }
}

/// Receives accessibility events raised by controls whose wrapper exists.
pub trait AccessibilityNotifier: Send {
    fn notify(&self, control: ControlId, event: AccessibleEvent, child_id: i32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::test_support::tree;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<(ControlId, AccessibleEvent)>>>);

    impl AccessibilityNotifier for Recorder {
        fn notify(&self, control: ControlId, event: AccessibleEvent, _child_id: i32) {
            self.0.lock().unwrap().push((control, event));
        }
    }

    #[test]
    fn notifications_flow_only_once_the_wrapper_exists() {
        // Arrange
        let (mut tree, _platform) = tree();
        let seen = Arc::new(Mutex::new(Vec::new()));
        tree.set_accessibility_notifier(Box::new(Recorder(Arc::clone(&seen))));
        let control = tree.new_control("label");

        // Act
        tree.set_text(control, "before").unwrap();
        tree.accessibility_object(control).unwrap().role = AccessibleRole::StaticText;
        tree.set_text(control, "after").unwrap();

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(control, AccessibleEvent::NameChange)]
        );
    }
}
