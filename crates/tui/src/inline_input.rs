use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use savedq_core::name_edit::{FocusHandle, NameFieldProps};

/// Single-line text control that commits its text when it loses focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineInput {
    value: String,
    original: String,
    editing: bool,
    disabled: bool,
}

impl InlineInput {
    #[must_use]
    pub fn from_props(props: &NameFieldProps) -> Self {
        Self {
            value: props.value.clone(),
            original: props.value.clone(),
            editing: false,
            disabled: props.disabled,
        }
    }

    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            original: value.clone(),
            value,
            editing: false,
            disabled: false,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns whether the input took focus.
    pub fn focus(&mut self) -> bool {
        if self.disabled {
            return false;
        }
        if !self.editing {
            self.original = self.value.clone();
            self.editing = true;
        }
        true
    }

    pub fn insert(&mut self, ch: char) {
        if self.editing && !ch.is_control() {
            self.value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if self.editing {
            self.value.pop();
        }
    }

    /// Blurs the input and hands back the text to commit.
    pub fn blur(&mut self) -> Option<String> {
        if !self.editing {
            return None;
        }
        self.editing = false;
        Some(self.value.clone())
    }

    /// Restores the text from before editing, then blurs.
    pub fn revert(&mut self) -> Option<String> {
        if !self.editing {
            return None;
        }
        self.value = self.original.clone();
        self.blur()
    }
}

/// Focus requests coming from background tasks, applied on the next tick.
#[derive(Debug, Clone, Default)]
pub struct FocusRequest {
    requested: Arc<AtomicBool>,
}

impl FocusRequest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }
}

impl FocusHandle for FocusRequest {
    fn request_focus(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}
