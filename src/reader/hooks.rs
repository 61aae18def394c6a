//! Callbacks supplied by the site adapter.

use std::fmt;

/// Callback type for moving to the previous chapter
pub type PrevCallback = Box<dyn FnMut()>;

/// Callback type for moving to the next chapter
pub type NextCallback = Box<dyn FnMut()>;

/// Callback type for leaving the reader; the flag is true when leaving from the end
pub type ExitCallback = Box<dyn FnMut(bool)>;

/// A labelled host action shown by the UI.
pub struct HostButton {
    pub label: String,
    pub on_click: Box<dyn FnMut()>,
}

impl HostButton {
    pub fn new<F>(label: impl Into<String>, on_click: F) -> Self
    where
        F: FnMut() + 'static,
    {
        Self {
            label: label.into(),
            on_click: Box::new(on_click),
        }
    }
}

impl fmt::Debug for HostButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostButton")
            .field("label", &self.label)
            .field("on_click", &"<closure>")
            .finish()
    }
}

/// Chapter navigation hooks. A missing hook disables the matching end-page action.
#[derive(Default)]
pub struct HostHooks {
    pub on_prev: Option<PrevCallback>,
    pub on_next: Option<NextCallback>,
    pub on_exit: Option<ExitCallback>,
    pub comments: Vec<String>,
    pub edit_buttons: Vec<HostButton>,
}

impl HostHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prev<F>(mut self, f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.on_prev = Some(Box::new(f));
        self
    }

    pub fn with_next<F>(mut self, f: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.on_next = Some(Box::new(f));
        self
    }

    pub fn with_exit<F>(mut self, f: F) -> Self
    where
        F: FnMut(bool) + 'static,
    {
        self.on_exit = Some(Box::new(f));
        self
    }

    pub fn with_comments(mut self, comments: Vec<String>) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_button(mut self, button: HostButton) -> Self {
        self.edit_buttons.push(button);
        self
    }

    pub fn availability(&self) -> HookAvailability {
        HookAvailability {
            prev: self.on_prev.is_some(),
            next: self.on_next.is_some(),
            exit: self.on_exit.is_some(),
        }
    }

    pub(crate) fn call_prev(&mut self) -> bool {
        match self.on_prev.as_mut() {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    pub(crate) fn call_next(&mut self) -> bool {
        match self.on_next.as_mut() {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    pub(crate) fn call_exit(&mut self, at_end: bool) -> bool {
        match self.on_exit.as_mut() {
            Some(cb) => {
                cb(at_end);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for HostHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostHooks")
            .field("availability", &self.availability())
            .field("comments", &self.comments.len())
            .field("edit_buttons", &self.edit_buttons)
            .finish()
    }
}

/// Which hooks are present; what the navigation state machine needs to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookAvailability {
    pub prev: bool,
    pub next: bool,
    pub exit: bool,
}
