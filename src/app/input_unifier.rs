use std::path::Path;
use std::sync::Arc;

use crate::domain::{ImageFile, UploadError, is_image_content_type};

/// File-like handle delivered by the picker or a drop payload, before its
/// declared content type has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    file: ImageFile,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            file: ImageFile::new(name, declared_type, bytes),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        Ok(Self {
            file: ImageFile::from_path(path)?,
        })
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn declared_type(&self) -> &str {
        self.file.content_type()
    }

    fn into_image(self) -> Option<ImageFile> {
        is_image_content_type(self.file.content_type()).then_some(self.file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSignal {
    Accepted(ImageFile),
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Enter,
    Over,
    Leave,
}

/// What the host must do with the native event after the unifier saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDisposition {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl EventDisposition {
    pub const CONSUMED: Self = Self {
        prevent_default: true,
        stop_propagation: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropOutcome {
    pub disposition: EventDisposition,
    pub signal: Option<SelectionSignal>,
}

/// The host's native file input. Resetting its value lets the same file be
/// picked twice in a row.
pub trait FileInputControl: Send + Sync {
    fn reset_value(&self);
}

/// Collapses picker, drop and clear gestures into `SelectionSignal`s.
#[derive(Default)]
pub struct InputUnifier {
    drag_active: bool,
    picker_value: Option<String>,
    file_input: Option<Arc<dyn FileInputControl>>,
}

impl InputUnifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file_input(file_input: Arc<dyn FileInputControl>) -> Self {
        Self {
            file_input: Some(file_input),
            ..Self::default()
        }
    }

    pub fn is_drag_active(&self) -> bool {
        self.drag_active
    }

    /// Mirror of the native input's value (the picked file name).
    pub fn picker_value(&self) -> Option<&str> {
        self.picker_value.as_deref()
    }

    pub fn on_file_picked(
        &mut self,
        files: impl IntoIterator<Item = CandidateFile>,
    ) -> Option<SelectionSignal> {
        let candidate = files.into_iter().next()?;
        self.picker_value = Some(candidate.name().to_string());
        accept(candidate, "picker")
    }

    pub fn on_dropped(&mut self, files: impl IntoIterator<Item = CandidateFile>) -> DropOutcome {
        self.drag_active = false;
        let signal = files
            .into_iter()
            .next()
            .and_then(|candidate| accept(candidate, "drop"));
        DropOutcome {
            disposition: EventDisposition::CONSUMED,
            signal,
        }
    }

    pub fn on_drag_state_change(&mut self, phase: DragPhase) -> EventDisposition {
        self.drag_active = matches!(phase, DragPhase::Enter | DragPhase::Over);
        EventDisposition::CONSUMED
    }

    pub fn on_clear(&mut self) -> SelectionSignal {
        self.picker_value = None;
        if let Some(file_input) = &self.file_input {
            file_input.reset_value();
        }
        SelectionSignal::Cleared
    }
}

fn accept(candidate: CandidateFile, source: &'static str) -> Option<SelectionSignal> {
    let name = candidate.name().to_string();
    let declared_type = candidate.declared_type().to_string();
    match candidate.into_image() {
        Some(image) => Some(SelectionSignal::Accepted(image)),
        None => {
            tracing::debug!(
                source,
                name = %name,
                declared_type = %declared_type,
                "ignoring non-image candidate"
            );
            None
        }
    }
}
