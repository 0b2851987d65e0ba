use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::UploadError;

/// Server-side processing step. Variant order is the catalog order, which
/// `Ord` follows so that sets iterate in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessingTask {
    Resize,
    Thumbnail,
    Watermark,
}

impl ProcessingTask {
    pub const CATALOG: [ProcessingTask; 3] = [Self::Resize, Self::Thumbnail, Self::Watermark];

    pub fn id(self) -> &'static str {
        match self {
            Self::Resize => "RESIZE",
            Self::Thumbnail => "THUMBNAIL",
            Self::Watermark => "WATERMARK",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Resize => "Resize",
            Self::Thumbnail => "Thumbnail",
            Self::Watermark => "Watermark",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Resize => "Resize to 1920x1080",
            Self::Thumbnail => "Generate 200x200 thumbnail",
            Self::Watermark => "Apply watermark overlay",
        }
    }
}

impl fmt::Display for ProcessingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProcessingTask {
    type Err = UploadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        Self::CATALOG
            .into_iter()
            .find(|task| task.id().eq_ignore_ascii_case(value))
            .ok_or_else(|| UploadError::validation(format!("unknown processing task '{value}'")))
    }
}

/// The tasks selected for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSelection {
    tasks: BTreeSet<ProcessingTask>,
}

impl TaskSelection {
    pub fn empty() -> Self {
        Self {
            tasks: BTreeSet::new(),
        }
    }

    pub fn contains(&self, task: ProcessingTask) -> bool {
        self.tasks.contains(&task)
    }

    /// Flips membership and returns whether the task is now selected.
    pub fn toggle(&mut self, task: ProcessingTask) -> bool {
        if self.tasks.remove(&task) {
            false
        } else {
            self.tasks.insert(task);
            true
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ProcessingTask> + '_ {
        self.tasks.iter().copied()
    }

    /// Comma-joined ids in catalog order, independent of toggle history.
    pub fn to_query_value(&self) -> String {
        self.iter()
            .map(ProcessingTask::id)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for TaskSelection {
    fn default() -> Self {
        [ProcessingTask::Resize, ProcessingTask::Thumbnail]
            .into_iter()
            .collect()
    }
}

impl FromIterator<ProcessingTask> for TaskSelection {
    fn from_iter<I: IntoIterator<Item = ProcessingTask>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl FromStr for TaskSelection {
    type Err = UploadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let selection = value
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(ProcessingTask::from_str)
            .collect::<Result<TaskSelection, _>>()?;
        if selection.is_empty() {
            return Err(UploadError::validation(
                "task list must name at least one processing task",
            ));
        }
        Ok(selection)
    }
}
