use crate::domain::utils::id::TaskId;

/// One file flowing along a dependency edge. Sizes are bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub file_name: String,
    /// Producer of the file. Equals `destination` for external inputs that no sibling produces.
    pub source: TaskId,
    pub destination: TaskId,
    pub size: u64,
}

impl Data {
    pub fn new(file_name: impl Into<String>, source: impl Into<String>, destination: impl Into<String>, size: u64) -> Self {
        Data { file_name: file_name.into(), source: TaskId::new(source), destination: TaskId::new(destination), size }
    }

    pub fn is_external(&self) -> bool {
        self.source == self.destination
    }
}
