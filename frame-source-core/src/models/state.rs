/// Frame source lifecycle.
///
/// State transitions:
/// ```text
/// created → started ⇄ stopped → released
///              ↓                   ↑
///              └───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Created,
    Started,
    Stopped,
    Released,
}

impl CaptureState {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Whether `frame()` may be called in this state.
    pub fn can_read(&self) -> bool {
        self.is_started()
    }
}
