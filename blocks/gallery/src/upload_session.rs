use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSessionState {
    Open,
    Committed,
    CleanedUp,
}

/// Ownership of uploaded URLs for one editing lifetime
#[derive(Debug, Clone)]
pub struct UploadSession {
    session_id: String,
    owned: BTreeSet<String>,
    state: UploadSessionState,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            owned: BTreeSet::new(),
            state: UploadSessionState::Open,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> UploadSessionState {
        self.state
    }

    /// Returns false if the URL was already owned
    pub fn register(&mut self, url: &str) -> bool {
        self.owned.insert(url.to_string())
    }

    pub fn owns(&self, url: &str) -> bool {
        self.owned.contains(url)
    }

    pub fn owned(&self) -> impl Iterator<Item = &str> {
        self.owned.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    /// Ownership moves to the persisted records
    pub fn commit(&mut self) {
        self.owned.clear();
        self.state = UploadSessionState::Committed;
    }

    /// Owned files have been handed to cleanup
    pub fn release(&mut self) -> Vec<String> {
        self.state = UploadSessionState::CleanedUp;
        std::mem::take(&mut self.owned).into_iter().collect()
    }

    /// Drop ownership after a mid-session cleanup without closing the session
    pub fn forget_all(&mut self) {
        self.owned.clear();
    }
}

impl Default for UploadSession {
    fn default() -> Self {
        Self::new()
    }
}
