use parking_lot::RwLock;

/// Source of the user's authentication state.
pub trait AuthProvider: Send + Sync {
    fn is_authenticated(&self) -> bool;

    /// Bearer token, present whenever `is_authenticated` is true
    fn access_token(&self) -> Option<String>;
}

/// In-process session: holds the access token handed over by whatever
/// performed the login.
#[derive(Debug, Default)]
pub struct SessionAuth {
    token: RwLock<Option<String>>,
}

impl SessionAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn login(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn logout(&self) {
        *self.token.write() = None;
    }
}

impl AuthProvider for SessionAuth {
    fn is_authenticated(&self) -> bool {
        self.token.read().is_some()
    }

    fn access_token(&self) -> Option<String> {
        self.token.read().clone()
    }
}
