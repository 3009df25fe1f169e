use serde::{Deserialize, Serialize};

/// An authenticated user, as supplied by the embedding application
///
/// Its presence unlocks backends that require authentication. The token is
/// never printed by `Debug` and never serialized.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    user_id: String,
    #[serde(skip_serializing)]
    token: String,
}

impl Credential {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}
