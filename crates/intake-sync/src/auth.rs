//! Sign-in state and the restore gate.
//!
//! Remote state is pulled exactly once per sign-in transition. Signing in
//! again as the same user is a no-op; signing in as someone else counts as
//! a sign-out followed by a fresh sign-in.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreState {
    PendingRestore,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    SignedIn {
        user: String,
        restore: RestoreState,
    },
}

impl AuthState {
    /// Apply a sign-in. Returns `true` when a restore must now run.
    pub fn on_sign_in(&mut self, user: &str) -> bool {
        if self.user() == Some(user) {
            return false;
        }
        *self = Self::SignedIn {
            user: user.to_string(),
            restore: RestoreState::PendingRestore,
        };
        true
    }

    pub fn on_sign_out(&mut self) {
        *self = Self::Anonymous;
    }

    pub fn mark_restored(&mut self) {
        if let Self::SignedIn { restore, .. } = self {
            *restore = RestoreState::Restored;
        }
    }

    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::SignedIn { user, .. } => Some(user),
        }
    }

    /// The user whose local changes should be pushed, if any.
    pub fn push_target(&self) -> Option<&str> {
        match self {
            Self::SignedIn {
                user,
                restore: RestoreState::Restored,
            } => Some(user),
            _ => None,
        }
    }
}
