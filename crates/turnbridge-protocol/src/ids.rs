use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ThreadId);
string_id!(TurnId);
string_id!(ItemId);
string_id!(MessageId);
string_id!(WorkspaceId);

/// Marker segment separating the engine prefix from the nonce in
/// client-minted thread ids that have not yet been confirmed by a backend.
const PENDING_MARKER: &str = "-pending-";

impl ThreadId {
    /// Mint a client-side thread id for `engine_prefix` before the backend
    /// has assigned a canonical session identity.
    pub fn pending(engine_prefix: &str, nonce: &str) -> Self {
        Self(format!("{engine_prefix}{PENDING_MARKER}{nonce}"))
    }

    pub fn is_pending(&self) -> bool {
        self.0.contains(PENDING_MARKER)
    }

    /// The engine prefix of a pending id, if this id is pending.
    pub fn pending_engine_prefix(&self) -> Option<&str> {
        let marker = self.0.find(PENDING_MARKER)?;
        Some(&self.0[..marker])
    }
}
