use ledgerly_core::UserId;

/// Authenticated identity of the caller.
///
/// Established by the upstream authentication layer; handlers never see a
/// request without one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
}

impl PrincipalContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}
