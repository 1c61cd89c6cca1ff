use walletd_auth::Role;
use walletd_core::AccountId;

/// Principal context for a request (authenticated account + roles).
///
/// Inserted by the auth middleware; every protected route can rely on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    account_id: AccountId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(account_id: AccountId, roles: Vec<Role>) -> Self {
        Self { account_id, roles }
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
