use std::sync::Arc;
use std::time::Duration;

use common_auth::{bounded, AuthResult, EmployeeId, PermissionSet, PermissionStore};

/// Per-employee permission codes. Nothing is cached between calls, so a
/// grant or revocation is visible to the very next request.
#[derive(Clone)]
pub struct PermissionRegistry {
    store: Arc<dyn PermissionStore>,
    timeout: Duration,
}

impl PermissionRegistry {
    pub fn new(store: Arc<dyn PermissionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn get_all_for_user(&self, user_id: EmployeeId) -> AuthResult<PermissionSet> {
        Ok(bounded(self.timeout, self.store.all_for_user(user_id)).await?)
    }

    pub async fn add_for_user(&self, user_id: EmployeeId, code: &str) -> AuthResult<()> {
        Ok(bounded(self.timeout, self.store.add_for_user(user_id, code)).await?)
    }

    pub async fn remove_for_user(&self, user_id: EmployeeId, code: &str) -> AuthResult<()> {
        Ok(bounded(self.timeout, self.store.remove_for_user(user_id, code)).await?)
    }
}
