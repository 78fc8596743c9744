//! Narrow interfaces onto the relational store.
//!
//! The service never talks to tables directly; it goes through these traits so
//! the Postgres implementation and the in-memory one are interchangeable.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::employee::{Employee, EmployeeDraft, EmployeeId, EmployeeProfile};
use crate::error::{StoreError, StoreResult};
use crate::permissions::PermissionSet;
use crate::token::{Scope, TokenHash, TokenRecord};

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn create(&self, draft: EmployeeDraft) -> StoreResult<Employee>;
    /// `StoreError::NotFound` when no such employee exists.
    async fn get(&self, id: EmployeeId) -> StoreResult<Employee>;
    /// Every employee, ordered by id.
    async fn list(&self) -> StoreResult<Vec<Employee>>;
    /// Overwrites name, surname and phone number only.
    async fn update_profile(&self, id: EmployeeId, profile: &EmployeeProfile) -> StoreResult<Employee>;
    async fn set_password_hash(&self, id: EmployeeId, password_hash: &str) -> StoreResult<()>;
    /// Sets the activation flag without touching any other column.
    async fn mark_activated(&self, id: EmployeeId) -> StoreResult<Employee>;
    async fn delete(&self, id: EmployeeId) -> StoreResult<()>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: &TokenRecord) -> StoreResult<()>;
    /// Owner of the token with digest `hash`, provided its scope matches and it
    /// expires strictly after `now`. Otherwise `StoreError::NotFound`.
    async fn employee_for_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<Employee>;
    /// Deletes the live token with digest `hash` and returns its owner. Of two
    /// concurrent calls for the same token at most one succeeds; the other
    /// gets `StoreError::NotFound`.
    async fn consume(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<EmployeeId>;
    async fn delete_all_for_user(&self, scope: Scope, user_id: EmployeeId) -> StoreResult<()>;
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn all_for_user(&self, user_id: EmployeeId) -> StoreResult<PermissionSet>;
    /// `StoreError::NotFound` when `code` is not in the catalogue or the
    /// employee does not exist. Granting an already granted code is a no-op.
    async fn add_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()>;
    async fn remove_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()>;
}

/// Runs one store call under `limit`. An elapsed timer becomes
/// `StoreError::Timeout`; the in-flight call is dropped with it.
pub async fn bounded<T, F>(limit: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}
