use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::employee::{Employee, EmployeeDraft, EmployeeId, EmployeeProfile};
use crate::error::{StoreError, StoreResult};
use crate::permissions::{PermissionSet, KNOWN_PERMISSIONS};
use crate::store::{EmployeeStore, PermissionStore, TokenStore};
use crate::token::{Scope, TokenHash, TokenRecord};

/// Thread-safe store backing all three store traits from process memory.
/// Used by tests and by local runs without Postgres.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<State>>,
}

struct State {
    next_id: EmployeeId,
    employees: BTreeMap<EmployeeId, Employee>,
    tokens: HashMap<TokenHash, TokenRecord>,
    catalogue: BTreeSet<String>,
    grants: HashMap<EmployeeId, PermissionSet>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_catalogue(KNOWN_PERMISSIONS.iter().copied())
    }

    pub fn with_catalogue<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(RwLock::new(State {
                next_id: 1,
                employees: BTreeMap::new(),
                tokens: HashMap::new(),
                catalogue: codes.into_iter().map(Into::into).collect(),
                grants: HashMap::new(),
            })),
        }
    }

    /// Snapshot of every persisted token row.
    pub fn token_records(&self) -> Vec<TokenRecord> {
        self.inner.read().tokens.values().cloned().collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmployeeStore for InMemoryStore {
    async fn create(&self, draft: EmployeeDraft) -> StoreResult<Employee> {
        let mut state = self.inner.write();
        let id = state.next_id;
        state.next_id += 1;

        let employee = Employee {
            id,
            name: draft.name,
            surname: draft.surname,
            password_hash: draft.password_hash,
            is_admin: draft.is_admin,
            activated: false,
            phone_number: draft.phone_number,
            enrolled: draft.enrolled,
        };
        state.employees.insert(id, employee.clone());
        Ok(employee)
    }

    async fn get(&self, id: EmployeeId) -> StoreResult<Employee> {
        self.inner
            .read()
            .employees
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> StoreResult<Vec<Employee>> {
        Ok(self.inner.read().employees.values().cloned().collect())
    }

    async fn update_profile(&self, id: EmployeeId, profile: &EmployeeProfile) -> StoreResult<Employee> {
        let mut state = self.inner.write();
        let stored = state.employees.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.name = profile.name.clone();
        stored.surname = profile.surname.clone();
        stored.phone_number = profile.phone_number.clone();
        Ok(stored.clone())
    }

    async fn set_password_hash(&self, id: EmployeeId, password_hash: &str) -> StoreResult<()> {
        let mut state = self.inner.write();
        let stored = state.employees.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.password_hash = password_hash.to_owned();
        Ok(())
    }

    async fn mark_activated(&self, id: EmployeeId) -> StoreResult<Employee> {
        let mut state = self.inner.write();
        let stored = state.employees.get_mut(&id).ok_or(StoreError::NotFound)?;
        stored.activated = true;
        Ok(stored.clone())
    }

    async fn delete(&self, id: EmployeeId) -> StoreResult<()> {
        let mut state = self.inner.write();
        state.employees.remove(&id).ok_or(StoreError::NotFound)?;
        state.tokens.retain(|_, record| record.user_id != id);
        state.grants.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn insert(&self, record: &TokenRecord) -> StoreResult<()> {
        let mut state = self.inner.write();
        if !state.employees.contains_key(&record.user_id) {
            return Err(StoreError::NotFound);
        }
        if state.tokens.contains_key(&record.hash) {
            return Err(StoreError::Conflict);
        }
        state.tokens.insert(record.hash, record.clone());
        Ok(())
    }

    async fn employee_for_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<Employee> {
        let state = self.inner.read();
        let record = state
            .tokens
            .get(hash)
            .filter(|record| record.is_live(scope, now))
            .ok_or(StoreError::NotFound)?;
        state
            .employees
            .get(&record.user_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn consume(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<EmployeeId> {
        let mut state = self.inner.write();
        match state.tokens.get(hash) {
            Some(record) if record.is_live(scope, now) => {}
            _ => return Err(StoreError::NotFound),
        }
        state
            .tokens
            .remove(hash)
            .map(|record| record.user_id)
            .ok_or(StoreError::NotFound)
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: EmployeeId) -> StoreResult<()> {
        self.inner
            .write()
            .tokens
            .retain(|_, record| !(record.scope == scope && record.user_id == user_id));
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for InMemoryStore {
    async fn all_for_user(&self, user_id: EmployeeId) -> StoreResult<PermissionSet> {
        Ok(self
            .inner
            .read()
            .grants
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()> {
        let mut state = self.inner.write();
        if !state.catalogue.contains(code) || !state.employees.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        state.grants.entry(user_id).or_default().insert(code);
        Ok(())
    }

    async fn remove_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()> {
        let mut state = self.inner.write();
        if let Some(set) = state.grants.get_mut(&user_id) {
            *set = set.iter().filter(|granted| *granted != code).collect();
        }
        Ok(())
    }
}
