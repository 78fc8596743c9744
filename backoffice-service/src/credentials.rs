use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common_auth::{
    bounded, hash_password, verify_password, AuthError, AuthResult, Employee, EmployeeDraft,
    EmployeeId, EmployeeProfile, EmployeeStore,
};
use serde::Deserialize;

/// Registration input. `password` is plaintext and lives only until it has
/// been hashed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub surname: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub phone_number: String,
}

/// Owns employee records and everything touching their passwords.
#[derive(Clone)]
pub struct CredentialStore {
    employees: Arc<dyn EmployeeStore>,
    timeout: Duration,
}

impl CredentialStore {
    pub fn new(employees: Arc<dyn EmployeeStore>, timeout: Duration) -> Self {
        Self { employees, timeout }
    }

    /// Hashes the password and creates an unactivated employee.
    pub async fn register(&self, input: NewEmployee) -> AuthResult<Employee> {
        let NewEmployee {
            name,
            surname,
            password,
            is_admin,
            phone_number,
        } = input;

        let password_hash = hash_off_thread(password).await?;
        let draft = EmployeeDraft {
            name,
            surname,
            password_hash,
            is_admin,
            phone_number,
            enrolled: Utc::now(),
        };
        Ok(bounded(self.timeout, self.employees.create(draft)).await?)
    }

    pub async fn get(&self, id: EmployeeId) -> AuthResult<Employee> {
        Ok(bounded(self.timeout, self.employees.get(id)).await?)
    }

    pub async fn list(&self) -> AuthResult<Vec<Employee>> {
        Ok(bounded(self.timeout, self.employees.list()).await?)
    }

    /// Rewrites the editable profile fields. The password hash and the
    /// activation flag are untouched.
    pub async fn update_profile(&self, id: EmployeeId, profile: &EmployeeProfile) -> AuthResult<Employee> {
        Ok(bounded(self.timeout, self.employees.update_profile(id, profile)).await?)
    }

    pub async fn mark_activated(&self, id: EmployeeId) -> AuthResult<Employee> {
        Ok(bounded(self.timeout, self.employees.mark_activated(id)).await?)
    }

    pub async fn delete(&self, id: EmployeeId) -> AuthResult<()> {
        Ok(bounded(self.timeout, self.employees.delete(id)).await?)
    }

    /// Compares `supplied` against the stored salted hash.
    pub async fn verify_password(&self, employee: &Employee, supplied: &str) -> AuthResult<bool> {
        let stored = employee.password_hash.clone();
        let supplied = supplied.to_owned();
        tokio::task::spawn_blocking(move || verify_password(&stored, &supplied))
            .await
            .map_err(|err| AuthError::Hash(err.to_string()))?
    }

    /// Replaces the stored hash with one for `new_password`.
    pub async fn set_password(&self, id: EmployeeId, new_password: String) -> AuthResult<()> {
        let password_hash = hash_off_thread(new_password).await?;
        Ok(bounded(self.timeout, self.employees.set_password_hash(id, &password_hash)).await?)
    }
}

/// argon2 is deliberately slow; keep it off the async workers.
async fn hash_off_thread(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| AuthError::Hash(err.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_auth::InMemoryStore;

    fn credentials() -> CredentialStore {
        CredentialStore::new(Arc::new(InMemoryStore::new()), Duration::from_secs(3))
    }

    fn new_employee(password: &str) -> NewEmployee {
        NewEmployee {
            name: "Margaret".into(),
            surname: "Hamilton".into(),
            password: password.into(),
            is_admin: false,
            phone_number: "555-0199".into(),
        }
    }

    #[tokio::test]
    async fn register_stores_only_a_hash() {
        let store = credentials();
        let employee = store.register(new_employee("apollo11")).await.unwrap();
        assert!(!employee.activated);
        assert_ne!(employee.password_hash, "apollo11");
        assert!(employee.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn verify_password_against_stored_hash() {
        let store = credentials();
        let employee = store.register(new_employee("apollo11")).await.unwrap();
        assert!(store.verify_password(&employee, "apollo11").await.unwrap());
        assert!(!store.verify_password(&employee, "apollo12").await.unwrap());
    }

    #[tokio::test]
    async fn empty_password_is_refused() {
        let store = credentials();
        assert!(matches!(
            store.register(new_employee("")).await,
            Err(AuthError::EmptyPassword)
        ));
    }

    #[tokio::test]
    async fn set_password_persists_new_hash() {
        let store = credentials();
        let employee = store.register(new_employee("apollo11")).await.unwrap();
        store.set_password(employee.id, "artemis2".into()).await.unwrap();

        let reloaded = store.get(employee.id).await.unwrap();
        assert!(store.verify_password(&reloaded, "artemis2").await.unwrap());
        assert!(!store.verify_password(&reloaded, "apollo11").await.unwrap());
    }

    #[tokio::test]
    async fn profile_update_keeps_hash_and_activation() {
        let store = credentials();
        let employee = store.register(new_employee("apollo11")).await.unwrap();
        store.mark_activated(employee.id).await.unwrap();

        let updated = store
            .update_profile(
                employee.id,
                &EmployeeProfile {
                    name: "Maggie".into(),
                    surname: "Hamilton".into(),
                    phone_number: "555-0200".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Maggie");
        assert_eq!(updated.phone_number, "555-0200");
        assert!(updated.activated);
        assert!(store.verify_password(&updated, "apollo11").await.unwrap());
    }
}
