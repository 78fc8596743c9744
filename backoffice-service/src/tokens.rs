use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common_auth::{
    bounded, token_digest, AuthError, AuthResult, Employee, EmployeeId, Scope, StoreError, Token,
    TokenStore,
};
use tracing::debug;

/// Issues, verifies and invalidates scoped bearer tokens. Only digests reach
/// the store; plaintext leaves this type exactly once, inside the issued
/// [`Token`].
#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn TokenStore>,
    timeout: Duration,
}

impl TokenService {
    pub fn new(store: Arc<dyn TokenStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn issue(
        &self,
        user_id: EmployeeId,
        ttl: chrono::Duration,
        scope: Scope,
    ) -> AuthResult<Token> {
        self.issue_at(user_id, ttl, scope, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        user_id: EmployeeId,
        ttl: chrono::Duration,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> AuthResult<Token> {
        let token = Token::generate(user_id, ttl, scope, now)?;
        let record = token.record();
        bounded(self.timeout, self.store.insert(&record)).await?;
        debug!(user_id, scope = %scope, expiry = %token.expiry, "issued token");
        Ok(token)
    }

    /// Read-only: never mutates the store, so it is safe on every request.
    pub async fn verify(&self, scope: Scope, plaintext: &str) -> AuthResult<Employee> {
        self.verify_at(scope, plaintext, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        scope: Scope,
        plaintext: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<Employee> {
        let hash = token_digest(plaintext);
        match bounded(self.timeout, self.store.employee_for_token(&hash, scope, now)).await {
            Ok(employee) => Ok(employee),
            Err(StoreError::NotFound) => Err(AuthError::TokenNotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Verifies and deletes a single token in one store call and returns its
    /// owner. A second redemption of the same plaintext finds nothing.
    pub async fn redeem(&self, scope: Scope, plaintext: &str) -> AuthResult<EmployeeId> {
        let hash = token_digest(plaintext);
        match bounded(self.timeout, self.store.consume(&hash, scope, Utc::now())).await {
            Ok(user_id) => Ok(user_id),
            Err(StoreError::NotFound) => Err(AuthError::TokenNotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Drops every token of `scope` owned by `user_id`.
    pub async fn invalidate(&self, scope: Scope, user_id: EmployeeId) -> AuthResult<()> {
        bounded(self.timeout, self.store.delete_all_for_user(scope, user_id)).await?;
        debug!(user_id, scope = %scope, "invalidated tokens");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common_auth::{
        EmployeeDraft, EmployeeStore, InMemoryStore, StoreResult, TokenHash, TokenRecord,
    };

    async fn service_with_employee() -> (TokenService, InMemoryStore, Employee) {
        let store = InMemoryStore::new();
        let employee = store
            .create(EmployeeDraft {
                name: "Grace".into(),
                surname: "Hopper".into(),
                password_hash: "unused".into(),
                is_admin: false,
                phone_number: "555-0100".into(),
                enrolled: Utc::now(),
            })
            .await
            .unwrap();
        let service = TokenService::new(Arc::new(store.clone()), Duration::from_secs(3));
        (service, store, employee)
    }

    #[tokio::test]
    async fn persisted_record_is_the_digest_of_the_returned_plaintext() {
        let (service, store, employee) = service_with_employee().await;
        let token = service
            .issue(employee.id, chrono::Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();

        let records = store.token_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hash, token_digest(&token.plaintext));
        assert_eq!(records[0].user_id, employee.id);
        assert_eq!(records[0].scope, Scope::Authentication);
    }

    #[tokio::test]
    async fn scopes_are_disjoint() {
        let (service, _, employee) = service_with_employee().await;
        let activation = service
            .issue(employee.id, chrono::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();
        let session = service
            .issue(employee.id, chrono::Duration::hours(1), Scope::Authentication)
            .await
            .unwrap();

        assert!(matches!(
            service.verify(Scope::Authentication, &activation.plaintext).await,
            Err(AuthError::TokenNotFound)
        ));
        assert!(matches!(
            service.verify(Scope::Activation, &session.plaintext).await,
            Err(AuthError::TokenNotFound)
        ));
        assert_eq!(
            service.verify(Scope::Activation, &activation.plaintext).await.unwrap().id,
            employee.id
        );
    }

    #[tokio::test]
    async fn expiry_is_strict() {
        let (service, _, employee) = service_with_employee().await;
        let issued_at = Utc::now();
        let token = service
            .issue_at(employee.id, chrono::Duration::hours(24), Scope::Authentication, issued_at)
            .await
            .unwrap();

        let just_before = token.expiry - chrono::Duration::milliseconds(1);
        assert!(service
            .verify_at(Scope::Authentication, &token.plaintext, just_before)
            .await
            .is_ok());
        assert!(matches!(
            service.verify_at(Scope::Authentication, &token.plaintext, token.expiry).await,
            Err(AuthError::TokenNotFound)
        ));
        assert!(matches!(
            service
                .verify_at(
                    Scope::Authentication,
                    &token.plaintext,
                    token.expiry + chrono::Duration::seconds(1)
                )
                .await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn invalidate_removes_all_and_only_matching_tokens() {
        let (service, store, first) = service_with_employee().await;
        let second = store
            .create(EmployeeDraft {
                name: "Alan".into(),
                surname: "Turing".into(),
                password_hash: "unused".into(),
                is_admin: false,
                phone_number: "555-0101".into(),
                enrolled: Utc::now(),
            })
            .await
            .unwrap();
        let ttl = chrono::Duration::hours(1);

        let first_a = service.issue(first.id, ttl, Scope::Activation).await.unwrap();
        let first_b = service.issue(first.id, ttl, Scope::Activation).await.unwrap();
        let first_session = service.issue(first.id, ttl, Scope::Authentication).await.unwrap();
        let second_a = service.issue(second.id, ttl, Scope::Activation).await.unwrap();

        service.invalidate(Scope::Activation, first.id).await.unwrap();

        for gone in [&first_a, &first_b] {
            assert!(service.verify(Scope::Activation, &gone.plaintext).await.is_err());
        }
        assert!(service
            .verify(Scope::Authentication, &first_session.plaintext)
            .await
            .is_ok());
        assert!(service.verify(Scope::Activation, &second_a.plaintext).await.is_ok());
    }

    #[tokio::test]
    async fn redeem_succeeds_once_and_only_for_its_scope() {
        let (service, _, employee) = service_with_employee().await;
        let token = service
            .issue(employee.id, chrono::Duration::hours(1), Scope::Activation)
            .await
            .unwrap();

        assert!(matches!(
            service.redeem(Scope::Authentication, &token.plaintext).await,
            Err(AuthError::TokenNotFound)
        ));
        assert_eq!(service.redeem(Scope::Activation, &token.plaintext).await.unwrap(), employee.id);
        assert!(matches!(
            service.redeem(Scope::Activation, &token.plaintext).await,
            Err(AuthError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn unknown_plaintext_is_not_found() {
        let (service, _, _) = service_with_employee().await;
        assert!(matches!(
            service.verify(Scope::Authentication, "NOTATOKEN").await,
            Err(AuthError::TokenNotFound)
        ));
    }

    struct StalledStore;

    #[async_trait]
    impl TokenStore for StalledStore {
        async fn insert(&self, _record: &TokenRecord) -> StoreResult<()> {
            std::future::pending().await
        }

        async fn employee_for_token(
            &self,
            _hash: &TokenHash,
            _scope: Scope,
            _now: DateTime<Utc>,
        ) -> StoreResult<Employee> {
            std::future::pending().await
        }

        async fn consume(
            &self,
            _hash: &TokenHash,
            _scope: Scope,
            _now: DateTime<Utc>,
        ) -> StoreResult<EmployeeId> {
            std::future::pending().await
        }

        async fn delete_all_for_user(&self, _scope: Scope, _user_id: EmployeeId) -> StoreResult<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_times_out_instead_of_hanging() {
        let service = TokenService::new(Arc::new(StalledStore), Duration::from_secs(3));
        let err = service
            .verify(Scope::Authentication, "ANYTHING")
            .await
            .expect_err("should time out");
        assert!(matches!(
            err,
            AuthError::Store(StoreError::Timeout(limit)) if limit == Duration::from_secs(3)
        ));
    }
}
