//! sqlx-backed implementations of the store traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::{
    Employee, EmployeeDraft, EmployeeId, EmployeeProfile, EmployeeStore, PermissionSet, PermissionStore, Scope,
    StoreError, StoreResult, TokenHash, TokenRecord, TokenStore,
};
use sqlx::{FromRow, PgPool};
use tracing::error;

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(FromRow)]
struct EmployeeRow {
    id: i64,
    name: String,
    surname: String,
    password_hash: String,
    is_admin: bool,
    activated: bool,
    phone_number: String,
    enrolled: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Employee {
            id: row.id,
            name: row.name,
            surname: row.surname,
            password_hash: row.password_hash,
            is_admin: row.is_admin,
            activated: row.activated,
            phone_number: row.phone_number,
            enrolled: row.enrolled,
        }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) => {
            StoreError::NotFound
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            StoreError::Conflict
        }
        _ => {
            error!(error = %err, "database call failed");
            StoreError::Backend(err.to_string())
        }
    }
}

#[derive(Clone)]
pub struct PgEmployeeStore {
    db: PgPool,
}

impl PgEmployeeStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EmployeeStore for PgEmployeeStore {
    async fn create(&self, draft: EmployeeDraft) -> StoreResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"INSERT INTO employee (name, surname, password_hash, is_admin, activated, phone_number, enrolled)
               VALUES ($1, $2, $3, $4, FALSE, $5, $6)
               RETURNING id, name, surname, password_hash, is_admin, activated, phone_number, enrolled"#,
        )
        .bind(&draft.name)
        .bind(&draft.surname)
        .bind(&draft.password_hash)
        .bind(draft.is_admin)
        .bind(&draft.phone_number)
        .bind(draft.enrolled)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn get(&self, id: EmployeeId) -> StoreResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"SELECT id, name, surname, password_hash, is_admin, activated, phone_number, enrolled
               FROM employee WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn list(&self) -> StoreResult<Vec<Employee>> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            r#"SELECT id, name, surname, password_hash, is_admin, activated, phone_number, enrolled
               FROM employee ORDER BY id"#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(Employee::from).collect())
    }

    async fn update_profile(&self, id: EmployeeId, profile: &EmployeeProfile) -> StoreResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"UPDATE employee SET name = $1, surname = $2, phone_number = $3
               WHERE id = $4
               RETURNING id, name, surname, password_hash, is_admin, activated, phone_number, enrolled"#,
        )
        .bind(&profile.name)
        .bind(&profile.surname)
        .bind(&profile.phone_number)
        .bind(id)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn set_password_hash(&self, id: EmployeeId, password_hash: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE employee SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_activated(&self, id: EmployeeId) -> StoreResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"UPDATE employee SET activated = TRUE
               WHERE id = $1
               RETURNING id, name, surname, password_hash, is_admin, activated, phone_number, enrolled"#,
        )
        .bind(id)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn delete(&self, id: EmployeeId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM employee WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    db: PgPool,
}

impl PgTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, record: &TokenRecord) -> StoreResult<()> {
        sqlx::query("INSERT INTO tokens (hash, user_id, expiry, scope) VALUES ($1, $2, $3, $4)")
            .bind(&record.hash[..])
            .bind(record.user_id)
            .bind(record.expiry)
            .bind(record.scope.as_str())
            .execute(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn employee_for_token(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<Employee> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"SELECT employee.id, employee.name, employee.surname, employee.password_hash,
                      employee.is_admin, employee.activated, employee.phone_number, employee.enrolled
               FROM employee
               INNER JOIN tokens ON employee.id = tokens.user_id
               WHERE tokens.hash = $1 AND tokens.scope = $2 AND tokens.expiry > $3"#,
        )
        .bind(&hash[..])
        .bind(scope.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)?;
        Ok(row.into())
    }

    async fn consume(
        &self,
        hash: &TokenHash,
        scope: Scope,
        now: DateTime<Utc>,
    ) -> StoreResult<EmployeeId> {
        sqlx::query_scalar::<_, i64>(
            "DELETE FROM tokens WHERE hash = $1 AND scope = $2 AND expiry > $3 RETURNING user_id",
        )
        .bind(&hash[..])
        .bind(scope.as_str())
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(store_error)
    }

    async fn delete_all_for_user(&self, scope: Scope, user_id: EmployeeId) -> StoreResult<()> {
        sqlx::query("DELETE FROM tokens WHERE scope = $1 AND user_id = $2")
            .bind(scope.as_str())
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgPermissionStore {
    db: PgPool,
}

impl PgPermissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn all_for_user(&self, user_id: EmployeeId) -> StoreResult<PermissionSet> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"SELECT permissions.code
               FROM permissions
               INNER JOIN employee_permissions ON employee_permissions.permission_id = permissions.id
               WHERE employee_permissions.employee_id = $1"#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(store_error)?;
        Ok(codes.into_iter().collect())
    }

    async fn add_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()> {
        let result = sqlx::query(
            r#"INSERT INTO employee_permissions (employee_id, permission_id)
               SELECT $1, permissions.id FROM permissions WHERE permissions.code = $2
               ON CONFLICT DO NOTHING"#,
        )
        .bind(user_id)
        .bind(code)
        .execute(&self.db)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            // Either an unknown code or an existing grant; only the former is an error.
            let known: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM permissions WHERE code = $1)")
                    .bind(code)
                    .fetch_one(&self.db)
                    .await
                    .map_err(store_error)?;
            if !known {
                return Err(StoreError::NotFound);
            }
        }
        Ok(())
    }

    async fn remove_for_user(&self, user_id: EmployeeId, code: &str) -> StoreResult<()> {
        sqlx::query(
            r#"DELETE FROM employee_permissions
               USING permissions
               WHERE employee_permissions.permission_id = permissions.id
                 AND employee_permissions.employee_id = $1
                 AND permissions.code = $2"#,
        )
        .bind(user_id)
        .bind(code)
        .execute(&self.db)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}
