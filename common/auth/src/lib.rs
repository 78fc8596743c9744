pub mod bearer;
pub mod config;
pub mod employee;
pub mod error;
pub mod memory;
pub mod password;
pub mod permissions;
pub mod store;
pub mod token;

pub use bearer::parse_bearer;
pub use config::TokenConfig;
pub use employee::{Employee, EmployeeDraft, EmployeeId, EmployeeProfile, Identity};
pub use error::{AuthError, AuthResult, StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use password::{hash_password, verify_password};
pub use permissions::{PermissionSet, KNOWN_PERMISSIONS};
pub use store::{bounded, EmployeeStore, PermissionStore, TokenStore};
pub use token::{token_digest, Scope, Token, TokenHash, TokenRecord};
