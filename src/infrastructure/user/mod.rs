//! User infrastructure module
//!
//! Password hashing with Argon2, the storage-backed repository and the user service.

mod password;
mod service;
mod storage_repository;

pub use password::{Argon2Hasher, PasswordHasher};
pub use service::{
    CreateUserRequest, UpdatePasswordRequest, UpdateUserRequest, UpdateUserRolesRequest,
    UserService,
};
pub use storage_repository::StorageUserRepository;
