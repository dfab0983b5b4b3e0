//! User registration, login and access tokens

pub mod handlers;
pub mod middleware;
pub mod service;

pub use middleware::jwt_auth_middleware;
pub use service::{
    AuthError, Claims, CreateUserRequest, LoginUserRequest, LoginUserResponse, UserAuthService,
    UserResponse, check_password, hash_password,
};
