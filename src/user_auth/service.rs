use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::TokenConfig;
use crate::ledger::{CreateUserParams, Store, StoreError, User};

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: String, // Subject (username)
    pub exp: usize,  // Expiration time (as UTC timestamp)
    pub iat: usize,  // Issued at
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("username or email already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("incorrect password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("failed to sign token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(StoreError),
}

/// User Registration Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "alice")]
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(length(min = 6))]
    pub password: String,
    #[schema(example = "Alice Liddell")]
    #[validate(length(min = 1))]
    pub full_name: String,
    #[schema(example = "alice@example.com")]
    #[validate(email)]
    pub email: String,
}

impl CreateUserRequest {
    fn check(&self) -> Result<(), AuthError> {
        self.validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;
        if !self.username.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AuthError::InvalidInput(
                "username must be alphanumeric".to_string(),
            ));
        }
        Ok(())
    }
}

/// User Login Request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserRequest {
    #[schema(example = "alice")]
    #[validate(length(min = 1))]
    pub username: String,
    #[schema(example = "secret123")]
    #[validate(length(min = 6))]
    pub password: String,
}

/// Public view of a user; never carries the password hash
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginUserResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Salted argon2 hash in PHC string format
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn check_password(password: &str, hashed_password: &str) -> Result<(), AuthError> {
    let parsed_hash =
        PasswordHash::new(hashed_password).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

pub struct UserAuthService {
    store: Arc<dyn Store>,
    symmetric_key: String,
    access_token_duration: Duration,
}

impl UserAuthService {
    pub fn new(store: Arc<dyn Store>, token: &TokenConfig) -> Self {
        Self {
            store,
            symmetric_key: token.symmetric_key.clone(),
            access_token_duration: Duration::seconds(token.access_token_duration_secs),
        }
    }

    /// Register a new user
    pub async fn register(&self, req: CreateUserRequest) -> Result<UserResponse, AuthError> {
        req.check()?;
        let hashed_password = hash_password(&req.password)?;

        let user = self
            .store
            .queries()
            .create_user(CreateUserParams {
                username: req.username,
                hashed_password,
                full_name: req.full_name,
                email: req.email,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => AuthError::UserExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(username = %user.username, "User registered");
        Ok(user.into())
    }

    /// Login user and issue JWT
    pub async fn login(&self, req: LoginUserRequest) -> Result<LoginUserResponse, AuthError> {
        req.validate()
            .map_err(|e| AuthError::InvalidInput(e.to_string()))?;

        let user = self
            .store
            .queries()
            .get_user(&req.username)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UserNotFound,
                other => AuthError::Store(other),
            })?;

        check_password(&req.password, &user.hashed_password)?;

        let (access_token, access_token_expires_at) = self.create_token(&user.username)?;

        Ok(LoginUserResponse {
            access_token,
            access_token_expires_at,
            user: user.into(),
        })
    }

    /// Sign an access token for `username`
    pub fn create_token(&self, username: &str) -> Result<(String, DateTime<Utc>), AuthError> {
        let now = Utc::now();
        let expires_at = now + self.access_token_duration;

        let claims = Claims {
            sub: username.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.symmetric_key.as_bytes()),
        )?;

        Ok((token, expires_at))
    }

    /// Verify JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let decoding_key = DecodingKey::from_secret(self.symmetric_key.as_bytes());
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}
