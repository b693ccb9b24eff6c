use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    auth::{claims::Claims, jwt::JwtKeys, password::PasswordHasher, repo::UserRepo, repo_types::User},
    error::StoreError,
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login and password must not be empty")]
    EmptyCredentials,

    #[error("login already taken")]
    AlreadyExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token")]
    InvalidToken,

    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A user together with a freshly issued bearer token.
#[derive(Debug)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

/// Register/login/token validation. Holds no mutable state; conflicting
/// writes are serialized by the user store's unique index.
pub struct AuthService {
    users: Arc<dyn UserRepo>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepo>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            users,
            hasher,
            keys,
        }
    }

    pub async fn register(&self, login: &str, password: &str) -> Result<AuthSession, AuthError> {
        if login.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }

        let hash = self.hash(password).await?;

        let user = match self.users.create_user(login, &hash).await {
            Ok(u) => u,
            Err(StoreError::Conflict) => {
                warn!(%login, "login already registered");
                return Err(AuthError::AlreadyExists);
            }
            Err(e) => {
                error!(error = %e, %login, "create user failed");
                return Err(AuthError::Store(e));
            }
        };

        let token = self.generate_token(user.id)?;
        info!(user_id = user.id, %login, "user registered");
        Ok(AuthSession { user, token })
    }

    /// Unknown login and wrong password both come back as `InvalidCredentials`.
    pub async fn login(&self, login: &str, password: &str) -> Result<AuthSession, AuthError> {
        if login.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyCredentials);
        }

        let user = match self.users.get_by_login(login).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!(%login, "login unknown user");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                error!(error = %e, %login, "get_by_login failed");
                return Err(AuthError::Store(e));
            }
        };

        if !self.verify(password, &user.password_hash).await? {
            warn!(%login, user_id = user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.generate_token(user.id)?;
        info!(user_id = user.id, %login, "user logged in");
        Ok(AuthSession { user, token })
    }

    /// Signature, expiry, not-before and issuer failures are not told apart.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.keys.verify(token).map_err(|_| AuthError::InvalidToken)
    }

    pub fn generate_token(&self, user_id: i64) -> Result<String, AuthError> {
        self.keys.sign(user_id).map_err(|e| {
            error!(error = %e, user_id, "jwt sign failed");
            AuthError::Signing(e)
        })
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User, AuthError> {
        match self.users.get_by_id(user_id).await {
            Ok(u) => Ok(u),
            Err(StoreError::NotFound) => Err(AuthError::UserNotFound),
            Err(e) => {
                error!(error = %e, user_id, "get_by_id failed");
                Err(AuthError::Store(e))
            }
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash_password(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }
}
