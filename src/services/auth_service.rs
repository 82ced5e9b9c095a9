use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest};
use crate::{
    error::{
        AppError, AppResult, EMAIL_ALREADY_IN_USE, INVALID_CREDENTIAL, INVALID_EMAIL,
        MISSING_FIELDS, WEAK_PASSWORD,
    },
    middleware::auth::AuthUser,
    models::{ROLE_CUSTOMER, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
const TOKEN_TTL_HOURS: i64 = 24;

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    user_name: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            user_name: row.user_name,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

/// Trimmed registration fields, or the account error code to report.
fn validate_registration(payload: RegisterRequest) -> Result<RegisterRequest, AppError> {
    let email = payload.email.trim().to_lowercase();
    let user_name = payload.user_name.trim().to_string();
    let password = payload.password;

    if email.is_empty() || user_name.is_empty() || password.is_empty() {
        return Err(AppError::Auth {
            code: MISSING_FIELDS,
        });
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => return Err(AppError::Auth { code: INVALID_EMAIL }),
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Auth {
            code: WEAK_PASSWORD,
        });
    }

    Ok(RegisterRequest {
        email,
        user_name,
        password,
    })
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn issue_token(user: &User, secret: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(TOKEN_TTL_HOURS))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        name: user.user_name.clone(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        user_name,
        password,
    } = validate_registration(payload)?;

    let exist: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_optional(&state.pool)
        .await?;

    if exist.is_some() {
        return Err(AppError::Auth {
            code: EMAIL_ALREADY_IN_USE,
        });
    }

    let password_hash = hash_password(&password)?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, user_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, user_name, role, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_str())
    .bind(user_name.as_str())
    .bind(password_hash)
    .bind(ROLE_CUSTOMER)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Auth {
            code: EMAIL_ALREADY_IN_USE,
        },
        other => AppError::DbError(other),
    })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok(ApiResponse::success("User created", user, None))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let email = email.trim().to_lowercase();

    let row: Option<UserRow> = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, user_name, password_hash, role, created_at FROM users WHERE email = $1",
    )
    .bind(email.as_str())
    .fetch_optional(&state.pool)
    .await?;

    let row = match row {
        Some(u) => u,
        None => {
            return Err(AppError::Auth {
                code: INVALID_CREDENTIAL,
            });
        }
    };

    let parsed_hash = PasswordHash::new(&row.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Auth {
            code: INVALID_CREDENTIAL,
        });
    }

    let user = User::from(row);
    let token = issue_token(&user, &state.jwt_secret)?;

    tracing::info!(user_id = %user.id, "user logged in");

    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        user,
    };
    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn current_user(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let found: Option<User> = sqlx::query_as(
        "SELECT id, email, user_name, role, created_at FROM users WHERE id = $1",
    )
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    match found {
        Some(u) => Ok(ApiResponse::success("OK", u, None)),
        None => Err(AppError::Unauthorized("Account no longer exists".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::decode_token;

    fn register(email: &str, user_name: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            user_name: user_name.into(),
            password: password.into(),
        }
    }

    fn code_of(result: Result<RegisterRequest, AppError>) -> Option<&'static str> {
        match result {
            Err(AppError::Auth { code }) => Some(code),
            _ => None,
        }
    }

    #[test]
    fn registration_requires_every_field() {
        let result = validate_registration(register("a@b.io", " ", "secret1"));
        assert_eq!(code_of(result), Some(MISSING_FIELDS));
    }

    #[test]
    fn registration_rejects_malformed_email() {
        let result = validate_registration(register("not-an-email", "jane", "secret1"));
        assert_eq!(code_of(result), Some(INVALID_EMAIL));
    }

    #[test]
    fn registration_rejects_short_password() {
        let result = validate_registration(register("jane@shop.io", "jane", "123"));
        assert_eq!(code_of(result), Some(WEAK_PASSWORD));
    }

    #[test]
    fn registration_normalizes_email_and_name() {
        let ok = validate_registration(register("  Jane@Shop.IO ", " jane ", "secret1")).unwrap();
        assert_eq!(ok.email, "jane@shop.io");
        assert_eq!(ok.user_name, "jane");
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("secret1").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"secret1", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong", &parsed)
            .is_err());
    }

    #[test]
    fn issued_token_decodes_to_same_user() {
        let user = User {
            id: Uuid::new_v4(),
            email: "jane@shop.io".into(),
            user_name: "jane".into(),
            role: ROLE_CUSTOMER.into(),
            created_at: Utc::now(),
        };
        let token = issue_token(&user, "test-secret").unwrap();
        let auth = decode_token(&token, "test-secret").unwrap();
        assert_eq!(auth.user_id, user.id);
        assert_eq!(auth.user_name, "jane");
        assert_eq!(auth.role, ROLE_CUSTOMER);

        assert!(decode_token(&token, "other-secret").is_err());
    }
}
