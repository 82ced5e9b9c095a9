use storefront_api::{
    config::AppConfig,
    db::{create_pool, orm_from_pool, run_migrations},
    models::{ROLE_ADMIN, ROLE_CUSTOMER},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&orm_from_pool(&pool)).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin", "admin123", ROLE_ADMIN).await?;
    let user_id =
        ensure_user(&pool, "user@example.com", "shopper", "user123", ROLE_CUSTOMER).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    user_name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, user_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(user_name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
