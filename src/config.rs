use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub email_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub server: Option<String>,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
    pub starttls: bool,
    pub ssl_tls: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// `None` selects the in-process cache.
    pub redis_url: Option<String>,
    pub user_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub base_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn database_url_from_env() -> anyhow::Result<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Ok(url);
    }
    let user = std::env::var("POSTGRES_USER").context("DATABASE_URL or POSTGRES_USER must be set")?;
    let password = std::env::var("POSTGRES_PASSWORD").context("POSTGRES_PASSWORD must be set")?;
    let host = env_or("POSTGRES_HOST", "localhost");
    let port = env_or("POSTGRES_PORT", "5432");
    let db = std::env::var("POSTGRES_DB").context("POSTGRES_DB must be set")?;
    Ok(format!("postgres://{user}:{password}@{host}:{port}/{db}"))
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url_from_env()?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            algorithm: env_or("JWT_ALGORITHM", "HS256"),
            issuer: env_or("JWT_ISSUER", "contacts-api"),
            audience: env_or("JWT_AUDIENCE", "contacts-api-users"),
            access_ttl_minutes: env_parse("JWT_ACCESS_TTL_MINUTES", 15),
            email_ttl_minutes: env_parse("JWT_EMAIL_TTL_MINUTES", 60),
        };

        let mail = MailConfig {
            server: std::env::var("MAIL_SERVER").ok().filter(|s| !s.is_empty()),
            port: env_parse("MAIL_PORT", 465),
            username: env_or("MAIL_USERNAME", ""),
            password: env_or("MAIL_PASSWORD", ""),
            from: env_or("MAIL_FROM", "noreply@localhost"),
            from_name: env_or("MAIL_FROM_NAME", "API SERVICE"),
            starttls: env_flag("MAIL_STARTTLS", false),
            ssl_tls: env_flag("MAIL_SSL_TLS", true),
        };

        let endpoint = env_or("MINIO_ENDPOINT", "http://localhost:9000");
        let storage = StorageConfig {
            public_url: env_or("MINIO_PUBLIC_URL", &endpoint),
            endpoint,
            bucket: env_or("MINIO_BUCKET", "avatars"),
            access_key: env_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("MINIO_SECRET_KEY", "minioadmin"),
        };

        let cache = CacheConfig {
            redis_url: std::env::var("REDIS_HOST")
                .ok()
                .filter(|h| !h.is_empty())
                .map(|host| format!("redis://{}:{}/0", host, env_or("REDIS_PORT", "6379"))),
            user_ttl_seconds: env_parse("USER_CACHE_TTL_SECONDS", 900),
        };

        let base_url = env_or("APP_BASE_URL", "http://localhost:8080/");

        Ok(Self {
            database_url,
            base_url,
            jwt,
            mail,
            storage,
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_accepts_common_truthy_spellings() {
        std::env::set_var("CONTACTS_TEST_FLAG_A", "True");
        std::env::set_var("CONTACTS_TEST_FLAG_B", "0");
        assert!(env_flag("CONTACTS_TEST_FLAG_A", false));
        assert!(!env_flag("CONTACTS_TEST_FLAG_B", true));
        assert!(env_flag("CONTACTS_TEST_FLAG_UNSET", true));
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("CONTACTS_TEST_NUM", "not-a-number");
        assert_eq!(env_parse("CONTACTS_TEST_NUM", 15i64), 15);
        std::env::set_var("CONTACTS_TEST_NUM2", "42");
        assert_eq!(env_parse("CONTACTS_TEST_NUM2", 15i64), 42);
    }
}
