/// Minimum length for the JWT signing secret. A weak secret makes every
/// issued token forgeable, so startup refuses it outright.
const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = std::env::var("JWT_SECRET")?;
        if secret.len() < MIN_SECRET_BYTES {
            anyhow::bail!(
                "JWT_SECRET must be at least {} bytes (got {}); generate one with: openssl rand -base64 48",
                MIN_SECRET_BYTES,
                secret.len()
            );
        }

        let jwt = JwtConfig {
            secret,
            ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url,
            jwt,
            allowed_origins,
        })
    }
}
