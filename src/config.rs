use serde::Deserialize;

use crate::nutrition::search::NutritionixConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub nutrition: NutritionixConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "macrolog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "macrolog-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let nutrition = NutritionixConfig {
            base_url: std::env::var("NUTRITIONIX_BASE_URL")
                .unwrap_or_else(|_| NutritionixConfig::default().base_url),
            app_id: std::env::var("NUTRITIONIX_APP_ID")?,
            app_key: std::env::var("NUTRITIONIX_APP_KEY")?,
            timeout_secs: std::env::var("NUTRITIONIX_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        };
        Ok(Self {
            database_url,
            jwt,
            nutrition,
        })
    }
}
