use std::{env, str::FromStr};

use redis::aio::MultiplexedConnection;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::{CacheError, Error, HtmlError, QueryError};

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub session_ttl_hours: i64,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        if let Err(e) = dotenvy::dotenv() {
            log::trace!("No .env file loaded ({e})");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: required("JWT_SECRET")?,
            session_ttl_hours: parsed("SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?,
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
        })
    }

    pub async fn connect(&self) -> Result<Pool<Postgres>, Error> {
        log::trace!("Creating pool ({} connections)", self.max_connections);

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(QueryError::from)?;

        Ok(pool)
    }

    /// `None` when no redis url is configured; catalogue reads then go straight to the database.
    pub async fn connect_cache(&self) -> Result<Option<MultiplexedConnection>, Error> {
        let Some(url) = &self.redis_url else {
            return Ok(None);
        };

        log::trace!("Connecting to cache");
        let client = redis::Client::open(url.as_str()).map_err(CacheError::from)?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(CacheError::from)?;

        Ok(Some(connection))
    }
}

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| QueryError::from(sqlx::Error::from(e)))?;

    Ok(())
}

fn required(key: &str) -> Result<String, Error> {
    env::var(key)
        .map_err(|_| HtmlError::InternalServerError.new(&format!("{key} must be set")))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, Error> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| {
            HtmlError::InternalServerError.new(&format!("{key} has an invalid value"))
        }),
        Err(_) => Ok(default),
    }
}
