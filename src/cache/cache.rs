use std::{fmt::Debug, future::Future};

use redis::{aio::MultiplexedConnection, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Error, HtmlError};

const TAG_CACHE_BIND: &str = "tag-cache-key";
const INGREDIENT_CACHE_BIND: &str = "ingredient-cache-key";

// Keys

#[derive(Serialize, Clone, Debug)]
pub struct CacheKey<T: ToString + Serialize> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString + Serialize> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString + Serialize> std::fmt::Display for CacheKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self._type {
            CacheKeyType::Tag => write!(f, "tag-{}", self._value.to_string()),
            CacheKeyType::Ingredient => write!(f, "ingredient-{}", self._value.to_string()),
            CacheKeyType::Custom(_) => write!(f, "{}", self._value.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheKeyType {
    Tag,
    Ingredient,
    Custom(String),
}

impl CacheKeyType {
    pub fn new<T: ToString + Serialize>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

impl<T: ToString + Serialize> From<&CacheKey<T>> for CacheLifetime {
    fn from(value: &CacheKey<T>) -> Self {
        match &value._type {
            CacheKeyType::Tag => CacheLifetime::BindTagCache,
            CacheKeyType::Ingredient => CacheLifetime::BindIngredientCache,
            CacheKeyType::Custom(value) => CacheLifetime::Custom(value.to_owned()),
        }
    }
}

// Lifetimes and stored values

/// Values are bound to a generation key; rotating the key invalidates every value bound to it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CacheLifetime {
    Infinite,
    Custom(String),
    BindTagCache,
    BindIngredientCache,
}

impl CacheLifetime {
    fn bind_key(&self) -> Option<&'static str> {
        match self {
            CacheLifetime::BindTagCache => Some(TAG_CACHE_BIND),
            CacheLifetime::BindIngredientCache => Some(INGREDIENT_CACHE_BIND),
            CacheLifetime::Infinite | CacheLifetime::Custom(_) => None,
        }
    }

    pub async fn get_cache_bind(
        &self,
        cache: &mut MultiplexedConnection,
    ) -> Result<Option<String>, Error> {
        match self {
            CacheLifetime::Infinite => Ok(None),
            CacheLifetime::Custom(value) => Ok(Some(value.to_owned())),
            _ => match self.bind_key() {
                Some(key) => get_cache_value::<&str, String>(key, cache).await,
                None => Ok(None),
            },
        }
    }

    pub async fn validate_cache_bind(
        &self,
        bind: &Option<String>,
        lifetime: Self,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        match self {
            CacheLifetime::Custom(value) => match lifetime {
                CacheLifetime::Custom(_value) => Ok(value == &_value),
                _ => {
                    log::error!("Found conflicting bindings");
                    Err(HtmlError::InternalServerError.new("Conflicting cache bindings"))
                }
            },
            _ => Ok(bind == &self.get_cache_bind(cache).await?),
        }
    }

    /// Rotates the generation key so previously cached values fail validation.
    pub async fn invalidate(&self, cache: &mut MultiplexedConnection) -> Result<(), Error> {
        if let Some(key) = self.bind_key() {
            let generation = uuid::Uuid::new_v4().to_string();
            log::trace!("> Rotating {key} to {generation}");
            set_cache_value(key, generation, cache).await?;
        }
        Ok(())
    }
}

#[derive(Serialize, serde::Deserialize, FromRedisValue, ToRedisArgs, Clone)]
pub struct RedisValue<T: serde::Serialize + Send + Sync + Clone> {
    pub value: T,
    _lifetime: CacheLifetime,
    _bind: Option<String>,
}

impl<T: serde::Serialize + Send + Sync + Clone + for<'a> Deserialize<'a>> RedisValue<T> {
    async fn new(
        value: T,
        lifetime: CacheLifetime,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, Error> {
        let bind = lifetime.get_cache_bind(cache).await?;

        Ok(Self {
            value,
            _lifetime: lifetime,
            _bind: bind,
        })
    }

    async fn validate<K: ToString + Serialize>(
        &self,
        key: &CacheKey<K>,
        cache: &mut MultiplexedConnection,
    ) -> Result<bool, Error> {
        self._lifetime
            .validate_cache_bind(&self._bind, key.into(), cache)
            .await
    }

    /// Reads a still-valid cached value, dropping values that no longer deserialize.
    async fn lookup<K>(key: &CacheKey<K>, cache: &mut MultiplexedConnection) -> Result<Option<Self>, Error>
    where
        K: ToString + Serialize,
    {
        let value = get_cache_value::<String, RedisValue<T>>(key.to_string(), cache)
            .await
            .unwrap_or_else(|_| {
                let mut c = cache.clone();
                let k = key.to_string();
                tokio::spawn(async move {
                    log::error!("Unreadable cache entry {k}, removing it");
                    if let Err(e) = delete_cache_value(k, &mut c).await {
                        log::error!("Failed to drop stale cache entry {e}");
                    }
                });
                None
            });

        match value {
            Some(value) => {
                log::trace!("> Found {}", key);
                match value.validate(key, cache).await? {
                    true => Ok(Some(value)),
                    false => {
                        log::trace!("> Invalidated {}", key);
                        Ok(None)
                    }
                }
            }
            None => Ok(None),
        }
    }

    async fn store<K>(
        key: &CacheKey<K>,
        value: T,
        cache: &mut MultiplexedConnection,
    ) -> Result<Self, Error>
    where
        K: ToString + Serialize,
    {
        let value = RedisValue::new(value, key.into(), cache).await?;

        if let Err(e) = set_cache_value(key.to_string(), value.clone(), cache).await {
            log::error!("{e:?}");
        }

        Ok(value)
    }

    pub async fn get_or_optional<F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<Option<RedisValue<T>>, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Option<T>, Error>> + Send,
    {
        if let Some(value) = Self::lookup(&key, cache).await? {
            return Ok(Some(value));
        }

        log::trace!("> Fetching {}", key);
        match callback().await? {
            Some(value) => Ok(Some(Self::store(&key, value, cache).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_or<F, Fut, K>(
        key: CacheKey<K>,
        cache: &mut MultiplexedConnection,
        callback: F,
    ) -> Result<RedisValue<T>, Error>
    where
        K: ToString + Serialize + Clone + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send,
    {
        if let Some(value) = Self::lookup(&key, cache).await? {
            return Ok(value);
        }

        log::trace!("> Fetching {}", key);
        let value = callback().await?;
        Self::store(&key, value, cache).await
    }
}

// Raw redis access

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.set(key, value).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<(), Error> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut MultiplexedConnection,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}
