//! Registration entry point for a distributed-cache host.

use std::fmt;
use std::sync::Arc;

use crate::client::RespMultiplexer;
use crate::config::ConnectionOptions;
use crate::connection::Multiplexer;
use crate::error::{Error, Result};
use crate::guard::{ConnectionFactory, LazyConnection, connection_factory, guard};
use crate::policy::RoutingPolicy;
use crate::types::RedisKey;

/// Options of a Redis-backed cache.
#[derive(Clone, Default)]
pub struct CacheOptions {
    /// Configuration string, parsed with [`ConnectionOptions::parse`].
    pub configuration: Option<String>,
    /// Takes precedence over `configuration`.
    pub connection_options: Option<ConnectionOptions>,
    /// Prefix prepended to every cache key.
    pub instance_name: Option<String>,
    pub connection_factory: Option<ConnectionFactory>,
}

impl CacheOptions {
    /// Options the default factory connects with.
    ///
    /// `abort_on_connect_fail` is always off so an unavailable server does
    /// not prevent the multiplexer from being built.
    pub fn configured_options(&self) -> Result<ConnectionOptions> {
        let mut options = match (&self.connection_options, &self.configuration) {
            (Some(options), _) => options.clone(),
            (None, Some(configuration)) => ConnectionOptions::parse(configuration)?,
            (None, None) => {
                return Err(Error::Config(
                    "neither configuration nor connection options are set".to_string(),
                ));
            }
        };
        options.abort_on_connect_fail = false;
        Ok(options)
    }

    pub fn key(&self, key: &str) -> RedisKey {
        let key = RedisKey::from(key);
        match &self.instance_name {
            Some(prefix) => key.prepend(prefix),
            None => key,
        }
    }

    /// A lazily connected multiplexer over the installed factory.
    pub fn lazy_connection(&self) -> Result<LazyConnection> {
        let factory = self
            .connection_factory
            .clone()
            .ok_or_else(|| Error::Config("no connection factory installed".to_string()))?;
        Ok(LazyConnection::new(factory))
    }
}

impl fmt::Debug for CacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("configuration", &self.configuration.as_ref().map(|_| "<set>"))
            .field("connection_options", &self.connection_options.as_ref().map(ToString::to_string))
            .field("instance_name", &self.instance_name)
            .field("connection_factory", &self.connection_factory.as_ref().map(|_| "<factory>"))
            .finish()
    }
}

/// Register a Redis cache whose connections route through `policy`.
///
/// `setup` fills in the options; afterwards the installed connection factory
/// (or the default one when none was installed) is replaced by its guarded
/// version.
pub fn add_redis_cache(
    setup: impl FnOnce(&mut CacheOptions),
    policy: Arc<dyn RoutingPolicy>,
) -> Result<CacheOptions> {
    let mut options = CacheOptions::default();
    setup(&mut options);

    let factory = match options.connection_factory.take() {
        Some(factory) => factory,
        None => default_factory(options.configured_options()?),
    };
    options.connection_factory = Some(guard(factory, policy));

    tracing::debug!(
        instance_name = options.instance_name.as_deref().unwrap_or(""),
        "redis cache registered with command-flag routing"
    );
    Ok(options)
}

fn default_factory(connection_options: ConnectionOptions) -> ConnectionFactory {
    connection_factory(move || {
        let connection_options = connection_options.clone();
        async move {
            let multiplexer = RespMultiplexer::connect(connection_options).await?;
            Ok(Arc::new(multiplexer) as Arc<dyn Multiplexer>)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NoOpRoutingPolicy;

    #[test]
    fn keys_carry_instance_prefix() {
        let options = CacheOptions {
            instance_name: Some("app:".to_string()),
            ..CacheOptions::default()
        };
        assert_eq!(options.key("user:1"), RedisKey::from("app:user:1"));
        assert_eq!(CacheOptions::default().key("user:1"), RedisKey::from("user:1"));
    }

    #[test]
    fn configured_options_never_abort_on_connect() {
        let options = CacheOptions {
            configuration: Some("localhost:6379,abortConnect=true".to_string()),
            ..CacheOptions::default()
        };
        let parsed = options.configured_options().unwrap();
        assert!(!parsed.abort_on_connect_fail);
        assert_eq!(parsed.endpoints[0].address(), "localhost:6379");

        assert!(CacheOptions::default().configured_options().is_err());
    }

    #[test]
    fn registration_installs_a_factory() {
        let options = add_redis_cache(
            |o| o.configuration = Some("localhost:6379".to_string()),
            Arc::new(NoOpRoutingPolicy),
        )
        .unwrap();
        assert!(options.connection_factory.is_some());
        assert!(options.lazy_connection().is_ok());

        let err = add_redis_cache(|_| {}, Arc::new(NoOpRoutingPolicy)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
