use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::OnceCell;

use crate::connection::Multiplexer;
use crate::error::Result;
use crate::policy::RoutingPolicy;
use crate::proxy::ProxyMultiplexer;

/// Asynchronous constructor of a multiplexer.
pub type ConnectionFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Multiplexer>>> + Send + Sync>;

/// Build a [`ConnectionFactory`] from an async closure.
pub fn connection_factory<F, Fut>(f: F) -> ConnectionFactory
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn Multiplexer>>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<Arc<dyn Multiplexer>>> { Box::pin(f()) })
}

/// Wrap `original` so every multiplexer it yields routes through `policy`.
///
/// A multiplexer that is already a routing proxy is returned unchanged, so
/// guarding an already guarded factory (or a factory that hands back a
/// previously wrapped connection) never nests proxies.
pub fn guard(original: ConnectionFactory, policy: Arc<dyn RoutingPolicy>) -> ConnectionFactory {
    connection_factory(move || {
        let original = original.clone();
        let policy = policy.clone();
        async move {
            let multiplexer = original().await?;
            if multiplexer.is_routing_proxy() {
                tracing::debug!("multiplexer already routes command flags; not wrapping again");
                return Ok(multiplexer);
            }
            tracing::debug!(
                configuration = %multiplexer.configuration(),
                "wrapping multiplexer with command-flag routing"
            );
            Ok(Arc::new(ProxyMultiplexer::new(multiplexer, policy)) as Arc<dyn Multiplexer>)
        }
    })
}

/// A multiplexer built on first use and shared afterwards.
///
/// Failed attempts are not cached; the next `get` runs the factory again.
pub struct LazyConnection {
    factory: ConnectionFactory,
    cell: OnceCell<Arc<dyn Multiplexer>>,
}

impl LazyConnection {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            cell: OnceCell::new(),
        }
    }

    pub async fn get(&self) -> Result<Arc<dyn Multiplexer>> {
        self.cell
            .get_or_try_init(|| (self.factory)())
            .await
            .map(Arc::clone)
    }

    /// The multiplexer, if a previous `get` succeeded.
    pub fn connected(&self) -> Option<Arc<dyn Multiplexer>> {
        self.cell.get().cloned()
    }
}
