//! Transport factory registry.
//!
//! The single dispatch point from a resolved [`TransportConfig`] to a concrete
//! binding. The default registry knows every binding compiled into this crate
//! (cargo features `stdio`, `http`, `sse`, `websocket`); hosts can add or
//! replace factories with [`TransportRegistry::register`].

use std::collections::BTreeMap;
use std::sync::Arc;

use gitmcp_transport_traits::{
    TransportBinding, TransportConfig, TransportError, TransportFactory, TransportKind,
    TransportResult,
};
use tracing::debug;

/// Maps each transport kind to the factory that builds it.
#[derive(Debug, Clone, Default)]
pub struct TransportRegistry {
    factories: BTreeMap<TransportKind, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    /// A registry with no factories.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with a factory for every compiled-in binding.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "stdio")]
        registry.register(Arc::new(gitmcp_stdio::StdioTransportFactory::new()));
        #[cfg(feature = "http")]
        registry.register(Arc::new(gitmcp_http::HttpTransportFactory::new()));
        #[cfg(feature = "sse")]
        registry.register(Arc::new(gitmcp_http::SseTransportFactory::new()));
        #[cfg(feature = "websocket")]
        registry.register(Arc::new(gitmcp_websocket::WebSocketTransportFactory::new()));
        registry
    }

    /// Register `factory` for its kind, returning the factory it replaced.
    pub fn register(&mut self, factory: Arc<dyn TransportFactory>) -> Option<Arc<dyn TransportFactory>> {
        let kind = factory.kind();
        debug!(transport = %kind, "registering transport factory");
        self.factories.insert(kind, factory)
    }

    /// Whether a factory is registered for `kind`.
    pub fn supports(&self, kind: TransportKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> Vec<TransportKind> {
        self.factories.keys().copied().collect()
    }

    /// Instantiate the binding for `config`.
    ///
    /// # Errors
    ///
    /// [`TransportError::UnsupportedTransport`] when no factory is registered
    /// for the config's kind.
    pub fn create(&self, config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
        let kind = config.kind();
        let factory = self
            .factories
            .get(&kind)
            .ok_or(TransportError::UnsupportedTransport(kind))?;
        factory.create(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitmcp_transport_traits::{ConnectionInfo, LifecycleState, SharedHandler};
    use pretty_assertions::assert_eq;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    #[derive(Debug)]
    struct InertBinding(TransportKind);

    impl TransportBinding for InertBinding {
        fn kind(&self) -> TransportKind {
            self.0
        }

        fn start(
            &self,
            _handler: SharedHandler,
        ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn stop(&self, _timeout: Duration) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn state(&self) -> LifecycleState {
            LifecycleState::Created
        }

        fn connection_info(&self) -> ConnectionInfo {
            ConnectionInfo::new(self.0).with("inert", true)
        }

        fn closed(&self) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
            Box::pin(std::future::pending())
        }
    }

    #[derive(Debug)]
    struct InertFactory(TransportKind);

    impl TransportFactory for InertFactory {
        fn kind(&self) -> TransportKind {
            self.0
        }

        fn create(&self, _config: &TransportConfig) -> TransportResult<Box<dyn TransportBinding>> {
            Ok(Box::new(InertBinding(self.0)))
        }
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let registry = TransportRegistry::new();
        for kind in TransportKind::ALL {
            let err = registry
                .create(&TransportConfig::default_for(kind))
                .unwrap_err();
            assert!(matches!(err, TransportError::UnsupportedTransport(k) if k == kind));
        }
    }

    #[test]
    fn test_register_replaces_factory() {
        let mut registry = TransportRegistry::with_defaults();
        let previous = registry.register(Arc::new(InertFactory(TransportKind::Http)));
        assert_eq!(previous.is_some(), cfg!(feature = "http"));

        let binding = registry
            .create(&TransportConfig::default_for(TransportKind::Http))
            .unwrap();
        assert!(binding.connection_info().get("inert").is_some());
    }

    #[test]
    #[cfg(all(feature = "stdio", feature = "http", feature = "sse", feature = "websocket"))]
    fn test_defaults_cover_every_kind() {
        let registry = TransportRegistry::with_defaults();
        assert_eq!(registry.kinds(), TransportKind::ALL.to_vec());
        for kind in TransportKind::ALL {
            let binding = registry.create(&TransportConfig::default_for(kind)).unwrap();
            assert_eq!(binding.kind(), kind);
            assert_eq!(binding.state(), LifecycleState::Created);
            assert_eq!(binding.connection_info().protocol(), Some(kind.as_str()));
        }
    }
}
