//! Service container.
//!
//! The application owns one [`Container`]. Startup hooks register services in
//! it and handlers capture the `Arc`s they need. Services are keyed by type,
//! so each type has at most one instance.
//!
//! ```
//! use kiln_core::Container;
//! use std::sync::Arc;
//!
//! struct Database { url: String }
//! struct UserRepo { db: Arc<Database> }
//!
//! let container = Container::new();
//! container.provide(Database { url: "sqlite::memory:".into() });
//! container.provide_lazy(|c| UserRepo { db: c.require::<Database>().unwrap() });
//!
//! let repo = container.require::<UserRepo>().unwrap();
//! assert_eq!(repo.db.url, "sqlite::memory:");
//! ```

use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

type Service = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Container) -> Service + Send + Sync>;

/// A service could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("service `{type_name}` is not registered")]
pub struct ResolveError {
    /// Name of the requested type.
    pub type_name: &'static str,
}

enum Slot {
    Ready(Service),
    Lazy {
        factory: Factory,
        instance: OnceLock<Service>,
    },
}

/// Type-keyed registry of shared services.
#[derive(Default)]
pub struct Container {
    services: RwLock<HashMap<TypeId, Arc<Slot>>>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ready-made service, replacing any previous one of that type.
    pub fn provide<T: Send + Sync + 'static>(&self, service: T) {
        self.provide_arc(Arc::new(service));
    }

    /// Registers a service that is already shared.
    pub fn provide_arc<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        tracing::debug!(service = type_name::<T>(), "registering service");
        self.services
            .write()
            .insert(TypeId::of::<T>(), Arc::new(Slot::Ready(service)));
    }

    /// Registers a factory that builds the service on first resolution.
    ///
    /// The factory runs at most once; it may resolve other services.
    pub fn provide_lazy<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        tracing::debug!(service = type_name::<T>(), "registering lazy service");
        let slot = Slot::Lazy {
            factory: Box::new(move |container| Arc::new(factory(container)) as Service),
            instance: OnceLock::new(),
        };
        self.services
            .write()
            .insert(TypeId::of::<T>(), Arc::new(slot));
    }

    /// Returns the service of type `T`, if registered.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let slot = self.services.read().get(&TypeId::of::<T>()).cloned()?;
        let service = match &*slot {
            Slot::Ready(service) => Arc::clone(service),
            Slot::Lazy { factory, instance } => Arc::clone(instance.get_or_init(|| factory(self))),
        };
        service.downcast::<T>().ok()
    }

    /// Returns the service of type `T` or an error naming the missing type.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve().ok_or(ResolveError {
            type_name: type_name::<T>(),
        })
    }

    /// Returns true if a service of type `T` is registered.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.len())
            .finish()
    }
}
