//! Type-keyed service container used to inject collaborators into freshly
//! activated actors.
use crate::error::{ActorError, Result};
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

type Service = Arc<dyn Any + Send + Sync>;

/// Shared registry of services. Cloning shares the same underlying map.
#[derive(Clone, Default)]
pub struct Dependencies {
    services: Arc<RwLock<HashMap<TypeId, Service>>>,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the service of type `T`.
    pub fn provide<T: Send + Sync + 'static>(&self, service: Arc<T>) -> &Self {
        self.services.write().insert(TypeId::of::<T>(), service);
        self
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let service = self.services.read().get(&TypeId::of::<T>()).cloned()?;
        service.downcast::<T>().ok()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.read().contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something an actor can ask the container for at activation.
pub trait Resolve: Sized + Send + Sync {
    fn resolve(dependencies: &Dependencies, actor_type: &str) -> Result<Self>;
}

impl Resolve for () {
    fn resolve(_: &Dependencies, _: &str) -> Result<Self> {
        Ok(())
    }
}

impl<T: Send + Sync + 'static> Resolve for Arc<T> {
    fn resolve(dependencies: &Dependencies, actor_type: &str) -> Result<Self> {
        dependencies
            .get::<T>()
            .ok_or_else(|| ActorError::DependencyResolution {
                actor_type: actor_type.to_string(),
                service: short_type_name::<T>().to_string(),
            })
    }
}

impl<T: Send + Sync + 'static> Resolve for Option<Arc<T>> {
    fn resolve(dependencies: &Dependencies, _: &str) -> Result<Self> {
        Ok(dependencies.get::<T>())
    }
}

macro_rules! impl_resolve_tuple {
    ($($name:ident),+) => {
        impl<$($name: Resolve),+> Resolve for ($($name,)+) {
            fn resolve(dependencies: &Dependencies, actor_type: &str) -> Result<Self> {
                Ok(($($name::resolve(dependencies, actor_type)?,)+))
            }
        }
    };
}

impl_resolve_tuple!(A);
impl_resolve_tuple!(A, B);
impl_resolve_tuple!(A, B, C);
impl_resolve_tuple!(A, B, C, D);

/// `Counter` instead of `my_crate::services::Counter`.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
