//! Component registry: controllers, middleware and injectable services.
//!
//! Components are registered either as ready instances or as factories.
//! Factories receive the registry and pull their dependencies out of it;
//! [`ComponentRegistry::resolve_dependencies`] runs them until every factory
//! has produced its component or no further progress can be made.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::middleware::Middleware;
use crate::routing::controller::ControllerComponent;
use crate::traits::Controller;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Controller,
    Middleware,
    Service,
}

pub enum ComponentInstance {
    Controller(ControllerComponent),
    Middleware(Arc<dyn Middleware>),
    Service(Arc<dyn Any + Send + Sync>),
}

impl ComponentInstance {
    pub fn component_type(&self) -> ComponentType {
        match self {
            ComponentInstance::Controller(_) => ComponentType::Controller,
            ComponentInstance::Middleware(_) => ComponentType::Middleware,
            ComponentInstance::Service(_) => ComponentType::Service,
        }
    }
}

/// A registered component and its name.
pub struct ComponentRegistryContext {
    pub name: String,
    pub instance: ComponentInstance,
}

impl ComponentRegistryContext {
    pub fn component_type(&self) -> ComponentType {
        self.instance.component_type()
    }
}

type ComponentFactory = Box<dyn Fn(&ComponentRegistry) -> Result<ComponentInstance> + Send + Sync>;

struct PendingComponent {
    name: String,
    factory: ComponentFactory,
}

#[derive(Default)]
pub struct ComponentRegistry {
    components: HashMap<String, ComponentRegistryContext>,
    order: Vec<String>,
    pending: Vec<PendingComponent>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.components.contains_key(name) || self.pending.iter().any(|p| p.name == name) {
            return Err(AppError::DuplicateComponent(name.to_string()));
        }
        Ok(())
    }

    fn insert(&mut self, name: String, instance: ComponentInstance) {
        debug!(component = %name, kind = ?instance.component_type(), "Registered component");
        self.order.push(name.clone());
        self.components
            .insert(name.clone(), ComponentRegistryContext { name, instance });
    }

    fn defer(&mut self, name: String, factory: ComponentFactory) -> Result<()> {
        self.ensure_unique(&name)?;
        self.pending.push(PendingComponent { name, factory });
        Ok(())
    }

    /// Register a controller built once its dependencies are available.
    pub fn register_controller<C, F>(&mut self, factory: F) -> Result<()>
    where
        C: Controller,
        F: Fn(&ComponentRegistry) -> Result<C> + Send + Sync + 'static,
    {
        self.defer(
            C::name().to_string(),
            Box::new(move |registry| {
                factory(registry).map(|c| ComponentInstance::Controller(ControllerComponent::from_controller(c)))
            }),
        )
    }

    pub fn register_controller_instance<C: Controller>(&mut self, controller: C) -> Result<()> {
        let name = C::name().to_string();
        self.ensure_unique(&name)?;
        self.insert(
            name,
            ComponentInstance::Controller(ControllerComponent::from_controller(controller)),
        );
        Ok(())
    }

    pub fn register_service<T>(&mut self, name: impl Into<String>, service: T) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.insert(name, ComponentInstance::Service(Arc::new(service)));
        Ok(())
    }

    pub fn register_service_factory<T, F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        F: Fn(&ComponentRegistry) -> Result<T> + Send + Sync + 'static,
    {
        self.defer(
            name.into(),
            Box::new(move |registry| {
                factory(registry).map(|s| ComponentInstance::Service(Arc::new(s) as Arc<dyn Any + Send + Sync>))
            }),
        )
    }

    pub fn register_middleware<M: Middleware>(&mut self, name: impl Into<String>, middleware: M) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.insert(name, ComponentInstance::Middleware(Arc::new(middleware)));
        Ok(())
    }

    /// Look up a service dependency by name and type.
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let unresolved = || AppError::UnresolvedDependency {
            component: String::new(),
            dependency: name.to_string(),
        };
        match self.components.get(name).map(|c| &c.instance) {
            Some(ComponentInstance::Service(service)) => {
                Arc::clone(service).downcast::<T>().map_err(|_| unresolved())
            }
            _ => Err(unresolved()),
        }
    }

    /// Run pending factories until all are resolved.
    pub fn resolve_dependencies(&mut self) -> Result<()> {
        while !self.pending.is_empty() {
            let mut progress = false;
            let mut unresolved: Option<(String, String)> = None;

            for pending in std::mem::take(&mut self.pending) {
                match (pending.factory)(self) {
                    Ok(instance) => {
                        self.insert(pending.name, instance);
                        progress = true;
                    }
                    Err(AppError::UnresolvedDependency { dependency, .. }) => {
                        if unresolved.is_none() {
                            unresolved = Some((pending.name.clone(), dependency));
                        }
                        self.pending.push(pending);
                    }
                    Err(e) => return Err(e),
                }
            }

            if !progress {
                if let Some((component, dependency)) = unresolved {
                    return Err(AppError::UnresolvedDependency {
                        component,
                        dependency,
                    });
                }
            }
        }
        info!("Resolved dependencies of {} components", self.components.len());
        Ok(())
    }

    /// Build the routing actions of every controller.
    pub fn initialize_controllers(&mut self) -> Result<()> {
        for name in &self.order {
            if let Some(ComponentRegistryContext {
                instance: ComponentInstance::Controller(controller),
                ..
            }) = self.components.get_mut(name)
            {
                controller.initialize_controller_functionality()?;
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ComponentRegistryContext> {
        self.components.get(name)
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerComponent> {
        match self.components.get(name).map(|c| &c.instance) {
            Some(ComponentInstance::Controller(controller)) => Some(controller),
            _ => None,
        }
    }

    pub fn middleware(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        match self.components.get(name).map(|c| &c.instance) {
            Some(ComponentInstance::Middleware(middleware)) => Some(Arc::clone(middleware)),
            _ => None,
        }
    }

    /// Controllers in registration order.
    pub fn get_controllers(&self) -> Vec<&ControllerComponent> {
        self.order
            .iter()
            .filter_map(|name| self.controller(name))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.pending.is_empty()
    }

    pub fn clear_component_registry(&mut self) {
        self.components.clear();
        self.order.clear();
        self.pending.clear();
    }
}
