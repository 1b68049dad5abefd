//! Routing actions, controller components and request resolution.

pub mod action;
pub mod controller;
pub mod params;
pub mod resolver;

pub use action::{InitializationStatus, RouteParam, RoutingAction, RoutingOptions};
pub use controller::ControllerComponent;
pub use params::{AllParameters, Argument, Arguments, ParamBinding, ParamKind, ViewModel};
pub use resolver::{middleware_resolver, request_resolver};
