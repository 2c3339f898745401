//! Data model and trait contracts for the webmachine-rs decision core.
//!
//! This crate defines *what* a request, response, route, or dependency is.
//! It carries no I/O and no decision logic — the state machine and DI
//! container that consume these types live in `wm-engine`.
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  wm-contract  (this crate)                  │
//! │  Request / Response / Headers     DependencyDescriptor      │
//! │  PathTemplate / RouteMatch        ContractError             │
//! │  MediaType / Conditional headers  AnyValue / HandlerReturn  │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │                  wm-engine  (runtime crate)                 │
//! │  DiContainer: resolves dependency graphs                    │
//! │  RouteRegistry: matches requests, computes capabilities     │
//! │  DecisionMachine: drives a request to a terminal Response    │
//! │  Application: registration facade                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod conditional;
pub mod dependency;
pub mod error;
pub mod headers;
pub mod method;
pub mod negotiation;
pub mod request;
pub mod response;
pub mod route;
pub mod value;

pub use conditional::ConditionalHeaders;
pub use dependency::{DependencyDescriptor, DependencyKind, Scope};
pub use error::ContractError;
pub use headers::CaseInsensitiveMultiMap;
pub use method::Method;
pub use negotiation::MediaType;
pub use request::{ClientCert, Request};
pub use response::Response;
pub use route::{PathTemplate, RouteCapabilities, RouteMatch, Segment};
pub use value::{
    AnyValue, AuthDecision, DependencyCallable, DependencyFuture, HandlerReturn, ResourceState,
};
