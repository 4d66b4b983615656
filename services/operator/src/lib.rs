//! Synapse operator
//!
//! Reconciles `Synapse`, `SynapseWorker` and `Riot` records into the
//! ConfigMaps, Secrets, Deployments and Services that run a Matrix
//! deployment.
//!
//! - [`synth`]: pure child synthesis per record kind
//! - [`resolver`]: parent lookup for workers
//! - [`reconciler`]: the per-record entry point
//! - [`controller`]: watches and requeue policy
//! - [`store`]: the Kubernetes-backed record store

pub mod component;
pub mod config;
pub mod controller;
pub mod crds;
pub mod health;
pub mod reconciler;
pub mod resolver;
pub mod store;
pub mod synth;

pub use component::Component;
pub use reconciler::Reconciler;
