//! Revision resolution and freeze/thaw decision engine.
//!
//! The main components are:
//! - [`resolver`]: picks the current ReplicaSet of each Deployment
//! - [`policy`]: evaluates the `after-mins` threshold against a revision's age
//! - [`reconciler`]: turns a decision into a replica patch
//! - [`Suspender`]: drives one suspend pass over all opted-in Deployments
//!
//! Cluster access goes through the [`WorkloadApi`] trait.

pub mod context;
pub mod mock;
pub mod orchestrator;
pub mod policy;
pub mod reconciler;
pub mod resolver;
pub mod traits;
pub mod types;

pub use context::PassContext;
pub use orchestrator::Suspender;
pub use reconciler::ScaleReconciler;
pub use traits::{SystemClock, TimeSource, WorkloadApi};
pub use types::*;
