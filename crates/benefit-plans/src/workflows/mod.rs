//! Beneficiary targeting and payment-plan approval workflows.

mod identity;
pub mod payment_plan;
pub mod targeting;
mod validation;

pub use identity::{ActorId, PlanId};
pub use validation::ValidationError;
