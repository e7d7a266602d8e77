//! Coach onboarding: the step catalog, per-step state machine, status
//! aggregation, file submission, and the service and routes built on them.
//!
//! A coach is created by an admin, receives a link carrying an unguessable
//! token, and works through a fixed checklist. Some steps are reviewed by
//! the admin, some are ticked by the coach, and some are done by the admin
//! outside the system. The coach's overall status is always derived from
//! the steps, never set directly.

pub mod catalog;
pub mod model;
pub mod routes;
pub mod service;
pub mod state;
pub mod status;
pub mod submission;

pub use catalog::{CatalogEntry, HandlingType, ONBOARDING_STEPS, StepKey};
pub use model::{Coach, CoachDetail, CoachProfile, CoachStatus, NewCoach, ProfileUpdate, Step};
pub use routes::{PortalState, portal_routes};
pub use service::{OnboardingService, Outcome, ProfileSaved};
pub use state::{Actor, StepCommand, TransitionError};
