//! Coach Onboard: self-service onboarding portal for contract coaches.

pub mod config;
pub mod error;
pub mod notify;
pub mod onboarding;
pub mod storage;
pub mod store;
