// Core moderation module - warnings, escalation, bans and mutes.

pub mod duration;
pub mod escalation;
pub mod moderation_models;
pub mod moderation_service;

pub use duration::{format_duration, parse_duration};
pub use escalation::*;
pub use moderation_models::*;
pub use moderation_service::*;
