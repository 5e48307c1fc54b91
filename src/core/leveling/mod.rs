// Leveling: level curve, XP awards, admin edits and titles.

pub mod level_curve;
pub mod leveling_models;
pub mod leveling_service;
pub mod titles;

pub use level_curve::*;
pub use leveling_models::*;
pub use leveling_service::*;
pub use titles::*;
