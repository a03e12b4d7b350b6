//! Lines bot: answers chat messages containing source links with the
//! referenced lines.

pub mod autojoin;
pub mod bot;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod pipeline;
pub mod resolver;
pub mod transport;
