#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod api;
pub mod app;
pub(crate) mod clients;
pub mod config;
pub(crate) mod oauth;
pub mod observability;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub(crate) mod util;
