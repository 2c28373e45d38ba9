//! Execution engine, source scheduler and administrative service
//!
//! - [`Engine`] runs one item through the analysis pipeline
//! - [`Scheduler`] keeps one cron timer per enabled source and runs ticks
//! - [`WorkflowService`] is the administrative surface over both

pub mod admin;
pub mod config;
pub mod cron;
pub mod engine;
pub mod scheduler;
pub mod strategy;

pub use admin::{ExecutionDetails, NewSource, RecommendationsSummary, SourceUpdate, WorkflowService};
pub use config::{SchedulerConfig, SchedulerConfigBuilder};
pub use cron::{next_fire, parse_schedule, upcoming, validate_schedule};
pub use engine::Engine;
pub use scheduler::{RegisteredSource, Scheduler, TickOutcome, TickReport, Trigger};
pub use strategy::SourceStrategy;
