//! Intent-routed question answering for the bookstore assistant.
//!
//! A question is classified by the language model and answered by one of
//! three handlers: model-written catalog queries, embedded policy lookup or
//! a conversational reply.

mod blocking;
pub mod chitchat;
pub mod classifier;
pub mod database;
pub mod gate;
pub mod orchestrator;
pub mod outcome;
pub mod policy;
pub mod prompt;

pub use chitchat::ChitchatHandler;
pub use classifier::IntentClassifier;
pub use database::DatabaseHandler;
pub use gate::{check_query, strip_code_fences, GateRejection};
pub use orchestrator::ChatOrchestrator;
pub use outcome::{DegradeReason, HandlerOutcome};
pub use policy::PolicyHandler;
