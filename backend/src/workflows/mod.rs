// Workflow Automation Engine
//
// Per-organization state machines for business entities. State changes schedule
// trigger jobs; a periodic sweep executes due jobs against external collaborators.

pub mod actions;
pub mod collaborators;
pub mod conditions;
pub mod definitions;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod execution_log;
pub mod postgres;
pub mod queue;
pub mod reactor;
pub mod seeds;
pub mod simulator;
pub mod store;
pub mod template;

pub use engine::WorkflowEngine;
pub use error::WorkflowError;
