// Workflow Engine - wires the definitions, runtime and simulation services over one store

use std::sync::Arc;

use super::collaborators::Collaborators;
use super::definitions::WorkflowDefinitions;
use super::dispatcher::JobDispatcher;
use super::execution_log::ExecutionLogger;
use super::queue::JobQueue;
use super::error::WorkflowResult;
use super::reactor::{ReactorOutcome, StateChange, StateChangeReactor};
use super::simulator::TriggerSimulator;
use super::store::WorkflowStore;
use crate::config::DispatcherConfig;

pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    pub definitions: WorkflowDefinitions,
    pub reactor: StateChangeReactor,
    pub queue: JobQueue,
    /// Shared with the background sweep job
    pub dispatcher: Arc<JobDispatcher>,
    pub simulator: TriggerSimulator,
    pub log: ExecutionLogger,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, collaborators: Collaborators, config: DispatcherConfig) -> Self {
        let log = ExecutionLogger::new(store.clone());
        let queue = JobQueue::new(store.clone());
        let reactor = StateChangeReactor::new(store.clone(), queue.clone(), log.clone());
        let dispatcher = Arc::new(JobDispatcher::new(
            store.clone(),
            collaborators,
            log.clone(),
            config,
        ));

        Self {
            definitions: WorkflowDefinitions::new(store.clone()),
            simulator: TriggerSimulator::new(store.clone()),
            reactor,
            queue,
            dispatcher,
            log,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /// Entry point for entity services, in process or through the state-change endpoint
    pub async fn on_entity_state_change(&self, change: &StateChange) -> WorkflowResult<ReactorOutcome> {
        self.reactor.on_entity_state_change(change).await
    }
}
