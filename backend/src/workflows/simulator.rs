// Trigger Simulator - dry-run a trigger against fixed sample data
//
// Uses the dispatcher's own resolution routine; nothing is scheduled, logged or sent.

use std::sync::Arc;

use chrono::Utc;
use gestor_shared::{ActionType, EntityType};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::actions::{resolve_action, ResolvedAction};
use super::conditions::ConditionGroup;
use super::error::{WorkflowError, WorkflowResult};
use super::store::WorkflowStore;
use super::template::TemplateData;

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedAction {
    pub action_id: Uuid,
    pub action_type: ActionType,
    pub action_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResolvedAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub workflow_id: Uuid,
    pub trigger_id: Uuid,
    pub entity_type: EntityType,
    pub sample_data: TemplateData,
    /// Whether the trigger's conditions hold for the sample; reported, not enforced
    pub conditions_met: bool,
    pub actions: Vec<SimulatedAction>,
}

#[derive(Clone)]
pub struct TriggerSimulator {
    store: Arc<dyn WorkflowStore>,
}

impl TriggerSimulator {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn test_trigger(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> WorkflowResult<SimulationResult> {
        let workflow = self
            .store
            .get_workflow(organization_id, workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound("Workflow"))?;
        let trigger = self
            .store
            .get_trigger(trigger_id)
            .await?
            .filter(|t| t.workflow_id == workflow.id)
            .ok_or(WorkflowError::NotFound("Trigger"))?;
        let actions = self.store.list_actions(trigger.id).await?;

        let data = sample_data(workflow.entity_type);
        let conditions_met = match ConditionGroup::decode(trigger.conditions.as_ref())? {
            Some(group) => group.evaluate(&data),
            None => true,
        };

        let now = Utc::now();
        let mut simulated = Vec::with_capacity(actions.len());
        for action in &actions {
            let resolved = resolve_action(
                self.store.as_ref(),
                organization_id,
                workflow.entity_type,
                action,
                &data,
                now,
            )
            .await;
            let (result, error) = match resolved {
                Ok(r) => (Some(r), None),
                Err(e) => (None, Some(e.to_string())),
            };
            simulated.push(SimulatedAction {
                action_id: action.id,
                action_type: action.action_type,
                action_order: action.action_order,
                result,
                error,
            });
        }

        Ok(SimulationResult {
            workflow_id: workflow.id,
            trigger_id: trigger.id,
            entity_type: workflow.entity_type,
            sample_data: data,
            conditions_met,
            actions: simulated,
        })
    }
}

pub fn sample_data(entity_type: EntityType) -> TemplateData {
    sample_data_for(entity_type.as_str())
}

/// Fixed, realistic fixture per entity kind; unknown kinds get the generic one
pub fn sample_data_for(kind: &str) -> TemplateData {
    let fixture = match kind {
        "session" => json!({
            "patient_name": "João Silva",
            "patient_phone": "+5511987654321",
            "patient_email": "joao.silva@example.com",
            "professional_name": "Dra. Ana Costa",
            "session_date": "15/03/2025",
            "session_time": "14:30",
            "clinic_name": "Clínica Bem-Estar",
            "status": "scheduled"
        }),
        "budget" => json!({
            "client_name": "Maria Oliveira",
            "client_phone": "+5511912345678",
            "client_email": "maria.oliveira@example.com",
            "budget_number": "ORC-2025-0042",
            "budget_total": 48750.9,
            "valid_until": "30/04/2025",
            "company_name": "Construtora Horizonte",
            "status": "sent"
        }),
        "project" => json!({
            "project_name": "Residencial Vista Verde",
            "client_name": "Maria Oliveira",
            "client_phone": "+5511912345678",
            "client_email": "maria.oliveira@example.com",
            "start_date": "01/04/2025",
            "end_date": "30/11/2025",
            "progress_percent": 35,
            "status": "in_progress"
        }),
        _ => json!({
            "entity_name": "Exemplo",
            "status": "active"
        }),
    };

    match fixture {
        Value::Object(map) => map,
        _ => TemplateData::new(),
    }
}
