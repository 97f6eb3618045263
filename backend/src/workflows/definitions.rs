// Workflow Definitions - organization-scoped CRUD over workflows and everything they own
//
// Children are always reached through their workflow, whose organization is checked
// first; an id from another organization resolves to NotFound.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gestor_shared::{
    ActionInput, BusinessModule, MessageChannel, MessageTemplate, MessageTemplateInput, StateInput,
    TransitionInput, TriggerInput, TriggerType, TriggerWithActions, Workflow, WorkflowAction,
    WorkflowDetail, WorkflowInput, WorkflowState, WorkflowTransition, WorkflowTrigger,
};
use uuid::Uuid;

use super::actions::ActionConfig;
use super::conditions::ConditionGroup;
use super::error::{WorkflowError, WorkflowResult};
use super::seeds;
use super::store::{WorkflowFilter, WorkflowStore};
use super::template::extract_variables;
use crate::validation::Validator;

const MAX_WORKFLOW_NAME: usize = 200;
const MAX_DESCRIPTION: usize = 2000;
const MAX_STATE_NAME: usize = 100;
const MAX_LABEL: usize = 255;
const MAX_COLOR: usize = 32;
const MAX_TEMPLATE_SUBJECT: usize = 500;

#[derive(Clone)]
pub struct WorkflowDefinitions {
    store: Arc<dyn WorkflowStore>,
}

impl WorkflowDefinitions {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    // ===== Workflows =====

    pub async fn create_workflow(&self, organization_id: Uuid, input: WorkflowInput) -> WorkflowResult<Workflow> {
        validate_workflow(&input)?;

        let workflow = Workflow {
            id: Uuid::new_v4(),
            organization_id,
            name: input.name.trim().to_string(),
            description: input.description,
            module: input.module,
            entity_type: input.entity_type,
            is_active: input.is_active,
            is_default: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.insert_workflow(&workflow).await?;

        tracing::info!(workflow_id = %workflow.id, entity_type = %workflow.entity_type, "Workflow created");
        Ok(workflow)
    }

    pub async fn get_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> WorkflowResult<Workflow> {
        self.store
            .get_workflow(organization_id, workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound("Workflow"))
    }

    pub async fn get_workflow_detail(&self, organization_id: Uuid, workflow_id: Uuid) -> WorkflowResult<WorkflowDetail> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let states = self.store.list_states(workflow.id).await?;
        let transitions = self.store.list_transitions(workflow.id).await?;
        let triggers = self.triggers_with_actions(workflow.id).await?;

        Ok(WorkflowDetail {
            workflow,
            states,
            transitions,
            triggers,
        })
    }

    pub async fn list_workflows(&self, organization_id: Uuid, filter: &WorkflowFilter) -> WorkflowResult<Vec<Workflow>> {
        self.store.list_workflows(organization_id, filter).await
    }

    /// Full replacement of the editable fields. Module and entity type are fixed at creation.
    pub async fn update_workflow(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        input: WorkflowInput,
    ) -> WorkflowResult<Workflow> {
        let mut workflow = self.get_workflow(organization_id, workflow_id).await?;
        Validator::new()
            .error_if(
                input.module != workflow.module,
                "module",
                "module cannot be changed after creation",
            )
            .error_if(
                input.entity_type != workflow.entity_type,
                "entity_type",
                "entity_type cannot be changed after creation",
            )
            .finish()?;
        validate_workflow(&input)?;

        workflow.name = input.name.trim().to_string();
        workflow.description = input.description;
        workflow.is_active = input.is_active;
        workflow.updated_at = Some(Utc::now());
        self.store.update_workflow(&workflow).await?;
        Ok(workflow)
    }

    pub async fn delete_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> WorkflowResult<()> {
        if !self.store.delete_workflow(organization_id, workflow_id).await? {
            return Err(WorkflowError::NotFound("Workflow"));
        }
        tracing::info!(workflow_id = %workflow_id, "Workflow deleted");
        Ok(())
    }

    /// Deep copy; the copy starts inactive and not default
    pub async fn duplicate_workflow(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        new_name: Option<String>,
    ) -> WorkflowResult<WorkflowDetail> {
        let source = self.get_workflow_detail(organization_id, workflow_id).await?;
        let name = match new_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => format!("{} (copy)", source.workflow.name),
        };
        Validator::new()
            .max_length(&name, "name", MAX_WORKFLOW_NAME)
            .finish()?;

        let copy = plan_duplicate(&source, name, Utc::now());
        self.store.insert_workflow_detail(&copy).await?;

        tracing::info!(source_id = %workflow_id, workflow_id = %copy.workflow.id, "Workflow duplicated");
        Ok(copy)
    }

    pub async fn set_default_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> WorkflowResult<Workflow> {
        let workflow = self
            .store
            .set_default_workflow(organization_id, workflow_id)
            .await?
            .ok_or(WorkflowError::NotFound("Workflow"))?;

        tracing::info!(
            workflow_id = %workflow.id,
            module = %workflow.module,
            entity_type = %workflow.entity_type,
            "Default workflow changed"
        );
        Ok(workflow)
    }

    /// Seed and promote default workflows for every entity type of `module` that has none
    pub async fn bootstrap_defaults(
        &self,
        organization_id: Uuid,
        module: BusinessModule,
    ) -> WorkflowResult<Vec<WorkflowDetail>> {
        let mut created = Vec::new();
        for &entity_type in module.entity_types() {
            if self
                .store
                .find_default_workflow(organization_id, entity_type)
                .await?
                .is_some()
            {
                continue;
            }

            let mut detail = seeds::default_workflow(organization_id, entity_type, Utc::now());
            self.store.insert_workflow_detail(&detail).await?;
            detail.workflow = self.set_default_workflow(organization_id, detail.workflow.id).await?;
            created.push(detail);
        }
        Ok(created)
    }

    // ===== States =====

    pub async fn create_state(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        input: StateInput,
    ) -> WorkflowResult<WorkflowState> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        validate_state(&input)?;

        let state = WorkflowState {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            name: input.name.trim().to_string(),
            label: input.label,
            state_type: input.state_type,
            position: input.position,
            color: input.color,
            created_at: Utc::now(),
        };
        self.store.insert_state(&state).await?;
        Ok(state)
    }

    pub async fn list_states(&self, organization_id: Uuid, workflow_id: Uuid) -> WorkflowResult<Vec<WorkflowState>> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        self.store.list_states(workflow.id).await
    }

    pub async fn update_state(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        state_id: Uuid,
        input: StateInput,
    ) -> WorkflowResult<WorkflowState> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let mut state = self.find_state(workflow.id, state_id).await?;
        validate_state(&input)?;

        state.name = input.name.trim().to_string();
        state.label = input.label;
        state.state_type = input.state_type;
        state.position = input.position;
        state.color = input.color;
        self.store.update_state(&state).await?;
        Ok(state)
    }

    /// Also removes transitions and triggers bound to the state
    pub async fn delete_state(&self, organization_id: Uuid, workflow_id: Uuid, state_id: Uuid) -> WorkflowResult<()> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        if !self.store.delete_state(workflow.id, state_id).await? {
            return Err(WorkflowError::NotFound("State"));
        }
        Ok(())
    }

    async fn find_state(&self, workflow_id: Uuid, state_id: Uuid) -> WorkflowResult<WorkflowState> {
        self.store
            .list_states(workflow_id)
            .await?
            .into_iter()
            .find(|s| s.id == state_id)
            .ok_or(WorkflowError::NotFound("State"))
    }

    // ===== Transitions =====

    pub async fn create_transition(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        input: TransitionInput,
    ) -> WorkflowResult<WorkflowTransition> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        self.validate_transition(workflow.id, &input).await?;

        let transition = WorkflowTransition {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            from_state_id: input.from_state_id,
            to_state_id: input.to_state_id,
            name: input.name.trim().to_string(),
            requires_confirmation: input.requires_confirmation,
            created_at: Utc::now(),
        };
        self.store.insert_transition(&transition).await?;
        Ok(transition)
    }

    pub async fn list_transitions(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
    ) -> WorkflowResult<Vec<WorkflowTransition>> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        self.store.list_transitions(workflow.id).await
    }

    pub async fn update_transition(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        transition_id: Uuid,
        input: TransitionInput,
    ) -> WorkflowResult<WorkflowTransition> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let mut transition = self.find_transition(workflow.id, transition_id).await?;
        self.validate_transition(workflow.id, &input).await?;

        transition.from_state_id = input.from_state_id;
        transition.to_state_id = input.to_state_id;
        transition.name = input.name.trim().to_string();
        transition.requires_confirmation = input.requires_confirmation;
        self.store.update_transition(&transition).await?;
        Ok(transition)
    }

    pub async fn delete_transition(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        transition_id: Uuid,
    ) -> WorkflowResult<()> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        if !self.store.delete_transition(workflow.id, transition_id).await? {
            return Err(WorkflowError::NotFound("Transition"));
        }
        Ok(())
    }

    async fn find_transition(&self, workflow_id: Uuid, transition_id: Uuid) -> WorkflowResult<WorkflowTransition> {
        self.store
            .list_transitions(workflow_id)
            .await?
            .into_iter()
            .find(|t| t.id == transition_id)
            .ok_or(WorkflowError::NotFound("Transition"))
    }

    async fn validate_transition(&self, workflow_id: Uuid, input: &TransitionInput) -> WorkflowResult<()> {
        Validator::new()
            .required(&input.name, "name")
            .max_length(&input.name, "name", MAX_LABEL)
            .finish()?;

        let states = self.store.list_states(workflow_id).await?;
        for state_id in [input.from_state_id, input.to_state_id] {
            if !states.iter().any(|s| s.id == state_id) {
                return Err(WorkflowError::NotFound("State"));
            }
        }
        Ok(())
    }

    // ===== Triggers =====

    pub async fn create_trigger(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        input: TriggerInput,
    ) -> WorkflowResult<TriggerWithActions> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        self.validate_trigger(workflow.id, &input).await?;

        let trigger = WorkflowTrigger {
            id: Uuid::new_v4(),
            workflow_id: workflow.id,
            state_id: input.state_id,
            transition_id: input.transition_id,
            name: input.name.trim().to_string(),
            trigger_type: input.trigger_type,
            time_offset_minutes: input.time_offset_minutes,
            time_field: input.time_field,
            recurring_cron: input.recurring_cron,
            conditions: input.conditions.filter(|c| !c.is_null()),
            is_active: input.is_active,
            created_at: Utc::now(),
        };
        self.store.insert_trigger(&trigger).await?;
        Ok(TriggerWithActions {
            trigger,
            actions: Vec::new(),
        })
    }

    pub async fn list_triggers(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
    ) -> WorkflowResult<Vec<TriggerWithActions>> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        self.triggers_with_actions(workflow.id).await
    }

    pub async fn get_trigger(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> WorkflowResult<TriggerWithActions> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let trigger = self.find_trigger(workflow.id, trigger_id).await?;
        let actions = self.store.list_actions(trigger.id).await?;
        Ok(TriggerWithActions { trigger, actions })
    }

    pub async fn update_trigger(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
        input: TriggerInput,
    ) -> WorkflowResult<TriggerWithActions> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let mut trigger = self.find_trigger(workflow.id, trigger_id).await?;
        self.validate_trigger(workflow.id, &input).await?;

        trigger.state_id = input.state_id;
        trigger.transition_id = input.transition_id;
        trigger.name = input.name.trim().to_string();
        trigger.trigger_type = input.trigger_type;
        trigger.time_offset_minutes = input.time_offset_minutes;
        trigger.time_field = input.time_field;
        trigger.recurring_cron = input.recurring_cron;
        trigger.conditions = input.conditions.filter(|c| !c.is_null());
        trigger.is_active = input.is_active;
        self.store.update_trigger(&trigger).await?;

        let actions = self.store.list_actions(trigger.id).await?;
        Ok(TriggerWithActions { trigger, actions })
    }

    pub async fn delete_trigger(&self, organization_id: Uuid, workflow_id: Uuid, trigger_id: Uuid) -> WorkflowResult<()> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        if !self.store.delete_trigger(workflow.id, trigger_id).await? {
            return Err(WorkflowError::NotFound("Trigger"));
        }
        Ok(())
    }

    async fn find_trigger(&self, workflow_id: Uuid, trigger_id: Uuid) -> WorkflowResult<WorkflowTrigger> {
        self.store
            .get_trigger(trigger_id)
            .await?
            .filter(|t| t.workflow_id == workflow_id)
            .ok_or(WorkflowError::NotFound("Trigger"))
    }

    async fn triggers_with_actions(&self, workflow_id: Uuid) -> WorkflowResult<Vec<TriggerWithActions>> {
        let triggers = self.store.list_triggers(workflow_id).await?;
        let mut result = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            let actions = self.store.list_actions(trigger.id).await?;
            result.push(TriggerWithActions { trigger, actions });
        }
        Ok(result)
    }

    async fn validate_trigger(&self, workflow_id: Uuid, input: &TriggerInput) -> WorkflowResult<()> {
        let time_based = input.trigger_type.is_time_based();
        let recurring = input.trigger_type == TriggerType::Recurring;
        let cron = input.recurring_cron.as_deref().map(str::trim).filter(|c| !c.is_empty());

        Validator::new()
            .required(&input.name, "name")
            .max_length(&input.name, "name", MAX_LABEL)
            .error_if(
                input.state_id.is_some() == input.transition_id.is_some(),
                "state_id",
                "exactly one of state_id or transition_id is required",
            )
            .non_negative(i64::from(input.time_offset_minutes), "time_offset_minutes")
            .error_if(
                !time_based && input.time_offset_minutes != 0,
                "time_offset_minutes",
                "only time_before and time_after triggers take an offset",
            )
            .error_if(
                !time_based && input.time_field.is_some(),
                "time_field",
                "only time_before and time_after triggers take a time field",
            )
            .error_if(recurring && cron.is_none(), "recurring_cron", "recurring triggers need a schedule")
            .error_if(
                recurring && cron.is_some_and(|c| !(5..=7).contains(&c.split_whitespace().count())),
                "recurring_cron",
                "schedule must have 5 to 7 fields",
            )
            .error_if(
                !recurring && cron.is_some(),
                "recurring_cron",
                "only recurring triggers take a schedule",
            )
            .finish()?;

        ConditionGroup::decode(input.conditions.as_ref())?;

        if let Some(state_id) = input.state_id {
            self.find_state(workflow_id, state_id).await?;
        }
        if let Some(transition_id) = input.transition_id {
            self.find_transition(workflow_id, transition_id).await?;
        }
        Ok(())
    }

    // ===== Actions =====

    pub async fn create_action(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
        input: ActionInput,
    ) -> WorkflowResult<WorkflowAction> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let trigger = self.find_trigger(workflow.id, trigger_id).await?;
        self.validate_action(organization_id, &input).await?;

        let action = WorkflowAction {
            id: Uuid::new_v4(),
            trigger_id: trigger.id,
            action_type: input.action_type,
            action_order: input.action_order,
            action_config: input.action_config,
            template_id: input.template_id,
            created_at: Utc::now(),
        };
        self.store.insert_action(&action).await?;
        Ok(action)
    }

    pub async fn list_actions(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
    ) -> WorkflowResult<Vec<WorkflowAction>> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let trigger = self.find_trigger(workflow.id, trigger_id).await?;
        self.store.list_actions(trigger.id).await
    }

    pub async fn update_action(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
        action_id: Uuid,
        input: ActionInput,
    ) -> WorkflowResult<WorkflowAction> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let trigger = self.find_trigger(workflow.id, trigger_id).await?;
        let mut action = self
            .store
            .list_actions(trigger.id)
            .await?
            .into_iter()
            .find(|a| a.id == action_id)
            .ok_or(WorkflowError::NotFound("Action"))?;
        self.validate_action(organization_id, &input).await?;

        action.action_type = input.action_type;
        action.action_order = input.action_order;
        action.action_config = input.action_config;
        action.template_id = input.template_id;
        self.store.update_action(&action).await?;
        Ok(action)
    }

    pub async fn delete_action(
        &self,
        organization_id: Uuid,
        workflow_id: Uuid,
        trigger_id: Uuid,
        action_id: Uuid,
    ) -> WorkflowResult<()> {
        let workflow = self.get_workflow(organization_id, workflow_id).await?;
        let trigger = self.find_trigger(workflow.id, trigger_id).await?;
        if !self.store.delete_action(trigger.id, action_id).await? {
            return Err(WorkflowError::NotFound("Action"));
        }
        Ok(())
    }

    async fn validate_action(&self, organization_id: Uuid, input: &ActionInput) -> WorkflowResult<()> {
        Validator::new()
            .non_negative(i64::from(input.action_order), "action_order")
            .finish()?;
        ActionConfig::validate(input.action_type, &input.action_config, input.template_id)?;

        if let Some(template_id) = input.template_id {
            self.get_template(organization_id, template_id).await?;
        }
        Ok(())
    }

    // ===== Message templates =====

    pub async fn create_template(
        &self,
        organization_id: Uuid,
        input: MessageTemplateInput,
    ) -> WorkflowResult<MessageTemplate> {
        validate_template(&input)?;

        let variables = declared_variables(&input);
        let template = MessageTemplate {
            id: Uuid::new_v4(),
            organization_id,
            name: input.name.trim().to_string(),
            channel: input.channel,
            subject: input.subject,
            body: input.body,
            variables,
            is_active: input.is_active,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.store.insert_template(&template).await?;
        Ok(template)
    }

    pub async fn get_template(&self, organization_id: Uuid, template_id: Uuid) -> WorkflowResult<MessageTemplate> {
        self.store
            .get_template(organization_id, template_id)
            .await?
            .ok_or(WorkflowError::NotFound("Message template"))
    }

    pub async fn list_templates(
        &self,
        organization_id: Uuid,
        channel: Option<MessageChannel>,
    ) -> WorkflowResult<Vec<MessageTemplate>> {
        self.store.list_templates(organization_id, channel).await
    }

    pub async fn update_template(
        &self,
        organization_id: Uuid,
        template_id: Uuid,
        input: MessageTemplateInput,
    ) -> WorkflowResult<MessageTemplate> {
        let mut template = self.get_template(organization_id, template_id).await?;
        validate_template(&input)?;

        template.variables = declared_variables(&input);
        template.name = input.name.trim().to_string();
        template.channel = input.channel;
        template.subject = input.subject;
        template.body = input.body;
        template.is_active = input.is_active;
        template.updated_at = Some(Utc::now());
        self.store.update_template(&template).await?;
        Ok(template)
    }

    /// Fails with Conflict while any action still references the template
    pub async fn delete_template(&self, organization_id: Uuid, template_id: Uuid) -> WorkflowResult<()> {
        if !self.store.delete_template(organization_id, template_id).await? {
            return Err(WorkflowError::NotFound("Message template"));
        }
        Ok(())
    }
}

fn validate_workflow(input: &WorkflowInput) -> WorkflowResult<()> {
    Validator::new()
        .required(&input.name, "name")
        .max_length(&input.name, "name", MAX_WORKFLOW_NAME)
        .max_length_opt(input.description.as_deref(), "description", MAX_DESCRIPTION)
        .error_if(
            input.entity_type.module() != input.module,
            "entity_type",
            "entity_type does not belong to the selected module",
        )
        .finish()
}

fn validate_state(input: &StateInput) -> WorkflowResult<()> {
    Validator::new()
        .required(&input.name, "name")
        .max_length(&input.name, "name", MAX_STATE_NAME)
        .max_length_opt(input.label.as_deref(), "label", MAX_LABEL)
        .max_length_opt(input.color.as_deref(), "color", MAX_COLOR)
        .finish()
}

fn validate_template(input: &MessageTemplateInput) -> WorkflowResult<()> {
    Validator::new()
        .required(&input.name, "name")
        .max_length(&input.name, "name", MAX_LABEL)
        .required(&input.body, "body")
        .max_length_opt(input.subject.as_deref(), "subject", MAX_TEMPLATE_SUBJECT)
        .finish()
}

fn declared_variables(input: &MessageTemplateInput) -> Vec<String> {
    if let Some(variables) = &input.variables {
        return variables.clone();
    }
    let mut variables = extract_variables(input.subject.as_deref().unwrap_or_default());
    for variable in extract_variables(&input.body) {
        if !variables.contains(&variable) {
            variables.push(variable);
        }
    }
    variables
}

/// Copy a workflow graph under fresh ids, remapping every internal reference.
/// The copy is inactive and not default.
pub fn plan_duplicate(source: &WorkflowDetail, name: String, now: DateTime<Utc>) -> WorkflowDetail {
    let workflow_id = Uuid::new_v4();

    let mut state_ids = HashMap::with_capacity(source.states.len());
    let states = source
        .states
        .iter()
        .map(|s| {
            let id = Uuid::new_v4();
            state_ids.insert(s.id, id);
            WorkflowState {
                id,
                workflow_id,
                created_at: now,
                ..s.clone()
            }
        })
        .collect();

    let mut transition_ids = HashMap::with_capacity(source.transitions.len());
    let transitions = source
        .transitions
        .iter()
        .filter_map(|t| {
            let copy = WorkflowTransition {
                id: Uuid::new_v4(),
                workflow_id,
                from_state_id: *state_ids.get(&t.from_state_id)?,
                to_state_id: *state_ids.get(&t.to_state_id)?,
                created_at: now,
                ..t.clone()
            };
            transition_ids.insert(t.id, copy.id);
            Some(copy)
        })
        .collect();

    let triggers = source
        .triggers
        .iter()
        .map(|entry| {
            let trigger = WorkflowTrigger {
                id: Uuid::new_v4(),
                workflow_id,
                state_id: entry.trigger.state_id.and_then(|id| state_ids.get(&id).copied()),
                transition_id: entry
                    .trigger
                    .transition_id
                    .and_then(|id| transition_ids.get(&id).copied()),
                created_at: now,
                ..entry.trigger.clone()
            };
            let actions = entry
                .actions
                .iter()
                .map(|a| WorkflowAction {
                    id: Uuid::new_v4(),
                    trigger_id: trigger.id,
                    created_at: now,
                    ..a.clone()
                })
                .collect();
            TriggerWithActions { trigger, actions }
        })
        .collect();

    WorkflowDetail {
        workflow: Workflow {
            id: workflow_id,
            name,
            is_active: false,
            is_default: false,
            created_at: now,
            updated_at: None,
            ..source.workflow.clone()
        },
        states,
        transitions,
        triggers,
    }
}
