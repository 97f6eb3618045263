// Default workflows seeded for a module on request

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use gestor_shared::{
    ActionType, EntityType, StateType, TriggerType, TriggerWithActions, Workflow, WorkflowAction,
    WorkflowDetail, WorkflowState, WorkflowTransition, WorkflowTrigger,
};
use serde_json::{json, Value};
use uuid::Uuid;

struct StateSeed {
    name: &'static str,
    label: &'static str,
    state_type: StateType,
    color: &'static str,
}

struct TransitionSeed {
    from: &'static str,
    to: &'static str,
    name: &'static str,
    requires_confirmation: bool,
}

struct TriggerSeed {
    state: &'static str,
    name: &'static str,
    trigger_type: TriggerType,
    offset_minutes: i32,
    time_field: Option<&'static str>,
    actions: Vec<(ActionType, Value)>,
}

struct WorkflowSeed {
    name: &'static str,
    description: &'static str,
    states: Vec<StateSeed>,
    transitions: Vec<TransitionSeed>,
    triggers: Vec<TriggerSeed>,
}

fn state(name: &'static str, label: &'static str, state_type: StateType, color: &'static str) -> StateSeed {
    StateSeed {
        name,
        label,
        state_type,
        color,
    }
}

fn transition(from: &'static str, to: &'static str, name: &'static str, requires_confirmation: bool) -> TransitionSeed {
    TransitionSeed {
        from,
        to,
        name,
        requires_confirmation,
    }
}

fn chat(body: &str) -> (ActionType, Value) {
    (ActionType::SendMessage, json!({ "channel": "chat", "body": body }))
}

fn email(subject: &str, body: &str) -> (ActionType, Value) {
    (
        ActionType::SendMessage,
        json!({ "channel": "email", "subject": subject, "body": body }),
    )
}

fn session_seed() -> WorkflowSeed {
    WorkflowSeed {
        name: "Atendimento padrão",
        description: "Confirmações e lembretes de sessões",
        states: vec![
            state("scheduled", "Agendada", StateType::Initial, "#3b82f6"),
            state("confirmed", "Confirmada", StateType::Intermediate, "#10b981"),
            state("completed", "Realizada", StateType::Final, "#6b7280"),
            state("cancelled", "Cancelada", StateType::Final, "#ef4444"),
            state("no_show", "Não compareceu", StateType::Final, "#f59e0b"),
        ],
        transitions: vec![
            transition("scheduled", "confirmed", "Confirmar", false),
            transition("scheduled", "cancelled", "Cancelar", true),
            transition("confirmed", "completed", "Concluir", false),
            transition("confirmed", "cancelled", "Cancelar", true),
            transition("confirmed", "no_show", "Registrar falta", true),
        ],
        triggers: vec![
            TriggerSeed {
                state: "scheduled",
                name: "Confirmação de agendamento",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![chat(
                    "Olá {{patient_name}}! Sua sessão com {{professional_name}} foi agendada para \
                     {{session_date}} às {{session_time}}.",
                )],
            },
            TriggerSeed {
                state: "scheduled",
                name: "Lembrete 24h antes",
                trigger_type: TriggerType::TimeBefore,
                offset_minutes: 24 * 60,
                time_field: Some("session_date"),
                actions: vec![chat(
                    "Olá {{patient_name}}, lembramos da sua sessão amanhã às {{session_time}} \
                     na {{clinic_name}}.",
                )],
            },
            TriggerSeed {
                state: "confirmed",
                name: "Lembrete 2h antes",
                trigger_type: TriggerType::TimeBefore,
                offset_minutes: 120,
                time_field: Some("session_date"),
                actions: vec![chat(
                    "{{patient_name}}, sua sessão com {{professional_name}} começa às {{session_time}}.",
                )],
            },
            TriggerSeed {
                state: "cancelled",
                name: "Aviso de cancelamento",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![chat(
                    "Olá {{patient_name}}, sua sessão de {{session_date}} às {{session_time}} foi cancelada.",
                )],
            },
        ],
    }
}

fn budget_seed() -> WorkflowSeed {
    WorkflowSeed {
        name: "Orçamento padrão",
        description: "Envio e acompanhamento de orçamentos",
        states: vec![
            state("draft", "Rascunho", StateType::Initial, "#6b7280"),
            state("sent", "Enviado", StateType::Intermediate, "#3b82f6"),
            state("approved", "Aprovado", StateType::Final, "#10b981"),
            state("rejected", "Recusado", StateType::Final, "#ef4444"),
        ],
        transitions: vec![
            transition("draft", "sent", "Enviar", false),
            transition("sent", "approved", "Aprovar", true),
            transition("sent", "rejected", "Recusar", true),
        ],
        triggers: vec![
            TriggerSeed {
                state: "sent",
                name: "Envio do orçamento",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![email(
                    "Orçamento {{budget_number}} - {{company_name}}",
                    "Olá {{client_name}}, segue o orçamento {{budget_number}} no valor de \
                     R$ {{budget_total}}, válido até {{valid_until}}.",
                )],
            },
            TriggerSeed {
                state: "sent",
                name: "Follow-up em 3 dias",
                trigger_type: TriggerType::TimeAfter,
                offset_minutes: 3 * 24 * 60,
                time_field: None,
                actions: vec![chat(
                    "Olá {{client_name}}, conseguiu avaliar o orçamento {{budget_number}}?",
                )],
            },
            TriggerSeed {
                state: "approved",
                name: "Planejar início da obra",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![(
                    ActionType::CreateTask,
                    json!({
                        "title": "Agendar início com {{client_name}}",
                        "description": "Orçamento {{budget_number}} aprovado",
                        "due_in_minutes": 2 * 24 * 60
                    }),
                )],
            },
        ],
    }
}

fn project_seed() -> WorkflowSeed {
    WorkflowSeed {
        name: "Obra padrão",
        description: "Comunicação com o cliente durante a obra",
        states: vec![
            state("planning", "Planejamento", StateType::Initial, "#6b7280"),
            state("in_progress", "Em andamento", StateType::Intermediate, "#3b82f6"),
            state("on_hold", "Pausada", StateType::Intermediate, "#f59e0b"),
            state("completed", "Concluída", StateType::Final, "#10b981"),
        ],
        transitions: vec![
            transition("planning", "in_progress", "Iniciar", false),
            transition("in_progress", "on_hold", "Pausar", true),
            transition("on_hold", "in_progress", "Retomar", false),
            transition("in_progress", "completed", "Concluir", true),
        ],
        triggers: vec![
            TriggerSeed {
                state: "in_progress",
                name: "Início da obra",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![chat(
                    "Olá {{client_name}}, a obra {{project_name}} começou! Previsão de término: {{end_date}}.",
                )],
            },
            TriggerSeed {
                state: "completed",
                name: "Entrega da obra",
                trigger_type: TriggerType::OnEnter,
                offset_minutes: 0,
                time_field: None,
                actions: vec![
                    chat("{{client_name}}, a obra {{project_name}} foi concluída. Obrigado pela confiança!"),
                    (
                        ActionType::UpdateField,
                        json!({ "field": "satisfaction_survey_pending", "value": true }),
                    ),
                ],
            },
        ],
    }
}

fn seed_for(entity_type: EntityType) -> WorkflowSeed {
    match entity_type {
        EntityType::Session => session_seed(),
        EntityType::Budget => budget_seed(),
        EntityType::Project => project_seed(),
    }
}

/// Build the default workflow graph for an entity type. The result is not yet the default.
pub fn default_workflow(organization_id: Uuid, entity_type: EntityType, now: DateTime<Utc>) -> WorkflowDetail {
    let seed = seed_for(entity_type);
    let workflow_id = Uuid::new_v4();

    let states: Vec<WorkflowState> = seed
        .states
        .iter()
        .enumerate()
        .map(|(position, s)| WorkflowState {
            id: Uuid::new_v4(),
            workflow_id,
            name: s.name.to_string(),
            label: Some(s.label.to_string()),
            state_type: s.state_type,
            position: position as i32,
            color: Some(s.color.to_string()),
            created_at: now,
        })
        .collect();
    let state_ids: HashMap<&str, Uuid> = states.iter().map(|s| (s.name.as_str(), s.id)).collect();

    let transitions = seed
        .transitions
        .iter()
        .filter_map(|t| {
            Some(WorkflowTransition {
                id: Uuid::new_v4(),
                workflow_id,
                from_state_id: *state_ids.get(t.from)?,
                to_state_id: *state_ids.get(t.to)?,
                name: t.name.to_string(),
                requires_confirmation: t.requires_confirmation,
                created_at: now,
            })
        })
        .collect();

    let triggers = seed
        .triggers
        .into_iter()
        .filter_map(|t| {
            let trigger = WorkflowTrigger {
                id: Uuid::new_v4(),
                workflow_id,
                state_id: Some(*state_ids.get(t.state)?),
                transition_id: None,
                name: t.name.to_string(),
                trigger_type: t.trigger_type,
                time_offset_minutes: t.offset_minutes,
                time_field: t.time_field.map(str::to_string),
                recurring_cron: None,
                conditions: None,
                is_active: true,
                created_at: now,
            };
            let actions = t
                .actions
                .into_iter()
                .enumerate()
                .map(|(order, (action_type, action_config))| WorkflowAction {
                    id: Uuid::new_v4(),
                    trigger_id: trigger.id,
                    action_type,
                    action_order: order as i32,
                    action_config,
                    template_id: None,
                    created_at: now,
                })
                .collect();
            Some(TriggerWithActions { trigger, actions })
        })
        .collect();

    WorkflowDetail {
        workflow: Workflow {
            id: workflow_id,
            organization_id,
            name: seed.name.to_string(),
            description: Some(seed.description.to_string()),
            module: entity_type.module(),
            entity_type,
            is_active: true,
            is_default: false,
            created_at: now,
            updated_at: None,
        },
        states,
        transitions,
        triggers,
    }
}
