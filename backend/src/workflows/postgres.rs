// PostgreSQL implementation of the workflow store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gestor_shared::{
    EntityType, JobStatus, MessageChannel, MessageTemplate, ScheduledJob, Workflow, WorkflowAction,
    WorkflowDetail, WorkflowExecutionLog, WorkflowState, WorkflowTransition, WorkflowTrigger,
};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::error::WorkflowError;
use super::store::{JobFilter, LogFilter, RecoveredJobs, StoreResult, WorkflowFilter, WorkflowStore};
use crate::pagination::PaginationParams;

const WORKFLOW_COLUMNS: &str = "id, organization_id, name, description, module, entity_type, \
    is_active, is_default, created_at, updated_at";
const STATE_COLUMNS: &str = "id, workflow_id, name, label, state_type, position, color, created_at";
const TRANSITION_COLUMNS: &str =
    "id, workflow_id, from_state_id, to_state_id, name, requires_confirmation, created_at";
const TRIGGER_COLUMNS: &str = "id, workflow_id, state_id, transition_id, name, trigger_type, \
    time_offset_minutes, time_field, recurring_cron, conditions, is_active, created_at";
const ACTION_COLUMNS: &str =
    "id, trigger_id, action_type, action_order, action_config, template_id, created_at";
const TEMPLATE_COLUMNS: &str = "id, organization_id, name, channel, subject, body, variables, \
    is_active, created_at, updated_at";
const JOB_COLUMNS: &str = "id, organization_id, trigger_id, entity_type, entity_id, scheduled_for, \
    status, attempts, last_error, claimed_at, completed_at, created_at";
const LOG_COLUMNS: &str = "id, organization_id, workflow_id, trigger_id, action_id, job_id, \
    entity_type, entity_id, event, from_state, to_state, details, created_at";

pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map constraint violations onto domain conflicts
fn map_write_error(err: sqlx::Error, what: &str) -> WorkflowError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return WorkflowError::Conflict(format!("{} already exists", what));
        }
        if db_err.is_foreign_key_violation() {
            return WorkflowError::Conflict(format!("{} is referenced by other records", what));
        }
    }
    WorkflowError::Database(err)
}

async fn insert_workflow_row(conn: &mut PgConnection, w: &Workflow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflows (id, organization_id, name, description, module, entity_type, \
         is_active, is_default, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(w.id)
    .bind(w.organization_id)
    .bind(&w.name)
    .bind(&w.description)
    .bind(w.module)
    .bind(w.entity_type)
    .bind(w.is_active)
    .bind(w.is_default)
    .bind(w.created_at)
    .bind(w.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_state_row(conn: &mut PgConnection, s: &WorkflowState) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_states (id, workflow_id, name, label, state_type, position, color, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(s.id)
    .bind(s.workflow_id)
    .bind(&s.name)
    .bind(&s.label)
    .bind(s.state_type)
    .bind(s.position)
    .bind(&s.color)
    .bind(s.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_transition_row(conn: &mut PgConnection, t: &WorkflowTransition) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_transitions (id, workflow_id, from_state_id, to_state_id, name, \
         requires_confirmation, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(t.id)
    .bind(t.workflow_id)
    .bind(t.from_state_id)
    .bind(t.to_state_id)
    .bind(&t.name)
    .bind(t.requires_confirmation)
    .bind(t.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_trigger_row(conn: &mut PgConnection, t: &WorkflowTrigger) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_triggers (id, workflow_id, state_id, transition_id, name, trigger_type, \
         time_offset_minutes, time_field, recurring_cron, conditions, is_active, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(t.id)
    .bind(t.workflow_id)
    .bind(t.state_id)
    .bind(t.transition_id)
    .bind(&t.name)
    .bind(t.trigger_type)
    .bind(t.time_offset_minutes)
    .bind(&t.time_field)
    .bind(&t.recurring_cron)
    .bind(&t.conditions)
    .bind(t.is_active)
    .bind(t.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_action_row(conn: &mut PgConnection, a: &WorkflowAction) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO workflow_actions (id, trigger_id, action_type, action_order, action_config, \
         template_id, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(a.id)
    .bind(a.trigger_id)
    .bind(a.action_type)
    .bind(a.action_order)
    .bind(&a.action_config)
    .bind(a.template_id)
    .bind(a.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

fn push_job_filter(qb: &mut QueryBuilder<'_, Postgres>, organization_id: Uuid, filter: &JobFilter) {
    qb.push(" WHERE organization_id = ").push_bind(organization_id);
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(entity_type) = filter.entity_type {
        qb.push(" AND entity_type = ").push_bind(entity_type);
    }
    if let Some(entity_id) = filter.entity_id {
        qb.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(trigger_id) = filter.trigger_id {
        qb.push(" AND trigger_id = ").push_bind(trigger_id);
    }
}

fn push_log_filter(qb: &mut QueryBuilder<'_, Postgres>, organization_id: Uuid, filter: &LogFilter) {
    qb.push(" WHERE organization_id = ").push_bind(organization_id);
    if let Some(workflow_id) = filter.workflow_id {
        qb.push(" AND workflow_id = ").push_bind(workflow_id);
    }
    if let Some(entity_type) = filter.entity_type {
        qb.push(" AND entity_type = ").push_bind(entity_type);
    }
    if let Some(entity_id) = filter.entity_id {
        qb.push(" AND entity_id = ").push_bind(entity_id);
    }
    if let Some(event) = filter.event {
        qb.push(" AND event = ").push_bind(event);
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ----- Workflows -----

    async fn insert_workflow(&self, workflow: &Workflow) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_workflow_row(&mut *conn, workflow)
            .await
            .map_err(|e| map_write_error(e, "Default workflow"))
    }

    async fn get_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<Option<Workflow>> {
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1 AND organization_id = $2");
        let workflow = sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(workflow)
    }

    async fn list_workflows(&self, organization_id: Uuid, filter: &WorkflowFilter) -> StoreResult<Vec<Workflow>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {WORKFLOW_COLUMNS} FROM workflows"));
        qb.push(" WHERE organization_id = ").push_bind(organization_id);
        if let Some(module) = filter.module {
            qb.push(" AND module = ").push_bind(module);
        }
        if let Some(entity_type) = filter.entity_type {
            qb.push(" AND entity_type = ").push_bind(entity_type);
        }
        if let Some(is_active) = filter.is_active {
            qb.push(" AND is_active = ").push_bind(is_active);
        }
        qb.push(" ORDER BY module, entity_type, is_default DESC, name");

        let workflows = qb.build_query_as::<Workflow>().fetch_all(&self.pool).await?;
        Ok(workflows)
    }

    async fn update_workflow(&self, w: &Workflow) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workflows SET name = $3, description = $4, module = $5, entity_type = $6, \
             is_active = $7, updated_at = $8 WHERE id = $1 AND organization_id = $2",
        )
        .bind(w.id)
        .bind(w.organization_id)
        .bind(&w.name)
        .bind(&w.description)
        .bind(w.module)
        .bind(w.entity_type)
        .bind(w.is_active)
        .bind(w.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Default workflow"))?;
        Ok(())
    }

    async fn delete_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1 AND organization_id = $2")
            .bind(workflow_id)
            .bind(organization_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_default_workflow(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
    ) -> StoreResult<Option<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows \
             WHERE organization_id = $1 AND module = $2 AND entity_type = $3 AND is_default"
        );
        let workflow = sqlx::query_as::<_, Workflow>(&sql)
            .bind(organization_id)
            .bind(entity_type.module())
            .bind(entity_type)
            .fetch_optional(&self.pool)
            .await?;
        Ok(workflow)
    }

    async fn set_default_workflow(&self, organization_id: Uuid, workflow_id: Uuid) -> StoreResult<Option<Workflow>> {
        let mut tx = self.pool.begin().await?;

        // module and entity_type never change, so the key can be read before locking
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = $1 AND organization_id = $2");
        let Some(target) = sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .bind(organization_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        // Every row of the key is locked in id order, target included
        let locked: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM workflows WHERE organization_id = $1 AND module = $2 AND entity_type = $3 \
             ORDER BY id FOR UPDATE",
        )
        .bind(organization_id)
        .bind(target.module)
        .bind(target.entity_type)
        .fetch_all(&mut *tx)
        .await?;
        if !locked.contains(&workflow_id) {
            return Ok(None);
        }

        sqlx::query(
            "UPDATE workflows SET is_default = FALSE, updated_at = NOW() \
             WHERE organization_id = $1 AND module = $2 AND entity_type = $3 AND is_default AND id <> $4",
        )
        .bind(organization_id)
        .bind(target.module)
        .bind(target.entity_type)
        .bind(workflow_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!(
            "UPDATE workflows SET is_default = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {WORKFLOW_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Workflow>(&sql)
            .bind(workflow_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_write_error(e, "Default workflow"))?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn insert_workflow_detail(&self, detail: &WorkflowDetail) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        insert_workflow_row(&mut *tx, &detail.workflow)
            .await
            .map_err(|e| map_write_error(e, "Default workflow"))?;
        for state in &detail.states {
            insert_state_row(&mut *tx, state)
                .await
                .map_err(|e| map_write_error(e, "State"))?;
        }
        for transition in &detail.transitions {
            insert_transition_row(&mut *tx, transition).await?;
        }
        for entry in &detail.triggers {
            insert_trigger_row(&mut *tx, &entry.trigger).await?;
            for action in &entry.actions {
                insert_action_row(&mut *tx, action)
                    .await
                    .map_err(|e| map_write_error(e, "Action"))?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    // ----- States -----

    async fn insert_state(&self, state: &WorkflowState) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_state_row(&mut *conn, state)
            .await
            .map_err(|e| map_write_error(e, "State name"))
    }

    async fn list_states(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowState>> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM workflow_states WHERE workflow_id = $1 ORDER BY position, created_at"
        );
        let states = sqlx::query_as::<_, WorkflowState>(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(states)
    }

    async fn find_state_by_name(&self, workflow_id: Uuid, name: &str) -> StoreResult<Option<WorkflowState>> {
        let sql = format!("SELECT {STATE_COLUMNS} FROM workflow_states WHERE workflow_id = $1 AND name = $2");
        let state = sqlx::query_as::<_, WorkflowState>(&sql)
            .bind(workflow_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(state)
    }

    async fn update_state(&self, s: &WorkflowState) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workflow_states SET name = $3, label = $4, state_type = $5, position = $6, color = $7 \
             WHERE id = $1 AND workflow_id = $2",
        )
        .bind(s.id)
        .bind(s.workflow_id)
        .bind(&s.name)
        .bind(&s.label)
        .bind(s.state_type)
        .bind(s.position)
        .bind(&s.color)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "State name"))?;
        Ok(())
    }

    async fn delete_state(&self, workflow_id: Uuid, state_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflow_states WHERE id = $1 AND workflow_id = $2")
            .bind(state_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ----- Transitions -----

    async fn insert_transition(&self, transition: &WorkflowTransition) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_transition_row(&mut *conn, transition).await?;
        Ok(())
    }

    async fn list_transitions(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowTransition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM workflow_transitions WHERE workflow_id = $1 ORDER BY created_at"
        );
        let transitions = sqlx::query_as::<_, WorkflowTransition>(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(transitions)
    }

    async fn update_transition(&self, t: &WorkflowTransition) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workflow_transitions SET from_state_id = $3, to_state_id = $4, name = $5, \
             requires_confirmation = $6 WHERE id = $1 AND workflow_id = $2",
        )
        .bind(t.id)
        .bind(t.workflow_id)
        .bind(t.from_state_id)
        .bind(t.to_state_id)
        .bind(&t.name)
        .bind(t.requires_confirmation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_transition(&self, workflow_id: Uuid, transition_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflow_transitions WHERE id = $1 AND workflow_id = $2")
            .bind(transition_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ----- Triggers -----

    async fn insert_trigger(&self, trigger: &WorkflowTrigger) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_trigger_row(&mut *conn, trigger).await?;
        Ok(())
    }

    async fn get_trigger(&self, trigger_id: Uuid) -> StoreResult<Option<WorkflowTrigger>> {
        let sql = format!("SELECT {TRIGGER_COLUMNS} FROM workflow_triggers WHERE id = $1");
        let trigger = sqlx::query_as::<_, WorkflowTrigger>(&sql)
            .bind(trigger_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(trigger)
    }

    async fn list_triggers(&self, workflow_id: Uuid) -> StoreResult<Vec<WorkflowTrigger>> {
        let sql = format!(
            "SELECT {TRIGGER_COLUMNS} FROM workflow_triggers WHERE workflow_id = $1 ORDER BY created_at"
        );
        let triggers = sqlx::query_as::<_, WorkflowTrigger>(&sql)
            .bind(workflow_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(triggers)
    }

    async fn list_state_triggers(&self, state_id: Uuid) -> StoreResult<Vec<WorkflowTrigger>> {
        let sql = format!(
            "SELECT {TRIGGER_COLUMNS} FROM workflow_triggers WHERE state_id = $1 ORDER BY created_at, id"
        );
        let triggers = sqlx::query_as::<_, WorkflowTrigger>(&sql)
            .bind(state_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(triggers)
    }

    async fn update_trigger(&self, t: &WorkflowTrigger) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workflow_triggers SET state_id = $3, transition_id = $4, name = $5, trigger_type = $6, \
             time_offset_minutes = $7, time_field = $8, recurring_cron = $9, conditions = $10, is_active = $11 \
             WHERE id = $1 AND workflow_id = $2",
        )
        .bind(t.id)
        .bind(t.workflow_id)
        .bind(t.state_id)
        .bind(t.transition_id)
        .bind(&t.name)
        .bind(t.trigger_type)
        .bind(t.time_offset_minutes)
        .bind(&t.time_field)
        .bind(&t.recurring_cron)
        .bind(&t.conditions)
        .bind(t.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_trigger(&self, workflow_id: Uuid, trigger_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflow_triggers WHERE id = $1 AND workflow_id = $2")
            .bind(trigger_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ----- Actions -----

    async fn insert_action(&self, action: &WorkflowAction) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_action_row(&mut *conn, action)
            .await
            .map_err(|e| map_write_error(e, "Action"))
    }

    async fn list_actions(&self, trigger_id: Uuid) -> StoreResult<Vec<WorkflowAction>> {
        let sql = format!(
            "SELECT {ACTION_COLUMNS} FROM workflow_actions WHERE trigger_id = $1 \
             ORDER BY action_order, created_at, id"
        );
        let actions = sqlx::query_as::<_, WorkflowAction>(&sql)
            .bind(trigger_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(actions)
    }

    async fn update_action(&self, a: &WorkflowAction) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workflow_actions SET action_type = $3, action_order = $4, action_config = $5, \
             template_id = $6 WHERE id = $1 AND trigger_id = $2",
        )
        .bind(a.id)
        .bind(a.trigger_id)
        .bind(a.action_type)
        .bind(a.action_order)
        .bind(&a.action_config)
        .bind(a.template_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "Action"))?;
        Ok(())
    }

    async fn delete_action(&self, trigger_id: Uuid, action_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM workflow_actions WHERE id = $1 AND trigger_id = $2")
            .bind(action_id)
            .bind(trigger_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ----- Message templates -----

    async fn insert_template(&self, t: &MessageTemplate) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO message_templates (id, organization_id, name, channel, subject, body, variables, \
             is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(t.id)
        .bind(t.organization_id)
        .bind(&t.name)
        .bind(t.channel)
        .bind(&t.subject)
        .bind(&t.body)
        .bind(&t.variables)
        .bind(t.is_active)
        .bind(t.created_at)
        .bind(t.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_template(&self, organization_id: Uuid, template_id: Uuid) -> StoreResult<Option<MessageTemplate>> {
        let sql = format!(
            "SELECT {TEMPLATE_COLUMNS} FROM message_templates WHERE id = $1 AND organization_id = $2"
        );
        let template = sqlx::query_as::<_, MessageTemplate>(&sql)
            .bind(template_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(template)
    }

    async fn list_templates(
        &self,
        organization_id: Uuid,
        channel: Option<MessageChannel>,
    ) -> StoreResult<Vec<MessageTemplate>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {TEMPLATE_COLUMNS} FROM message_templates"));
        qb.push(" WHERE organization_id = ").push_bind(organization_id);
        if let Some(channel) = channel {
            qb.push(" AND channel = ").push_bind(channel);
        }
        qb.push(" ORDER BY name");

        let templates = qb.build_query_as::<MessageTemplate>().fetch_all(&self.pool).await?;
        Ok(templates)
    }

    async fn update_template(&self, t: &MessageTemplate) -> StoreResult<()> {
        sqlx::query(
            "UPDATE message_templates SET name = $3, channel = $4, subject = $5, body = $6, variables = $7, \
             is_active = $8, updated_at = $9 WHERE id = $1 AND organization_id = $2",
        )
        .bind(t.id)
        .bind(t.organization_id)
        .bind(&t.name)
        .bind(t.channel)
        .bind(&t.subject)
        .bind(&t.body)
        .bind(&t.variables)
        .bind(t.is_active)
        .bind(t.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_template(&self, organization_id: Uuid, template_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM message_templates WHERE id = $1 AND organization_id = $2")
            .bind(template_id)
            .bind(organization_id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_write_error(e, "Message template"))?;
        Ok(result.rows_affected() > 0)
    }

    // ----- Scheduled jobs -----

    async fn insert_job(&self, job: &ScheduledJob) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_jobs (id, organization_id, trigger_id, entity_type, entity_id, \
             scheduled_for, status, attempts, last_error, claimed_at, completed_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(job.id)
        .bind(job.organization_id)
        .bind(job.trigger_id)
        .bind(job.entity_type)
        .bind(job.entity_id)
        .bind(job.scheduled_for)
        .bind(job.status)
        .bind(job.attempts)
        .bind(&job.last_error)
        .bind(job.claimed_at)
        .bind(job.completed_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, organization_id: Uuid, job_id: Uuid) -> StoreResult<Option<ScheduledJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE id = $1 AND organization_id = $2");
        let job = sqlx::query_as::<_, ScheduledJob>(&sql)
            .bind(job_id)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn list_jobs(
        &self,
        organization_id: Uuid,
        filter: &JobFilter,
        page: &PaginationParams,
    ) -> StoreResult<(Vec<ScheduledJob>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM scheduled_jobs");
        push_job_filter(&mut count, organization_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs"));
        push_job_filter(&mut qb, organization_id, filter);
        qb.push(" ORDER BY scheduled_for DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let jobs = qb.build_query_as::<ScheduledJob>().fetch_all(&self.pool).await?;

        Ok((jobs, total))
    }

    async fn cancel_pending_jobs(
        &self,
        organization_id: Uuid,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE scheduled_jobs SET status = $3 \
             WHERE entity_type = $1 AND entity_id = $2 AND status = $4 AND organization_id = $5",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(JobStatus::Cancelled)
        .bind(JobStatus::Pending)
        .bind(organization_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cancel_job(&self, organization_id: Uuid, job_id: Uuid) -> StoreResult<Option<ScheduledJob>> {
        let sql = format!(
            "UPDATE scheduled_jobs SET status = $3 \
             WHERE id = $1 AND organization_id = $2 AND status = $4 RETURNING {JOB_COLUMNS}"
        );
        let job = sqlx::query_as::<_, ScheduledJob>(&sql)
            .bind(job_id)
            .bind(organization_id)
            .bind(JobStatus::Cancelled)
            .bind(JobStatus::Pending)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn claim_due_jobs(
        &self,
        status: JobStatus,
        organization_id: Option<Uuid>,
        now: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ScheduledJob>> {
        let sql = format!(
            "UPDATE scheduled_jobs SET status = $1, claimed_at = $2, attempts = attempts + 1 \
             WHERE id IN ( \
                 SELECT id FROM scheduled_jobs \
                 WHERE status = $3 AND scheduled_for <= $2 \
                   AND ($5::uuid IS NULL OR organization_id = $5) \
                 ORDER BY scheduled_for \
                 LIMIT $4 \
                 FOR UPDATE SKIP LOCKED \
             ) RETURNING {JOB_COLUMNS}"
        );
        let mut jobs = sqlx::query_as::<_, ScheduledJob>(&sql)
            .bind(JobStatus::InFlight)
            .bind(now)
            .bind(status)
            .bind(limit)
            .bind(organization_id)
            .fetch_all(&self.pool)
            .await?;
        jobs.sort_by_key(|j| j.scheduled_for);
        Ok(jobs)
    }

    async fn finish_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE scheduled_jobs SET status = $2, last_error = COALESCE($3, last_error), completed_at = $4 \
             WHERE id = $1 AND status = $5",
        )
        .bind(job_id)
        .bind(status)
        .bind(last_error)
        .bind(now)
        .bind(JobStatus::InFlight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn requeue_job(&self, job_id: Uuid, last_error: &str) -> StoreResult<()> {
        sqlx::query(
            "UPDATE scheduled_jobs SET status = $2, last_error = $3, claimed_at = NULL \
             WHERE id = $1 AND status = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Pending)
        .bind(last_error)
        .bind(JobStatus::InFlight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recover_stale_jobs(
        &self,
        claimed_before: DateTime<Utc>,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<RecoveredJobs> {
        let mut tx = self.pool.begin().await?;

        let failed = sqlx::query(
            "UPDATE scheduled_jobs SET status = $1, completed_at = $2, \
             last_error = 'claim expired before the job was settled' \
             WHERE status = $3 AND claimed_at < $4 AND attempts >= $5",
        )
        .bind(JobStatus::Failed)
        .bind(now)
        .bind(JobStatus::InFlight)
        .bind(claimed_before)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let requeued = sqlx::query(
            "UPDATE scheduled_jobs SET status = $1, claimed_at = NULL, \
             last_error = 'claim expired before the job was settled' \
             WHERE status = $2 AND claimed_at < $3",
        )
        .bind(JobStatus::Pending)
        .bind(JobStatus::InFlight)
        .bind(claimed_before)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(RecoveredJobs { requeued, failed })
    }

    // ----- Execution log -----

    async fn append_log(&self, entry: &WorkflowExecutionLog) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO workflow_execution_logs (id, organization_id, workflow_id, trigger_id, action_id, \
             job_id, entity_type, entity_id, event, from_state, to_state, details, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(entry.id)
        .bind(entry.organization_id)
        .bind(entry.workflow_id)
        .bind(entry.trigger_id)
        .bind(entry.action_id)
        .bind(entry.job_id)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.event)
        .bind(&entry.from_state)
        .bind(&entry.to_state)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(
        &self,
        organization_id: Uuid,
        filter: &LogFilter,
        page: &PaginationParams,
    ) -> StoreResult<(Vec<WorkflowExecutionLog>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM workflow_execution_logs");
        push_log_filter(&mut count, organization_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {LOG_COLUMNS} FROM workflow_execution_logs"));
        push_log_filter(&mut qb, organization_id, filter);
        qb.push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());
        let logs = qb
            .build_query_as::<WorkflowExecutionLog>()
            .fetch_all(&self.pool)
            .await?;

        Ok((logs, total))
    }
}
