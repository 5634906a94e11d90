//! # Applying a Plan
//!
//! Writes a [`SyncPlan`] to the database in five steps plus a final check,
//! each inside its own transaction:
//!
//! 1. create firms, link parents of the new firms, create offices
//! 2. update firms and offices
//! 3. deactivate firms absent upstream
//! 4. reactivate firms and offices that reappeared
//! 5. remove offices absent upstream
//! 6. deactivate any active firm left without an active office
//!
//! The first failure rolls back its own step and stops the run. It surfaces
//! as [`SyncError::ReconciliationStep`], whose message
//! `"Failed to <action> <kind> <CODE>: <reason>"` lands in the result errors. Steps that
//! already committed stay committed. Counts and warnings of a step only reach
//! the result once the step has committed.

use core_library::models::{Firm, Office};
use core_library::repositories::{
    AssignmentRepository, FirmRepository, OfficeRepository, SqliteAssignmentRepository,
    SqliteFirmRepository, SqliteOfficeRepository, SqliteSyncMetadataRepository,
    SyncMetadataRepository,
};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::diff::{LocalState, SyncPlan};
use crate::result::{SyncCounts, SyncResultBuilder};
use crate::{Result, SyncError};

/// Repository set used by the engine
#[derive(Clone)]
pub struct Repositories {
    pub firms: Arc<dyn FirmRepository>,
    pub offices: Arc<dyn OfficeRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub metadata: Arc<dyn SyncMetadataRepository>,
}

impl Repositories {
    pub fn sqlite() -> Self {
        Self {
            firms: Arc::new(SqliteFirmRepository::new()),
            offices: Arc::new(SqliteOfficeRepository::new()),
            assignments: Arc::new(SqliteAssignmentRepository::new()),
            metadata: Arc::new(SqliteSyncMetadataRepository::new()),
        }
    }
}

impl Default for Repositories {
    fn default() -> Self {
        Self::sqlite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Create,
    Update,
    Deactivate,
    Reactivate,
    RemoveOffices,
    Verify,
}

impl Step {
    const ALL: [Step; 6] = [
        Step::Create,
        Step::Update,
        Step::Deactivate,
        Step::Reactivate,
        Step::RemoveOffices,
        Step::Verify,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Update => "update",
            Step::Deactivate => "deactivate",
            Step::Reactivate => "reactivate",
            Step::RemoveOffices => "remove_offices",
            Step::Verify => "verify",
        }
    }

    fn error(self, message: String) -> SyncError {
        SyncError::ReconciliationStep {
            step: self.as_str().to_string(),
            message,
        }
    }

    /// `Failed to <action> <kind> <CODE>: <reason>`
    fn failure(self, action: &str, kind: &str, code: &str, reason: impl fmt::Display) -> SyncError {
        self.error(format!("Failed to {} {} {}: {}", action, kind, code, reason))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a committed step contributes to the result
#[derive(Debug, Default)]
struct StepOutcome {
    counts: SyncCounts,
    warnings: Vec<String>,
}

pub struct Applier<'a> {
    pool: &'a SqlitePool,
    repos: &'a Repositories,
    /// Unix seconds stamped on every write
    now: i64,
}

impl<'a> Applier<'a> {
    pub fn new(pool: &'a SqlitePool, repos: &'a Repositories, now: i64) -> Self {
        Self { pool, repos, now }
    }

    /// Apply `plan` on top of `local`, recording into `result`.
    pub async fn apply(&self, plan: &SyncPlan, local: &LocalState, result: &mut SyncResultBuilder) {
        let mut firm_ids: HashMap<String, String> = local
            .firms
            .iter()
            .map(|f| (f.code.clone(), f.id.clone()))
            .collect();

        for step in Step::ALL {
            match self.run_step(step, plan, &mut firm_ids).await {
                Ok(outcome) => {
                    debug!(step = %step, changes = outcome.counts.total(), "Step committed");
                    result.counts_mut().merge(&outcome.counts);
                    result.extend_warnings(outcome.warnings);
                }
                Err(e) => {
                    error!(step = %step, error = %e, "Step failed; skipping remaining steps");
                    result.error(e.to_string());
                    return;
                }
            }
        }

        info!(changes = result.counts().total(), "Plan applied");
    }

    async fn run_step(
        &self,
        step: Step,
        plan: &SyncPlan,
        firm_ids: &mut HashMap<String, String>,
    ) -> Result<StepOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| step.error(format!("Failed to begin {} step: {}", step, e)))?;
        let mut outcome = StepOutcome::default();

        let applied = match step {
            Step::Create => self.create(&mut tx, plan, firm_ids, &mut outcome).await,
            Step::Update => self.update(&mut tx, plan, firm_ids, &mut outcome).await,
            Step::Deactivate => self.deactivate(&mut tx, plan, &mut outcome).await,
            Step::Reactivate => self.reactivate(&mut tx, plan, &mut outcome).await,
            Step::RemoveOffices => self.remove_offices(&mut tx, plan, &mut outcome).await,
            Step::Verify => self.verify(&mut tx, &mut outcome).await,
        };

        match applied {
            Ok(()) => {
                tx.commit()
                    .await
                    .map_err(|e| step.error(format!("Failed to commit {} step: {}", step, e)))?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(step = %step, error = %e, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn create(
        &self,
        conn: &mut SqliteConnection,
        plan: &SyncPlan,
        firm_ids: &mut HashMap<String, String>,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        for create in &plan.firms_to_create {
            let firm = Firm::new(
                create.code.clone(),
                create.name.clone(),
                create.firm_type,
                self.now,
            );
            self.repos
                .firms
                .insert(&mut *conn, &firm)
                .await
                .map_err(|e| Step::Create.failure("create", "firm", &create.code, e))?;

            debug!(code = %firm.code, firm_type = %firm.firm_type, "Created firm");
            firm_ids.insert(firm.code.clone(), firm.id);
            outcome.counts.firms_created += 1;
        }

        for create in &plan.firms_to_create {
            let Some(parent_code) = create.parent_code.as_deref() else {
                continue;
            };
            let firm_id = lookup(firm_ids, &create.code)
                .map_err(|e| Step::Create.failure("set parent of", "firm", &create.code, e))?;
            let parent_id = lookup(firm_ids, parent_code)
                .map_err(|e| Step::Create.failure("set parent of", "firm", &create.code, e))?;

            self.repos
                .firms
                .set_parent(&mut *conn, &firm_id, Some(&parent_id), self.now)
                .await
                .map_err(|e| Step::Create.failure("set parent of", "firm", &create.code, e))?;
        }

        for create in &plan.offices_to_create {
            let firm_id = lookup(firm_ids, &create.firm_code)
                .map_err(|e| Step::Create.failure("create", "office", &create.code, e))?;
            let office = Office::new(
                create.code.clone(),
                firm_id,
                create.address.clone(),
                self.now,
            );
            self.repos
                .offices
                .insert(&mut *conn, &office)
                .await
                .map_err(|e| Step::Create.failure("create", "office", &create.code, e))?;

            debug!(code = %office.code, firm = %create.firm_code, "Created office");
            outcome.counts.offices_created += 1;
        }

        Ok(())
    }

    async fn update(
        &self,
        conn: &mut SqliteConnection,
        plan: &SyncPlan,
        firm_ids: &HashMap<String, String>,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        for update in &plan.firms_to_update {
            let code = &update.current.code;
            let parent_id = match update.parent_code.as_deref() {
                Some(parent_code) => Some(
                    lookup(firm_ids, parent_code)
                        .map_err(|e| Step::Update.failure("update", "firm", code, e))?,
                ),
                None => None,
            };

            let mut firm = update.current.clone();
            firm.name = update.name.clone();
            firm.parent_firm_id = parent_id;
            firm.updated_at = self.now;

            self.repos
                .firms
                .update(&mut *conn, &firm)
                .await
                .map_err(|e| Step::Update.failure("update", "firm", code, e))?;

            debug!(code = %code, "Updated firm");
            outcome.counts.firms_updated += 1;
        }

        for update in &plan.offices_to_update {
            let code = &update.current.code;
            let firm_id = lookup(firm_ids, &update.firm_code)
                .map_err(|e| Step::Update.failure("update", "office", code, e))?;

            if update.firm_switched {
                let removed = self
                    .repos
                    .assignments
                    .delete_by_office(&mut *conn, &update.current.id)
                    .await
                    .map_err(|e| Step::Update.failure("update", "office", code, e))?;
                if removed > 0 {
                    warn!(code = %code, removed, "Office switched firms; assignments cleared");
                    outcome.warnings.push(format!(
                        "Office {} switched firms - removed {} user association(s)",
                        code, removed
                    ));
                }
            }

            let mut office = update.current.clone();
            office.firm_id = firm_id;
            office.address = update.address.clone();
            office.updated_at = self.now;

            self.repos
                .offices
                .update(&mut *conn, &office)
                .await
                .map_err(|e| Step::Update.failure("update", "office", code, e))?;

            debug!(code = %code, firm = %update.firm_code, "Updated office");
            outcome.counts.offices_updated += 1;
        }

        Ok(())
    }

    async fn deactivate(
        &self,
        conn: &mut SqliteConnection,
        plan: &SyncPlan,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        for firm in &plan.firms_to_deactivate {
            self.disable_firm(&mut *conn, firm)
                .await
                .map_err(|e| Step::Deactivate.failure("disable", "firm", &firm.code, e))?;

            info!(code = %firm.code, "Firm no longer present in provider data");
            outcome.warnings.push(format!(
                "Firm {} deactivated - no longer present in provider data",
                firm.code
            ));
            outcome.counts.firms_disabled += 1;
        }

        Ok(())
    }

    async fn reactivate(
        &self,
        conn: &mut SqliteConnection,
        plan: &SyncPlan,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        for firm in &plan.firms_to_reactivate {
            self.repos
                .firms
                .set_active(&mut *conn, &firm.id, true, self.now)
                .await
                .map_err(|e| Step::Reactivate.failure("enable", "firm", &firm.code, e))?;

            debug!(code = %firm.code, "Reactivated firm");
            outcome.counts.firms_reactivated += 1;
        }

        for office in &plan.offices_to_reactivate {
            self.repos
                .offices
                .set_active(&mut *conn, &office.id, true, self.now)
                .await
                .map_err(|e| Step::Reactivate.failure("reactivate", "office", &office.code, e))?;

            debug!(code = %office.code, "Reactivated office");
            outcome.counts.offices_reactivated += 1;
        }

        Ok(())
    }

    /// Offices with assignments are kept as inactive history; the rest go.
    async fn remove_offices(
        &self,
        conn: &mut SqliteConnection,
        plan: &SyncPlan,
        outcome: &mut StepOutcome,
    ) -> Result<()> {
        for office in &plan.offices_to_remove {
            let assignments = self
                .repos
                .assignments
                .count_by_office(&mut *conn, &office.id)
                .await
                .map_err(|e| Step::RemoveOffices.failure("delete", "office", &office.code, e))?;

            if assignments > 0 {
                if !office.active {
                    continue;
                }
                self.repos
                    .offices
                    .set_active(&mut *conn, &office.id, false, self.now)
                    .await
                    .map_err(|e| {
                        Step::RemoveOffices.failure("deactivate", "office", &office.code, e)
                    })?;

                debug!(code = %office.code, assignments, "Deactivated office with assignments");
                outcome.counts.offices_deactivated += 1;
            } else {
                self.repos
                    .offices
                    .delete(&mut *conn, &office.id)
                    .await
                    .map_err(|e| Step::RemoveOffices.failure("delete", "office", &office.code, e))?;

                debug!(code = %office.code, "Deleted office");
                outcome.counts.offices_deleted += 1;
            }
        }

        Ok(())
    }

    async fn verify(&self, conn: &mut SqliteConnection, outcome: &mut StepOutcome) -> Result<()> {
        let firms = self
            .repos
            .firms
            .find_active_without_active_offices(&mut *conn)
            .await
            .map_err(|e| {
                Step::Verify.error(format!("Failed to find firms without active offices: {}", e))
            })?;

        for firm in &firms {
            self.disable_firm(&mut *conn, firm)
                .await
                .map_err(|e| Step::Verify.failure("disable", "firm", &firm.code, e))?;

            warn!(code = %firm.code, "Active firm had no active offices");
            outcome.warnings.push(format!(
                "Firm {} deactivated - no active offices remain",
                firm.code
            ));
            outcome.counts.firms_disabled += 1;
        }

        Ok(())
    }

    /// Deactivate `firm` and detach it from the hierarchy in both directions.
    async fn disable_firm(
        &self,
        conn: &mut SqliteConnection,
        firm: &Firm,
    ) -> core_library::Result<()> {
        self.repos
            .firms
            .set_active(&mut *conn, &firm.id, false, self.now)
            .await?;

        if firm.parent_firm_id.is_some() {
            self.repos
                .firms
                .set_parent(&mut *conn, &firm.id, None, self.now)
                .await?;
        }

        let detached = self
            .repos
            .firms
            .clear_children(&mut *conn, &firm.id, self.now)
            .await?;
        if detached > 0 {
            debug!(code = %firm.code, children = detached, "Cleared parent of child firms");
        }

        Ok(())
    }
}

fn lookup(firm_ids: &HashMap<String, String>, code: &str) -> std::result::Result<String, String> {
    firm_ids
        .get(code)
        .cloned()
        .ok_or_else(|| format!("firm {} has no local record", code))
}
