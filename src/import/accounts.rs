// src/import/accounts.rs

//! Account import
//!
//! Groups are created before users so that group memberships resolve.
//! Existing accounts are left alone.

use super::ImportRun;
use crate::error::{Error, Result};
use crate::report::{RecordOutcome, RecordStatus, SkipReason};
use tracing::{debug, warn};

pub(super) fn import_accounts(run: &mut ImportRun<'_>) -> Result<()> {
    let Some(accounts) = run.manifest.accounts()? else {
        debug!("manifest carries no accounts section");
        return Ok(());
    };

    for group in &accounts.groups {
        let label = format!("group:{}", group.name);
        let created = run.store.create_group(group).map(|_| ());
        let status = settle(run, &label, created);
        run.report.principals.push(RecordOutcome::new(label, status));
    }
    for user in &accounts.users {
        let label = format!("user:{}", user.name);
        let created = run.store.create_user(user).map(|_| ());
        let status = settle(run, &label, created);
        run.report.principals.push(RecordOutcome::new(label, status));
    }
    Ok(())
}

fn settle(run: &ImportRun<'_>, label: &str, result: Result<()>) -> RecordStatus {
    match result {
        Ok(()) => {
            run.sink.status(&format!("created {}", label));
            RecordStatus::Written
        }
        Err(Error::AlreadyExists(_)) => {
            debug!("{} already exists", label);
            RecordStatus::Skipped(SkipReason::Exists)
        }
        Err(e) => {
            warn!("failed to create {}: {}", label, e);
            run.sink.error(&format!("{}: {}", label, e));
            RecordStatus::Failed(e.to_string())
        }
    }
}
