//! Integrity maintenance pass.
//!
//! Detects merge and linkage anomalies that interactive operations never
//! raise, logs each one and, in fix mode, repairs it. Checks run in a fixed
//! order so later checks see the repairs of earlier ones:
//!
//! 1. self merges
//! 2. merge chains that never terminate
//! 3. chained merges (flattened to the final target)
//! 4. items both deleted and merged
//! 5. deleted items still holding resources
//! 6. merged items still holding resources
//! 7. merges across models
//! 8. parent links to the wrong model, deleted parents, merged parents

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use super::Catalog;
use crate::error::{CatalogError, Result};
use crate::traits::store::CatalogStore;
use crate::types::{
    audit::AuditAction,
    item::{Item, ItemId, ItemModel},
};

/// One anomaly found by [`Catalog::check_integrity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    SelfMerge {
        item: ItemId,
    },
    UnresolvableChain {
        item: ItemId,
        merged_to: ItemId,
    },
    ChainedMerge {
        item: ItemId,
        merged_to: ItemId,
        final_target: ItemId,
    },
    DeletedAndMerged {
        item: ItemId,
        merged_to: ItemId,
    },
    DeletedWithResources {
        item: ItemId,
        resources: usize,
    },
    MergedWithResources {
        item: ItemId,
        target: ItemId,
        resources: usize,
    },
    CrossModelMerge {
        item: ItemId,
        model: ItemModel,
        target: ItemId,
        target_model: ItemModel,
        has_children: bool,
    },
    /// Parent has a model other than the item's parent model, or is missing
    ParentWrongModel {
        item: ItemId,
        parent: ItemId,
        parent_model: Option<ItemModel>,
    },
    ParentDeleted {
        item: ItemId,
        parent: ItemId,
    },
    ParentMerged {
        item: ItemId,
        parent: ItemId,
        final_parent: ItemId,
    },
}

impl IntegrityIssue {
    /// The item the finding is recorded against.
    pub fn item(&self) -> ItemId {
        match self {
            IntegrityIssue::SelfMerge { item }
            | IntegrityIssue::UnresolvableChain { item, .. }
            | IntegrityIssue::ChainedMerge { item, .. }
            | IntegrityIssue::DeletedAndMerged { item, .. }
            | IntegrityIssue::DeletedWithResources { item, .. }
            | IntegrityIssue::MergedWithResources { item, .. }
            | IntegrityIssue::CrossModelMerge { item, .. }
            | IntegrityIssue::ParentWrongModel { item, .. }
            | IntegrityIssue::ParentDeleted { item, .. }
            | IntegrityIssue::ParentMerged { item, .. } => *item,
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityIssue::SelfMerge { item } => write!(f, "item {item} merged to itself"),
            IntegrityIssue::UnresolvableChain { item, merged_to } => {
                write!(f, "item {item} merged to {merged_to} never resolves")
            }
            IntegrityIssue::ChainedMerge {
                item,
                merged_to,
                final_target,
            } => write!(
                f,
                "item {item} merged to {merged_to} which is merged, final target {final_target}"
            ),
            IntegrityIssue::DeletedAndMerged { item, merged_to } => {
                write!(f, "item {item} is deleted and merged to {merged_to}")
            }
            IntegrityIssue::DeletedWithResources { item, resources } => {
                write!(f, "deleted item {item} has {resources} resources")
            }
            IntegrityIssue::MergedWithResources {
                item,
                target,
                resources,
            } => write!(f, "item {item} merged to {target} has {resources} resources"),
            IntegrityIssue::CrossModelMerge {
                item,
                model,
                target,
                target_model,
                ..
            } => write!(f, "{model} {item} merged to {target_model} {target}"),
            IntegrityIssue::ParentWrongModel {
                item,
                parent,
                parent_model,
            } => match parent_model {
                Some(m) => write!(f, "item {item} has parent {parent} of model {m}"),
                None => write!(f, "item {item} has missing parent {parent}"),
            },
            IntegrityIssue::ParentDeleted { item, parent } => {
                write!(f, "item {item} has deleted parent {parent}")
            }
            IntegrityIssue::ParentMerged {
                item,
                parent,
                final_parent,
            } => write!(
                f,
                "item {item} has parent {parent} merged to {final_parent}"
            ),
        }
    }
}

/// Findings of one integrity pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub issues: Vec<IntegrityIssue>,
    /// Number of issues repaired; zero unless run in fix mode
    pub fixed: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl<S: CatalogStore> Catalog<S> {
    /// Scan every item for anomalies; repair them when `fix` is set.
    pub async fn check_integrity(&self, fix: bool) -> Result<IntegrityReport> {
        let mut report = IntegrityReport::default();
        self.check_self_merges(fix, &mut report).await?;
        self.check_unresolvable_chains(fix, &mut report).await?;
        self.check_chained_merges(fix, &mut report).await?;
        self.check_deleted_and_merged(fix, &mut report).await?;
        self.check_deleted_with_resources(fix, &mut report).await?;
        self.check_merged_with_resources(fix, &mut report).await?;
        self.check_cross_model_merges(fix, &mut report).await?;
        self.check_parents(fix, &mut report).await?;

        info!(
            issues = report.issues.len(),
            fixed = report.fixed,
            fix,
            "integrity check finished"
        );
        Ok(report)
    }

    /// Items with a merge pointer, in id order.
    async fn merged_items(&self) -> Result<Vec<Item>> {
        Ok(self
            .store
            .list_items()
            .await?
            .into_iter()
            .filter(|i| i.merged_to_item.is_some())
            .collect())
    }

    /// Log and collect `issue`. Returns whether it should be repaired.
    fn record(&self, report: &mut IntegrityReport, issue: IntegrityIssue, fix: bool) -> bool {
        warn!(item = %issue.item(), issue = %issue, "integrity violation");
        report.issues.push(issue);
        fix
    }

    async fn repaired(
        &self,
        report: &mut IntegrityReport,
        item: ItemId,
        before: String,
        after: String,
    ) {
        report.fixed += 1;
        self.audit(item, AuditAction::Repair, Some(before), Some(after))
            .await;
        info!(item = %item, "integrity violation repaired");
    }

    async fn check_self_merges(&self, fix: bool, report: &mut IntegrityReport) -> Result<()> {
        for mut item in self.merged_items().await? {
            if item.merged_to_item != Some(item.id) {
                continue;
            }
            if self.record(report, IntegrityIssue::SelfMerge { item: item.id }, fix) {
                item.merged_to_item = None;
                self.store.update_item(&item).await?;
                self.repaired(report, item.id, format!("merged_to={}", item.id), "merged_to=none".into())
                    .await;
            }
        }
        Ok(())
    }

    async fn check_unresolvable_chains(
        &self,
        fix: bool,
        report: &mut IntegrityReport,
    ) -> Result<()> {
        for listed in self.merged_items().await? {
            // Earlier repairs in this loop may have broken the cycle already
            let Some(mut item) = self.store.get_item(listed.id).await? else {
                continue;
            };
            let Some(merged_to) = item.merged_to_item.filter(|m| *m != item.id) else {
                continue;
            };
            match self.resolve_final(&item).await {
                Ok(_) => continue,
                Err(CatalogError::CycleDetected { .. } | CatalogError::ItemNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            let issue = IntegrityIssue::UnresolvableChain {
                item: item.id,
                merged_to,
            };
            if self.record(report, issue, fix) {
                item.merged_to_item = None;
                self.store.update_item(&item).await?;
                self.repaired(report, item.id, format!("merged_to={merged_to}"), "merged_to=none".into())
                    .await;
            }
        }
        Ok(())
    }

    async fn check_chained_merges(&self, fix: bool, report: &mut IntegrityReport) -> Result<()> {
        for mut item in self.merged_items().await? {
            let Some(merged_to) = item.merged_to_item else {
                continue;
            };
            let Some(target) = self.store.get_item(merged_to).await? else {
                continue;
            };
            if target.merged_to_item.is_none() {
                continue;
            }
            let final_target = match self.resolve_final(&target).await {
                Ok(t) => t.id,
                Err(e) => {
                    warn!(item = %item.id, error = %e, "cannot flatten merge chain");
                    continue;
                }
            };
            let issue = IntegrityIssue::ChainedMerge {
                item: item.id,
                merged_to,
                final_target,
            };
            if self.record(report, issue, fix) {
                item.merged_to_item = Some(final_target);
                self.store.update_item(&item).await?;
                self.repaired(
                    report,
                    item.id,
                    format!("merged_to={merged_to}"),
                    format!("merged_to={final_target}"),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn check_deleted_and_merged(
        &self,
        fix: bool,
        report: &mut IntegrityReport,
    ) -> Result<()> {
        for mut item in self.merged_items().await? {
            let Some(merged_to) = item.merged_to_item.filter(|_| item.is_deleted) else {
                continue;
            };
            let issue = IntegrityIssue::DeletedAndMerged {
                item: item.id,
                merged_to,
            };
            if self.record(report, issue, fix) {
                item.is_deleted = false;
                self.store.update_item(&item).await?;
                self.repaired(report, item.id, "deleted".into(), "undeleted".into())
                    .await;
            }
        }
        Ok(())
    }

    async fn check_deleted_with_resources(
        &self,
        fix: bool,
        report: &mut IntegrityReport,
    ) -> Result<()> {
        let deleted: Vec<Item> = self
            .store
            .list_items()
            .await?
            .into_iter()
            .filter(|i| i.is_deleted)
            .collect();
        for item in deleted {
            let resources = self.store.resources_for_item(item.id).await?.len();
            if resources == 0 {
                continue;
            }
            let issue = IntegrityIssue::DeletedWithResources {
                item: item.id,
                resources,
            };
            if self.record(report, issue, fix) {
                let unlinked = self.store.commit_clear(&item).await?;
                self.repaired(
                    report,
                    item.id,
                    format!("resources={resources}"),
                    format!("unlinked={unlinked}"),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn check_merged_with_resources(
        &self,
        fix: bool,
        report: &mut IntegrityReport,
    ) -> Result<()> {
        for item in self.merged_items().await? {
            let resources = self.store.resources_for_item(item.id).await?.len();
            if resources == 0 {
                continue;
            }
            let target = match self.resolve_final(&item).await {
                Ok(t) => t.id,
                Err(e) => {
                    warn!(item = %item.id, error = %e, "cannot relink resources of merged item");
                    continue;
                }
            };
            let issue = IntegrityIssue::MergedWithResources {
                item: item.id,
                target,
                resources,
            };
            if self.record(report, issue, fix) {
                let relinked = self.store.commit_merge(item.id, target).await?;
                self.repaired(
                    report,
                    item.id,
                    format!("resources={resources}"),
                    format!("relinked={relinked} to {target}"),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn check_cross_model_merges(
        &self,
        fix: bool,
        report: &mut IntegrityReport,
    ) -> Result<()> {
        for item in self.merged_items().await? {
            let Some(target_id) = item.merged_to_item else {
                continue;
            };
            let Some(target) = self.store.get_item(target_id).await? else {
                continue;
            };
            if target.model == item.model {
                continue;
            }
            let has_children = !self.store.child_items(item.id).await?.is_empty();
            let issue = IntegrityIssue::CrossModelMerge {
                item: item.id,
                model: item.model,
                target: target.id,
                target_model: target.model,
                has_children,
            };
            if !self.record(report, issue, fix) {
                continue;
            }
            if has_children {
                let mut unmerged = item.clone();
                unmerged.merged_to_item = None;
                self.store.update_item(&unmerged).await?;
                self.repaired(
                    report,
                    item.id,
                    format!("merged_to={target_id}"),
                    "merged_to=none".into(),
                )
                .await;
            } else {
                self.recast_to(item.id, target.model).await?;
                self.repaired(
                    report,
                    item.id,
                    format!("model={}", item.model),
                    format!("model={}", target.model),
                )
                .await;
            }
        }
        Ok(())
    }

    async fn check_parents(&self, fix: bool, report: &mut IntegrityReport) -> Result<()> {
        let children: Vec<ItemId> = self
            .store
            .list_items()
            .await?
            .into_iter()
            .filter(|i| i.parent_item.is_some())
            .map(|i| i.id)
            .collect();

        for id in children {
            let Some(mut item) = self.store.get_item(id).await? else {
                continue;
            };
            let Some(parent_id) = item.parent_item else {
                continue;
            };
            let parent = self.store.get_item(parent_id).await?;

            let expected = item.model.parent_model();
            let parent_model = parent.as_ref().map(|p| p.model);
            let Some(mut parent) = parent.filter(|p| Some(p.model) == expected) else {
                let issue = IntegrityIssue::ParentWrongModel {
                    item: id,
                    parent: parent_id,
                    parent_model,
                };
                if self.record(report, issue, fix) {
                    item.parent_item = None;
                    self.store.update_item(&item).await?;
                    self.repaired(report, id, format!("parent={parent_id}"), "parent=none".into())
                        .await;
                }
                continue;
            };

            if parent.is_deleted {
                let issue = IntegrityIssue::ParentDeleted {
                    item: id,
                    parent: parent_id,
                };
                if self.record(report, issue, fix) {
                    parent.is_deleted = false;
                    self.store.update_item(&parent).await?;
                    self.repaired(report, parent_id, "deleted".into(), "undeleted".into())
                        .await;
                }
            }

            if parent.merged_to_item.is_some() {
                let final_parent = match self.resolve_final(&parent).await {
                    Ok(p) => p.id,
                    Err(e) => {
                        warn!(item = %id, error = %e, "cannot repoint parent");
                        continue;
                    }
                };
                let issue = IntegrityIssue::ParentMerged {
                    item: id,
                    parent: parent_id,
                    final_parent,
                };
                if self.record(report, issue, fix) {
                    item.parent_item = Some(final_parent);
                    self.store.update_item(&item).await?;
                    self.repaired(
                        report,
                        id,
                        format!("parent={parent_id}"),
                        format!("parent={final_parent}"),
                    )
                    .await;
                }
            }
        }
        Ok(())
    }
}
