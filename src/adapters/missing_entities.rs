//! Auto-creation of groups and organizations referenced by teams.

use std::sync::Arc;

use crate::adapters::AdapterStage;
use crate::model::entities::{GroupInfo, OrganizationInfo};
use crate::update::ContestUpdate;

/// Appends synthetic groups/organizations for references that do not resolve
/// within the authoritative lists.
pub struct MissingEntitiesStage;

impl MissingEntitiesStage {
    /// Stateless stage.
    pub fn new() -> Self {
        Self
    }
}

impl Default for MissingEntitiesStage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterStage for MissingEntitiesStage {
    fn process(&mut self, update: ContestUpdate) -> Vec<ContestUpdate> {
        let ContestUpdate::Info(info) = update else {
            return vec![update];
        };

        let missing_groups = info.unresolved_groups();
        let missing_orgs = info.unresolved_organizations();
        if missing_groups.is_empty() && missing_orgs.is_empty() {
            return vec![ContestUpdate::Info(info)];
        }

        let mut adjusted = (*info).clone();
        for id in missing_groups {
            adjusted.groups.push(GroupInfo {
                display_name: id.clone(),
                id,
                is_hidden: false,
                is_out_of_contest: false,
            });
        }
        for id in missing_orgs {
            adjusted.organizations.push(OrganizationInfo {
                display_name: id.clone(),
                full_name: id.clone(),
                id,
            });
        }
        vec![ContestUpdate::Info(Arc::new(adjusted))]
    }
}
