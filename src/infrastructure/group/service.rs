//! Group service
//!
//! Group CRUD, group members, and the association of a group with every API or
//! application of the environment, which runs as an async job.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{error, info};

use crate::domain::api::{Api, ApiCriteria, ApiRepository};
use crate::domain::application::{
    Application, ApplicationCriteria, ApplicationRepository, ApplicationStatus,
};
use crate::domain::async_job::{AsyncJob, AsyncJobType};
use crate::domain::audit::{changes, AuditEvent, AuditProperty};
use crate::domain::group::{Group, GroupEventRule, GroupId, GroupRepository};
use crate::domain::membership::MembershipReferenceType;
use crate::domain::role::{RoleKey, RoleScope};
use crate::domain::DomainError;
use crate::infrastructure::async_job::AsyncJobService;
use crate::infrastructure::audit::AuditService;
use crate::infrastructure::membership::{Member, MembershipService};
use crate::infrastructure::permission::PermissionService;

#[derive(Debug, Clone, Default)]
pub struct GroupRequest {
    pub name: String,
    pub event_rules: BTreeSet<GroupEventRule>,
    pub max_invitation: Option<u32>,
    pub lock_api_role: bool,
    pub lock_application_role: bool,
    pub system_invitation: bool,
    pub email_invitation: bool,
    pub disable_membership_notifications: bool,
}

/// What a group gets associated with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAssociation {
    Api,
    Application,
}

impl GroupAssociation {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "api" => Some(Self::Api),
            "application" => Some(Self::Application),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct GroupService {
    repository: Arc<dyn GroupRepository>,
    apis: Arc<dyn ApiRepository>,
    applications: Arc<dyn ApplicationRepository>,
    memberships: Arc<MembershipService>,
    permissions: Arc<PermissionService>,
    jobs: Arc<AsyncJobService>,
    audit: Arc<AuditService>,
    environment_id: String,
}

impl GroupService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository: Arc<dyn GroupRepository>,
        apis: Arc<dyn ApiRepository>,
        applications: Arc<dyn ApplicationRepository>,
        memberships: Arc<MembershipService>,
        permissions: Arc<PermissionService>,
        jobs: Arc<AsyncJobService>,
        audit: Arc<AuditService>,
        environment_id: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            apis,
            applications,
            memberships,
            permissions,
            jobs,
            audit,
            environment_id: environment_id.into(),
        }
    }

    pub async fn create(&self, request: GroupRequest, user: &str) -> Result<Group, DomainError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Group name is required"));
        }
        self.ensure_unique_name(&name, None).await?;

        let mut group = Group::new(&self.environment_id, name)
            .with_event_rules(request.event_rules)
            .with_max_invitation(request.max_invitation)
            .with_locked_roles(request.lock_api_role, request.lock_application_role);
        group.set_invitations(request.system_invitation, request.email_invitation);
        group.set_disable_membership_notifications(request.disable_membership_notifications);

        let group = self.repository.create(group).await?;

        info!(group_id = %group.id(), name = group.name(), "Group created");
        self.record(AuditEvent::GroupCreated, &group, None, user).await;

        Ok(group)
    }

    pub async fn update(
        &self,
        id: &str,
        request: GroupRequest,
        user: &str,
    ) -> Result<Group, DomainError> {
        let previous = self.find_by_id(id).await?;
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("Group name is required"));
        }
        self.ensure_unique_name(&name, Some(previous.id())).await?;

        let mut group = previous.clone();
        group.set_name(name);
        group.set_event_rules(request.event_rules);
        group.set_max_invitation(request.max_invitation);
        group.set_locked_roles(request.lock_api_role, request.lock_application_role);
        group.set_invitations(request.system_invitation, request.email_invitation);
        group.set_disable_membership_notifications(request.disable_membership_notifications);

        let group = self.repository.update(group).await?;
        self.record(AuditEvent::GroupUpdated, &group, Some(&previous), user)
            .await;

        Ok(group)
    }

    /// Delete a group, its memberships, and every reference to it
    pub async fn delete(&self, id: &str, user: &str) -> Result<(), DomainError> {
        let group = self.find_by_id(id).await?;

        let memberships = self
            .memberships
            .delete_reference(MembershipReferenceType::Group, group.id().as_str())
            .await?;

        for mut api in self.find_apis(id).await? {
            api.remove_group(id);
            self.apis.update(api).await?;
        }
        for mut application in self.find_applications(id).await? {
            application.remove_group(id);
            self.applications.update(application).await?;
        }

        self.repository.delete(group.id()).await?;

        info!(group_id = %group.id(), memberships, "Group deleted");
        self.audit
            .create_environment_audit_log(
                user,
                AuditEvent::GroupDeleted,
                BTreeMap::from([(AuditProperty::Group, group.id().to_string())]),
                changes(Some(&group), None),
            )
            .await;

        Ok(())
    }

    /// Groups of the environment, sorted by name
    pub async fn find_all(&self) -> Result<Vec<Group>, DomainError> {
        self.repository.find_by_environment(&self.environment_id).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Group, DomainError> {
        self.repository
            .get(&GroupId::new(id))
            .await?
            .ok_or_else(|| DomainError::group_not_found(id))
    }

    pub async fn find_by_event(&self, rule: GroupEventRule) -> Result<Vec<Group>, DomainError> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|g| g.has_event_rule(rule))
            .collect())
    }

    /// Ids of the groups carrying `rule`, merged into `groups`
    pub async fn with_event_groups(
        &self,
        groups: BTreeSet<String>,
        rule: GroupEventRule,
    ) -> Result<BTreeSet<String>, DomainError> {
        let mut groups = groups;
        for group in self.find_by_event(rule).await? {
            groups.insert(group.id().to_string());
        }
        Ok(groups)
    }

    /// Fail with `group_not_found` on the first unknown group
    pub async fn ensure_exist(&self, groups: &BTreeSet<String>) -> Result<(), DomainError> {
        for id in groups {
            self.find_by_id(id).await?;
        }
        Ok(())
    }

    pub async fn find_apis(&self, id: &str) -> Result<Vec<Api>, DomainError> {
        self.apis
            .search(&ApiCriteria {
                group: Some(id.to_string()),
                ..Default::default()
            })
            .await
    }

    pub async fn find_applications(&self, id: &str) -> Result<Vec<Application>, DomainError> {
        self.applications
            .search(&ApplicationCriteria {
                group: Some(id.to_string()),
                ..Default::default()
            })
            .await
    }

    pub async fn members(&self, id: &str) -> Result<Vec<Member>, DomainError> {
        let group = self.find_by_id(id).await?;
        self.memberships
            .get_members_by_reference(MembershipReferenceType::Group, group.id().as_str())
            .await
    }

    /// Give a user roles in the group, one per scope
    pub async fn add_member(
        &self,
        id: &str,
        member_id: &str,
        roles: BTreeMap<RoleScope, String>,
        user: &str,
    ) -> Result<Member, DomainError> {
        let group = self.find_by_id(id).await?;

        if roles.is_empty() {
            return Err(DomainError::validation("At least one role is required"));
        }

        let members = self
            .memberships
            .get_members_by_reference(MembershipReferenceType::Group, group.id().as_str())
            .await?;
        let is_new = !members.iter().any(|m| m.id == member_id);
        if let Some(max) = group.max_invitation() {
            if is_new && members.len() >= max as usize {
                return Err(DomainError::validation(format!(
                    "Group [{}] can not have more than {} members",
                    group.name(),
                    max
                )));
            }
        }

        let locked = (group.lock_api_role() && roles.contains_key(&RoleScope::Api))
            || (group.lock_application_role() && roles.contains_key(&RoleScope::Application));
        if locked && !self.permissions.is_environment_admin(user).await? {
            return Err(DomainError::forbidden(format!(
                "Roles of group [{}] are locked",
                group.name()
            )));
        }

        for (scope, role) in roles {
            self.memberships
                .add_role_to_member_on_reference(
                    MembershipReferenceType::Group,
                    group.id().as_str(),
                    member_id,
                    RoleKey::of(scope, &role),
                    user,
                )
                .await?;
        }

        self.memberships
            .get_member(MembershipReferenceType::Group, group.id().as_str(), member_id)
            .await
    }

    pub async fn delete_member(
        &self,
        id: &str,
        member_id: &str,
        user: &str,
    ) -> Result<(), DomainError> {
        let group = self.find_by_id(id).await?;
        self.memberships
            .delete_member(
                MembershipReferenceType::Group,
                group.id().as_str(),
                member_id,
                user,
            )
            .await
    }

    /// Start associating the group with every API or application; returns the pending job
    pub async fn associate(
        &self,
        id: &str,
        association: GroupAssociation,
        user: &str,
    ) -> Result<AsyncJob, DomainError> {
        let group = self.find_by_id(id).await?;
        let group_id = group.id().to_string();

        let targets = match association {
            GroupAssociation::Api => self
                .apis
                .search(&ApiCriteria {
                    environment_id: Some(self.environment_id.clone()),
                    ..Default::default()
                })
                .await?
                .len(),
            GroupAssociation::Application => self
                .applications
                .search(&ApplicationCriteria {
                    environment_id: Some(self.environment_id.clone()),
                    status: Some(ApplicationStatus::Active),
                    ..Default::default()
                })
                .await?
                .len(),
        };

        let job = self
            .jobs
            .create(AsyncJobType::GroupAssociation, &group_id, user, targets as u64)
            .await?;

        let task = AssociationTask {
            group_id,
            job_id: job.id().to_string(),
            environment_id: self.environment_id.clone(),
            apis: self.apis.clone(),
            applications: self.applications.clone(),
            jobs: self.jobs.clone(),
        };
        tokio::spawn(task.run(association));

        info!(job_id = %job.id(), group_id = id, targets, "Group association started");
        Ok(job)
    }

    async fn ensure_unique_name(
        &self,
        name: &str,
        excluded: Option<&GroupId>,
    ) -> Result<(), DomainError> {
        let taken = self
            .find_all()
            .await?
            .iter()
            .any(|g| g.name().eq_ignore_ascii_case(name) && Some(g.id()) != excluded);

        if taken {
            return Err(DomainError::group_name_already_exists(name));
        }
        Ok(())
    }

    async fn record(&self, event: AuditEvent, group: &Group, previous: Option<&Group>, user: &str) {
        self.audit
            .create_environment_audit_log(
                user,
                event,
                BTreeMap::from([(AuditProperty::Group, group.id().to_string())]),
                changes(previous, Some(group)),
            )
            .await;
    }
}

/// Background half of a group association
struct AssociationTask {
    group_id: String,
    job_id: String,
    environment_id: String,
    apis: Arc<dyn ApiRepository>,
    applications: Arc<dyn ApplicationRepository>,
    jobs: Arc<AsyncJobService>,
}

impl AssociationTask {
    async fn run(self, association: GroupAssociation) {
        let outcome = match association {
            GroupAssociation::Api => self.associate_apis().await,
            GroupAssociation::Application => self.associate_applications().await,
        };

        let finished = match outcome {
            Ok(()) => self.jobs.complete(&self.job_id).await,
            Err(e) => {
                error!(job_id = %self.job_id, error = %e, "Group association failed");
                self.jobs.fail(&self.job_id, &e.to_string()).await
            }
        };

        if let Err(e) = finished {
            error!(job_id = %self.job_id, error = %e, "Failed to finish async job");
        }
    }

    async fn associate_apis(&self) -> Result<(), DomainError> {
        let apis = self
            .apis
            .search(&ApiCriteria {
                environment_id: Some(self.environment_id.clone()),
                ..Default::default()
            })
            .await?;

        for (done, mut api) in apis.into_iter().enumerate() {
            if api.add_group(self.group_id.as_str()) {
                self.apis.update(api).await?;
            }
            self.jobs
                .update_progress(&self.job_id, done as u64 + 1)
                .await?;
        }
        Ok(())
    }

    async fn associate_applications(&self) -> Result<(), DomainError> {
        let applications = self
            .applications
            .search(&ApplicationCriteria {
                environment_id: Some(self.environment_id.clone()),
                status: Some(ApplicationStatus::Active),
                ..Default::default()
            })
            .await?;

        for (done, mut application) in applications.into_iter().enumerate() {
            if application.add_group(self.group_id.as_str()) {
                self.applications.update(application).await?;
            }
            self.jobs
                .update_progress(&self.job_id, done as u64 + 1)
                .await?;
        }
        Ok(())
    }
}
