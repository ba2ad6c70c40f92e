//! Policy store contract and in-memory implementation

use super::PolicyDocument;
use crate::error::{AuthzError, Result};
use crate::types::Principal;
use async_trait::async_trait;
use monkeys_core::PrincipalType;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of policy documents for evaluation
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// All active documents that apply to the principal in its organization
    ///
    /// For users this includes documents attached to groups the user
    /// belongs to.
    async fn get_effective_policies(&self, principal: &Principal) -> Result<Vec<PolicyDocument>>;

    /// Fetch one document owned by `org_id`
    ///
    /// `PolicyNotFound` when missing, inactive or owned by another
    /// organization.
    async fn get_policy_document(&self, org_id: &str, policy_id: &str) -> Result<PolicyDocument>;
}

#[derive(Debug, Clone)]
struct StoredPolicy {
    org_id: String,
    document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AttachmentKey {
    org_id: String,
    principal_type: PrincipalType,
    principal_id: String,
}

impl AttachmentKey {
    fn new(org_id: &str, principal_type: PrincipalType, principal_id: &str) -> Self {
        Self {
            org_id: org_id.to_string(),
            principal_type,
            principal_id: principal_id.to_string(),
        }
    }
}

#[derive(Default)]
struct InMemoryState {
    policies: HashMap<String, StoredPolicy>,
    // Ordered so effective sets come back in attachment order
    attachments: HashMap<AttachmentKey, Vec<String>>,
    group_members: HashMap<String, HashSet<String>>,
}

/// In-memory policy store
#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryPolicyStore {
    /// Create a new in-memory policy store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a policy document
    pub async fn put_policy(&self, policy_id: &str, org_id: &str, document: PolicyDocument) {
        let mut state = self.state.write().await;
        state.policies.insert(
            policy_id.to_string(),
            StoredPolicy {
                org_id: org_id.to_string(),
                document,
            },
        );
    }

    /// Remove a policy and all of its attachments
    pub async fn delete_policy(&self, policy_id: &str) {
        let mut state = self.state.write().await;
        state.policies.remove(policy_id);
        for attached in state.attachments.values_mut() {
            attached.retain(|id| id != policy_id);
        }
    }

    /// Attach a policy to a principal
    pub async fn attach(&self, policy_id: &str, principal: &Principal) -> Result<()> {
        let mut state = self.state.write().await;
        let stored = state
            .policies
            .get(policy_id)
            .ok_or_else(|| AuthzError::PolicyNotFound(policy_id.to_string()))?;

        if stored.org_id != principal.org_id {
            return Err(AuthzError::InvalidInput(format!(
                "policy {} belongs to another organization",
                policy_id
            )));
        }

        let key = AttachmentKey::new(&principal.org_id, principal.principal_type, &principal.id);
        let attached = state.attachments.entry(key).or_default();
        if !attached.iter().any(|id| id == policy_id) {
            attached.push(policy_id.to_string());
        }
        Ok(())
    }

    /// Detach a policy from a principal
    pub async fn detach(&self, policy_id: &str, principal: &Principal) {
        let mut state = self.state.write().await;
        let key = AttachmentKey::new(&principal.org_id, principal.principal_type, &principal.id);
        if let Some(attached) = state.attachments.get_mut(&key) {
            attached.retain(|id| id != policy_id);
        }
    }

    /// Record a user as a member of a group
    pub async fn add_group_member(&self, group_id: &str, user_id: &str) {
        let mut state = self.state.write().await;
        state
            .group_members
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Number of stored policies
    pub async fn len(&self) -> usize {
        self.state.read().await.policies.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_effective_policies(&self, principal: &Principal) -> Result<Vec<PolicyDocument>> {
        let state = self.state.read().await;

        let mut keys = vec![AttachmentKey::new(
            &principal.org_id,
            principal.principal_type,
            &principal.id,
        )];

        if principal.principal_type == PrincipalType::User {
            let mut groups: Vec<&String> = state
                .group_members
                .iter()
                .filter(|(_, members)| members.contains(&principal.id))
                .map(|(group_id, _)| group_id)
                .collect();
            groups.sort();
            keys.extend(
                groups
                    .into_iter()
                    .map(|group_id| AttachmentKey::new(&principal.org_id, PrincipalType::Group, group_id)),
            );
        }

        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for key in &keys {
            let Some(attached) = state.attachments.get(key) else {
                continue;
            };
            for policy_id in attached {
                if !seen.insert(policy_id.as_str()) {
                    continue;
                }
                if let Some(stored) = state.policies.get(policy_id) {
                    if stored.org_id == principal.org_id {
                        documents.push(stored.document.clone());
                    }
                }
            }
        }

        Ok(documents)
    }

    async fn get_policy_document(&self, org_id: &str, policy_id: &str) -> Result<PolicyDocument> {
        let state = self.state.read().await;
        state
            .policies
            .get(policy_id)
            .filter(|stored| stored.org_id == org_id)
            .map(|stored| stored.document.clone())
            .ok_or_else(|| AuthzError::PolicyNotFound(policy_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Statement;

    fn doc(action: &str) -> PolicyDocument {
        PolicyDocument::new(vec![Statement::allow(&[action], &["*"])])
    }

    #[tokio::test]
    async fn test_policy_store_roundtrip() {
        let store = InMemoryPolicyStore::new();
        store.put_policy("p-1", "org-1", doc("iam:GetUser")).await;

        let fetched = store.get_policy_document("org-1", "p-1").await.unwrap();
        assert_eq!(fetched.statements[0].actions, vec!["iam:GetUser"]);

        store.delete_policy("p-1").await;
        assert!(matches!(
            store.get_policy_document("org-1", "p-1").await,
            Err(AuthzError::PolicyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_policy_document_is_org_scoped() {
        let store = InMemoryPolicyStore::new();
        store.put_policy("p-1", "org-1", doc("iam:GetUser")).await;

        assert!(store.get_policy_document("org-1", "p-1").await.is_ok());
        assert!(matches!(
            store.get_policy_document("org-2", "p-1").await,
            Err(AuthzError::PolicyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_effective_policies_include_groups() {
        let store = InMemoryPolicyStore::new();
        store.put_policy("direct", "org-1", doc("iam:GetUser")).await;
        store.put_policy("via-group", "org-1", doc("iam:ListUsers")).await;

        let alice = Principal::user("alice", "org-1");
        let admins = Principal::new("admins", PrincipalType::Group, "org-1");

        store.attach("direct", &alice).await.unwrap();
        store.attach("via-group", &admins).await.unwrap();
        store.add_group_member("admins", "alice").await;

        let effective = store.get_effective_policies(&alice).await.unwrap();
        assert_eq!(effective.len(), 2);

        let bob = Principal::user("bob", "org-1");
        assert!(store.get_effective_policies(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_effective_policies_are_org_scoped() {
        let store = InMemoryPolicyStore::new();
        store.put_policy("p-1", "org-1", doc("iam:GetUser")).await;

        let alice_elsewhere = Principal::user("alice", "org-2");
        assert!(matches!(
            store.attach("p-1", &alice_elsewhere).await,
            Err(AuthzError::InvalidInput(_))
        ));
        assert!(store
            .get_effective_policies(&alice_elsewhere)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_detach_and_duplicate_attach() {
        let store = InMemoryPolicyStore::new();
        store.put_policy("p-1", "org-1", doc("iam:GetUser")).await;
        let alice = Principal::user("alice", "org-1");

        store.attach("p-1", &alice).await.unwrap();
        store.attach("p-1", &alice).await.unwrap();
        assert_eq!(store.get_effective_policies(&alice).await.unwrap().len(), 1);

        store.detach("p-1", &alice).await;
        assert!(store.get_effective_policies(&alice).await.unwrap().is_empty());
    }
}
