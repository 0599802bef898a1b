//! Identity resources: team, user and project

use std::collections::HashMap;

use kowabunga_core::provider::ProviderResult;
use kowabunga_core::resource::{Resource, ResourceId, State, Value};

use super::{ApiObject, created_state, description};
use crate::client::segment;
use crate::convert::{AttrMap, AttrReader, bytes_to_gb, cidr_prefix, gb_to_bytes};
use crate::models::{Metadata, Project, ProjectResources, Subnet, Team, User};
use crate::provider::{KowabungaProvider, existing_state};

const DEFAULT_SUBNET_SIZE: i64 = 26;

impl ApiObject for Team {
    const PATH: &'static str = "team";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(Team {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            users: attrs.sorted_string_list("users"),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let mut users = self.users.clone();
        users.sort();
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with_strings("users", users)
            .build()
    }
}

impl ApiObject for User {
    const PATH: &'static str = "user";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        Ok(User {
            id: None,
            name: attrs.required_string("name")?,
            email: attrs.required_string("email")?,
            role: attrs.required_string("role")?,
            notifications: Some(attrs.bool_or("notifications", false)),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        AttrMap::new()
            .with("name", self.name.as_str())
            .with("email", self.email.as_str())
            .with("role", self.role.as_str())
            .with("notifications", self.notifications.unwrap_or(false))
            .build()
    }
}

impl ApiObject for Project {
    const PATH: &'static str = "project";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn from_attributes(attrs: &AttrReader<'_>) -> ProviderResult<Self> {
        let metadatas = attrs
            .string_map("metadata")
            .into_iter()
            .map(|(key, value)| Metadata { key, value })
            .collect();
        Ok(Project {
            id: None,
            name: attrs.required_string("name")?,
            description: description(attrs),
            domain: Some(attrs.string_or("domain", "")),
            root_password: Some(attrs.string_or("root_password", "")),
            bootstrap_user: attrs.string("bootstrap_user"),
            bootstrap_pubkey: attrs.string("bootstrap_pubkey"),
            tags: attrs.sorted_string_list("tags"),
            metadatas,
            quotas: ProjectResources {
                instances: Some(attrs.int_or("max_instances", 0)),
                memory: Some(gb_to_bytes(attrs.int_or("max_memory", 0))),
                storage: Some(gb_to_bytes(attrs.int_or("max_storage", 0))),
                vcpus: Some(attrs.int_or("max_vcpus", 0)),
            },
            private_subnets: Vec::new(),
            teams: attrs.sorted_string_list("teams"),
            regions: attrs.sorted_string_list("regions"),
            reserved_vrrp_ids: Vec::new(),
        })
    }

    fn to_attributes(&self) -> HashMap<String, Value> {
        let sorted = |items: &[String]| {
            let mut items = items.to_vec();
            items.sort();
            items
        };
        let mut vrids = self.reserved_vrrp_ids.clone();
        vrids.sort_unstable();

        let mut attrs = AttrMap::new()
            .with("name", self.name.as_str())
            .with("desc", self.description.clone().unwrap_or_default())
            .with("domain", self.domain.clone().unwrap_or_default())
            .with("root_password", self.root_password.clone().unwrap_or_default())
            .with_strings("tags", sorted(&self.tags))
            .with_map(
                "metadata",
                self.metadatas
                    .iter()
                    .map(|m| (m.key.clone(), m.value.clone())),
            )
            .with("max_instances", self.quotas.instances.unwrap_or(0))
            .with("max_memory", bytes_to_gb(self.quotas.memory.unwrap_or(0)))
            .with("max_storage", bytes_to_gb(self.quotas.storage.unwrap_or(0)))
            .with("max_vcpus", self.quotas.vcpus.unwrap_or(0))
            .with_strings("teams", sorted(&self.teams))
            .with_strings("regions", sorted(&self.regions))
            .with_map(
                "private_subnets",
                self.private_subnets.iter().filter_map(|s| {
                    Some((s.key.clone()?, s.value.clone().unwrap_or_default()))
                }),
            )
            .with_ints("vrids", vrids);
        if let Some(user) = &self.bootstrap_user {
            attrs = attrs.with("bootstrap_user", user.as_str());
        }
        if let Some(key) = &self.bootstrap_pubkey {
            attrs = attrs.with("bootstrap_pubkey", key.as_str());
        }
        attrs.build()
    }
}

impl KowabungaProvider {
    // ========== Team Operations ==========

    pub(crate) async fn create_team(&self, resource: &Resource) -> ProviderResult<State> {
        let created = self.create_object::<Team>(resource, "team", &[]).await?;
        Ok(created_state(resource, created))
    }

    // ========== User Operations ==========

    /// Create a user; robots get an API token, humans a password reset email
    pub(crate) async fn create_user(&self, resource: &Resource) -> ProviderResult<State> {
        let (id, user) = self.create_object::<User>(resource, "user", &[]).await?;
        let bot = AttrReader::new(&resource.attributes).bool_or("bot", false);
        let action = if bot {
            format!("user/{}/token", segment(&id))
        } else {
            format!("user/{}/resetPassword", segment(&id))
        };
        self.object_action(&resource.id, &action, &[]).await?;
        Ok(created_state(resource, (id, user)))
    }

    // ========== Project Operations ==========

    /// Create a project with a private subnet of the requested size
    pub(crate) async fn create_project(&self, resource: &Resource) -> ProviderResult<State> {
        let subnet_size = AttrReader::new(&resource.attributes)
            .int_or("subnet_size", DEFAULT_SUBNET_SIZE);
        let created = self
            .create_object::<Project>(
                resource,
                "project",
                &[("subnetSize", subnet_size.to_string())],
            )
            .await?;
        let mut state = created_state(resource, created);
        state
            .attributes
            .insert("subnet_size".to_string(), Value::Int(subnet_size));
        Ok(state)
    }

    /// Read a project; its subnet size is the prefix length of its first
    /// private subnet, by region ID
    pub(crate) async fn read_project(
        &self,
        id: &ResourceId,
        identifier: &str,
    ) -> ProviderResult<State> {
        let path = format!("project/{}", segment(identifier));
        let Some(project) = self.get_object::<Project>(id, &path).await? else {
            return Ok(State::not_found(id.clone()));
        };
        let mut attrs = project.to_attributes();
        let first_subnet = project
            .private_subnets
            .iter()
            .filter(|s| s.key.is_some())
            .min_by(|a, b| a.key.cmp(&b.key))
            .and_then(|s| s.value.clone());
        if let Some(subnet_id) = first_subnet {
            let subnet: Option<Subnet> = self
                .get_object(id, &format!("subnet/{}", segment(&subnet_id)))
                .await?;
            if let Some(prefix) = subnet.and_then(|s| cidr_prefix(&s.cidr)) {
                attrs.insert("subnet_size".to_string(), Value::Int(i64::from(prefix)));
            }
        }
        Ok(existing_state(id, identifier, attrs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionSubnet;

    fn project() -> Project {
        Project {
            name: "acme".to_string(),
            description: Some("Acme Corp".to_string()),
            domain: Some("acme.internal".to_string()),
            root_password: Some("s3cr3t".to_string()),
            bootstrap_user: Some("ops".to_string()),
            tags: vec!["a".to_string(), "b".to_string()],
            metadatas: vec![Metadata {
                key: "owner".to_string(),
                value: "ops".to_string(),
            }],
            quotas: ProjectResources {
                instances: Some(10),
                memory: Some(gb_to_bytes(64)),
                storage: Some(gb_to_bytes(1024)),
                vcpus: Some(32),
            },
            teams: vec!["t1".to_string()],
            regions: vec!["r1".to_string(), "r2".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn project_converter_is_idempotent() {
        let original = project();
        let attrs = original.to_attributes();
        let back = Project::from_attributes(&AttrReader::new(&attrs)).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn project_quotas_are_gigabytes() {
        let attrs = project().to_attributes();
        assert_eq!(attrs["max_memory"], Value::Int(64));
        assert_eq!(attrs["max_storage"], Value::Int(1024));
    }

    #[test]
    fn project_computed_members_read_back_sorted() {
        let mut p = project();
        p.reserved_vrrp_ids = vec![12, 3, 7];
        p.private_subnets = vec![RegionSubnet {
            key: Some("r1".to_string()),
            value: Some("s1".to_string()),
        }];
        let attrs = p.to_attributes();
        assert_eq!(
            attrs["vrids"],
            Value::List(vec![Value::Int(3), Value::Int(7), Value::Int(12)])
        );
        assert_eq!(
            attrs["private_subnets"].as_map().unwrap()["r1"],
            Value::from("s1")
        );
    }

    #[test]
    fn team_members_are_sorted() {
        let attrs = HashMap::from([
            ("name".to_string(), Value::from("ops")),
            (
                "users".to_string(),
                Value::List(vec![Value::from("u9"), Value::from("u1")]),
            ),
        ]);
        let team = Team::from_attributes(&AttrReader::new(&attrs)).unwrap();
        assert_eq!(team.users, vec!["u1", "u9"]);
    }

    #[test]
    fn user_notifications_default_off() {
        let user = User {
            name: "jdoe".to_string(),
            email: "jdoe@acme.com".to_string(),
            role: "user".to_string(),
            ..Default::default()
        };
        assert_eq!(user.to_attributes()["notifications"], Value::Bool(false));
    }
}
