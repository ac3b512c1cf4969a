//! infrastructures: provider type, networks and affinity groups
mod affinity_group;
mod network;

pub use affinity_group::AffinityGroup;
pub use network::{IpPool, Network};

use crate::credential::{Credential, Credentials};
use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::lazy::Memo;
use crate::provider::{Capability, ProviderKind};
use crate::util::{optional_string, optional_string_map};
use crate::value::{Map, Value};
use std::sync::Arc;

/// Parsed infrastructures of a plan, shared with every node referring to them
pub type Infrastructures = indexmap::IndexMap<String, Arc<Infrastructure>>;
pub type Networks = indexmap::IndexMap<String, Network>;
pub type AffinityGroups = indexmap::IndexMap<String, AffinityGroup>;

#[derive(Debug)]
pub struct Infrastructure {
    name: String,
    raw: Value,
    entity: Entity,
    credentials: Arc<Credentials>,
    provider: Memo<ProviderKind>,
    endpoint: Memo<Option<String>>,
    credential: Memo<Option<String>>,
    networks: Memo<Networks>,
    affinity_groups: Memo<AffinityGroups>,
}

impl Infrastructure {
    /// `credentials` are the already parsed credentials of the plan
    pub fn new(name: impl Into<String>, raw: Value, credentials: Arc<Credentials>) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::Infrastructure, &name),
            name,
            raw,
            credentials,
            provider: Memo::new(),
            endpoint: Memo::new(),
            credential: Memo::new(),
            networks: Memo::new(),
            affinity_groups: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> Result<ProviderKind> {
        self.provider
            .get_or_try_init(|| {
                let Some(kind) = self.raw.field("type") else {
                    return Err(self.entity.error("type", "the 'type' has to be specified"));
                };
                let kind = kind.as_str().ok_or_else(|| {
                    self.entity
                        .error("type", format!("the 'type' has to be a string, not {}", kind.kind()))
                })?;
                kind.parse::<ProviderKind>()
                    .map_err(|unknown| self.entity.error("type", format!("{unknown}")))
            })
            .copied()
    }

    /// Whether the provider of this infrastructure offers `capability`
    pub fn provides(&self, capability: Capability) -> Result<bool> {
        Ok(self.provider()?.provides(capability))
    }

    pub fn endpoint(&self) -> Result<Option<&str>> {
        self.endpoint
            .resolve(
                || optional_string(&self.entity, &self.raw, "endpoint"),
                |endpoint| {
                    let valid = ["http://", "https://"].iter().any(|scheme| {
                        endpoint
                            .strip_prefix(scheme)
                            .is_some_and(|host| !host.is_empty())
                    });
                    if valid {
                        Ok(Some(endpoint.to_string()))
                    } else {
                        Err(self.entity.error(
                            "endpoint",
                            format!("the 'endpoint' '{endpoint}' is not a http(s) URL"),
                        ))
                    }
                },
                || None,
            )
            .map(Option::as_deref)
    }

    /// Credential used to talk to the provider
    pub fn credential(&self) -> Result<Option<&Credential>> {
        let name = self.credential.resolve(
            || optional_string(&self.entity, &self.raw, "credentials"),
            |name| {
                if self.credentials.contains_key(name) {
                    Ok(Some(name.to_string()))
                } else {
                    Err(self.entity.error(
                        "credentials",
                        format!("the credential '{name}' is not defined"),
                    ))
                }
            },
            || None,
        )?;
        Ok(name.as_ref().and_then(|name| self.credentials.get(name)))
    }

    pub fn networks(&self) -> Result<&Networks> {
        self.networks.resolve(
            || self.map_of_maps("networks", true),
            |map| {
                Ok(map
                    .iter()
                    .map(|(name, raw)| (name.to_string(), Network::new(name.to_string(), raw.clone())))
                    .collect())
            },
            Networks::new,
        )
    }

    pub fn affinity_groups(&self) -> Result<&AffinityGroups> {
        self.affinity_groups.resolve(
            || self.map_of_maps("affinity_groups", false),
            |map| {
                Ok(map
                    .iter()
                    .map(|(name, raw)| {
                        let name = name.to_string();
                        (name.clone(), AffinityGroup::new(name, raw.clone()))
                    })
                    .collect())
            },
            AffinityGroups::new,
        )
    }

    /// A hash of hashes, `null` values are allowed if `allow_null`
    fn map_of_maps(&self, key: &'static str, allow_null: bool) -> Result<Option<&Map>> {
        let Some(map) = optional_string_map(&self.entity, &self.raw, key)? else {
            return Ok(None);
        };
        for (name, value) in map {
            let well_formed = value.as_object().is_some() || (allow_null && value.is_null());
            if !well_formed {
                return Err(self.entity.error(
                    key,
                    format!("the definition of '{name}' in '{key}' has to be a hash"),
                ));
            }
        }
        Ok(Some(map))
    }
}

impl Validate for Infrastructure {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.provider());
        diagnostics.check(self.endpoint());
        diagnostics.check(self.credential());

        let context = format!(
            "Infrastructure {}: can't validate the networks part because of a previous error",
            self.name
        );
        if let Some(networks) = diagnostics.check_with_context(&context, self.networks()) {
            networks
                .values()
                .for_each(|network| network.validate_into(diagnostics));
        }

        let context = format!(
            "Infrastructure {}: can't validate the affinity groups part because of a previous error",
            self.name
        );
        if let Some(groups) = diagnostics.check_with_context(&context, self.affinity_groups()) {
            groups
                .values()
                .for_each(|group| group.validate_into(diagnostics));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn infrastructure(name: &str, yaml: &str) -> Infrastructure {
        Infrastructure::new(name, crate::value!(yaml), Default::default())
    }

    #[test]
    fn provider_type() {
        assert_eq!(
            infrastructure("dummy", "type: rhev").provider(),
            Ok(ProviderKind::Ovirt)
        );
        assert!(infrastructure("dummy", "{}").provider().is_err());
        assert!(infrastructure("dummy", "type: {invalid: invalid}")
            .provider()
            .is_err());
        assert_eq!(
            infrastructure("dummy", "type: xen")
                .provider()
                .unwrap_err()
                .to_string(),
            "Infrastructure dummy: unknown provider type 'xen'"
        );
    }

    #[test]
    fn capabilities() {
        let baremetal = infrastructure("bm", "type: baremetal");
        assert_eq!(baremetal.provides(Capability::Baremetal), Ok(true));
        assert_eq!(baremetal.provides(Capability::FullClone), Ok(false));
        assert!(infrastructure("bad", "type: 1")
            .provides(Capability::Baremetal)
            .is_err());
    }

    #[test]
    fn networks() {
        assert!(infrastructure("dummy", "type: rhev")
            .networks()
            .unwrap()
            .is_empty());

        let infrastructure = infrastructure(
            "dummy",
            r#"
            type: rhev
            networks:
              net1: ~
              net2:
                ip_defgw: 172.17.27.1
                netmask: 255.255.255.0
            "#,
        );
        let networks = infrastructure.networks().unwrap();
        assert_eq!(networks.keys().collect::<Vec<_>>(), vec!["net1", "net2"]);
        assert!(infrastructure.validate().is_ok());
    }

    #[test]
    fn invalid_networks() {
        assert!(infrastructure("dummy", "type: rhev\nnetworks: invalid")
            .networks()
            .is_err());
    }

    #[test]
    fn affinity_groups() {
        let infrastructure = infrastructure(
            "dummy",
            r#"
            type: rhev
            affinity_groups:
              ag1: {positive: true, enforce: false, cluster: cl1}
              ag2: {positive: false, enforce: false, cluster: cl1}
            "#,
        );
        assert_eq!(infrastructure.affinity_groups().unwrap().len(), 2);
        assert!(infrastructure.validate().is_ok());
    }

    #[test]
    fn invalid_affinity_groups() {
        for yaml in [
            "type: rhev\naffinity_groups: invalid",
            "type: rhev\naffinity_groups: {1: {}}",
            "type: rhev\naffinity_groups: {ag1: invalid}",
            "type: rhev\naffinity_groups: {ag1: ~}",
        ] {
            assert!(infrastructure("dummy", yaml).affinity_groups().is_err(), "{yaml}");
        }
    }

    #[test]
    fn credential_reference() {
        let mut credentials = Credentials::new();
        credentials.insert(
            "rhev_login".into(),
            Credential::new("rhev_login", crate::value!("type: username_password")),
        );
        let credentials = Arc::new(credentials);

        let infrastructure = Infrastructure::new(
            "rhev",
            crate::value!("type: rhev\ncredentials: rhev_login"),
            Arc::clone(&credentials),
        );
        assert_eq!(
            infrastructure.credential().unwrap().map(Credential::name),
            Some("rhev_login")
        );

        let infrastructure = Infrastructure::new(
            "rhev",
            crate::value!("type: rhev\ncredentials: unknown"),
            credentials,
        );
        assert!(infrastructure.credential().is_err());
    }

    #[test]
    fn endpoint() {
        assert_eq!(
            infrastructure("i", "type: rhev\nendpoint: https://rhev.example.com/api").endpoint(),
            Ok(Some("https://rhev.example.com/api"))
        );
        assert!(infrastructure("i", "type: rhev\nendpoint: rhev.example.com")
            .endpoint()
            .is_err());
    }
}
