use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::infrastructure::Infrastructure;
use crate::lazy::Memo;
use crate::provider::ProviderKind;
use crate::util::{optional_string, optional_string_list};
use crate::value::{Map, Value};
use std::sync::Arc;

/// Provider specific placement settings of a node
///
/// Which keys are required or allowed is decided by the provider of the node's infrastructure.
#[derive(Debug)]
pub struct InfrastructureProperties {
    raw: Value,
    entity: Entity,
    infrastructure: Arc<Infrastructure>,
    schema: Memo<ProviderKind>,
    affinity_groups: Memo<Vec<String>>,
}

impl InfrastructureProperties {
    /// `raw` may be `null` if the node has no properties
    pub fn new(node: &str, raw: Value, infrastructure: Arc<Infrastructure>) -> Self {
        Self {
            entity: Entity::new(EntityKind::InfrastructureProperties, node),
            raw,
            infrastructure,
            schema: Memo::new(),
            affinity_groups: Memo::new(),
        }
    }

    /// Check the keys against the provider schema
    pub fn check(&self) -> Result<ProviderKind> {
        self.schema
            .get_or_try_init(|| {
                let provider = self.infrastructure.provider()?;
                let empty = Map::new();
                let map = match &self.raw {
                    Value::Null => &empty,
                    Value::Object(map) => map,
                    other => {
                        return Err(self.entity.error(
                            "infrastructure_properties",
                            format!("'infrastructure_properties' has to be a hash, not {}", other.kind()),
                        ))
                    }
                };

                for key in map.keys() {
                    let allowed = key
                        .as_str()
                        .is_some_and(|key| provider.allowed_properties().contains(&key));
                    if !allowed {
                        return Err(self.entity.error(
                            "infrastructure_properties",
                            format!("'{key}' is not supported by the {provider} provider"),
                        ));
                    }
                }

                for key in provider.required_properties() {
                    if !self.raw.field(key).is_some_and(|value| value.as_str().is_some()) {
                        return Err(self.entity.error(
                            "infrastructure_properties",
                            format!("the {provider} provider requires '{key}' to be set to a string"),
                        ));
                    }
                }

                Ok(provider)
            })
            .copied()
    }

    pub fn datacenter(&self) -> Result<Option<&str>> {
        self.string("datacenter")
    }

    pub fn cluster(&self) -> Result<Option<&str>> {
        self.string("cluster")
    }

    pub fn default_pool(&self) -> Result<Option<&str>> {
        self.string("default_pool")
    }

    pub fn dest_folder(&self) -> Result<Option<&str>> {
        self.string("dest_folder")
    }

    pub fn tenant(&self) -> Result<Option<&str>> {
        self.string("tenant")
    }

    /// Affinity groups of the infrastructure the node joins
    pub fn affinity_groups(&self) -> Result<&[String]> {
        self.affinity_groups
            .resolve(
                || {
                    self.check()?;
                    optional_string_list(&self.entity, &self.raw, "affinity_groups")
                },
                |names| {
                    let known = self.infrastructure.affinity_groups()?;
                    match names.iter().find(|name| !known.contains_key(name.as_str())) {
                        Some(unknown) => Err(self.entity.error(
                            "affinity_groups",
                            format!(
                                "the affinity group '{unknown}' is not defined in infrastructure {}",
                                self.infrastructure.name()
                            ),
                        )),
                        None => Ok(names),
                    }
                },
                Vec::new,
            )
            .map(Vec::as_slice)
    }

    fn string(&self, key: &'static str) -> Result<Option<&str>> {
        self.check()?;
        optional_string(&self.entity, &self.raw, key)
    }
}

impl Validate for InfrastructureProperties {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        if diagnostics.check(self.check()).is_none() {
            return;
        }
        for key in ["datacenter", "cluster", "default_pool", "dest_folder", "tenant"] {
            diagnostics.check(self.string(key));
        }
        diagnostics.check(self.affinity_groups());
    }
}
