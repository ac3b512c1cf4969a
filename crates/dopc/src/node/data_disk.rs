use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::infrastructure::Infrastructure;
use crate::lazy::Memo;
use crate::provider::Capability;
use crate::util::{optional_bool, optional_string};
use crate::value::Value;
use std::sync::Arc;

/// Disk size in bytes
///
/// Parsed from `<n><unit>`: `K`, `M`, `G`, `T` are binary units (1024 based),
/// `KB`, `MB`, `GB`, `TB` are decimal units (1000 based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DataSize(u64);

impl DataSize {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is not a size like 10G or 1000MB")]
pub struct InvalidDataSize(String);

impl std::str::FromStr for DataSize {
    type Err = InvalidDataSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidDataSize(s.to_string());
        let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let (number, unit) = s.split_at(split);
        let number: u64 = number.parse().map_err(|_| invalid())?;

        let (prefix, base) = match unit.strip_suffix('B') {
            Some(prefix) => (prefix, 1000u64),
            None => (unit, 1024u64),
        };
        let exponent = match prefix {
            "K" => 1,
            "M" => 2,
            "G" => 3,
            "T" => 4,
            _ => return Err(invalid()),
        };

        number
            .checked_mul(base.pow(exponent))
            .map(DataSize)
            .ok_or_else(invalid)
    }
}

#[derive(Debug)]
pub struct DataDisk {
    name: String,
    raw: Value,
    entity: Entity,
    infrastructure: Arc<Infrastructure>,
    default_pool: Option<String>,
    pool: Memo<Option<String>>,
    size: Memo<DataSize>,
    thin: Memo<bool>,
}

impl DataDisk {
    /// `default_pool` comes from the infrastructure properties of the node
    pub fn new(
        name: impl Into<String>,
        raw: Value,
        infrastructure: Arc<Infrastructure>,
        default_pool: Option<String>,
    ) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::DataDisk, &name),
            name,
            raw,
            infrastructure,
            default_pool,
            pool: Memo::new(),
            size: Memo::new(),
            thin: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage pool, required unless the provider can pick one itself
    pub fn pool(&self) -> Result<Option<&str>> {
        self.pool
            .get_or_try_init(|| {
                if let Some(pool) = optional_string(&self.entity, &self.raw, "pool")? {
                    return Ok(Some(pool.to_string()));
                }
                if self.default_pool.is_some()
                    || self.infrastructure.provides(Capability::OptionalDiskPool)?
                {
                    return Ok(self.default_pool.clone());
                }
                Err(self.entity.error(
                    "pool",
                    format!(
                        "a 'pool' is required for the {} provider",
                        self.infrastructure.provider()?
                    ),
                ))
            })
            .map(Option::as_deref)
    }

    pub fn size(&self) -> Result<DataSize> {
        self.size
            .get_or_try_init(|| {
                let Some(size) = self.raw.field("size") else {
                    return Err(self.entity.error("size", "a 'size' has to be specified"));
                };
                size.as_str()
                    .ok_or_else(|| self.entity.error("size", "the 'size' has to be a string"))?
                    .parse::<DataSize>()
                    .map_err(|e| self.entity.error("size", e.to_string()))
            })
            .copied()
    }

    pub fn thin(&self) -> Result<bool> {
        self.thin
            .resolve(|| optional_bool(&self.entity, &self.raw, "thin"), Ok, || true)
            .copied()
    }
}

impl Validate for DataDisk {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.pool());
        diagnostics.check(self.size());
        diagnostics.check(self.thin());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn disk(provider: &str, yaml: &str, default_pool: Option<&str>) -> DataDisk {
        let infrastructure = Infrastructure::new(
            provider,
            crate::value!(&format!("type: {provider}")),
            Default::default(),
        );
        DataDisk::new(
            "foo",
            crate::value!(yaml),
            Arc::new(infrastructure),
            default_pool.map(str::to_string),
        )
    }

    #[test]
    fn sizes() {
        assert_eq!("1000K".parse::<DataSize>().unwrap().bytes(), 1_024_000);
        assert_eq!("1000KB".parse::<DataSize>().unwrap().bytes(), 1_000_000);
        assert_eq!("10G".parse::<DataSize>().unwrap().bytes(), 10 * 1024 * 1024 * 1024);
        assert_eq!("1000GB".parse::<DataSize>().unwrap().bytes(), 1_000_000_000_000);
        for invalid in ["", "10", "G", "10X", "10 G", "-1G"] {
            assert!(invalid.parse::<DataSize>().is_err(), "{invalid}");
        }
    }

    #[test]
    fn pool() {
        for provider in ["rhev", "vsphere", "rhos", "baremetal"] {
            assert_eq!(disk(provider, "pool: foo", None).pool(), Ok(Some("foo")));
            assert_eq!(disk(provider, "{}", Some("bar")).pool(), Ok(Some("bar")));
        }
        for optional in ["rhos", "baremetal"] {
            assert_eq!(disk(optional, "{}", None).pool(), Ok(None));
        }
        for required in ["rhev", "vsphere"] {
            assert!(disk(required, "{}", None).pool().is_err());
        }
        for invalid in ["pool: []", "pool: {}", "pool: 2"] {
            assert!(disk("rhev", invalid, None).pool().is_err(), "{invalid}");
        }
    }

    #[test]
    fn size_is_required() {
        for invalid in ["size: ~", "size: []", "size: {}"] {
            assert!(disk("baremetal", invalid, None).size().is_err(), "{invalid}");
        }
        assert!(disk("baremetal", "size: 10G", None).size().is_ok());
    }

    #[test]
    fn thin() {
        assert_eq!(disk("baremetal", "{}", None).thin(), Ok(true));
        assert_eq!(disk("baremetal", "thin: false", None).thin(), Ok(false));
        for invalid in ["thin: 'true'", "thin: []", "thin: {}", "thin: ':false'"] {
            assert!(disk("baremetal", invalid, None).thin().is_err(), "{invalid}");
        }
    }
}
