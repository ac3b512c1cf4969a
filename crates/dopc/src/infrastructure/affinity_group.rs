use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::lazy::Memo;
use crate::util::{required_bool, required_string};
use crate::value::Value;

/// Placement rule for the nodes of a cluster
#[derive(Debug)]
pub struct AffinityGroup {
    name: String,
    raw: Value,
    entity: Entity,
    positive: Memo<bool>,
    enforce: Memo<bool>,
    cluster: Memo<String>,
}

impl AffinityGroup {
    pub fn new(name: impl Into<String>, raw: Value) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::AffinityGroup, &name),
            name,
            raw,
            positive: Memo::new(),
            enforce: Memo::new(),
            cluster: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keep nodes together (`true`) or apart (`false`)
    pub fn positive(&self) -> Result<bool> {
        self.positive
            .get_or_try_init(|| required_bool(&self.entity, &self.raw, "positive"))
            .copied()
    }

    pub fn enforce(&self) -> Result<bool> {
        self.enforce
            .get_or_try_init(|| required_bool(&self.entity, &self.raw, "enforce"))
            .copied()
    }

    pub fn cluster(&self) -> Result<&str> {
        self.cluster
            .get_or_try_init(|| {
                required_string(&self.entity, &self.raw, "cluster").map(str::to_string)
            })
            .map(String::as_str)
    }
}

impl Validate for AffinityGroup {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.positive());
        diagnostics.check(self.enforce());
        diagnostics.check(self.cluster());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn complete() {
        let group = AffinityGroup::new(
            "ag1",
            crate::value!("positive: true\nenforce: false\ncluster: cl1"),
        );
        assert!(group.validate().is_ok());
        assert_eq!(group.cluster(), Ok("cl1"));
    }

    #[test]
    fn every_field_is_reported() {
        let group = AffinityGroup::new("ag1", crate::value!("positive: 'yes'"));
        assert_eq!(group.validate().unwrap_err().len(), 3);
    }
}
