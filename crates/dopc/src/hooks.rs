//! programs run around the lifecycle of a VM
use crate::error::{Entity, EntityKind, Result};
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    PreCreateVm,
    PostCreateVm,
    PreUpdateVm,
    PostUpdateVm,
    PreDestroyVm,
    PostDestroyVm,
}

impl HookKind {
    pub const ALL: [HookKind; 6] = [
        HookKind::PreCreateVm,
        HookKind::PostCreateVm,
        HookKind::PreUpdateVm,
        HookKind::PostUpdateVm,
        HookKind::PreDestroyVm,
        HookKind::PostDestroyVm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::PreCreateVm => "pre_create_vm",
            HookKind::PostCreateVm => "post_create_vm",
            HookKind::PreUpdateVm => "pre_update_vm",
            HookKind::PostUpdateVm => "post_update_vm",
            HookKind::PreDestroyVm => "pre_destroy_vm",
            HookKind::PostDestroyVm => "post_destroy_vm",
        }
    }
}

impl std::str::FromStr for HookKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        HookKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hook programs per lifecycle event, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    hooks: IndexMap<HookKind, Vec<String>>,
}

impl Hooks {
    /// Parse the `hooks` value of a plan, `None` if the key is absent
    pub fn from_value(raw: Option<&Value>) -> Result<Self> {
        let entity = Entity::anonymous(EntityKind::Plan);
        let Some(raw) = raw else {
            return Ok(Hooks::default());
        };
        let map = raw
            .as_object()
            .filter(|map| !map.is_empty())
            .ok_or_else(|| entity.error("hooks", "hooks, if specified, must be a non-empty hash"))?;

        let mut hooks = IndexMap::new();
        for (key, programs) in map {
            let kind = key
                .as_str()
                .and_then(|key| key.parse::<HookKind>().ok())
                .ok_or_else(|| entity.error("hooks", format!("invalid hook name '{key}'")))?;
            let programs = match programs {
                Value::Null => Vec::new(),
                Value::String(program) => vec![program.clone()],
                Value::Array(list) => list
                    .iter()
                    .map(|program| program.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        entity.error("hooks", format!("the programs of hook '{kind}' must be strings"))
                    })?,
                _ => {
                    return Err(entity.error(
                        "hooks",
                        format!("hook '{kind}' must be a program or a list of programs"),
                    ))
                }
            };
            hooks.insert(kind, programs);
        }
        Ok(Hooks { hooks })
    }

    /// Programs of `kind`, empty if none are set
    pub fn get(&self, kind: HookKind) -> &[String] {
        self.hooks.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hooks(yaml: &str) -> Result<Hooks> {
        Hooks::from_value(Some(&crate::value!(yaml)))
    }

    #[test]
    fn absent_is_empty() {
        let hooks = Hooks::from_value(None).unwrap();
        assert!(hooks.is_empty());
        assert!(hooks.get(HookKind::PreCreateVm).is_empty());
    }

    #[test]
    fn every_legal_key() {
        for kind in HookKind::ALL {
            let hooks = hooks(&format!("{kind}: []")).unwrap();
            assert!(hooks.get(kind).is_empty());
        }
    }

    #[test]
    fn programs() {
        let hooks = hooks("pre_create_vm: /usr/bin/notify\npost_destroy_vm: [/bin/a, /bin/b]").unwrap();
        assert_eq!(hooks.get(HookKind::PreCreateVm), ["/usr/bin/notify".to_string()]);
        assert_eq!(hooks.get(HookKind::PostDestroyVm).len(), 2);
        assert!(!hooks.is_empty());
    }

    #[test]
    fn invalid() {
        assert_eq!(
            hooks("{}").unwrap_err().to_string(),
            "Plan: hooks, if specified, must be a non-empty hash"
        );
        assert_eq!(
            hooks("invalid: [/foo/bar/baz]").unwrap_err().to_string(),
            "Plan: invalid hook name 'invalid'"
        );
        assert!(hooks("pre_create_vm: [1]").is_err());
        assert!(hooks("pre_create_vm: {a: b}").is_err());
        assert!(hooks("[pre_create_vm]").is_err());
    }
}
