//! capability registry
//!
//! Every infrastructure has exactly one [ProviderKind]. Which node fields are required, forbidden or
//! defaulted depends on the [Capability] set of that kind, never on the provider string itself.

/// Feature tags a provider may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Nodes are physical machines, no image is deployed
    Baremetal,
    /// Nodes may be created as full (non linked) clones
    FullClone,
    /// Data disks can be created without naming a storage pool
    OptionalDiskPool,
}

/// Known infrastructure provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Ovirt,
    Openstack,
    Vsphere,
    Baremetal,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ovirt,
        ProviderKind::Openstack,
        ProviderKind::Vsphere,
        ProviderKind::Baremetal,
    ];

    pub const fn capabilities(self) -> &'static [Capability] {
        match self {
            ProviderKind::Ovirt => &[Capability::FullClone],
            ProviderKind::Openstack => &[Capability::OptionalDiskPool],
            ProviderKind::Vsphere => &[],
            ProviderKind::Baremetal => &[Capability::Baremetal, Capability::OptionalDiskPool],
        }
    }

    pub fn provides(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Keys a node's `infrastructure_properties` must contain for this provider
    pub const fn required_properties(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Ovirt | ProviderKind::Vsphere => &["datacenter", "cluster"],
            ProviderKind::Openstack => &["tenant"],
            ProviderKind::Baremetal => &[],
        }
    }

    /// Keys a node's `infrastructure_properties` may contain for this provider
    pub const fn allowed_properties(self) -> &'static [&'static str] {
        match self {
            ProviderKind::Ovirt => &["datacenter", "cluster", "default_pool", "affinity_groups"],
            ProviderKind::Vsphere => &[
                "datacenter",
                "cluster",
                "default_pool",
                "dest_folder",
                "affinity_groups",
            ],
            ProviderKind::Openstack => &["tenant", "default_pool"],
            ProviderKind::Baremetal => &["default_pool"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Ovirt => "ovirt",
            ProviderKind::Openstack => "openstack",
            ProviderKind::Vsphere => "vsphere",
            ProviderKind::Baremetal => "baremetal",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown provider type '{0}'")]
pub struct UnknownProvider(pub String);

impl std::str::FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(':').unwrap_or(s) {
            "ovirt" | "rhev" => Ok(ProviderKind::Ovirt),
            "openstack" | "rhos" => Ok(ProviderKind::Openstack),
            "vsphere" | "vmware" => Ok(ProviderKind::Vsphere),
            "baremetal" => Ok(ProviderKind::Baremetal),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
