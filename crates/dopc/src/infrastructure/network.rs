use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::lazy::Memo;
use crate::value::Value;
use std::net::{IpAddr, Ipv4Addr};

/// Address range handed out to interfaces of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpPool {
    pub from: Ipv4Addr,
    pub to: Ipv4Addr,
}

#[derive(Debug)]
pub struct Network {
    name: String,
    raw: Value,
    entity: Entity,
    ip_pool: Memo<Option<IpPool>>,
    ip_defgw: Memo<Option<IpAddr>>,
    ip_netmask: Memo<Option<IpAddr>>,
}

impl Network {
    /// A `null` definition is an empty network
    pub fn new(name: impl Into<String>, raw: Value) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::Network, &name),
            name,
            raw,
            ip_pool: Memo::new(),
            ip_defgw: Memo::new(),
            ip_netmask: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ip_pool(&self) -> Result<Option<IpPool>> {
        self.ip_pool
            .resolve(
                || Ok(self.raw.field("ip_pool")),
                |pool| {
                    let from = self.ipv4(pool, "from")?;
                    let to = self.ipv4(pool, "to")?;
                    if from > to {
                        return Err(self.entity.error(
                            "ip_pool",
                            format!("'ip_pool' starts at {from} which is after its end {to}"),
                        ));
                    }
                    Ok(Some(IpPool { from, to }))
                },
                || None,
            )
            .copied()
    }

    pub fn ip_defgw(&self) -> Result<Option<IpAddr>> {
        self.ip_defgw
            .resolve(
                || Ok(self.raw.field("ip_defgw")),
                |raw| self.ip(raw, "ip_defgw").map(Some),
                || None,
            )
            .copied()
    }

    pub fn ip_netmask(&self) -> Result<Option<IpAddr>> {
        self.ip_netmask
            .resolve(
                || Ok(self.raw.field("ip_netmask").or(self.raw.field("netmask"))),
                |raw| self.ip(raw, "ip_netmask").map(Some),
                || None,
            )
            .copied()
    }

    fn ip(&self, raw: &Value, field: &'static str) -> Result<IpAddr> {
        raw.as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.entity.error(field, format!("'{field}' has to be an IP address")))
    }

    fn ipv4(&self, pool: &Value, bound: &str) -> Result<Ipv4Addr> {
        pool.field(bound)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                self.entity.error(
                    "ip_pool",
                    format!("'ip_pool' needs '{bound}' set to an IPv4 address"),
                )
            })
    }
}

impl Validate for Network {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        if !self.raw.is_null() && self.raw.as_object().is_none() {
            diagnostics.log(self.entity.error("network", "a network has to be a hash"));
            return;
        }
        diagnostics.check(self.ip_pool());
        diagnostics.check(self.ip_defgw());
        diagnostics.check(self.ip_netmask());
    }
}
