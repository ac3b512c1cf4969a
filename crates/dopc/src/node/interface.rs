use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::infrastructure::{Infrastructure, Network};
use crate::lazy::Memo;
use crate::util::{optional_bool, optional_string, required_string};
use crate::value::Value;
use std::net::IpAddr;
use std::sync::Arc;

/// How an interface gets its address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpSetting {
    Dhcp,
    None,
    Address(IpAddr),
}

#[derive(Debug)]
pub struct Interface {
    name: String,
    raw: Value,
    entity: Entity,
    infrastructure: Arc<Infrastructure>,
    network: Memo<String>,
    ip: Memo<IpSetting>,
    set_gateway: Memo<bool>,
    virtual_switch: Memo<Option<String>>,
}

impl Interface {
    pub fn new(name: impl Into<String>, raw: Value, infrastructure: Arc<Infrastructure>) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::Interface, &name),
            name,
            raw,
            infrastructure,
            network: Memo::new(),
            ip: Memo::new(),
            set_gateway: Memo::new(),
            virtual_switch: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The network of the node's infrastructure this interface is attached to
    pub fn network(&self) -> Result<&Network> {
        let name = self.network.get_or_try_init(|| {
            let name = required_string(&self.entity, &self.raw, "network")?;
            if self.infrastructure.networks()?.contains_key(name) {
                Ok(name.to_string())
            } else {
                Err(self.entity.error(
                    "network",
                    format!(
                        "the network '{name}' is not defined in infrastructure {}",
                        self.infrastructure.name()
                    ),
                ))
            }
        })?;
        self.infrastructure
            .networks()?
            .get(name)
            .ok_or_else(|| self.entity.error("network", format!("the network '{name}' vanished")))
    }

    pub fn ip(&self) -> Result<IpSetting> {
        self.ip
            .resolve(
                || optional_string(&self.entity, &self.raw, "ip"),
                |ip| match ip.strip_prefix(':').unwrap_or(ip) {
                    "dhcp" => Ok(IpSetting::Dhcp),
                    "none" => Ok(IpSetting::None),
                    address => {
                        let address: IpAddr = address.parse().map_err(|_| {
                            self.entity.error(
                                "ip",
                                format!("'ip' has to be 'dhcp', 'none' or an IP address, not '{address}'"),
                            )
                        })?;
                        self.check_pool(address)?;
                        Ok(IpSetting::Address(address))
                    }
                },
                || IpSetting::Dhcp,
            )
            .copied()
    }

    pub fn set_gateway(&self) -> Result<bool> {
        self.set_gateway
            .resolve(
                || optional_bool(&self.entity, &self.raw, "set_gateway"),
                Ok,
                || true,
            )
            .copied()
    }

    pub fn virtual_switch(&self) -> Result<Option<&str>> {
        self.virtual_switch
            .resolve(
                || optional_string(&self.entity, &self.raw, "virtual_switch"),
                |switch| Ok(Some(switch.to_string())),
                || None,
            )
            .map(Option::as_deref)
    }

    /// A static address has to be inside the pool of its network, if the network has one
    fn check_pool(&self, address: IpAddr) -> Result<()> {
        let Some(pool) = self.network()?.ip_pool()? else {
            return Ok(());
        };
        match address {
            IpAddr::V4(v4) if (pool.from..=pool.to).contains(&v4) => Ok(()),
            _ => Err(self.entity.error(
                "ip",
                format!(
                    "'ip' {address} is outside of the pool {} - {} of network {}",
                    pool.from,
                    pool.to,
                    self.network()?.name()
                ),
            )),
        }
    }
}

impl Validate for Interface {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.network());
        diagnostics.check(self.ip());
        diagnostics.check(self.set_gateway());
        diagnostics.check(self.virtual_switch());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn infrastructure() -> Arc<Infrastructure> {
        Arc::new(Infrastructure::new(
            "rhev",
            crate::value!(
                r#"
                type: rhev
                networks:
                  management:
                    ip_pool: {from: 192.168.1.10, to: 192.168.1.20}
                  storage: ~
                "#
            ),
            Default::default(),
        ))
    }

    #[test]
    fn defaults() {
        let interface = Interface::new("eth0", crate::value!("network: storage"), infrastructure());
        assert!(interface.validate().is_ok());
        assert_eq!(interface.ip(), Ok(IpSetting::Dhcp));
        assert_eq!(interface.set_gateway(), Ok(true));
        assert_eq!(interface.virtual_switch(), Ok(None));
    }

    #[test]
    fn static_address_in_pool() {
        let interface = Interface::new(
            "eth0",
            crate::value!("network: management\nip: 192.168.1.15\nset_gateway: false"),
            infrastructure(),
        );
        assert_eq!(
            interface.ip(),
            Ok(IpSetting::Address("192.168.1.15".parse().unwrap()))
        );
        assert_eq!(interface.set_gateway(), Ok(false));
    }

    #[test]
    fn static_address_outside_pool() {
        let interface = Interface::new(
            "eth0",
            crate::value!("network: management\nip: 192.168.1.50"),
            infrastructure(),
        );
        assert_eq!(interface.ip().unwrap_err().field(), "ip");
    }

    #[test]
    fn unknown_network() {
        let interface = Interface::new("eth0", crate::value!("network: backup"), infrastructure());
        assert_eq!(
            interface.network().unwrap_err().to_string(),
            "Interface eth0: the network 'backup' is not defined in infrastructure rhev"
        );
    }
}
