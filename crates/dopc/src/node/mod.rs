//! nodes and the inflation of node series
//!
//! A node declared as `web{i}.example.com` with a `range` of `"1..3"` is not a node itself. It
//! describes the series `web01.example.com`, `web02.example.com` and `web03.example.com` (see
//! [Node::inflate]).
//!
//! Everything that does not depend on the node name is resolved once per declaration and shared by
//! all nodes of the series: the infrastructure reference, image, full clone flag, interfaces,
//! infrastructure properties and data disks. Name, FQDN, digits and range belong to each node.
mod data_disk;
mod infrastructure_properties;
mod interface;

pub use data_disk::{DataDisk, DataSize, InvalidDataSize};
pub use infrastructure_properties::InfrastructureProperties;
pub use interface::{Interface, IpSetting};

use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::infrastructure::{Infrastructure, Infrastructures};
use crate::lazy::Memo;
use crate::provider::Capability;
use crate::util::{optional_positive_integer, optional_string_map};
use crate::value::{Map, Value};
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};

/// Marks a node declaration as a series
pub const PLACEHOLDER: &str = "{i}";

/// Width of the zero padded index if `digits` is not given
pub const DEFAULT_DIGITS: usize = 2;

/// Largest number of nodes one series may declare
pub const MAX_SERIES_LENGTH: u64 = 10_000;

/// Widest padding `digits` may ask for, enough for every `u64`
pub const MAX_DIGITS: usize = 20;

pub const MAX_FQDN_LENGTH: usize = 255;
pub const MAX_LABEL_LENGTH: usize = 63;

#[derive(Debug)]
pub struct Node {
    name: String,
    entity: Entity,
    /// Zero padded series index, substituted into an explicit `fqdn`
    index: Option<String>,
    digits: Memo<usize>,
    range: Memo<Option<RangeInclusive<u64>>>,
    fqdn: Memo<String>,
    declaration: Arc<Declaration>,
}

/// State shared by all nodes inflated from one declaration
#[derive(Debug)]
struct Declaration {
    raw: Value,
    entity: Entity,
    infrastructures: Arc<Infrastructures>,
    infrastructure: Memo<Arc<Infrastructure>>,
    image: Memo<Option<String>>,
    full_clone: Memo<bool>,
    interfaces: Memo<Vec<Interface>>,
    infrastructure_properties: Memo<InfrastructureProperties>,
    data_disks: Memo<Vec<DataDisk>>,
}

impl Node {
    /// `infrastructures` are the already parsed infrastructures of the plan
    pub fn new(name: impl Into<String>, raw: Value, infrastructures: Arc<Infrastructures>) -> Self {
        let name = name.into();
        let declaration = Declaration {
            raw,
            entity: Entity::new(EntityKind::Node, &name),
            infrastructures,
            infrastructure: Memo::new(),
            image: Memo::new(),
            full_clone: Memo::new(),
            interfaces: Memo::new(),
            infrastructure_properties: Memo::new(),
            data_disks: Memo::new(),
        };
        Self::with_declaration(name, None, Arc::new(declaration))
    }

    fn with_declaration(name: String, index: Option<String>, declaration: Arc<Declaration>) -> Self {
        Self {
            entity: Entity::new(EntityKind::Node, &name),
            name,
            index,
            digits: Memo::new(),
            range: Memo::new(),
            fqdn: Memo::new(),
            declaration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this node describes a series of nodes
    pub fn inflatable(&self) -> bool {
        self.name.contains(PLACEHOLDER)
    }

    /// Replace a series declaration by the nodes of the series
    ///
    /// Nodes that are not inflatable are returned as they are.
    pub fn inflate(self) -> Result<Vec<Node>> {
        if !self.inflatable() {
            return Ok(vec![self]);
        }
        self.series()
    }

    fn series(&self) -> Result<Vec<Node>> {
        let digits = self.digits()?;
        let range = self.range()?.ok_or_else(|| {
            self.entity
                .error("range", "'range' has to be specified if the node is inflatable")
        })?;

        tracing::debug!(node = %self.name, ?range, digits, "inflating node series");
        Ok(range
            .map(|number| {
                let index = format!("{number:0digits$}");
                Node::with_declaration(
                    self.name.replace(PLACEHOLDER, &index),
                    Some(index),
                    Arc::clone(&self.declaration),
                )
            })
            .collect())
    }

    pub fn digits(&self) -> Result<usize> {
        self.digits
            .resolve(
                || {
                    if !self.inflatable() {
                        return Ok(None);
                    }
                    optional_positive_integer(&self.entity, self.raw(), "digits")
                },
                |digits| {
                    usize::try_from(digits)
                        .ok()
                        .filter(|digits| *digits <= MAX_DIGITS)
                        .ok_or_else(|| {
                            self.entity.error(
                                "digits",
                                format!("'digits' must not be larger than {MAX_DIGITS}"),
                            )
                        })
                },
                || DEFAULT_DIGITS,
            )
            .copied()
    }

    /// Numbers of the series, only used when the node is inflatable
    pub fn range(&self) -> Result<Option<RangeInclusive<u64>>> {
        self.range
            .resolve(|| self.range_valid(), |range| Ok(Some(range)), || None)
            .cloned()
    }

    fn range_valid(&self) -> Result<Option<RangeInclusive<u64>>> {
        // a range on a node that is not inflatable is ignored
        if !self.inflatable() {
            return Ok(None);
        }
        let Some(range) = self.raw().field("range") else {
            return Err(self
                .entity
                .error("range", "'range' has to be specified if the node is inflatable"));
        };
        let range = range
            .as_str()
            .ok_or_else(|| self.entity.error("range", "'range' has to be a string"))?;

        let numbers = number_pattern()
            .find_iter(range)
            .map(|number| number.as_str().parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| self.entity.error("range", "the numbers in 'range' are too large"))?;
        let &[first, last] = numbers.as_slice() else {
            return Err(self.entity.error(
                "range",
                "'range' has to be a string which contains exactly two numbers",
            ));
        };
        if first >= last {
            return Err(self.entity.error(
                "range",
                "the first number has to be smaller than the second in 'range'",
            ));
        }
        let length = (last - first).checked_add(1);
        if length.map_or(true, |length| length > MAX_SERIES_LENGTH) {
            return Err(self.entity.error(
                "range",
                format!("'range' must not describe more than {MAX_SERIES_LENGTH} nodes"),
            ));
        }
        Ok(Some(first..=last))
    }

    /// The FQDN, derived from the node name unless `fqdn` is set
    pub fn fqdn(&self) -> Result<&str> {
        self.fqdn
            .get_or_try_init(|| {
                let fqdn = match self.raw().field("fqdn") {
                    None => self.name.clone(),
                    Some(Value::String(fqdn)) => match &self.index {
                        Some(index) => fqdn.replace(PLACEHOLDER, index),
                        None => fqdn.clone(),
                    },
                    Some(_) => return Err(self.entity.error("fqdn", "FQDN must be a string")),
                };
                check_fqdn(&fqdn).map_err(|message| self.entity.error("fqdn", message))?;
                Ok(fqdn.strip_suffix('.').unwrap_or(&fqdn).to_string())
            })
            .map(String::as_str)
    }

    pub fn infrastructure(&self) -> Result<&Infrastructure> {
        self.infrastructure_ref().map(Arc::as_ref)
    }

    fn infrastructure_ref(&self) -> Result<&Arc<Infrastructure>> {
        let declaration = &self.declaration;
        declaration.infrastructure.get_or_try_init(|| {
            let Some(Value::String(name)) = self.raw().field("infrastructure") else {
                return Err(declaration
                    .entity
                    .error("infrastructure", "The 'infrastructure' pointer must be a string"));
            };
            declaration
                .infrastructures
                .get(name)
                .cloned()
                .ok_or_else(|| {
                    declaration
                        .entity
                        .error("infrastructure", format!("No such infrastructure '{name}'"))
                })
        })
    }

    /// Image to deploy, `None` only on bare metal
    pub fn image(&self) -> Result<Option<&str>> {
        let declaration = &self.declaration;
        declaration
            .image
            .resolve(
                || {
                    let baremetal = self.infrastructure()?.provides(Capability::Baremetal)?;
                    match self.raw().field("image") {
                        None if baremetal => Ok(None),
                        None => Err(declaration.entity.error(
                            "image",
                            "an 'image' has to be specified unless the infrastructure is bare metal",
                        )),
                        Some(Value::String(image)) => Ok(Some(image.as_str())),
                        Some(_) => Err(declaration
                            .entity
                            .error("image", "The 'image' must be a string")),
                    }
                },
                |image| Ok(Some(image.to_string())),
                || None,
            )
            .map(Option::as_deref)
    }

    pub fn full_clone(&self) -> Result<bool> {
        let declaration = &self.declaration;
        declaration
            .full_clone
            .resolve(
                || {
                    let Some(full_clone) = self.raw().field("full_clone") else {
                        return Ok(None);
                    };
                    let infrastructure = self.infrastructure()?;
                    if !infrastructure.provides(Capability::FullClone)? {
                        return Err(declaration.entity.error(
                            "full_clone",
                            format!(
                                "The 'full_clone' can not be used with the {} provider",
                                infrastructure.provider()?
                            ),
                        ));
                    }
                    full_clone.as_bool().map(Some).ok_or_else(|| {
                        declaration
                            .entity
                            .error("full_clone", "The 'full_clone', if defined, must be true or false")
                    })
                },
                Ok,
                || true,
            )
            .copied()
    }

    pub fn interfaces(&self) -> Result<&[Interface]> {
        self.declaration
            .interfaces
            .resolve(
                || self.interfaces_valid(),
                |map| {
                    let infrastructure = self.infrastructure_ref()?;
                    Ok(map
                        .iter()
                        .map(|(name, raw)| {
                            Interface::new(name.to_string(), raw.clone(), Arc::clone(infrastructure))
                        })
                        .collect())
                },
                Vec::new,
            )
            .map(Vec::as_slice)
    }

    fn interfaces_valid(&self) -> Result<Option<&Map>> {
        self.string_map_of_maps("interfaces")
    }

    pub fn infrastructure_properties(&self) -> Result<&InfrastructureProperties> {
        self.declaration.infrastructure_properties.get_or_try_init(|| {
            let raw = self
                .raw()
                .field("infrastructure_properties")
                .cloned()
                .unwrap_or(Value::Null);
            let properties = InfrastructureProperties::new(
                self.declaration_name(),
                raw,
                Arc::clone(self.infrastructure_ref()?),
            );
            properties.check()?;
            Ok(properties)
        })
    }

    pub fn data_disks(&self) -> Result<&[DataDisk]> {
        self.declaration
            .data_disks
            .resolve(
                || self.data_disks_valid(),
                |map| {
                    let infrastructure = self.infrastructure_ref()?;
                    let default_pool = self
                        .infrastructure_properties()?
                        .default_pool()?
                        .map(str::to_string);
                    Ok(map
                        .iter()
                        .map(|(name, raw)| {
                            DataDisk::new(
                                name.to_string(),
                                raw.clone(),
                                Arc::clone(infrastructure),
                                default_pool.clone(),
                            )
                        })
                        .collect())
                },
                Vec::new,
            )
            .map(Vec::as_slice)
    }

    fn data_disks_valid(&self) -> Result<Option<&Map>> {
        self.string_map_of_maps("disks")
    }

    fn string_map_of_maps(&self, key: &'static str) -> Result<Option<&Map>> {
        let entity = &self.declaration.entity;
        let Some(map) = optional_string_map(entity, self.raw(), key)? else {
            return Ok(None);
        };
        if map.values().all(|value| value.as_object().is_some()) {
            Ok(Some(map))
        } else {
            Err(entity.error(key, format!("The values in the '{key}' hash have to be hashes")))
        }
    }

    fn raw(&self) -> &Value {
        &self.declaration.raw
    }

    fn declaration_name(&self) -> &str {
        self.declaration.entity.name.as_deref().unwrap_or(&self.name)
    }
}

impl Validate for Node {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.digits());
        diagnostics.check(self.range());

        if self.inflatable() {
            // the declaration itself has no FQDN, its series does
            if let Ok(series) = self.series() {
                for node in &series {
                    node.validate_into(diagnostics);
                }
            }
            return;
        }

        diagnostics.check(self.fqdn());
        diagnostics.check(self.infrastructure());
        diagnostics.check(self.image());
        diagnostics.check(self.full_clone());
        diagnostics.check(self.interfaces_valid());
        diagnostics.check(self.infrastructure_properties());
        diagnostics.check(self.data_disks_valid());

        let context = format!(
            "Node {}: can't validate the interfaces part because of a previous error",
            self.name
        );
        if let Some(interfaces) = diagnostics.check_with_context(&context, self.interfaces()) {
            interfaces
                .iter()
                .for_each(|interface| interface.validate_into(diagnostics));
        }

        if let Ok(properties) = self.infrastructure_properties() {
            properties.validate_into(diagnostics);
        }

        let context = format!(
            "Node {}: can't validate the disks part because of a previous error",
            self.name
        );
        if let Some(disks) = diagnostics.check_with_context(&context, self.data_disks()) {
            disks.iter().for_each(|disk| disk.validate_into(diagnostics));
        }
    }
}

fn number_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\d+").expect("static pattern compiles"))
}

/// DNS name rules, a single trailing dot is allowed
fn check_fqdn(fqdn: &str) -> Result<(), String> {
    if fqdn.len() > MAX_FQDN_LENGTH {
        return Err(format!("FQDN must not exceed {MAX_FQDN_LENGTH} characters"));
    }
    let fqdn = fqdn.strip_suffix('.').unwrap_or(fqdn);
    for label in fqdn.split('.') {
        if label.is_empty() {
            return Err(format!("FQDN '{fqdn}' has an empty label"));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(format!(
                "FQDN label '{label}' exceeds {MAX_LABEL_LENGTH} characters"
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!(
                "FQDN label '{label}' must not start or end with a hyphen"
            ));
        }
        if let Some(invalid) = label.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(format!("FQDN '{fqdn}' contains the invalid character '{invalid}'"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn infrastructures() -> Arc<Infrastructures> {
        let mut infrastructures = Infrastructures::new();
        for (name, yaml) in [
            (
                "rhev",
                "type: rhev\nnetworks: {management: ~}\naffinity_groups: {ag1: {positive: true, enforce: true, cluster: cl1}}",
            ),
            ("baremetal", "type: baremetal"),
            ("vsphere", "type: vsphere"),
        ] {
            infrastructures.insert(
                name.to_string(),
                Arc::new(Infrastructure::new(name, crate::value!(yaml), Default::default())),
            );
        }
        Arc::new(infrastructures)
    }

    fn node(name: &str, yaml: &str) -> Node {
        Node::new(name, crate::value!(yaml), infrastructures())
    }

    const RHEV: &str = "infrastructure: rhev\nimage: rhel7\ninfrastructure_properties: {datacenter: dc1, cluster: cl1}";

    #[test]
    fn inflate_series() {
        let template = node(
            "mynode{i}.example.com",
            &format!("{RHEV}\nrange: '1..10'\ndigits: 3"),
        );
        let nodes = template.inflate().unwrap();

        assert_eq!(nodes.len(), 10);
        assert_eq!(nodes[0].name(), "mynode001.example.com");
        assert_eq!(nodes[9].name(), "mynode010.example.com");
        assert_eq!(nodes[9].fqdn(), Ok("mynode010.example.com"));
        assert!(nodes.iter().all(|node| !node.inflatable()));
    }

    #[test]
    fn inflated_nodes_share_declaration_state() {
        let nodes = node("web{i}", &format!("{RHEV}\nrange: '8..9'"))
            .inflate()
            .unwrap();
        assert_eq!(
            nodes.iter().map(Node::name).collect::<Vec<_>>(),
            vec!["web08", "web09"]
        );
        let first = nodes[0].infrastructure().unwrap() as *const Infrastructure;
        let second = nodes[1].infrastructure().unwrap() as *const Infrastructure;
        assert_eq!(first, second);
        assert_eq!(nodes[1].image(), Ok(Some("rhel7")));
    }

    #[test]
    fn padding_overflows_instead_of_truncating() {
        let nodes = node("n{i}", &format!("{RHEV}\nrange: '99..100'\ndigits: 1"))
            .inflate()
            .unwrap();
        assert_eq!(nodes[1].name(), "n100");
    }

    #[test]
    fn explicit_fqdn_is_inflated_too() {
        let nodes = node(
            "db{i}",
            &format!("{RHEV}\nrange: '1..2'\nfqdn: 'db{{i}}.prod.example.com.'"),
        )
        .inflate()
        .unwrap();
        assert_eq!(nodes[1].fqdn(), Ok("db02.prod.example.com"));
    }

    #[test]
    fn not_inflatable_passes_through() {
        let nodes = node("single", RHEV).inflate().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name(), "single");
    }

    #[test]
    fn range_is_required_for_series() {
        let template = node("web{i}", RHEV);
        assert_eq!(template.range().unwrap_err().field(), "range");
        assert!(template.inflate().is_err());
    }

    #[test]
    fn range_on_single_node_is_ignored() {
        assert_eq!(node("single", &format!("{RHEV}\nrange: 'garbage'")).range(), Ok(None));
    }

    #[test]
    fn invalid_ranges() {
        for range in ["range: 1", "range: '1'", "range: '1..2..3'", "range: '5..5'", "range: '10..9'"] {
            assert!(node("web{i}", range).range().is_err(), "{range}");
        }
        // compared as numbers, not as strings
        assert_eq!(node("web{i}", "range: '9..10'").range(), Ok(Some(9..=10)));
    }

    #[test]
    fn oversized_series_are_rejected() {
        for range in ["range: '0..18446744073709551615'", "range: '0..99999999999'", "range: '1..10001'"] {
            let error = node("web{i}", range).inflate().unwrap_err();
            assert_eq!(error.field(), "range", "{range}");
        }
        assert_eq!(
            node("web{i}", "range: '1..10000'").inflate().unwrap().len(),
            MAX_SERIES_LENGTH as usize
        );

        let error = node("web{i}", "{range: '1..2', digits: 1000000000000}")
            .inflate()
            .unwrap_err();
        assert_eq!(error.field(), "digits");
        let widest = node("web{i}", "{range: '1..2', digits: 20}").inflate().unwrap();
        assert_eq!(widest[1].name(), format!("web{:020}", 2));
    }

    #[test]
    fn digits() {
        assert_eq!(node("web{i}", "{}").digits(), Ok(DEFAULT_DIGITS));
        assert!(node("web{i}", "digits: 0").digits().is_err());
        assert!(node("web{i}", "digits: two").digits().is_err());
        // ignored on single nodes
        assert_eq!(node("web", "digits: 0").digits(), Ok(DEFAULT_DIGITS));
    }

    #[test]
    fn fqdn_rules() {
        assert_eq!(node("host1.", "{}").fqdn(), Ok("host1"));
        assert!(node(&"a".repeat(64), "{}").fqdn().is_err());
        assert!(node(&"a".repeat(63), "{}").fqdn().is_ok());
        assert!(node("under_score", "{}").fqdn().is_err());
        assert!(node("-host", "{}").fqdn().is_err());
        assert!(node("host-", "{}").fqdn().is_err());
        assert!(node("a..b", "{}").fqdn().is_err());
        assert!(node("valid", "fqdn: 1").fqdn().is_err());

        let long = vec!["a".repeat(63); 4].join(".");
        assert_eq!(long.len(), 255);
        assert!(node(&long, "{}").fqdn().is_ok());
        assert!(node(&format!("{long}b"), "{}").fqdn().is_err());
    }

    #[test]
    fn infrastructure_reference() {
        assert_eq!(
            node("web", "infrastructure: rhev").infrastructure().map(Infrastructure::name),
            Ok("rhev")
        );
        assert_eq!(
            node("web", "infrastructure: missing")
                .infrastructure()
                .unwrap_err()
                .to_string(),
            "Node web: No such infrastructure 'missing'"
        );
        assert!(node("web", "infrastructure: [rhev]").infrastructure().is_err());
    }

    #[test]
    fn image_depends_on_baremetal_capability() {
        assert_eq!(node("web", "infrastructure: baremetal").image(), Ok(None));
        assert!(node("web", "infrastructure: rhev").image().is_err());
        assert!(node("web", "infrastructure: rhev\nimage: 1").image().is_err());
        assert_eq!(
            node("web", "infrastructure: baremetal\nimage: pxe").image(),
            Ok(Some("pxe"))
        );
    }

    #[test]
    fn full_clone_depends_on_capability() {
        for infrastructure in ["rhev", "baremetal", "vsphere"] {
            assert_eq!(
                node("web", &format!("infrastructure: {infrastructure}")).full_clone(),
                Ok(true)
            );
        }
        assert_eq!(
            node("web", "infrastructure: rhev\nfull_clone: false").full_clone(),
            Ok(false)
        );
        assert!(node("web", "infrastructure: vsphere\nfull_clone: true")
            .full_clone()
            .is_err());
        assert!(node("web", "infrastructure: baremetal\nfull_clone: false")
            .full_clone()
            .is_err());
        assert!(node("web", "infrastructure: rhev\nfull_clone: 'no'")
            .full_clone()
            .is_err());
    }

    #[test]
    fn interfaces_and_disks() {
        let web = node(
            "web",
            &format!(
                "{RHEV}\ninterfaces: {{eth0: {{network: management}}}}\ndisks: {{data: {{size: 10G, pool: fast}}}}"
            ),
        );
        assert!(web.validate().is_ok());
        assert_eq!(web.interfaces().unwrap()[0].name(), "eth0");
        assert_eq!(web.data_disks().unwrap()[0].pool(), Ok(Some("fast")));

        assert!(node("web", &format!("{RHEV}\ninterfaces: [eth0]"))
            .interfaces()
            .is_err());
        assert!(node("web", &format!("{RHEV}\ninterfaces: {{eth0: dhcp}}"))
            .interfaces()
            .is_err());
    }

    #[test]
    fn disks_inherit_default_pool() {
        let web = node(
            "web",
            "infrastructure: rhev\nimage: rhel7\ninfrastructure_properties: {datacenter: dc1, cluster: cl1, default_pool: slow}\ndisks: {data: {size: 1G}}",
        );
        assert_eq!(web.data_disks().unwrap()[0].pool(), Ok(Some("slow")));
    }

    #[test]
    fn validation_reports_every_field() {
        let diagnostics = node("web", "infrastructure: vsphere\nfull_clone: true\nfqdn: -web")
            .validate()
            .unwrap_err();
        let fields: Vec<_> = diagnostics.issues().iter().map(|issue| issue.field()).collect();
        assert!(fields.contains(&"fqdn"));
        assert!(fields.contains(&"image"));
        assert!(fields.contains(&"full_clone"));
        assert!(fields.contains(&"infrastructure_properties"));
    }

    #[test]
    fn series_validation_reports_shared_failures_once() {
        let diagnostics = node("web{i}", "infrastructure: rhev\nrange: '1..5'\ninfrastructure_properties: {datacenter: dc1, cluster: cl1}")
            .validate()
            .unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.issues()[0].field(), "image");
    }
}
