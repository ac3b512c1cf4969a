//! the plan: root of the validated object graph
//!
//! A [Plan] wraps the raw document and resolves each of its parts on first access. Parts depend on
//! each other in this order: credentials, infrastructures, nodes. Every other part stands alone.
//!
//! [Plan::validate](crate::error::Validate::validate) walks the whole tree and reports every issue
//! instead of stopping at the first one.
use crate::configuration::Configuration;
use crate::credential::{Credential, Credentials};
use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::hooks::Hooks;
use crate::infrastructure::{Infrastructure, Infrastructures};
use crate::lazy::Memo;
use crate::node::Node;
use crate::step::{StepSet, DEFAULT_STEP_SET};
use crate::util::{optional_bool, optional_positive_integer, optional_string_map};
use crate::value::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub const DEFAULT_MAX_IN_FLIGHT: u64 = 3;

#[derive(Debug)]
pub struct Plan {
    raw: Value,
    entity: Entity,
    name: Memo<String>,
    max_in_flight: Memo<u64>,
    canary_host: Memo<bool>,
    credentials: Memo<Arc<Credentials>>,
    infrastructures: Memo<Arc<Infrastructures>>,
    nodes: Memo<Vec<Node>>,
    step_sets: Memo<Vec<StepSet>>,
    configuration: Memo<Configuration>,
    hooks: Memo<Hooks>,
}

impl Plan {
    pub fn new(raw: Value) -> Self {
        Self {
            raw,
            entity: Entity::anonymous(EntityKind::Plan),
            name: Memo::new(),
            max_in_flight: Memo::new(),
            canary_host: Memo::new(),
            credentials: Memo::new(),
            infrastructures: Memo::new(),
            nodes: Memo::new(),
            step_sets: Memo::new(),
            configuration: Memo::new(),
            hooks: Memo::new(),
        }
    }

    /// Name of the plan, the SHA-256 digest of its content if not set
    pub fn name(&self) -> Result<&str> {
        self.name
            .get_or_try_init(|| match self.name_valid()? {
                Some(name) => Ok(name.to_string()),
                None => self.digest(),
            })
            .map(String::as_str)
    }

    fn name_valid(&self) -> Result<Option<&str>> {
        let Some(name) = self.raw.field("name") else {
            return Ok(None);
        };
        let name = name
            .as_str()
            .ok_or_else(|| self.entity.error("name", "The plan name has to be a string"))?;
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Some(name))
        } else {
            Err(self.entity.error(
                "name",
                "The plan name may only contain letters, numbers, underscores and hyphens",
            ))
        }
    }

    /// Digest of the canonical JSON rendering of the document
    fn digest(&self) -> Result<String> {
        let canonical = serde_json::to_string(&self.raw).map_err(|e| {
            self.entity
                .error("name", format!("can't render the plan to derive its name: {e}"))
        })?;
        Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
    }

    /// How many nodes are deployed at once
    pub fn max_in_flight(&self) -> Result<u64> {
        self.max_in_flight
            .resolve(
                || optional_positive_integer(&self.entity, &self.raw, "max_in_flight"),
                Ok,
                || DEFAULT_MAX_IN_FLIGHT,
            )
            .copied()
    }

    /// Whether a single node is deployed before all others
    pub fn canary_host(&self) -> Result<bool> {
        self.canary_host
            .resolve(
                || optional_bool(&self.entity, &self.raw, "canary_host"),
                Ok,
                || false,
            )
            .copied()
    }

    pub fn credentials(&self) -> Result<&Credentials> {
        self.credentials_ref().map(Arc::as_ref)
    }

    fn credentials_ref(&self) -> Result<&Arc<Credentials>> {
        self.credentials.resolve(
            || self.credentials_valid(),
            |map| {
                Ok(Arc::new(
                    map.iter()
                        .map(|(name, raw)| {
                            let name = name.to_string();
                            (name.clone(), Credential::new(name, raw.clone()))
                        })
                        .collect(),
                ))
            },
            Default::default,
        )
    }

    fn credentials_valid(&self) -> Result<Option<&Map>> {
        let Some(map) = optional_string_map(&self.entity, &self.raw, "credentials")? else {
            return Ok(None);
        };
        if map.values().all(|value| value.as_object().is_some()) {
            Ok(Some(map))
        } else {
            Err(self.entity.error(
                "credentials",
                "all values in the 'credentials' hash have to be hashes",
            ))
        }
    }

    pub fn infrastructures(&self) -> Result<&Infrastructures> {
        self.infrastructures_ref().map(Arc::as_ref)
    }

    fn infrastructures_ref(&self) -> Result<&Arc<Infrastructures>> {
        self.infrastructures.get_or_try_init(|| {
            let map = self.infrastructures_valid()?;
            let credentials = self.credentials_ref()?;
            Ok(Arc::new(
                map.iter()
                    .map(|(name, raw)| {
                        let name = name.to_string();
                        let infrastructure =
                            Infrastructure::new(name.clone(), raw.clone(), Arc::clone(credentials));
                        (name, Arc::new(infrastructure))
                    })
                    .collect(),
            ))
        })
    }

    fn infrastructures_valid(&self) -> Result<&Map> {
        self.required_map_of_maps("infrastructures")
    }

    /// All nodes of the plan, series already inflated
    pub fn nodes(&self) -> Result<&[Node]> {
        self.nodes
            .get_or_try_init(|| {
                let map = self.nodes_valid()?;
                let infrastructures = self.infrastructures_ref()?;
                let mut nodes = Vec::with_capacity(map.len());
                for (name, raw) in map {
                    let node = Node::new(name.to_string(), raw.clone(), Arc::clone(infrastructures));
                    nodes.extend(node.inflate()?);
                }
                tracing::debug!(count = nodes.len(), "nodes parsed");
                Ok(nodes)
            })
            .map(Vec::as_slice)
    }

    fn nodes_valid(&self) -> Result<&Map> {
        self.required_map_of_maps("nodes")
    }

    /// The node with this exact, inflated name
    pub fn find_node(&self, name: &str) -> Result<Option<&Node>> {
        Ok(self.nodes()?.iter().find(|node| node.name() == name))
    }

    pub fn step_sets(&self) -> Result<&[StepSet]> {
        self.step_sets
            .resolve(
                || self.step_sets_valid(),
                |steps| {
                    Ok(match steps {
                        Value::Array(steps) => vec![StepSet::new(DEFAULT_STEP_SET, steps.clone())],
                        Value::Object(sets) => sets
                            .iter()
                            .filter_map(|(name, steps)| {
                                let steps = steps.as_array()?.to_vec();
                                Some(StepSet::new(name.to_string(), steps))
                            })
                            .collect(),
                        _ => Vec::new(),
                    })
                },
                Vec::new,
            )
            .map(Vec::as_slice)
    }

    fn step_sets_valid(&self) -> Result<Option<&Value>> {
        let error = |message| Err(self.entity.error("steps", message));
        match self.raw.field("steps") {
            None => Ok(None),
            Some(steps @ Value::Array(_)) => Ok(Some(steps)),
            Some(steps @ Value::Object(sets)) => {
                if sets.is_empty() {
                    error("the hash in steps must not be empty")
                } else if !sets.keys().all(|name| name.as_str().is_some()) {
                    error("all the keys in the steps hash have to be strings")
                } else if !sets.values().all(|steps| steps.as_array().is_some()) {
                    error("all values in the steps hash have to be arrays")
                } else {
                    Ok(Some(steps))
                }
            }
            Some(_) => error("steps key has not a array or hash as value"),
        }
    }

    pub fn configuration(&self) -> Result<&Configuration> {
        self.configuration.resolve(
            || self.configuration_valid(),
            |raw| Ok(Configuration::new(raw.clone())),
            Configuration::default,
        )
    }

    fn configuration_valid(&self) -> Result<Option<&Value>> {
        match self.raw.field("configuration") {
            None => Ok(None),
            Some(raw @ Value::Object(_)) => Ok(Some(raw)),
            Some(_) => Err(self
                .entity
                .error("configuration", "'configuration' key has not a hash as value")),
        }
    }

    pub fn hooks(&self) -> Result<&Hooks> {
        self.hooks.get_or_try_init(|| {
            if !self.raw.has_key("hooks") {
                return Hooks::from_value(None);
            }
            let null = Value::Null;
            Hooks::from_value(Some(self.raw.field("hooks").unwrap_or(&null)))
        })
    }

    fn required_map_of_maps(&self, key: &'static str) -> Result<&Map> {
        let Some(map) = optional_string_map(&self.entity, &self.raw, key)? else {
            return Err(self.entity.error(key, format!("{key} hash is missing")));
        };
        if map.is_empty() {
            return Err(self.entity.error(key, format!("{key} hash is empty")));
        }
        if !map.values().all(|value| value.as_object().is_some()) {
            return Err(self.entity.error(key, format!("{key} must be of hash type")));
        }
        Ok(map)
    }
}

impl Validate for Plan {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.max_in_flight());
        diagnostics.check(self.canary_host());

        diagnostics.check(self.name());
        diagnostics.check(self.infrastructures_valid());
        diagnostics.check(self.nodes_valid());
        diagnostics.check(self.step_sets_valid());
        diagnostics.check(self.configuration_valid());
        diagnostics.check(self.credentials_valid());
        diagnostics.check(self.hooks());

        let context = "Plan: can't validate the infrastructures part because of a previous error";
        if let Some(infrastructures) = diagnostics.check_with_context(context, self.infrastructures())
        {
            infrastructures
                .values()
                .for_each(|infrastructure| infrastructure.validate_into(diagnostics));
        }

        let context = "Plan: can't validate the nodes part because of a previous error";
        if let Some(nodes) = diagnostics.check_with_context(context, self.nodes()) {
            nodes.iter().for_each(|node| node.validate_into(diagnostics));
        }

        let context = "Plan: can't validate the steps part because of a previous error";
        if let Some(step_sets) = diagnostics.check_with_context(context, self.step_sets()) {
            step_sets
                .iter()
                .for_each(|step_set| step_set.validate_into(diagnostics));
        }

        let context = "Plan: can't validate the credentials part because of a previous error";
        if let Some(credentials) = diagnostics.check_with_context(context, self.credentials()) {
            credentials
                .values()
                .for_each(|credential| credential.validate_into(diagnostics));
        }

        let context = "Plan: can't validate the hooks part because of a previous error";
        diagnostics.check_with_context(context, self.hooks());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hooks::HookKind;
    use pretty_assertions::assert_eq;

    fn plan(yaml: &str) -> Plan {
        Plan::new(crate::value!(yaml))
    }

    #[test]
    fn name_defaults_to_digest() {
        assert_eq!(
            plan("{}").name(),
            Ok("44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a")
        );
        assert_eq!(plan("name: ~").name(), plan("{name: ~}").name());
        assert_ne!(plan("a: 1").name(), plan("a: 2").name());
    }

    #[test]
    fn name() {
        assert_eq!(plan("name: myplan").name(), Ok("myplan"));
        assert_eq!(plan("name: my-plan").name(), Ok("my-plan"));
        assert_eq!(plan("name: my_plan_2").name(), Ok("my_plan_2"));
        assert!(plan("name: 2").name().is_err());
        assert!(plan("name: my(plan").name().is_err());
        assert!(plan("name: ''").name().is_err());
    }

    #[test]
    fn infrastructures() {
        let error = plan("{}").infrastructures().unwrap_err();
        assert_eq!(error.to_string(), "Plan: infrastructures hash is missing");
        assert!(plan("infrastructures: foo").infrastructures().is_err());
        assert!(plan("infrastructures: {}").infrastructures().is_err());
        assert!(plan("infrastructures: {rhev: foo}").infrastructures().is_err());
        assert_eq!(
            plan("infrastructures: {management: {}}")
                .infrastructures()
                .map(|infrastructures| infrastructures.len()),
            Ok(1)
        );
    }

    #[test]
    fn nodes_are_inflated() {
        let plan = plan(
            r#"
            infrastructures: {management: {}}
            nodes:
              'mynode{i}.example.com': {range: '1..10', digits: 3}
            "#,
        );
        let nodes = plan.nodes().unwrap();
        assert_eq!(nodes.len(), 10);
        assert_eq!(nodes[0].name(), "mynode001.example.com");
        assert_eq!(nodes[9].name(), "mynode010.example.com");
        assert_eq!(
            plan.find_node("mynode005.example.com")
                .unwrap()
                .map(Node::name),
            Some("mynode005.example.com")
        );
        assert!(plan.find_node("mynode{i}.example.com").unwrap().is_none());
    }

    #[test]
    fn invalid_nodes() {
        for yaml in [
            "infrastructures: {management: {}}",
            "infrastructures: {management: {}}\nnodes: foo",
            "infrastructures: {management: {}}\nnodes: {}",
            "infrastructures: {management: {}}\nnodes: {web: foo}",
        ] {
            assert!(plan(yaml).nodes().is_err(), "{yaml}");
        }
    }

    #[test]
    fn step_sets() {
        assert!(plan("{}").step_sets().unwrap().is_empty());

        let default = plan("steps: []");
        let sets = default.step_sets().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name(), DEFAULT_STEP_SET);
        assert!(sets[0].steps().unwrap().is_empty());

        let named = plan("steps: {foo: [], bar: []}");
        assert_eq!(
            named.step_sets().unwrap().iter().map(StepSet::name).collect::<Vec<_>>(),
            vec!["foo", "bar"]
        );

        for invalid in ["steps: foo", "steps: {}", "steps: {2: []}", "steps: {foo: 2}"] {
            assert!(plan(invalid).step_sets().is_err(), "{invalid}");
        }
    }

    #[test]
    fn credentials() {
        assert!(plan("{}").credentials().unwrap().is_empty());
        let plan_with_credentials = plan(
            "credentials: {test: {type: username_password, username: a, password: b}}",
        );
        assert!(plan_with_credentials.credentials().unwrap().contains_key("test"));
        assert!(plan("credentials: {2: {}}").credentials().is_err());
        assert!(plan("credentials: {test: 2}").credentials().is_err());
    }

    #[test]
    fn hooks() {
        assert!(plan("{}").hooks().unwrap().is_empty());
        for kind in HookKind::ALL {
            assert!(plan(&format!("hooks: {{{kind}: []}}")).hooks().is_ok());
        }
        assert!(plan("hooks: {}").hooks().is_err());
        assert!(plan("hooks: ~").hooks().is_err());
        assert!(plan("hooks: {invalid: [/foo/bar/baz]}").hooks().is_err());
    }

    #[test]
    fn configuration() {
        assert!(plan("{}").configuration().unwrap().is_empty());
        assert!(plan("configuration: {a: {b: c}}").configuration().is_ok());
        assert!(plan("configuration: [a]").configuration().is_err());
    }

    #[test]
    fn run_options() {
        assert_eq!(plan("{}").max_in_flight(), Ok(DEFAULT_MAX_IN_FLIGHT));
        assert_eq!(plan("max_in_flight: 10").max_in_flight(), Ok(10));
        assert!(plan("max_in_flight: 0").max_in_flight().is_err());
        assert_eq!(plan("{}").canary_host(), Ok(false));
        assert_eq!(plan("canary_host: true").canary_host(), Ok(true));
        assert!(plan("canary_host: 1").canary_host().is_err());
    }

    #[test]
    fn indifferent_keys() {
        let plan = plan("':name': symbolic\n':infrastructures': {rhev: {':type': rhev}}");
        assert_eq!(plan.name(), Ok("symbolic"));
        let infrastructure = &plan.infrastructures().unwrap()["rhev"];
        assert_eq!(infrastructure.provider().map(|kind| kind.as_str()), Ok("ovirt"));
    }

    #[test]
    fn broken_infrastructure_surfaces_in_nodes_context() {
        let diagnostics = plan("infrastructures: foo\nnodes: {web: {infrastructure: rhev}}")
            .validate()
            .unwrap_err();
        let nodes = diagnostics
            .issues()
            .iter()
            .find(|issue| {
                issue.to_string() == "Plan: can't validate the nodes part because of a previous error"
            })
            .unwrap();
        assert_eq!(nodes.field(), "infrastructures");
        assert_eq!(
            nodes.root_cause().to_string(),
            "Plan: The value for 'infrastructures' has to be a hash"
        );
    }
}
