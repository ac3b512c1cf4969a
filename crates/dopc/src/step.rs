//! step sets, steps and their commands
//!
//! Steps reference nodes and roles by name only. Whether a name matches anything is up to the
//! orchestrator running the steps.
use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::lazy::Memo;
use crate::util::{
    optional_bool, optional_positive_integer, optional_string, optional_string_list, required_string,
};
use crate::value::{Map, Value};

/// Name of the step set created from a bare list of steps
pub const DEFAULT_STEP_SET: &str = "default";

pub const DEFAULT_PLUGIN_TIMEOUT: u64 = 300;

#[derive(Debug)]
pub struct StepSet {
    name: String,
    raw: Vec<Value>,
    entity: Entity,
    steps: Memo<Vec<Step>>,
}

impl StepSet {
    pub fn new(name: impl Into<String>, raw: Vec<Value>) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::StepSet, &name),
            name,
            raw,
            steps: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> Result<&[Step]> {
        self.steps
            .get_or_try_init(|| {
                if let Some(position) = self.raw.iter().position(|step| step.as_object().is_none()) {
                    return Err(self.entity.error(
                        "steps",
                        format!("step number {} has to be a hash", position + 1),
                    ));
                }
                Ok(self.raw.iter().cloned().map(Step::new).collect())
            })
            .map(Vec::as_slice)
    }
}

impl Validate for StepSet {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        if let Some(steps) = diagnostics.check(self.steps()) {
            steps.iter().for_each(|step| step.validate_into(diagnostics));
        }
    }
}

#[derive(Debug)]
pub struct Step {
    raw: Value,
    entity: Entity,
    name: Memo<String>,
    nodes: Memo<Vec<String>>,
    roles: Memo<Vec<String>>,
    command: Memo<Command>,
}

impl Step {
    pub fn new(raw: Value) -> Self {
        let entity = match raw.field("name").and_then(Value::as_str) {
            Some(name) => Entity::new(EntityKind::Step, name),
            None => Entity::anonymous(EntityKind::Step),
        };
        Self {
            raw,
            entity,
            name: Memo::new(),
            nodes: Memo::new(),
            roles: Memo::new(),
            command: Memo::new(),
        }
    }

    pub fn name(&self) -> Result<&str> {
        self.name
            .get_or_try_init(|| {
                optional_string(&self.entity, &self.raw, "name")?
                    .map(str::to_string)
                    .ok_or_else(|| {
                        self.entity
                            .error("name", "Every step needs to have a 'name' key defined")
                    })
            })
            .map(String::as_str)
    }

    /// Names of the nodes the step runs on
    pub fn nodes(&self) -> Result<&[String]> {
        self.names(&self.nodes, "nodes")
    }

    /// Names of the roles the step runs on
    pub fn roles(&self) -> Result<&[String]> {
        self.names(&self.roles, "roles")
    }

    pub fn command(&self) -> Result<&Command> {
        self.command.get_or_try_init(|| {
            let Some(raw) = self.raw.field("command") else {
                return Err(self
                    .entity
                    .error("command", "A command key has to be defined"));
            };
            Command::from_value(raw, &self.entity)
        })
    }

    fn names<'s>(&'s self, memo: &'s Memo<Vec<String>>, key: &'static str) -> Result<&'s [String]> {
        memo.resolve(
            || optional_string_list(&self.entity, &self.raw, key),
            Ok,
            Vec::new,
        )
        .map(Vec::as_slice)
    }
}

impl Validate for Step {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        diagnostics.check(self.name());
        diagnostics.check(self.nodes());
        diagnostics.check(self.roles());
        diagnostics.check(self.command());
    }
}

/// What a step runs: a plugin and its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub plugin: String,
    /// Seconds the plugin may run
    pub plugin_timeout: u64,
    pub verify_after_run: bool,
    pub parameters: Map,
}

impl Command {
    /// Parse the short form (a plugin name) or the long form (a hash with at least `plugin`)
    pub fn from_value(raw: &Value, step: &Entity) -> Result<Self> {
        let entity = match &step.name {
            Some(name) => Entity::new(EntityKind::Command, name),
            None => Entity::anonymous(EntityKind::Command),
        };
        match raw {
            Value::String(plugin) => Ok(Self {
                plugin: plugin.clone(),
                plugin_timeout: DEFAULT_PLUGIN_TIMEOUT,
                verify_after_run: false,
                parameters: Map::new(),
            }),
            Value::Object(map) => {
                let plugin = required_string(&entity, raw, "plugin")?.to_string();
                let plugin_timeout = optional_positive_integer(&entity, raw, "plugin_timeout")?
                    .unwrap_or(DEFAULT_PLUGIN_TIMEOUT);
                let verify_after_run =
                    optional_bool(&entity, raw, "verify_after_run")?.unwrap_or(false);
                let parameters = map
                    .iter()
                    .filter(|(key, _)| {
                        !matches!(
                            key.as_str(),
                            Some("plugin" | "plugin_timeout" | "verify_after_run")
                        )
                    })
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Ok(Self {
                    plugin,
                    plugin_timeout,
                    verify_after_run,
                    parameters,
                })
            }
            other => Err(step.error(
                "command",
                format!(
                    "The value for command has to be a string or a hash, not {}",
                    other.kind()
                ),
            )),
        }
    }
}
