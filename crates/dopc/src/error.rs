//! validation errors and their aggregation
use indexmap::IndexSet;
use std::fmt::Formatter;

pub type Result<T, E = PlanParsingError> = std::result::Result<T, E>;

/// The kind of entity an error is reported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Plan,
    Infrastructure,
    Network,
    AffinityGroup,
    Credential,
    Node,
    Interface,
    DataDisk,
    InfrastructureProperties,
    StepSet,
    Step,
    Command,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntityKind::Plan => "Plan",
            EntityKind::Infrastructure => "Infrastructure",
            EntityKind::Network => "Network",
            EntityKind::AffinityGroup => "Affinity group",
            EntityKind::Credential => "Credential",
            EntityKind::Node => "Node",
            EntityKind::Interface => "Interface",
            EntityKind::DataDisk => "Data disk",
            EntityKind::InfrastructureProperties => "Infrastructure properties",
            EntityKind::StepSet => "StepSet",
            EntityKind::Step => "Step",
            EntityKind::Command => "Command",
        })
    }
}

/// Names the entity an error belongs to, e.g. `Node web01`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: Option<String>,
}

impl Entity {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
        }
    }

    pub fn anonymous(kind: EntityKind) -> Self {
        Self { kind, name: None }
    }

    /// Build an error for one of this entity's fields
    pub fn error(&self, field: &'static str, message: impl Into<String>) -> PlanParsingError {
        PlanParsingError::Invalid {
            entity: self.clone(),
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}", self.kind, name),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// The one error kind of plan validation
///
/// Cloneable because a cached failure is handed to every caller of the failing accessor.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlanParsingError {
    #[error("{entity}: {message}")]
    Invalid {
        entity: Entity,
        field: &'static str,
        message: String,
    },
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<PlanParsingError>,
    },
}

impl PlanParsingError {
    /// Wrap with a higher level message, keeping `self` as the source
    pub fn context(self, context: impl Into<String>) -> Self {
        PlanParsingError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, the one naming the violated constraint
    pub fn root_cause(&self) -> &PlanParsingError {
        match self {
            PlanParsingError::Context { source, .. } => source.root_cause(),
            invalid => invalid,
        }
    }

    /// Field of the innermost error
    pub fn field(&self) -> &'static str {
        match self {
            PlanParsingError::Invalid { field, .. } => field,
            PlanParsingError::Context { source, .. } => source.field(),
        }
    }

    /// Entity of the innermost error
    pub fn entity(&self) -> &Entity {
        match self {
            PlanParsingError::Invalid { entity, .. } => entity,
            PlanParsingError::Context { source, .. } => source.entity(),
        }
    }
}

/// Collects every failure of a validation pass
///
/// A failure in one branch never stops the checks of the other branches.
#[derive(derive_new::new, Debug, Default, Clone)]
pub struct Diagnostics {
    #[new(default)]
    issues: IndexSet<PlanParsingError>,
}

impl Diagnostics {
    /// Record `issue`, unless the very same issue was recorded before
    ///
    /// Inflated nodes share the attribute cells of their declaration, so a failure of a shared
    /// attribute is seen once per inflated node.
    pub fn log(&mut self, issue: PlanParsingError) {
        if self.issues.contains(&issue) {
            tracing::trace!(error = %issue, "issue already recorded");
            return;
        }
        match issue.root_cause() {
            cause if cause != &issue => {
                tracing::error!(error = %issue, cause = %cause, "validation failed")
            }
            _ => tracing::error!(error = %issue, "validation failed"),
        }
        self.issues.insert(issue);
    }

    /// Record the error of `result`, if any
    pub fn check<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(issue) => {
                self.log(issue);
                None
            }
        }
    }

    /// Record the error of `result` wrapped in `context`
    pub fn check_with_context<T>(&mut self, context: &str, result: Result<T>) -> Option<T> {
        self.check(result.map_err(|e| e.context(context)))
    }

    /// Recorded issues, in the order they were first seen
    pub fn issues(&self) -> &IndexSet<PlanParsingError> {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn into_result(self) -> Result<(), Diagnostics> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::error::Error for Diagnostics {}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (self.issues.first(), self.issues.len()) {
            (None, _) => f.write_str("no issues"),
            (Some(only), 1) => write!(f, "{only}"),
            (Some(first), len) => write!(f, "{first} (and {} more issues)", len - 1),
        }
    }
}

/// Entity that can run a full, non short-circuiting validation of itself
pub trait Validate {
    /// Record all issues of this entity and its children
    fn validate_into(&self, diagnostics: &mut Diagnostics);

    fn validate(&self) -> Result<(), Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        self.validate_into(&mut diagnostics);
        diagnostics.into_result()
    }
}
