//! credentials referenced by infrastructures
use crate::error::{Diagnostics, Entity, EntityKind, Result, Validate};
use crate::lazy::Memo;
use crate::util::{optional_string, required_string};
use crate::value::Value;

pub type Credentials = indexmap::IndexMap<String, Credential>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialType {
    UsernamePassword,
    Kerberos,
    SshKey,
}

/// Type specific fields of a credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Secret {
    UsernamePassword {
        username: String,
        password: String,
    },
    Kerberos {
        realm: String,
        service: Option<String>,
    },
    SshKey {
        username: String,
        public_key: Option<String>,
        private_key: Option<String>,
    },
}

#[derive(Debug)]
pub struct Credential {
    name: String,
    raw: Value,
    entity: Entity,
    kind: Memo<CredentialType>,
    secret: Memo<Secret>,
}

impl Credential {
    pub fn new(name: impl Into<String>, raw: Value) -> Self {
        let name = name.into();
        Self {
            entity: Entity::new(EntityKind::Credential, &name),
            name,
            raw,
            kind: Memo::new(),
            secret: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Result<CredentialType> {
        self.kind
            .get_or_try_init(|| {
                let kind = required_string(&self.entity, &self.raw, "type")?;
                match kind.strip_prefix(':').unwrap_or(kind) {
                    "username_password" => Ok(CredentialType::UsernamePassword),
                    "kerberos" => Ok(CredentialType::Kerberos),
                    "ssh_key" => Ok(CredentialType::SshKey),
                    unknown => Err(self
                        .entity
                        .error("type", format!("unknown credential type '{unknown}'"))),
                }
            })
            .copied()
    }

    pub fn secret(&self) -> Result<&Secret> {
        self.secret.get_or_try_init(|| {
            let e = &self.entity;
            let raw = &self.raw;
            Ok(match self.kind()? {
                CredentialType::UsernamePassword => Secret::UsernamePassword {
                    username: required_string(e, raw, "username")?.to_string(),
                    password: required_string(e, raw, "password")?.to_string(),
                },
                CredentialType::Kerberos => Secret::Kerberos {
                    realm: required_string(e, raw, "realm")?.to_string(),
                    service: optional_string(e, raw, "service")?.map(str::to_string),
                },
                CredentialType::SshKey => {
                    let public_key = optional_string(e, raw, "public_key")?.map(str::to_string);
                    let private_key = optional_string(e, raw, "private_key")?.map(str::to_string);
                    if public_key.is_none() && private_key.is_none() {
                        return Err(e.error(
                            "public_key",
                            "an ssh_key credential needs a 'public_key' or a 'private_key'",
                        ));
                    }
                    Secret::SshKey {
                        username: required_string(e, raw, "username")?.to_string(),
                        public_key,
                        private_key,
                    }
                }
            })
        })
    }
}

impl Validate for Credential {
    fn validate_into(&self, diagnostics: &mut Diagnostics) {
        if diagnostics.check(self.kind()).is_some() {
            diagnostics.check(self.secret());
        }
    }
}
