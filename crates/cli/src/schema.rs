//! JSON command schema: the declarations a `match` run is checked against.

use anyhow::{Context, Result, bail};
use optmatch::{GroupKind, OptionRegistry, ParserConfig, Validator, ValueKind, ValueSpec};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliSchema {
    pub name: String,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub global: Vec<OptionSchema>,
    #[serde(default)]
    pub global_groups: Vec<GroupSchema>,
    #[serde(default)]
    pub commands: Vec<CommandSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSchema {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionSchema>,
    #[serde(default)]
    pub params: Vec<ParamSchema>,
    #[serde(default)]
    pub collected: Option<CollectedSchema>,
    #[serde(default)]
    pub groups: Vec<GroupSchema>,
}

/// A flag or key, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OptionSchema {
    Flag(FlagSchema),
    /// A flag that counts its occurrences.
    Counter(FlagSchema),
    Key(KeySchema),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagSchema {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeySchema {
    pub names: Vec<String>,
    #[serde(default, rename = "type")]
    pub value_type: ValueKind,
    #[serde(default)]
    pub variadic: bool,
    #[serde(default)]
    pub validators: Vec<ValidatorSchema>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParamSchema {
    pub name: String,
    #[serde(default, rename = "type")]
    pub value_type: ValueKind,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub validators: Vec<ValidatorSchema>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollectedSchema {
    pub name: String,
    #[serde(default, rename = "type")]
    pub value_type: ValueKind,
    #[serde(default)]
    pub min_count: usize,
    #[serde(default)]
    pub validators: Vec<ValidatorSchema>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GroupSchema {
    pub name: String,
    pub kind: GroupKind,
    /// Option identifiers, any spelling of each member.
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorSchema {
    GreaterThan(i64),
    LessThan(i64),
    OneOf(Vec<String>),
    NotOneOf(Vec<String>),
}

impl ValidatorSchema {
    fn to_validator(&self) -> Validator {
        match self {
            Self::GreaterThan(n) => Validator::greater_than(*n),
            Self::LessThan(n) => Validator::less_than(*n),
            Self::OneOf(allowed) => Validator::one_of(allowed),
            Self::NotOneOf(denied) => Validator::not_one_of(denied),
        }
    }
}

fn value_spec(kind: &ValueKind, validators: &[ValidatorSchema]) -> ValueSpec {
    validators
        .iter()
        .fold(ValueSpec::new(kind.clone()), |spec, v| {
            spec.validator(v.to_validator())
        })
}

impl CliSchema {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read schema: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse schema: {}", path.display()))
    }

    /// Register every declaration into a fresh [`optmatch::Cli`].
    pub fn build(&self) -> Result<optmatch::Cli> {
        let mut cli = optmatch::Cli::new(&self.name);
        declare_options(cli.global_mut(), &self.global).context("invalid global options")?;
        declare_groups(cli.global_mut(), &self.global_groups)
            .context("invalid global option groups")?;

        for schema in &self.commands {
            let command = schema
                .build()
                .with_context(|| format!("invalid command '{}'", schema.name))?;
            cli.register(command)?;
        }
        Ok(cli)
    }
}

impl CommandSchema {
    fn build(&self) -> Result<optmatch::Command> {
        let mut command = optmatch::Command::new(&self.name).with_summary(&self.summary);
        for alias in &self.aliases {
            command = command.alias(alias);
        }

        let registry = command.options_mut();
        declare_options(registry, &self.options)?;
        for param in &self.params {
            let spec = value_spec(&param.value_type, &param.validators);
            if param.required {
                registry.param(&param.name, spec)?;
            } else {
                registry.optional_param(&param.name, spec)?;
            }
        }
        if let Some(collected) = &self.collected {
            let spec = value_spec(&collected.value_type, &collected.validators);
            registry.collected_at_least(&collected.name, spec, collected.min_count)?;
        }
        declare_groups(registry, &self.groups)?;
        Ok(command)
    }
}

fn declare_options(registry: &mut OptionRegistry, options: &[OptionSchema]) -> Result<()> {
    for option in options {
        match option {
            OptionSchema::Flag(flag) => {
                registry.flag(flag.names.clone())?;
            }
            OptionSchema::Counter(flag) => {
                registry.counter(flag.names.clone())?;
            }
            OptionSchema::Key(key) => {
                let spec = value_spec(&key.value_type, &key.validators);
                if key.variadic {
                    registry.variadic_key(key.names.clone(), spec)?;
                } else {
                    registry.key(key.names.clone(), spec)?;
                }
            }
        }
    }
    Ok(())
}

fn declare_groups(registry: &mut OptionRegistry, groups: &[GroupSchema]) -> Result<()> {
    for group in groups {
        let mut members = Vec::with_capacity(group.members.len());
        for identifier in &group.members {
            let Some(decl) = registry.find(identifier) else {
                bail!(
                    "group '{}' references unknown option '{}'",
                    group.name,
                    identifier
                );
            };
            members.push(decl);
        }
        registry.group(&group.name, group.kind, members)?;
    }
    Ok(())
}
