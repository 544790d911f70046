//! Option model: declarations, registries, groups, commands.
//!
//! Declarations live in an arena owned by their [`OptionRegistry`]. Callers
//! hold typed handles ([`FlagId`], [`KeyId`], [`ParamId`], [`CollectedId`])
//! and read bound values back through the registry once a parse succeeds.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::convert::{Value, ValueSpec};
use crate::error::DefinitionError;

static NEXT_REGISTRY: AtomicU32 = AtomicU32::new(0);

/// Identity of one registry, assigned when the registry is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u32);

impl RegistryId {
    fn next() -> Self {
        Self(NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed))
    }
}

/// Stable identity of a declaration: its registry plus its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId {
    registry: RegistryId,
    index: usize,
}

impl DeclId {
    pub fn registry(&self) -> RegistryId {
        self.registry
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(DeclId);

        impl $name {
            pub fn decl(&self) -> DeclId {
                self.0
            }
        }

        impl From<$name> for DeclId {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }
    };
}

handle!(
    /// Handle to a boolean or counting flag.
    FlagId
);
handle!(
    /// Handle to a value-taking key.
    KeyId
);
handle!(
    /// Handle to a positional parameter.
    ParamId
);
handle!(
    /// Handle to the trailing collected parameter.
    CollectedId
);

/// Stable identity of an option group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId {
    registry: RegistryId,
    index: usize,
}

/// Identifier collection for option registration.
///
/// Accepts a single identifier or several via array, slice or `Vec`.
pub trait Names {
    fn into_names(self) -> Vec<String>;
}

impl Names for &str {
    fn into_names(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl Names for &[&str] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> Names for [&str; N] {
    fn into_names(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl Names for Vec<String> {
    fn into_names(self) -> Vec<String> {
        self
    }
}

/// What a declaration is.
#[derive(Debug, Clone)]
pub enum DeclKind {
    Flag { counting: bool },
    Key { spec: ValueSpec, variadic: bool },
    Param { spec: ValueSpec, required: bool },
    Collected { spec: ValueSpec, min_count: usize },
}

#[derive(Debug, Clone)]
pub struct Decl {
    names: Vec<String>,
    kind: DeclKind,
}

impl Decl {
    /// Identifiers for options; the single name for positionals.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The long identifier if there is one, else the first.
    pub fn primary_name(&self) -> &str {
        self.names
            .iter()
            .find(|n| n.starts_with("--"))
            .or_else(|| self.names.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> &DeclKind {
        &self.kind
    }

    pub fn is_option(&self) -> bool {
        matches!(self.kind, DeclKind::Flag { .. } | DeclKind::Key { .. })
    }
}

/// Bound state of one declaration.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Binding {
    pub(crate) occurrences: u32,
    pub(crate) values: Vec<Value>,
}

impl Binding {
    pub(crate) fn set(&mut self) {
        self.occurrences = 1;
    }

    pub(crate) fn bump(&mut self) {
        self.occurrences += 1;
    }

    pub(crate) fn bind(&mut self, value: Value, accumulate: bool) {
        if !accumulate {
            self.values.clear();
        }
        self.values.push(value);
        self.occurrences += 1;
    }
}

/// Cardinality constraint of an option group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    ExactlyOne,
    AtMostOne,
    AtLeastOne,
    /// All members or none.
    Together,
}

impl GroupKind {
    pub fn is_satisfied(self, fired: usize, members: usize) -> bool {
        match self {
            Self::ExactlyOne => fired == 1,
            Self::AtMostOne => fired <= 1,
            Self::AtLeastOne => fired >= 1,
            Self::Together => fired == 0 || fired == members,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExactlyOne => "exactly one of",
            Self::AtMostOne => "at most one of",
            Self::AtLeastOne => "at least one of",
            Self::Together => "all or none of",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    kind: GroupKind,
    members: Vec<usize>,
}

impl Group {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub(crate) fn members(&self) -> &[usize] {
        &self.members
    }
}

fn validate_identifier(name: &str) -> Result<(), DefinitionError> {
    let invalid = || DefinitionError::InvalidIdentifier(name.to_string());
    if name.contains(|c: char| c == '=' || c.is_whitespace()) {
        return Err(invalid());
    }
    if let Some(long) = name.strip_prefix("--") {
        return if long.is_empty() || long.starts_with('-') {
            Err(invalid())
        } else {
            Ok(())
        };
    }
    let mut short = name.strip_prefix('-').ok_or_else(invalid)?.chars();
    match (short.next(), short.next()) {
        (Some(c), None) if c != '-' => Ok(()),
        _ => Err(invalid()),
    }
}

/// Declarations of one scope (the global options, or one command).
///
/// A clone is a new registry with its own [`RegistryId`]: handles issued by
/// the original are not accepted by the copy.
#[derive(Debug)]
pub struct OptionRegistry {
    id: RegistryId,
    decls: Vec<Decl>,
    lookup: IndexMap<String, usize>,
    params: Vec<usize>,
    collected: Option<usize>,
    groups: Vec<Group>,
    bindings: Vec<Binding>,
}

impl Clone for OptionRegistry {
    fn clone(&self) -> Self {
        Self {
            id: RegistryId::next(),
            decls: self.decls.clone(),
            lookup: self.lookup.clone(),
            params: self.params.clone(),
            collected: self.collected,
            groups: self.groups.clone(),
            bindings: self.bindings.clone(),
        }
    }
}

impl Default for OptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self {
            id: RegistryId::next(),
            decls: Vec::new(),
            lookup: IndexMap::new(),
            params: Vec::new(),
            collected: None,
            groups: Vec::new(),
            bindings: Vec::new(),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    fn push(&mut self, names: Vec<String>, kind: DeclKind) -> DeclId {
        let index = self.decls.len();
        self.decls.push(Decl { names, kind });
        self.bindings.push(Binding::default());
        DeclId {
            registry: self.id,
            index,
        }
    }

    fn push_option(
        &mut self,
        names: Vec<String>,
        kind: DeclKind,
    ) -> Result<DeclId, DefinitionError> {
        if names.is_empty() {
            return Err(DefinitionError::MissingIdentifier);
        }
        for (i, name) in names.iter().enumerate() {
            validate_identifier(name)?;
            if self.lookup.contains_key(name) || names[..i].contains(name) {
                return Err(DefinitionError::DuplicateIdentifier(name.clone()));
            }
        }
        let index = self.decls.len();
        for name in &names {
            self.lookup.insert(name.clone(), index);
        }
        Ok(self.push(names, kind))
    }

    fn check_positional(&self, name: &str) -> Result<(), DefinitionError> {
        if name.trim().is_empty() {
            return Err(DefinitionError::MissingIdentifier);
        }
        let taken = self
            .params
            .iter()
            .chain(self.collected.iter())
            .any(|&i| self.decls[i].names.iter().any(|n| n == name));
        if taken {
            return Err(DefinitionError::DuplicateParam(name.to_string()));
        }
        Ok(())
    }

    /// Register a boolean flag; repeated occurrences are idempotent.
    pub fn flag(&mut self, names: impl Names) -> Result<FlagId, DefinitionError> {
        self.push_option(names.into_names(), DeclKind::Flag { counting: false })
            .map(FlagId)
    }

    /// Register a flag that counts its occurrences.
    pub fn counter(&mut self, names: impl Names) -> Result<FlagId, DefinitionError> {
        self.push_option(names.into_names(), DeclKind::Flag { counting: true })
            .map(FlagId)
    }

    /// Register a key taking one value; the last occurrence wins.
    pub fn key(
        &mut self,
        names: impl Names,
        spec: impl Into<ValueSpec>,
    ) -> Result<KeyId, DefinitionError> {
        let kind = DeclKind::Key {
            spec: spec.into(),
            variadic: false,
        };
        self.push_option(names.into_names(), kind).map(KeyId)
    }

    /// Register a key that accumulates every occurrence.
    pub fn variadic_key(
        &mut self,
        names: impl Names,
        spec: impl Into<ValueSpec>,
    ) -> Result<KeyId, DefinitionError> {
        let kind = DeclKind::Key {
            spec: spec.into(),
            variadic: true,
        };
        self.push_option(names.into_names(), kind).map(KeyId)
    }

    fn push_param(
        &mut self,
        name: &str,
        spec: ValueSpec,
        required: bool,
    ) -> Result<ParamId, DefinitionError> {
        self.check_positional(name)?;
        if self.collected.is_some() {
            return Err(DefinitionError::ParamAfterCollected(name.to_string()));
        }
        if required {
            let after_optional = self.params.iter().any(|&i| {
                matches!(self.decls[i].kind, DeclKind::Param { required: false, .. })
            });
            if after_optional {
                return Err(DefinitionError::RequiredAfterOptional(name.to_string()));
            }
        }
        let id = self.push(vec![name.to_string()], DeclKind::Param { spec, required });
        self.params.push(id.index);
        Ok(ParamId(id))
    }

    /// Register a required positional, bound in declaration order.
    pub fn param(
        &mut self,
        name: &str,
        spec: impl Into<ValueSpec>,
    ) -> Result<ParamId, DefinitionError> {
        self.push_param(name, spec.into(), true)
    }

    pub fn optional_param(
        &mut self,
        name: &str,
        spec: impl Into<ValueSpec>,
    ) -> Result<ParamId, DefinitionError> {
        self.push_param(name, spec.into(), false)
    }

    /// Register the trailing parameter that absorbs every remaining token.
    pub fn collected(
        &mut self,
        name: &str,
        spec: impl Into<ValueSpec>,
    ) -> Result<CollectedId, DefinitionError> {
        self.collected_at_least(name, spec, 0)
    }

    /// Like [`OptionRegistry::collected`], requiring at least `min_count` values.
    pub fn collected_at_least(
        &mut self,
        name: &str,
        spec: impl Into<ValueSpec>,
        min_count: usize,
    ) -> Result<CollectedId, DefinitionError> {
        if let Some(existing) = self.collected {
            return Err(DefinitionError::MultipleCollected {
                existing: self.decls[existing].primary_name().to_string(),
                name: name.to_string(),
            });
        }
        self.check_positional(name)?;
        let kind = DeclKind::Collected {
            spec: spec.into(),
            min_count,
        };
        let id = self.push(vec![name.to_string()], kind);
        self.collected = Some(id.index);
        Ok(CollectedId(id))
    }

    /// Register a cardinality constraint over flags/keys of this registry.
    pub fn group<I>(
        &mut self,
        name: &str,
        kind: GroupKind,
        members: I,
    ) -> Result<GroupId, DefinitionError>
    where
        I: IntoIterator<Item = DeclId>,
    {
        let mut indices = Vec::new();
        for member in members {
            let is_option = member.registry == self.id
                && self.decls.get(member.index).is_some_and(Decl::is_option);
            if !is_option {
                return Err(DefinitionError::InvalidGroupMember(name.to_string()));
            }
            if !indices.contains(&member.index) {
                indices.push(member.index);
            }
        }
        if indices.is_empty() {
            return Err(DefinitionError::EmptyGroup(name.to_string()));
        }
        let index = self.groups.len();
        self.groups.push(Group {
            name: name.to_string(),
            kind,
            members: indices,
        });
        Ok(GroupId {
            registry: self.id,
            index,
        })
    }

    /// Find the option declared under `identifier` (e.g. `-a`, `--alpha`).
    pub fn find(&self, identifier: &str) -> Option<DeclId> {
        self.lookup
            .get(identifier)
            .map(|&index| self.decl_id(index))
    }

    pub fn decl(&self, id: DeclId) -> Option<&Decl> {
        if id.registry != self.id {
            return None;
        }
        self.decls.get(id.index)
    }

    /// Every declaration, in registration order.
    pub fn decls(&self) -> impl Iterator<Item = (DeclId, &Decl)> + '_ {
        self.decls
            .iter()
            .enumerate()
            .map(|(index, decl)| (self.decl_id(index), decl))
    }

    pub fn group_by_id(&self, id: GroupId) -> Option<&Group> {
        if id.registry != self.id {
            return None;
        }
        self.groups.get(id.index)
    }

    fn binding(&self, id: DeclId) -> Option<&Binding> {
        if id.registry != self.id {
            return None;
        }
        self.bindings.get(id.index)
    }

    /// How many times a declaration was matched in the last successful parse.
    pub fn occurrences(&self, id: DeclId) -> u32 {
        self.binding(id).map_or(0, |b| b.occurrences)
    }

    /// Every value bound to a declaration in the last successful parse.
    pub fn bound_values(&self, id: DeclId) -> &[Value] {
        self.binding(id)
            .map(|b| b.values.as_slice())
            .unwrap_or_default()
    }

    pub fn is_set(&self, flag: FlagId) -> bool {
        self.occurrences(flag.0) > 0
    }

    pub fn count(&self, flag: FlagId) -> u32 {
        self.occurrences(flag.0)
    }

    /// The last value bound to a key.
    pub fn value(&self, key: KeyId) -> Option<&Value> {
        self.bound_values(key.0).last()
    }

    pub fn values(&self, key: KeyId) -> &[Value] {
        self.bound_values(key.0)
    }

    pub fn param_value(&self, param: ParamId) -> Option<&Value> {
        self.bound_values(param.0).first()
    }

    pub fn collected_values(&self, collected: CollectedId) -> &[Value] {
        self.bound_values(collected.0)
    }

    pub(crate) fn decl_id(&self, index: usize) -> DeclId {
        DeclId {
            registry: self.id,
            index,
        }
    }

    pub(crate) fn group_id(&self, index: usize) -> GroupId {
        GroupId {
            registry: self.id,
            index,
        }
    }

    pub(crate) fn lookup(&self, identifier: &str) -> Option<usize> {
        self.lookup.get(identifier).copied()
    }

    pub(crate) fn decl_at(&self, index: usize) -> &Decl {
        &self.decls[index]
    }

    pub(crate) fn param_indices(&self) -> &[usize] {
        &self.params
    }

    pub(crate) fn collected_index(&self) -> Option<usize> {
        self.collected
    }

    pub(crate) fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub(crate) fn fresh_bindings(&self) -> Vec<Binding> {
        vec![Binding::default(); self.decls.len()]
    }

    /// Replace every binding with the state staged by a successful parse.
    pub(crate) fn commit(&mut self, bindings: Vec<Binding>) {
        debug_assert_eq!(bindings.len(), self.decls.len());
        self.bindings = bindings;
    }
}

/// Index of a command registered in a [`Cli`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(usize);

#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    aliases: Vec<String>,
    summary: String,
    options: OptionRegistry,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            summary: String::new(),
            options: OptionRegistry::new(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn options(&self) -> &OptionRegistry {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionRegistry {
        &mut self.options
    }
}

/// Global options plus the commands they route to.
#[derive(Debug, Clone)]
pub struct Cli {
    name: String,
    global: OptionRegistry,
    commands: Vec<Command>,
}

impl Cli {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global: OptionRegistry::new(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn global(&self) -> &OptionRegistry {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut OptionRegistry {
        &mut self.global
    }

    /// Register a command, rejecting name/alias collisions.
    pub fn register(&mut self, command: Command) -> Result<CommandId, DefinitionError> {
        if command.name.trim().is_empty() {
            return Err(DefinitionError::EmptyCommandName);
        }
        if self.resolve(&command.name).is_some() {
            return Err(DefinitionError::DuplicateCommand(command.name));
        }
        for (i, alias) in command.aliases.iter().enumerate() {
            let clash = alias == &command.name
                || command.aliases[..i].contains(alias)
                || self.resolve(alias).is_some();
            if clash {
                return Err(DefinitionError::AliasConflict {
                    alias: alias.clone(),
                    command: command.name.clone(),
                });
            }
        }
        let id = CommandId(self.commands.len());
        self.commands.push(command);
        Ok(id)
    }

    /// Map a command name or alias to its command.
    pub fn resolve(&self, name: &str) -> Option<CommandId> {
        if let Some(i) = self.commands.iter().position(|c| c.name == name) {
            return Some(CommandId(i));
        }
        self.commands
            .iter()
            .position(|c| c.aliases.iter().any(|a| a == name))
            .map(CommandId)
    }

    /// Panics if `id` was not returned by this `Cli`.
    pub fn command(&self, id: CommandId) -> &Command {
        &self.commands[id.0]
    }

    /// Panics if `id` was not returned by this `Cli`.
    pub fn command_mut(&mut self, id: CommandId) -> &mut Command {
        &mut self.commands[id.0]
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}
