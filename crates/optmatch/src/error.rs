//! Parse and definition errors.

use thiserror::Error;

use crate::convert::ValueError;
use crate::model::{DeclId, GroupId, GroupKind};

/// The single error a failed parse reports.
///
/// Every variant aborts the parse at the point of detection; no bound state
/// is committed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// An option-shaped token matches no flag or key in scope.
    #[error("unrecognized option: {token}")]
    UnrecognizedOption { token: String },

    /// A key was given without a usable value after it.
    #[error("expected a value after {key}")]
    ExpectedValueAfterKey { key: String },

    /// `--name=value` was used with a flag.
    #[error("{flag} does not take a value")]
    UnexpectedValueAfterFlag { flag: String },

    /// A value was present but failed conversion or validation.
    #[error("invalid value '{value}' for {identifier}: {cause}")]
    InvalidKeyValue {
        decl: DeclId,
        identifier: String,
        value: String,
        cause: ValueError,
    },

    #[error("{kind} the options in group '{name}' must be used")]
    OptionGroupMisuse {
        group: GroupId,
        name: String,
        kind: GroupKind,
    },

    #[error("missing required argument: <{name}>")]
    MissingRequiredArgument { decl: DeclId, name: String },

    /// A positional arrived after every parameter was filled.
    #[error("unexpected argument: {token}")]
    UnexpectedArgument { token: String },

    #[error("command not found: {name}")]
    CommandNotFound { name: String },

    #[error("no command given")]
    MissingCommand,
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Invalid option or command declarations, reported at setup time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("invalid option identifier '{0}' (expected `-x` or `--name`)")]
    InvalidIdentifier(String),

    #[error("declaration has no identifier")]
    MissingIdentifier,

    #[error("identifier '{0}' is already registered")]
    DuplicateIdentifier(String),

    #[error("positional '{0}' is already declared")]
    DuplicateParam(String),

    #[error("required parameter '{0}' cannot follow an optional parameter")]
    RequiredAfterOptional(String),

    #[error("parameter '{0}' cannot follow the collected parameter")]
    ParamAfterCollected(String),

    #[error("collected parameter '{existing}' already declared, cannot add '{name}'")]
    MultipleCollected { existing: String, name: String },

    #[error("option group '{0}' has no members")]
    EmptyGroup(String),

    #[error("option group '{0}' may only contain flags and keys of its own registry")]
    InvalidGroupMember(String),

    #[error("command name cannot be empty")]
    EmptyCommandName,

    #[error("command '{0}' is already registered")]
    DuplicateCommand(String),

    #[error("alias conflict: '{alias}' of command '{command}' is already taken")]
    AliasConflict { alias: String, command: String },
}
