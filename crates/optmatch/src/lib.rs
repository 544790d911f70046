//! Declarative command-line option matching.
//!
//! Declare what a program accepts, then match argv against it:
//! - flags (`-v`, optionally counting), keys taking one typed value,
//!   positional params, and one trailing collected param per command
//! - short clusters (`-abc`) and `--name=value` inline values
//! - option groups (exactly one / at most one / at least one / together)
//! - value conversion and validators with fixed, testable messages
//!
//! A parse either commits every binding or reports exactly one
//! [`ParseError`]; bound values are read back through typed handles.
//!
//! ```
//! use optmatch::{Cli, Command, ValueKind};
//!
//! let mut run = Command::new("run");
//! let exe = run.options_mut().param("executable", ValueKind::String).unwrap();
//! let verbose = run.options_mut().flag(["-v", "--verbose"]).unwrap();
//!
//! let mut cli = Cli::new("tool");
//! let id = cli.register(run).unwrap();
//! cli.parse(["run", "-v", "cli"]).unwrap();
//!
//! let options = cli.command(id).options();
//! assert!(options.is_set(verbose));
//! assert_eq!(options.param_value(exe).and_then(|v| v.as_str()), Some("cli"));
//! ```

pub mod convert;
pub mod error;
pub mod matcher;
pub mod model;
pub mod tokens;

pub use convert::{
    ConversionError, ValidationError, Validator, Value, ValueError, ValueKind, ValueSpec,
    validate_all,
};
pub use error::{DefinitionError, ParseError, ParseResult};
pub use matcher::{ParseOutcome, Parser, ParserConfig};
pub use model::{
    Cli, CollectedId, Command, CommandId, Decl, DeclId, DeclKind, FlagId, Group, GroupId,
    GroupKind, KeyId, Names, OptionRegistry, ParamId, RegistryId,
};
pub use tokens::{OptionToken, TokenStream};
