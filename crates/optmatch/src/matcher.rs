//! The matching engine: drains a [`TokenStream`] against the global options,
//! resolves the command, then matches that command's declarations.

use serde::{Deserialize, Serialize};

use crate::convert::ValueSpec;
use crate::error::{ParseError, ParseResult};
use crate::model::{Binding, Cli, CommandId, DeclKind, OptionRegistry};
use crate::tokens::{END_OF_OPTIONS, TokenStream, looks_like_option};

/// Parser behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParserConfig {
    /// Keep classifying flags/keys after the collected parameter starts
    /// absorbing. When off, everything after that point is taken verbatim.
    pub options_after_collected: bool,
}

/// Result of a successful parse.
///
/// Bound values are read back through the registries of the [`Cli`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub command: CommandId,
    /// Canonical name of the resolved command (never an alias).
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Parser {
    config: ParserConfig,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn options_after_collected(mut self, enabled: bool) -> Self {
        self.config.options_after_collected = enabled;
        self
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Match `args` against `cli`.
    ///
    /// On success every binding is committed into the global registry and the
    /// resolved command's registry. On failure nothing is committed.
    pub fn parse<I, S>(&self, cli: &mut Cli, args: I) -> ParseResult<ParseOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stream = TokenStream::new(args);
        let staged = Session::new(self.config, cli).run(&mut stream)?;

        cli.global_mut().commit(staged.global);
        let command = cli.command_mut(staged.command);
        command.options_mut().commit(staged.bindings);
        Ok(ParseOutcome {
            command: staged.command,
            name: command.name().to_string(),
        })
    }
}

impl Cli {
    /// Parse with the default [`ParserConfig`].
    pub fn parse<I, S>(&mut self, args: I) -> ParseResult<ParseOutcome>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Parser::new().parse(self, args)
    }
}

/// Bindings staged by a parse that has not failed (yet).
struct Staged {
    command: CommandId,
    global: Vec<Binding>,
    bindings: Vec<Binding>,
}

/// One registry plus the bindings this parse staged for it.
struct Scope<'r> {
    registry: &'r OptionRegistry,
    bindings: Vec<Binding>,
}

impl<'r> Scope<'r> {
    fn new(registry: &'r OptionRegistry) -> Self {
        Self {
            registry,
            bindings: registry.fresh_bindings(),
        }
    }

    fn bind_value(
        &mut self,
        index: usize,
        identifier: &str,
        raw: String,
        spec: &ValueSpec,
        accumulate: bool,
    ) -> ParseResult<()> {
        let value = spec.parse(&raw).map_err(|cause| ParseError::InvalidKeyValue {
            decl: self.registry.decl_id(index),
            identifier: identifier.to_string(),
            value: raw.clone(),
            cause,
        })?;
        self.bindings[index].bind(value, accumulate);
        Ok(())
    }

    /// Bind a positional to the next unfilled param, or to the collected one.
    fn bind_positional(&mut self, next_param: &mut usize, token: String) -> ParseResult<()> {
        let registry = self.registry;
        let index = match registry.param_indices().get(*next_param) {
            Some(&index) => {
                *next_param += 1;
                index
            }
            None => registry
                .collected_index()
                .ok_or_else(|| ParseError::UnexpectedArgument { token: token.clone() })?,
        };
        let decl = registry.decl_at(index);
        match decl.kind() {
            DeclKind::Param { spec, .. } => {
                self.bind_value(index, decl.primary_name(), token, spec, false)
            }
            DeclKind::Collected { spec, .. } => {
                self.bind_value(index, decl.primary_name(), token, spec, true)
            }
            _ => Err(ParseError::UnexpectedArgument { token }),
        }
    }

    fn is_absorbing(&self, next_param: usize) -> bool {
        next_param >= self.registry.param_indices().len()
            && self.registry.collected_index().is_some()
    }

    fn check_required(&self) -> ParseResult<()> {
        let registry = self.registry;
        let positionals = registry
            .param_indices()
            .iter()
            .copied()
            .chain(registry.collected_index());
        for index in positionals {
            let decl = registry.decl_at(index);
            let bound = self.bindings[index].values.len();
            let missing = match decl.kind() {
                DeclKind::Param { required, .. } => *required && bound == 0,
                DeclKind::Collected { min_count, .. } => bound < *min_count,
                _ => false,
            };
            if missing {
                return Err(ParseError::MissingRequiredArgument {
                    decl: registry.decl_id(index),
                    name: decl.primary_name().to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_groups(&self) -> ParseResult<()> {
        for (index, group) in self.registry.groups().iter().enumerate() {
            let fired = group
                .members()
                .iter()
                .filter(|&&m| self.bindings[m].occurrences > 0)
                .count();
            if !group.kind().is_satisfied(fired, group.members().len()) {
                return Err(ParseError::OptionGroupMisuse {
                    group: self.registry.group_id(index),
                    name: group.name().to_string(),
                    kind: group.kind(),
                });
            }
        }
        Ok(())
    }
}

/// Classify and bind the option at the head of `stream`.
///
/// `scopes` are searched in order; the first registry declaring the
/// identifier wins.
fn match_option(stream: &mut TokenStream, scopes: &mut [&mut Scope<'_>]) -> ParseResult<()> {
    let Some(token) = stream.consume_option() else {
        return Ok(());
    };
    let hit = scopes
        .iter()
        .enumerate()
        .find_map(|(n, scope)| scope.registry.lookup(&token.name).map(|index| (n, index)));
    let Some((n, index)) = hit else {
        return Err(ParseError::UnrecognizedOption { token: token.name });
    };
    let scope = &mut *scopes[n];
    let registry = scope.registry;
    let decl = registry.decl_at(index);

    match decl.kind() {
        DeclKind::Flag { counting } => {
            if token.inline_value.is_some() {
                return Err(ParseError::UnexpectedValueAfterFlag { flag: token.name });
            }
            tracing::trace!(flag = %token.name, "matched flag");
            if *counting {
                scope.bindings[index].bump();
            } else {
                scope.bindings[index].set();
            }
            Ok(())
        }
        DeclKind::Key { spec, variadic } => {
            let raw = match token.inline_value {
                Some(value) => value,
                None => next_value(stream, &token.name)?,
            };
            tracing::trace!(key = %token.name, value = %raw, "matched key");
            scope.bind_value(index, &token.name, raw, spec, *variadic)
        }
        _ => Err(ParseError::UnrecognizedOption { token: token.name }),
    }
}

/// Take the token after a key as its value.
///
/// An option-shaped token is pushed back: it is not a value.
fn next_value(stream: &mut TokenStream, key: &str) -> ParseResult<String> {
    match stream.consume() {
        Some(next) if !looks_like_option(&next) => Ok(next),
        Some(next) => {
            stream.prepend(next);
            Err(ParseError::ExpectedValueAfterKey {
                key: key.to_string(),
            })
        }
        None => Err(ParseError::ExpectedValueAfterKey {
            key: key.to_string(),
        }),
    }
}

struct Session<'c> {
    config: ParserConfig,
    cli: &'c Cli,
}

impl<'c> Session<'c> {
    fn new(config: ParserConfig, cli: &'c Cli) -> Self {
        Self { config, cli }
    }

    fn run(self, stream: &mut TokenStream) -> ParseResult<Staged> {
        let mut global = Scope::new(self.cli.global());
        let command = self.match_global(stream, &mut global)?;
        let mut scope = Scope::new(self.cli.command(command).options());
        self.match_command(stream, &mut scope, &mut global)?;

        scope.check_required()?;
        scope.check_groups()?;
        global.check_groups()?;

        Ok(Staged {
            command,
            global: global.bindings,
            bindings: scope.bindings,
        })
    }

    /// Match global options up to the command name, then resolve it.
    fn match_global(
        &self,
        stream: &mut TokenStream,
        global: &mut Scope<'_>,
    ) -> ParseResult<CommandId> {
        tracing::debug!(cli = %self.cli.name(), "matching global options");
        loop {
            stream.expand_front();
            let is_option = match stream.peek() {
                Some(head) => looks_like_option(head),
                None => return Err(ParseError::MissingCommand),
            };
            if is_option {
                match_option(stream, &mut [&mut *global])?;
                continue;
            }
            let Some(name) = stream.consume() else {
                return Err(ParseError::MissingCommand);
            };
            let Some(command) = self.cli.resolve(&name) else {
                return Err(ParseError::CommandNotFound { name });
            };
            tracing::debug!(command = %self.cli.command(command).name(), "resolved command");
            return Ok(command);
        }
    }

    fn match_command<'s>(
        &self,
        stream: &mut TokenStream,
        scope: &mut Scope<'s>,
        global: &mut Scope<'s>,
    ) -> ParseResult<()> {
        let mut next_param = 0usize;
        let mut options_ended = false;

        loop {
            if scope.is_absorbing(next_param) && !self.config.options_after_collected {
                let rest = stream.drain_remaining();
                tracing::debug!(count = rest.len(), "collecting remaining tokens verbatim");
                for token in rest {
                    scope.bind_positional(&mut next_param, token)?;
                }
                return Ok(());
            }

            if !options_ended {
                stream.expand_front();
            }
            let Some(head) = stream.peek() else {
                return Ok(());
            };
            if !options_ended && head == END_OF_OPTIONS {
                stream.consume();
                options_ended = true;
                continue;
            }
            let is_option = !options_ended && looks_like_option(head);

            if is_option {
                match_option(stream, &mut [&mut *scope, &mut *global])?;
            } else if let Some(token) = stream.consume() {
                tracing::trace!(%token, "matched positional");
                scope.bind_positional(&mut next_param, token)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Value, ValueKind};
    use crate::model::Command;

    fn run_cli() -> (Cli, crate::model::ParamId, crate::model::CollectedId, crate::model::FlagId) {
        let mut cmd = Command::new("run");
        let executable = cmd.options_mut().param("executable", ValueKind::String).unwrap();
        let args = cmd.options_mut().collected("args", ValueKind::String).unwrap();
        let verbose = cmd.options_mut().flag(["-v", "--verbose"]).unwrap();
        let mut cli = Cli::new("tester");
        cli.register(cmd).unwrap();
        (cli, executable, args, verbose)
    }

    fn strs(values: &[Value]) -> Vec<&str> {
        values.iter().filter_map(Value::as_str).collect()
    }

    #[test]
    fn config_deserializes_kebab_case() {
        let config: ParserConfig =
            serde_json::from_str(r#"{"options-after-collected": true}"#).unwrap();
        assert!(config.options_after_collected);
        let config: ParserConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());
    }

    #[test]
    fn collected_cluster_is_kept_verbatim() {
        let (mut cli, _, args, _) = run_cli();
        let outcome = cli.parse(["run", "cli", "-vx", "--", "tail"]).unwrap();
        let options = cli.command(outcome.command).options();
        assert_eq!(strs(options.collected_values(args)), ["-vx", "--", "tail"]);
    }

    #[test]
    fn end_of_options_marker_makes_the_rest_positional() {
        let mut cmd = Command::new("rm");
        let force = cmd.options_mut().flag("-f").unwrap();
        let target = cmd.options_mut().param("target", ValueKind::String).unwrap();
        let mut cli = Cli::new("tester");
        let id = cli.register(cmd).unwrap();

        cli.parse(["rm", "--", "-f"]).unwrap();
        let options = cli.command(id).options();
        assert!(!options.is_set(force));
        assert_eq!(options.param_value(target).and_then(Value::as_str), Some("-f"));
    }

    #[test]
    fn extra_positional_without_collected_param_fails() {
        let mut cmd = Command::new("show");
        cmd.options_mut().param("file", ValueKind::String).unwrap();
        let mut cli = Cli::new("tester");
        cli.register(cmd).unwrap();

        let err = cli.parse(["show", "a", "b"]).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedArgument {
                token: "b".to_string()
            }
        );
    }

    #[test]
    fn failed_parse_commits_nothing() {
        let (mut cli, executable, _, verbose) = run_cli();
        let id = cli.parse(["run", "-v", "first"]).unwrap().command;
        assert!(cli.command(id).options().is_set(verbose));

        let err = cli.parse(["run", "-v", "--nope"]).unwrap_err();
        assert!(matches!(err, ParseError::UnrecognizedOption { .. }));
        let options = cli.command(id).options();
        // Still the state of the previous successful parse.
        assert!(options.is_set(verbose));
        assert_eq!(options.param_value(executable).and_then(Value::as_str), Some("first"));
    }

    #[test]
    fn failed_parse_leaves_global_options_untouched() {
        let (mut cli, _, _, _) = run_cli();
        let yes = cli.global_mut().flag(["-y", "--yes"]).unwrap();
        let debug = cli.global_mut().counter("-d").unwrap();
        cli.parse(["-d", "run", "first"]).unwrap();

        let err = cli.parse(["-y", "-dd", "run"]).unwrap_err();
        assert!(matches!(err, ParseError::MissingRequiredArgument { .. }));
        assert!(!cli.global().is_set(yes));
        assert_eq!(cli.global().count(debug), 1);
    }

    #[test]
    fn global_options_are_shared_with_commands() {
        let (mut cli, _, _, _) = run_cli();
        let yes = cli.global_mut().flag(["-y", "--yes"]).unwrap();
        cli.parse(["run", "-y", "cli"]).unwrap();
        assert!(cli.global().is_set(yes));
    }

    #[test]
    fn command_options_shadow_global_ones() {
        let (mut cli, _, _, verbose) = run_cli();
        let global_verbose = cli.global_mut().flag("-v").unwrap();
        let id = cli.parse(["run", "-v", "cli"]).unwrap().command;
        assert!(cli.command(id).options().is_set(verbose));
        assert!(!cli.global().is_set(global_verbose));
    }

    #[test]
    fn missing_and_unknown_commands() {
        let (mut cli, _, _, _) = run_cli();
        assert_eq!(cli.parse(Vec::<String>::new()), Err(ParseError::MissingCommand));
        assert_eq!(
            cli.parse(["walk"]),
            Err(ParseError::CommandNotFound {
                name: "walk".to_string()
            })
        );
    }
}
