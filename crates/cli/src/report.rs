use indexmap::IndexMap;
use optmatch::{Cli, CommandId, DeclKind, OptionRegistry, Value};
use serde::Serialize;

/// What a successful `match` run bound, keyed by primary identifier.
#[derive(Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MatchReport {
    pub command: String,
    pub global: IndexMap<String, Bound>,
    pub options: IndexMap<String, Bound>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Set(bool),
    Count(u32),
    Value(Option<Value>),
    Values(Vec<Value>),
}

impl MatchReport {
    pub fn new(cli: &Cli, command: CommandId) -> Self {
        let command = cli.command(command);
        Self {
            command: command.name().to_string(),
            global: collect(cli.global()),
            options: collect(command.options()),
        }
    }
}

fn collect(registry: &OptionRegistry) -> IndexMap<String, Bound> {
    registry
        .decls()
        .map(|(id, decl)| {
            let values = registry.bound_values(id);
            let bound = match decl.kind() {
                DeclKind::Flag { counting: true } => Bound::Count(registry.occurrences(id)),
                DeclKind::Flag { counting: false } => Bound::Set(registry.occurrences(id) > 0),
                DeclKind::Key { variadic: true, .. } | DeclKind::Collected { .. } => {
                    Bound::Values(values.to_vec())
                }
                DeclKind::Key { .. } | DeclKind::Param { .. } => {
                    Bound::Value(values.last().cloned())
                }
            };
            (decl.primary_name().to_string(), bound)
        })
        .collect()
}
