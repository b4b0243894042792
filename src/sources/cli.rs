//! Command-line flag configuration source.

use super::ConfigSource;
use crate::core::Tree;
use crate::error::{ConfigError, Result};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use config::{Map, Value, ValueKind};

// Leaf keys are trimmed, so no flag id starts with a space.
const POSITIONAL_ID: &str = " positional";

/// Command-line overrides.
///
/// Every leaf already present in the tree becomes a long flag named by its
/// dotted path (`--app.limit=5`), typed after the value it currently holds.
/// Only flags actually given on the command line override anything. A flag
/// naming an unknown key is an error. Positional arguments, such as a
/// subcommand name, are left to the application and never override anything.
///
/// # Examples
///
/// ```rust
/// use bootkit::sources::CliSource;
///
/// let source = CliSource::new(["--server.port", "9090"]);
/// ```
pub struct CliSource {
    args: Vec<String>,
    priority: i32,
}

#[derive(Clone, Copy)]
enum FlagType {
    Bool,
    Int,
    Float,
    Text,
}

impl FlagType {
    fn of(value: &Value) -> Self {
        match value.kind {
            ValueKind::Boolean(_) => Self::Bool,
            ValueKind::I64(_) | ValueKind::I128(_) | ValueKind::U64(_) | ValueKind::U128(_) => {
                Self::Int
            }
            ValueKind::Float(_) => Self::Float,
            _ => Self::Text,
        }
    }

    fn arg(self, key: &str) -> Arg {
        let arg = Arg::new(key.to_string())
            .long(key.to_string())
            .action(ArgAction::Set);
        match self {
            Self::Bool => arg
                .value_parser(value_parser!(bool))
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true"),
            Self::Int => arg.value_parser(value_parser!(i64)),
            Self::Float => arg.value_parser(value_parser!(f64)),
            Self::Text => arg.value_parser(value_parser!(String)),
        }
    }

    fn extract(self, matches: &ArgMatches, key: &str) -> Option<ValueKind> {
        match self {
            Self::Bool => matches.get_one::<bool>(key).copied().map(ValueKind::Boolean),
            Self::Int => matches.get_one::<i64>(key).copied().map(ValueKind::I64),
            Self::Float => matches.get_one::<f64>(key).copied().map(ValueKind::Float),
            Self::Text => matches.get_one::<String>(key).cloned().map(ValueKind::String),
        }
    }
}

impl CliSource {
    /// Create a source from arguments, excluding the program name.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            priority: 400,
        }
    }

    /// Set the priority for this source.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// The raw arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl ConfigSource for CliSource {
    fn load(&self, current: &Tree) -> Result<Map<String, Value>> {
        let mut overrides = Map::new();
        if self.args.is_empty() {
            return Ok(overrides);
        }

        let flags: Vec<(String, FlagType)> = current
            .keys()
            .into_iter()
            .filter_map(|key| {
                let flag_type = FlagType::of(current.get(&key)?);
                Some((key, flag_type))
            })
            .collect();

        let command = flags.iter().fold(
            Command::new("config")
                .no_binary_name(true)
                .disable_help_flag(true)
                .disable_version_flag(true)
                .arg(
                    Arg::new(POSITIONAL_ID)
                        .num_args(1..)
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(String)),
                ),
            |command, (key, flag_type)| command.arg(flag_type.arg(key)),
        );

        let matches = command
            .try_get_matches_from(&self.args)
            .map_err(|e| ConfigError::CliError(e.to_string().trim_end().to_string()))?;

        for (key, flag_type) in &flags {
            if matches.value_source(key) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Some(kind) = flag_type.extract(&matches, key) {
                overrides.insert(key.clone(), Value::new(None, kind));
            }
        }

        Ok(overrides)
    }

    fn name(&self) -> String {
        "cli".to_string()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}
