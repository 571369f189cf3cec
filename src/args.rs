//! Command line flags.
//!
//! Flags are described by [`ArgumentDescriptor`]s appended to an
//! [`ArgumentRegistry`]. The registry turns them into a [`clap::Command`],
//! so an [`ArgumentProcessor`] only has to register its flags and copy the
//! parsed values into [`Options`].

use std::ffi::OsString;
use std::fmt::Display;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::config::Options;

/// Id of the positional game file argument.
const GAME_FILE_ID: &str = "game-file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    NoValue,
    ValueFollows,
    /// The value is optional; a bare flag yields an empty string.
    ValueCanFollow,
    NumberValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDescriptor {
    /// Flag including its leading dash, e.g. `-c`. Empty for the game file.
    pub name: String,
    pub kind: ArgKind,
    pub description: String,
}
impl ArgumentDescriptor {
    pub fn id(&self) -> &str {
        match self.name.as_str() {
            "" => GAME_FILE_ID,
            name => name.trim_start_matches('-'),
        }
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.id().to_owned()).help(self.description.clone());
        if self.name.is_empty() {
            return arg
                .index(1)
                .action(ArgAction::Set)
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf));
        }

        let id = self.id();
        let mut chars = id.chars();
        let arg = match (chars.next(), chars.next()) {
            (Some(short), None) => arg.short(short),
            _ => arg.long(id.to_owned()),
        };
        match self.kind {
            ArgKind::NoValue => arg.action(ArgAction::SetTrue),
            ArgKind::ValueFollows => arg.action(ArgAction::Set).num_args(1),
            ArgKind::ValueCanFollow => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .default_missing_value(""),
            ArgKind::NumberValue => arg
                .action(ArgAction::Set)
                .num_args(1)
                .value_parser(value_parser!(u32)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    DuplicateArgument(String),
    Invalid(String),
}
impl Display for ArgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgError::DuplicateArgument(name) if name.is_empty() => {
                write!(f, "game file argument registered twice")
            }
            ArgError::DuplicateArgument(name) => write!(f, "flag `{name}` registered twice"),
            ArgError::Invalid(message) => write!(f, "{}", message.trim_end()),
        }
    }
}
impl std::error::Error for ArgError {}

/// Growable table of flag descriptors. Processors append to it explicitly
/// during bootstrap.
#[derive(Debug, Default)]
pub struct ArgumentRegistry {
    entries: Vec<ArgumentDescriptor>,
}

impl ArgumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        kind: ArgKind,
        description: impl Into<String>,
    ) -> Result<(), ArgError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ArgError::DuplicateArgument(name));
        }
        self.entries.push(ArgumentDescriptor {
            name,
            kind,
            description: description.into(),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArgumentDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn command(&self, bin_name: &str) -> Command {
        self.entries.iter().fold(
            Command::new(bin_name.to_owned())
                .disable_help_flag(true)
                .disable_version_flag(true),
            |command, entry| command.arg(entry.to_arg()),
        )
    }

    /// Parses `args` (including the binary name). Registered multi-letter
    /// flags are accepted with a single dash, as in `-singleturn`.
    pub fn matches(&self, bin_name: &str, args: &[OsString]) -> Result<ArgMatches, ArgError> {
        let args = args.iter().enumerate().map(|(i, arg)| {
            let long = arg
                .to_str()
                .filter(|arg| i > 0 && arg.len() > 2 && !arg.starts_with("--"))
                .and_then(|arg| self.get(arg));
            match long {
                Some(entry) => OsString::from(format!("-{}", entry.name)),
                None => arg.clone(),
            }
        });
        self.command(bin_name)
            .try_get_matches_from(args)
            .map_err(|err| ArgError::Invalid(err.render().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgOutcome {
    Proceed,
    /// Help or version was requested; holds the text to show.
    EarlyExit(String),
    Error(ArgError),
}

pub trait ArgumentProcessor {
    fn register(&self, registry: &mut ArgumentRegistry) -> Result<(), ArgError>;

    fn process(
        &self,
        args: &[OsString],
        registry: &ArgumentRegistry,
        options: &mut Options,
        game_file: &mut PathBuf,
    ) -> ArgOutcome;
}

/// The interpreter's own flags.
pub struct GlkArguments {
    pub bin_name: String,
}

const FLAGS: &[(&str, ArgKind, &str)] = &[
    ("-a", ArgKind::NumberValue, "set the size of the evaluation stack"),
    ("-A", ArgKind::NumberValue, "set the size of the call stack"),
    ("-c", ArgKind::NoValue, "disable colors"),
    ("-F", ArgKind::NoValue, "disable the graphics font"),
    ("-h", ArgKind::NoValue, "display help"),
    ("-s", ArgKind::NoValue, "disable sound"),
    ("-t", ArgKind::NoValue, "start with transcripting enabled"),
    ("-T", ArgKind::ValueFollows, "set the transcript filename"),
    ("-u", ArgKind::ValueFollows, "set the username"),
    ("-U", ArgKind::NumberValue, "set the number of undo slots"),
    ("-v", ArgKind::NoValue, "display version"),
    ("", ArgKind::ValueFollows, "game file to load"),
];

impl Default for GlkArguments {
    fn default() -> Self {
        GlkArguments {
            bin_name: env!("CARGO_PKG_NAME").to_owned(),
        }
    }
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

fn number(matches: &ArgMatches, id: &str) -> Option<u32> {
    matches.try_get_one::<u32>(id).ok().flatten().copied()
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.try_get_one::<String>(id).ok().flatten().cloned()
}

impl ArgumentProcessor for GlkArguments {
    fn register(&self, registry: &mut ArgumentRegistry) -> Result<(), ArgError> {
        for &(name, kind, description) in FLAGS {
            registry.push(name, kind, description)?;
        }
        Ok(())
    }

    fn process(
        &self,
        args: &[OsString],
        registry: &ArgumentRegistry,
        options: &mut Options,
        game_file: &mut PathBuf,
    ) -> ArgOutcome {
        let matches = match registry.matches(&self.bin_name, args) {
            Ok(matches) => matches,
            Err(err) => return ArgOutcome::Error(err),
        };

        options.show_help = flag(&matches, "h");
        options.show_version = flag(&matches, "v");
        options.disable_color |= flag(&matches, "c");
        options.disable_graphics_font |= flag(&matches, "F");
        options.disable_sound |= flag(&matches, "s");
        options.transcript |= flag(&matches, "t");
        options.eval_stack_size = number(&matches, "a").or(options.eval_stack_size);
        options.call_stack_size = number(&matches, "A").or(options.call_stack_size);
        if let Some(undo_slots) = number(&matches, "U") {
            options.undo_slots = undo_slots;
        }
        options.transcript_name = string(&matches, "T").or(options.transcript_name.take());
        options.username = string(&matches, "u").or(options.username.take());
        if let Some(file) = matches.try_get_one::<PathBuf>(GAME_FILE_ID).ok().flatten() {
            *game_file = file.clone();
        }

        let mut shown = String::new();
        if options.show_help {
            shown.push_str(&registry.command(&self.bin_name).render_help().to_string());
        }
        if options.show_version {
            shown.push_str(&format!(
                "{} {}\n",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ));
        }

        match options.wants_early_exit() {
            true => ArgOutcome::EarlyExit(shown),
            false => ArgOutcome::Proceed,
        }
    }
}
