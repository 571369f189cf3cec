use std::ffi::OsString;
use std::path::PathBuf;

use serde_derive::Serialize;

/// Environment variable naming the directory autosaves are written to.
pub const AUTOSAVE_DIRECTORY_VAR: &str = "BOCFEL_AUTOSAVE_DIRECTORY";

pub const DEFAULT_UNDO_SLOTS: u32 = 100;

/// Interpreter options. Built once during bootstrap and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Options {
    pub autosave: bool,
    /// The host library, not the interpreter, serializes its own state
    /// into the autosave.
    pub autosave_librarystate: bool,
    pub autosave_directory: Option<PathBuf>,

    pub show_help: bool,
    pub show_version: bool,

    pub eval_stack_size: Option<u32>,
    pub call_stack_size: Option<u32>,
    pub undo_slots: u32,
    pub disable_color: bool,
    pub disable_sound: bool,
    pub disable_graphics_font: bool,
    pub transcript: bool,
    pub transcript_name: Option<String>,
    pub username: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            autosave: false,
            autosave_librarystate: false,
            autosave_directory: None,
            show_help: false,
            show_version: false,
            eval_stack_size: None,
            call_stack_size: None,
            undo_slots: DEFAULT_UNDO_SLOTS,
            disable_color: false,
            disable_sound: false,
            disable_graphics_font: false,
            transcript: false,
            transcript_name: None,
            username: None,
        }
    }
}

impl Options {
    /// Startup defaults: autosave with library state is always on, and the
    /// autosave directory may be overridden from the environment.
    pub fn startup_defaults(env: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut options = Options {
            autosave: true,
            autosave_librarystate: true,
            ..Options::default()
        };
        if let Some(dir) = env(AUTOSAVE_DIRECTORY_VAR) {
            tracing::debug!("autosave directory from environment: {}", dir.to_string_lossy());
            options.autosave_directory = Some(PathBuf::from(dir));
        }
        options
    }

    pub fn wants_early_exit(&self) -> bool {
        self.show_help || self.show_version
    }
}
