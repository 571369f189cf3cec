//! Startup sequence run before the interpreter takes over.
//!
//! ```text
//! Bootstrap::run
//!  └─ Options::startup_defaults   -- autosave on, env override
//!  └─ ArgumentProcessor           -- register + process, may stop here
//!  └─ ShutdownHandle::new         -- stream cleanup for the host
//!  └─ GlkHost::set_base_file      -- only if the host supports it
//!  └─ ResourceResolver::resolve   -- bind the Blorb, if any
//! ```

use std::ffi::OsString;
use std::path::PathBuf;

use crate::args::{ArgError, ArgOutcome, ArgumentProcessor, ArgumentRegistry};
use crate::config::Options;
use crate::resolver::{GlkHost, ResourceResolver};
use crate::shutdown::ShutdownHandle;

/// Value returned to the host library for every outcome. The host does not
/// distinguish a normal start from an early stop; the interpreter checks
/// [`StartupOutcome`] itself.
pub const HOST_STARTUP_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    Init,
    Configured,
    ArgsParsed,
    HookRegistered,
    ResourcesResolved,
    Done,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Help or version information was requested; holds the text to show.
    EarlyExit(String),
    ArgumentError(ArgError),
    AlreadyStarted,
}

#[derive(Debug)]
pub struct Bootstrapped {
    pub options: Options,
    pub game_file: PathBuf,
    pub registry: ArgumentRegistry,
    pub shutdown: ShutdownHandle,
    pub resources_bound: bool,
}

#[derive(Debug)]
pub enum StartupOutcome {
    Continue(Bootstrapped),
    Stop(StopReason),
}
impl StartupOutcome {
    pub fn host_code(&self) -> i32 {
        HOST_STARTUP_CODE
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, StartupOutcome::Continue(_))
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<OsString>>;

pub struct Bootstrap<H, P> {
    host: H,
    processor: P,
    env: EnvLookup,
    state: BootstrapState,
}

impl<H: GlkHost, P: ArgumentProcessor> Bootstrap<H, P> {
    pub fn new(host: H, processor: P) -> Self {
        Bootstrap {
            host,
            processor,
            env: Box::new(|key| std::env::var_os(key)),
            state: BootstrapState::Init,
        }
    }

    /// Replaces the process environment as the source of overrides.
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<OsString> + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    fn advance(&mut self, state: BootstrapState) {
        tracing::trace!("bootstrap {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn stop(&mut self, reason: StopReason) -> StartupOutcome {
        self.advance(BootstrapState::Stopped);
        StartupOutcome::Stop(reason)
    }

    /// Runs the startup sequence once. `cleanup` becomes the shutdown hook
    /// handed back to the host.
    pub fn run(
        &mut self,
        args: &[OsString],
        cleanup: impl FnOnce() + Send + 'static,
    ) -> StartupOutcome {
        if self.state != BootstrapState::Init {
            tracing::warn!("bootstrap already ran ({:?})", self.state);
            return StartupOutcome::Stop(StopReason::AlreadyStarted);
        }

        let mut options = Options::startup_defaults(|key| (self.env)(key));
        self.advance(BootstrapState::Configured);

        let mut registry = ArgumentRegistry::new();
        let mut game_file = PathBuf::new();
        let outcome = match self.processor.register(&mut registry) {
            Ok(()) => self
                .processor
                .process(args, &registry, &mut options, &mut game_file),
            Err(e) => ArgOutcome::Error(e),
        };
        match outcome {
            ArgOutcome::Proceed => {}
            ArgOutcome::EarlyExit(text) => return self.stop(StopReason::EarlyExit(text)),
            ArgOutcome::Error(e) => {
                tracing::debug!("argument error: {e}");
                return self.stop(StopReason::ArgumentError(e));
            }
        }
        self.advance(BootstrapState::ArgsParsed);

        let shutdown = ShutdownHandle::new(cleanup);
        self.advance(BootstrapState::HookRegistered);

        let mut resources_bound = false;
        if !game_file.as_os_str().is_empty() {
            if self.host.capabilities().base_file_names {
                self.host.set_base_file(&game_file);
            }
            resources_bound = ResourceResolver::new(&mut self.host).resolve(&game_file);
            if !resources_bound {
                tracing::debug!("no resources found for {}", game_file.display());
            }
        }
        self.advance(BootstrapState::ResourcesResolved);

        self.advance(BootstrapState::Done);
        StartupOutcome::Continue(Bootstrapped {
            options,
            game_file,
            registry,
            shutdown,
            resources_bound,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use std::path::Path;

    use super::*;
    use crate::args::{ArgKind, GlkArguments};
    use crate::config::AUTOSAVE_DIRECTORY_VAR;
    use crate::resolver::tests::RecordingHost;

    fn args(list: &[&str]) -> Vec<OsString> {
        std::iter::once("glkstart")
            .chain(list.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn bootstrap(host: RecordingHost) -> Bootstrap<RecordingHost, GlkArguments> {
        Bootstrap::new(host, GlkArguments::default()).with_env(|_| None)
    }

    #[test]
    fn full_sequence_binds_resources() {
        let host = RecordingHost::with_files(&[("game.z5", false), ("game.blb", true)]);
        let mut bootstrap = bootstrap(host);
        let outcome = bootstrap.run(&args(&["game.z5"]), || {});
        assert_eq!(outcome.host_code(), 1);
        assert_eq!(bootstrap.state(), BootstrapState::Done);

        let StartupOutcome::Continue(started) = outcome else {
            panic!("bootstrap stopped");
        };
        assert_eq!(started.game_file, Path::new("game.z5"));
        assert!(started.resources_bound);
        assert!(started.options.autosave && started.options.autosave_librarystate);

        let host = bootstrap.into_host();
        assert_eq!(host.base_file.as_deref(), Some("game.z5"));
        assert_eq!(
            host.events,
            vec!["open game.z5", "close game.z5", "open game.blb"]
        );
        assert_eq!(host.bound.as_deref(), Some("game.blb"));
    }

    #[test]
    fn missing_resources_still_continue() {
        let mut bootstrap = bootstrap(RecordingHost::default());
        let outcome = bootstrap.run(&args(&["story"]), || {});
        let StartupOutcome::Continue(started) = outcome else {
            panic!("bootstrap stopped");
        };
        assert!(!started.resources_bound);
        assert_eq!(bootstrap.host().opened().len(), 3);
    }

    #[test]
    fn no_game_file_skips_resolution_and_base_file() {
        let mut bootstrap = bootstrap(RecordingHost::default());
        let outcome = bootstrap.run(&args(&[]), || {});
        assert!(outcome.is_continue());
        assert!(bootstrap.host().events.is_empty());
        assert_eq!(bootstrap.host().base_file, None);
    }

    #[test]
    fn base_file_skipped_without_capability() {
        let host = RecordingHost {
            no_base_files: true,
            ..RecordingHost::with_files(&[("game.blorb", true)])
        };
        let mut bootstrap = bootstrap(host);
        assert!(bootstrap.run(&args(&["game.blorb"]), || {}).is_continue());
        assert_eq!(bootstrap.host().base_file, None);
        assert_eq!(bootstrap.host().bound.as_deref(), Some("game.blorb"));
    }

    #[test]
    fn help_stops_before_any_open() {
        let mut bootstrap = bootstrap(RecordingHost::with_files(&[("game.z5", true)]));
        let outcome = bootstrap.run(&args(&["-h", "game.z5"]), || {});
        assert_eq!(outcome.host_code(), 1);
        let StartupOutcome::Stop(StopReason::EarlyExit(text)) = outcome else {
            panic!("expected early exit");
        };
        assert!(text.contains("display help"));
        assert_eq!(bootstrap.state(), BootstrapState::Stopped);
        assert!(bootstrap.host().events.is_empty());
        assert_eq!(bootstrap.host().base_file, None);
    }

    #[test]
    fn argument_error_stops_before_any_open() {
        let mut bootstrap = bootstrap(RecordingHost::with_files(&[("game.z5", true)]));
        let outcome = bootstrap.run(&args(&["-U", "many", "game.z5"]), || {});
        assert_eq!(outcome.host_code(), 1);
        let StartupOutcome::Stop(StopReason::ArgumentError(e)) = outcome else {
            panic!("expected an argument error");
        };
        assert!(e.to_string().contains("many"));
        assert_eq!(bootstrap.state(), BootstrapState::Stopped);
        assert!(bootstrap.host().events.is_empty());
    }

    #[test]
    fn environment_override_reaches_options() {
        let mut bootstrap = Bootstrap::new(RecordingHost::default(), GlkArguments::default())
            .with_env(|key| (key == AUTOSAVE_DIRECTORY_VAR).then(|| "/tmp/autosaves".into()));
        let StartupOutcome::Continue(started) = bootstrap.run(&args(&[]), || {}) else {
            panic!("bootstrap stopped");
        };
        assert_eq!(
            started.options.autosave_directory.as_deref(),
            Some(Path::new("/tmp/autosaves"))
        );
    }

    #[test]
    fn shutdown_handle_runs_cleanup() {
        let cleaned = Arc::new(AtomicBool::new(false));
        let mut bootstrap = bootstrap(RecordingHost::default());
        let outcome = bootstrap.run(&args(&[]), {
            let cleaned = Arc::clone(&cleaned);
            move || cleaned.store(true, Ordering::SeqCst)
        });
        let StartupOutcome::Continue(started) = outcome else {
            panic!("bootstrap stopped");
        };
        assert!(!cleaned.load(Ordering::SeqCst));
        assert!(started.shutdown.on_shutdown());
        assert!(cleaned.load(Ordering::SeqCst));
    }

    #[test]
    fn runs_only_once() {
        let mut bootstrap = bootstrap(RecordingHost::with_files(&[("game.blb", true)]));
        assert!(bootstrap.run(&args(&["game.blb"]), || {}).is_continue());
        let again = bootstrap.run(&args(&["game.blb"]), || {});
        assert!(matches!(
            again,
            StartupOutcome::Stop(StopReason::AlreadyStarted)
        ));
        assert_eq!(bootstrap.host().opened().len(), 1);
        assert_eq!(bootstrap.state(), BootstrapState::Done);
    }

    /// Processor that sees the options after startup defaults.
    struct ChecksDefaults {
        processed: Rc<Cell<bool>>,
    }
    impl ArgumentProcessor for ChecksDefaults {
        fn register(&self, registry: &mut ArgumentRegistry) -> Result<(), ArgError> {
            registry.push("", ArgKind::ValueFollows, "game")
        }

        fn process(
            &self,
            _args: &[OsString],
            _registry: &ArgumentRegistry,
            options: &mut Options,
            game_file: &mut PathBuf,
        ) -> ArgOutcome {
            self.processed.set(true);
            assert!(options.autosave && options.autosave_librarystate);
            game_file.push("game.z5");
            ArgOutcome::Proceed
        }
    }

    #[test]
    fn defaults_are_applied_before_arguments() {
        let processed = Rc::new(Cell::new(false));
        let processor = ChecksDefaults {
            processed: Rc::clone(&processed),
        };
        let mut bootstrap = Bootstrap::new(RecordingHost::default(), processor).with_env(|_| None);
        let StartupOutcome::Continue(started) = bootstrap.run(&args(&[]), || {}) else {
            panic!("bootstrap stopped");
        };
        assert!(processed.get());
        assert_eq!(started.game_file, Path::new("game.z5"));
        assert_eq!(started.registry.len(), 1);
    }

    struct RegistersTwice;
    impl ArgumentProcessor for RegistersTwice {
        fn register(&self, registry: &mut ArgumentRegistry) -> Result<(), ArgError> {
            registry.push("-x", ArgKind::NoValue, "x")?;
            registry.push("-x", ArgKind::NoValue, "x")
        }

        fn process(
            &self,
            _args: &[OsString],
            _registry: &ArgumentRegistry,
            _options: &mut Options,
            _game_file: &mut PathBuf,
        ) -> ArgOutcome {
            unreachable!("registration failed")
        }
    }

    #[test]
    fn registration_failure_is_an_argument_error() {
        let mut bootstrap = Bootstrap::new(RecordingHost::default(), RegistersTwice);
        let outcome = bootstrap.run(&args(&[]), || {});
        assert!(matches!(
            outcome,
            StartupOutcome::Stop(StopReason::ArgumentError(ArgError::DuplicateArgument(_)))
        ));
    }
}
