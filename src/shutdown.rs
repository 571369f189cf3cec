use std::sync::{Arc, Mutex, PoisonError};

type Hook = Box<dyn FnOnce() + Send>;

/// Handle the host fires when it is interrupted, before it closes the
/// streams it owns.
///
/// Clones share the hook, which runs at most once.
#[derive(Clone)]
pub struct ShutdownHandle {
    hook: Arc<Mutex<Option<Hook>>>,
}

impl ShutdownHandle {
    pub fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        ShutdownHandle {
            hook: Arc::new(Mutex::new(Some(Box::new(hook)))),
        }
    }

    /// Runs the hook to completion. Returns `false` if it had already run.
    pub fn on_shutdown(&self) -> bool {
        let hook = self
            .hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match hook {
            Some(hook) => {
                tracing::debug!("running shutdown hook");
                hook();
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.hook
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl std::fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("fired", &self.is_fired())
            .finish()
    }
}
