use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use serde_derive::Serialize;

use crate::blorb::BlorbError;

/// Extensions tried, in order, when the game file is not itself a Blorb.
pub const BLORB_EXTENSIONS: [&str; 2] = [".blb", ".blorb"];

/// Features of the host library that vary by platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HostCapabilities {
    /// The filesystem has a meaningful notion of the directory a file lives
    /// in, so the host can be told the game's base file.
    pub base_file_names: bool,
}
impl HostCapabilities {
    pub const fn detect() -> Self {
        HostCapabilities {
            base_file_names: cfg!(any(unix, windows)),
        }
    }
}
impl Default for HostCapabilities {
    fn default() -> Self {
        HostCapabilities::detect()
    }
}

/// A trait abstracting the host library the interpreter runs inside.
pub trait GlkHost {
    type Stream;

    fn capabilities(&self) -> HostCapabilities;

    fn open_stream(&mut self, path: &Path) -> Result<Self::Stream, std::io::Error>;
    /// Installs `stream` as the resource map. A rejected stream is handed
    /// back so the caller can close it.
    fn set_resource_map(&mut self, stream: Self::Stream) -> Result<(), (Self::Stream, BlorbError)>;
    fn close_stream(&mut self, stream: Self::Stream);

    /// Loads image scaling metadata for the container bound from `path`.
    fn load_scale_info(&mut self, path: &Path);
    fn set_base_file(&mut self, path: &Path);
}

impl<T: GlkHost> GlkHost for &mut T {
    type Stream = T::Stream;

    fn capabilities(&self) -> HostCapabilities {
        (**self).capabilities()
    }

    fn open_stream(&mut self, path: &Path) -> Result<Self::Stream, std::io::Error> {
        (**self).open_stream(path)
    }

    fn set_resource_map(&mut self, stream: Self::Stream) -> Result<(), (Self::Stream, BlorbError)> {
        (**self).set_resource_map(stream)
    }

    fn close_stream(&mut self, stream: Self::Stream) {
        (**self).close_stream(stream)
    }

    fn load_scale_info(&mut self, path: &Path) {
        (**self).load_scale_info(path)
    }

    fn set_base_file(&mut self, path: &Path) {
        (**self).set_base_file(path)
    }
}

/// Replaces everything from the last `.` with `ext`, or appends `ext` if
/// there is no `.`. Names do not have to be valid UTF-8.
pub fn with_extension(primary: &OsStr, ext: &str) -> OsString {
    let bytes = primary.as_encoded_bytes();
    let stem = match bytes.iter().rposition(|&b| b == b'.') {
        Some(dot) => &bytes[..dot],
        None => bytes,
    };
    // SAFETY: `stem` is `primary` cut directly before an ASCII `.`, or all of it.
    let mut name = unsafe { OsStr::from_encoded_bytes_unchecked(stem) }.to_owned();
    name.push(ext);
    name
}

/// Candidate container names for `primary`, in the order they are tried.
pub fn candidates(primary: &Path) -> Vec<PathBuf> {
    if primary.as_os_str().is_empty() {
        return Vec::new();
    }
    std::iter::once(primary.to_owned())
        .chain(
            BLORB_EXTENSIONS
                .iter()
                .map(|ext| PathBuf::from(with_extension(primary.as_os_str(), ext))),
        )
        .collect()
}

/// Finds the Blorb file belonging to a game and binds it as the host's
/// resource map. Binding happens at most once.
pub struct ResourceResolver<H> {
    host: H,
    attempts: usize,
    bound: Option<PathBuf>,
}

impl<H: GlkHost> ResourceResolver<H> {
    pub fn new(host: H) -> Self {
        ResourceResolver {
            host,
            attempts: 0,
            bound: None,
        }
    }

    /// Returns whether a resource map is bound. Failing to find one is not an
    /// error; the game just runs without resources.
    pub fn resolve(&mut self, primary: &Path) -> bool {
        if self.bound.is_some() {
            return true;
        }
        candidates(primary)
            .iter()
            .any(|candidate| self.try_bind(candidate))
    }

    fn try_bind(&mut self, path: &Path) -> bool {
        self.attempts += 1;
        let stream = match self.host.open_stream(path) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::debug!("cannot open resource candidate {}: {e}", path.display());
                return false;
            }
        };

        match self.host.set_resource_map(stream) {
            Ok(()) => {
                self.host.load_scale_info(path);
                tracing::info!("bound resources from {}", path.display());
                self.bound = Some(path.to_owned());
                true
            }
            Err((stream, e)) => {
                tracing::debug!("{} is not a resource map: {e}", path.display());
                self.host.close_stream(stream);
                false
            }
        }
    }

    /// Number of candidates an open was attempted for.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn bound(&self) -> Option<&Path> {
        self.bound.as_deref()
    }
}
