pub mod args;
pub mod blorb;
pub mod bootstrap;
pub mod config;
pub mod fs_host;
pub mod resolver;
pub mod shutdown;

pub use args::{ArgOutcome, ArgumentProcessor, ArgumentRegistry, GlkArguments};
pub use bootstrap::{Bootstrap, Bootstrapped, StartupOutcome, StopReason};
pub use config::Options;
pub use fs_host::FsHost;
pub use resolver::{GlkHost, HostCapabilities, ResourceResolver};
pub use shutdown::ShutdownHandle;

pub enum Data {
    InMemory(Vec<u8>),
    Mmap(memmap2::Mmap),
}
impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        match self {
            Data::InMemory(data) => data.as_slice(),
            Data::Mmap(mmap) => mmap.as_ref(),
        }
    }
}
impl From<Vec<u8>> for Data {
    fn from(data: Vec<u8>) -> Self {
        Data::InMemory(data)
    }
}
