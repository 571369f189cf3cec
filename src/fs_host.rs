use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use memmap2::Mmap;
use serde_derive::Serialize;

use crate::Data;
use crate::blorb::{BlorbError, ResourceMap, ScaleInfo, Usage};
use crate::resolver::{GlkHost, HostCapabilities};

/// An open candidate file.
pub struct FileStream {
    pub path: PathBuf,
    pub data: Data,
}

struct BoundResources {
    path: PathBuf,
    data: Data,
    map: ResourceMap,
}

/// Host backed by the local filesystem. Streams are memory mapped, or read
/// into memory where mapping is not possible.
pub struct FsHost {
    capabilities: HostCapabilities,
    base_file: Option<PathBuf>,
    resources: Option<BoundResources>,
    scale_info: Option<ScaleInfo>,
}

#[derive(Debug, Serialize)]
pub struct ResourceSummary {
    pub path: String,
    pub pictures: usize,
    pub sounds: usize,
    pub data: usize,
    pub executables: usize,
    pub scale_info: Option<ScaleInfo>,
}

impl Default for FsHost {
    fn default() -> Self {
        FsHost::new(HostCapabilities::detect())
    }
}

impl FsHost {
    pub fn new(capabilities: HostCapabilities) -> Self {
        FsHost {
            capabilities,
            base_file: None,
            resources: None,
            scale_info: None,
        }
    }

    pub fn base_file(&self) -> Option<&Path> {
        self.base_file.as_deref()
    }

    /// Directory relative file prompts start in.
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_file.as_deref().and_then(Path::parent)
    }

    pub fn resource_path(&self) -> Option<&Path> {
        self.resources.as_ref().map(|bound| bound.path.as_path())
    }

    pub fn resource_map(&self) -> Option<&ResourceMap> {
        self.resources.as_ref().map(|bound| &bound.map)
    }

    pub fn scale_info(&self) -> Option<&ScaleInfo> {
        self.scale_info.as_ref()
    }

    pub fn read_resource(&self, usage: Usage, number: u32) -> Result<&[u8]> {
        let bound = self.resources.as_ref().context("no resource map bound")?;
        let chunk = bound
            .map
            .get(usage, number)
            .with_context(|| format!("no {usage:?} resource {number}"))?;
        Ok(chunk.data(bound.data.as_ref()))
    }

    pub fn resource_summary(&self) -> Option<ResourceSummary> {
        let bound = self.resources.as_ref()?;
        Some(ResourceSummary {
            path: bound.path.to_string_lossy().into_owned(),
            pictures: bound.map.count(Usage::Pict),
            sounds: bound.map.count(Usage::Snd),
            data: bound.map.count(Usage::Data),
            executables: bound.map.count(Usage::Exec),
            scale_info: self.scale_info.clone(),
        })
    }
}

impl GlkHost for FsHost {
    type Stream = FileStream;

    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn open_stream(&mut self, path: &Path) -> Result<FileStream, std::io::Error> {
        let file = File::open(path)?;
        let data = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => Data::Mmap(mmap),
            Err(e) => {
                tracing::debug!("cannot map {}, reading instead: {e}", path.display());
                Data::from(std::fs::read(path)?)
            }
        };
        Ok(FileStream {
            path: path.to_owned(),
            data,
        })
    }

    fn set_resource_map(&mut self, stream: FileStream) -> Result<(), (FileStream, BlorbError)> {
        let map = match ResourceMap::parse(stream.data.as_ref()) {
            Ok(map) => map,
            Err(e) => return Err((stream, e)),
        };
        if let Some(previous) = &self.resources {
            tracing::warn!(
                "replacing resource map {} with {}",
                previous.path.display(),
                stream.path.display()
            );
        }
        self.resources = Some(BoundResources {
            path: stream.path,
            data: stream.data,
            map,
        });
        Ok(())
    }

    fn close_stream(&mut self, stream: FileStream) {
        tracing::trace!("closing {}", stream.path.display());
    }

    fn load_scale_info(&mut self, path: &Path) {
        let Some(bound) = self.resources.as_ref().filter(|bound| bound.path == path) else {
            return;
        };
        match bound.map.scale_info(bound.data.as_ref()) {
            Ok(info) => self.scale_info = info,
            Err(e) => tracing::warn!("ignoring scale info in {}: {e}", path.display()),
        }
    }

    fn set_base_file(&mut self, path: &Path) {
        self.base_file = Some(path.to_owned());
    }
}
