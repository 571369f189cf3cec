//! Reader for Blorb resource containers.
//!
//! A Blorb file is an IFF `FORM` of type `IFRS`. Its first chunk is the
//! resource index (`RIdx`), whose entries point at the chunks holding
//! pictures, sounds, data and executables. An optional `Reso` chunk carries
//! the window metrics used to scale images.

use std::fmt::Display;
use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_derive::Serialize;

pub type FourCC = [u8; 4];

const FORM: &FourCC = b"FORM";
const IFRS: &FourCC = b"IFRS";
const RIDX: &FourCC = b"RIdx";
const RESO: &FourCC = b"Reso";

const INDEX_ENTRY_LEN: u32 = 12;
const RESO_HEADER_LEN: u32 = 24;
const RESO_ENTRY_LEN: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Usage {
    Pict,
    Snd,
    Data,
    Exec,
    Other(FourCC),
}
impl Usage {
    fn from_fourcc(id: FourCC) -> Self {
        match &id {
            b"Pict" => Usage::Pict,
            b"Snd " => Usage::Snd,
            b"Data" => Usage::Data,
            b"Exec" => Usage::Exec,
            _ => Usage::Other(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub id: FourCC,
    /// Offset of the chunk header from the start of the file.
    pub offset: u32,
    pub len: u32,
}
impl ChunkInfo {
    pub fn data_start(&self) -> usize {
        self.offset as usize + 8
    }

    pub fn data<'a>(&self, file: &'a [u8]) -> &'a [u8] {
        let start = self.data_start();
        &file[start..start + self.len as usize]
    }
}

#[derive(Debug)]
pub enum BlorbError {
    NotIff,
    NotBlorb(FourCC),
    Truncated,
    MissingIndex,
    MalformedIndex { len: u32 },
    DanglingEntry { usage: Usage, number: u32, start: u32 },
    MalformedChunk { id: FourCC, len: u32 },
}
impl Display for BlorbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlorbError::NotIff => write!(f, "not an IFF file"),
            BlorbError::NotBlorb(kind) => {
                write!(f, "IFF form type `{}` is not IFRS", fourcc_str(kind))
            }
            BlorbError::Truncated => write!(f, "file is truncated"),
            BlorbError::MissingIndex => write!(f, "first chunk is not a resource index"),
            BlorbError::MalformedIndex { len } => {
                write!(f, "resource index has inconsistent length {len}")
            }
            BlorbError::DanglingEntry {
                usage,
                number,
                start,
            } => write!(
                f,
                "resource {usage:?} {number} points at {start:#x}, which is not a chunk"
            ),
            BlorbError::MalformedChunk { id, len } => {
                write!(f, "chunk `{}` has invalid length {len}", fourcc_str(id))
            }
        }
    }
}
impl std::error::Error for BlorbError {}

impl From<std::io::Error> for BlorbError {
    fn from(_value: std::io::Error) -> Self {
        BlorbError::Truncated
    }
}

pub fn fourcc_str(id: &FourCC) -> String {
    String::from_utf8_lossy(id).into_owned()
}

fn read_id(reader: &mut impl Read) -> Result<FourCC, std::io::Error> {
    let mut id = [0; 4];
    reader.read_exact(&mut id)?;
    Ok(id)
}

/// A validated Blorb resource map.
#[derive(Debug)]
pub struct ResourceMap {
    resources: IndexMap<(Usage, u32), ChunkInfo>,
    resolution: Option<ChunkInfo>,
}

impl ResourceMap {
    pub fn parse(file: &[u8]) -> Result<ResourceMap, BlorbError> {
        let mut reader = Cursor::new(file);

        if file.len() < 12 || &read_id(&mut reader)? != FORM {
            return Err(BlorbError::NotIff);
        }
        let form_len = reader.read_u32::<BigEndian>()?;
        let form_type = read_id(&mut reader)?;
        if &form_type != IFRS {
            return Err(BlorbError::NotBlorb(form_type));
        }
        let form_end = 8 + form_len as u64;
        if form_end > file.len() as u64 {
            return Err(BlorbError::Truncated);
        }

        let mut chunk_order = Vec::new();
        let mut chunks = FxHashMap::default();
        let mut pos = 12u64;
        while pos + 8 <= form_end {
            reader.set_position(pos);
            let id = read_id(&mut reader)?;
            let len = reader.read_u32::<BigEndian>()?;
            let end = pos + 8 + len as u64;
            if end > form_end {
                return Err(BlorbError::Truncated);
            }
            let chunk = ChunkInfo {
                id,
                offset: pos as u32,
                len,
            };
            chunk_order.push(chunk);
            chunks.insert(chunk.offset, chunk);
            pos = end + (len & 1) as u64;
        }

        let index = match chunk_order.first() {
            Some(chunk) if &chunk.id == RIDX => *chunk,
            _ => return Err(BlorbError::MissingIndex),
        };
        let resources = parse_index(file, index, &chunks)?;
        let resolution = chunk_order.iter().find(|chunk| &chunk.id == RESO).copied();

        Ok(ResourceMap {
            resources,
            resolution,
        })
    }

    pub fn get(&self, usage: Usage, number: u32) -> Option<&ChunkInfo> {
        self.resources.get(&(usage, number))
    }

    pub fn resources(&self) -> impl ExactSizeIterator<Item = (Usage, u32, &ChunkInfo)> {
        self.resources
            .iter()
            .map(|(&(usage, number), chunk)| (usage, number, chunk))
    }

    pub fn count(&self, usage: Usage) -> usize {
        self.resources().filter(|&(u, _, _)| u == usage).count()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Reads the `Reso` chunk, if the file has one.
    pub fn scale_info(&self, file: &[u8]) -> Result<Option<ScaleInfo>, BlorbError> {
        self.resolution
            .map(|chunk| ScaleInfo::parse(chunk, chunk.data(file)))
            .transpose()
    }
}

fn parse_index(
    file: &[u8],
    index: ChunkInfo,
    chunks: &FxHashMap<u32, ChunkInfo>,
) -> Result<IndexMap<(Usage, u32), ChunkInfo>, BlorbError> {
    let mut reader = Cursor::new(index.data(file));
    if index.len < 4 {
        return Err(BlorbError::MalformedIndex { len: index.len });
    }
    let count = reader.read_u32::<BigEndian>()?;
    if count.checked_mul(INDEX_ENTRY_LEN).and_then(|n| n.checked_add(4)) != Some(index.len) {
        return Err(BlorbError::MalformedIndex { len: index.len });
    }

    let mut resources = IndexMap::with_capacity(count as usize);
    for _ in 0..count {
        let usage = Usage::from_fourcc(read_id(&mut reader)?);
        let number = reader.read_u32::<BigEndian>()?;
        let start = reader.read_u32::<BigEndian>()?;
        let chunk = chunks.get(&start).ok_or(BlorbError::DanglingEntry {
            usage,
            number,
            start,
        })?;
        resources.insert((usage, number), *chunk);
    }
    Ok(resources)
}

/// Window metrics from the `Reso` chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScaleInfo {
    pub standard: (u32, u32),
    pub minimum: (u32, u32),
    pub maximum: (u32, u32),
    pub images: Vec<ImageScale>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageScale {
    pub number: u32,
    pub ratio: (u32, u32),
    pub min_ratio: (u32, u32),
    pub max_ratio: (u32, u32),
}

impl ScaleInfo {
    fn parse(chunk: ChunkInfo, data: &[u8]) -> Result<ScaleInfo, BlorbError> {
        if chunk.len < RESO_HEADER_LEN || (chunk.len - RESO_HEADER_LEN) % RESO_ENTRY_LEN != 0 {
            return Err(BlorbError::MalformedChunk {
                id: chunk.id,
                len: chunk.len,
            });
        }

        let mut reader = Cursor::new(data);
        let pair = |reader: &mut Cursor<&[u8]>| -> Result<(u32, u32), BlorbError> {
            Ok((
                reader.read_u32::<BigEndian>()?,
                reader.read_u32::<BigEndian>()?,
            ))
        };
        let standard = pair(&mut reader)?;
        let minimum = pair(&mut reader)?;
        let maximum = pair(&mut reader)?;

        let count = (chunk.len - RESO_HEADER_LEN) / RESO_ENTRY_LEN;
        let images = (0..count)
            .map(|_| -> Result<ImageScale, BlorbError> {
                Ok(ImageScale {
                    number: reader.read_u32::<BigEndian>()?,
                    ratio: pair(&mut reader)?,
                    min_ratio: pair(&mut reader)?,
                    max_ratio: pair(&mut reader)?,
                })
            })
            .collect::<Result<_, BlorbError>>()?;

        Ok(ScaleInfo {
            standard,
            minimum,
            maximum,
            images,
        })
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    /// Assembles an IFRS form from `(id, payload)` chunks, padding odd lengths.
    pub fn form(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut body = b"IFRS".to_vec();
        for (id, payload) in chunks {
            body.extend_from_slice(*id);
            body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            body.extend_from_slice(payload);
            if payload.len() % 2 == 1 {
                body.push(0);
            }
        }
        let mut file = b"FORM".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_be_bytes());
        file.extend(body);
        file
    }

    pub fn index(entries: &[(&[u8; 4], u32, u32)]) -> Vec<u8> {
        let mut payload = (entries.len() as u32).to_be_bytes().to_vec();
        for (usage, number, start) in entries {
            payload.extend_from_slice(*usage);
            payload.extend_from_slice(&number.to_be_bytes());
            payload.extend_from_slice(&start.to_be_bytes());
        }
        payload
    }

    /// A blorb with one picture chunk right after the index.
    pub fn minimal() -> Vec<u8> {
        // FORM header (12) + RIdx header (8) + one entry (4 + 12)
        let pict_offset = 12 + 8 + 16;
        form(&[
            (b"RIdx", index(&[(b"Pict", 1, pict_offset)])),
            (b"PNG ", vec![0x89, b'P', b'N']),
        ])
    }
}
