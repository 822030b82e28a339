use std::fmt::{Display, Error, Formatter};
use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::error::{Result, ScriptError};

/// Internal title at the start of the SNES header.
pub const TITLE: &[u8] = b"EARTH BOUND";

/// Size of the copier header some dumps carry.
pub const COPIER_HEADER: usize = 0x200;

const HIROM_HEADER: usize = 0xFFC0;
const LOROM_HEADER: usize = 0x7FC0;

// Offsets within the SNES header
const COMPLEMENT: usize = 0x1C;
const CHECKSUM: usize = 0x1E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    HiRom,
    LoRom,
}

/// A de-headered EarthBound image.
pub struct Rom {
    data: Vec<u8>,
    mapping: Mapping,
    headered: bool,
}

/// True if a valid internal header for EarthBound starts at `base`.
fn header_at(bytes: &[u8], base: usize) -> bool {
    let Some(header) = bytes.get(base..base + 0x20) else {
        return false;
    };
    header[COMPLEMENT] ^ 0xFF == header[CHECKSUM]
        && header[COMPLEMENT + 1] ^ 0xFF == header[CHECKSUM + 1]
        && header.starts_with(TITLE)
}

impl Rom {
    /// Identify the image layout and strip a copier header if present.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Rom> {
        let layouts = [
            (0, HIROM_HEADER, Mapping::HiRom),
            (0, LOROM_HEADER, Mapping::LoRom),
            (COPIER_HEADER, HIROM_HEADER, Mapping::HiRom),
            (COPIER_HEADER, LOROM_HEADER, Mapping::LoRom),
        ];
        let (skip, mapping) = layouts
            .iter()
            .find(|(skip, base, _)| header_at(&bytes, skip + base))
            .map(|&(skip, _, mapping)| (skip, mapping))
            .ok_or_else(|| {
                ScriptError::InvalidRom(format!(
                    "no {} header found in {} bytes",
                    String::from_utf8_lossy(TITLE),
                    bytes.len()
                ))
            })?;

        debug!("Detected {:?} image, copier header: {}", mapping, skip != 0);
        let data = if skip == 0 {
            bytes
        } else {
            bytes[skip..].to_vec()
        };
        Ok(Rom {
            data,
            mapping,
            headered: skip != 0,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Rom> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        info!("Loaded {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(bytes)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    pub fn is_headered(&self) -> bool {
        self.headered
    }
}

impl Display for Rom {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::result::Result<(), Error> {
        write!(
            f,
            "{:?}, {} bytes{}",
            self.mapping,
            self.data.len(),
            if self.headered {
                " (copier header removed)"
            } else {
                ""
            }
        )
    }
}
