//! Graph chunk file format
//!
//! Little-endian layout:
//!
//! ```text
//! u32 FILE_MAGIC
//! repeated { u32 SPOT_MAGIC; u32 reserved; u32 flags; f32 x; f32 y; f32 z;
//!            u32 path_count; f32[path_count * 3] path_coords }
//! u32 FILE_ENDMAGIC
//! ```
//!
//! A position of exactly (0, 0, 0) marks a record or path entry left behind
//! by older writers and is skipped on load.

use super::chunk::ChunkCoord;
use super::spot::{Spot, SpotFlags};
use crate::core::types::{Result, Vec3};
use crate::core::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FILE_MAGIC: u32 = 0x1234_1234;
pub const FILE_ENDMAGIC: u32 = 0x4321_4321;
pub const SPOT_MAGIC: u32 = 0x5350_4f54;

/// Upper bound on neighbors stored per record
pub const MAX_PATHS_PER_SPOT: u32 = 4096;

/// One spot as stored on disk
#[derive(Clone, Debug, PartialEq)]
pub struct SpotRecord {
    pub pos: Vec3,
    pub flags: SpotFlags,
    pub paths: Vec<Vec3>,
}

impl From<&Spot> for SpotRecord {
    fn from(spot: &Spot) -> Self {
        Self {
            pos: spot.pos,
            flags: spot.flags,
            paths: spot.paths().to_vec(),
        }
    }
}

/// Get the file path for a chunk
pub fn chunk_path(base_dir: &Path, coord: ChunkCoord) -> PathBuf {
    base_dir.join(format!("c_{}_{}.bin", coord.x, coord.y))
}

/// Parse a chunk coordinate back out of a chunk file name
pub fn chunk_file_coord(file_name: &str) -> Option<ChunkCoord> {
    let stem = file_name.strip_prefix("c_")?.strip_suffix(".bin")?;
    let (x, y) = stem.split_once('_')?;
    Some(ChunkCoord::new(x.parse().ok()?, y.parse().ok()?))
}

fn is_skip_sentinel(pos: Vec3) -> bool {
    pos == Vec3::ZERO
}

fn write_vec3<W: Write>(w: &mut W, v: Vec3) -> io::Result<()> {
    w.write_f32::<LittleEndian>(v.x)?;
    w.write_f32::<LittleEndian>(v.y)?;
    w.write_f32::<LittleEndian>(v.z)
}

fn read_vec3<R: Read>(r: &mut R) -> io::Result<Vec3> {
    let x = r.read_f32::<LittleEndian>()?;
    let y = r.read_f32::<LittleEndian>()?;
    let z = r.read_f32::<LittleEndian>()?;
    Ok(Vec3::new(x, y, z))
}

/// Encode spot records into any writer
pub fn write_records<'a, W, I>(w: &mut W, records: I) -> io::Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a SpotRecord>,
{
    w.write_u32::<LittleEndian>(FILE_MAGIC)?;
    let mut written = 0;
    for record in records {
        if is_skip_sentinel(record.pos) {
            continue;
        }
        let paths: Vec<Vec3> = record
            .paths
            .iter()
            .copied()
            .filter(|p| !is_skip_sentinel(*p))
            .take(MAX_PATHS_PER_SPOT as usize)
            .collect();

        w.write_u32::<LittleEndian>(SPOT_MAGIC)?;
        w.write_u32::<LittleEndian>(0)?;
        w.write_u32::<LittleEndian>(record.flags.bits())?;
        write_vec3(w, record.pos)?;
        w.write_u32::<LittleEndian>(paths.len() as u32)?;
        for p in &paths {
            write_vec3(w, *p)?;
        }
        written += 1;
    }
    w.write_u32::<LittleEndian>(FILE_ENDMAGIC)?;
    Ok(written)
}

/// Decode spot records; `path` is only used for error reporting
pub fn read_records<R: Read>(r: &mut R, path: &Path) -> Result<Vec<SpotRecord>> {
    let magic = r.read_u32::<LittleEndian>()?;
    if magic != FILE_MAGIC {
        return Err(Error::corrupt(path, format!("bad file magic {magic:#010x}")));
    }

    let mut records = Vec::new();
    loop {
        let magic = r.read_u32::<LittleEndian>()?;
        match magic {
            FILE_ENDMAGIC => break,
            SPOT_MAGIC => {}
            other => {
                return Err(Error::corrupt(path, format!("bad record magic {other:#010x}")));
            }
        }

        let _reserved = r.read_u32::<LittleEndian>()?;
        let flags = SpotFlags(r.read_u32::<LittleEndian>()?);
        let pos = read_vec3(r)?;
        let path_count = r.read_u32::<LittleEndian>()?;
        if path_count > MAX_PATHS_PER_SPOT {
            return Err(Error::corrupt(path, format!("path count {path_count} out of range")));
        }

        let mut paths = Vec::with_capacity(path_count as usize);
        for _ in 0..path_count {
            let p = read_vec3(r)?;
            if !is_skip_sentinel(p) {
                paths.push(p);
            }
        }

        if !is_skip_sentinel(pos) {
            records.push(SpotRecord { pos, flags, paths });
        }
    }
    Ok(records)
}

/// Write a chunk file, replacing any previous one atomically
pub fn write_chunk_file(path: &Path, records: &[SpotRecord]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let written = {
        let mut w = BufWriter::new(File::create(&tmp)?);
        let written = write_records(&mut w, records)?;
        w.flush()?;
        written
    };
    fs::rename(&tmp, path)?;
    Ok(written)
}

/// Read a chunk file; `Ok(None)` if it does not exist
pub fn read_chunk_file(path: &Path) -> Result<Option<Vec<SpotRecord>>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut r = BufReader::new(file);
    match read_records(&mut r, path) {
        Ok(records) => Ok(Some(records)),
        Err(Error::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(Error::corrupt(path, "truncated file"))
        }
        Err(e) => Err(e),
    }
}

/// Delete a chunk file if present
pub fn delete_chunk_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn record(pos: Vec3, flags: SpotFlags, paths: &[Vec3]) -> SpotRecord {
        SpotRecord {
            pos,
            flags,
            paths: paths.to_vec(),
        }
    }

    #[test]
    fn test_chunk_path() {
        let base = Path::new("/tmp/graph");
        let path = chunk_path(base, ChunkCoord::new(31, -2));
        assert_eq!(path, PathBuf::from("/tmp/graph/c_31_-2.bin"));
        assert_eq!(chunk_file_coord("c_31_-2.bin"), Some(ChunkCoord::new(31, -2)));
        assert_eq!(chunk_file_coord("c_31.bin"), None);
        assert_eq!(chunk_file_coord("chunk_1_2.rkc"), None);
    }

    #[test]
    fn test_layout() {
        let records = vec![record(
            Vec3::new(1.0, 2.0, 3.0),
            SpotFlags::MAPPED,
            &[Vec3::new(4.0, 5.0, 6.0)],
        )];
        let mut bytes = Vec::new();
        write_records(&mut bytes, &records).unwrap();

        // header + (7 words + 3 path words) + end
        assert_eq!(bytes.len(), 4 + 4 * 10 + 4);
        assert_eq!(&bytes[0..4], &FILE_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &SPOT_MAGIC.to_le_bytes());
        assert_eq!(&bytes[8..12], &0u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &SpotFlags::MAPPED.bits().to_le_bytes());
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], &1u32.to_le_bytes());
        assert_eq!(&bytes[bytes.len() - 4..], &FILE_ENDMAGIC.to_le_bytes());
    }

    #[test]
    fn test_zero_sentinel_skipped() {
        let records = vec![
            record(Vec3::ZERO, SpotFlags::empty(), &[]),
            record(Vec3::new(1.0, 1.0, 1.0), SpotFlags::empty(), &[Vec3::ZERO, Vec3::ONE * 2.0]),
        ];
        let mut bytes = Vec::new();
        assert_eq!(write_records(&mut bytes, &records).unwrap(), 1);

        let loaded = read_records(&mut Cursor::new(bytes), Path::new("mem")).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].paths, vec![Vec3::ONE * 2.0]);
    }

    #[test]
    fn test_zero_record_from_old_writer_skipped() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(FILE_MAGIC).unwrap();
        for pos in [Vec3::ZERO, Vec3::new(7.0, 8.0, 9.0)] {
            bytes.write_u32::<LittleEndian>(SPOT_MAGIC).unwrap();
            bytes.write_u32::<LittleEndian>(0).unwrap();
            bytes.write_u32::<LittleEndian>(0).unwrap();
            write_vec3(&mut bytes, pos).unwrap();
            bytes.write_u32::<LittleEndian>(0).unwrap();
        }
        bytes.write_u32::<LittleEndian>(FILE_ENDMAGIC).unwrap();

        let loaded = read_records(&mut Cursor::new(bytes), Path::new("mem")).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pos, Vec3::new(7.0, 8.0, 9.0));
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let bytes = 0xdead_beefu32.to_le_bytes().to_vec();
        let err = read_records(&mut Cursor::new(bytes), Path::new("mem")).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_bad_record_magic_is_corruption() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(FILE_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(0x0bad_0bad).unwrap();
        let err = read_records(&mut Cursor::new(bytes), Path::new("mem")).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_path_count_bounded() {
        let mut bytes = Vec::new();
        bytes.write_u32::<LittleEndian>(FILE_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(SPOT_MAGIC).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        bytes.write_u32::<LittleEndian>(0).unwrap();
        write_vec3(&mut bytes, Vec3::ONE).unwrap();
        bytes.write_u32::<LittleEndian>(MAX_PATHS_PER_SPOT + 1).unwrap();
        let err = read_records(&mut Cursor::new(bytes), Path::new("mem")).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));
    }

    #[test]
    fn test_file_roundtrip_and_truncation() {
        let dir = TempDir::new().unwrap();
        let path = chunk_path(dir.path(), ChunkCoord::new(3, 4));
        assert!(read_chunk_file(&path).unwrap().is_none());

        let records = vec![
            record(Vec3::new(1.0, 2.0, 3.0), SpotFlags::MAPPED, &[Vec3::new(4.0, 2.0, 3.0)]),
            record(Vec3::new(4.0, 2.0, 3.0), SpotFlags::WATER, &[Vec3::new(1.0, 2.0, 3.0)]),
        ];
        assert_eq!(write_chunk_file(&path, &records).unwrap(), 2);
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(read_chunk_file(&path).unwrap(), Some(records));

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 6]).unwrap();
        let err = read_chunk_file(&path).unwrap_err();
        assert!(matches!(err, Error::Corrupt { .. }));

        delete_chunk_file(&path).unwrap();
        assert!(!path.exists());
        delete_chunk_file(&path).unwrap();
    }
}
