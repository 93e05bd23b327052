//! Database format checks
//!
//! Every database carries its format version and the embedding dimension it
//! was created with. Opening with a different model is refused rather than
//! mixing vector spaces.

use rocksdb::{IteratorMode, DB};

use crate::error::{MemoryError, Result};

/// Database version stored in metadata
pub(crate) const DB_VERSION_KEY: &[u8] = b"_db_version";
/// Embedding dimension stored in metadata
pub(crate) const DIMENSION_KEY: &[u8] = b"_dimension";
pub const CURRENT_VERSION: u32 = 1;

/// Stamp a fresh database, or verify an existing one matches this build and
/// the configured embedding dimension
pub fn prepare(db: &DB, dimension: usize) -> Result<()> {
    match read_u32(db, DB_VERSION_KEY)? {
        None => {
            if has_records(db)? {
                return Err(MemoryError::corrupt(
                    "Database holds records but no format version",
                ));
            }
            log::info!(
                "Initializing database v{} ({}d embeddings)",
                CURRENT_VERSION,
                dimension
            );
            db.put(DB_VERSION_KEY, CURRENT_VERSION.to_le_bytes())?;
            db.put(DIMENSION_KEY, (dimension as u32).to_le_bytes())?;
            db.flush()?;
            return Ok(());
        }
        Some(version) if version > CURRENT_VERSION => {
            return Err(MemoryError::corrupt(format!(
                "Database version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }
        Some(version) if version < CURRENT_VERSION => {
            return Err(MemoryError::corrupt(format!(
                "Unknown database version: {}",
                version
            )));
        }
        Some(version) => log::debug!("Database version: {}", version),
    }

    match read_u32(db, DIMENSION_KEY)? {
        Some(stored) if stored as usize != dimension => Err(MemoryError::DimensionMismatch {
            expected: stored as usize,
            actual: dimension,
        }),
        Some(_) => Ok(()),
        None => Err(MemoryError::corrupt("Database is missing its embedding dimension")),
    }
}

fn read_u32(db: &DB, key: &[u8]) -> Result<Option<u32>> {
    let Some(bytes) = db.get(key)? else {
        return Ok(None);
    };
    let raw: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
        MemoryError::corrupt(format!(
            "Invalid metadata value for {}",
            String::from_utf8_lossy(key)
        ))
    })?;
    Ok(Some(u32::from_le_bytes(raw)))
}

/// Whether anything other than metadata is stored
fn has_records(db: &DB) -> Result<bool> {
    for item in db.iterator(IteratorMode::Start) {
        let (key, _) = item?;
        if !key.starts_with(b"_") {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocksdb::Options;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> DB {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        DB::open(&opts, dir.path()).unwrap()
    }

    #[test]
    fn test_fresh_database_is_stamped() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);

        prepare(&db, 384).unwrap();
        assert_eq!(read_u32(&db, DB_VERSION_KEY).unwrap(), Some(CURRENT_VERSION));
        assert_eq!(read_u32(&db, DIMENSION_KEY).unwrap(), Some(384));

        // reopening with the same model is fine
        prepare(&db, 384).unwrap();
    }

    #[test]
    fn test_dimension_change_is_refused() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        prepare(&db, 384).unwrap();

        let err = prepare(&db, 256).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 384,
                actual: 256
            }
        ));
    }

    #[test]
    fn test_newer_version_is_refused() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        db.put(DB_VERSION_KEY, (CURRENT_VERSION + 1).to_le_bytes())
            .unwrap();

        assert!(matches!(prepare(&db, 8), Err(MemoryError::Corrupt(_))));
    }

    #[test]
    fn test_unversioned_records_are_refused() {
        let dir = TempDir::new().unwrap();
        let db = open(&dir);
        db.put(b"proj:legacy", b"data").unwrap();

        assert!(matches!(prepare(&db, 8), Err(MemoryError::Corrupt(_))));
    }
}
