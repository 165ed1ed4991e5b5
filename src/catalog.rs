//! Reference catalogue: per-sequence length, name, and assigned taxon id,
//! loaded from `<prefix>.3.cfr` (spec §3, §6).
//!
//! The distilled spec's external interface names this file a bare
//! `(seqId, length)` length map; the data model and the classifier result's
//! `(sequenceId, taxonId)` pairs require a taxon id per sequence and a
//! human-readable name, so this record carries both (see DESIGN.md Open
//! Questions, §O1).

use std::collections::HashMap;
use std::io::{Read, Write};

use crate::error::{ClassifierError, ClassifierResult};

pub struct SeqEntry {
    pub tax_id: u64,
    pub length: u64,
    pub name: String,
}

/// Sequence catalogue: seqId -> (taxId, length, name).
pub struct Catalog {
    entries: HashMap<u64, SeqEntry>,
}

impl Catalog {
    pub fn get(&self, seq_id: u64) -> Option<&SeqEntry> {
        self.entries.get(&seq_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn write_to<W: Write>(&self, mut w: W) -> ClassifierResult<()> {
        for (&seq_id, entry) in &self.entries {
            w.write_all(&seq_id.to_le_bytes())?;
            w.write_all(&entry.tax_id.to_le_bytes())?;
            w.write_all(&entry.length.to_le_bytes())?;
            let bytes = entry.name.as_bytes();
            w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            w.write_all(bytes)?;
        }
        Ok(())
    }

    /// Stream records until EOF.
    pub fn load<R: Read>(mut r: R) -> ClassifierResult<Self> {
        let mut entries = HashMap::new();
        loop {
            let mut seq_id_buf = [0u8; 8];
            let read = read_or_eof(&mut r, &mut seq_id_buf)?;
            if !read {
                break;
            }
            let seq_id = u64::from_le_bytes(seq_id_buf);
            let tax_id = read_u64(&mut r)?;
            let length = read_u64(&mut r)?;
            let name_len = read_u32(&mut r)? as usize;
            let mut name_buf = vec![0u8; name_len];
            r.read_exact(&mut name_buf)?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();
            entries.insert(
                seq_id,
                SeqEntry {
                    tax_id,
                    length,
                    name,
                },
            );
        }
        Ok(Catalog { entries })
    }

    #[cfg(test)]
    pub fn build_for_test(entries: Vec<(u64, u64, u64, &str)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(seq_id, tax_id, length, name)| {
                (
                    seq_id,
                    SeqEntry {
                        tax_id,
                        length,
                        name: name.to_owned(),
                    },
                )
            })
            .collect();
        Catalog { entries }
    }
}

/// Reads exactly `buf.len()` bytes, returning `Ok(false)` if the stream was
/// already at EOF before any byte was read (a clean end-of-records
/// boundary) and erroring on any other short read.
fn read_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> ClassifierResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = r.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(ClassifierError::CorruptIndex(
                "truncated sequence catalogue record".to_owned(),
            ));
        }
        filled += n;
    }
    Ok(true)
}

fn read_u32<R: Read>(r: &mut R) -> ClassifierResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> ClassifierResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_write_roundtrip() {
        let cat = Catalog::build_for_test(vec![(0, 100, 16, "S0"), (1, 200, 16, "S1")]);
        let mut buf = Vec::new();
        cat.write_to(&mut buf).unwrap();
        let loaded = Catalog::load(&buf[..]).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(0).unwrap().tax_id, 100);
        assert_eq!(loaded.get(1).unwrap().name, "S1");
    }
}
