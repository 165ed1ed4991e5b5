//! Taxonomy (C2): a flat array of compact taxon nodes with rank-aware
//! ancestor queries. Construction from NCBI taxonomy dump files is out of
//! scope (spec §1); this module only loads the frozen `<prefix>.2.cfr`
//! binary produced at index-build time (spec §6).

use std::io::{Read, Write};

use crate::error::{ClassifierError, ClassifierResult};

/// The closed rank enumeration from the Glossary, in the order the original
/// source assigns numeric tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Rank {
    Unknown = 0,
    Strain,
    Species,
    Subspecies,
    Varietas,
    Forma,
    Tribe,
    Subtribe,
    Genus,
    Subgenus,
    Family,
    Subfamily,
    Superfamily,
    Order,
    Suborder,
    Infraorder,
    Parvorder,
    Class,
    Subclass,
    Superclass,
    Infraclass,
    Phylum,
    Subphylum,
    Superphylum,
    Kingdom,
    Subkingdom,
    Domain,
    Superkingdom,
}

impl Rank {
    fn from_u8(tag: u8) -> ClassifierResult<Rank> {
        use Rank::*;
        Ok(match tag {
            0 => Unknown,
            1 => Strain,
            2 => Species,
            3 => Subspecies,
            4 => Varietas,
            5 => Forma,
            6 => Tribe,
            7 => Subtribe,
            8 => Genus,
            9 => Subgenus,
            10 => Family,
            11 => Subfamily,
            12 => Superfamily,
            13 => Order,
            14 => Suborder,
            15 => Infraorder,
            16 => Parvorder,
            17 => Class,
            18 => Subclass,
            19 => Superclass,
            20 => Infraclass,
            21 => Phylum,
            22 => Subphylum,
            23 => Superphylum,
            24 => Kingdom,
            25 => Subkingdom,
            26 => Domain,
            27 => Superkingdom,
            other => return Err(ClassifierError::CorruptIndex(format!("bad rank tag {}", other))),
        })
    }

    /// Position in the reduced 9-level total order used for ancestor/LCA
    /// queries (spec §3, Glossary), grounded in the original source's
    /// `InitTaxRankNum` reduction: sub/super/infra/parv variants collapse
    /// onto the base rank they refine.
    pub fn reduced_level(self) -> u8 {
        use Rank::*;
        match self {
            Unknown => 0,
            Strain => 1,
            Species | Subspecies | Varietas | Forma => 2,
            Genus | Subgenus | Tribe | Subtribe => 3,
            Family | Subfamily | Superfamily => 4,
            Order | Suborder | Infraorder | Parvorder => 5,
            Class | Subclass | Superclass | Infraclass => 6,
            Phylum | Subphylum | Superphylum => 7,
            Kingdom | Subkingdom => 8,
            Domain | Superkingdom => 9,
        }
    }
}

struct Node {
    parent: u32,
    rank: Rank,
    leaf: bool,
}

/// Compact taxonomic tree, read-only after load.
pub struct Taxonomy {
    nodes: Vec<Node>,
    names: Vec<String>,
    orig_tax_id: Vec<u64>,
}

impl Taxonomy {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn original_id(&self, compact_id: u32) -> u64 {
        self.orig_tax_id[compact_id as usize]
    }

    pub fn name(&self, compact_id: u32) -> &str {
        &self.names[compact_id as usize]
    }

    pub fn parent(&self, compact_id: u32) -> u32 {
        self.nodes[compact_id as usize].parent
    }

    pub fn rank(&self, compact_id: u32) -> Rank {
        self.nodes[compact_id as usize].rank
    }

    pub fn is_leaf(&self, compact_id: u32) -> bool {
        self.nodes[compact_id as usize].leaf
    }

    /// Climb parents from `compact_id` until a node whose reduced rank
    /// equals `target_level` is found; `None` if climbing passes above the
    /// requested level (including hitting the root) without a hit.
    pub fn ancestor_at_rank(&self, compact_id: u32, target_level: u8) -> Option<u32> {
        let mut cur = compact_id;
        loop {
            let level = self.rank(cur).reduced_level();
            if level == target_level {
                return Some(cur);
            }
            if level > target_level {
                return None;
            }
            let parent = self.parent(cur);
            if parent == cur {
                // reached the root without finding the requested rank.
                return None;
            }
            cur = parent;
        }
    }

    /// Lowest common ancestor via a two-pointer ancestor walk.
    pub fn lca(&self, a: u32, b: u32) -> u32 {
        let mut ancestors_of_a = std::collections::HashSet::new();
        let mut cur = a;
        loop {
            ancestors_of_a.insert(cur);
            let parent = self.parent(cur);
            if parent == cur {
                break;
            }
            cur = parent;
        }

        let mut cur = b;
        loop {
            if ancestors_of_a.contains(&cur) {
                return cur;
            }
            let parent = self.parent(cur);
            if parent == cur {
                return cur;
            }
            cur = parent;
        }
    }

    /// Serialize to the `<prefix>.2.cfr` layout (spec §6).
    pub fn write_to<W: Write>(&self, mut w: W) -> ClassifierResult<()> {
        w.write_all(&(self.nodes.len() as u64).to_le_bytes())?;
        for node in &self.nodes {
            w.write_all(&(node.parent as u64).to_le_bytes())?;
            w.write_all(&(node.rank as u8).to_le_bytes())?;
            w.write_all(&[node.leaf as u8])?;
        }
        for name in &self.names {
            let bytes = name.as_bytes();
            w.write_all(&(bytes.len() as u32).to_le_bytes())?;
            w.write_all(bytes)?;
        }
        for id in &self.orig_tax_id {
            w.write_all(&id.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read the `<prefix>.2.cfr` layout.
    pub fn load<R: Read>(mut r: R) -> ClassifierResult<Self> {
        let node_count = read_u64(&mut r)? as usize;
        let mut nodes = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let parent = read_u64(&mut r)? as u32;
            let mut tag = [0u8; 1];
            r.read_exact(&mut tag)?;
            let rank = Rank::from_u8(tag[0])?;
            let mut leaf_byte = [0u8; 1];
            r.read_exact(&mut leaf_byte)?;
            nodes.push(Node {
                parent,
                rank,
                leaf: leaf_byte[0] != 0,
            });
        }

        let mut names = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            let len = read_u32(&mut r)? as usize;
            let mut buf = vec![0u8; len];
            r.read_exact(&mut buf)?;
            let s = std::str::from_utf8(&buf)
                .map_err(ClassifierError::Utf8)?
                .to_owned();
            names.push(s);
        }

        let mut orig_tax_id = Vec::with_capacity(node_count);
        for _ in 0..node_count {
            orig_tax_id.push(read_u64(&mut r)?);
        }

        Ok(Taxonomy {
            nodes,
            names,
            orig_tax_id,
        })
    }

    #[cfg(test)]
    pub fn build_for_test(
        parents: Vec<u32>,
        ranks: Vec<Rank>,
        names: Vec<String>,
        orig_tax_id: Vec<u64>,
    ) -> Self {
        let nodes = parents
            .into_iter()
            .zip(ranks)
            .map(|(parent, rank)| Node {
                parent,
                rank,
                leaf: true,
            })
            .collect();
        Taxonomy {
            nodes,
            names,
            orig_tax_id,
        }
    }
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

    // root(0) -> kingdom(1) -> phylum(2) -> genus(3) -> species(4)
    fn toy_taxonomy() -> Taxonomy {
        Taxonomy::build_for_test(
            vec![0, 0, 1, 2, 3],
            vec![
                Rank::Unknown,
                Rank::Kingdom,
                Rank::Phylum,
                Rank::Genus,
                Rank::Species,
            ],
            vec![
                "root".into(),
                "Bacteria".into(),
                "Proteobacteria".into(),
                "Escherichia".into(),
                "Escherichia coli".into(),
            ],
            vec![1, 2, 1224, 561, 562],
        )
    }

    #[test]
    fn ancestor_at_rank_climbs() {
        let tax = toy_taxonomy();
        assert_eq!(
            tax.ancestor_at_rank(4, Rank::Genus.reduced_level()),
            Some(3)
        );
        assert_eq!(
            tax.ancestor_at_rank(4, Rank::Kingdom.reduced_level()),
            Some(1)
        );
    }

    #[test]
    fn ancestor_at_rank_missing_returns_none() {
        let tax = toy_taxonomy();
        // species node has no "domain"-ranked ancestor in this toy tree.
        assert_eq!(tax.ancestor_at_rank(4, Rank::Domain.reduced_level()), None);
    }

    #[test]
    fn lca_finds_common_ancestor() {
        let tax = toy_taxonomy();
        assert_eq!(tax.lca(4, 3), 3);
        assert_eq!(tax.lca(4, 1), 1);
        assert_eq!(tax.lca(4, 4), 4);
    }

    #[test]
    fn original_id_roundtrip() {
        let tax = toy_taxonomy();
        assert_eq!(tax.original_id(4), 562);
        assert_eq!(tax.name(4), "Escherichia coli");
    }

    #[test]
    fn load_write_roundtrip() {
        let tax = toy_taxonomy();
        let mut buf = Vec::new();
        tax.write_to(&mut buf).unwrap();
        let loaded = Taxonomy::load(&buf[..]).unwrap();
        assert_eq!(loaded.len(), tax.len());
        assert_eq!(loaded.original_id(4), tax.original_id(4));
        assert_eq!(loaded.name(3), tax.name(3));
        assert_eq!(loaded.parent(4), tax.parent(4));
    }
}
