use std::collections::HashMap;

use log::{debug, warn};

use crate::{fdt::FdtNode, tree::join_path};

/// Maps phandle values to the path of the node declaring them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhandleIndex(HashMap<u32, String>);

impl PhandleIndex {
    /// Index every node below (and including) `root` that has a `phandle` property.
    ///
    /// Nodes are visited in depth-first pre-order using an explicit stack. Should two
    /// nodes declare the same phandle, the one visited last wins.
    pub fn build(root: &FdtNode) -> Self {
        let mut index = HashMap::new();
        let mut stack = vec![("/".to_string(), root)];

        while let Some((path, node)) = stack.pop() {
            if let Some(data) = node.property("phandle") {
                match data.get(..4) {
                    Some(&[a, b, c, d]) => {
                        let phandle = u32::from_be_bytes([a, b, c, d]);
                        if let Some(previous) = index.get(&phandle) {
                            warn!(
                                "phandle {:#x} declared by both {} and {}",
                                phandle, previous, path
                            );
                        }
                        index.insert(phandle, path.clone());
                    }
                    _ => debug!("ignoring short phandle property on {}", path),
                }
            }

            let children: Vec<_> = node
                .subnodes()
                .map(|child| (join_path(&path, child.name()), child))
                .collect();
            stack.extend(children.into_iter().rev());
        }

        debug!("indexed {} phandles", index.len());
        Self(index)
    }

    /// Path of the node declaring `phandle`, if any.
    pub fn resolve(&self, phandle: u32) -> Option<&str> {
        self.0.get(&phandle).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All `(phandle, path)` pairs, ordered by phandle.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        let mut entries: Vec<_> = self
            .0
            .iter()
            .map(|(&phandle, path)| (phandle, path.as_str()))
            .collect();
        entries.sort_unstable_by_key(|&(phandle, _)| phandle);
        entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::fdt::Fdt;

    /// Build a blob from `(depth, name, phandle bytes)` entries, depth 0 being the root.
    fn blob(nodes: &[(usize, &str, Option<&[u8]>)]) -> Vec<u8> {
        fn word(out: &mut Vec<u8>, w: u32) {
            out.extend_from_slice(&w.to_be_bytes());
        }
        fn pad(out: &mut Vec<u8>) {
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }

        let strings = b"phandle\0".to_vec();
        let mut structure = Vec::new();
        let mut depth = 0;

        for (i, &(level, name, phandle)) in nodes.iter().enumerate() {
            if i > 0 {
                for _ in level..=depth {
                    word(&mut structure, 2);
                }
            }
            depth = level;

            word(&mut structure, 1);
            structure.extend_from_slice(name.as_bytes());
            structure.push(0);
            pad(&mut structure);

            if let Some(value) = phandle {
                word(&mut structure, 3);
                word(&mut structure, value.len() as u32);
                word(&mut structure, 0);
                structure.extend_from_slice(value);
                pad(&mut structure);
            }
        }
        for _ in 0..=depth {
            word(&mut structure, 2);
        }
        word(&mut structure, 9);

        let off_dt_struct = 56;
        let off_dt_strings = off_dt_struct + structure.len();
        let total_size = off_dt_strings + strings.len();

        let mut out = Vec::new();
        for w in [
            0xd00d_feed,
            total_size as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            40,
            17,
            16,
            0,
            strings.len() as u32,
            structure.len() as u32,
        ] {
            word(&mut out, w);
        }
        out.extend_from_slice(&[0; 16]);
        out.extend_from_slice(&structure);
        out.extend_from_slice(&strings);
        out
    }

    fn index(nodes: &[(usize, &str, Option<&[u8]>)]) -> PhandleIndex {
        let fdt = Fdt::parse(&blob(nodes)).unwrap();
        PhandleIndex::build(fdt.root())
    }

    #[test]
    fn index_nested_phandles() {
        let index = index(&[
            (0, "", Some(&[0, 0, 0, 1][..])),
            (1, "cpus", None),
            (2, "cpu@0", Some(&[0, 0, 0, 2][..])),
            (3, "interrupt-controller", Some(&[0, 0, 0, 3][..])),
            (1, "soc", None),
            (2, "uart@1000", Some(&[0, 0, 0, 0x10][..])),
        ]);

        assert_eq!(index.len(), 4);
        assert_eq!(index.resolve(1), Some("/"));
        assert_eq!(index.resolve(2), Some("/cpus/cpu@0"));
        assert_eq!(index.resolve(3), Some("/cpus/cpu@0/interrupt-controller"));
        assert_eq!(index.resolve(0x10), Some("/soc/uart@1000"));
        assert_eq!(index.resolve(4), None);
        assert_eq!(
            index.iter().collect::<Vec<_>>(),
            [
                (1, "/"),
                (2, "/cpus/cpu@0"),
                (3, "/cpus/cpu@0/interrupt-controller"),
                (0x10, "/soc/uart@1000"),
            ]
        );
    }

    #[test]
    fn only_first_four_bytes_count() {
        let index = index(&[
            (0, "", None),
            (1, "wide", Some(&[0, 0, 0, 7, 0xff, 0xff, 0xff, 0xff][..])),
            (1, "short", Some(&[0, 9][..])),
            (1, "empty", Some(&[][..])),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(7), Some("/wide"));
        assert_eq!(index.resolve(9), None);
        assert_eq!(index.resolve(0), None);
    }

    #[test]
    fn last_duplicate_wins() {
        let index = index(&[
            (0, "", None),
            (1, "first", Some(&[0, 0, 0, 5][..])),
            (1, "second", Some(&[0, 0, 0, 5][..])),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(5), Some("/second"));
    }

    #[test]
    fn empty_tree_has_no_phandles() {
        let index = index(&[(0, "", None)]);

        assert!(index.is_empty());
        assert_eq!(index.resolve(0), None);
    }
}
