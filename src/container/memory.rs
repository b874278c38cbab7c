//! In-memory container tree.

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayD, Axis};

use super::{CellArray, Container, ContainerError, NodeKind, NodeRef};
use crate::volume::Voxels;

#[derive(Clone, Debug)]
enum MemoryNode {
    Group,
    Numeric(ArrayD<f64>),
    Chars(Vec<u16>),
    Cell(CellArray),
    Volume(Voxels),
}

/// Container held entirely in memory. Parent groups are created on insert.
#[derive(Clone, Debug, Default)]
pub struct MemoryContainer {
    nodes: BTreeMap<String, MemoryNode>,
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, path: &str, node: MemoryNode) {
        let path = normalize(path);
        for (end, _) in path.match_indices('/') {
            self.nodes
                .entry(path[..end].to_string())
                .or_insert(MemoryNode::Group);
        }
        self.nodes.insert(path, node);
    }

    pub fn with_group(mut self, path: &str) -> Self {
        self.insert(path, MemoryNode::Group);
        self
    }

    pub fn with_numeric(mut self, path: &str, value: ArrayD<f64>) -> Self {
        self.insert(path, MemoryNode::Numeric(value));
        self
    }

    /// Stores a row vector of numbers.
    pub fn with_values(self, path: &str, values: &[f64]) -> Self {
        let array = Array1::from(values.to_vec()).insert_axis(Axis(0)).into_dyn();
        self.with_numeric(path, array)
    }

    pub fn with_chars(mut self, path: &str, units: Vec<u16>) -> Self {
        self.insert(path, MemoryNode::Chars(units));
        self
    }

    pub fn with_text(self, path: &str, text: &str) -> Self {
        self.with_chars(path, text.encode_utf16().collect())
    }

    pub fn with_cell(mut self, path: &str, refs: &[&str]) -> Self {
        let rows = refs
            .iter()
            .map(|target| vec![NodeRef(normalize(target))])
            .collect();
        self.insert(path, MemoryNode::Cell(CellArray::Rows(rows)));
        self
    }

    pub fn with_empty_cell(mut self, path: &str) -> Self {
        self.insert(path, MemoryNode::Cell(CellArray::Empty));
        self
    }

    /// Stores a cell array of strings, with the strings placed under `#refs#`.
    pub fn with_text_cell(self, path: &str, texts: &[&str]) -> Self {
        let targets: Vec<String> = (0..texts.len())
            .map(|i| format!("#refs#/{}_{i}", normalize(path).replace('/', "_")))
            .collect();
        let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let container = self.with_cell(path, &refs);
        targets
            .iter()
            .zip(texts)
            .fold(container, |container, (target, text)| {
                container.with_text(target, text)
            })
    }

    pub fn with_volume(mut self, path: &str, voxels: Voxels) -> Self {
        self.insert(path, MemoryNode::Volume(voxels));
        self
    }

    fn get(&self, path: &str) -> Result<&MemoryNode, ContainerError> {
        let path = normalize(path);
        self.nodes.get(&path).ok_or(ContainerError::Missing(path))
    }

    fn children(&self, path: &str) -> usize {
        let path = normalize(path);
        self.nodes
            .keys()
            .filter(|key| {
                if path.is_empty() {
                    return !key.contains('/');
                }
                key.strip_prefix(path.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .is_some_and(|rest| !rest.contains('/'))
            })
            .count()
    }
}

impl Container for MemoryContainer {
    fn node(&self, path: &str) -> Option<NodeKind> {
        if normalize(path).is_empty() {
            return Some(NodeKind::Group {
                children: self.children(path),
            });
        }

        let kind = match self.get(path).ok()? {
            MemoryNode::Group => NodeKind::Group {
                children: self.children(path),
            },
            MemoryNode::Numeric(array) => NodeKind::Dataset {
                shape: array.shape().to_vec(),
            },
            MemoryNode::Chars(units) => NodeKind::Dataset {
                shape: vec![units.len(), 1],
            },
            MemoryNode::Cell(CellArray::Empty) => NodeKind::Dataset { shape: vec![2] },
            MemoryNode::Cell(CellArray::Rows(rows)) => NodeKind::Dataset {
                shape: vec![rows.len(), rows.first().map_or(0, Vec::len)],
            },
            MemoryNode::Volume(voxels) => {
                let (d0, d1, d2) = voxels.dim();
                NodeKind::Dataset {
                    shape: vec![d0, d1, d2],
                }
            }
        };
        Some(kind)
    }

    fn read_numeric(&self, path: &str) -> Result<ArrayD<f64>, ContainerError> {
        match self.get(path)? {
            MemoryNode::Numeric(array) => Ok(array.clone()),
            MemoryNode::Chars(units) => Ok(units
                .iter()
                .map(|&unit| f64::from(unit))
                .collect::<Array1<f64>>()
                .insert_axis(Axis(1))
                .into_dyn()),
            _ => Err(ContainerError::WrongKind {
                path: normalize(path),
                expected: "numeric dataset",
            }),
        }
    }

    fn read_chars(&self, path: &str) -> Result<Vec<u16>, ContainerError> {
        match self.get(path)? {
            MemoryNode::Chars(units) => Ok(units.clone()),
            _ => Err(ContainerError::WrongKind {
                path: normalize(path),
                expected: "character dataset",
            }),
        }
    }

    fn read_cell(&self, path: &str) -> Result<CellArray, ContainerError> {
        match self.get(path)? {
            MemoryNode::Cell(cell) => Ok(cell.clone()),
            _ => Err(ContainerError::WrongKind {
                path: normalize(path),
                expected: "cell array",
            }),
        }
    }

    fn read_volume(&self, path: &str) -> Result<Voxels, ContainerError> {
        match self.get(path)? {
            MemoryNode::Volume(voxels) => Ok(voxels.clone()),
            _ => Err(ContainerError::WrongKind {
                path: normalize(path),
                expected: "volume",
            }),
        }
    }
}
