use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use super::encoder::{Embedding, FaceEncodings};

/// Label given to points that belong to no cluster
pub const OUTLIER: i32 = -1;

/// DBSCAN parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    /// Neighborhood radius, inclusive
    pub eps: f32,
    /// Neighbors needed for a core point, the point itself included
    pub min_samples: usize,
}

impl Default for Dbscan {
    fn default() -> Self {
        Self {
            eps: 0.5,
            min_samples: 1,
        }
    }
}

impl Dbscan {
    pub fn new(eps: f32, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Label every row of `points`.
    ///
    /// Rows are visited in index order; a new cluster id is assigned each
    /// time an unvisited core point is found, so ids appear in ascending
    /// order of first occurrence. The result is deterministic.
    pub fn fit_predict(&self, points: &Array2<f32>) -> Vec<i32> {
        let n = points.nrows();
        let neighborhoods: Vec<Vec<usize>> = (0..n)
            .map(|i| self.region_query(points, i))
            .collect();
        let is_core: Vec<bool> = neighborhoods
            .iter()
            .map(|neighbors| neighbors.len() >= self.min_samples)
            .collect();

        let mut labels = vec![OUTLIER; n];
        let mut next_label = 0;

        for start in 0..n {
            if labels[start] != OUTLIER || !is_core[start] {
                continue;
            }

            labels[start] = next_label;
            let mut queue: VecDeque<usize> = VecDeque::from([start]);

            while let Some(point) = queue.pop_front() {
                if !is_core[point] {
                    continue;
                }
                for &neighbor in &neighborhoods[point] {
                    if labels[neighbor] == OUTLIER {
                        labels[neighbor] = next_label;
                        queue.push_back(neighbor);
                    }
                }
            }

            next_label += 1;
        }

        labels
    }

    fn region_query(&self, points: &Array2<f32>, index: usize) -> Vec<usize> {
        let row = points.row(index);
        points
            .rows()
            .into_iter()
            .enumerate()
            .filter(|(_, other)| euclidean_distance(row, *other) <= self.eps)
            .map(|(j, _)| j)
            .collect()
    }
}

/// Euclidean distance between two embeddings
pub fn euclidean_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Stack embeddings into a dense matrix, one row per face.
pub fn embedding_matrix(embeddings: &[Embedding]) -> Result<Array2<f32>> {
    let dim = embeddings.first().map(|e| e.len()).unwrap_or(0);

    if let Some(bad) = embeddings.iter().position(|e| e.len() != dim) {
        bail!(
            "Embedding {} has {} values, expected {}",
            bad,
            embeddings[bad].len(),
            dim
        );
    }

    let flat: Vec<f32> = embeddings.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((embeddings.len(), dim), flat)?)
}

/// Image paths grouped by cluster label, iterated in ascending label order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceClusters {
    groups: BTreeMap<i32, Vec<PathBuf>>,
}

impl FaceClusters {
    pub fn from_labels(labels: &[i32], paths: &[PathBuf]) -> Self {
        let mut groups: BTreeMap<i32, Vec<PathBuf>> = BTreeMap::new();
        for (label, path) in labels.iter().zip(paths) {
            groups.entry(*label).or_default().push(path.clone());
        }
        Self { groups }
    }

    /// All groups, the outlier group included
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[PathBuf])> {
        self.groups.iter().map(|(label, paths)| (*label, paths.as_slice()))
    }

    /// Groups that represent a person, i.e. everything but the outliers
    pub fn retained(&self) -> impl Iterator<Item = (i32, &[PathBuf])> {
        self.iter().filter(|(label, _)| *label != OUTLIER)
    }

    pub fn retained_count(&self) -> usize {
        self.retained().count()
    }

    pub fn outliers(&self) -> &[PathBuf] {
        self.groups.get(&OUTLIER).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Cluster the encoded faces and group their image paths by label.
pub fn cluster_faces(encodings: &FaceEncodings, params: Dbscan) -> Result<FaceClusters> {
    if encodings.is_empty() {
        return Ok(FaceClusters::default());
    }

    let matrix = embedding_matrix(&encodings.embeddings)?;
    let labels = params.fit_predict(&matrix);

    let clusters = FaceClusters::from_labels(&labels, &encodings.paths);
    tracing::info!(
        faces = encodings.len(),
        clusters = clusters.retained_count(),
        outliers = clusters.outliers().len(),
        eps = params.eps,
        min_samples = params.min_samples,
        "Faces clustered"
    );

    Ok(clusters)
}
