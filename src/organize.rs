use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::faces::{analyze_face_attributes, AttributeAnalyzer, FaceClusters, PersonAttributes};
use crate::labels::Labels;

/// One retained cluster after its images were copied out
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    pub id: usize,
    pub folder: PathBuf,
    pub attributes: Option<PersonAttributes>,
}

impl PersonRecord {
    pub fn key(&self) -> String {
        person_folder_name(self.id)
    }
}

pub fn person_folder_name(id: usize) -> String {
    format!("person_{}", id)
}

/// Copy each retained cluster into `<output>/person_<id>/` and analyze its
/// first image. Ids are assigned 0, 1, 2... in cluster order; outliers are
/// skipped. Existing files are overwritten, never removed.
pub fn organize_photos_by_person(
    clusters: &FaceClusters,
    output_dir: &Path,
    analyzer: &dyn AttributeAnalyzer,
    labels: &Labels,
) -> Result<Vec<PersonRecord>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let mut records = Vec::new();

    for (id, (label, images)) in clusters.retained().enumerate() {
        let folder = output_dir.join(person_folder_name(id));
        std::fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;

        for image in images {
            copy_into(image, &folder)?;
        }

        let attributes = match images.first() {
            Some(first) => analyze_face_attributes(analyzer, first, labels),
            None => None,
        };

        tracing::info!(
            person = id,
            cluster = label,
            images = images.len(),
            folder = ?folder,
            analyzed = attributes.is_some(),
            "Person organized"
        );

        records.push(PersonRecord {
            id,
            folder,
            attributes,
        });
    }

    Ok(records)
}

fn copy_into(source: &Path, folder: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .with_context(|| format!("Not a file path: {}", source.display()))?;
    let destination = folder.join(file_name);

    std::fs::copy(source, &destination).with_context(|| {
        format!("Failed to copy {} to {}", source.display(), destination.display())
    })?;

    Ok(destination)
}

/// Print each retained cluster with a 1-based index and its file names.
pub fn display_clusters(clusters: &FaceClusters, labels: &Labels) {
    print!("{}", format_clusters(clusters, labels));
}

pub fn format_clusters(clusters: &FaceClusters, labels: &Labels) -> String {
    let mut out = format!("\n{}\n", labels.clusters_header());

    for (index, (_, images)) in clusters.retained().enumerate() {
        out.push_str(&format!("\n{}\n", labels.face_heading(index + 1)));
        for image in images {
            let name = image
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| image.display().to_string());
            out.push_str(&format!("- {}\n", name));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::attributes::{AnalysisError, AnalysisOutput, FaceAnalysis, Gender};
    use crate::faces::OUTLIER;
    use crate::labels::Locale;
    use std::fs;
    use tempfile::tempdir;

    /// Fails for files whose name starts with "bad"
    struct PickyAnalyzer;

    impl AttributeAnalyzer for PickyAnalyzer {
        fn analyze(&self, path: &Path) -> Result<AnalysisOutput, AnalysisError> {
            let name = path.file_name().unwrap().to_string_lossy();
            if name.starts_with("bad") {
                return Err(AnalysisError::NoFaceDetected(path.to_path_buf()));
            }
            Ok(AnalysisOutput::Single(FaceAnalysis {
                age: Some(30.0),
                gender: vec![(Gender::Woman, 0.7), (Gender::Man, 0.3)],
                ..Default::default()
            }))
        }
    }

    fn write_image(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_outliers_get_no_folder() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let a = write_image(input.path(), "a.jpg", b"aaa");
        let b = write_image(input.path(), "b.jpg", b"bbb");
        let c = write_image(input.path(), "c.jpg", b"ccc");

        let clusters = FaceClusters::from_labels(&[OUTLIER, 0, 1], &[a, b.clone(), c.clone()]);

        let records =
            organize_photos_by_person(&clusters, output.path(), &PickyAnalyzer, Locale::Fr.labels()).unwrap();

        let ids: Vec<usize> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(output.path().join("person_0/b.jpg").exists());
        assert!(output.path().join("person_1/c.jpg").exists());
        assert!(!output.path().join("person_2").exists());
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_copies_are_byte_identical() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let bytes: Vec<u8> = (0..=255).collect();
        let a = write_image(input.path(), "a.png", &bytes);
        let b = write_image(input.path(), "b.png", b"second");

        let clusters = FaceClusters::from_labels(&[0, 0], &[a, b]);
        organize_photos_by_person(&clusters, output.path(), &PickyAnalyzer, Locale::Fr.labels()).unwrap();

        assert_eq!(fs::read(output.path().join("person_0/a.png")).unwrap(), bytes);
        assert_eq!(fs::read(output.path().join("person_0/b.png")).unwrap(), b"second");
    }

    #[test]
    fn test_existing_output_is_kept() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let a = write_image(input.path(), "a.jpg", b"new");
        fs::create_dir_all(output.path().join("person_0")).unwrap();
        write_image(&output.path().join("person_0"), "a.jpg", b"old");
        write_image(output.path(), "unrelated.txt", b"keep");

        let clusters = FaceClusters::from_labels(&[0], &[a]);
        organize_photos_by_person(&clusters, output.path(), &PickyAnalyzer, Locale::Fr.labels()).unwrap();

        assert_eq!(fs::read(output.path().join("person_0/a.jpg")).unwrap(), b"new");
        assert_eq!(fs::read(output.path().join("unrelated.txt")).unwrap(), b"keep");
    }

    #[test]
    fn test_analysis_failure_is_isolated() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let bad = write_image(input.path(), "bad.jpg", b"x");
        let good = write_image(input.path(), "good.jpg", b"y");

        let clusters = FaceClusters::from_labels(&[0, 1], &[bad, good]);
        let records =
            organize_photos_by_person(&clusters, output.path(), &PickyAnalyzer, Locale::Fr.labels()).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].attributes.is_none());
        let attrs = records[1].attributes.unwrap();
        assert_eq!(attrs.age, Some(30));
        assert_eq!(attrs.gender, Some(Gender::Woman));
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let output = tempdir().unwrap();
        let clusters = FaceClusters::from_labels(&[0], &[output.path().join("gone.jpg")]);

        let result =
            organize_photos_by_person(&clusters, &output.path().join("out"), &PickyAnalyzer, Locale::Fr.labels());

        assert!(result.is_err());
    }

    #[test]
    fn test_cluster_listing() {
        let paths = vec![
            PathBuf::from("/in/x.jpg"),
            PathBuf::from("/in/y.jpg"),
            PathBuf::from("/in/z.jpg"),
        ];
        let clusters = FaceClusters::from_labels(&[OUTLIER, 0, 0], &paths);

        let listing = format_clusters(&clusters, Locale::Fr.labels());

        assert_eq!(
            listing,
            "\nRésultats des clusters :\n\nVisage 1 :\n- y.jpg\n- z.jpg\n"
        );
    }
}
