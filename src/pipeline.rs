use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::export::export_results_to_json;
use crate::faces::{cluster_faces, encode_directory, AttributeAnalyzer, Dbscan, FaceEncoder};
use crate::organize::{display_clusters, organize_photos_by_person, PersonRecord};

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub faces: usize,
    pub persons: Vec<PersonRecord>,
    pub results_file: PathBuf,
}

/// Encode, cluster, organize and export.
pub fn run(
    config: &Config,
    input_dir: &Path,
    output_dir: &Path,
    encoder: &dyn FaceEncoder,
    analyzer: &dyn AttributeAnalyzer,
) -> Result<RunSummary> {
    let labels = config.output.locale.labels();
    let params = Dbscan::new(config.clustering.eps, config.clustering.min_samples);

    println!("{}", labels.grouping());
    let encodings = encode_directory(encoder, input_dir, &config.scanner.image_extensions, labels)?;
    let clusters = cluster_faces(&encodings, params)?;

    println!("{}", labels.organizing());
    let persons = organize_photos_by_person(&clusters, output_dir, analyzer, labels)?;

    display_clusters(&clusters, labels);

    let results_file = output_dir.join(&config.output.results_file);
    export_results_to_json(&persons, &results_file, labels)?;

    Ok(RunSummary {
        faces: encodings.len(),
        persons,
        results_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faces::attributes::{AnalysisError, AnalysisOutput, FaceAnalysis, Gender};
    use crate::faces::encoder::Embedding;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Embeddings keyed by file name
    struct StubEncoder(HashMap<&'static str, Vec<Embedding>>);

    impl FaceEncoder for StubEncoder {
        fn encode(&self, image_path: &Path) -> Result<Vec<Embedding>> {
            let name = image_path.file_name().unwrap().to_str().unwrap();
            Ok(self.0.get(name).cloned().unwrap_or_default())
        }
    }

    struct StubAnalyzer;

    impl AttributeAnalyzer for StubAnalyzer {
        fn analyze(&self, path: &Path) -> Result<AnalysisOutput, AnalysisError> {
            if path.ends_with("c.jpg") {
                return Err(AnalysisError::NoFaceDetected(path.to_path_buf()));
            }
            Ok(AnalysisOutput::Single(FaceAnalysis {
                age: Some(25.0),
                gender: vec![(Gender::Woman, 0.2), (Gender::Man, 0.8)],
                ..Default::default()
            }))
        }
    }

    #[test]
    fn test_two_people_end_to_end() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg", "readme.md"] {
            fs::write(input.path().join(name), name.as_bytes()).unwrap();
        }
        let out_dir = output.path().join("sorted");

        let encoder = StubEncoder(HashMap::from([
            ("a.jpg", vec![vec![0.10, 0.20, 0.30]]),
            ("b.jpg", vec![vec![0.12, 0.18, 0.33]]),
            ("c.jpg", vec![vec![0.90, -0.60, 0.10]]),
        ]));

        let summary = run(&Config::default(), input.path(), &out_dir, &encoder, &StubAnalyzer).unwrap();

        assert_eq!(summary.faces, 3);
        assert_eq!(summary.persons.len(), 2);
        assert_eq!(fs::read(out_dir.join("person_0/a.jpg")).unwrap(), b"a.jpg");
        assert_eq!(fs::read(out_dir.join("person_0/b.jpg")).unwrap(), b"b.jpg");
        assert_eq!(fs::read(out_dir.join("person_1/c.jpg")).unwrap(), b"c.jpg");
        assert!(!out_dir.join("person_2").exists());

        let text = fs::read_to_string(&summary.results_file).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        let persons = json.as_object().unwrap();
        assert_eq!(persons.len(), 2);

        for record in &summary.persons {
            let folder = persons[&record.key()]["Dossier"].as_str().unwrap();
            assert_eq!(Path::new(folder), record.folder);
            assert!(Path::new(folder).is_dir());
        }

        assert_eq!(json["person_0"]["Attributs"]["Âge estimé"], 25);
        assert_eq!(json["person_0"]["Attributs"]["Genre"], "Homme");
        // Analysis failed for the second person only
        assert_eq!(json["person_1"]["Attributs"]["Genre"], "Non détecté");
    }

    #[test]
    fn test_no_faces_writes_empty_results() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::write(input.path().join("landscape.jpg"), b"sky").unwrap();

        let encoder = StubEncoder(HashMap::new());
        let summary = run(&Config::default(), input.path(), output.path(), &encoder, &StubAnalyzer).unwrap();

        assert_eq!(summary.faces, 0);
        assert!(summary.persons.is_empty());
        assert_eq!(fs::read_to_string(output.path().join("results.json")).unwrap(), "{}");
        let folders = fs::read_dir(output.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().is_dir())
            .count();
        assert_eq!(folders, 0);
    }

    #[test]
    fn test_group_photo_lands_in_every_cluster() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        fs::write(input.path().join("group.jpg"), b"group").unwrap();

        let encoder = StubEncoder(HashMap::from([(
            "group.jpg",
            vec![vec![0.0, 0.0], vec![3.0, 0.0]],
        )]));

        let summary = run(&Config::default(), input.path(), output.path(), &encoder, &StubAnalyzer).unwrap();

        assert_eq!(summary.faces, 2);
        assert_eq!(summary.persons.len(), 2);
        assert!(output.path().join("person_0/group.jpg").exists());
        assert!(output.path().join("person_1/group.jpg").exists());
    }

    #[test]
    fn test_missing_input_directory_fails() {
        let output = tempdir().unwrap();
        let encoder = StubEncoder(HashMap::new());

        let result = run(
            &Config::default(),
            &output.path().join("missing"),
            output.path(),
            &encoder,
            &StubAnalyzer,
        );

        assert!(result.is_err());
    }
}
