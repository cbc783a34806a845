//! Display strings for console output and the JSON summary.
//!
//! The pipeline only deals with [`Gender`] and [`Emotion`] values; every
//! human-readable string goes through a [`Labels`] table selected by
//! [`Locale`].

use serde::{Deserialize, Serialize};

use crate::faces::attributes::{Emotion, Gender};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Locale {
    pub fn labels(&self) -> &'static Labels {
        match self {
            Locale::Fr => &FRENCH,
            Locale::En => &ENGLISH,
        }
    }
}

/// Localized label table
#[derive(Debug)]
pub struct Labels {
    pub folder_key: &'static str,
    pub attributes_key: &'static str,
    pub age_key: &'static str,
    pub gender_key: &'static str,
    pub emotion_key: &'static str,
    pub not_detected: &'static str,
    man: &'static str,
    woman: &'static str,
    emotions: [&'static str; 8],
    grouping: &'static str,
    organizing: &'static str,
    image_line: &'static str,
    face_count_line: &'static str,
    no_faces: &'static str,
    clusters_header: &'static str,
    face_heading: (&'static str, &'static str),
    analysis_failed: &'static str,
    exported: &'static str,
}

pub static FRENCH: Labels = Labels {
    folder_key: "Dossier",
    attributes_key: "Attributs",
    age_key: "Âge estimé",
    gender_key: "Genre",
    emotion_key: "Émotion dominante",
    not_detected: "Non détecté",
    man: "Homme",
    woman: "Femme",
    emotions: [
        "neutre", "joie", "surprise", "tristesse", "colère", "dégoût", "peur", "mépris",
    ],
    grouping: "Regroupement des visages...",
    organizing: "Organisation des photos et analyse des attributs...",
    image_line: "Image : ",
    face_count_line: "Nombre de visages détectés : ",
    no_faces: "Aucun visage détecté dans les images fournies.",
    clusters_header: "Résultats des clusters :",
    face_heading: ("Visage ", " :"),
    analysis_failed: "Erreur lors de l'analyse du visage : ",
    exported: "Résultats exportés dans ",
};

pub static ENGLISH: Labels = Labels {
    folder_key: "Folder",
    attributes_key: "Attributes",
    age_key: "Estimated age",
    gender_key: "Gender",
    emotion_key: "Dominant emotion",
    not_detected: "Not detected",
    man: "Man",
    woman: "Woman",
    emotions: [
        "neutral", "happy", "surprise", "sad", "angry", "disgust", "fear", "contempt",
    ],
    grouping: "Grouping faces...",
    organizing: "Organizing photos and analyzing attributes...",
    image_line: "Image: ",
    face_count_line: "Faces detected: ",
    no_faces: "No face detected in the provided images.",
    clusters_header: "Cluster results:",
    face_heading: ("Face ", ":"),
    analysis_failed: "Face analysis failed: ",
    exported: "Results exported to ",
};

impl Labels {
    pub fn gender(&self, gender: Option<Gender>) -> &'static str {
        match gender {
            Some(Gender::Man) => self.man,
            Some(Gender::Woman) => self.woman,
            None => self.not_detected,
        }
    }

    pub fn emotion(&self, emotion: Option<Emotion>) -> &'static str {
        match emotion {
            Some(e) => self.emotions[e.index()],
            None => self.not_detected,
        }
    }

    pub fn grouping(&self) -> &'static str {
        self.grouping
    }

    pub fn organizing(&self) -> &'static str {
        self.organizing
    }

    pub fn no_faces(&self) -> &'static str {
        self.no_faces
    }

    pub fn clusters_header(&self) -> &'static str {
        self.clusters_header
    }

    pub fn image_line(&self, filename: &str) -> String {
        format!("{}{}", self.image_line, filename)
    }

    pub fn face_count_line(&self, count: usize) -> String {
        format!("{}{}", self.face_count_line, count)
    }

    pub fn face_heading(&self, index: usize) -> String {
        let (prefix, suffix) = self.face_heading;
        format!("{}{}{}", prefix, index, suffix)
    }

    pub fn analysis_failed(&self, error: &dyn std::fmt::Display) -> String {
        format!("{}{}", self.analysis_failed, error)
    }

    pub fn exported(&self, path: &std::path::Path) -> String {
        format!("{}{}", self.exported, path.display())
    }
}
