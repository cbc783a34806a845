pub mod attributes;
pub mod clustering;
pub mod detector;
pub mod encoder;
pub mod models;

pub use attributes::{analyze_face_attributes, AttributeAnalyzer, OnnxAttributeAnalyzer, PersonAttributes};
pub use clustering::{cluster_faces, Dbscan, FaceClusters, OUTLIER};
pub use encoder::{encode_directory, FaceEncoder, FaceEncodings, OnnxFaceEncoder};
pub use models::ModelStore;
