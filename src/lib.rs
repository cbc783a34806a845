//! Group the faces found in a folder of photographs by person.
//!
//! A run encodes every face with an embedding model, clusters the
//! embeddings with DBSCAN, copies each cluster's photos into its own
//! `person_<N>` folder, estimates age, gender and dominant emotion from the
//! cluster's first photo, and writes a JSON summary.

pub mod config;
pub mod export;
pub mod faces;
pub mod labels;
pub mod logging;
pub mod organize;
pub mod pipeline;
pub mod scanner;
