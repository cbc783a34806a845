use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::faces::PersonAttributes;
use crate::organize::PersonRecord;
use crate::labels::Labels;

/// Build the summary object, keyed `person_<id>` in record order.
pub fn results_json(records: &[PersonRecord], labels: &Labels) -> Value {
    let mut root = Map::new();

    for record in records {
        let mut person = Map::new();
        person.insert(
            labels.folder_key.to_string(),
            Value::String(record.folder.to_string_lossy().to_string()),
        );
        person.insert(
            labels.attributes_key.to_string(),
            attributes_json(record.attributes.as_ref(), labels),
        );
        root.insert(record.key(), Value::Object(person));
    }

    Value::Object(root)
}

fn attributes_json(attributes: Option<&PersonAttributes>, labels: &Labels) -> Value {
    let not_detected = || Value::String(labels.not_detected.to_string());

    let (age, gender, emotion) = match attributes {
        Some(attrs) => (
            attrs.age.map(Value::from).unwrap_or_else(not_detected),
            Value::String(labels.gender(attrs.gender).to_string()),
            Value::String(labels.emotion(attrs.dominant_emotion).to_string()),
        ),
        None => (not_detected(), not_detected(), not_detected()),
    };

    let mut map = Map::new();
    map.insert(labels.age_key.to_string(), age);
    map.insert(labels.gender_key.to_string(), gender);
    map.insert(labels.emotion_key.to_string(), emotion);
    Value::Object(map)
}

/// Write the summary as UTF-8 JSON with 4-space indentation.
/// Non-ASCII characters are written as-is.
pub fn export_results_to_json(records: &[PersonRecord], output_file: &Path, labels: &Labels) -> Result<()> {
    let json = results_json(records, labels);

    let file = File::create(output_file)
        .with_context(|| format!("Failed to create {}", output_file.display()))?;
    let mut writer = BufWriter::new(file);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    json.serialize(&mut serializer)?;
    writer.flush()?;

    println!("{}", labels.exported(output_file));
    tracing::info!(path = ?output_file, persons = records.len(), "Results exported");
    Ok(())
}
