//! Reading GeoJSON features and exposing their properties to filters.

use anyhow::{Context, Result, bail};
use geojson::{Feature, GeoJson};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::dsl::{Attributes, Value};

impl Attributes for Feature {
    fn lookup(&self, name: &str) -> Value<'_> {
        match &self.properties {
            Some(properties) => properties.lookup(name),
            None => Value::Missing,
        }
    }
}

/// Parse a GeoJSON document: a FeatureCollection, a single Feature, or a bare
/// geometry (which becomes a property-less feature).
pub fn parse_geojson(text: &str) -> Result<Vec<Feature>> {
    let geojson: GeoJson = text.parse().context("Input: Invalid GeoJSON")?;
    Ok(match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    })
}

/// Parse GeoJSON Lines: one feature per line, blank lines ignored.
pub fn parse_geojsonl<R: Read>(reader: R) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    for (i, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.context("Input: Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let feature: Feature = line
            .parse()
            .with_context(|| format!("Input: Invalid feature on line {}", i + 1))?;
        features.push(feature);
    }
    Ok(features)
}

fn is_line_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "geojsonl" | "jsonl" | "ndjson"))
}

/// Read features from a file, or stdin when the path is `-`.
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Input: Failed to read stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Input: Failed to read {:?}", path))?
    };

    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        bail!("Input: {:?} is empty", path);
    }

    // A line-delimited file whose first line is a whole document still
    // parses one feature per line.
    let features = if is_line_delimited(path) || looks_line_delimited(trimmed) {
        parse_geojsonl(text.as_bytes())?
    } else {
        parse_geojson(&text)?
    };

    tracing::info!("Read {} features from {:?}", features.len(), path);
    Ok(features)
}

/// Several top-level JSON objects, one per line.
fn looks_line_delimited(text: &str) -> bool {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let first = lines.next();
    let second = lines.next();
    match (first, second) {
        (Some(a), Some(b)) => {
            a.trim_start().starts_with('{')
                && b.trim_start().starts_with('{')
                && serde_json::from_str::<serde_json::Value>(a).is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::compile;

    const COLLECTION: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
     "properties": {"name": "Forest Park", "area": 120}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [3.0, 4.0]},
     "properties": {"name": "Main Street", "lanes": 2}}
  ]
}"#;

    #[test]
    fn test_feature_properties_as_attributes() {
        let features = parse_geojson(COLLECTION).unwrap();
        assert_eq!(features.len(), 2);

        let predicate = compile("name like \"park\" and area > 100").unwrap();
        assert!(predicate.matches(&features[0]));
        assert!(!predicate.matches(&features[1]));
    }

    #[test]
    fn test_feature_without_properties() {
        let features =
            parse_geojson(r#"{"type": "Point", "coordinates": [0.0, 0.0]}"#).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].lookup("name"), Value::Missing);
        assert!(compile("name != 1").unwrap().matches(&features[0]));
    }

    #[test]
    fn test_geojsonl() {
        let text = concat!(
            r#"{"type": "Feature", "geometry": null, "properties": {"a": 1}}"#,
            "\n\n",
            r#"{"type": "Feature", "geometry": null, "properties": {"a": 2}}"#,
            "\n"
        );
        let features = parse_geojsonl(text.as_bytes()).unwrap();
        assert_eq!(features.len(), 2);
        assert!(looks_line_delimited(text));
        assert!(!looks_line_delimited(COLLECTION));
    }

    #[test]
    fn test_geojsonl_reports_line() {
        let text = "{\"type\": \"Feature\", \"geometry\": null, \"properties\": {}}\nnot json\n";
        let err = parse_geojsonl(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_read_features_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.geojson");
        std::fs::write(&path, COLLECTION).unwrap();
        assert_eq!(read_features(&path).unwrap().len(), 2);

        let empty = dir.path().join("empty.geojson");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(read_features(&empty).is_err());
    }
}
