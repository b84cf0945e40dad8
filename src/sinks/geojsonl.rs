use super::DataSink;
use anyhow::Result;
use geojson::Feature;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One feature per line (GeoJSON Lines).
pub struct GeoJsonlSink {
    writer: BufWriter<Box<dyn Write + Send>>,
}

impl GeoJsonlSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
        })
    }

    pub fn stdout() -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(Box::new(std::io::stdout())),
        })
    }
}

impl DataSink for GeoJsonlSink {
    fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        serde_json::to_writer(&mut self.writer, feature)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parse_geojsonl;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn writes_one_feature_per_line() {
        let temp_file = NamedTempFile::with_suffix(".geojsonl").unwrap();
        let mut sink = GeoJsonlSink::new(temp_file.path()).unwrap();

        for i in 0..3 {
            let feature = Feature::from_json_value(json!({
                "type": "Feature",
                "geometry": null,
                "properties": {"i": i}
            }))
            .unwrap();
            sink.add_feature(&feature).unwrap();
        }
        sink.finish().unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert_eq!(content.lines().count(), 3);

        let features = parse_geojsonl(content.as_bytes()).unwrap();
        assert_eq!(features[1].property("i"), Some(&json!(1)));
    }
}
