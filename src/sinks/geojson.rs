use super::DataSink;
use anyhow::Result;
use geojson::Feature;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Streams features into a single FeatureCollection document.
pub struct GeoJsonSink {
    writer: BufWriter<File>,
    first_feature: bool,
}

impl GeoJsonSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Write the header of the FeatureCollection
        writeln!(writer, "{{")?;
        writeln!(writer, "  \"type\": \"FeatureCollection\",")?;
        writeln!(writer, "  \"features\": [")?;

        Ok(Self {
            writer,
            first_feature: true,
        })
    }
}

impl DataSink for GeoJsonSink {
    fn add_feature(&mut self, feature: &Feature) -> Result<()> {
        if !self.first_feature {
            writeln!(self.writer, ",")?;
        }
        self.first_feature = false;

        serde_json::to_writer(&mut self.writer, feature)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Close the array and object
        writeln!(self.writer)?;
        writeln!(self.writer, "  ]")?;
        writeln!(self.writer, "}}")?;
        self.writer.flush()?;
        Ok(())
    }
}
