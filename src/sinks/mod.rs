use anyhow::Result;
use ::geojson::Feature;

pub mod geojson;
pub mod geojsonl;

pub use self::geojson::GeoJsonSink;
pub use self::geojsonl::GeoJsonlSink;

pub trait DataSink: Send {
    fn add_feature(&mut self, feature: &Feature) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}
