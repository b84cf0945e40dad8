use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use geojson::Feature;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::cache::PredicateCache;
use crate::dsl::{Predicate, StructuredFilter, adapt, compile, parse_filter};
use crate::features::read_features;
use crate::sinks::{DataSink, GeoJsonSink, GeoJsonlSink};
use crate::style::{Style, StyleConfig, Symbolizer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (default: all cores)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Keep the features matching a filter expression
    Query(QueryArgs),
    /// Attach the symbolizer chosen by a style's rules to each feature
    Style(StyleArgs),
    /// Convert a structured JSON filter into expression text
    Adapt {
        /// Structured filter, e.g. '["all", ["==", "a", 1], [">", "b", 2]]'
        filter: String,
    },
    /// Validate an expression and print how it parses
    Check {
        #[arg(allow_hyphen_values = true)]
        expression: String,
    },
}

#[derive(Args)]
pub struct IoArgs {
    /// Input GeoJSON or GeoJSON Lines file ("-" for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file (.geojson, .geojsonl), "-" for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Output format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Args)]
pub struct QueryArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Filter expression, e.g. 'kind == "park" and area > 1000'
    #[arg(short = 'w', long = "where", allow_hyphen_values = true)]
    pub expression: String,
}

#[derive(Args)]
pub struct StyleArgs {
    #[command(flatten)]
    pub io: IoArgs,

    /// Style file (YAML or JSON)
    #[arg(short, long, env = "MAPFILTER_STYLE")]
    pub style: PathBuf,

    /// Property that receives the symbolizer
    #[arg(long, default_value = "style")]
    pub property: String,

    /// Skip features no rule (or default) applies to
    #[arg(long)]
    pub drop_unstyled: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum OutputFormat {
    #[value(name = "geojson")]
    GeoJson,
    #[value(name = "geojsonl", alias = "jsonl")]
    GeoJsonl,
}

pub fn output_format_label(format: &OutputFormat) -> &'static str {
    match format {
        OutputFormat::GeoJson => "geojson",
        OutputFormat::GeoJsonl => "geojsonl",
    }
}

/// Explicit format, else the output extension, else GeoJSON Lines for stdout.
pub fn resolve_format(requested: Option<OutputFormat>, output: &Path) -> Result<OutputFormat> {
    if let Some(format) = requested {
        return Ok(format);
    }
    if output == Path::new("-") {
        return Ok(OutputFormat::GeoJsonl);
    }

    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match ext.as_deref() {
        Some("geojson") => Ok(OutputFormat::GeoJson),
        Some("geojsonl" | "jsonl" | "ndjson" | "json") => Ok(OutputFormat::GeoJsonl),
        _ => Err(anyhow!(
            "CLI: Could not detect output format from extension; use --format"
        )),
    }
}

pub fn init_sink(format: &OutputFormat, output: &Path) -> Result<Box<dyn DataSink + Send>> {
    match format {
        OutputFormat::GeoJson => {
            if output == Path::new("-") {
                anyhow::bail!(
                    "CLI: GeoJSON output to stdout is not supported; use geojsonl instead"
                );
            }
            tracing::info!("Sink: {} -> {:?}", output_format_label(format), output);
            Ok(Box::new(GeoJsonSink::new(output)?))
        }
        OutputFormat::GeoJsonl => {
            if output == Path::new("-") {
                tracing::info!("Sink: {} -> stdout", output_format_label(format));
                Ok(Box::new(GeoJsonlSink::stdout()?))
            } else {
                tracing::info!("Sink: {} -> {:?}", output_format_label(format), output);
                Ok(Box::new(GeoJsonlSink::new(output)?))
            }
        }
    }
}

/// Features matching the predicate, in input order.
pub fn filter_features<'a>(features: &'a [Feature], predicate: &Predicate) -> Vec<&'a Feature> {
    features
        .par_iter()
        .filter(|feature| predicate.matches(*feature))
        .collect()
}

/// Each feature paired with the symbolizer the style picks for it.
pub fn style_features<'a>(
    features: &'a [Feature],
    style: &'a Style,
) -> Vec<(&'a Feature, Option<&'a Symbolizer>)> {
    features
        .par_iter()
        .map(|feature| (feature, style.symbolizer_for(feature)))
        .collect()
}

fn write_all<'a, I>(io: &IoArgs, features: I) -> Result<u64>
where
    I: IntoIterator<Item = std::borrow::Cow<'a, Feature>>,
{
    let format = resolve_format(io.format, &io.output)?;
    let mut sink = init_sink(&format, &io.output)?;
    let mut written = 0u64;
    for feature in features {
        sink.add_feature(&feature)
            .context("Sink: Failed to write feature")?;
        written += 1;
    }
    sink.finish().context("Sink: Failed to finalize output")?;
    Ok(written)
}

pub fn run_query(args: &QueryArgs) -> Result<u64> {
    let predicate =
        compile(&args.expression).with_context(|| format!("Query: {:?}", args.expression))?;
    let features = read_features(&args.io.input)?;

    let start = std::time::Instant::now();
    let matches = filter_features(&features, &predicate);
    tracing::info!(
        "Matched {} of {} features in {:.3}s",
        matches.len(),
        features.len(),
        start.elapsed().as_secs_f64()
    );

    write_all(&args.io, matches.into_iter().map(std::borrow::Cow::Borrowed))
}

/// Copy of the feature with the symbolizer stored under `property`.
pub fn apply_symbolizer(feature: &Feature, property: &str, symbolizer: &Symbolizer) -> Result<Feature> {
    let mut styled = feature.clone();
    let value = serde_json::to_value(symbolizer).context("Style: Failed to encode symbolizer")?;
    styled.set_property(property, value);
    Ok(styled)
}

pub fn run_style(args: &StyleArgs) -> Result<u64> {
    let config = StyleConfig::load(&args.style)?;
    let mut cache = PredicateCache::new();
    let style = Style::compile(&config, &mut cache)?;
    let features = read_features(&args.io.input)?;

    let styled = style_features(&features, &style);
    let unstyled = styled.iter().filter(|(_, s)| s.is_none()).count();
    if unstyled > 0 {
        tracing::warn!("{} of {} features matched no style rule", unstyled, styled.len());
    }

    let mut output = Vec::with_capacity(styled.len());
    for (feature, symbolizer) in styled {
        match symbolizer {
            Some(symbolizer) => output.push(std::borrow::Cow::Owned(apply_symbolizer(
                feature,
                &args.property,
                symbolizer,
            )?)),
            None if args.drop_unstyled => {}
            None => output.push(std::borrow::Cow::Borrowed(feature)),
        }
    }

    write_all(&args.io, output)
}

pub fn run_adapt(filter: &str) -> Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(filter).context("Adapt: Filter is not valid JSON")?;
    let structured = StructuredFilter::try_from(value).context("Adapt: Invalid structured filter")?;
    Ok(adapt(&structured))
}

pub fn run_check(expression: &str) -> Result<String> {
    let ast = parse_filter(expression).with_context(|| format!("Check: {:?}", expression))?;
    Ok(format!("{}\nproperties: {}", ast, ast.properties().join(", ")))
}

pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Query(args) => {
            let written = run_query(args)?;
            tracing::info!("Done! Written {} features", written);
        }
        Command::Style(args) => {
            let written = run_style(args)?;
            tracing::info!("Done! Written {} features", written);
        }
        Command::Adapt { filter } => println!("{}", run_adapt(filter)?),
        Command::Check { expression } => println!("{}", run_check(expression)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::parse_geojson;
    use serde_json::json;

    fn features() -> Vec<Feature> {
        let items: Vec<serde_json::Value> = (0..50)
            .map(|i| {
                let kind = if i % 2 == 0 { "park" } else { "road" };
                json!({
                    "type": "Feature",
                    "geometry": null,
                    "properties": {"i": i, "kind": kind}
                })
            })
            .collect();
        let collection = json!({"type": "FeatureCollection", "features": items});
        parse_geojson(&collection.to_string()).unwrap()
    }

    #[test]
    fn resolves_format_from_extension() {
        assert_eq!(
            resolve_format(None, Path::new("out.geojson")).unwrap(),
            OutputFormat::GeoJson
        );
        assert_eq!(
            resolve_format(None, Path::new("out.JSONL")).unwrap(),
            OutputFormat::GeoJsonl
        );
        assert_eq!(resolve_format(None, Path::new("-")).unwrap(), OutputFormat::GeoJsonl);
        assert_eq!(
            resolve_format(Some(OutputFormat::GeoJson), Path::new("out.txt")).unwrap(),
            OutputFormat::GeoJson
        );
        assert!(resolve_format(None, Path::new("out.txt")).is_err());
    }

    #[test]
    fn geojson_to_stdout_is_rejected() {
        assert!(init_sink(&OutputFormat::GeoJson, Path::new("-")).is_err());
    }

    #[test]
    fn filter_preserves_order() {
        let features = features();
        let predicate = compile("kind == \"park\" and i >= 10").unwrap();
        let matches = filter_features(&features, &predicate);

        let ids: Vec<_> = matches.iter().map(|f| f.property("i").cloned()).collect();
        let expected: Vec<_> = (10..50).step_by(2).map(|i| Some(json!(i))).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn style_pairs_each_feature() {
        let features = features();
        let config: StyleConfig = serde_json::from_value(json!({
            "rules": [
                {"filter": "kind == \"road\"", "symbolizer": {"stroke": "black"}},
                {"filter": ["==", "i", 3], "symbolizer": {"stroke": "red"}}
            ]
        }))
        .unwrap();
        let style = Style::compile(&config, &mut PredicateCache::new()).unwrap();

        let styled = style_features(&features, &style);
        assert_eq!(styled.len(), 50);
        assert!(styled[0].1.is_none());
        assert_eq!(styled[1].1.and_then(|s| s.stroke.as_deref()), Some("black"));
        assert_eq!(styled[3].1.and_then(|s| s.stroke.as_deref()), Some("red"));
    }

    #[test]
    fn symbolizer_goes_into_properties() {
        let features = features();
        let symbolizer = Symbolizer {
            fill: Some("#00ff00".into()),
            ..Symbolizer::default()
        };
        let styled = apply_symbolizer(&features[0], "style", &symbolizer).unwrap();
        assert_eq!(styled.property("style"), Some(&json!({"fill": "#00ff00"})));
        assert_eq!(styled.property("kind"), Some(&json!("park")));
    }

    #[test]
    fn expressions_may_start_with_minus() {
        let cli = Cli::try_parse_from(["mapfilter", "check", "-depth < 3"]).unwrap();
        assert!(matches!(cli.command, Command::Check { ref expression } if expression == "-depth < 3"));

        let cli = Cli::try_parse_from(["mapfilter", "query", "-i", "in.geojson", "-w", "-depth > -3"])
            .unwrap();
        let Command::Query(args) = cli.command else {
            panic!("expected query command");
        };
        assert_eq!(args.expression, "-depth > -3");
    }

    #[test]
    fn adapt_and_check_commands() {
        assert_eq!(
            run_adapt(r#"["any", ["==", "a", 1], ["<", "b", 2]]"#).unwrap(),
            "a == 1 or b < 2"
        );
        assert!(run_adapt("not json").is_err());
        assert!(run_adapt(r#"{"a": 1}"#).is_err());

        assert_eq!(
            run_check("a or b and c").unwrap(),
            "(a or (b and c))\nproperties: a, b, c"
        );
        assert!(run_check("a").is_err());
    }
}
