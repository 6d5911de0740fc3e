use clap::Parser;
use std::path::PathBuf;

use crate::entities::SourceDescriptor;

// Build version with codec info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Codec:  image 0.25 (GIF, WebP animated; PNG, JPEG, TIFF, TGA, HDR still)\n",
    "HTTP:   ehttp 0.5\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Step an animated image through externally driven progress
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Image source: http(s) URL, `asset:NAME`, or file path
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Extra request header for URL sources ("Name: value"), repeatable
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    pub headers: Vec<String>,

    /// Number of progress steps across [0,1]
    #[arg(short = 'n', long = "steps", value_name = "N", default_value_t = 10)]
    pub steps: u32,

    /// Write each selected frame as PNG into this directory
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Settings file (default: platform config dir)
    #[arg(short = 's', long = "settings", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Seconds to wait for fetch and decode
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Enable debug logging to file (default: gifscrub.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Args {
    /// Turn the SOURCE argument and headers into a descriptor
    pub fn descriptor(&self) -> Result<SourceDescriptor, String> {
        let src = self.source.as_str();
        if src.starts_with("http://") || src.starts_with("https://") {
            let headers = self
                .headers
                .iter()
                .map(|h| parse_header(h))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(SourceDescriptor::network_with_headers(src, headers));
        }

        if !self.headers.is_empty() {
            return Err("--header only applies to http(s) sources".to_string());
        }

        match src.strip_prefix("asset:") {
            Some(name) if !name.is_empty() => Ok(SourceDescriptor::asset(name)),
            Some(_) => Err("asset name is empty".to_string()),
            None => Ok(SourceDescriptor::file(src)),
        }
    }

    /// Progress values for each step, 0 and 1 included
    pub fn progress_steps(&self) -> Vec<f64> {
        let steps = self.steps.max(1);
        (0..=steps).map(|i| f64::from(i) / f64::from(steps)).collect()
    }
}

/// Parse "Name: value"
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header '{}' is not 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header '{}' has no name", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Args {
        Args::parse_from(std::iter::once("gifscrub").chain(list.iter().copied()))
    }

    #[test]
    fn test_url_with_headers() {
        let a = args(&["https://example.com/a.gif", "-H", "Authorization: Bearer t"]);
        assert_eq!(
            a.descriptor().unwrap(),
            SourceDescriptor::network_with_headers(
                "https://example.com/a.gif",
                vec![("Authorization".to_string(), "Bearer t".to_string())]
            )
        );
    }

    #[test]
    fn test_asset_and_file_sources() {
        assert_eq!(args(&["asset:spin.gif"]).descriptor().unwrap(), SourceDescriptor::asset("spin.gif"));
        assert_eq!(args(&["./a.gif"]).descriptor().unwrap(), SourceDescriptor::file("./a.gif"));
        assert!(args(&["asset:"]).descriptor().is_err());
        assert!(args(&["a.gif", "-H", "X: y"]).descriptor().is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(parse_header("Accept: image/gif").unwrap(), ("Accept".to_string(), "image/gif".to_string()));
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_progress_steps() {
        assert_eq!(args(&["a.gif", "-n", "4"]).progress_steps(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(args(&["a.gif", "-n", "0"]).progress_steps(), vec![0.0, 1.0]);
    }
}
