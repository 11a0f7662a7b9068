//! Parameter files exchanged with the process that schedules the dream runs.
//!
//! A parameter file holds one value per line, in a fixed order. Two layouts exist: the full
//! layout (13 lines) drives a sequential multi-layer run and the compact layout (8 lines) drives
//! a combined run from a local image.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dream::{DreamConfig, LayerWeights, StopCriterion, Targeting};
use crate::errors::Error;
use crate::imaging::ImageSource;
use crate::signal::DEFAULT_SENTINEL;
use crate::tensor::PrimitiveType;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ParamsLayout {
    Full,
    Compact,
}

impl ParamsLayout {
    /// Returns the number of lines of a file in this layout.
    pub fn line_count(self) -> usize {
        match self {
            ParamsLayout::Full => 13,
            ParamsLayout::Compact => 8,
        }
    }
}

impl FromStr for ParamsLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<ParamsLayout, String> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ParamsLayout::Full),
            "compact" => Ok(ParamsLayout::Compact),
            _ => Err(format!("unknown layout {}, expected full or compact", s)),
        }
    }
}

/// How the origin of the image must be interpreted.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ImageOriginFormat {
    Path,
    Url,
}

impl ImageOriginFormat {
    fn code(self) -> u8 {
        match self {
            ImageOriginFormat::Path => 0,
            ImageOriginFormat::Url => 1,
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub enum ParamsError {
    LineCount { expected: usize, found: usize },
    InvalidValue { line: usize, value: String, expected: &'static str },
    LayerCountMismatch { layers: usize, coefficients: usize },
}

impl fmt::Display for ParamsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ParamsError::LineCount { expected, found } => write!(f, "The parameter file must contain {} lines, found {}.", expected, found),
            ParamsError::InvalidValue { line, ref value, expected } => write!(f, "Invalid value {:?} at line {}, expected {}.", value, line, expected),
            ParamsError::LayerCountMismatch { layers, coefficients } => write!(f, "{} layers were given with {} coefficients.", layers, coefficients),
        }
    }
}

impl std::error::Error for ParamsError {}


/// Parameters of a dream run.
#[derive(Debug, Clone, PartialEq)]
pub struct DreamParams {
    pub verbose: bool,
    /// Name of the image, used as cache key when the image is downloaded.
    pub image_name: String,
    /// File path or URL of the image.
    pub image_origin: String,
    pub image_origin_format: ImageOriginFormat,
    pub output_path: PathBuf,
    /// File created once the run is over.
    pub done_path: PathBuf,
    pub distortion_rate: PrimitiveType,
    pub octaves: usize,
    pub octave_scale: f64,
    pub iterations: usize,
    /// Loss at which the gradient ascent of an octave stops early.
    pub max_loss: Option<PrimitiveType>,
    pub layers: LayerWeights,
    pub targeting: Targeting,
}

impl DreamParams {
    /// Parses the content of a parameter file.
    ///
    /// Lines are separated by `\n`; a trailing `\r` is removed from every line and a single
    /// trailing newline at the end of the content is ignored. Editors commonly add one, but
    /// [`DreamParams::write`] never does, and a second trailing newline counts as an extra line.
    ///
    /// The octave scale must be a finite number greater than or equal to 1.
    pub fn parse(content: &str, layout: ParamsLayout) -> Result<DreamParams, ParamsError> {
        let content = content.strip_suffix('\n').unwrap_or(content);
        let lines: Vec<&str> = content.split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        if lines.len() != layout.line_count() {
            return Err(ParamsError::LineCount { expected: layout.line_count(), found: lines.len() });
        }

        match layout {
            ParamsLayout::Full => Self::parse_full(&lines),
            ParamsLayout::Compact => Self::parse_compact(&lines),
        }
    }

    fn parse_full(lines: &[&str]) -> Result<DreamParams, ParamsError> {
        let image_origin_format = match parse_value::<u8>(lines, 3, "0 or 1")? {
            0 => ImageOriginFormat::Path,
            1 => ImageOriginFormat::Url,
            _ => return Err(invalid_value(lines, 3, "0 or 1")),
        };
        let max_loss = match lines[10].trim() {
            "None" | "" => None,
            _ => Some(parse_value::<PrimitiveType>(lines, 10, "a number or None")?),
        };

        let names = split_list(lines[11]);
        let coefficients = split_list(lines[12]).iter()
            .map(|value| value.parse::<PrimitiveType>().map_err(|_| ParamsError::InvalidValue { line: 13, value: value.to_string(), expected: "a list of numbers" }))
            .collect::<Result<Vec<PrimitiveType>, ParamsError>>()?;
        if names.len() != coefficients.len() {
            return Err(ParamsError::LayerCountMismatch { layers: names.len(), coefficients: coefficients.len() });
        }

        Ok(DreamParams {
            verbose: lines[0] == "True",
            image_name: lines[1].to_string(),
            image_origin: lines[2].to_string(),
            image_origin_format,
            output_path: PathBuf::from(lines[4]),
            done_path: PathBuf::from(lines[5]),
            distortion_rate: parse_value(lines, 6, "a number")?,
            octaves: parse_value(lines, 7, "a positive integer")?,
            octave_scale: parse_scale(lines, 8)?,
            iterations: parse_value(lines, 9, "a positive integer")?,
            max_loss,
            layers: names.into_iter().zip(coefficients).collect(),
            targeting: Targeting::Sequential,
        })
    }

    fn parse_compact(lines: &[&str]) -> Result<DreamParams, ParamsError> {
        let image_origin = lines[1].to_string();
        let output_path = PathBuf::from(lines[2]);
        let image_name = Path::new(&image_origin).file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| image_origin.clone());
        let done_path = output_path.parent().unwrap_or_else(|| Path::new("")).join(DEFAULT_SENTINEL);

        Ok(DreamParams {
            verbose: lines[0] == "True",
            image_name,
            image_origin,
            image_origin_format: ImageOriginFormat::Path,
            output_path,
            done_path,
            distortion_rate: parse_value(lines, 3, "a number")?,
            octaves: parse_value(lines, 4, "a positive integer")?,
            octave_scale: parse_scale(lines, 5)?,
            iterations: parse_value(lines, 6, "a positive integer")?,
            max_loss: None,
            layers: LayerWeights::uniform(&split_list(lines[7])),
            targeting: Targeting::Combined,
        })
    }

    /// Serializes the parameters in the given layout.
    ///
    /// The compact layout cannot represent the image name, the origin format, the completion file,
    /// the loss threshold and the coefficients; they take their implied values when parsed back.
    pub fn write(&self, layout: ParamsLayout) -> String {
        let layers = self.layers.names().collect::<Vec<&str>>().join(" ");
        let lines = match layout {
            ParamsLayout::Full => vec![
                if self.verbose { "True".to_string() } else { "False".to_string() },
                self.image_name.clone(),
                self.image_origin.clone(),
                self.image_origin_format.code().to_string(),
                self.output_path.display().to_string(),
                self.done_path.display().to_string(),
                self.distortion_rate.to_string(),
                self.octaves.to_string(),
                self.octave_scale.to_string(),
                self.iterations.to_string(),
                self.max_loss.map(|loss| loss.to_string()).unwrap_or_else(|| "None".to_string()),
                layers,
                self.layers.coefficients().map(|c| c.to_string()).collect::<Vec<String>>().join(" "),
            ],
            ParamsLayout::Compact => vec![
                if self.verbose { "True".to_string() } else { "False".to_string() },
                self.image_origin.clone(),
                self.output_path.display().to_string(),
                self.distortion_rate.to_string(),
                self.octaves.to_string(),
                self.octave_scale.to_string(),
                self.iterations.to_string(),
                layers,
            ],
        };
        lines.join("\n")
    }

    /// Reads a parameter file.
    pub fn load(path: &Path, layout: ParamsLayout) -> Result<DreamParams, Error> {
        let content = fs::read_to_string(path)?;
        Ok(DreamParams::parse(&content, layout)?)
    }

    /// Writes a parameter file.
    pub fn save(&self, path: &Path, layout: ParamsLayout) -> Result<(), Error> {
        fs::write(path, self.write(layout))?;
        Ok(())
    }

    pub fn image_source(&self) -> ImageSource {
        match self.image_origin_format {
            ImageOriginFormat::Path => ImageSource::File(PathBuf::from(&self.image_origin)),
            ImageOriginFormat::Url => ImageSource::Url { name: self.image_name.clone(), url: self.image_origin.clone() },
        }
    }

    /// Returns the configuration of the octave loop. The loss threshold is reached when the loss is
    /// greater than or equal to it.
    pub fn dream_config(&self) -> DreamConfig {
        DreamConfig {
            distortion_rate: self.distortion_rate,
            octaves: self.octaves,
            octave_scale: self.octave_scale,
            iterations: self.iterations,
            stop: self.max_loss.map(StopCriterion::AtLeast),
            targeting: self.targeting,
            verbose: self.verbose,
        }
    }
}

fn split_list(line: &str) -> Vec<String> {
    line.split(' ').filter(|item| !item.is_empty()).map(String::from).collect()
}

fn invalid_value(lines: &[&str], idx: usize, expected: &'static str) -> ParamsError {
    ParamsError::InvalidValue { line: idx + 1, value: lines[idx].to_string(), expected }
}

fn parse_value<T: FromStr>(lines: &[&str], idx: usize, expected: &'static str) -> Result<T, ParamsError> {
    lines[idx].trim().parse::<T>().map_err(|_| invalid_value(lines, idx, expected))
}

fn parse_scale(lines: &[&str], idx: usize) -> Result<f64, ParamsError> {
    let expected = "a finite number greater than or equal to 1";
    let scale = parse_value::<f64>(lines, idx, expected)?;
    if !scale.is_finite() || scale < 1. {
        return Err(invalid_value(lines, idx, expected));
    }
    Ok(scale)
}


#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use crate::dream::{StopCriterion, Targeting};
    use crate::imaging::ImageSource;
    use crate::params::*;

    const FULL: &str = "True\ncoast.jpg\nhttps://img-datasets.s3.amazonaws.com/coast.jpg\n1\noutput/dream.png\noutput/DONE\n20\n8\n1.3\n5\nNone\nmixed3 mixed5\n6 15";

    #[test]
    fn test_parse_full() {
        let params = DreamParams::parse(FULL, ParamsLayout::Full).unwrap();
        assert!(params.verbose);
        assert_eq!(params.image_name, "coast.jpg");
        assert_eq!(params.image_origin_format, ImageOriginFormat::Url);
        assert_eq!(params.done_path, PathBuf::from("output/DONE"));
        assert_eq!(params.octaves, 8);
        assert_eq!(params.iterations, 5);
        assert_eq!(params.max_loss, None);
        assert_eq!(params.layers.get("mixed5"), Some(15.));
        assert_eq!(params.targeting, Targeting::Sequential);
        assert_eq!(params.image_source(), ImageSource::Url { name: "coast.jpg".to_string(), url: "https://img-datasets.s3.amazonaws.com/coast.jpg".to_string() });
    }

    #[test]
    fn test_line_endings() {
        let windows = FULL.replace('\n', "\r\n") + "\r\n";
        assert_eq!(DreamParams::parse(&windows, ParamsLayout::Full).unwrap(), DreamParams::parse(FULL, ParamsLayout::Full).unwrap());
    }

    #[test]
    fn test_line_count_mismatch() {
        let short = FULL.rsplitn(2, '\n').nth(1).unwrap();
        assert_eq!(DreamParams::parse(short, ParamsLayout::Full), Err(ParamsError::LineCount { expected: 13, found: 12 }));

        let long = format!("{}\n\n", FULL);
        assert_eq!(DreamParams::parse(&long, ParamsLayout::Full), Err(ParamsError::LineCount { expected: 13, found: 14 }));
        assert!(DreamParams::parse(FULL, ParamsLayout::Compact).is_err());
    }

    #[test]
    fn test_invalid_values() {
        let params = FULL.replace("\n8\n", "\neight\n");
        match DreamParams::parse(&params, ParamsLayout::Full) {
            Err(ParamsError::InvalidValue { line, .. }) => assert_eq!(line, 8),
            _ => panic!("expected an invalid value"),
        }

        let params = FULL.replace("6 15", "6");
        assert_eq!(DreamParams::parse(&params, ParamsLayout::Full), Err(ParamsError::LayerCountMismatch { layers: 2, coefficients: 1 }));
    }

    #[test]
    fn test_invalid_octave_scale() {
        const COMPACT: &str = "False\nimages/seed.jpg\nout/dream.png\n15.5\n3\n1.4\n10\nconv2d_1";
        for scale in ["0", "NaN", "0.5", "inf", "-1.3"].iter() {
            let full = FULL.replace("\n1.3\n", &format!("\n{}\n", scale));
            match DreamParams::parse(&full, ParamsLayout::Full) {
                Err(ParamsError::InvalidValue { line, value, .. }) => assert_eq!((line, value.as_str()), (9, *scale)),
                _ => panic!("expected an invalid value for scale {}", scale),
            }

            let compact = COMPACT.replace("\n1.4\n", &format!("\n{}\n", scale));
            match DreamParams::parse(&compact, ParamsLayout::Compact) {
                Err(ParamsError::InvalidValue { line, .. }) => assert_eq!(line, 6),
                _ => panic!("expected an invalid value for scale {}", scale),
            }
        }

        let unit = FULL.replace("\n1.3\n", "\n1\n");
        assert_eq!(DreamParams::parse(&unit, ParamsLayout::Full).unwrap().octave_scale, 1.);
    }

    #[test]
    fn test_max_loss_threshold() {
        let params = FULL.replace("None", "2147483647");
        let params = DreamParams::parse(&params, ParamsLayout::Full).unwrap();
        assert_eq!(params.dream_config().stop, Some(StopCriterion::AtLeast(2147483647.)));
    }

    #[test]
    fn test_parse_compact() {
        let params = DreamParams::parse("False\nimages/seed.jpg\nout/dream.png\n15.5\n3\n1.4\n10\nconv2d_1 conv2d_2\n", ParamsLayout::Compact).unwrap();
        assert!(!params.verbose);
        assert_eq!(params.image_name, "seed.jpg");
        assert_eq!(params.done_path, PathBuf::from("out/DONE"));
        assert_eq!(params.image_source(), ImageSource::File(PathBuf::from("images/seed.jpg")));
        assert_eq!(params.layers.get("conv2d_2"), Some(1.));
        assert_eq!(params.targeting, Targeting::Combined);
        assert_eq!(params.dream_config().stop, None);
    }

    #[test]
    fn test_write_then_parse() {
        let mut params = DreamParams::parse(FULL, ParamsLayout::Full).unwrap();
        params.max_loss = Some(12.5);
        params.octave_scale = 1.45;
        params.distortion_rate = 0.01;
        assert_eq!(DreamParams::parse(&params.write(ParamsLayout::Full), ParamsLayout::Full).unwrap(), params);

        let compact = DreamParams::parse("True\nseed.png\nout/dream.png\n20\n4\n1.3\n2\nconv2d\n", ParamsLayout::Compact).unwrap();
        assert_eq!(DreamParams::parse(&compact.write(ParamsLayout::Compact), ParamsLayout::Compact).unwrap(), compact);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.txt");
        let params = DreamParams::parse(FULL, ParamsLayout::Full).unwrap();
        params.save(&path, ParamsLayout::Full).unwrap();
        assert_eq!(DreamParams::load(&path, ParamsLayout::Full).unwrap(), params);
    }
}
