// Label oracle: text recognition on the region of interest of a frame,
// reduced to a single cue label.

use crate::pipeline::crop::crop_roi;
use crate::run_artifacts::NormalizedRoi;
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use regex::Regex;
use std::io::Write;
use std::process::{Command, Stdio};

/// Returns the candidate text strings recognized inside `roi`.
pub trait LabelOracle: Send + Sync {
    fn recognize(&self, raster: &Mat, roi: &NormalizedRoi) -> Result<Vec<String>>;
}

/// Settings for the tesseract command line recognizer
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    pub binary: String,
    pub lang: String,
    /// Page segmentation mode; 7 treats the crop as a single text line
    pub psm: u8,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: "eng".to_string(),
            psm: 7,
        }
    }
}

/// Runs `tesseract` on the cropped ROI, fed as an in-memory PNG over stdin.
pub struct TesseractOracle {
    config: TesseractConfig,
}

impl TesseractOracle {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    fn run(&self, png: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.config.binary)
            .args(["stdin", "stdout", "-l", &self.config.lang, "--psm"])
            .arg(self.config.psm.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.config.binary))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
            stdin
                .write_all(png)
                .context("Failed to send image to tesseract")?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(anyhow!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl LabelOracle for TesseractOracle {
    fn recognize(&self, raster: &Mat, roi: &NormalizedRoi) -> Result<Vec<String>> {
        let crop = crop_roi(raster, roi)?;

        let mut png = Vector::<u8>::new();
        imgcodecs::imencode(".png", &crop, &mut png, &Vector::new())?;

        let text = self.run(&png.to_vec())?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Reduces recognized text to a `<tag> <number>` label.
pub struct LabelPattern {
    tag: String,
    regex: Regex,
}

impl LabelPattern {
    pub fn new(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(anyhow!("Label tag must not be empty"));
        }
        let regex = Regex::new(&format!(r"(?i){}\s+(\d+(?:\.\d+)?)", regex::escape(tag)))?;
        Ok(Self {
            tag: tag.to_string(),
            regex,
        })
    }

    /// First match across all candidates, spelled with the configured tag so
    /// that `CUE 7` and `Cue 7` name the same run. Empty when nothing matches.
    pub fn extract(&self, candidates: &[String]) -> String {
        let joined = candidates.join(" ");
        match self.regex.captures(&joined) {
            Some(caps) => format!("{} {}", self.tag, &caps[1]),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extracts_integer_and_decimal_cues() {
        let pattern = LabelPattern::new("Cue").unwrap();
        assert_eq!(pattern.extract(&lines(&["Cue 12"])), "Cue 12");
        assert_eq!(pattern.extract(&lines(&["Cue 12.5 GO"])), "Cue 12.5");
        assert_eq!(pattern.extract(&lines(&["Standby", "CUE 7"])), "Cue 7");
        assert_eq!(pattern.extract(&lines(&["cue   3"])), "Cue 3");
    }

    #[test]
    fn test_non_matching_text_is_empty() {
        let pattern = LabelPattern::new("Cue").unwrap();
        assert_eq!(pattern.extract(&lines(&[])), "");
        assert_eq!(pattern.extract(&lines(&["Scene 4"])), "");
        assert_eq!(pattern.extract(&lines(&["Cue"])), "");
        assert_eq!(pattern.extract(&lines(&["Cue12"])), "");
    }

    #[test]
    fn test_custom_tag_is_escaped() {
        let pattern = LabelPattern::new("Q.").unwrap();
        assert_eq!(pattern.extract(&lines(&["q. 4"])), "Q. 4");
        assert_eq!(pattern.extract(&lines(&["Qx 4"])), "");
        assert!(LabelPattern::new("  ").is_err());
    }
}
