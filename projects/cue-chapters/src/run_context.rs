use crate::cli::Args;
use crate::error::ScanError;
use crate::pipeline::oracle::TesseractConfig;
use crate::video::Backend;
use std::path::{Path, PathBuf};

/// Everything a run needs, resolved and validated from the command line
#[derive(Debug, Clone)]
pub struct RunContext {
    pub input: PathBuf,
    pub output: PathBuf,
    pub backend: Backend,
    /// `[x, y, w, h]` in pixels from the top-left corner
    pub roi_pixels: Option<[u32; 4]>,
    pub accuracy: usize,
    pub batch_count: usize,
    pub tag: String,
    pub tesseract: TesseractConfig,
    pub report_path: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunContext {
    pub fn from_args(args: &Args) -> Result<Self, ScanError> {
        if args.accuracy == 0 {
            return Err(ScanError::InvalidConfig(
                "--accuracy must be at least 1".to_string(),
            ));
        }
        if args.batches == 0 {
            return Err(ScanError::InvalidConfig(
                "--batches must be at least 1".to_string(),
            ));
        }
        if !args.input.is_file() {
            return Err(ScanError::open(
                args.input.to_string_lossy(),
                anyhow::anyhow!("no such file"),
            ));
        }

        let roi_pixels = match args.roi.as_deref() {
            None => None,
            Some(&[x, y, w, h]) => Some([x, y, w, h]),
            Some(other) => {
                return Err(ScanError::InvalidConfig(format!(
                    "--roi takes 4 values, got {}",
                    other.len()
                )))
            }
        };

        let output = match &args.output {
            Some(path) => path.clone(),
            None => default_output_path(&args.input),
        };
        if output == args.input {
            return Err(ScanError::InvalidConfig(
                "output would overwrite the input".to_string(),
            ));
        }

        Ok(Self {
            input: args.input.clone(),
            output,
            backend: args.backend,
            roi_pixels,
            accuracy: args.accuracy,
            batch_count: args.batches,
            tag: args.tag.clone(),
            tesseract: TesseractConfig {
                binary: args.tesseract.clone(),
                lang: args.lang.clone(),
                psm: args.psm,
            },
            report_path: args.report.clone(),
            dry_run: args.dry_run,
        })
    }

    /// Input path as UTF-8, which both decoding backends require
    pub fn input_str(&self) -> Result<&str, ScanError> {
        self.input.to_str().ok_or_else(|| {
            ScanError::open(
                self.input.to_string_lossy(),
                anyhow::anyhow!("path is not valid UTF-8"),
            )
        })
    }
}

/// `<stem>_devoured.<ext>` next to the input
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{}_devoured.{}", stem, ext.to_string_lossy()),
        None => format!("{}_devoured", stem),
    };
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args_for(input: &Path, extra: &[&str]) -> Args {
        let mut argv = vec!["cue-chapters".to_string(), input.to_string_lossy().into_owned()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    fn temp_input(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cue-chapters-ctx-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/shows/act1.mov")),
            PathBuf::from("/shows/act1_devoured.mov")
        );
        assert_eq!(
            default_output_path(Path::new("recording")),
            PathBuf::from("recording_devoured")
        );
    }

    #[test]
    fn test_from_args_resolves_everything() {
        let input = temp_input("resolve.mp4");
        let ctx = RunContext::from_args(&args_for(
            &input,
            &["--roi", "0", "0", "100", "50", "--lang", "deu", "--dry-run"],
        ))
        .unwrap();
        assert_eq!(ctx.roi_pixels, Some([0, 0, 100, 50]));
        assert_eq!(ctx.output, input.with_file_name("resolve_devoured.mp4"));
        assert_eq!(ctx.tesseract.lang, "deu");
        assert_eq!(ctx.tesseract.psm, 7);
        assert!(ctx.dry_run);
        assert_eq!(ctx.input_str().unwrap(), input.to_str().unwrap());
    }

    #[test]
    fn test_from_args_rejects_bad_values() {
        let input = temp_input("reject.mp4");
        assert!(matches!(
            RunContext::from_args(&args_for(&input, &["--accuracy", "0"])),
            Err(ScanError::InvalidConfig(_))
        ));
        assert!(matches!(
            RunContext::from_args(&args_for(&input, &["--batches", "0"])),
            Err(ScanError::InvalidConfig(_))
        ));
        assert!(matches!(
            RunContext::from_args(&args_for(Path::new("/nonexistent/show.mp4"), &[])),
            Err(ScanError::Open { .. })
        ));
        let same = input.to_string_lossy().into_owned();
        assert!(matches!(
            RunContext::from_args(&args_for(&input, &["--output", &same])),
            Err(ScanError::InvalidConfig(_))
        ));
    }
}
