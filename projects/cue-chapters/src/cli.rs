use crate::video::Backend;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Media file to scan
    pub input: PathBuf,

    /// Region holding the cue text, in pixels from the top-left corner
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"])]
    pub roi: Option<Vec<u32>>,

    /// Chaptered output file [default: <input stem>_devoured.<ext>]
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Maximum boundary error in frames
    #[arg(long, default_value_t = 1)]
    pub accuracy: usize,

    /// Number of batches scanned in parallel
    #[arg(long, default_value_t = 5)]
    pub batches: usize,

    /// Video decoding backend
    #[arg(long, value_enum, default_value = "ffmpeg", env = "CUE_CHAPTERS_BACKEND")]
    pub backend: Backend,

    /// Keyword preceding the cue number
    #[arg(long, default_value = "Cue")]
    pub tag: String,

    /// Path to the tesseract binary
    #[arg(long, default_value = "tesseract", env = "CUE_CHAPTERS_TESSERACT")]
    pub tesseract: String,

    /// Tesseract language
    #[arg(long, default_value = "eng")]
    pub lang: String,

    /// Tesseract page segmentation mode
    #[arg(long, default_value_t = 7)]
    pub psm: u8,

    /// Write a JSON scan report here
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Scan and print chapters without writing the output file
    #[arg(long)]
    pub dry_run: bool,

    /// Cancel the scan after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write ROI crops of a few frames here and exit
    #[arg(long)]
    pub preview_dir: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["cue-chapters", "show.mp4"]).unwrap();
        assert_eq!(args.input, PathBuf::from("show.mp4"));
        assert_eq!(args.accuracy, 1);
        assert_eq!(args.batches, 5);
        assert_eq!(args.tag, "Cue");
        assert_eq!(args.psm, 7);
        assert!(args.roi.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_roi_takes_four_values() {
        let args = Args::try_parse_from([
            "cue-chapters",
            "show.mp4",
            "--roi",
            "10",
            "20",
            "300",
            "40",
            "--backend",
            "opencv",
        ])
        .unwrap();
        assert_eq!(args.roi, Some(vec![10, 20, 300, 40]));
        assert_eq!(args.backend, Backend::Opencv);

        assert!(Args::try_parse_from(["cue-chapters", "show.mp4", "--roi", "1", "2"]).is_err());
    }
}
