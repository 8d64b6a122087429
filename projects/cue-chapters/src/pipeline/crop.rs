use crate::run_artifacts::NormalizedRoi;
use anyhow::Result;
use opencv::core;
use opencv::prelude::*;

/// Pixel rectangle (top-left origin) covered by a bottom-left-origin ROI.
/// Returns `None` when nothing of the ROI falls inside the frame.
pub fn roi_to_rect(roi: &NormalizedRoi, width: i32, height: i32) -> Option<core::Rect> {
    let fw = width as f32;
    let fh = height as f32;

    let x = (roi.x * fw).round() as i32;
    let y = ((1.0 - roi.y - roi.height) * fh).round() as i32;
    let w = (roi.width * fw).round() as i32;
    let h = (roi.height * fh).round() as i32;

    let x_clamped = x.clamp(0, width);
    let y_clamped = y.clamp(0, height);
    let w_clamped = w.clamp(0, width - x_clamped);
    let h_clamped = h.clamp(0, height - y_clamped);

    if w_clamped <= 0 || h_clamped <= 0 {
        return None;
    }
    Some(core::Rect::new(x_clamped, y_clamped, w_clamped, h_clamped))
}

/// Copies the ROI out of a frame.
pub fn crop_roi(img: &core::Mat, roi: &NormalizedRoi) -> Result<core::Mat> {
    let size = img.size()?;
    let rect = roi_to_rect(roi, size.width, size.height).ok_or_else(|| {
        anyhow::anyhow!(
            "ROI {:?} is empty on a {}x{} frame",
            roi,
            size.width,
            size.height
        )
    })?;

    let cropped = core::Mat::roi(img, rect)?;
    let mut out = core::Mat::default();
    cropped.copy_to(&mut out)?;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Scalar;

    #[test]
    fn test_bottom_strip_maps_to_last_rows() {
        let roi = NormalizedRoi {
            x: 0.25,
            y: 0.0,
            width: 0.5,
            height: 0.1,
        };
        let rect = roi_to_rect(&roi, 1920, 1080).unwrap();
        assert_eq!(rect.x, 480);
        assert_eq!(rect.y, 972);
        assert_eq!(rect.width, 960);
        assert_eq!(rect.height, 108);
    }

    #[test]
    fn test_empty_roi_is_rejected() {
        let roi = NormalizedRoi {
            x: 1.0,
            y: 0.0,
            width: 0.2,
            height: 0.2,
        };
        assert!(roi_to_rect(&roi, 640, 480).is_none());
    }

    #[test]
    fn test_crop_roi_size() {
        let image =
            core::Mat::new_rows_cols_with_default(100, 200, core::CV_8UC3, Scalar::all(0.0))
                .unwrap();
        let roi = NormalizedRoi {
            x: 0.5,
            y: 0.5,
            width: 0.5,
            height: 0.5,
        };
        let crop = crop_roi(&image, &roi).unwrap();
        assert_eq!(crop.cols(), 100);
        assert_eq!(crop.rows(), 50);
    }
}
