/// Compute the largest size with the image's aspect ratio that fits inside
/// `area_w` x `area_h`. Portrait images start from full height and clamp to
/// the area width; landscape and square images start from full width and
/// clamp to the area height. Returns `None` when any dimension is below 1
/// (GTK reports zero-sized allocations while the window is being laid out).
pub fn fit(image_w: i32, image_h: i32, area_w: i32, area_h: i32) -> Option<(i32, i32)> {
    if image_w < 1 || image_h < 1 || area_w < 1 || area_h < 1 {
        return None;
    }

    let aspect = f64::from(image_w) / f64::from(image_h);
    let (area_w, area_h) = (f64::from(area_w), f64::from(area_h));

    let (mut width, mut height);
    if aspect < 1.0 {
        height = area_h;
        width = aspect * height;
        if width > area_w {
            height *= area_w / width;
            width = area_w;
        }
    } else {
        width = area_w;
        height = width / aspect;
        if height > area_h {
            width *= area_h / height;
            height = area_h;
        }
    }

    // extreme ratios can round the short side down to zero, which
    // scale_simple rejects
    Some(((width.round() as i32).max(1), (height.round() as i32).max(1)))
}

#[cfg(test)]
mod tests {
    use super::fit;

    #[test]
    fn square_image_in_wide_window() {
        assert_eq!(fit(300, 300, 200, 100), Some((100, 100)));
    }

    #[test]
    fn portrait_image_in_square_window() {
        // aspect 0.5: full height gives 50x100, already within the width
        assert_eq!(fit(200, 400, 100, 100), Some((50, 100)));
    }

    #[test]
    fn landscape_image_in_square_window() {
        // aspect 2: full width gives 100x50, already within the height
        assert_eq!(fit(400, 200, 100, 100), Some((100, 50)));
    }

    #[test]
    fn portrait_image_clamped_by_width() {
        // aspect 0.8 in a narrow window: 80x100 overflows width 40,
        // both dimensions rescale by the overflow ratio
        assert_eq!(fit(80, 100, 40, 100), Some((40, 50)));
    }

    #[test]
    fn landscape_image_clamped_by_height() {
        assert_eq!(fit(100, 50, 100, 25), Some((50, 25)));
    }

    #[test]
    fn exact_fit_is_unchanged() {
        assert_eq!(fit(640, 480, 640, 480), Some((640, 480)));
    }

    #[test]
    fn degenerate_inputs_produce_no_size() {
        assert_eq!(fit(0, 100, 100, 100), None);
        assert_eq!(fit(100, 0, 100, 100), None);
        assert_eq!(fit(100, 100, 0, 100), None);
        assert_eq!(fit(100, 100, 100, 0), None);
    }

    #[test]
    fn output_fits_and_preserves_aspect() {
        let images = [(1, 1), (3, 2), (2, 3), (1920, 1080), (7, 500), (500, 7)];
        let areas = [(100, 100), (500, 500), (200, 100), (100, 200), (33, 777)];

        for &(iw, ih) in &images {
            for &(aw, ah) in &areas {
                let (w, h) = fit(iw, ih, aw, ah).unwrap();
                assert!(w <= aw && h <= ah, "{iw}x{ih} in {aw}x{ah} gave {w}x{h}");
                assert!(w >= 1 && h >= 1, "{iw}x{ih} in {aw}x{ah} gave {w}x{h}");

                let want = f64::from(iw) / f64::from(ih);
                let got = f64::from(w) / f64::from(h);
                // rounding to whole pixels perturbs the ratio by at most
                // one pixel in the shorter dimension
                let tolerance = want / f64::from(w.min(h));
                assert!(
                    (got - want).abs() <= tolerance,
                    "{iw}x{ih} in {aw}x{ah}: aspect {got} vs {want}"
                );
            }
        }
    }
}
