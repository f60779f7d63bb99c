use warpalign::{warp_perspective, AlignError, Homography, Interpolation, OwnedImage, WarpConfig};

fn gradient(width: usize, height: usize) -> OwnedImage {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push((2 * x + y) as u8);
        }
    }
    OwnedImage::gray(data, width, height).unwrap()
}

fn textured(width: usize, height: usize) -> OwnedImage {
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 13) ^ (y * 7)) as u8);
            data.push(((x * y) & 0xFF) as u8);
            data.push((x + y) as u8);
        }
    }
    OwnedImage::new(data, width, height, 3).unwrap()
}

fn max_interior_diff(a: &OwnedImage, b: &OwnedImage, margin: usize) -> u8 {
    let mut worst = 0u8;
    for y in margin..a.height() - margin {
        for x in margin..a.width() - margin {
            let pa = a.pixel(x, y).unwrap();
            let pb = b.pixel(x, y).unwrap();
            for (va, vb) in pa.iter().zip(pb) {
                worst = worst.max(va.abs_diff(*vb));
            }
        }
    }
    worst
}

#[test]
fn forward_then_inverse_reproduces_smooth_image() {
    let src = gradient(80, 80);
    let cfg = WarpConfig::default();
    let transforms = [
        Homography::rigid(10.0, 39.5, 39.5, 0.0, 0.0),
        Homography::rigid(-25.0, 39.5, 39.5, 2.5, -1.5),
        Homography::from_rows([[1.05, 0.02, -1.0], [0.01, 0.97, 0.5], [2e-4, 1e-4, 1.0]]),
    ];

    for h in transforms {
        let inv = h.try_inverse().unwrap();
        let forward = warp_perspective(src.view(), &h, 80, 80, &cfg).unwrap();
        let back = warp_perspective(forward.view(), &inv, 80, 80, &cfg).unwrap();
        assert!(max_interior_diff(&src, &back, 20) <= 2);
    }
}

#[test]
fn integer_translation_round_trip_is_exact() {
    let src = textured(48, 40);
    let h = Homography::translation(5.0, -3.0);
    let inv = h.try_inverse().unwrap();
    for interpolation in [Interpolation::Bilinear, Interpolation::Nearest] {
        let cfg = WarpConfig {
            interpolation,
            ..WarpConfig::default()
        };
        let forward = warp_perspective(src.view(), &h, 48, 40, &cfg).unwrap();
        let back = warp_perspective(forward.view(), &inv, 48, 40, &cfg).unwrap();
        assert_eq!(max_interior_diff(&src, &back, 6), 0);
        assert_eq!(back.channels(), 3);
    }
}

#[test]
fn uncovered_pixels_take_the_background_value() {
    let src = OwnedImage::filled(10, 10, 1, 200).unwrap();
    let cfg = WarpConfig {
        background: 7,
        ..WarpConfig::default()
    };
    let out = warp_perspective(src.view(), &Homography::translation(30.0, 0.0), 10, 10, &cfg)
        .unwrap();
    assert!(out.data().iter().all(|&v| v == 7));
}

#[test]
fn singular_homography_is_a_configuration_error() {
    let src = gradient(8, 8);
    let h = Homography::from_rows([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0], [0.0, 0.0, 1.0]]);
    let err = warp_perspective(src.view(), &h, 8, 8, &WarpConfig::default()).unwrap_err();
    assert!(matches!(err, AlignError::ConfigurationError { .. }));
}
