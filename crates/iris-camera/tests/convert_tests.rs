use iris_camera::convert::decode;
use iris_camera::format::PixelEncoding;
use iris_camera::sys;

const ENCODINGS: [PixelEncoding; 4] = [
    PixelEncoding::Nv12,
    PixelEncoding::Nv21,
    PixelEncoding::Uyvy,
    PixelEncoding::Yuyv,
];

/// Build a single-plane buffer with uniform luma and chroma for the
/// given encoding.
fn uniform_buffer(encoding: PixelEncoding, w: usize, h: usize, y: u8, uv: u8) -> Vec<u8> {
    match encoding {
        PixelEncoding::Nv12 | PixelEncoding::Nv21 => {
            let mut data = vec![y; w * h];
            data.extend(std::iter::repeat(uv).take(w * h / 2));
            data
        }
        PixelEncoding::Uyvy | PixelEncoding::Yuyv => {
            let mut data = Vec::with_capacity(w * h * 2);
            for _ in 0..w * h / 2 {
                // One macropixel: both byte orders are uniform here.
                if encoding == PixelEncoding::Yuyv {
                    data.extend_from_slice(&[y, uv, y, uv]);
                } else {
                    data.extend_from_slice(&[uv, y, uv, y]);
                }
            }
            data
        }
        PixelEncoding::Unknown(_) => vec![y; w * h],
    }
}

#[test]
fn test_pure_black_nv12_4x2() {
    // Y=16 and U=V=128 is pure black after the integer transform.
    let luma = [16u8; 8];
    let chroma = [128u8; 4];
    let frame = decode(PixelEncoding::Nv12, &[&luma, &chroma], 4, 2);

    assert_eq!(frame.data().len(), 4 * 2 * 3);
    for y in 0..2 {
        for x in 0..4 {
            assert_eq!(frame.pixel(x, y), (0, 0, 0));
        }
    }
}

#[test]
fn test_uniform_input_gives_uniform_output() {
    // Zero luma with mid-level chroma: every pixel decodes to the
    // same near-black gray, whatever the encoding.
    for encoding in ENCODINGS {
        let data = uniform_buffer(encoding, 8, 4, 0, 128);
        let frame = decode(encoding, &[&data], 8, 4);
        let first = frame.pixel(0, 0);
        for y in 0..4 {
            for x in 0..8 {
                assert_eq!(frame.pixel(x, y), first, "{encoding}: pixel ({x},{y})");
            }
        }
    }
}

#[test]
fn test_semi_planar_multi_planar_matches_single_plane() {
    let w = 6usize;
    let h = 4usize;
    let luma: Vec<u8> = (0..w * h).map(|i| (40 + i * 3) as u8).collect();
    let chroma: Vec<u8> = (0..w * h / 2).map(|i| (100 + i * 5) as u8).collect();

    let mut packed = luma.clone();
    packed.extend_from_slice(&chroma);

    for encoding in [PixelEncoding::Nv12, PixelEncoding::Nv21] {
        let multi = decode(encoding, &[&luma, &chroma], w as u32, h as u32);
        let single = decode(encoding, &[&packed], w as u32, h as u32);
        assert_eq!(multi.data(), single.data(), "{encoding}");
    }
}

#[test]
fn test_nv12_nv21_swap_chroma_channels() {
    // Distinct U and V: the two variants must disagree unless chroma
    // is symmetric.
    let luma = [128u8; 4];
    let chroma = [64u8, 192u8];
    let nv12 = decode(PixelEncoding::Nv12, &[&luma, &chroma], 2, 2);
    let nv21 = decode(PixelEncoding::Nv21, &[&luma, &chroma], 2, 2);
    assert_ne!(nv12.data(), nv21.data());

    // NV12 reads U first: U=64 pushes blue down, V=192 pushes red up.
    let (r, _g, b) = nv12.pixel(0, 0);
    assert!(r > b, "expected red-dominant pixel, got r={r} b={b}");
}

#[test]
fn test_yuyv_uyvy_byte_orders_agree() {
    // The same logical pixels expressed in both packed orders decode
    // identically.
    let w = 4u32;
    let h = 2u32;
    let (y0, u, y1, v) = (90u8, 50u8, 160u8, 200u8);
    let yuyv: Vec<u8> = (0..4).flat_map(|_| [y0, u, y1, v]).collect();
    let uyvy: Vec<u8> = (0..4).flat_map(|_| [u, y0, v, y1]).collect();

    let a = decode(PixelEncoding::Yuyv, &[&yuyv], w, h);
    let b = decode(PixelEncoding::Uyvy, &[&uyvy], w, h);
    assert_eq!(a.data(), b.data());

    // Neighbouring pixels share chroma but keep their own luma.
    assert_ne!(a.pixel(0, 0), a.pixel(1, 0));
}

#[test]
fn test_output_dimensions_for_every_branch() {
    let cases: Vec<(PixelEncoding, Vec<u8>)> = vec![
        (PixelEncoding::Nv12, uniform_buffer(PixelEncoding::Nv12, 6, 4, 80, 128)),
        (PixelEncoding::Nv21, uniform_buffer(PixelEncoding::Nv21, 6, 4, 80, 128)),
        (PixelEncoding::Uyvy, uniform_buffer(PixelEncoding::Uyvy, 6, 4, 80, 128)),
        (PixelEncoding::Yuyv, uniform_buffer(PixelEncoding::Yuyv, 6, 4, 80, 128)),
        // Grayscale fallback branch.
        (PixelEncoding::Unknown(sys::fourcc(b"MJPG")), vec![9u8; 6 * 4]),
        // Truncated input still falls back to a full-size image.
        (PixelEncoding::Nv12, vec![7u8; 5]),
        (PixelEncoding::Yuyv, vec![7u8; 5]),
    ];
    for (encoding, data) in cases {
        let frame = decode(encoding, &[&data], 6, 4);
        assert_eq!(frame.width(), 6);
        assert_eq!(frame.height(), 4);
        assert_eq!(frame.data().len(), 6 * 4 * 3, "{encoding}");
    }
}

#[test]
fn test_grayscale_fallback_replicates_luma() {
    let data: Vec<u8> = (0..12u8).collect();
    let frame = decode(PixelEncoding::Unknown(0), &[&data], 4, 3);
    for (i, px) in data.iter().enumerate() {
        let (x, y) = ((i % 4) as u32, (i / 4) as u32);
        assert_eq!(frame.pixel(x, y), (*px, *px, *px));
    }
}

#[test]
fn test_empty_planes_render_black() {
    let frame = decode(PixelEncoding::Nv12, &[], 4, 4);
    assert_eq!(frame.data().len(), 4 * 4 * 3);
    assert!(frame.data().iter().all(|&b| b == 0));
}

#[test]
fn test_odd_width_semi_planar_falls_back() {
    // Chroma pairs cover two columns; an odd width would run the last
    // column past the row. Must degrade to a full-size grayscale
    // frame, never index out of range.
    let luma = [40u8, 80, 120, 40, 80, 120];
    let chroma = [90u8, 200, 90];
    for encoding in [PixelEncoding::Nv12, PixelEncoding::Nv21] {
        let frame = decode(encoding, &[&luma, &chroma], 3, 2);
        assert_eq!(frame.data().len(), 3 * 2 * 3, "{encoding}");
        assert_eq!(frame.pixel(0, 0), (40, 40, 40));
        assert_eq!(frame.pixel(2, 1), (120, 120, 120));
    }
}

#[test]
fn test_odd_width_packed_falls_back() {
    // Packed macropixels need an even width; odd geometry must still
    // produce a full-size frame.
    let data = vec![100u8; 5 * 3 * 2];
    let frame = decode(PixelEncoding::Yuyv, &[&data], 5, 3);
    assert_eq!(frame.data().len(), 5 * 3 * 3);
    assert_eq!(frame.pixel(0, 0), (100, 100, 100));
}
