// UltraFace RFB-320 prior boxes and regression decoding
//
// The model emits offsets against a fixed set of 4420 anchor boxes laid out
// over four feature-map levels of the 320x240 input.

/// Prior box in center form, normalized to [0, 1]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Prior {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

const IMAGE_W: f32 = 320.0;
const IMAGE_H: f32 = 240.0;

/// Per level: feature map (cols, rows), stride (x, y), box sizes in pixels
const LEVELS: [((usize, usize), (f32, f32), &[f32]); 4] = [
    ((40, 30), (8.0, 8.0), &[10.0, 16.0, 24.0]),
    ((20, 15), (16.0, 16.0), &[32.0, 48.0]),
    ((10, 8), (32.0, 30.0), &[64.0, 96.0]),
    ((5, 4), (64.0, 60.0), &[128.0, 192.0, 256.0]),
];

/// Number of priors the RFB-320 model emits
pub(crate) const PRIOR_COUNT: usize = 4420;

/// Generate the full prior set in model output order
pub(crate) fn ultraface_priors() -> Vec<Prior> {
    let mut priors = Vec::with_capacity(PRIOR_COUNT);

    for &((cols, rows), (stride_x, stride_y), sizes) in &LEVELS {
        for j in 0..rows {
            for i in 0..cols {
                // Cell center, normalized to the input frame
                let cx = ((i as f32 + 0.5) * stride_x / IMAGE_W).clamp(0.0, 1.0);
                let cy = ((j as f32 + 0.5) * stride_y / IMAGE_H).clamp(0.0, 1.0);

                for &size in sizes {
                    priors.push(Prior {
                        cx,
                        cy,
                        w: (size / IMAGE_W).clamp(0.0, 1.0),
                        h: (size / IMAGE_H).clamp(0.0, 1.0),
                    });
                }
            }
        }
    }

    assert_eq!(priors.len(), PRIOR_COUNT);
    priors
}

/// Decode location regression outputs into corner-form boxes
///
/// Offsets move and scale the matching prior:
/// `center = prior_center + d * center_variance * prior_size` and
/// `size = prior_size * exp(d * size_variance)`.
pub(crate) fn decode(
    locations: &[f32],
    priors: &[Prior],
    center_variance: f32,
    size_variance: f32,
) -> Vec<[f32; 4]> {
    assert_eq!(
        locations.len(),
        priors.len() * 4,
        "location data size mismatch"
    );

    priors
        .iter()
        .enumerate()
        .map(|(i, prior)| {
            let dx = locations[i * 4];
            let dy = locations[i * 4 + 1];
            let dw = locations[i * 4 + 2];
            let dh = locations[i * 4 + 3];

            let cx = prior.cx + dx * center_variance * prior.w;
            let cy = prior.cy + dy * center_variance * prior.h;
            let w = prior.w * (dw * size_variance).exp();
            let h = prior.h * (dh * size_variance).exp();

            [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
        })
        .collect()
}
