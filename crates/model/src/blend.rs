//! Straight-alpha blending on 16-bit pixels.
//!
//! All arithmetic runs in `f32` on normalized channels and is rounded back
//! with [`round_half_up`], so identical inputs always produce identical bytes.

use crate::color::round_half_up;

const MAX: f32 = 65_535.0;

/// Paints `src` over `dst`; `weight` scales the source alpha (layer opacity or
/// brush stamp alpha).
pub fn source_over(dst: &mut [u16; 4], src: [u16; 4], weight: f32) {
    let src_alpha = f32::from(src[3]) / MAX * weight.clamp(0.0, 1.0);
    if src_alpha <= 0.0 {
        return;
    }
    let dst_alpha = f32::from(dst[3]) / MAX;
    let dst_weight = dst_alpha * (1.0 - src_alpha);
    let out_alpha = src_alpha + dst_weight;
    if out_alpha <= 0.0 {
        return;
    }
    for channel in 0..3 {
        let blended = (f32::from(src[channel]) * src_alpha + f32::from(dst[channel]) * dst_weight)
            / out_alpha;
        dst[channel] = round_half_up(blended);
    }
    dst[3] = round_half_up(out_alpha * MAX);
}

/// Removes `weight` of the destination coverage. Color channels are kept
/// unless coverage reaches zero, in which case the pixel is cleared.
pub fn destination_out(dst: &mut [u16; 4], weight: f32) {
    let weight = weight.clamp(0.0, 1.0);
    if weight <= 0.0 {
        return;
    }
    let dst_alpha = f32::from(dst[3]) / MAX;
    let out_alpha = round_half_up(dst_alpha * (1.0 - weight) * MAX);
    if out_alpha == 0 {
        *dst = [0; 4];
    } else {
        dst[3] = out_alpha;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_source_replaces_destination() {
        let mut dst = [10, 20, 30, 65_535];
        source_over(&mut dst, [65_535, 0, 0, 65_535], 1.0);
        assert_eq!(dst, [65_535, 0, 0, 65_535]);
    }

    #[test]
    fn half_weight_over_transparent_keeps_color_and_halves_alpha() {
        let mut dst = [0; 4];
        source_over(&mut dst, [65_535, 0, 0, 65_535], 0.5);
        assert_eq!(dst, [65_535, 0, 0, 32_768]);
    }

    #[test]
    fn zero_weight_is_noop() {
        let mut dst = [1, 2, 3, 4];
        source_over(&mut dst, [65_535, 65_535, 65_535, 65_535], 0.0);
        destination_out(&mut dst, 0.0);
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn full_destination_out_clears_pixel() {
        let mut dst = [500, 600, 700, 65_535];
        destination_out(&mut dst, 1.0);
        assert_eq!(dst, [0; 4]);
    }

    #[test]
    fn partial_destination_out_keeps_color() {
        let mut dst = [500, 600, 700, 65_535];
        destination_out(&mut dst, 0.25);
        assert_eq!(dst, [500, 600, 700, 49_151]);
    }
}
