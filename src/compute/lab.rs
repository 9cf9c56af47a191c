//! sRGB to CIE L*a*b* conversion (D65 white point).

use crate::schema::Color;

// sRGB (linear) to XYZ matrix, D65 illuminant
const RGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.412_456_4, 0.357_576_1, 0.180_437_5],
    [0.212_672_9, 0.715_152_2, 0.072_175_0],
    [0.019_333_9, 0.119_192_0, 0.950_304_1],
];

// D65 reference white
const X_N: f32 = 0.950_47;
const Y_N: f32 = 1.0;
const Z_N: f32 = 1.088_83;

// (6/29)^3
const EPSILON: f32 = 216.0 / 24389.0;
// (29/3)^3
const KAPPA: f32 = 24389.0 / 27.0;

/// A color in CIE L*a*b* space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LabColor {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

impl LabColor {
    /// Convert an 8-bit sRGB color. Alpha is ignored.
    pub fn from_color(color: Color) -> Self {
        let r = srgb_to_linear(color.r as f32 / 255.0);
        let g = srgb_to_linear(color.g as f32 / 255.0);
        let b = srgb_to_linear(color.b as f32 / 255.0);

        let x = RGB_TO_XYZ[0][0] * r + RGB_TO_XYZ[0][1] * g + RGB_TO_XYZ[0][2] * b;
        let y = RGB_TO_XYZ[1][0] * r + RGB_TO_XYZ[1][1] * g + RGB_TO_XYZ[1][2] * b;
        let z = RGB_TO_XYZ[2][0] * r + RGB_TO_XYZ[2][1] * g + RGB_TO_XYZ[2][2] * b;

        let fx = lab_f(x / X_N);
        let fy = lab_f(y / Y_N);
        let fz = lab_f(z / Z_N);

        Self {
            l: 116.0 * fy - 16.0,
            a: 500.0 * (fx - fy),
            b: 200.0 * (fy - fz),
        }
    }

    /// Euclidean (CIE76) distance.
    #[inline]
    pub fn distance(&self, other: &LabColor) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        (dl * dl + da * da + db * db).sqrt()
    }
}

/// Convert sRGB value (0-1) to linear RGB
#[inline]
pub fn srgb_to_linear(srgb: f32) -> f32 {
    if srgb <= 0.04045 {
        srgb / 12.92
    } else {
        ((srgb + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        (KAPPA * t + 16.0) / 116.0
    }
}
