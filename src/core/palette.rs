//! NDVI colour ramp for external renderers (soil → canopy)

/// Lower bound of the display stretch
pub const DISPLAY_MIN: f32 = -0.2;
/// Upper bound of the display stretch
pub const DISPLAY_MAX: f32 = 0.8;

/// Breakpoint: values at or above `threshold` take `color` until the next entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteStop {
    pub threshold: f32,
    pub color: &'static str,
}

/// Ordered by ascending threshold
pub const NDVI_PALETTE: [PaletteStop; 11] = [
    PaletteStop { threshold: -0.20, color: "#d73027" },
    PaletteStop { threshold: -0.10, color: "#f46d43" },
    PaletteStop { threshold: 0.00, color: "#fdae61" },
    PaletteStop { threshold: 0.05, color: "#fee08b" },
    PaletteStop { threshold: 0.15, color: "#d9ef8b" },
    PaletteStop { threshold: 0.25, color: "#a6d96a" },
    PaletteStop { threshold: 0.35, color: "#6ebe55" },
    PaletteStop { threshold: 0.45, color: "#4daf4a" },
    PaletteStop { threshold: 0.55, color: "#1a9850" },
    PaletteStop { threshold: 0.70, color: "#006837" },
    PaletteStop { threshold: 0.85, color: "#004529" },
];

/// Colour for an NDVI value; values below the first stop clamp to it,
/// absent values have no colour.
pub fn color_for(value: Option<f32>) -> Option<&'static str> {
    let value = value.filter(|v| v.is_finite())?;
    let stop = NDVI_PALETTE
        .iter()
        .rev()
        .find(|stop| value >= stop.threshold)
        .unwrap_or(&NDVI_PALETTE[0]);
    Some(stop.color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_is_ordered() {
        assert!(NDVI_PALETTE.windows(2).all(|w| w[0].threshold < w[1].threshold));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(color_for(Some(-0.9)), Some("#d73027"));
        assert_eq!(color_for(Some(0.0)), Some("#fdae61"));
        assert_eq!(color_for(Some(0.5)), Some("#4daf4a"));
        assert_eq!(color_for(Some(0.99)), Some("#004529"));
        assert_eq!(color_for(None), None);
        assert_eq!(color_for(Some(f32::NAN)), None);
    }
}
