//! RGB and CSS color notation converted to the protocol's HSB model.

use thiserror::Error;

use crate::protocol::Hsb;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("unrecognised color {0:?}")]
    Unknown(String),
    #[error("invalid color component {0:?}")]
    Component(String),
}

/// Converts 8-bit RGB to HSB. An alpha value, when given, is used as the
/// brightness.
pub fn rgb_to_hsb(r: u8, g: u8, b: u8, alpha: Option<f64>) -> Hsb {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max } else { 0.0 };
    let brightness = alpha.unwrap_or(max / 255.0);

    let hue = if delta == 0.0 {
        0.0
    } else if rf == max {
        60.0 * ((gf - bf) / delta)
    } else if gf == max {
        60.0 * ((bf - rf) / delta) + 120.0
    } else {
        60.0 * ((rf - gf) / delta) + 240.0
    };
    let hue = (if hue < 0.0 { hue + 360.0 } else { hue }) / 360.0;

    Hsb {
        hue,
        saturation,
        brightness,
    }
}

/// Parses a CSS color name, `#rrggbb`, `#rgb`, `rgb(r, g, b)` or
/// `rgba(r, g, b, a)`.
pub fn css_to_hsb(css: &str) -> Result<Hsb, ColorError> {
    let css = css.trim().to_ascii_lowercase();

    if let Some([r, g, b]) = named(&css) {
        return Ok(rgb_to_hsb(r, g, b, None));
    }

    if let Some(hex) = css.strip_prefix('#') {
        let [r, g, b] = parse_hex(hex).ok_or_else(|| ColorError::Unknown(css.clone()))?;
        return Ok(rgb_to_hsb(r, g, b, None));
    }

    let args = css
        .strip_prefix("rgba(")
        .or_else(|| css.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| ColorError::Unknown(css.clone()))?;

    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return Err(ColorError::Unknown(css.clone()));
    }

    let mut rgb = [0u8; 3];
    for (channel, part) in rgb.iter_mut().zip(&parts) {
        *channel = part
            .parse::<u8>()
            .map_err(|_| ColorError::Component(part.to_string()))?;
    }

    let alpha = match parts.get(3) {
        Some(part) => {
            let alpha = part
                .parse::<f64>()
                .map_err(|_| ColorError::Component(part.to_string()))?;
            if !(0.0..=1.0).contains(&alpha) {
                return Err(ColorError::Component(part.to_string()));
            }
            Some(alpha)
        }
        None => None,
    };

    Ok(rgb_to_hsb(rgb[0], rgb[1], rgb[2], alpha))
}

fn parse_hex(hex: &str) -> Option<[u8; 3]> {
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => Some([
            u8::from_str_radix(&hex[0..2], 16).ok()?,
            u8::from_str_radix(&hex[2..4], 16).ok()?,
            u8::from_str_radix(&hex[4..6], 16).ok()?,
        ]),
        3 => {
            let mut rgb = [0u8; 3];
            for (channel, digit) in rgb.iter_mut().zip(hex.chars()) {
                let value = digit.to_digit(16)? as u8;
                *channel = value * 17;
            }
            Some(rgb)
        }
        _ => None,
    }
}

pub fn named(name: &str) -> Option<[u8; 3]> {
    CSS_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, rgb)| *rgb)
}

static CSS_COLORS: &[(&str, [u8; 3])] = &[
    ("aliceblue", [240, 248, 255]),
    ("antiquewhite", [250, 235, 215]),
    ("aqua", [0, 255, 255]),
    ("aquamarine", [127, 255, 212]),
    ("azure", [240, 255, 255]),
    ("beige", [245, 245, 220]),
    ("bisque", [255, 228, 196]),
    ("black", [0, 0, 0]),
    ("blanchedalmond", [255, 235, 205]),
    ("blue", [0, 0, 255]),
    ("blueviolet", [138, 43, 226]),
    ("brown", [165, 42, 42]),
    ("burlywood", [222, 184, 135]),
    ("cadetblue", [95, 158, 160]),
    ("chartreuse", [127, 255, 0]),
    ("chocolate", [210, 105, 30]),
    ("coral", [255, 127, 80]),
    ("cornflowerblue", [100, 149, 237]),
    ("cornsilk", [255, 248, 220]),
    ("crimson", [220, 20, 60]),
    ("cyan", [0, 255, 255]),
    ("darkblue", [0, 0, 139]),
    ("darkcyan", [0, 139, 139]),
    ("darkgoldenrod", [184, 134, 11]),
    ("darkgray", [169, 169, 169]),
    ("darkgreen", [0, 100, 0]),
    ("darkgrey", [169, 169, 169]),
    ("darkkhaki", [189, 183, 107]),
    ("darkmagenta", [139, 0, 139]),
    ("darkolivegreen", [85, 107, 47]),
    ("darkorange", [255, 140, 0]),
    ("darkorchid", [153, 50, 204]),
    ("darkred", [139, 0, 0]),
    ("darksalmon", [233, 150, 122]),
    ("darkseagreen", [143, 188, 143]),
    ("darkslateblue", [72, 61, 139]),
    ("darkslategray", [47, 79, 79]),
    ("darkslategrey", [47, 79, 79]),
    ("darkturquoise", [0, 206, 209]),
    ("darkviolet", [148, 0, 211]),
    ("deeppink", [255, 20, 147]),
    ("deepskyblue", [0, 191, 255]),
    ("dimgray", [105, 105, 105]),
    ("dimgrey", [105, 105, 105]),
    ("dodgerblue", [30, 144, 255]),
    ("firebrick", [178, 34, 34]),
    ("floralwhite", [255, 250, 240]),
    ("forestgreen", [34, 139, 34]),
    ("fuchsia", [255, 0, 255]),
    ("gainsboro", [220, 220, 220]),
    ("ghostwhite", [248, 248, 255]),
    ("gold", [255, 215, 0]),
    ("goldenrod", [218, 165, 32]),
    ("gray", [128, 128, 128]),
    ("green", [0, 128, 0]),
    ("greenyellow", [173, 255, 47]),
    ("grey", [128, 128, 128]),
    ("honeydew", [240, 255, 240]),
    ("hotpink", [255, 105, 180]),
    ("indianred", [205, 92, 92]),
    ("indigo", [75, 0, 130]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("lavender", [230, 230, 250]),
    ("lavenderblush", [255, 240, 245]),
    ("lawngreen", [124, 252, 0]),
    ("lemonchiffon", [255, 250, 205]),
    ("lightblue", [173, 216, 230]),
    ("lightcoral", [240, 128, 128]),
    ("lightcyan", [224, 255, 255]),
    ("lightgoldenrodyellow", [250, 250, 210]),
    ("lightgray", [211, 211, 211]),
    ("lightgreen", [144, 238, 144]),
    ("lightgrey", [211, 211, 211]),
    ("lightpink", [255, 182, 193]),
    ("lightsalmon", [255, 160, 122]),
    ("lightseagreen", [32, 178, 170]),
    ("lightskyblue", [135, 206, 250]),
    ("lightslategray", [119, 136, 153]),
    ("lightslategrey", [119, 136, 153]),
    ("lightsteelblue", [176, 196, 222]),
    ("lightyellow", [255, 255, 224]),
    ("lime", [0, 255, 0]),
    ("limegreen", [50, 205, 50]),
    ("linen", [250, 240, 230]),
    ("magenta", [255, 0, 255]),
    ("maroon", [128, 0, 0]),
    ("mediumaquamarine", [102, 205, 170]),
    ("mediumblue", [0, 0, 205]),
    ("mediumorchid", [186, 85, 211]),
    ("mediumpurple", [147, 112, 219]),
    ("mediumseagreen", [60, 179, 113]),
    ("mediumslateblue", [123, 104, 238]),
    ("mediumspringgreen", [0, 250, 154]),
    ("mediumturquoise", [72, 209, 204]),
    ("mediumvioletred", [199, 21, 133]),
    ("midnightblue", [25, 25, 112]),
    ("mintcream", [245, 255, 250]),
    ("mistyrose", [255, 228, 225]),
    ("moccasin", [255, 228, 181]),
    ("navajowhite", [255, 222, 173]),
    ("navy", [0, 0, 128]),
    ("oldlace", [253, 245, 230]),
    ("olive", [128, 128, 0]),
    ("olivedrab", [107, 142, 35]),
    ("orange", [255, 165, 0]),
    ("orangered", [255, 69, 0]),
    ("orchid", [218, 112, 214]),
    ("palegoldenrod", [238, 232, 170]),
    ("palegreen", [152, 251, 152]),
    ("paleturquoise", [175, 238, 238]),
    ("palevioletred", [219, 112, 147]),
    ("papayawhip", [255, 239, 213]),
    ("peachpuff", [255, 218, 185]),
    ("peru", [205, 133, 63]),
    ("pink", [255, 192, 203]),
    ("plum", [221, 160, 221]),
    ("powderblue", [176, 224, 230]),
    ("purple", [128, 0, 128]),
    ("rebeccapurple", [102, 51, 153]),
    ("red", [255, 0, 0]),
    ("rosybrown", [188, 143, 143]),
    ("royalblue", [65, 105, 225]),
    ("saddlebrown", [139, 69, 19]),
    ("salmon", [250, 128, 114]),
    ("sandybrown", [244, 164, 96]),
    ("seagreen", [46, 139, 87]),
    ("seashell", [255, 245, 238]),
    ("sienna", [160, 82, 45]),
    ("silver", [192, 192, 192]),
    ("skyblue", [135, 206, 235]),
    ("slateblue", [106, 90, 205]),
    ("slategray", [112, 128, 144]),
    ("slategrey", [112, 128, 144]),
    ("snow", [255, 250, 250]),
    ("springgreen", [0, 255, 127]),
    ("steelblue", [70, 130, 180]),
    ("tan", [210, 180, 140]),
    ("teal", [0, 128, 128]),
    ("thistle", [216, 191, 216]),
    ("tomato", [255, 99, 71]),
    ("turquoise", [64, 224, 208]),
    ("violet", [238, 130, 238]),
    ("wheat", [245, 222, 179]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [245, 245, 245]),
    ("yellow", [255, 255, 0]),
    ("yellowgreen", [154, 205, 50]),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_primary_colors() {
        let red = rgb_to_hsb(255, 0, 0, None);
        assert!(close(red.hue, 0.0) && close(red.saturation, 1.0) && close(red.brightness, 1.0));

        let green = rgb_to_hsb(0, 255, 0, None);
        assert!(close(green.hue, 1.0 / 3.0));

        let blue = rgb_to_hsb(0, 0, 255, None);
        assert!(close(blue.hue, 2.0 / 3.0));

        let magenta = rgb_to_hsb(255, 0, 128, None);
        assert!(magenta.hue > 0.9 && magenta.hue < 1.0);
    }

    #[test]
    fn test_grey_has_no_hue() {
        let grey = rgb_to_hsb(128, 128, 128, None);
        assert_eq!(grey.hue, 0.0);
        assert_eq!(grey.saturation, 0.0);
        assert!(close(grey.brightness, 128.0 / 255.0));
        assert_eq!(rgb_to_hsb(0, 0, 0, None).saturation, 0.0);
    }

    #[test]
    fn test_alpha_overrides_brightness() {
        let dim = rgb_to_hsb(255, 0, 0, Some(0.25));
        assert!(close(dim.brightness, 0.25));
    }

    #[test]
    fn test_css_forms_agree() {
        let expected = rgb_to_hsb(255, 165, 0, None);
        assert_eq!(css_to_hsb("orange").unwrap(), expected);
        assert_eq!(css_to_hsb("  Orange ").unwrap(), expected);
        assert_eq!(css_to_hsb("#ffa500").unwrap(), expected);
        assert_eq!(css_to_hsb("rgb(255, 165, 0)").unwrap(), expected);
        assert_eq!(css_to_hsb("#f00").unwrap(), rgb_to_hsb(255, 0, 0, None));

        let faded = css_to_hsb("rgba(255,165,0,0.5)").unwrap();
        assert!(close(faded.brightness, 0.5));
    }

    #[test]
    fn test_css_rejects_garbage() {
        assert!(matches!(css_to_hsb("blurple"), Err(ColorError::Unknown(_))));
        assert!(matches!(css_to_hsb("#12345"), Err(ColorError::Unknown(_))));
        assert!(matches!(
            css_to_hsb("rgb(300, 0, 0)"),
            Err(ColorError::Component(_))
        ));
        assert!(matches!(
            css_to_hsb("rgba(1, 2, 3, 2)"),
            Err(ColorError::Component(_))
        ));
    }
}
