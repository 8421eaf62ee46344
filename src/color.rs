// src/color.rs
// User color text -> normalized sRGB triple, and the per-draw device color derived from it.
use std::fmt;

use bevy_color::palettes::css;
use bevy_color::{Alpha, Color, ColorToComponents, LinearRgba, Srgba};

use crate::error::{SynapseError, SynapseResult};

/// Base color of one network generation, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCoords(pub [f32; 3]);

impl ColorCoords {
    pub const BLACK: Self = Self([0.0, 0.0, 0.0]);

    pub fn new(red: f32, green: f32, blue: f32) -> Self {
        Self([red, green, blue].map(|c| if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 }))
    }

    pub fn channels(&self) -> [f32; 3] {
        self.0
    }

    /// Device color at `alpha_pct` percent opacity (100 = opaque).
    pub fn device_color(&self, alpha_pct: f32) -> DeviceColor {
        let [r, g, b] = self.0;
        DeviceColor {
            red: r * 255.0,
            green: g * 255.0,
            blue: b * 255.0,
            alpha: (alpha_pct / 100.0).clamp(0.0, 1.0),
        }
    }
}

impl Default for ColorCoords {
    fn default() -> Self {
        Self::BLACK
    }
}

impl From<Srgba> for ColorCoords {
    fn from(srgba: Srgba) -> Self {
        Self::new(srgba.red, srgba.green, srgba.blue)
    }
}

/// A concrete stroke/fill color: channels in `0..=255`, alpha in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceColor {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
    pub alpha: f32,
}

impl DeviceColor {
    pub const TRANSPARENT: Self = Self { red: 0.0, green: 0.0, blue: 0.0, alpha: 0.0 };

    pub fn with_alpha_scaled(self, factor: f32) -> Self {
        Self { alpha: (self.alpha * factor).clamp(0.0, 1.0), ..self }
    }

    pub fn to_linear_rgba(self) -> [f32; 4] {
        LinearRgba::from(Srgba::new(
            self.red / 255.0,
            self.green / 255.0,
            self.blue / 255.0,
            self.alpha,
        ))
        .to_f32_array()
    }
}

impl fmt::Display for DeviceColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgb({} {} {} / {}%)",
            self.red,
            self.green,
            self.blue,
            self.alpha * 100.0
        )
    }
}

/// Resolves user color text, falling back to black (with a warning) when it can't be parsed.
pub fn resolve_color(text: &str) -> ColorCoords {
    match parse_color(text) {
        Ok(coords) => coords,
        Err(e) => {
            log::warn!("synapse-bg couldn't parse '{}' as a color ({}), using fallback color", text, e);
            ColorCoords::BLACK
        }
    }
}

/// Parses hex, named and functional (`rgb`, `hsl`, `hwb`, `lab`, `lch`, `oklab`, `oklch`) colors.
pub fn parse_color(text: &str) -> SynapseResult<ColorCoords> {
    let text = text.trim().to_ascii_lowercase();
    if text.is_empty() {
        return Err(SynapseError::color("empty color string"));
    }

    if let Some(hex) = text.strip_prefix('#') {
        return Srgba::hex(hex)
            .map(ColorCoords::from)
            .map_err(|e| SynapseError::color(format!("bad hex color '{text}': {e:?}")));
    }

    if let Some(open) = text.find('(') {
        let name = text[..open].trim();
        let body = text[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| SynapseError::color(format!("unterminated color function '{text}'")))?;
        return parse_function(name, body);
    }

    named_color(&text)
        .map(ColorCoords::from)
        .ok_or_else(|| SynapseError::color(format!("unknown color name '{text}'")))
}

/// CSS Color 4 named colors, plus `transparent` (black at zero alpha).
fn named_color(name: &str) -> Option<Srgba> {
    let srgba = match name {
        "aliceblue" => css::ALICE_BLUE,
        "antiquewhite" => css::ANTIQUE_WHITE,
        "aqua" => css::AQUA,
        "aquamarine" => css::AQUAMARINE,
        "azure" => css::AZURE,
        "beige" => css::BEIGE,
        "bisque" => css::BISQUE,
        "black" => css::BLACK,
        "blanchedalmond" => css::BLANCHED_ALMOND,
        "blue" => css::BLUE,
        "blueviolet" => css::BLUE_VIOLET,
        "brown" => css::BROWN,
        "burlywood" => css::BURLYWOOD,
        "cadetblue" => css::CADET_BLUE,
        "chartreuse" => css::CHARTREUSE,
        "chocolate" => css::CHOCOLATE,
        "coral" => css::CORAL,
        "cornflowerblue" => css::CORNFLOWER_BLUE,
        "cornsilk" => css::CORNSILK,
        "crimson" => css::CRIMSON,
        "cyan" => css::AQUA,
        "darkblue" => css::DARK_BLUE,
        "darkcyan" => css::DARK_CYAN,
        "darkgoldenrod" => css::DARK_GOLDENROD,
        "darkgray" => css::DARK_GRAY,
        "darkgreen" => css::DARK_GREEN,
        "darkgrey" => css::DARK_GREY,
        "darkkhaki" => css::DARK_KHAKI,
        "darkmagenta" => css::DARK_MAGENTA,
        "darkolivegreen" => css::DARK_OLIVEGREEN,
        "darkorange" => css::DARK_ORANGE,
        "darkorchid" => css::DARK_ORCHID,
        "darkred" => css::DARK_RED,
        "darksalmon" => css::DARK_SALMON,
        "darkseagreen" => css::DARK_SEA_GREEN,
        "darkslateblue" => css::DARK_SLATE_BLUE,
        "darkslategray" => css::DARK_SLATE_GRAY,
        "darkslategrey" => css::DARK_SLATE_GREY,
        "darkturquoise" => css::DARK_TURQUOISE,
        "darkviolet" => css::DARK_VIOLET,
        "deeppink" => css::DEEP_PINK,
        "deepskyblue" => css::DEEP_SKY_BLUE,
        "dimgray" => css::DIM_GRAY,
        "dimgrey" => css::DIM_GREY,
        "dodgerblue" => css::DODGER_BLUE,
        "firebrick" => css::FIRE_BRICK,
        "floralwhite" => css::FLORAL_WHITE,
        "forestgreen" => css::FOREST_GREEN,
        "fuchsia" => css::FUCHSIA,
        "gainsboro" => css::GAINSBORO,
        "ghostwhite" => css::GHOST_WHITE,
        "gold" => css::GOLD,
        "goldenrod" => css::GOLDENROD,
        "gray" => css::GRAY,
        "green" => css::GREEN,
        "greenyellow" => css::GREEN_YELLOW,
        "grey" => css::GREY,
        "honeydew" => css::HONEYDEW,
        "hotpink" => css::HOT_PINK,
        "indianred" => css::INDIAN_RED,
        "indigo" => css::INDIGO,
        "ivory" => css::IVORY,
        "khaki" => css::KHAKI,
        "lavender" => css::LAVENDER,
        "lavenderblush" => css::LAVENDER_BLUSH,
        "lawngreen" => css::LAWN_GREEN,
        "lemonchiffon" => css::LEMON_CHIFFON,
        "lightblue" => css::LIGHT_BLUE,
        "lightcoral" => css::LIGHT_CORAL,
        "lightcyan" => css::LIGHT_CYAN,
        "lightgoldenrodyellow" => css::LIGHT_GOLDENROD_YELLOW,
        "lightgray" => css::LIGHT_GRAY,
        "lightgreen" => css::LIGHT_GREEN,
        "lightgrey" => css::LIGHT_GREY,
        "lightpink" => css::LIGHT_PINK,
        "lightsalmon" => css::LIGHT_SALMON,
        "lightseagreen" => css::LIGHT_SEA_GREEN,
        "lightskyblue" => css::LIGHT_SKY_BLUE,
        "lightslategray" => css::LIGHT_SLATE_GRAY,
        "lightslategrey" => css::LIGHT_SLATE_GREY,
        "lightsteelblue" => css::LIGHT_STEEL_BLUE,
        "lightyellow" => css::LIGHT_YELLOW,
        "lime" => css::LIME,
        "limegreen" => css::LIMEGREEN,
        "linen" => css::LINEN,
        "magenta" => css::MAGENTA,
        "maroon" => css::MAROON,
        "mediumaquamarine" => css::MEDIUM_AQUAMARINE,
        "mediumblue" => css::MEDIUM_BLUE,
        "mediumorchid" => css::MEDIUM_ORCHID,
        "mediumpurple" => css::MEDIUM_PURPLE,
        "mediumseagreen" => css::MEDIUM_SEA_GREEN,
        "mediumslateblue" => css::MEDIUM_SLATE_BLUE,
        "mediumspringgreen" => css::MEDIUM_SPRING_GREEN,
        "mediumturquoise" => css::MEDIUM_TURQUOISE,
        "mediumvioletred" => css::MEDIUM_VIOLET_RED,
        "midnightblue" => css::MIDNIGHT_BLUE,
        "mintcream" => css::MINT_CREAM,
        "mistyrose" => css::MISTY_ROSE,
        "moccasin" => css::MOCCASIN,
        "navajowhite" => css::NAVAJO_WHITE,
        "navy" => css::NAVY,
        "oldlace" => css::OLD_LACE,
        "olive" => css::OLIVE,
        "olivedrab" => css::OLIVE_DRAB,
        "orange" => css::ORANGE,
        "orangered" => css::ORANGE_RED,
        "orchid" => css::ORCHID,
        "palegoldenrod" => css::PALE_GOLDENROD,
        "palegreen" => css::PALE_GREEN,
        "paleturquoise" => css::PALE_TURQUOISE,
        "palevioletred" => css::PALE_VIOLETRED,
        "papayawhip" => css::PAPAYA_WHIP,
        "peachpuff" => css::PEACHPUFF,
        "peru" => css::PERU,
        "pink" => css::PINK,
        "plum" => css::PLUM,
        "powderblue" => css::POWDER_BLUE,
        "purple" => css::PURPLE,
        "rebeccapurple" => css::REBECCA_PURPLE,
        "red" => css::RED,
        "rosybrown" => css::ROSY_BROWN,
        "royalblue" => css::ROYAL_BLUE,
        "saddlebrown" => css::SADDLE_BROWN,
        "salmon" => css::SALMON,
        "sandybrown" => css::SANDY_BROWN,
        "seashell" => css::SEASHELL,
        "seagreen" => css::SEA_GREEN,
        "sienna" => css::SIENNA,
        "silver" => css::SILVER,
        "skyblue" => css::SKY_BLUE,
        "slateblue" => css::SLATE_BLUE,
        "slategray" => css::SLATE_GRAY,
        "slategrey" => css::SLATE_GREY,
        "snow" => css::SNOW,
        "springgreen" => css::SPRING_GREEN,
        "steelblue" => css::STEEL_BLUE,
        "tan" => css::TAN,
        "teal" => css::TEAL,
        "thistle" => css::THISTLE,
        "tomato" => css::TOMATO,
        "turquoise" => css::TURQUOISE,
        "violet" => css::VIOLET,
        "wheat" => css::WHEAT,
        "white" => css::WHITE,
        "whitesmoke" => css::WHITE_SMOKE,
        "yellow" => css::YELLOW,
        "yellowgreen" => css::YELLOW_GREEN,
        "transparent" => css::BLACK.with_alpha(0.0),
        _ => return None,
    };
    Some(srgba)
}

#[derive(Debug, Clone, Copy)]
struct Component {
    value: f32,
    percent: bool,
}

// Angle units, as multiples of one degree. `grad` must be tried before `rad`.
const HUE_UNITS: [(&str, f32); 4] = [
    ("deg", 1.0),
    ("grad", 0.9),
    ("rad", 180.0 / std::f32::consts::PI),
    ("turn", 360.0),
];

impl Component {
    fn parse(token: &str) -> SynapseResult<Self> {
        let (digits, percent, scale) = match token.strip_suffix('%') {
            Some(d) => (d, true, 1.0),
            None => HUE_UNITS
                .iter()
                .find_map(|&(unit, scale)| token.strip_suffix(unit).map(|d| (d, false, scale)))
                .unwrap_or((token, false, 1.0)),
        };
        let value: f32 = digits
            .parse()
            .map_err(|_| SynapseError::color(format!("bad color component '{token}'")))?;
        if !value.is_finite() {
            return Err(SynapseError::color(format!("non-finite color component '{token}'")));
        }
        Ok(Self { value: value * scale, percent })
    }

    // `number_scale` applies to bare numbers, `percent_range` is what 100% maps to.
    fn resolve(self, number_scale: f32, percent_range: f32) -> f32 {
        if self.percent {
            self.value / 100.0 * percent_range
        } else {
            self.value * number_scale
        }
    }
}

fn parse_function(name: &str, body: &str) -> SynapseResult<ColorCoords> {
    // Alpha after '/' (or a 4th legacy component) doesn't affect the base color.
    let channels = body.split('/').next().unwrap_or_default();
    let parts = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(Component::parse)
        .collect::<SynapseResult<Vec<_>>>()?;

    if parts.len() < 3 {
        return Err(SynapseError::color(format!(
            "{name}() needs three components, got {}",
            parts.len()
        )));
    }
    let (a, b, c) = (parts[0], parts[1], parts[2]);

    let color = match name {
        "rgb" | "rgba" => Color::srgb(
            a.resolve(1.0 / 255.0, 1.0),
            b.resolve(1.0 / 255.0, 1.0),
            c.resolve(1.0 / 255.0, 1.0),
        ),
        "hsl" | "hsla" => Color::hsl(a.value, b.resolve(0.01, 1.0), c.resolve(0.01, 1.0)),
        "hwb" => Color::hwb(a.value, b.resolve(0.01, 1.0), c.resolve(0.01, 1.0)),
        "lab" => Color::lab(a.resolve(0.01, 1.0), b.resolve(0.01, 1.25), c.resolve(0.01, 1.25)),
        "lch" => Color::lch(a.resolve(0.01, 1.0), b.resolve(0.01, 1.5), c.value),
        "oklab" => Color::oklab(a.resolve(1.0, 1.0), b.resolve(1.0, 0.4), c.resolve(1.0, 0.4)),
        "oklch" => Color::oklch(a.resolve(1.0, 1.0), b.resolve(1.0, 0.4), c.value),
        other => {
            return Err(SynapseError::color(format!("unsupported color function '{other}'")));
        }
    };

    Ok(ColorCoords::from(color.to_srgba()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: ColorCoords, expected: [f32; 3]) {
        for (a, e) in actual.channels().iter().zip(expected) {
            assert!((a - e).abs() < 0.01, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn hex_and_named_colors() {
        assert_close(parse_color("#ff0000").unwrap(), [1.0, 0.0, 0.0]);
        assert_close(parse_color("#0F0").unwrap(), [0.0, 1.0, 0.0]);
        assert_close(parse_color("  White ").unwrap(), [1.0, 1.0, 1.0]);
        assert_close(parse_color("navy").unwrap(), [0.0, 0.0, 128.0 / 255.0]);
    }

    #[test]
    fn extended_named_colors() {
        assert_close(parse_color("tomato").unwrap(), [1.0, 99.0 / 255.0, 71.0 / 255.0]);
        assert_close(parse_color("SteelBlue").unwrap(), [70.0 / 255.0, 130.0 / 255.0, 180.0 / 255.0]);
        assert_close(parse_color("coral").unwrap(), [1.0, 127.0 / 255.0, 80.0 / 255.0]);
        assert_close(parse_color("gold").unwrap(), [1.0, 215.0 / 255.0, 0.0]);
        assert_close(parse_color("hotpink").unwrap(), [1.0, 105.0 / 255.0, 180.0 / 255.0]);
        assert_close(parse_color("darkolivegreen").unwrap(), [85.0 / 255.0, 107.0 / 255.0, 47.0 / 255.0]);
        assert_close(parse_color("cyan").unwrap(), [0.0, 1.0, 1.0]);
        assert_close(parse_color("transparent").unwrap(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn hue_units() {
        let cyan = [0.0, 1.0, 1.0];
        assert_close(parse_color("hsl(0.5turn 100% 50%)").unwrap(), cyan);
        assert_close(parse_color("hsl(200grad 100% 50%)").unwrap(), cyan);
        assert_close(parse_color("hsl(3.14159265rad 100% 50%)").unwrap(), cyan);
        assert_close(parse_color("hsl(180deg, 100%, 50%)").unwrap(), cyan);
        assert!(parse_color("hsl(1furlong 100% 50%)").is_err());
    }

    #[test]
    fn functional_notations() {
        assert_close(parse_color("rgb(255 128 0)").unwrap(), [1.0, 128.0 / 255.0, 0.0]);
        assert_close(parse_color("rgba(0, 0, 255, 0.5)").unwrap(), [0.0, 0.0, 1.0]);
        assert_close(parse_color("rgb(100% 0% 0% / 50%)").unwrap(), [1.0, 0.0, 0.0]);
        assert_close(parse_color("hsl(120deg 100% 50%)").unwrap(), [0.0, 1.0, 0.0]);
        assert_close(parse_color("hwb(0 0% 0%)").unwrap(), [1.0, 0.0, 0.0]);
        assert_close(parse_color("oklch(1 0 0)").unwrap(), [1.0, 1.0, 1.0]);
        assert_close(parse_color("lab(0% 0 0)").unwrap(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn unparseable_color_falls_back_to_black() {
        assert_eq!(resolve_color("not-a-color"), ColorCoords::BLACK);
        assert_eq!(resolve_color("rgb(1 2)"), ColorCoords::BLACK);
        assert_eq!(resolve_color("#zzzzzz"), ColorCoords::BLACK);
        assert_eq!(resolve_color(""), ColorCoords::BLACK);
        assert!(parse_color("device-cmyk(0 0 0 1)").is_err());
    }

    #[test]
    fn device_color_string_matches_canvas_syntax() {
        let coords = ColorCoords::new(1.0, 0.0, 0.5);
        assert_eq!(coords.device_color(25.0).to_string(), "rgb(255 0 127.5 / 25%)");
        assert_eq!(ColorCoords::BLACK.device_color(100.0).to_string(), "rgb(0 0 0 / 100%)");
    }
}
