use std::collections::BTreeMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Convert HSL (hue in degrees, saturation and lightness in [0, 1]) to a `#rrggbb` string.
fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Color of a species, derived from a hash of its name. The same name gets the same color in every run.
pub fn species_color(name: &str) -> String {
    let hash = fnv1a(name.as_bytes());
    let hue = (hash % 360) as f64;
    // Three lightness levels separate species whose hues happen to be close.
    let lightness = [0.40, 0.50, 0.60][((hash >> 32) % 3) as usize];
    hsl_to_hex(hue, 0.70, lightness)
}

/// Colors of the selected species for one render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMap {
    colors: BTreeMap<String, String>,
}

impl ColorMap {
    pub fn for_species<'a>(names: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            colors: names
                .into_iter()
                .map(|name| (name.clone(), species_color(name)))
                .collect(),
        }
    }

    pub fn color_of(&self, name: &str) -> Option<&str> {
        self.colors.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }
}
