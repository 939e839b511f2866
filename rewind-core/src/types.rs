//! Value types shared across the replay capture format.

/// Discrete simulation step index, the primary axis for all per-entity
/// series. Frame 0 is the first frame of the capture.
pub type FrameIndex = i32;

/// A position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// A rotation, stored as (x, y, z, w).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A rigid transform: translation plus rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub translation: Point,
    pub rotation: Quaternion,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        translation: Point::ZERO,
        rotation: Quaternion::IDENTITY,
    };

    pub fn from_translation(translation: Point) -> Self {
        Self { translation, rotation: Quaternion::IDENTITY }
    }
}

/// Closed integer interval over frame numbers, used for entity lifetimes
/// and windowed range queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameRange {
    pub start: FrameIndex,
    pub end: FrameIndex,
}

impl FrameRange {
    pub fn new(start: FrameIndex, end: FrameIndex) -> Self {
        Self { start, end }
    }

    /// Whether `frame` falls inside the closed interval.
    pub fn in_range(&self, frame: FrameIndex) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Whether two closed intervals share at least one frame.
    pub fn overlaps(&self, other: &FrameRange) -> bool {
        if other.start < self.start {
            other.end >= self.start
        } else {
            other.start <= self.end
        }
    }
}

/// The capture color palette.
///
/// A closed set of named colors stored on the wire as a varint index. The
/// ordering is part of the format contract: index values must be stable
/// between writer and reader builds. Display RGB translation is the
/// viewer's concern, not the format's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Color {
    #[default]
    AliceBlue,
    PaleGoldenrod,
    Orchid,
    OrangeRed,
    Orange,
    OliveDrab,
    Olive,
    OldLace,
    Navy,
    NavajoWhite,
    Moccasin,
    MistyRose,
    MintCream,
    MidnightBlue,
    MediumVioletRed,
    MediumTurquoise,
    MediumSpringGreen,
    MediumSlateBlue,
    LightSkyBlue,
    LightSlateGray,
    LightSteelBlue,
    LightYellow,
    Lime,
    LimeGreen,
    PaleGreen,
    Linen,
    Maroon,
    MediumAquamarine,
    MediumBlue,
    MediumOrchid,
    MediumPurple,
    MediumSeaGreen,
    Magenta,
    PaleTurquoise,
    PaleVioletRed,
    PapayaWhip,
    SlateGray,
    Snow,
    SpringGreen,
    SteelBlue,
    Tan,
    Teal,
    SlateBlue,
    Thistle,
    Transparent,
    Turquoise,
    Violet,
    Wheat,
    White,
    WhiteSmoke,
    Tomato,
    LightSeaGreen,
    SkyBlue,
    Sienna,
    PeachPuff,
    Peru,
    Pink,
    Plum,
    PowderBlue,
    Purple,
    Silver,
    Red,
    RoyalBlue,
    SaddleBrown,
    Salmon,
    SandyBrown,
    SeaGreen,
    SeaShell,
    RosyBrown,
    Yellow,
    LightSalmon,
    LightGreen,
    DarkRed,
    DarkOrchid,
    DarkOrange,
    DarkOliveGreen,
    DarkMagenta,
    DarkKhaki,
    DarkGreen,
    DarkGray,
    DarkGoldenrod,
    DarkCyan,
    DarkBlue,
    Cyan,
    Crimson,
    Cornsilk,
    CornflowerBlue,
    Coral,
    Chocolate,
    AntiqueWhite,
    Aqua,
    Aquamarine,
    Azure,
    Beige,
    Bisque,
    DarkSalmon,
    Black,
    Blue,
    BlueViolet,
    Brown,
    BurlyWood,
    CadetBlue,
    Chartreuse,
    BlanchedAlmond,
    DarkSeaGreen,
    DarkSlateBlue,
    DarkSlateGray,
    HotPink,
    IndianRed,
    Indigo,
    Ivory,
    Khaki,
    Lavender,
    Honeydew,
    LavenderBlush,
    LemonChiffon,
    LightBlue,
    LightCoral,
    LightCyan,
    LightGoldenrodYellow,
    LightGray,
    LawnGreen,
    LightPink,
    GreenYellow,
    Gray,
    DarkTurquoise,
    DarkViolet,
    DeepPink,
    DeepSkyBlue,
    DimGray,
    DodgerBlue,
    Green,
    Firebrick,
    ForestGreen,
    Fuchsia,
    Gainsboro,
    GhostWhite,
    Gold,
    Goldenrod,
    FloralWhite,
    YellowGreen,
}

impl Color {
    /// Every palette entry, in wire-index order.
    pub const PALETTE: [Color; 141] = [
        Color::AliceBlue,
        Color::PaleGoldenrod,
        Color::Orchid,
        Color::OrangeRed,
        Color::Orange,
        Color::OliveDrab,
        Color::Olive,
        Color::OldLace,
        Color::Navy,
        Color::NavajoWhite,
        Color::Moccasin,
        Color::MistyRose,
        Color::MintCream,
        Color::MidnightBlue,
        Color::MediumVioletRed,
        Color::MediumTurquoise,
        Color::MediumSpringGreen,
        Color::MediumSlateBlue,
        Color::LightSkyBlue,
        Color::LightSlateGray,
        Color::LightSteelBlue,
        Color::LightYellow,
        Color::Lime,
        Color::LimeGreen,
        Color::PaleGreen,
        Color::Linen,
        Color::Maroon,
        Color::MediumAquamarine,
        Color::MediumBlue,
        Color::MediumOrchid,
        Color::MediumPurple,
        Color::MediumSeaGreen,
        Color::Magenta,
        Color::PaleTurquoise,
        Color::PaleVioletRed,
        Color::PapayaWhip,
        Color::SlateGray,
        Color::Snow,
        Color::SpringGreen,
        Color::SteelBlue,
        Color::Tan,
        Color::Teal,
        Color::SlateBlue,
        Color::Thistle,
        Color::Transparent,
        Color::Turquoise,
        Color::Violet,
        Color::Wheat,
        Color::White,
        Color::WhiteSmoke,
        Color::Tomato,
        Color::LightSeaGreen,
        Color::SkyBlue,
        Color::Sienna,
        Color::PeachPuff,
        Color::Peru,
        Color::Pink,
        Color::Plum,
        Color::PowderBlue,
        Color::Purple,
        Color::Silver,
        Color::Red,
        Color::RoyalBlue,
        Color::SaddleBrown,
        Color::Salmon,
        Color::SandyBrown,
        Color::SeaGreen,
        Color::SeaShell,
        Color::RosyBrown,
        Color::Yellow,
        Color::LightSalmon,
        Color::LightGreen,
        Color::DarkRed,
        Color::DarkOrchid,
        Color::DarkOrange,
        Color::DarkOliveGreen,
        Color::DarkMagenta,
        Color::DarkKhaki,
        Color::DarkGreen,
        Color::DarkGray,
        Color::DarkGoldenrod,
        Color::DarkCyan,
        Color::DarkBlue,
        Color::Cyan,
        Color::Crimson,
        Color::Cornsilk,
        Color::CornflowerBlue,
        Color::Coral,
        Color::Chocolate,
        Color::AntiqueWhite,
        Color::Aqua,
        Color::Aquamarine,
        Color::Azure,
        Color::Beige,
        Color::Bisque,
        Color::DarkSalmon,
        Color::Black,
        Color::Blue,
        Color::BlueViolet,
        Color::Brown,
        Color::BurlyWood,
        Color::CadetBlue,
        Color::Chartreuse,
        Color::BlanchedAlmond,
        Color::DarkSeaGreen,
        Color::DarkSlateBlue,
        Color::DarkSlateGray,
        Color::HotPink,
        Color::IndianRed,
        Color::Indigo,
        Color::Ivory,
        Color::Khaki,
        Color::Lavender,
        Color::Honeydew,
        Color::LavenderBlush,
        Color::LemonChiffon,
        Color::LightBlue,
        Color::LightCoral,
        Color::LightCyan,
        Color::LightGoldenrodYellow,
        Color::LightGray,
        Color::LawnGreen,
        Color::LightPink,
        Color::GreenYellow,
        Color::Gray,
        Color::DarkTurquoise,
        Color::DarkViolet,
        Color::DeepPink,
        Color::DeepSkyBlue,
        Color::DimGray,
        Color::DodgerBlue,
        Color::Green,
        Color::Firebrick,
        Color::ForestGreen,
        Color::Fuchsia,
        Color::Gainsboro,
        Color::GhostWhite,
        Color::Gold,
        Color::Goldenrod,
        Color::FloralWhite,
        Color::YellowGreen,
    ];

    /// The wire index of this color.
    pub fn index(self) -> i32 {
        self as i32
    }

    /// Looks up a palette entry by wire index.
    pub fn from_index(index: i32) -> Option<Color> {
        usize::try_from(index).ok().and_then(|i| Self::PALETTE.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_range_in_range() {
        let range = FrameRange::new(5, 10);
        assert!(!range.in_range(4));
        assert!(range.in_range(5));
        assert!(range.in_range(7));
        assert!(range.in_range(10));
        assert!(!range.in_range(11));
    }

    #[test]
    fn test_frame_range_overlaps() {
        let range = FrameRange::new(5, 10);
        assert!(range.overlaps(&FrameRange::new(0, 5)));
        assert!(range.overlaps(&FrameRange::new(10, 20)));
        assert!(range.overlaps(&FrameRange::new(6, 8)));
        assert!(range.overlaps(&FrameRange::new(0, 20)));
        assert!(!range.overlaps(&FrameRange::new(0, 4)));
        assert!(!range.overlaps(&FrameRange::new(11, 20)));
    }

    #[test]
    fn test_color_indices_are_stable() {
        // Spot checks against the recorded wire order.
        assert_eq!(Color::AliceBlue.index(), 0);
        assert_eq!(Color::PaleGoldenrod.index(), 1);
        assert_eq!(Color::Red.index(), 61);
        assert_eq!(Color::YellowGreen.index(), 140);
    }

    #[test]
    fn test_color_from_index_roundtrip() {
        for (i, color) in Color::PALETTE.iter().enumerate() {
            assert_eq!(Color::from_index(i as i32), Some(*color));
            assert_eq!(color.index(), i as i32);
        }
        assert_eq!(Color::from_index(-1), None);
        assert_eq!(Color::from_index(141), None);
    }

    #[test]
    fn test_identity_quaternion() {
        let q = Quaternion::default();
        assert_eq!(q.w, 1.0);
        assert_eq!((q.x, q.y, q.z), (0.0, 0.0, 0.0));
    }
}
