//! Fixed table of false-colour maps.
//!
//! Each map is described by evenly spaced RGB stops and
//! expanded into a 256-entry lookup table on demand.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    Jet,
    Hot,
    Magma,
    Inferno,
    Plasma,
    Bone,
    Spring,
    Autumn,
    Viridis,
    Parula,
    InvRainbow,
}

/// Lookup table indexed by intensity.
pub type Lut = [[u8; 3]; 256];

impl Colormap {
    /// Table order; cycling walks this list.
    pub const ALL: [Colormap; 11] = [
        Colormap::Jet,
        Colormap::Hot,
        Colormap::Magma,
        Colormap::Inferno,
        Colormap::Plasma,
        Colormap::Bone,
        Colormap::Spring,
        Colormap::Autumn,
        Colormap::Viridis,
        Colormap::Parula,
        Colormap::InvRainbow,
    ];

    /// Map at `index` in [`Colormap::ALL`], wrapping.
    pub fn from_index(index: usize) -> Self {
        Colormap::ALL[index % Colormap::ALL.len()]
    }

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Jet => "Jet",
            Colormap::Hot => "Hot",
            Colormap::Magma => "Magma",
            Colormap::Inferno => "Inferno",
            Colormap::Plasma => "Plasma",
            Colormap::Bone => "Bone",
            Colormap::Spring => "Spring",
            Colormap::Autumn => "Autumn",
            Colormap::Viridis => "Viridis",
            Colormap::Parula => "Parula",
            Colormap::InvRainbow => "Inv Rainbow",
        }
    }

    fn stops(self) -> &'static [[u8; 3]] {
        match self {
            Colormap::Jet => &[
                [0, 0, 143],
                [0, 0, 255],
                [0, 255, 255],
                [255, 255, 0],
                [255, 0, 0],
                [128, 0, 0],
            ],
            Colormap::Hot => &[[0, 0, 0], [230, 0, 0], [255, 210, 0], [255, 255, 255]],
            Colormap::Magma => &[
                [0, 0, 4],
                [81, 18, 124],
                [183, 55, 121],
                [252, 137, 97],
                [252, 253, 191],
            ],
            Colormap::Inferno => &[
                [0, 0, 4],
                [87, 16, 110],
                [188, 55, 84],
                [249, 142, 9],
                [252, 255, 164],
            ],
            Colormap::Plasma => &[
                [13, 8, 135],
                [126, 3, 168],
                [204, 71, 120],
                [248, 149, 64],
                [240, 249, 33],
            ],
            Colormap::Bone => &[[0, 0, 0], [84, 84, 116], [167, 199, 199], [255, 255, 255]],
            Colormap::Spring => &[[255, 0, 255], [255, 255, 0]],
            Colormap::Autumn => &[[255, 0, 0], [255, 255, 0]],
            Colormap::Viridis => &[
                [68, 1, 84],
                [59, 82, 139],
                [33, 145, 140],
                [94, 201, 98],
                [253, 231, 37],
            ],
            Colormap::Parula => &[
                [53, 42, 135],
                [15, 92, 221],
                [7, 156, 207],
                [89, 189, 140],
                [225, 185, 82],
                [249, 251, 14],
            ],
            Colormap::InvRainbow => &[
                [127, 0, 255],
                [0, 0, 255],
                [0, 255, 255],
                [0, 255, 0],
                [255, 255, 0],
                [255, 0, 0],
            ],
        }
    }

    /// Expand the stops into a lookup table by linear
    /// interpolation.
    pub fn lut(self) -> Lut {
        let stops = self.stops();
        let segments = (stops.len() - 1) as f64;
        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let t = i as f64 / 255. * segments;
            let seg = (t.floor() as usize).min(stops.len() - 2);
            let frac = t - seg as f64;
            let (a, b) = (stops[seg], stops[seg + 1]);
            for ch in 0..3 {
                let v = f64::from(a[ch]) + (f64::from(b[ch]) - f64::from(a[ch])) * frac;
                entry[ch] = v.round() as u8;
            }
        }
        lut
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
