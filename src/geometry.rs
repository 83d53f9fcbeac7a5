//! Window geometry for the `resize` and `next` actions.
//!
//! A resize is described by four [`Tweak`]s, one each for the x, y, width
//! and height of the frontmost window.  Each tweak is evaluated relative to
//! the screen that contains the window:
//!
//! | token   | meaning                                        |
//! |---------|------------------------------------------------|
//! | `100`   | set to 100 pixels (positions are absolute)     |
//! | `25%`   | set to 25% of the screen dimension             |
//! | `.+50`  | add 50 pixels to the current value (`.` = +0)  |
//! | `.-10%` | subtract 10% of the screen dimension           |
//! | `*-20`  | 20 pixels short of the far screen edge         |
//! | `*`     | exactly at the far screen edge                 |
//!
//! Example: `resize 0% 0% 50% 100%` fills the left half of the screen.

use std::fmt;

/// An axis-aligned rectangle with a top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Parse the `"x y width height"` form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<f64> = s
            .split_whitespace()
            .map(|p| p.parse().ok())
            .collect::<Option<_>>()?;
        match parts[..] {
            [x, y, width, height] => Some(Self::new(x, y, width, height)),
            _ => None,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Area shared with `other`, zero when they do not touch.
    pub fn overlap(&self, other: &Rect) -> f64 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }

    /// Index and value of the rectangle in `list` sharing the most area with
    /// `self`.  Ties go to the earliest entry; an empty list yields `None`.
    pub fn best_overlap(&self, list: &[Rect]) -> Option<(usize, Rect)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, r) in list.iter().enumerate() {
            let area = self.overlap(r);
            if best.map_or(true, |(_, b)| area > b) {
                best = Some((i, area));
            }
        }
        best.map(|(i, _)| (i, list[i]))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.x as i64, self.y as i64, self.width as i64, self.height as i64
        )
    }
}

/// A number of pixels, or a percentage of a screen dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Amount {
    Literal(f64),
    Percent(i32),
}

impl Amount {
    /// Parse `"10"`, `"-5.5"`, `"50%"`, or `"*"` (100%).
    pub fn parse(s: &str) -> Option<Self> {
        if s == "*" {
            return Some(Amount::Percent(100));
        }
        if let Some(pct) = s.strip_suffix('%') {
            return pct.parse().ok().map(Amount::Percent);
        }
        s.parse().ok().map(Amount::Literal)
    }

    /// The amount as a length along an axis of size `dim`.
    pub fn length(&self, dim: f64) -> f64 {
        match *self {
            Amount::Literal(v) => v,
            Amount::Percent(p) => f64::from(p) / 100.0 * dim,
        }
    }

    /// The amount as a coordinate on an axis starting at `base`.  Literal
    /// coordinates are absolute; percentages are measured from `base`.
    pub fn position(&self, base: f64, dim: f64) -> f64 {
        match *self {
            Amount::Literal(v) => v,
            Amount::Percent(_) => base + self.length(dim),
        }
    }

    fn is_negative(&self) -> bool {
        match *self {
            Amount::Literal(v) => v.is_sign_negative(),
            Amount::Percent(p) => p < 0,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Literal(v) => write!(f, "{}", v),
            Amount::Percent(p) => write!(f, "{}%", p),
        }
    }
}

/// A change to one window coordinate or dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tweak {
    /// Replace the value.
    Set(Amount),
    /// Adjust the current value.
    Delta(Amount),
    /// Measure from the far edge of the screen.
    Offset(Amount),
}

impl Tweak {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" => None,
            "." => Some(Tweak::Delta(Amount::Literal(0.0))),
            "*" => Some(Tweak::Offset(Amount::Literal(0.0))),
            _ => {
                if let Some(rest) = s.strip_prefix('.') {
                    Amount::parse(rest).map(Tweak::Delta)
                } else if let Some(rest) = s.strip_prefix('*') {
                    Amount::parse(rest).map(Tweak::Offset)
                } else {
                    Amount::parse(s).map(Tweak::Set)
                }
            }
        }
    }

    /// New coordinate for `value` on a screen axis starting at `base` with
    /// length `dim`.
    pub fn position(&self, value: f64, base: f64, dim: f64) -> f64 {
        match self {
            Tweak::Set(a) => a.position(base, dim),
            Tweak::Delta(a) => value + a.length(dim),
            Tweak::Offset(a) => base + dim + a.length(dim),
        }
    }

    /// New size for `value` on a screen axis of length `dim`.
    pub fn size(&self, value: f64, dim: f64) -> f64 {
        match self {
            Tweak::Set(a) => a.length(dim),
            Tweak::Delta(a) => value + a.length(dim),
            Tweak::Offset(a) => dim + a.length(dim),
        }
    }
}

impl fmt::Display for Tweak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let signed = |f: &mut fmt::Formatter<'_>, a: &Amount| {
            if a.is_negative() {
                write!(f, "{}", a)
            } else {
                write!(f, "+{}", a)
            }
        };
        match self {
            Tweak::Set(a) => write!(f, "{}", a),
            Tweak::Delta(a) => {
                f.write_str(".")?;
                signed(f, a)
            }
            Tweak::Offset(a) => {
                f.write_str("*")?;
                signed(f, a)
            }
        }
    }
}

/// Tweaks for the origin and size of a window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tweaks {
    pub x: Tweak,
    pub y: Tweak,
    pub width: Tweak,
    pub height: Tweak,
}

impl Tweaks {
    /// Parse exactly four whitespace-separated tweak tokens.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<Tweak> = s
            .split_whitespace()
            .map(Tweak::parse)
            .collect::<Option<_>>()?;
        match parts[..] {
            [x, y, width, height] => Some(Self {
                x,
                y,
                width,
                height,
            }),
            _ => None,
        }
    }

    /// Compute new bounds for `rect` relative to the screen `within`.
    pub fn apply(&self, rect: Rect, within: Rect) -> Rect {
        Rect::new(
            self.x.position(rect.x, within.x, within.width),
            self.y.position(rect.y, within.y, within.height),
            self.width.size(rect.width, within.width),
            self.height.size(rect.height, within.height),
        )
    }
}

impl fmt::Display for Tweaks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.x, self.y, self.width, self.height)
    }
}

/// Bounds for `window` moved onto the screen after the one it mostly
/// occupies.
///
/// Screens are ordered top to bottom, then left to right, and the last one
/// wraps around to the first.  The window keeps its position and size
/// relative to the screen.  Returns `None` when there are no screens.
pub fn next_screen(window: Rect, screens: &[Rect]) -> Option<Rect> {
    let mut frames = screens.to_vec();
    frames.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    let (index, frame) = window.best_overlap(&frames)?;
    let target = frames[(index + 1) % frames.len()];
    Some(Rect::new(
        target.x + target.width * ((window.x - frame.x) / frame.width),
        target.y + target.height * ((window.y - frame.y) / frame.height),
        target.width * (window.width / frame.width),
        target.height * (window.height / frame.height),
    ))
}
