//! Intersection directions and per-direction signal schedules.
//!
//! The four approaches are served in a fixed rotation order. A [`Schedule`]
//! carries one green/red pair per direction; green drives the phase
//! timeline, red is the figure reported alongside it.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four intersection approaches.
///
/// Declaration order is the rotation order and never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// First approach in the rotation.
    North,
    /// Second approach in the rotation.
    East,
    /// Third approach in the rotation.
    South,
    /// Fourth approach in the rotation.
    West,
}

impl Direction {
    /// All directions in rotation order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Zero-based position in the rotation.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Lowercase name used in JSON and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::East => "east",
            Self::South => "south",
            Self::West => "west",
        }
    }

    /// The direction served after this one, wrapping to the start.
    #[must_use]
    pub const fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token does not name a direction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown direction: {0:?}")]
pub struct UnknownDirection(pub String);

impl FromStr for Direction {
    type Err = UnknownDirection;

    /// Accepts a rotation index (`0`..`3`), a letter (`A`..`D`) or a
    /// direction name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let parsed = match token.to_ascii_lowercase().as_str() {
            "0" | "a" | "n" | "north" => Some(Self::North),
            "1" | "b" | "e" | "east" => Some(Self::East),
            "2" | "c" | "s" | "south" => Some(Self::South),
            "3" | "d" | "w" | "west" => Some(Self::West),
            _ => None,
        };
        parsed.ok_or_else(|| UnknownDirection(token.to_string()))
    }
}

/// A value for each direction, with complete and fixed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerDirection<T> {
    /// Value for [`Direction::North`].
    pub north: T,
    /// Value for [`Direction::East`].
    pub east: T,
    /// Value for [`Direction::South`].
    pub south: T,
    /// Value for [`Direction::West`].
    pub west: T,
}

impl<T> PerDirection<T> {
    /// Builds a value for every direction from `f`.
    pub fn from_fn(mut f: impl FnMut(Direction) -> T) -> Self {
        Self {
            north: f(Direction::North),
            east: f(Direction::East),
            south: f(Direction::South),
            west: f(Direction::West),
        }
    }

    /// Applies `f` to every entry.
    pub fn map<U>(&self, mut f: impl FnMut(Direction, &T) -> U) -> PerDirection<U> {
        PerDirection::from_fn(|d| f(d, &self[d]))
    }

    /// Iterates entries in rotation order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().map(move |d| (d, &self[d]))
    }
}

impl<T: Clone> PerDirection<T> {
    /// Uses the same value for every direction.
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<Direction> for PerDirection<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        match direction {
            Direction::North => &self.north,
            Direction::East => &self.east,
            Direction::South => &self.south,
            Direction::West => &self.west,
        }
    }
}

impl<T> IndexMut<Direction> for PerDirection<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        match direction {
            Direction::North => &mut self.north,
            Direction::East => &mut self.east,
            Direction::South => &mut self.south,
            Direction::West => &mut self.west,
        }
    }
}

/// Green and red durations for one direction, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timing {
    /// Green time allotted per cycle.
    pub green: f64,
    /// Reported red time. Advisory only; live countdowns come from the timeline.
    pub red: f64,
}

/// Green/red durations for every direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schedule(pub PerDirection<Timing>);

impl Schedule {
    /// Green time applied to every direction by [`Schedule::default`].
    pub const DEFAULT_GREEN: f64 = 10.0;

    /// Red time applied to every direction by [`Schedule::default`].
    pub const DEFAULT_RED: f64 = 50.0;

    /// A schedule with the same timing for every direction.
    #[must_use]
    pub fn uniform(green: f64, red: f64) -> Self {
        Self(PerDirection::splat(Timing { green, red }))
    }

    /// Builds a schedule from greens, reporting each red as the sum of
    /// the other three directions' greens.
    #[must_use]
    pub fn from_greens(greens: &PerDirection<f64>) -> Self {
        let total: f64 = greens.iter().map(|(_, g)| *g).sum();
        Self(greens.map(|_, &green| Timing {
            green,
            red: total - green,
        }))
    }

    /// Green seconds for `direction`.
    #[must_use]
    pub fn green(&self, direction: Direction) -> f64 {
        self.0[direction].green
    }

    /// Reported red seconds for `direction`.
    #[must_use]
    pub fn red(&self, direction: Direction) -> f64 {
        self.0[direction].red
    }

    /// Timing entry for `direction`.
    #[must_use]
    pub fn timing(&self, direction: Direction) -> Timing {
        self.0[direction]
    }

    /// Sum of all greens.
    #[must_use]
    pub fn total_green(&self) -> f64 {
        self.0.iter().map(|(_, t)| t.green).sum()
    }

    /// Returns the path of the first non-finite or negative value, if any.
    #[must_use]
    pub fn first_invalid_field(&self) -> Option<String> {
        self.0.iter().find_map(|(d, t)| {
            if !t.green.is_finite() || t.green < 0.0 {
                Some(format!("{d}.green"))
            } else if !t.red.is_finite() || t.red < 0.0 {
                Some(format!("{d}.red"))
            } else {
                None
            }
        })
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT_GREEN, Self::DEFAULT_RED)
    }
}

impl Index<Direction> for Schedule {
    type Output = Timing;

    fn index(&self, direction: Direction) -> &Timing {
        &self.0[direction]
    }
}
