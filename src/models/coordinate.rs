use serde::{Deserialize, Serialize};

/// A board cell. Serialized on the wire as comma-joined text, e.g. `"3,0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Coordinate { x, y }
    }

    pub fn encode(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    pub fn parse(text: &str) -> Option<Coordinate> {
        let (x, y) = text.split_once(',')?;
        Some(Coordinate {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        })
    }
}
