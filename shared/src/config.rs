use crate::protocol::Position;

/// Which pair of axes a client moves in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Floor of the 3D viewer: `{x, z}`.
    #[default]
    Xz,
    /// 2D canvas: `{x, y}`.
    Xy,
}

impl Plane {
    pub fn origin(self) -> Position {
        self.position(0.0, 0.0)
    }

    pub fn position(self, x: f64, depth: f64) -> Position {
        match self {
            Plane::Xz => Position::Floor { x, z: depth },
            Plane::Xy => Position::Canvas { x, y: depth },
        }
    }
}

impl std::str::FromStr for Plane {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xz" => Ok(Plane::Xz),
            "xy" => Ok(Plane::Xy),
            other => Err(format!("unknown plane {other:?}, expected \"xz\" or \"xy\"")),
        }
    }
}

/// Playable area, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_depth: f64,
    pub max_depth: f64,
}

impl Bounds {
    /// Bounds of a square tile grid centred on the origin. Tiles are placed at
    /// integer multiples of `tile_size`, so the last reachable tile sits one
    /// tile short of the positive half extent.
    pub fn tile_grid(grid_size: u32, tile_size: f64) -> Self {
        let half = grid_size as f64 / 2.0 * tile_size;
        Self {
            min_x: -half,
            max_x: half - tile_size,
            min_depth: -half,
            max_depth: half - tile_size,
        }
    }

    pub fn clamp(&self, x: f64, depth: f64) -> (f64, f64) {
        (
            x.clamp(self.min_x, self.max_x),
            depth.clamp(self.min_depth, self.max_depth),
        )
    }
}

/// Client-side synchronization settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientConfig {
    pub plane: Plane,
    /// Distance travelled per frame while a direction key is held
    pub speed: f64,
    pub bounds: Bounds,
    /// Frames per second the send cadence is gated to
    pub target_fps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            plane: Plane::Xz,
            speed: 0.1,
            bounds: Bounds::tile_grid(10, 1.0),
            target_fps: 60,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.speed.is_finite() || self.speed < 0.0 {
            return Err("speed must be finite and >= 0".to_string());
        }
        if self.target_fps == 0 {
            return Err("target_fps must be > 0".to_string());
        }
        let b = &self.bounds;
        if ![b.min_x, b.max_x, b.min_depth, b.max_depth]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err("bounds must be finite".to_string());
        }
        if b.min_x > b.max_x || b.min_depth > b.max_depth {
            return Err("bounds min must be <= max".to_string());
        }
        Ok(())
    }

    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }
}
