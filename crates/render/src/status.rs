/// Icon shown next to a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusIcon {
    PacketReceived,
    PacketSent,
    ActiveInPhysics,
    SimulationOwner,
    OtherSimulationOwner,
    HasActions,
    EntityHostType,
}

/// One debug status indicator sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusValue {
    /// 0 hides the indicator, 1 is full size.
    pub scale: f32,
    /// Degrees on the color wheel.
    pub hue: f32,
    pub icon: StatusIcon,
}

impl StatusValue {
    pub const RED: f32 = 0.0;
    pub const YELLOW: f32 = 60.0;
    pub const GREEN: f32 = 120.0;
    pub const CYAN: f32 = 180.0;
    pub const BLUE: f32 = 240.0;
    pub const MAGENTA: f32 = 300.0;

    pub fn new(scale: f32, hue: f32, icon: StatusIcon) -> Self {
        Self {
            scale: scale.clamp(0.0, 1.0),
            hue,
            icon,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.scale > 0.0
    }
}

pub type StatusGetter = Box<dyn Fn() -> StatusValue + Send + Sync>;
