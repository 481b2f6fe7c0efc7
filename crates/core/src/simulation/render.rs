//! Drawing surface the driver renders particles onto
//!
//! The map renderer owns the actual canvas; the driver only issues these
//! three commands per frame, in order: one `fade`, then one `draw_particle`
//! per on-screen particle.

/// Target for particle trails
pub trait DrawSurface {
    /// Multiply what is already drawn by `retain` in `[0, 1]`
    fn fade(&mut self, retain: f32);

    /// Wipe the surface
    fn clear(&mut self);

    /// Draw one particle at pixel `(x, y)`; `speed` is the physical wind speed (m/s)
    fn draw_particle(&mut self, x: f32, y: f32, speed: f32);
}

/// One recorded surface call
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Fade(f32),
    Clear,
    Particle { x: f32, y: f32, speed: f32 },
}

/// Surface that just records the commands it receives.
///
/// Used by tests and by hosts that replay draw calls elsewhere (the C API
/// hands the positions across the boundary from one of these).
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Pixel positions of every particle drawn since the last reset
    pub fn particles(&self) -> impl Iterator<Item = (f32, f32, f32)> + '_ {
        self.commands.iter().filter_map(|cmd| match *cmd {
            DrawCommand::Particle { x, y, speed } => Some((x, y, speed)),
            _ => None,
        })
    }

    /// Forget recorded commands, keeping the allocation
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl DrawSurface for RecordingSurface {
    fn fade(&mut self, retain: f32) {
        self.commands.push(DrawCommand::Fade(retain));
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_particle(&mut self, x: f32, y: f32, speed: f32) {
        self.commands.push(DrawCommand::Particle { x, y, speed });
    }
}
