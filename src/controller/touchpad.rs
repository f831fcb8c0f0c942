//! Touch surfaces

use super::component::{Component, ComponentId, TypedComponent};

/// One finger contact; position normalized to `[0, 1]` on both axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Finger {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

impl Finger {
    pub fn new(id: u32, x: f32, y: f32, pressure: f32) -> Self {
        Self {
            id,
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            pressure: pressure.clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Touchpad {
    pub max_fingers: usize,
    fingers: Vec<Finger>,
    prev_fingers: Vec<Finger>,
}

impl Touchpad {
    pub fn new(max_fingers: usize) -> Self {
        Self {
            max_fingers,
            fingers: Vec::new(),
            prev_fingers: Vec::new(),
        }
    }

    /// Replace the contacts for this tick, keeping at most `max_fingers`
    pub fn push_fingers(&mut self, mut fingers: Vec<Finger>) {
        fingers.truncate(self.max_fingers);
        self.prev_fingers = std::mem::replace(&mut self.fingers, fingers);
    }

    pub fn fingers(&self) -> &[Finger] {
        &self.fingers
    }

    pub fn prev_fingers(&self) -> &[Finger] {
        &self.prev_fingers
    }

    pub fn is_touched(&self) -> bool {
        !self.fingers.is_empty()
    }
}

/// Every touch surface of a controller, in hardware order
#[derive(Debug, Clone, Default)]
pub struct Touchpads {
    pads: Vec<Touchpad>,
}

impl Touchpads {
    pub fn new(pads: Vec<Touchpad>) -> Self {
        Self { pads }
    }

    pub fn pads(&self) -> &[Touchpad] {
        &self.pads
    }

    pub fn pad_mut(&mut self, index: usize) -> Option<&mut Touchpad> {
        self.pads.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }
}

impl Component for Touchpads {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for Touchpads {
    const ID: ComponentId = ComponentId::from_static("controlhub:touchpad");
}
