//! Native on-screen keyboard provided by the platform

use std::fmt;

use super::component::{Component, ComponentId, TypedComponent};

pub type OpenKeyboard = Box<dyn Fn() + Send>;

/// Opens the platform keyboard; `height` is the fraction of the screen it covers
pub struct NativeKeyboardComponent {
    open: OpenKeyboard,
    height: f32,
}

impl NativeKeyboardComponent {
    pub fn new(open: OpenKeyboard, height: f32) -> Self {
        Self {
            open,
            height: height.clamp(0.0, 1.0),
        }
    }

    pub fn open(&self) {
        (self.open)();
    }

    pub fn height(&self) -> f32 {
        self.height
    }
}

impl fmt::Debug for NativeKeyboardComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeKeyboardComponent")
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Component for NativeKeyboardComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }
}

impl TypedComponent for NativeKeyboardComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:keyboard");
}
