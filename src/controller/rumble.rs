//! Rumble channels and effect scheduling
//!
//! Drivers append the channels their hardware supports; gameplay queues
//! effects, and the driver forwards `current(channel)` to the device once per
//! tick. The strongest-priority effect on a channel wins; ties go to the most
//! recently played effect.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::component::{Component, ComponentId, TypedComponent};
use super::config::{Config, ConfigHolder, ConfigRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RumbleChannel {
    /// Low/high frequency body motors
    Main,
    /// Impulse trigger motors
    Triggers,
}

/// Motor intensities in `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RumbleState {
    pub strong: f32,
    pub weak: f32,
}

impl RumbleState {
    pub const OFF: RumbleState = RumbleState {
        strong: 0.0,
        weak: 0.0,
    };

    pub fn new(strong: f32, weak: f32) -> Self {
        Self {
            strong: strong.clamp(0.0, 1.0),
            weak: weak.clamp(0.0, 1.0),
        }
    }

    pub fn is_off(&self) -> bool {
        self.strong <= 0.0 && self.weak <= 0.0
    }

    fn scaled(self, factor: f32) -> Self {
        Self::new(self.strong * factor, self.weak * factor)
    }
}

/// A timed rumble request
#[derive(Debug, Clone, PartialEq)]
pub struct RumbleEffect {
    pub channel: RumbleChannel,
    pub state: RumbleState,
    pub duration_ticks: u32,
    pub priority: i32,
}

impl RumbleEffect {
    pub fn new(channel: RumbleChannel, state: RumbleState, duration_ticks: u32) -> Self {
        Self {
            channel,
            state,
            duration_ticks,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RumbleConfig {
    pub enabled: bool,
    /// Global multiplier applied to every effect
    pub strength: f32,
}

impl Default for RumbleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: 1.0,
        }
    }
}

impl ConfigRules for RumbleConfig {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(format!("rumble strength {} outside [0, 1]", self.strength));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ActiveEffect {
    effect: RumbleEffect,
    remaining: u32,
    sequence: u64,
}

pub struct RumbleComponent {
    config: Config<RumbleConfig>,
    channels: Vec<RumbleChannel>,
    effects: Vec<ActiveEffect>,
    next_sequence: u64,
}

impl RumbleComponent {
    pub fn new(channels: impl IntoIterator<Item = RumbleChannel>) -> Self {
        let mut component = Self {
            config: Config::new(RumbleConfig::default()),
            channels: Vec::new(),
            effects: Vec::new(),
            next_sequence: 0,
        };
        for channel in channels {
            component.add_channel(channel);
        }
        component
    }

    /// Register an extra channel; duplicates are ignored
    pub fn add_channel(&mut self, channel: RumbleChannel) {
        if !self.channels.contains(&channel) {
            self.channels.push(channel);
        }
    }

    pub fn channels(&self) -> &[RumbleChannel] {
        &self.channels
    }

    pub fn supports(&self, channel: RumbleChannel) -> bool {
        self.channels.contains(&channel)
    }

    /// Queue an effect; returns `false` if the channel is unsupported or the effect is empty
    pub fn play(&mut self, effect: RumbleEffect) -> bool {
        if !self.supports(effect.channel) || effect.duration_ticks == 0 {
            return false;
        }

        trace!(
            "Rumble {:?} {:?} for {} ticks",
            effect.channel,
            effect.state,
            effect.duration_ticks
        );
        let remaining = effect.duration_ticks;
        self.effects.push(ActiveEffect {
            effect,
            remaining,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        true
    }

    pub fn stop_all(&mut self) {
        self.effects.clear();
    }

    /// Advance effect timers by one tick, dropping expired effects
    pub fn tick(&mut self) {
        for active in &mut self.effects {
            active.remaining = active.remaining.saturating_sub(1);
        }
        self.effects.retain(|active| active.remaining > 0);
    }

    /// Output the device should play on `channel` right now
    pub fn current(&self, channel: RumbleChannel) -> RumbleState {
        let config = &self.config.config;
        if !config.enabled {
            return RumbleState::OFF;
        }

        self.effects
            .iter()
            .filter(|active| active.effect.channel == channel)
            .max_by_key(|active| (active.effect.priority, active.sequence))
            .map(|active| active.effect.state.scaled(config.strength))
            .unwrap_or(RumbleState::OFF)
    }

    pub fn active_effects(&self) -> usize {
        self.effects.len()
    }

    pub fn settings(&self) -> &RumbleConfig {
        &self.config.config
    }

    pub fn settings_mut(&mut self) -> &mut RumbleConfig {
        &mut self.config.config
    }
}

impl Component for RumbleComponent {
    fn id(&self) -> ComponentId {
        Self::ID
    }

    fn tick_finished(&mut self) {
        self.tick();
    }

    fn config(&self) -> Option<&dyn ConfigHolder> {
        Some(&self.config)
    }

    fn config_mut(&mut self) -> Option<&mut dyn ConfigHolder> {
        Some(&mut self.config)
    }
}

impl TypedComponent for RumbleComponent {
    const ID: ComponentId = ComponentId::from_static("controlhub:rumble");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effect_expires_after_duration() {
        let mut rumble = RumbleComponent::new([RumbleChannel::Main]);
        assert!(rumble.play(RumbleEffect::new(RumbleChannel::Main, RumbleState::new(1.0, 0.5), 2)));

        assert_eq!(rumble.current(RumbleChannel::Main), RumbleState::new(1.0, 0.5));
        rumble.tick();
        assert!(!rumble.current(RumbleChannel::Main).is_off());
        rumble.tick();
        assert!(rumble.current(RumbleChannel::Main).is_off());
        assert_eq!(rumble.active_effects(), 0);
    }

    #[test]
    fn test_priority_then_recency() {
        let mut rumble = RumbleComponent::new([RumbleChannel::Main]);
        rumble.play(RumbleEffect::new(RumbleChannel::Main, RumbleState::new(0.9, 0.0), 10).with_priority(5));
        rumble.play(RumbleEffect::new(RumbleChannel::Main, RumbleState::new(0.1, 0.0), 10));
        assert_eq!(rumble.current(RumbleChannel::Main).strong, 0.9);

        rumble.play(RumbleEffect::new(RumbleChannel::Main, RumbleState::new(0.4, 0.0), 10).with_priority(5));
        assert_eq!(rumble.current(RumbleChannel::Main).strong, 0.4);
    }

    #[test]
    fn test_channels_append_cooperatively() {
        let mut rumble = RumbleComponent::new([RumbleChannel::Main]);
        assert!(!rumble.play(RumbleEffect::new(RumbleChannel::Triggers, RumbleState::new(1.0, 1.0), 5)));

        rumble.add_channel(RumbleChannel::Triggers);
        rumble.add_channel(RumbleChannel::Main);
        assert_eq!(rumble.channels(), &[RumbleChannel::Main, RumbleChannel::Triggers]);
        assert!(rumble.play(RumbleEffect::new(RumbleChannel::Triggers, RumbleState::new(1.0, 1.0), 5)));
    }

    #[test]
    fn test_strength_and_disable() {
        let mut rumble = RumbleComponent::new([RumbleChannel::Main]);
        rumble.play(RumbleEffect::new(RumbleChannel::Main, RumbleState::new(1.0, 1.0), 5));

        rumble.settings_mut().strength = 0.5;
        assert_eq!(rumble.current(RumbleChannel::Main), RumbleState::new(0.5, 0.5));

        rumble.settings_mut().enabled = false;
        assert!(rumble.current(RumbleChannel::Main).is_off());
    }
}
