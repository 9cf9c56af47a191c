//! Synthetic layered animations.
//!
//! A [`Scene`] describes a small layered project (background color, frame
//! time, stacked layers with visibility and opacity) and renders it into
//! composited frames. It feeds the command-line tool and the benchmarks with
//! deterministic input.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{Color, ComposedFrame, ConfigError, Frame, FrameError};

fn default_frame_time_ms() -> u64 {
    130
}

fn default_visible() -> bool {
    true
}

fn default_opacity() -> f32 {
    1.0
}

/// A layered animation rendered frame by frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    /// Color every frame is cleared to before layers are drawn.
    pub background: Color,
    /// Display time of each frame in milliseconds.
    #[serde(default = "default_frame_time_ms")]
    pub frame_time_ms: u64,
    pub frame_count: usize,
    /// Layers, bottom first.
    pub layers: Vec<Layer>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            background: Color::WHITE,
            frame_time_ms: default_frame_time_ms(),
            frame_count: 24,
            layers: vec![
                Layer {
                    name: "sky".to_string(),
                    visible: true,
                    opacity: 1.0,
                    pattern: Pattern::Gradient {
                        from: Color::rgb(40, 90, 200),
                        to: Color::rgb(250, 200, 120),
                        vertical: true,
                    },
                },
                Layer {
                    name: "ball".to_string(),
                    visible: true,
                    opacity: 1.0,
                    pattern: Pattern::Disc {
                        center: (0.2, 0.5),
                        radius: 0.12,
                        velocity: (0.03, 0.0),
                        color: Color::rgb(220, 30, 40),
                    },
                },
                Layer {
                    name: "label".to_string(),
                    visible: true,
                    opacity: 0.75,
                    pattern: Pattern::Rectangle {
                        position: (0.05, 0.85),
                        size: (0.5, 0.1),
                        velocity: (0.0, 0.0),
                        color: Color::BLACK,
                    },
                },
            ],
        }
    }
}

/// A single layer of a scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Layer opacity (0.0-1.0), multiplied with the pattern color's alpha.
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    pub pattern: Pattern,
}

/// Content drawn by a layer. Positions and sizes are fractions of the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Pattern {
    /// Static two-color linear gradient.
    Gradient {
        from: Color,
        to: Color,
        /// Top-to-bottom when true, left-to-right otherwise.
        vertical: bool,
    },
    /// Axis-aligned rectangle moving with a constant per-frame velocity.
    Rectangle {
        position: (f32, f32),
        size: (f32, f32),
        velocity: (f32, f32),
        color: Color,
    },
    /// Filled disc moving with a constant per-frame velocity.
    Disc {
        center: (f32, f32),
        /// Radius as fraction of the smaller frame dimension.
        radius: f32,
        velocity: (f32, f32),
        color: Color,
    },
    /// Randomly scattered pixels, re-rolled every frame.
    Noise {
        /// Probability that a pixel is painted.
        density: f32,
        color: Color,
        seed: u64,
    },
}

impl Scene {
    /// Validate scene parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.frame_count == 0 {
            return Err(ConfigError::NoFrames);
        }
        for (i, layer) in self.layers.iter().enumerate() {
            if !(0.0..=1.0).contains(&layer.opacity) {
                return Err(ConfigError::InvalidOpacity {
                    layer: i,
                    opacity: layer.opacity,
                });
            }
        }
        Ok(())
    }

    /// Display duration of every frame.
    pub fn frame_time(&self) -> Duration {
        Duration::from_millis(self.frame_time_ms)
    }

    /// Render all frames.
    pub fn render(&self) -> Result<Vec<ComposedFrame>, FrameError> {
        (0..self.frame_count)
            .map(|index| {
                Ok(ComposedFrame::new(
                    self.render_frame(index)?,
                    self.frame_time(),
                ))
            })
            .collect()
    }

    /// Composite the visible layers of frame `index` over the background.
    pub fn render_frame(&self, index: usize) -> Result<Frame, FrameError> {
        let mut frame = Frame::filled(self.width, self.height, self.background)?;
        for layer in self.layers.iter().filter(|l| l.visible) {
            draw_layer(&mut frame, layer, index);
        }
        Ok(frame)
    }
}

fn draw_layer(frame: &mut Frame, layer: &Layer, index: usize) {
    let width = frame.width();
    let height = frame.height();
    let w = width as f32;
    let h = height as f32;
    let t = index as f32;

    match &layer.pattern {
        Pattern::Gradient { from, to, vertical } => {
            let span = (if *vertical { h - 1.0 } else { w - 1.0 }).max(1.0);
            for y in 0..height {
                for x in 0..width {
                    let along = (if *vertical { y } else { x }) as f32 / span;
                    let color = lerp_color(*from, *to, along);
                    blend_pixel(frame, x, y, color, layer.opacity);
                }
            }
        }
        Pattern::Rectangle {
            position,
            size,
            velocity,
            color,
        } => {
            let left = ((position.0 + velocity.0 * t).rem_euclid(1.0) * w) as u32;
            let top = ((position.1 + velocity.1 * t).rem_euclid(1.0) * h) as u32;
            let right = (left + (size.0 * w).round() as u32).min(width);
            let bottom = (top + (size.1 * h).round() as u32).min(height);
            for y in top..bottom {
                for x in left..right {
                    blend_pixel(frame, x, y, *color, layer.opacity);
                }
            }
        }
        Pattern::Disc {
            center,
            radius,
            velocity,
            color,
        } => {
            let cx = (center.0 + velocity.0 * t).rem_euclid(1.0) * w;
            let cy = (center.1 + velocity.1 * t).rem_euclid(1.0) * h;
            let r = radius * w.min(h);
            let r_sq = r * r;
            for y in 0..height {
                for x in 0..width {
                    let dx = x as f32 + 0.5 - cx;
                    let dy = y as f32 + 0.5 - cy;
                    if dx * dx + dy * dy <= r_sq {
                        blend_pixel(frame, x, y, *color, layer.opacity);
                    }
                }
            }
        }
        Pattern::Noise {
            density,
            color,
            seed,
        } => {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            for y in 0..height {
                for x in 0..width {
                    if rng.r#gen::<f32>() < *density {
                        blend_pixel(frame, x, y, *color, layer.opacity);
                    }
                }
            }
        }
    }
}

fn lerp_color(from: Color, to: Color, t: f32) -> Color {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color::rgba(
        mix(from.r, to.r),
        mix(from.g, to.g),
        mix(from.b, to.b),
        mix(from.a, to.a),
    )
}

/// Source-over blend of `color` scaled by `opacity` onto the frame pixel.
fn blend_pixel(frame: &mut Frame, x: u32, y: u32, color: Color, opacity: f32) {
    let alpha = color.a as f32 / 255.0 * opacity;
    if alpha <= 0.0 {
        return;
    }
    let dst = frame.pixel(x, y);
    let mix = |s: u8, d: u8| (s as f32 * alpha + d as f32 * (1.0 - alpha)).round() as u8;
    let out_alpha = (255.0 * alpha + dst.a as f32 * (1.0 - alpha)).round() as u8;
    frame.set_pixel(
        x,
        y,
        Color::rgba(
            mix(color.r, dst.r),
            mix(color.g, dst.g),
            mix(color.b, dst.b),
            out_alpha,
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scene_renders_all_frames() {
        let scene = Scene::default();
        let frames = scene.render().unwrap();
        assert_eq!(frames.len(), scene.frame_count);
        for composed in &frames {
            assert_eq!(composed.frame.dimensions(), (scene.width, scene.height));
            assert_eq!(composed.duration, Duration::from_millis(130));
        }
    }

    #[test]
    fn test_hidden_layers_are_skipped() {
        let mut scene = Scene {
            width: 8,
            height: 8,
            background: Color::WHITE,
            frame_time_ms: 100,
            frame_count: 1,
            layers: vec![Layer {
                name: "box".to_string(),
                visible: false,
                opacity: 1.0,
                pattern: Pattern::Rectangle {
                    position: (0.0, 0.0),
                    size: (1.0, 1.0),
                    velocity: (0.0, 0.0),
                    color: Color::BLACK,
                },
            }],
        };
        let hidden = scene.render_frame(0).unwrap();
        assert!(hidden.pixels().iter().all(|&p| p == Color::WHITE));

        scene.layers[0].visible = true;
        let shown = scene.render_frame(0).unwrap();
        assert!(shown.pixels().iter().all(|&p| p == Color::BLACK));
    }

    #[test]
    fn test_half_opacity_blends() {
        let mut frame = Frame::filled(1, 1, Color::WHITE).unwrap();
        blend_pixel(&mut frame, 0, 0, Color::BLACK, 0.5);
        let px = frame.pixel(0, 0);
        assert!(px.r == 127 || px.r == 128);
        assert_eq!(px.a, 255);
    }

    #[test]
    fn test_noise_is_deterministic() {
        let scene = Scene {
            width: 16,
            height: 16,
            background: Color::BLACK,
            frame_time_ms: 100,
            frame_count: 2,
            layers: vec![Layer {
                name: "noise".to_string(),
                visible: true,
                opacity: 1.0,
                pattern: Pattern::Noise {
                    density: 0.3,
                    color: Color::WHITE,
                    seed: 7,
                },
            }],
        };
        assert_eq!(scene.render_frame(1).unwrap(), scene.render_frame(1).unwrap());
        assert_ne!(scene.render_frame(0).unwrap(), scene.render_frame(1).unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_opacity() {
        let mut scene = Scene::default();
        scene.layers[1].opacity = 1.5;
        assert!(matches!(
            scene.validate(),
            Err(ConfigError::InvalidOpacity { layer: 1, .. })
        ));
    }
}
