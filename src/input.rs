use std::collections::VecDeque;

use crate::camera::OrbitCamera;

/// Radians of orbit per pixel of pointer travel.
pub const DEFAULT_DRAG_SENSITIVITY: f32 = 0.004;

/// Input delivered by the windowing layer. Mouse and touch are folded into
/// the same pointer events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp { x: f32, y: f32 },
    Resize { width: u32, height: u32 },
}

/// Events waiting for the next frame tick.
///
/// Consecutive moves and consecutive resizes collapse into the latest one, so
/// the queue stays short while the render loop is paused.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        if let Some(last) = self.events.back_mut() {
            let coalesce = matches!(
                (&*last, &event),
                (InputEvent::PointerMove { .. }, InputEvent::PointerMove { .. })
                    | (InputEvent::Resize { .. }, InputEvent::Resize { .. })
            );
            if coalesce {
                *last = event;
                return;
            }
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain(..)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DragStart {
    x: f32,
    y: f32,
    yaw: f32,
    pitch: f32,
}

/// Turns pointer drags into camera targets relative to the angles held when
/// the drag started.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerDrag {
    sensitivity: f32,
    start: Option<DragStart>,
}

impl Default for PointerDrag {
    fn default() -> Self {
        Self::new(DEFAULT_DRAG_SENSITIVITY)
    }
}

impl PointerDrag {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            sensitivity,
            start: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    pub fn pointer_down(&mut self, x: f32, y: f32, camera: &OrbitCamera) {
        if self.start.is_none() {
            self.start = Some(DragStart {
                x,
                y,
                yaw: camera.yaw(),
                pitch: camera.pitch(),
            });
        }
    }

    /// Returns `true` when the move retargeted the camera.
    pub fn pointer_move(&mut self, x: f32, y: f32, camera: &mut OrbitCamera) -> bool {
        let Some(start) = self.start else {
            return false;
        };
        camera.set_target(
            start.yaw + (x - start.x) * self.sensitivity,
            start.pitch + (y - start.y) * self.sensitivity,
        );
        true
    }

    pub fn pointer_up(&mut self) {
        self.start = None;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    #[test]
    fn moves_without_a_press_are_ignored() {
        let mut drag = PointerDrag::default();
        let mut camera = OrbitCamera::default();
        assert!(!drag.pointer_move(100.0, 100.0, &mut camera));
        assert_eq!(camera.target_yaw(), 0.0);
    }

    #[test]
    fn drag_targets_relative_to_start_angles() {
        let mut drag = PointerDrag::default();
        let mut camera = OrbitCamera::default();
        drag.pointer_down(10.0, 20.0, &camera);
        assert!(drag.pointer_move(110.0, 70.0, &mut camera));
        assert!((camera.target_yaw() - 0.4).abs() < 1e-6);
        assert!((camera.target_pitch() - 0.2).abs() < 1e-6);

        drag.pointer_up();
        assert!(!drag.is_dragging());
        assert!(!drag.pointer_move(500.0, 500.0, &mut camera));
        assert!((camera.target_yaw() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn second_press_keeps_the_original_anchor() {
        let mut drag = PointerDrag::default();
        let mut camera = OrbitCamera::default();
        drag.pointer_down(0.0, 0.0, &camera);
        drag.pointer_down(50.0, 50.0, &camera);
        drag.pointer_move(50.0, 0.0, &mut camera);
        assert!((camera.target_yaw() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn vertical_drag_clamps_at_the_pole() {
        let mut drag = PointerDrag::default();
        let mut camera = OrbitCamera::default();
        drag.pointer_down(0.0, 0.0, &camera);
        drag.pointer_move(0.0, 10_000.0, &mut camera);
        assert_eq!(camera.target_pitch(), FRAC_PI_2);
    }

    #[test]
    fn queue_collapses_repeated_moves_and_resizes() {
        let mut queue = InputQueue::new();
        queue.push(InputEvent::PointerDown { x: 0.0, y: 0.0 });
        queue.push(InputEvent::PointerMove { x: 1.0, y: 0.0 });
        queue.push(InputEvent::PointerMove { x: 2.0, y: 0.0 });
        queue.push(InputEvent::Resize { width: 10, height: 10 });
        queue.push(InputEvent::Resize { width: 20, height: 30 });
        queue.push(InputEvent::PointerUp { x: 2.0, y: 0.0 });

        let events: Vec<_> = queue.drain().collect();
        assert_eq!(
            events,
            vec![
                InputEvent::PointerDown { x: 0.0, y: 0.0 },
                InputEvent::PointerMove { x: 2.0, y: 0.0 },
                InputEvent::Resize { width: 20, height: 30 },
                InputEvent::PointerUp { x: 2.0, y: 0.0 },
            ]
        );
        assert!(queue.is_empty());
    }
}
