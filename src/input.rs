// SPDX-License-Identifier: MPL-2.0

//! Mapping of window events onto camera operations.
//!
//! The types here are independent of the windowing library so that the mapping can be exercised
//! without a window.

use crate::camera::Camera;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    W,
    A,
    S,
    D,
    R,
}

/// What the host should do after a key press, beyond the camera change already made.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    /// The camera moved; a redraw is needed.
    Camera,
    ReloadPrograms,
}

/// Button assignments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub rotate_button: MouseButton,
    pub zoom_button: MouseButton,
    /// Panning is unbound unless a button is given here.
    pub pan_button: Option<MouseButton>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            rotate_button: MouseButton::Left,
            zoom_button: MouseButton::Right,
            pan_button: None,
        }
    }
}

impl Controls {
    /// Starts the interaction bound to `button`. Returns whether any was.
    pub fn mouse_down(&self, camera: &mut Camera, button: MouseButton, x: f32, y: f32) -> bool {
        self.dispatch(
            camera,
            button,
            (x, y),
            [Camera::start_rotating, Camera::start_zooming, Camera::start_panning],
        )
    }

    /// Stops the interaction bound to `button`. Returns whether any was.
    pub fn mouse_up(&self, camera: &mut Camera, button: MouseButton, x: f32, y: f32) -> bool {
        self.dispatch(
            camera,
            button,
            (x, y),
            [Camera::stop_rotating, Camera::stop_zooming, Camera::stop_panning],
        )
    }

    /// Feeds a cursor position to every drag interaction. Inactive ones ignore it.
    ///
    /// Returns whether the camera may have moved.
    pub fn mouse_move(&self, camera: &mut Camera, x: f32, y: f32) -> bool {
        let active = camera.is_rotating() || camera.is_zooming() || camera.is_panning();

        camera.set_rotation_x(y);
        camera.set_rotation_y(x);
        camera.safe_zoom(y);
        camera.safe_pan(x, y);

        active
    }

    pub fn key(&self, camera: &mut Camera, key: Key) -> KeyAction {
        match key {
            Key::Up | Key::W => camera.zoom(-1.0),
            Key::Down | Key::S => camera.zoom(1.0),
            Key::Left | Key::A => camera.rotate(-1.0),
            Key::Right | Key::D => camera.rotate(1.0),
            Key::R => return KeyAction::ReloadPrograms,
        }

        KeyAction::Camera
    }

    /// Calls the rotate, zoom or pan handler of every interaction bound to `button`.
    fn dispatch(
        &self,
        camera: &mut Camera,
        button: MouseButton,
        (x, y): (f32, f32),
        [rotate, zoom, pan]: [fn(&mut Camera, f32, f32); 3],
    ) -> bool {
        let mut handled = false;
        if button == self.rotate_button {
            rotate(camera, x, y);
            handled = true;
        }
        if button == self.zoom_button {
            zoom(camera, x, y);
            handled = true;
        }
        if self.pan_button == Some(button) {
            pan(camera, x, y);
            handled = true;
        }

        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_drag_rotates() {
        let controls = Controls::default();
        let mut camera = Camera::new();

        assert!(controls.mouse_down(&mut camera, MouseButton::Left, 10.0, 10.0));
        assert!(camera.is_rotating());
        assert!(!camera.is_zooming());

        assert!(controls.mouse_move(&mut camera, 30.0, 10.0));
        assert!((camera.rotation_y() - 20.0 * camera.step()).abs() < 1e-6);
        assert_eq!(camera.rotation_x(), 0.0);

        assert!(controls.mouse_up(&mut camera, MouseButton::Left, 30.0, 10.0));
        assert!(!camera.is_rotating());
    }

    #[test]
    fn right_drag_zooms() {
        let controls = Controls::default();
        let mut camera = Camera::new();
        let distance = camera.distance();

        controls.mouse_down(&mut camera, MouseButton::Right, 0.0, 0.0);
        controls.mouse_move(&mut camera, 0.0, 5.0);

        assert!((camera.distance() - (distance + camera.step())).abs() < 1e-6);
        assert_eq!(camera.rotation_y(), 0.0);
    }

    #[test]
    fn panning_is_unbound_by_default() {
        let mut camera = Camera::new();

        assert!(!Controls::default().mouse_down(&mut camera, MouseButton::Middle, 0.0, 0.0));
        assert!(!camera.is_panning());

        let controls = Controls { pan_button: Some(MouseButton::Middle), ..Default::default() };
        assert!(controls.mouse_down(&mut camera, MouseButton::Middle, 0.0, 0.0));
        controls.mouse_move(&mut camera, 10.0, 10.0);

        let (pan_x, pan_y) = camera.pan();
        assert!((pan_x - camera.step()).abs() < 1e-6);
        assert!((pan_y + camera.step()).abs() < 1e-6);
    }

    #[test]
    fn idle_moves_change_nothing() {
        let controls = Controls::default();
        let mut camera = Camera::new();

        assert!(!controls.mouse_move(&mut camera, 100.0, 100.0));
        assert_eq!(camera.rotation_y(), 0.0);
        assert_eq!(camera.distance(), Camera::new().distance());
    }

    #[test]
    fn keys() {
        let controls = Controls::default();
        let mut camera = Camera::new();
        let distance = camera.distance();

        assert_eq!(controls.key(&mut camera, Key::W), KeyAction::Camera);
        assert!((camera.distance() - (distance - camera.step())).abs() < 1e-6);
        controls.key(&mut camera, Key::Down);
        assert!((camera.distance() - distance).abs() < 1e-6);

        controls.key(&mut camera, Key::Right);
        controls.key(&mut camera, Key::D);
        controls.key(&mut camera, Key::A);
        assert!((camera.rotation_y() - 0.01).abs() < 1e-6);

        assert_eq!(controls.key(&mut camera, Key::R), KeyAction::ReloadPrograms);
    }
}
