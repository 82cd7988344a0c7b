// input.rs: window events to viewer input, touch filtering, listener bookkeeping

use std::collections::BTreeSet;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent};

/// Pixels per wheel "line", matching what browsers report for one notch.
const LINE_DELTA_PX: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    Touch { id: u64, phase: TouchPhase, x: f32, y: f32 },
    Wheel { delta_y: f32 },
    Resize { width: u32, height: u32 },
}

impl InputEvent {
    pub fn kind(&self) -> ListenerKind {
        match self {
            InputEvent::PointerDown { .. } | InputEvent::PointerMove { .. } | InputEvent::PointerUp => {
                ListenerKind::Pointer
            }
            InputEvent::Touch { .. } => ListenerKind::Touch,
            InputEvent::Wheel { .. } => ListenerKind::Wheel,
            InputEvent::Resize { .. } => ListenerKind::Resize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ListenerKind {
    Pointer,
    Touch,
    Wheel,
    Resize,
}

impl ListenerKind {
    pub const ALL: [ListenerKind; 4] = [
        ListenerKind::Pointer,
        ListenerKind::Touch,
        ListenerKind::Wheel,
        ListenerKind::Resize,
    ];
}

/// Input kinds a viewer currently listens to.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    active: BTreeSet<ListenerKind>,
}

impl ListenerRegistry {
    pub fn register(&mut self, kind: ListenerKind) -> bool {
        let added = self.active.insert(kind);
        if added {
            log::debug!("listener added: {kind:?}");
        }
        added
    }

    pub fn register_all(&mut self) {
        for kind in ListenerKind::ALL {
            self.register(kind);
        }
    }

    pub fn unregister(&mut self, kind: ListenerKind) -> bool {
        let removed = self.active.remove(&kind);
        if removed {
            log::debug!("listener removed: {kind:?}");
        }
        removed
    }

    pub fn clear(&mut self) {
        for kind in ListenerKind::ALL {
            self.unregister(kind);
        }
    }

    pub fn is_registered(&self, kind: ListenerKind) -> bool {
        self.active.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Whether the host should stop propagating an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventResponse {
    pub consumed: bool,
}

/// Single-finger drag filter. A second finger cancels the drag until all fingers lift.
#[derive(Debug, Default)]
pub struct TouchTracker {
    fingers: BTreeSet<u64>,
    primary: Option<u64>,
    suspended: bool,
}

/// What a touch event means for the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchAction {
    Begin { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    End,
    Ignore,
}

impl TouchTracker {
    pub fn handle(&mut self, id: u64, phase: TouchPhase, x: f32, y: f32) -> TouchAction {
        match phase {
            TouchPhase::Started => {
                self.fingers.insert(id);
                if self.fingers.len() == 1 && !self.suspended {
                    self.primary = Some(id);
                    TouchAction::Begin { x, y }
                } else {
                    self.suspended = true;
                    if self.primary.take().is_some() {
                        TouchAction::End
                    } else {
                        TouchAction::Ignore
                    }
                }
            }
            TouchPhase::Moved => {
                if self.primary == Some(id) && !self.suspended {
                    TouchAction::Move { x, y }
                } else {
                    TouchAction::Ignore
                }
            }
            TouchPhase::Ended | TouchPhase::Cancelled => {
                self.fingers.remove(&id);
                if self.fingers.is_empty() {
                    self.suspended = false;
                }
                if self.primary == Some(id) {
                    self.primary = None;
                    TouchAction::End
                } else {
                    TouchAction::Ignore
                }
            }
        }
    }

    pub fn active_fingers(&self) -> usize {
        self.fingers.len()
    }
}

/// Keeps the last cursor position so button presses carry coordinates.
#[derive(Debug, Default)]
pub struct PointerTracker {
    position: Option<(f32, f32)>,
}

/// Maps a winit window event to viewer input. Returns `None` for unrelated events.
pub fn translate(event: &WindowEvent<'_>, pointer: &mut PointerTracker) -> Option<InputEvent> {
    match event {
        WindowEvent::CursorMoved { position, .. } => {
            let (x, y) = (position.x as f32, position.y as f32);
            pointer.position = Some((x, y));
            Some(InputEvent::PointerMove { x, y })
        }
        WindowEvent::CursorLeft { .. } => Some(InputEvent::PointerUp),
        WindowEvent::MouseInput {
            state,
            button: MouseButton::Left,
            ..
        } => match state {
            ElementState::Pressed => {
                let (x, y) = pointer.position?;
                Some(InputEvent::PointerDown { x, y })
            }
            ElementState::Released => Some(InputEvent::PointerUp),
        },
        WindowEvent::MouseWheel { delta, .. } => {
            let delta_y = match delta {
                MouseScrollDelta::LineDelta(_, y) => -y * LINE_DELTA_PX,
                MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
            };
            Some(InputEvent::Wheel { delta_y })
        }
        WindowEvent::Touch(touch) => Some(InputEvent::Touch {
            id: touch.id,
            phase: touch.phase,
            x: touch.location.x as f32,
            y: touch.location.y as f32,
        }),
        WindowEvent::Resized(size) => Some(InputEvent::Resize {
            width: size.width,
            height: size.height,
        }),
        WindowEvent::ScaleFactorChanged { new_inner_size, .. } => Some(InputEvent::Resize {
            width: new_inner_size.width,
            height: new_inner_size.height,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_clear_removes_everything() {
        let mut reg = ListenerRegistry::default();
        reg.register_all();
        assert_eq!(reg.len(), 4);
        assert!(!reg.register(ListenerKind::Wheel));
        reg.clear();
        assert!(reg.is_empty());
        assert!(!reg.is_registered(ListenerKind::Resize));
    }

    #[test]
    fn single_finger_drag_is_forwarded() {
        let mut touch = TouchTracker::default();
        assert_eq!(
            touch.handle(1, TouchPhase::Started, 5.0, 6.0),
            TouchAction::Begin { x: 5.0, y: 6.0 }
        );
        assert_eq!(
            touch.handle(1, TouchPhase::Moved, 8.0, 6.0),
            TouchAction::Move { x: 8.0, y: 6.0 }
        );
        assert_eq!(touch.handle(1, TouchPhase::Ended, 8.0, 6.0), TouchAction::End);
        assert_eq!(touch.active_fingers(), 0);
    }

    #[test]
    fn second_finger_suspends_until_all_lift() {
        let mut touch = TouchTracker::default();
        touch.handle(1, TouchPhase::Started, 0.0, 0.0);
        assert_eq!(touch.handle(2, TouchPhase::Started, 10.0, 0.0), TouchAction::End);
        assert_eq!(touch.handle(1, TouchPhase::Moved, 3.0, 3.0), TouchAction::Ignore);
        assert_eq!(touch.handle(2, TouchPhase::Moved, 9.0, 1.0), TouchAction::Ignore);

        assert_eq!(touch.handle(2, TouchPhase::Ended, 9.0, 1.0), TouchAction::Ignore);
        // finger 1 is still down, so a new touch must not start a drag yet
        assert_eq!(touch.handle(3, TouchPhase::Started, 0.0, 0.0), TouchAction::Ignore);
        touch.handle(3, TouchPhase::Ended, 0.0, 0.0);
        touch.handle(1, TouchPhase::Ended, 0.0, 0.0);

        assert_eq!(
            touch.handle(4, TouchPhase::Started, 1.0, 1.0),
            TouchAction::Begin { x: 1.0, y: 1.0 }
        );
    }

    #[test]
    fn event_kinds_map_to_listeners() {
        assert_eq!(InputEvent::PointerUp.kind(), ListenerKind::Pointer);
        assert_eq!(InputEvent::Wheel { delta_y: 1.0 }.kind(), ListenerKind::Wheel);
        assert_eq!(
            InputEvent::Resize { width: 1, height: 1 }.kind(),
            ListenerKind::Resize
        );
    }
}
