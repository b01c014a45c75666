// in_script.rs - scripted input for headless runs
//
// A script is a list of `action[:frames]` items separated by commas or
// whitespace, e.g. "forward:30, left:10 wait strafeleft:5". Mouse items
// take a delta in degrees instead and last one frame: "mouseyaw:-20".

use qview_common::{QError, QResult};

use crate::camera::FlyCamera;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Forward,
    Back,
    TurnLeft,
    TurnRight,
    StrafeLeft,
    StrafeRight,
    PitchUp,
    PitchDown,
    /// Mouse-style yaw change, in degrees of mouse motion.
    MouseYaw(f32),
    /// Mouse-style pitch change, in degrees of mouse motion.
    MousePitch(f32),
    Wait,
}

impl Action {
    /// Actions that take no argument.
    pub fn from_name(name: &str) -> Option<Action> {
        let action = match name.to_ascii_lowercase().as_str() {
            "forward" => Action::Forward,
            "back" => Action::Back,
            "left" => Action::TurnLeft,
            "right" => Action::TurnRight,
            "strafeleft" => Action::StrafeLeft,
            "straferight" => Action::StrafeRight,
            "up" => Action::PitchUp,
            "down" => Action::PitchDown,
            "wait" => Action::Wait,
            _ => return None,
        };
        Some(action)
    }

    /// Feeds the action into the camera for one frame.
    pub fn apply(self, camera: &mut FlyCamera) {
        match self {
            Action::Forward => camera.move_forward(),
            Action::Back => camera.move_backward(),
            Action::TurnLeft => camera.turn_left(),
            Action::TurnRight => camera.turn_right(),
            Action::StrafeLeft => camera.strafe_left(),
            Action::StrafeRight => camera.strafe_right(),
            Action::PitchUp => camera.pitch_up(),
            Action::PitchDown => camera.pitch_down(),
            Action::MouseYaw(delta) => camera.yaw(delta),
            Action::MousePitch(delta) => camera.pitch(delta),
            Action::Wait => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptStep {
    pub action: Action,
    pub frames: u32,
}

fn parse_step(item: &str, name: &str, arg: Option<&str>) -> QResult<ScriptStep> {
    let lower = name.to_ascii_lowercase();
    if lower == "mouseyaw" || lower == "mousepitch" {
        let delta = arg
            .and_then(|a| a.parse::<f32>().ok())
            .filter(|d| d.is_finite())
            .ok_or_else(|| QError::Format(format!("script: bad mouse delta in \"{}\"", item)))?;
        let action = if lower == "mouseyaw" {
            Action::MouseYaw(delta)
        } else {
            Action::MousePitch(delta)
        };
        return Ok(ScriptStep { action, frames: 1 });
    }

    let frames = match arg {
        Some(count) => count.parse::<u32>().ok().filter(|&n| n > 0).ok_or_else(|| {
            QError::Format(format!("script: bad frame count in \"{}\"", item))
        })?,
        None => 1,
    };
    let action = Action::from_name(name)
        .ok_or_else(|| QError::Format(format!("script: unknown action \"{}\"", name)))?;
    Ok(ScriptStep { action, frames })
}

/// A parsed script, played back one frame at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputScript {
    steps: Vec<ScriptStep>,
}

impl InputScript {
    pub fn parse(text: &str) -> QResult<InputScript> {
        let mut steps = Vec::new();
        for item in text.split(|c: char| c == ',' || c.is_whitespace()) {
            if item.is_empty() {
                continue;
            }
            let (name, arg) = match item.split_once(':') {
                Some((name, arg)) => (name, Some(arg)),
                None => (item, None),
            };
            steps.push(parse_step(item, name, arg)?);
        }
        Ok(InputScript { steps })
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }

    /// Frames needed to play the whole script.
    pub fn total_frames(&self) -> u64 {
        self.steps.iter().map(|s| s.frames as u64).sum()
    }

    /// Action for a zero-based frame number; `Wait` once the script ends.
    pub fn action_at(&self, frame: u64) -> Action {
        let mut remaining = frame;
        for step in &self.steps {
            if remaining < step.frames as u64 {
                return step.action;
            }
            remaining -= step.frames as u64;
        }
        Action::Wait
    }

    /// Iterates the script frame by frame.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.steps
            .iter()
            .flat_map(|s| std::iter::repeat(s.action).take(s.frames as usize))
    }
}
