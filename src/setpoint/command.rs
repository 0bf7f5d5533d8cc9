use serde::{Deserialize, Serialize};

/// Desired pan/tilt orientation in logical degrees.
///
/// Offsets and clamping are applied by the controller, not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetpointCommand{
    pub pan_angle: f64,
    pub tilt_angle: f64,
}

impl SetpointCommand{
    pub fn new(pan_angle: f64, tilt_angle: f64) -> Self{
        SetpointCommand{ pan_angle, tilt_angle }
    }

    pub fn offset_by(&self, pan_offset: f64, tilt_offset: f64) -> Self{
        SetpointCommand{
            pan_angle: self.pan_angle + pan_offset,
            tilt_angle: self.tilt_angle + tilt_offset,
        }
    }
}

#[cfg(test)]
mod tests{
    use super::*;

    #[test]
    fn test_offset_by(){
        let cmd = SetpointCommand::new(0.0, 0.0).offset_by(2.0, 15.0);
        assert_eq!(cmd, SetpointCommand::new(2.0, 15.0));

        let cmd = SetpointCommand::new(90.0, 45.0).offset_by(-3.5, 0.0);
        assert_eq!(cmd, SetpointCommand::new(86.5, 45.0));
    }

    #[test]
    fn test_json_shape(){
        let cmd: SetpointCommand = serde_json::from_str(r#"{"pan_angle": 12, "tilt_angle": 7.5}"#).unwrap();
        assert_eq!(cmd, SetpointCommand::new(12.0, 7.5));
    }
}
