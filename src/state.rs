//! node state, in the shape the api server expects it

use lora_packet::MessagePacket;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatePostRequest {
    pub barometer_state: BarometerState,
    pub power: PowerState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BarometerState {
    pub pressure: f32,
    pub temperature: f32,
    pub altitude: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerState {
    #[serde(rename = "Current_mA")]
    pub current_ma: f32,
    #[serde(rename = "LoadVoltage")]
    pub load_voltage: f32,
    #[serde(rename = "Power_mW")]
    pub power_mw: f32,
}

impl From<&MessagePacket> for StatePostRequest {
    fn from(msg: &MessagePacket) -> Self {
        Self {
            barometer_state: BarometerState {
                pressure: msg.pressure,
                temperature: msg.temperature,
                altitude: msg.altitude,
            },
            power: PowerState {
                current_ma: msg.current_ma,
                load_voltage: msg.load_voltage,
                power_mw: msg.power_mw,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_shape() {
        let msg = MessagePacket::new(1013.25, 22.5, 120.0, 150.0, 3.5, 525.0);
        let value = serde_json::to_value(StatePostRequest::from(&msg)).unwrap();
        assert_eq!(
            value,
            json!({
                "BarometerState": {
                    "Pressure": 1013.25,
                    "Temperature": 22.5,
                    "Altitude": 120.0,
                },
                "Power": {
                    "Current_mA": 150.0,
                    "LoadVoltage": 3.5,
                    "Power_mW": 525.0,
                },
            })
        );
    }
}
