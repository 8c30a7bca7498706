//! Payload assembly for `send`
//!
//! The core transmits payloads verbatim, so the CLI builds them here: a JSON
//! object for HTTP and a `POST` line for the line protocol.

use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;
use ubidots_client_core::WireFormat;

/// One `variable=value` pair given on the command line
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub variable: String,
    pub value: f64,
}

impl FromStr for Reading {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (variable, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected VARIABLE=VALUE, got '{s}'"))?;

        let variable = variable.trim();
        if variable.is_empty() {
            return Err(format!("missing variable label in '{s}'"));
        }
        if variable.contains(['|', ':', ',', '"', '\r', '\n']) {
            return Err(format!("variable label '{variable}' contains a reserved character"));
        }

        let value: f64 = value
            .trim()
            .parse()
            .map_err(|e| format!("invalid value in '{s}': {e}"))?;
        if !value.is_finite() {
            return Err(format!("value in '{s}' must be finite"));
        }

        Ok(Self {
            variable: variable.to_string(),
            value,
        })
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.variable, self.value)
    }
}

/// JSON object mapping each variable to its value
pub fn json_payload(readings: &[Reading]) -> Result<String> {
    let mut object = Map::new();
    for reading in readings {
        let number = Number::from_f64(reading.value)
            .with_context(|| format!("{} is not representable in JSON", reading.value))?;
        object.insert(reading.variable.clone(), Value::Number(number));
    }
    serde_json::to_string(&Value::Object(object)).context("Failed to serialize payload")
}

/// `<agent>|POST|<token>|<device>:<name>=><var>:<value>,...|end`
pub fn line_payload(
    user_agent: &str,
    token: &str,
    device_label: &str,
    device_name: &str,
    readings: &[Reading],
) -> String {
    let values = readings
        .iter()
        .map(Reading::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("{user_agent}|POST|{token}|{device_label}:{device_name}=>{values}|end")
}

/// Payload in the shape the given wire format expects
pub fn build_payload(
    format: WireFormat,
    user_agent: &str,
    token: &str,
    device_label: &str,
    device_name: &str,
    readings: &[Reading],
) -> Result<String> {
    if readings.is_empty() {
        anyhow::bail!("at least one VARIABLE=VALUE reading is required");
    }
    match format {
        WireFormat::Http => json_payload(readings),
        WireFormat::Line => Ok(line_payload(
            user_agent,
            token,
            device_label,
            device_name,
            readings,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(pairs: &[&str]) -> Vec<Reading> {
        pairs.iter().map(|p| p.parse().unwrap()).collect()
    }

    #[test]
    fn test_parse_reading() {
        let reading: Reading = "temperature=23.4".parse().unwrap();
        assert_eq!(reading.variable, "temperature");
        assert_eq!(reading.value, 23.4);

        assert!("temperature".parse::<Reading>().is_err());
        assert!("=1".parse::<Reading>().is_err());
        assert!("temp=warm".parse::<Reading>().is_err());
        assert!("temp=inf".parse::<Reading>().is_err());
        assert!("a|b=1".parse::<Reading>().is_err());
    }

    #[test]
    fn test_json_payload() {
        let payload = json_payload(&readings(&["temp=23.4", "humidity=40"])).unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["temp"], 23.4);
        assert_eq!(value["humidity"], 40.0);
    }

    #[test]
    fn test_line_payload() {
        let payload = line_payload(
            "RustUbidots/v0.1.0",
            "BBFF-token",
            "weather",
            "Weather Station",
            &readings(&["temp=23.4", "humidity=40"]),
        );
        assert_eq!(
            payload,
            "RustUbidots/v0.1.0|POST|BBFF-token|weather:Weather Station=>temp:23.4,humidity:40|end"
        );
    }

    #[test]
    fn test_build_payload_requires_readings() {
        let result = build_payload(WireFormat::Http, "ua", "t", "dev", "Dev", &[]);
        assert!(result.is_err());
    }
}
