//! Operator-supplied addresses and credentials.

use std::fmt;
use std::net::IpAddr;

use crate::error::Error;
use crate::Result;

/// Placeholder that replaces secrets in anything shown or logged.
pub const REDACTED: &str = "***";

/// A password that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building commands only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every occurrence of the secret in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.0, REDACTED)
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", REDACTED)
    }
}

/// A robot reachable over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotTarget {
    pub ip: IpAddr,
    pub password: Secret,
}

impl RobotTarget {
    pub fn new(ip: IpAddr, password: Secret) -> Self {
        Self { ip, password }
    }
}

/// Validated settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    /// LAN address of the operator's device; written into the generated scripts.
    pub device_ip: IpAddr,
    /// LAN address of the robot, if one is used.
    pub robot_ip: Option<IpAddr>,
    /// Robot password; may be empty.
    pub robot_password: Secret,
}

impl DeviceSettings {
    /// Validate raw form values.
    ///
    /// The device address is required. The robot address may be empty, but
    /// must be valid when given.
    pub fn parse(device_ip: &str, robot_ip: &str, robot_password: &str) -> Result<Self> {
        let device_ip = parse_ip("device", device_ip)?;
        let robot_ip = match robot_ip.trim() {
            "" => None,
            value => Some(parse_ip("robot", value)?),
        };

        Ok(Self {
            device_ip,
            robot_ip,
            robot_password: Secret::new(robot_password),
        })
    }

    /// The robot to deploy to, when both address and password are known.
    pub fn target(&self) -> Option<RobotTarget> {
        match self.robot_ip {
            Some(ip) if !self.robot_password.is_empty() => {
                Some(RobotTarget::new(ip, self.robot_password.clone()))
            }
            _ => None,
        }
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr> {
    value.trim().parse().map_err(|_| Error::InvalidAddress {
        field,
        value: value.to_string(),
    })
}
