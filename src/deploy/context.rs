//! Deployment layout: where templates live and what goes to the robot.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the deployment handler needs besides operator input.
///
/// Passed explicitly into [`super::Deployer`]; nothing is read from ambient
/// state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentContext {
    /// Browser socket script template.
    pub socket_template: PathBuf,
    /// Generated browser socket script.
    pub socket_script: PathBuf,
    /// Placeholder in the socket template replaced by the device IP.
    pub socket_placeholder: String,
    /// Robot start script template.
    pub start_template: PathBuf,
    /// Generated robot start script.
    pub start_script: PathBuf,
    /// Placeholder in the start template replaced by the device IP.
    pub start_placeholder: String,
    /// SSH user on the robot.
    pub robot_user: String,
    /// Directory on the robot that receives the scripts.
    pub remote_dir: String,
    /// Local files copied to the robot.
    pub files: Vec<PathBuf>,
    /// Service logs (without `.log`) available in the remote directory.
    pub logs: Vec<String>,
    /// `-o` options passed to both ssh and scp.
    pub ssh_options: Vec<String>,
    /// Timeout for each individual step, in seconds.
    pub step_timeout_secs: u64,
}

impl Default for DeploymentContext {
    fn default() -> Self {
        let input = PathBuf::from("/opt/input");
        let output = PathBuf::from("/opt/output");
        let html = PathBuf::from("/opt/processing/webserver/html");

        Self {
            socket_template: html.join("socket.js.template"),
            socket_script: html.join("socket.js"),
            socket_placeholder: "127.0.0.1".to_string(),
            start_template: input.join("robot_scripts/start.sh.template"),
            start_script: input.join("robot_scripts/start.sh"),
            start_placeholder: "unknown".to_string(),
            robot_user: "nao".to_string(),
            remote_dir: "/home/nao/cbsr".to_string(),
            files: vec![
                input.join("cert.pem"),
                input.join("robot_scripts/start.sh"),
                input.join("robot_scripts/stop.sh"),
                input.join("robot_microphone/robot_sound_processing.py"),
                input.join("robot_camera/visual_producer.py"),
                output.join("robot_actions/action_consumer.py"),
                output.join("robot_tablet/tablet.py"),
                output.join("robot_tablet/tablet_consumer.py"),
            ],
            logs: [
                "action_consumer",
                "event_producer",
                "robot_sound_processing",
                "tablet_consumer",
                "visual_producer",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ssh_options: vec![
                "StrictHostKeyChecking=no".to_string(),
                "UserKnownHostsFile=/dev/null".to_string(),
                "LogLevel=ERROR".to_string(),
            ],
            step_timeout_secs: 60,
        }
    }
}

impl DeploymentContext {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
