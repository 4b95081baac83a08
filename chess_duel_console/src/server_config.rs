use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::network;


#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum StringSource {
    Literal(String),
    EnvVar(String),
    File(String),
}

impl StringSource {
    pub fn get(&self) -> anyhow::Result<String> {
        match self {
            Self::Literal(s) => Ok(s.clone()),
            Self::EnvVar(v) => {
                std::env::var(v).context(format!("Missing environment variable '{v}'."))
            }
            Self::File(f) => {
                std::fs::read_to_string(f).context(format!("Failed to read file '{f}'."))
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    // HTTP server with status page, metrics and (optionally) the web client.
    #[serde(default)]
    pub status_port: Option<u16>,
    #[serde(default)]
    pub static_content_dir: Option<String>,
    // FEN; standard chess starting position if absent.
    #[serde(default)]
    pub starting_position: Option<StringSource>,
}

fn default_port() -> u16 { network::PORT }

impl ServerConfig {
    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(contents).context("Parsing config file")
    }

    pub fn read_file(filename: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(filename)
            .with_context(|| format!("Reading config file '{filename}'"))?;
        Self::from_yaml(&contents)
    }
}
