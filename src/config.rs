// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模块
//!
//! 配置从 TOML 文件读取，每个字段都有默认值，文件中可以只写需要覆盖的部分。
//! 监听端口最后由环境变量 `PORT` 决定（若已设置且合法）。

use log::{error, info, warn};
use serde_derive::{Deserialize, Serialize};

use std::fs;

use crate::{cors::CorsConfig, exception::Exception, param::DEFAULT_COLLECTION, student::Student};

/// 指定监听端口的环境变量
pub const PORT_ENV: &str = "PORT";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    port: u16,
    local: bool,
    worker_threads: usize,
    collection: String,
    max_request_size: usize,
    read_timeout_ms: u64,
    enable_compression: bool,
    cors: CorsConfig,
    /// 启动时预置的学生记录，其中的 `student_id` 会被重新分配
    seed: Vec<Student>,
}

fn default_port() -> u16 {
    8080
}

fn default_max_request_size() -> usize {
    1048576 // 1MB
}

fn default_read_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: default_port(),
            local: false,
            worker_threads: 0,
            collection: DEFAULT_COLLECTION.to_string(),
            max_request_size: default_max_request_size(),
            read_timeout_ms: default_read_timeout_ms(),
            enable_compression: true,
            cors: CorsConfig::default(),
            seed: Vec::new(),
        }
    }

    /// 从 TOML 文件构建配置。
    ///
    /// 文件不存在时使用默认配置；文件存在但无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Self {
        let str_val = match fs::read_to_string(filename) {
            Ok(s) => s,
            Err(e) => {
                warn!("无法读取配置文件{}：{}，使用默认配置", filename, e);
                return Self::new().normalized();
            }
        };

        let raw_config = match Self::parse(&str_val) {
            Ok(config) => config,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象：{}，使用默认配置", e);
                Self::new()
            }
        };
        raw_config.normalized()
    }

    /// 解析 TOML 文本
    pub fn parse(text: &str) -> Result<Self, Exception> {
        toml::from_str(text).map_err(|e| Exception::ConfigUnreadable(e.to_string()))
    }

    /// 用环境变量 `PORT` 覆盖端口。未设置时保留当前端口，非法值记录警告后忽略。
    pub fn apply_env_port(&mut self, value: Option<String>) -> &mut Self {
        match value {
            None => info!("${}未设置，使用端口{}", PORT_ENV, self.port),
            Some(v) => match v.trim().parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => warn!("${}的值{:?}不是合法端口，使用端口{}", PORT_ENV, v, self.port),
            },
        }
        self
    }

    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.max_request_size == 0 {
            warn!("max_request_size被设置为0，该值将被改为默认值。");
            self.max_request_size = default_max_request_size();
        }
        self
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }

    pub fn enable_compression(&self) -> bool {
        self.enable_compression
    }

    pub fn cors(&self) -> &CorsConfig {
        &self.cors
    }

    pub fn seed(&self) -> &[Student] {
        &self.seed
    }
}

/// 供测试和嵌入方使用的链式设置
impl Config {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    pub fn with_read_timeout_ms(mut self, timeout: u64) -> Self {
        self.read_timeout_ms = timeout;
        self
    }

    pub fn with_max_request_size(mut self, size: usize) -> Self {
        self.max_request_size = size;
        self
    }

    pub fn with_seed(mut self, seed: Vec<Student>) -> Self {
        self.seed = seed;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.port(), 8080);
        assert_eq!(config.collection(), "students");
        assert!(config.enable_compression());
        assert!(config.seed().is_empty());
        assert_eq!(config.cors().allow_origin, "*");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::parse("port = 9000\nlocal = true\n").unwrap();
        assert_eq!(config.port(), 9000);
        assert!(config.local());
        assert_eq!(config.collection(), "students");
        assert_eq!(config.read_timeout_ms(), 5000);
    }

    #[test]
    fn test_seed_and_cors_tables() {
        let text = r#"
collection = "pupils"

[cors]
allow_origin = "https://school.example"

[[seed]]
name = "Tungno"
age = 30

[[seed]]
name = "Didim"
age = 31
"#;
        let config = Config::parse(text).unwrap();
        assert_eq!(config.collection(), "pupils");
        assert_eq!(config.cors().allow_origin, "https://school.example");
        assert_eq!(config.cors().allow_headers, "Content-Type, Accept");
        assert_eq!(config.seed().len(), 2);
        assert_eq!(config.seed()[1], Student::new("Didim", 31));
    }

    #[test]
    fn test_invalid_toml() {
        match Config::parse("port = \"eighty\"") {
            Err(Exception::ConfigUnreadable(_)) => {}
            other => panic!("Expected ConfigUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 7000\nworker_threads = 0").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap());

        assert_eq!(config.port(), 7000);
        assert!(config.worker_threads() >= 1);
    }

    #[test]
    fn test_from_toml_broken_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = [").unwrap();

        let config = Config::from_toml(file.path().to_str().unwrap());

        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_from_toml_missing_file() {
        let config = Config::from_toml("/nonexistent/students.toml");
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_env_port() {
        let mut config = Config::new();
        config.apply_env_port(Some("9090".to_string()));
        assert_eq!(config.port(), 9090);

        config.apply_env_port(Some("not-a-port".to_string()));
        assert_eq!(config.port(), 9090);

        config.apply_env_port(None);
        assert_eq!(config.port(), 9090);
    }
}
