// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 日志初始化：优先使用外部 YAML 配置，缺失或非法时退回到控制台输出。

use log::{warn, LevelFilter};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

/// 默认的 log4rs 配置文件路径
pub const LOG_CONFIG: &str = "config/log4rs.yaml";

const FALLBACK_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

pub fn init(path: &str) {
    let file_error = match log4rs::init_file(path, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FALLBACK_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info));

    match config {
        Ok(config) => match log4rs::init_config(config) {
            Ok(_) => warn!("无法从{}加载日志配置：{}，已改用控制台日志", path, file_error),
            Err(e) => eprintln!("无法初始化日志系统：{}", e),
        },
        Err(e) => eprintln!("无法构建日志配置：{}", e),
    }
}
