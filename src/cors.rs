// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # CORS 中间件
//!
//! 包裹分发器：所有响应（包括错误响应）都带上跨域访问头；
//! OPTIONS 预检请求直接返回 200，不会进入分发器。

use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::{param::*, request::Request, response::Response};

/// CORS 响应头的取值
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: CORS_ALLOW_ORIGIN.to_string(),
            allow_methods: CORS_ALLOW_METHODS.to_string(),
            allow_headers: CORS_ALLOW_HEADERS.to_string(),
        }
    }
}

pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// 处理一个请求：预检请求就地应答，其余请求交给 `next`
    pub fn handle<F>(&self, request: &Request, id: u128, next: F) -> Response
    where
        F: FnOnce(&Request) -> Response,
    {
        let mut response = if *request.method() == HttpRequestMethod::Options {
            debug!("[ID{}]CORS预检请求，直接返回200", id);
            Response::empty(200)
        } else {
            next(request)
        };
        self.apply(&mut response);
        response
    }

    /// 为响应写入 CORS 头
    pub fn apply(&self, response: &mut Response) {
        response
            .set_header("Access-Control-Allow-Origin", &self.config.allow_origin)
            .set_header("Access-Control-Allow-Methods", &self.config.allow_methods)
            .set_header("Access-Control-Allow-Headers", &self.config.allow_headers);
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self::new(CorsConfig::default())
    }
}
