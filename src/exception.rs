// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了学生信息服务在请求处理生命周期中可能出现的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖协议解析错误、路由错误、编解码错误、存储层错误以及配置错误。
//! - **语义映射**：每个变体通过 [`Exception::status_code`] 对应一个 HTTP 状态码，
//!   分发器据此把错误转换为响应，而不是交给全局处理器。
//! - **用户友好**：`Display` 输出的文本会直接作为纯文本响应体返回给客户端。

use std::fmt;

/// 服务处理请求过程中发生的异常类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行或请求头格式不符合 HTTP 规范。
    MalformedRequest,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 请求报文超过了配置的大小上限。
    PayloadTooLarge,
    /// 请求路径不符合 `/<collection>/<id?>` 的形状。
    MalformedUrl,
    /// 资源路由不支持该 HTTP 方法，携带方法名。
    UnsupportedMethod(String),
    /// POST 请求没有携带任何数据。
    EmptyBody,
    /// 请求体无法解码为学生记录，携带解码器的错误描述。
    InvalidJson(String),
    /// 响应体 JSON 编码失败。
    EncodeFailed(String),
    /// 按标识符查找的学生不存在。
    StudentNotFound,
    /// 以提交的标识符为键的学生已存在。
    StudentExists,
    /// 存储层内部错误。内存存储不会产生该错误，为其他存储实现保留。
    StorageFailure(String),
    /// 配置文件无法读取。
    ConfigUnreadable(String),
    /// 配置的集合名称不是单个非空路径段。
    InvalidCollectionName(String),
}

use Exception::*;

impl Exception {
    /// 该异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest | MalformedUrl => 400,
            EmptyBody | InvalidJson(_) | StudentExists => 400,
            StudentNotFound => 404,
            UnsupportedMethod(_) => 405,
            PayloadTooLarge => 413,
            UnsupportedHttpVersion => 505,
            EncodeFailed(_) | StorageFailure(_) => 500,
            ConfigUnreadable(_) | InvalidCollectionName(_) => 500,
        }
    }

    /// 是否属于客户端输入错误（4xx）
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl fmt::Display for Exception {
    /// 根据错误类型写入人类可读的描述文本。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed HTTP request"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            PayloadTooLarge => write!(f, "Request is too large"),
            MalformedUrl => write!(f, "Malformed URL"),
            UnsupportedMethod(method) => write!(f, "Method {} not supported.", method),
            EmptyBody => write!(f, "No data in POST request"),
            InvalidJson(msg) => write!(f, "{}", msg),
            EncodeFailed(msg) => write!(f, "Failed to encode response: {}", msg),
            StudentNotFound => write!(f, "Not Found"),
            StudentExists => write!(f, "Student already exists. Use PUT to modify."),
            StorageFailure(msg) => write!(f, "{}", msg),
            ConfigUnreadable(msg) => write!(f, "Couldn't read config file: {}", msg),
            InvalidCollectionName(name) => write!(f, "Invalid collection name: {:?}", name),
        }
    }
}

impl std::error::Error for Exception {}
