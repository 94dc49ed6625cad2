// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 该模块负责把 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 从异步流中读取一个完整报文（请求头 + `Content-Length` 指定长度的请求体）。
//! 2. 请求行（Request-Line）的解析（方法、路径、查询串、版本）。
//! 3. 常用 HTTP 标头（Headers）的提取。
//! 4. 内容协商（Content Negotiation）相关的编码解析。

use bytes::Bytes;
use log::{debug, error};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{exception::Exception, param::*};

/// 单次从套接字读取的字节数
const READ_CHUNK: usize = 1024;

/// 表示一个完整的 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法
    method: HttpRequestMethod,
    /// 请求的资源路径（不含查询字符串）
    path: String,
    /// `?` 之后的查询字符串
    query: Option<String>,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 客户端接受的内容类型（MIME）
    accept: Option<String>,
    /// 请求体的 MIME 类型
    content_type: Option<String>,
    /// 请求声明的请求体长度
    content_length: Option<usize>,
    /// 请求体
    body: Bytes,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 定位请求头结束标记 `\r\n\r\n`，其后的字节为请求体。
    /// 2. 验证编码：确保请求头是合法的 UTF-8 字符串。
    /// 3. 解析请求行：提取方法、路径和协议版本。
    /// 4. 迭代解析标头：识别 `User-Agent`, `Accept`, `Accept-Encoding`,
    ///    `Content-Type`, `Content-Length`。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `id` - 连接序号，用于在多任务环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let head_end = match find_header_end(buffer) {
            Some(pos) => pos,
            None => {
                error!("[ID{}]HTTP请求缺少请求头结束标记", id);
                return Err(Exception::MalformedRequest);
            }
        };

        // 1. 将请求头转换为字符串，失败则判定为非法的 HTTP 请求
        let head = match std::str::from_utf8(&buffer[..head_end]) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = head.split(CRLF);

        // 2. 解析请求行 (e.g., "GET /students/1 HTTP/1.1")
        let first_line = request_lines.next().unwrap_or("");
        let first_line_parts: Vec<&str> = first_line.split_whitespace().collect();
        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequest);
        }

        let method = HttpRequestMethod::from_token(first_line_parts[0]);

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            v if v.starts_with("HTTP/") => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
            _ => {
                error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
                return Err(Exception::MalformedRequest);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let target = first_line_parts[1..first_line_parts.len() - 1].join(" ");
        let (raw_path, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q.to_string())),
            None => (target.as_str(), None),
        };
        let path = match percent_decode(raw_path) {
            Some(path) => path,
            None => {
                error!("[ID{}]请求路径中的百分号编码非法：{}", id, raw_path);
                return Err(Exception::MalformedRequest);
            }
        };

        // 3. 迭代各行解析 Headers，字段名大小写不敏感
        let mut user_agent = String::new();
        let mut accept_encoding = vec![];
        let mut accept = None;
        let mut content_type = None;
        let mut content_length = None;
        for line in request_lines {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim().to_lowercase(), v.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "content-type" => content_type = Some(value.to_string()),
                "accept-encoding" => accept_encoding = parse_accept_encoding(value),
                "content-length" => match value.parse::<usize>() {
                    Ok(len) => content_length = Some(len),
                    Err(_) => {
                        error!("[ID{}]非法的Content-Length：{}", id, value);
                        return Err(Exception::MalformedRequest);
                    }
                },
                _ => {}
            }
        }

        // 4. 截取请求体；没有 Content-Length 时不读取任何请求体
        let body_start = head_end + HEADER_TERMINATOR.len();
        let available = &buffer[body_start..];
        let body = match content_length {
            Some(len) => {
                if available.len() < len {
                    debug!(
                        "[ID{}]请求体不完整：声明{}字节，实际{}字节",
                        id,
                        len,
                        available.len()
                    );
                }
                Bytes::copy_from_slice(&available[..len.min(available.len())])
            }
            None => Bytes::new(),
        };

        Ok(Self {
            method,
            path,
            query,
            version,
            user_agent,
            accept_encoding,
            accept,
            content_type,
            content_length,
            body,
        })
    }
}

/// 从异步流中读取一个完整的 HTTP 报文。
///
/// 读取到请求头结束标记后，再按 `Content-Length` 读取请求体。
/// 对端在发送任何数据之前关闭连接时返回 `Ok(None)`；
/// 报文超过 `max_size` 时返回 [`Exception::PayloadTooLarge`]。
pub async fn read_request<R>(
    reader: &mut R,
    max_size: usize,
    id: u128,
) -> Result<Option<Vec<u8>>, Exception>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut expected: Option<usize> = None;

    loop {
        if let Some(total) = expected {
            if buffer.len() >= total {
                break;
            }
        }

        let n = match reader.read(&mut chunk).await {
            Ok(n) => n,
            Err(e) => {
                error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
                return Err(Exception::MalformedRequest);
            }
        };
        if n == 0 {
            if buffer.is_empty() {
                return Ok(None);
            }
            debug!("[ID{}]对端在报文完整之前关闭了写端", id);
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > max_size {
            return Err(Exception::PayloadTooLarge);
        }

        if expected.is_none() {
            if let Some(head_end) = find_header_end(&buffer) {
                let body_len = declared_content_length(&buffer[..head_end]);
                let total = match (head_end + HEADER_TERMINATOR.len()).checked_add(body_len) {
                    Some(total) if total <= max_size => total,
                    _ => return Err(Exception::PayloadTooLarge),
                };
                expected = Some(total);
            }
        }
    }

    debug!("[ID{}]HTTP请求接收完毕，共{}字节", id, buffer.len());
    Ok(Some(buffer))
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

/// 在读取阶段粗略提取 `Content-Length`，非法值按 0 处理，交由解析阶段报错
fn declared_content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .split(CRLF)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// 解码路径中的 `%XX` 转义。`+` 在路径中不代表空格，原样保留。
/// 转义不完整、不是十六进制或解码结果不是 UTF-8 时返回 `None`。
fn percent_decode(raw: &str) -> Option<String> {
    if !raw.contains('%') {
        return Some(raw.to_string());
    }
    let bytes = raw.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

fn parse_accept_encoding(value: &str) -> Vec<HttpEncoding> {
    value
        .split(',')
        .filter_map(|item| {
            let token = item.split(';').next().unwrap_or("").trim();
            match token.to_lowercase().as_str() {
                "gzip" => Some(HttpEncoding::Gzip),
                "deflate" => Some(HttpEncoding::Deflate),
                "br" => Some(HttpEncoding::Br),
                _ => None,
            }
        })
        .collect()
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    /// 获取请求路径（不含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取查询字符串
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// 获取请求方法
    pub fn method(&self) -> &HttpRequestMethod {
        &self.method
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// 获取客户端支持的压缩算法列表
    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    /// 获取客户端接受的 MIME 类型
    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    /// 获取请求体的 MIME 类型
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// 获取声明的请求体长度
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// 获取请求体
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
