// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 黑盒测试共用的启动与收发工具。
//!
//! 每个测试在 127.0.0.1 的临时端口上启动一个独立的服务器实例，
//! 通过原始 TCP 报文与之交互，不依赖外部 curl 或已运行的服务。

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use students::{Config, Server, StudentsDb, StudentsStorage};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::watch,
};

/// 单个请求的硬超时，防止测试因服务器挂起而永久阻塞
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub storage: Arc<StudentsDb>,
    /// 持有发送端即保持服务器运行
    shutdown: watch::Sender<bool>,
}

impl TestServer {
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

pub async fn start_server(config: Config) -> TestServer {
    start_server_with(config, Arc::new(StudentsDb::new())).await
}

/// 用预先构造好的存储启动服务器
pub async fn start_server_with(config: Config, storage: Arc<StudentsDb>) -> TestServer {
    let dyn_storage: Arc<dyn StudentsStorage> = storage.clone();
    let server = Server::new(config.with_port(0).with_local(true), dyn_storage).unwrap();
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (shutdown, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        server.run(listener, shutdown_rx).await;
    });

    TestServer {
        addr,
        storage,
        shutdown,
    }
}

/// 发送原始报文并读取完整响应（服务器在响应后关闭连接）
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> Result<String, String> {
    let mut stream = TcpStream::connect(addr).await.map_err(|e| e.to_string())?;
    stream.write_all(raw).await.map_err(|e| e.to_string())?;

    let mut buffer = Vec::new();
    tokio::time::timeout(REQUEST_TIMEOUT, stream.read_to_end(&mut buffer))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    Ok(String::from_utf8_lossy(&buffer).to_string())
}

/// 构造带 Content-Length 的请求报文
pub fn build_request(method: &str, path: &str, body: &str) -> String {
    format!(
        "{} {} HTTP/1.1\r\nHost: localhost\r\nUser-Agent: students-test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        method,
        path,
        body.len(),
        body
    )
}

pub async fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> ParsedResponse {
    let raw = build_request(method, path, body);
    let response = send_raw(addr, raw.as_bytes()).await.unwrap();
    parse_response(&response)
}

pub struct ParsedResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ParsedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn parse_response(response: &str) -> ParsedResponse {
    let (head, body) = response.split_once("\r\n\r\n").unwrap_or((response, ""));
    let mut lines = head.split("\r\n");

    // 解析状态行
    let status_code = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);

    // 解析头部
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    ParsedResponse {
        status_code,
        headers,
        body: body.to_string(),
    }
}
