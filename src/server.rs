// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务器主循环
//!
//! 每个 TCP 连接在独立的 tokio 任务中处理，一个连接只处理一个请求。
//! 请求依次经过：读取报文 → 解析 → CORS 中间件 → 分发器 → 可选压缩 → 写回。

use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::watch,
    time::{sleep, timeout},
};

use crate::{
    config::Config,
    cors::Cors,
    dispatcher::Dispatcher,
    exception::Exception,
    request::{read_request, Request},
    response::Response,
    storage::StudentsStorage,
};

/// 停机后等待在途连接结束时的轮询间隔
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// 错误响应发出后继续读取并丢弃客户端数据的最长时间
const LINGER: Duration = Duration::from_millis(100);

/// 在途连接计数。任务结束或 panic 展开时都会在析构中减一。
struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 连接任务共享的只读上下文
struct Shared {
    config: Config,
    cors: Cors,
    dispatcher: Dispatcher,
}

pub struct Server {
    shared: Arc<Shared>,
    storage: Arc<dyn StudentsStorage>,
    active_connection: Arc<AtomicUsize>,
}

impl Server {
    /// 用显式注入的存储构造服务器
    pub fn new(config: Config, storage: Arc<dyn StudentsStorage>) -> Result<Self, Exception> {
        let dispatcher = Dispatcher::new(config.collection(), Arc::clone(&storage))?;
        let cors = Cors::new(config.cors().clone());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                cors,
                dispatcher,
            }),
            storage,
            active_connection: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// 按配置绑定监听地址：`local` 为真时只监听本地回环
    pub async fn bind(&self) -> io::Result<TcpListener> {
        let config = &self.shared.config;
        let address = match config.local() {
            true => Ipv4Addr::new(127, 0, 0, 1),
            false => Ipv4Addr::new(0, 0, 0, 0),
        };
        info!("服务端将在{}:{}上监听Socket连接", address, config.port());
        TcpListener::bind(SocketAddrV4::new(address, config.port())).await
    }

    pub fn active_connections(&self) -> usize {
        self.active_connection.load(Ordering::SeqCst)
    }

    pub fn storage(&self) -> &Arc<dyn StudentsStorage> {
        &self.storage
    }

    /// 接收连接直到 `shutdown` 变为 `true`（或发送端被丢弃），然后等待在途连接结束
    pub async fn run(&self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
        let mut id: u128 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("主循环接收到停机指令，正在退出...");
                    break;
                }
                accepted = listener.accept() => {
                    let (mut stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!("接受连接失败：{}", e);
                            continue;
                        }
                    };
                    debug!("[ID{}]新的连接：{}", id, addr);

                    let shared = Arc::clone(&self.shared);
                    let guard = ConnectionGuard::new(Arc::clone(&self.active_connection));
                    tokio::spawn(async move {
                        let _guard = guard;
                        handle_connection(&mut stream, id, &shared).await;
                    });
                    id += 1;
                }
            }
        }

        let deadline = Instant::now() + Duration::from_millis(self.shared.config.read_timeout_ms());
        while self.active_connections() > 0 && Instant::now() < deadline {
            sleep(DRAIN_POLL).await;
        }
        let remaining = self.active_connections();
        if remaining > 0 {
            warn!("仍有{}个连接未结束，强制退出", remaining);
        }
        info!("服务器已停止");
    }
}

/// # 连接处理器
///
/// 负责单个连接的生命周期：读取并解析请求、执行中间件与分发、发送响应。
async fn handle_connection<S>(stream: &mut S, id: u128, shared: &Shared)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let config = &shared.config;
    let start_time = Instant::now();

    let read = timeout(
        Duration::from_millis(config.read_timeout_ms()),
        read_request(stream, config.max_request_size(), id),
    )
    .await;
    let buffer = match read {
        Err(_) => {
            warn!("[ID{}]读取请求超时，关闭连接", id);
            return;
        }
        Ok(Ok(None)) => {
            debug!("[ID{}]客户端未发送数据即关闭连接", id);
            return;
        }
        Ok(Ok(Some(buffer))) => buffer,
        Ok(Err(e)) => {
            warn!("[ID{}]读取请求失败：{}", id, e);
            send_exception(stream, id, shared, &e).await;
            linger(stream, id).await;
            return;
        }
    };

    // 1. 协议解析阶段
    let request = match Request::try_from(&buffer, id) {
        Ok(req) => req,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            send_exception(stream, id, shared, &e).await;
            return;
        }
    };

    // 2. 中间件 + 分发
    let mut response = shared
        .cors
        .handle(&request, id, |req| shared.dispatcher.dispatch(req, id));

    // 3. 内容协商
    if config.enable_compression() {
        response.compress_for(request.accept_encoding(), id);
    }

    debug!(
        "[ID{}]HTTP响应构建完成，客户端Accept：{}，服务端用时{}ms。",
        id,
        request.accept().unwrap_or("*/*"),
        start_time.elapsed().as_millis()
    );

    // 4. 访问日志
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}",
        id,
        request.version(),
        request.method(),
        request.path(),
        response.status_code(),
        response.information(),
        request.user_agent(),
    );

    write_response(stream, id, &response).await;
}

async fn send_exception<S>(stream: &mut S, id: u128, shared: &Shared, exception: &Exception)
where
    S: AsyncWrite + Unpin,
{
    let mut response = Response::from_exception(exception);
    shared.cors.apply(&mut response);
    write_response(stream, id, &response).await;
}

/// 关闭前读尽客户端尚未发送完的数据，至多等待 `LINGER`。接收缓冲区非空时关闭会触发 RST。
async fn linger<S>(stream: &mut S, id: u128)
where
    S: AsyncRead + Unpin,
{
    let mut junk = [0u8; 1024];
    let mut discarded = 0usize;
    let _ = timeout(LINGER, async {
        while let Ok(n) = stream.read(&mut junk).await {
            if n == 0 {
                break;
            }
            discarded += n;
        }
    })
    .await;
    debug!("[ID{}]关闭前丢弃了{}字节未读数据", id, discarded);
}

async fn write_response<S>(stream: &mut S, id: u128, response: &Response)
where
    S: AsyncWrite + Unpin,
{
    let response_bytes = response.as_bytes();
    debug!("[ID{}]发送响应，长度: {}", id, response_bytes.len());
    if let Err(e) = stream.write_all(&response_bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StudentsDb;

    fn shared(config: Config) -> Shared {
        let storage: Arc<dyn StudentsStorage> = Arc::new(StudentsDb::new());
        Shared {
            cors: Cors::new(config.cors().clone()),
            dispatcher: Dispatcher::new(config.collection(), storage).unwrap(),
            config,
        }
    }

    async fn roundtrip(shared: &Shared, raw: &[u8]) -> String {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        client.write_all(raw).await.unwrap();
        handle_connection(&mut server, 0, shared).await;
        drop(server);
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).to_string()
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let shared = shared(Config::new());
        let response = roundtrip(&shared, b"OPTIONS /students/ HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(response.contains("Content-Length: 0\r\n"));
    }

    #[tokio::test]
    async fn test_protocol_errors_carry_cors() {
        let shared = shared(Config::new());
        let response = roundtrip(&shared, b"GET /students/ HTTP/3\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 505 "));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
    }

    #[tokio::test]
    async fn test_oversized_request() {
        let shared = shared(Config::new().with_max_request_size(64));
        let body = "x".repeat(200);
        let raw = format!(
            "POST /students/ HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let response = roundtrip(&shared, raw.as_bytes()).await;
        assert!(response.starts_with("HTTP/1.1 413 "));
    }

    #[tokio::test]
    async fn test_gzip_negotiated() {
        let shared = shared(Config::new());
        let response = roundtrip(
            &shared,
            b"GET /students/ HTTP/1.1\r\nAccept-Encoding: gzip\r\n\r\n",
        )
        .await;
        assert!(response.contains("Content-Encoding: gzip"));
    }

    #[tokio::test]
    async fn test_content_length_overflow_is_413() {
        let shared = shared(Config::new());
        let raw = format!(
            "POST /students/ HTTP/1.1\r\nContent-Length: {}\r\n\r\n{{}}",
            usize::MAX
        );
        let response = roundtrip(&shared, raw.as_bytes()).await;
        assert!(response.starts_with("HTTP/1.1 413 "));
        assert!(response.contains("Access-Control-Allow-Origin: *"));
    }

    #[tokio::test]
    async fn test_connection_guard_survives_panic() {
        let counter = Arc::new(AtomicUsize::new(0));
        let guard = ConnectionGuard::new(Arc::clone(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("连接任务崩溃");
        });
        assert!(handle.await.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_timeout_closes_silently() {
        let shared = shared(Config::new().with_read_timeout_ms(50));
        let (mut client, mut server) = tokio::io::duplex(1024);
        client.write_all(b"GET /students/ HTTP/1.1\r\n").await.unwrap();

        handle_connection(&mut server, 0, &shared).await;
        drop(server);

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
