// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 学生信息服务
//!
//! 基于 Tokio 运行时的多线程 HTTP 服务，在进程内存中维护学生记录，
//! 并在 `/students/{id?}` 上提供创建、列表与查询操作。
//! 核心功能包括：
//! - 由互斥锁串行化的内存存储，通过依赖注入交给分发器
//! - 手写的 HTTP/1.1 报文解析与基于路径形状的方法分发
//! - 跨域（CORS）中间件
//! - 后台管理控制台（CLI 指令交互）

use std::{
    env, process,
    sync::Arc,
};

use log::{error, info};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    runtime::Builder,
    sync::watch,
};

use students::{
    config::{Config, PORT_ENV},
    logging::{self, LOG_CONFIG},
    Server, StudentsDb, StudentsStorage,
};

/// 默认配置文件路径
const CONFIG_FILE: &str = "config/development.toml";

/// # 程序入口点
///
/// 初始化日志、加载配置、构建运行时并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    logging::init(LOG_CONFIG);

    // 2. 环境配置加载：TOML 文件 + 环境变量 PORT
    let mut config = Config::from_toml(CONFIG_FILE);
    config.apply_env_port(env::var(PORT_ENV).ok());
    info!("配置文件已载入");

    // 3. 异步运行时定制：根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            process::exit(1);
        }
    };

    runtime.block_on(serve(config));
}

async fn serve(config: Config) {
    // 4. 存储初始化：启动时构造一次，显式注入服务器
    let storage: Arc<dyn StudentsStorage> =
        Arc::new(StudentsDb::with_seed(config.seed().to_vec()));
    info!("学生存储已就绪，当前共{}名学生", storage.count());

    let port = config.port();
    let server = match Server::new(config, storage) {
        Ok(server) => Arc::new(server),
        Err(e) => {
            error!("无法构建服务器：{}", e);
            process::exit(1);
        }
    };

    // 5. 网络层初始化：绑定失败直接终止进程
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            process::exit(1);
        }
    };
    info!("端口{}绑定完成", port);

    // 6. 停机信号：管理控制台的 stop 指令或 Ctrl-C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    tokio::spawn(console(Arc::clone(&server), Arc::clone(&shutdown_tx)));
    tokio::spawn({
        let shutdown_tx = Arc::clone(&shutdown_tx);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("收到Ctrl-C，准备停机");
                let _ = shutdown_tx.send(true);
            }
        }
    });

    // 7. 主事件循环
    server.run(listener, shutdown_rx).await;
}

/// # 管理控制台
///
/// 从标准输入读取运维指令，不阻塞监听循环。标准输入关闭时控制台退出，服务继续运行。
async fn console(server: Arc<Server>, shutdown_tx: Arc<watch::Sender<bool>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(input)) = lines.next_line().await {
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将在处理完在途请求后关闭...");
                let _ = shutdown_tx.send(true);
                break;
            }
            "help" => {
                println!("== Students Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("===================");
            }
            "status" => {
                println!("== Students 状态 ==");
                println!("当前活跃连接数: {}", server.active_connections());
                println!("当前学生数量: {}", server.storage().count());
                println!("===================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}
