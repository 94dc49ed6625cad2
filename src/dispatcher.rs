// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求分发器
//!
//! 把 “HTTP 方法 × 路径形状” 映射到存储操作。路由只有一族：
//! `/<collection>/<id?>`，`id` 为空表示整个集合，非空表示单个学生。
//!
//! | 方法      | id   | 行为                                  |
//! |-----------|------|---------------------------------------|
//! | GET       | 空   | 返回全部学生的 JSON 数组               |
//! | GET       | 非空 | 返回单个学生，不存在时 404             |
//! | POST      | 忽略 | 解码请求体并添加学生                   |
//! | 其他      | -    | 405                                    |
//!
//! 路径形状不符时一律 400，且不会触及存储。分发器本身不保存任何请求间状态。

use std::sync::Arc;

use log::{debug, error, info, warn};
use regex::Regex;

use crate::{
    codec,
    exception::Exception,
    param::HttpRequestMethod,
    request::Request,
    response::Response,
    storage::StudentsStorage,
};

pub struct Dispatcher {
    collection: String,
    route: Regex,
    storage: Arc<dyn StudentsStorage>,
}

impl Dispatcher {
    /// 为名为 `collection` 的资源集合构造分发器。
    ///
    /// 集合名必须是单个非空路径段。
    pub fn new(collection: &str, storage: Arc<dyn StudentsStorage>) -> Result<Self, Exception> {
        if collection.is_empty() || collection.contains('/') || collection.contains('?') {
            return Err(Exception::InvalidCollectionName(collection.to_string()));
        }
        let pattern = format!(r"^/{}/([^/]*)$", regex::escape(collection));
        let route = Regex::new(&pattern)
            .map_err(|_| Exception::InvalidCollectionName(collection.to_string()))?;
        Ok(Self {
            collection: collection.to_string(),
            route,
            storage,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 处理一个请求并生成完整的响应
    pub fn dispatch(&self, request: &Request, id: u128) -> Response {
        let result = self
            .parse_path(request.path())
            .and_then(|student_id| match request.method() {
                HttpRequestMethod::Get if student_id.is_empty() => self.reply_with_all(id),
                HttpRequestMethod::Get => self.reply_with_student(student_id, id),
                HttpRequestMethod::Post => self.create(request, id),
                other => Err(Exception::UnsupportedMethod(other.to_string())),
            });

        match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_client_error() {
                    warn!("[ID{}]{} {} 被拒绝：{}", id, request.method(), request.path(), e);
                } else {
                    error!("[ID{}]{} {} 处理失败：{}", id, request.method(), request.path(), e);
                }
                Response::from_exception(&e)
            }
        }
    }

    /// 校验路径形状并取出标识符段（可能为空）
    fn parse_path<'a>(&self, path: &'a str) -> Result<&'a str, Exception> {
        match self.route.captures(path).and_then(|c| c.get(1)) {
            Some(m) => Ok(m.as_str()),
            None => Err(Exception::MalformedUrl),
        }
    }

    fn reply_with_all(&self, id: u128) -> Result<Response, Exception> {
        let students = self.storage.get_all();
        debug!("[ID{}]返回全部{}名学生", id, students.len());
        let body = codec::encode_students(&students)?;
        Ok(Response::json(200, body))
    }

    fn reply_with_student(&self, student_id: &str, id: u128) -> Result<Response, Exception> {
        let student = self
            .storage
            .get(student_id)
            .ok_or(Exception::StudentNotFound)?;
        debug!("[ID{}]找到学生{}", id, student_id);
        let body = codec::encode_student(&student)?;
        Ok(Response::json(200, body))
    }

    /// 创建学生。
    ///
    /// 重复检查针对解码得到的 `student_id`（可能是空字符串），
    /// 而存储总会重新分配标识符，所以这一检查实际上只对显式提交了已存在标识符的请求生效。
    fn create(&self, request: &Request, id: u128) -> Result<Response, Exception> {
        debug!(
            "[ID{}]请求体类型：{}，声明长度：{:?}",
            id,
            request.content_type().unwrap_or("未指定"),
            request.content_length()
        );
        let student = codec::decode_student(request.body())?;

        if self.storage.get(&student.student_id).is_some() {
            return Err(Exception::StudentExists);
        }

        let student_id = self.storage.add(student)?;
        info!("[ID{}]新增学生，标识符为{}", id, student_id);
        Ok(Response::text(200, "Student added successfully"))
    }
}
