// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::{Deserialize, Serialize};

/// 一条学生记录。
///
/// `student_id` 由存储层在创建时分配，客户端提交的值总会被覆盖。
/// 缺失的字段在解码时取默认值（空字符串 / 0）。
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Student {
    pub name: String,
    pub age: i64,
    pub student_id: String,
}

impl Student {
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            name: name.to_string(),
            age,
            student_id: String::new(),
        }
    }
}
