// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 存储接口
//!
//! 分发器只依赖 [`StudentsStorage`] 这一组能力（Add / Count / Get / GetAll / Remove），
//! 而不依赖具体的存储实现。内存存储 [`crate::store::StudentsDb`] 是默认实现；
//! 测试中使用 mockall 生成的 `MockStudentsStorage` 作为替身。
//!
//! 实现者必须保证五个操作彼此串行化，因为同一个实例会被多个连接任务并发调用。

use crate::{exception::Exception, student::Student};

#[cfg_attr(test, mockall::automock)]
pub trait StudentsStorage: Send + Sync {
    /// 添加一名学生并返回分配给它的标识符。调用方设置的 `student_id` 会被忽略。
    fn add(&self, student: Student) -> Result<String, Exception>;

    /// 当前存储的学生数量
    fn count(&self) -> usize;

    /// 按标识符精确查找
    fn get(&self, student_id: &str) -> Option<Student>;

    /// 所有学生的快照，顺序不作保证
    fn get_all(&self) -> Vec<Student>;

    /// 删除指定标识符的学生，返回删除前该标识符是否存在
    fn remove(&self, student_id: &str) -> bool;
}
