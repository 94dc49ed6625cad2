// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内存学生存储
//!
//! 以标识符为键的学生集合，外加一个只增不减的标识符计数器。
//! 映射与计数器由同一把 `Mutex` 保护，因此 `add` 的“读取-自增-插入”
//! 相对于其他任何操作都是原子的，`get_all` 得到的是某一时刻的一致快照。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use crate::{exception::Exception, storage::StudentsStorage, student::Student};

struct Inner {
    students: HashMap<String, Student>,
    /// 最近一次分配出去的标识符，删除记录不会回收它
    last_student_id: u64,
}

pub struct StudentsDb {
    inner: Mutex<Inner>,
}

impl StudentsDb {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                students: HashMap::new(),
                last_student_id: 0,
            }),
        }
    }

    /// 以一组初始记录构造存储，每条记录都经过 `add` 分配标识符
    pub fn with_seed<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = Student>,
    {
        let db = Self::new();
        {
            let mut inner = db.lock();
            for student in seed {
                Self::insert(&mut inner, student);
            }
            debug!("预置了{}名学生", inner.students.len());
        }
        db
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("学生存储锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn insert(inner: &mut Inner, mut student: Student) -> String {
        inner.last_student_id += 1;
        student.student_id = inner.last_student_id.to_string();
        let student_id = student.student_id.clone();
        inner.students.insert(student_id.clone(), student);
        student_id
    }
}

impl Default for StudentsDb {
    fn default() -> Self {
        Self::new()
    }
}

impl StudentsStorage for StudentsDb {
    fn add(&self, student: Student) -> Result<String, Exception> {
        let mut inner = self.lock();
        Ok(Self::insert(&mut inner, student))
    }

    fn count(&self) -> usize {
        self.lock().students.len()
    }

    fn get(&self, student_id: &str) -> Option<Student> {
        self.lock().students.get(student_id).cloned()
    }

    fn get_all(&self) -> Vec<Student> {
        let inner = self.lock();
        let mut all = Vec::with_capacity(inner.students.len());
        all.extend(inner.students.values().cloned());
        all
    }

    fn remove(&self, student_id: &str) -> bool {
        self.lock().students.remove(student_id).is_some()
    }
}
