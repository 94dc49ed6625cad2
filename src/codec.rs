// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 编解码层
//!
//! 请求体 → [`Student`]，以及 [`Student`] / 学生列表 → JSON 字节。
//! 编码结果先写入缓冲区再交给响应构建器，编码失败因此可以在发送任何字节之前变成 500。

use bytes::Bytes;
use serde::Serialize;
use serde_json::Deserializer;

use crate::{exception::Exception, student::Student};

/// 将请求体解码为学生记录。
///
/// 只解码第一个 JSON 值，其后的内容被忽略。空请求体或仅包含空白字符的请求体
/// 视为“没有数据”，与格式错误的请求体区分开。
pub fn decode_student(body: &[u8]) -> Result<Student, Exception> {
    let mut stream = Deserializer::from_slice(body).into_iter::<Student>();
    match stream.next() {
        None => Err(Exception::EmptyBody),
        Some(Ok(student)) => Ok(student),
        Some(Err(e)) => Err(Exception::InvalidJson(e.to_string())),
    }
}

pub fn encode_student(student: &Student) -> Result<Bytes, Exception> {
    encode(student)
}

/// 编码学生列表，空列表编码为 `[]`
pub fn encode_students(students: &[Student]) -> Result<Bytes, Exception> {
    encode(&students)
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, Exception> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Exception::EncodeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let student = decode_student(br#"{"name":"Ada","age":28,"student_id":"7"}"#).unwrap();
        assert_eq!(student.name, "Ada");
        assert_eq!(student.age, 28);
        assert_eq!(student.student_id, "7");
    }

    #[test]
    fn test_decode_missing_fields_default() {
        let student = decode_student(br#"{"name":"Ada"}"#).unwrap();
        assert_eq!(student.age, 0);
        assert_eq!(student.student_id, "");
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let student = decode_student(br#"{"name":"Ada","age":28,"house":"Gryffindor"}"#).unwrap();
        assert_eq!(student, Student::new("Ada", 28));
    }

    #[test]
    fn test_decode_empty_body() {
        assert_eq!(decode_student(b""), Err(Exception::EmptyBody));
        assert_eq!(decode_student(b"  \r\n\t"), Err(Exception::EmptyBody));
    }

    #[test]
    fn test_decode_malformed_body() {
        match decode_student(b"{\"name\": ") {
            Err(Exception::InvalidJson(_)) => {}
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
        match decode_student(br#"{"name":"Ada","age":"old"}"#) {
            Err(Exception::InvalidJson(msg)) => assert!(msg.contains("invalid type")),
            other => panic!("Expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_only_first_value() {
        let student = decode_student(br#"{"name":"Ada","age":28} trailing"#).unwrap();
        assert_eq!(student.name, "Ada");
    }

    #[test]
    fn test_encode_empty_list() {
        assert_eq!(encode_students(&[]).unwrap(), Bytes::from_static(b"[]"));
    }

    #[test]
    fn test_encode_student_shape() {
        let mut student = Student::new("Ada", 28);
        student.student_id = "1".to_string();
        let bytes = encode_student(&student).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"name":"Ada","age":28,"student_id":"1"}"#
        );
    }

    #[test]
    fn test_round_trip_collection() {
        let students = vec![
            Student { name: "Ada".to_string(), age: 28, student_id: "1".to_string() },
            Student { name: "Grace".to_string(), age: -3, student_id: "2".to_string() },
        ];
        let bytes = encode_students(&students).unwrap();
        let decoded: Vec<Student> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, students);

        let single = decode_student(&encode_student(&students[1]).unwrap()).unwrap();
        assert_eq!(single, students[1]);
    }
}
